// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory stand-ins for the cloud services around the engine: secret
//! store, object store, role assumption, workflow runtime, event-source
//! mappings and the product catalog.

use crate::domain::catalog::{CatalogError, CatalogNotifier, WorkflowResult};
use crate::domain::credentials::{SecretStoreError, SecretsBackend};
use crate::domain::event_source::{EventSourceError, EventSourceMapping, EventSourceMappings, MappingState};
use crate::domain::object_store::{ObjectLocation, ObjectStore, ObjectStoreError, RoleAssumer, TemporaryCredentials};
use crate::domain::operation::ServiceCatalogOperation;
use crate::domain::workflow_runtime::{WorkflowRuntime, WorkflowRuntimeError};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

// ============================================================================
// Secret store
// ============================================================================

#[derive(Default)]
pub struct InMemorySecretsBackend {
    secrets: Mutex<HashMap<String, String>>,
}

impl InMemorySecretsBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(self, secret_id: &str, value: &str) -> Self {
        self.secrets.lock().insert(secret_id.to_string(), value.to_string());
        self
    }

    pub fn secret(&self, secret_id: &str) -> Option<String> {
        self.secrets.lock().get(secret_id).cloned()
    }
}

#[async_trait]
impl SecretsBackend for InMemorySecretsBackend {
    async fn get_secret_string(&self, secret_id: &str) -> Result<String, SecretStoreError> {
        self.secret(secret_id)
            .ok_or_else(|| SecretStoreError::NotFound(secret_id.to_string()))
    }

    async fn put_secret_string(&self, secret_id: &str, value: &str) -> Result<(), SecretStoreError> {
        let mut secrets = self.secrets.lock();
        match secrets.get_mut(secret_id) {
            Some(existing) => {
                *existing = value.to_string();
                Ok(())
            }
            None => Err(SecretStoreError::NotFound(secret_id.to_string())),
        }
    }
}

// ============================================================================
// Object store and role assumption
// ============================================================================

#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<(String, String), Bytes>>,
    last_credentials: Mutex<Option<Option<TemporaryCredentials>>>,
    deny_all: bool,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(self, bucket: &str, key: &str, body: impl Into<Bytes>) -> Self {
        self.put_object(bucket, key, body);
        self
    }

    /// Every read fails with `AccessDenied`.
    pub fn denying(mut self) -> Self {
        self.deny_all = true;
        self
    }

    pub fn put_object(&self, bucket: &str, key: &str, body: impl Into<Bytes>) {
        self.objects
            .lock()
            .insert((bucket.to_string(), key.to_string()), body.into());
    }

    /// Credentials used by the most recent read; `Some(None)` means ambient.
    pub fn last_credentials(&self) -> Option<Option<TemporaryCredentials>> {
        self.last_credentials.lock().clone()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn get_object(
        &self,
        location: &ObjectLocation,
        credentials: Option<&TemporaryCredentials>,
    ) -> Result<Bytes, ObjectStoreError> {
        *self.last_credentials.lock() = Some(credentials.cloned());
        if self.deny_all {
            return Err(ObjectStoreError::AccessDenied(format!("GetObject on {}", location)));
        }
        self.objects
            .lock()
            .get(&(location.bucket.clone(), location.key.clone()))
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound(location.to_string()))
    }
}

#[derive(Default)]
pub struct FakeRoleAssumer {
    denied: HashSet<String>,
    assumed: Mutex<Vec<String>>,
}

impl FakeRoleAssumer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn denying(mut self, role_arn: &str) -> Self {
        self.denied.insert(role_arn.to_string());
        self
    }

    pub fn assumed_roles(&self) -> Vec<String> {
        self.assumed.lock().clone()
    }
}

#[async_trait]
impl RoleAssumer for FakeRoleAssumer {
    async fn assume_role(&self, role_arn: &str, session_name: &str) -> Result<TemporaryCredentials, ObjectStoreError> {
        if self.denied.contains(role_arn) {
            return Err(ObjectStoreError::AccessDenied(format!("AssumeRole on {}", role_arn)));
        }
        self.assumed.lock().push(role_arn.to_string());
        Ok(TemporaryCredentials {
            access_key_id: "ASIAFAKEACCESSKEY".to_string(),
            secret_access_key: "fake-secret".to_string(),
            session_token: format!("session-{}", session_name),
        })
    }
}

// ============================================================================
// Workflow runtime
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedExecution {
    pub state_machine_arn: String,
    pub name: String,
    pub input: String,
}

#[derive(Default)]
pub struct FakeWorkflowRuntime {
    started: Mutex<Vec<StartedExecution>>,
    running: Mutex<HashMap<String, u64>>,
    rejected_names: Mutex<HashSet<String>>,
}

impl FakeWorkflowRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_running(&self, state_machine_arn: &str, count: u64) {
        self.running.lock().insert(state_machine_arn.to_string(), count);
    }

    /// Starting an execution with this name fails.
    pub fn reject_name(&self, name: &str) {
        self.rejected_names.lock().insert(name.to_string());
    }

    pub fn started(&self) -> Vec<StartedExecution> {
        self.started.lock().clone()
    }
}

#[async_trait]
impl WorkflowRuntime for FakeWorkflowRuntime {
    async fn start_execution(
        &self,
        state_machine_arn: &str,
        name: &str,
        input: &str,
    ) -> Result<String, WorkflowRuntimeError> {
        if self.rejected_names.lock().contains(name) {
            return Err(WorkflowRuntimeError::Backend(format!("execution {} rejected", name)));
        }
        let mut started = self.started.lock();
        if started.iter().any(|e| e.state_machine_arn == state_machine_arn && e.name == name) {
            return Err(WorkflowRuntimeError::ExecutionAlreadyExists(name.to_string()));
        }
        started.push(StartedExecution {
            state_machine_arn: state_machine_arn.to_string(),
            name: name.to_string(),
            input: input.to_string(),
        });
        Ok(format!("{}:execution:{}", state_machine_arn, name))
    }

    async fn count_running_executions(&self, state_machine_arn: &str) -> Result<u64, WorkflowRuntimeError> {
        self.running
            .lock()
            .get(state_machine_arn)
            .copied()
            .ok_or_else(|| WorkflowRuntimeError::StateMachineNotFound(state_machine_arn.to_string()))
    }
}

// ============================================================================
// Event-source mappings
// ============================================================================

/// Mappings settle immediately unless `settle_slowly` is set, in which case
/// they stay in `Disabling` / `Enabling` until [`Self::settle`] is called.
#[derive(Default)]
pub struct FakeEventSourceMappings {
    mappings: Mutex<Vec<EventSourceMapping>>,
    settle_slowly: bool,
}

impl FakeEventSourceMappings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mapping(self, function_name: &str, uuid: &str, state: MappingState) -> Self {
        self.mappings.lock().push(EventSourceMapping {
            uuid: uuid.to_string(),
            function_name: function_name.to_string(),
            state: state.to_string(),
        });
        self
    }

    pub fn settling_slowly(mut self) -> Self {
        self.settle_slowly = true;
        self
    }

    /// Force a raw state string, including ones the engine does not know.
    pub fn set_state(&self, uuid: &str, state: &str) {
        if let Some(mapping) = self.mappings.lock().iter_mut().find(|m| m.uuid == uuid) {
            mapping.state = state.to_string();
        }
    }

    /// Complete any in-flight transitions.
    pub fn settle(&self) {
        for mapping in self.mappings.lock().iter_mut() {
            match mapping.state.as_str() {
                "Disabling" => mapping.state = MappingState::Disabled.to_string(),
                "Enabling" => mapping.state = MappingState::Enabled.to_string(),
                _ => {}
            }
        }
    }

    pub fn state(&self, uuid: &str) -> Option<String> {
        self.mappings
            .lock()
            .iter()
            .find(|m| m.uuid == uuid)
            .map(|m| m.state.clone())
    }
}

#[async_trait]
impl EventSourceMappings for FakeEventSourceMappings {
    async fn list_mappings(&self, function_name: &str) -> Result<Vec<EventSourceMapping>, EventSourceError> {
        Ok(self
            .mappings
            .lock()
            .iter()
            .filter(|m| m.function_name == function_name)
            .cloned()
            .collect())
    }

    async fn set_enabled(&self, uuid: &str, enabled: bool) -> Result<(), EventSourceError> {
        let mut mappings = self.mappings.lock();
        let mapping = mappings
            .iter_mut()
            .find(|m| m.uuid == uuid)
            .ok_or_else(|| EventSourceError::Backend(format!("mapping {} does not exist", uuid)))?;
        let state = match (enabled, self.settle_slowly) {
            (true, false) => MappingState::Enabled,
            (true, true) => MappingState::Enabling,
            (false, false) => MappingState::Disabled,
            (false, true) => MappingState::Disabling,
        };
        mapping.state = state.to_string();
        Ok(())
    }

    async fn get_state(&self, uuid: &str) -> Result<String, EventSourceError> {
        self.state(uuid)
            .ok_or_else(|| EventSourceError::Backend(format!("mapping {} does not exist", uuid)))
    }
}

// ============================================================================
// Catalog
// ============================================================================

#[derive(Default)]
pub struct RecordingCatalog {
    notifications: Mutex<Vec<(ServiceCatalogOperation, WorkflowResult)>>,
    failure: Mutex<Option<String>>,
}

impl RecordingCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every notification is rejected with `message` (and still recorded).
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock() = Some(message.to_string());
    }

    pub fn notifications(&self) -> Vec<(ServiceCatalogOperation, WorkflowResult)> {
        self.notifications.lock().clone()
    }

    pub fn last(&self) -> Option<(ServiceCatalogOperation, WorkflowResult)> {
        self.notifications.lock().last().cloned()
    }

    fn record(&self, operation: ServiceCatalogOperation, result: WorkflowResult) -> Result<(), CatalogError> {
        self.notifications.lock().push((operation, result));
        match self.failure.lock().clone() {
            Some(message) => Err(CatalogError::Rejected(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CatalogNotifier for RecordingCatalog {
    async fn notify_provision_result(&self, result: WorkflowResult) -> Result<(), CatalogError> {
        self.record(ServiceCatalogOperation::Provision, result)
    }

    async fn notify_update_result(&self, result: WorkflowResult) -> Result<(), CatalogError> {
        self.record(ServiceCatalogOperation::Update, result)
    }

    async fn notify_terminate_result(&self, result: WorkflowResult) -> Result<(), CatalogError> {
        self.record(ServiceCatalogOperation::Terminate, result)
    }
}
