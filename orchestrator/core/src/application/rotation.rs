// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Credential Rotation Controller
//!
//! Rotates the Terraform Cloud team token without losing catalog events.
//! The workflow runtime calls the four phases in order and loops on
//! `POLLING` itself:
//!
//! ```text
//! PAUSING ──► POLLING (until count == 0 and Disabled) ──► ROTATING ──► RESUMING
//! ```
//!
//! Pausing disables the ingestion event-source mappings so queued messages
//! wait in their queues. Creating a team token replaces the old one, so
//! rotation must only run once nothing in flight still holds the old token.

use crate::application::HandlerContext;
use crate::domain::config::{ConfigError, EngineConfig};
use crate::domain::credentials::SecretStoreError;
use crate::domain::errors::ProvisioningError;
use crate::domain::event_source::{EventSourceError, MappingState, UnknownMappingState};
use crate::domain::terraform::TerraformError;
use crate::domain::workflow_runtime::WorkflowRuntimeError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

const FUNCTION_NAME_VARIABLES: [&str; 3] = [
    "PROVISIONING_FUNCTION_NAME",
    "UPDATING_FUNCTION_NAME",
    "TERMINATING_FUNCTION_NAME",
];

const STATE_MACHINE_VARIABLES: [&str; 3] = [
    "PROVISIONING_STATE_MACHINE_ARN",
    "UPDATING_STATE_MACHINE_ARN",
    "TERMINATING_STATE_MACHINE_ARN",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RotationOperation {
    Pausing,
    Polling,
    Rotating,
    Resuming,
}

impl RotationOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pausing => "PAUSING",
            Self::Polling => "POLLING",
            Self::Rotating => "ROTATING",
            Self::Resuming => "RESUMING",
        }
    }
}

impl fmt::Display for RotationOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RotationOperation {
    type Err = RotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PAUSING" => Ok(Self::Pausing),
            "POLLING" => Ok(Self::Polling),
            "ROTATING" => Ok(Self::Rotating),
            "RESUMING" => Ok(Self::Resuming),
            other => Err(RotationError::UnknownOperation(other.to_string())),
        }
    }
}

/// Raw input; the operation is validated by [`RotationController::handle`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationRequest {
    pub operation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationOutput {
    pub state_machine_execution_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_source_mapping_status: Option<MappingState>,
}

#[derive(Debug, Error)]
pub enum RotationError {
    #[error("unknown rotation operation: {0}")]
    UnknownOperation(String),

    #[error(transparent)]
    UnknownMappingState(#[from] UnknownMappingState),

    #[error(transparent)]
    EventSource(#[from] EventSourceError),

    #[error(transparent)]
    WorkflowRuntime(#[from] WorkflowRuntimeError),

    #[error(transparent)]
    SecretStore(#[from] SecretStoreError),

    #[error(transparent)]
    Terraform(#[from] TerraformError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Terraform Cloud returned an empty team token for team {0}")]
    EmptyToken(String),

    #[error(transparent)]
    Workflow(#[from] ProvisioningError),
}

#[async_trait]
pub trait RotationController: Send + Sync {
    async fn pause(&self) -> Result<RotationOutput, RotationError>;

    async fn poll(&self) -> Result<RotationOutput, RotationError>;

    async fn rotate(&self) -> Result<RotationOutput, RotationError>;

    async fn resume(&self) -> Result<RotationOutput, RotationError>;

    async fn handle(&self, request: RotationRequest) -> Result<RotationOutput, RotationError> {
        let operation: RotationOperation = request.operation.parse()?;
        info!(operation = %operation, "Handling rotation phase");
        metrics::counter!("tfc_provisioner_rotation_phases_total", "operation" => operation.as_str()).increment(1);
        match operation {
            RotationOperation::Pausing => self.pause().await,
            RotationOperation::Polling => self.poll().await,
            RotationOperation::Rotating => self.rotate().await,
            RotationOperation::Resuming => self.resume().await,
        }
    }
}

pub struct StandardRotationController {
    ctx: HandlerContext,
}

impl StandardRotationController {
    pub fn new(ctx: HandlerContext) -> Self {
        Self { ctx }
    }

    fn ingestion_functions(&self) -> Result<Vec<&str>, ConfigError> {
        self.ctx
            .config
            .ingestion_functions
            .all()
            .into_iter()
            .zip(FUNCTION_NAME_VARIABLES)
            .map(|(value, name)| EngineConfig::require(value, name))
            .collect()
    }

    fn state_machines(&self) -> Result<Vec<&str>, ConfigError> {
        self.ctx
            .config
            .state_machines
            .all()
            .into_iter()
            .zip(STATE_MACHINE_VARIABLES)
            .map(|(value, name)| EngineConfig::require(value, name))
            .collect()
    }

    async fn set_ingestion_enabled(&self, enabled: bool) -> Result<(), RotationError> {
        for function_name in self.ingestion_functions()? {
            let mappings = self.ctx.event_sources.list_mappings(function_name).await?;
            if mappings.is_empty() {
                return Err(EventSourceError::NoMapping(function_name.to_string()).into());
            }
            for mapping in mappings {
                self.ctx.event_sources.set_enabled(&mapping.uuid, enabled).await?;
                info!(function = %function_name, uuid = %mapping.uuid, enabled, "Updated event source mapping");
            }
        }
        Ok(())
    }

    async fn mapping_states(&self) -> Result<Vec<MappingState>, RotationError> {
        let mut states = Vec::new();
        for function_name in self.ingestion_functions()? {
            let mappings = self.ctx.event_sources.list_mappings(function_name).await?;
            if mappings.is_empty() {
                return Err(EventSourceError::NoMapping(function_name.to_string()).into());
            }
            for mapping in mappings {
                let raw = self.ctx.event_sources.get_state(&mapping.uuid).await?;
                states.push(raw.parse::<MappingState>()?);
            }
        }
        Ok(states)
    }
}

#[async_trait]
impl RotationController for StandardRotationController {
    async fn pause(&self) -> Result<RotationOutput, RotationError> {
        self.ctx.cancellable(self.set_ingestion_enabled(false)).await?;
        Ok(RotationOutput::default())
    }

    async fn poll(&self) -> Result<RotationOutput, RotationError> {
        self.ctx
            .cancellable(async {
                let mut running = 0;
                for arn in self.state_machines()? {
                    running += self.ctx.workflow_runtime.count_running_executions(arn).await?;
                }

                let states = self.mapping_states().await?;
                let status = if states.iter().all(|s| *s == MappingState::Disabled) {
                    MappingState::Disabled
                } else {
                    MappingState::Disabling
                };

                info!(running, status = %status, "Polled rotation drain");
                Ok::<_, RotationError>(RotationOutput {
                    state_machine_execution_count: running,
                    event_source_mapping_status: Some(status),
                })
            })
            .await
    }

    async fn rotate(&self) -> Result<RotationOutput, RotationError> {
        let (team_id, team_token) = self
            .ctx
            .cancellable(async {
                let credentials = self.ctx.credentials.read().await?;
                let client = self.ctx.terraform.connect(&credentials, None).await?;
                let team_token = client.create_team_token(&credentials.team_id).await?;
                Ok::<_, RotationError>((credentials.team_id, team_token))
            })
            .await?;
        if team_token.token.is_empty() {
            return Err(RotationError::EmptyToken(team_id));
        }

        // Creating the token revoked the previous one, so the write runs to
        // completion even if the context is cancelled meanwhile.
        self.ctx.credentials.write_token(&team_token.token).await?;
        info!(team_id = %team_id, token_id = %team_token.id, "Rotated team token");
        metrics::counter!("tfc_provisioner_token_rotations_total").increment(1);
        Ok(RotationOutput::default())
    }

    async fn resume(&self) -> Result<RotationOutput, RotationError> {
        self.ctx.cancellable(self.set_ingestion_enabled(true)).await?;
        Ok(RotationOutput::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeEventSourceMappings, Harness, INGESTION_MAPPINGS, NEW_TEAM_TOKEN, STATE_MACHINES, TEAM_ID};

    fn request(operation: &str) -> RotationRequest {
        RotationRequest {
            operation: operation.to_string(),
        }
    }

    #[test]
    fn test_operation_names() {
        for op in ["PAUSING", "POLLING", "ROTATING", "RESUMING"] {
            assert_eq!(op.parse::<RotationOperation>().unwrap().to_string(), op);
        }
        assert!(matches!(
            "SPINNING".parse::<RotationOperation>(),
            Err(RotationError::UnknownOperation(op)) if op == "SPINNING"
        ));
    }

    #[tokio::test]
    async fn test_unknown_operation_is_rejected() {
        let harness = Harness::new();
        let controller = StandardRotationController::new(harness.context().await.unwrap());
        let err = controller.handle(request("rotate")).await.unwrap_err();
        assert!(matches!(err, RotationError::UnknownOperation(_)));
    }

    #[tokio::test]
    async fn test_poll_reports_disabling_until_all_settle() {
        let harness = Harness::with_event_sources(Harness::enabled_mappings().settling_slowly());
        let controller = StandardRotationController::new(harness.context().await.unwrap());

        controller.handle(request("PAUSING")).await.unwrap();
        let output = controller.handle(request("POLLING")).await.unwrap();
        assert_eq!(output.event_source_mapping_status, Some(MappingState::Disabling));

        harness.event_sources.settle();
        let output = controller.handle(request("POLLING")).await.unwrap();
        assert_eq!(output.event_source_mapping_status, Some(MappingState::Disabled));
        assert_eq!(output.state_machine_execution_count, 0);
    }

    #[tokio::test]
    async fn test_poll_sums_running_executions() {
        let harness = Harness::new();
        harness.workflow_runtime.set_running(STATE_MACHINES[0], 4);
        harness.workflow_runtime.set_running(STATE_MACHINES[2], 2);
        let controller = StandardRotationController::new(harness.context().await.unwrap());

        let output = controller.poll().await.unwrap();
        assert_eq!(output.state_machine_execution_count, 6);
        assert_eq!(output.event_source_mapping_status, Some(MappingState::Disabling));
    }

    #[tokio::test]
    async fn test_unknown_mapping_state_is_an_error() {
        let harness = Harness::new();
        harness.event_sources.set_state(INGESTION_MAPPINGS[1].1, "Exploded");
        let controller = StandardRotationController::new(harness.context().await.unwrap());

        let err = controller.poll().await.unwrap_err();
        assert!(err.to_string().contains("re-apply"));
    }

    #[tokio::test]
    async fn test_missing_mapping_is_an_error() {
        let harness = Harness::with_event_sources(FakeEventSourceMappings::new());
        let controller = StandardRotationController::new(harness.context().await.unwrap());

        let err = controller.pause().await.unwrap_err();
        assert!(matches!(err, RotationError::EventSource(EventSourceError::NoMapping(_))));
    }

    #[tokio::test]
    async fn test_rotate_persists_the_returned_token() {
        let harness = Harness::new();
        let controller = StandardRotationController::new(harness.context().await.unwrap());

        controller.rotate().await.unwrap();

        assert_eq!(harness.stored_token().as_deref(), Some(NEW_TEAM_TOKEN));
        assert_eq!(harness.terraform.team_token(TEAM_ID).as_deref(), Some(NEW_TEAM_TOKEN));
    }

    #[tokio::test]
    async fn test_rotate_with_rejected_token_fails() {
        let harness = Harness::new();
        harness.terraform_factory.reject_token(crate::testing::TOKEN);
        let controller = StandardRotationController::new(harness.context().await.unwrap());

        let err = controller.rotate().await.unwrap_err();
        assert!(matches!(err, RotationError::Terraform(TerraformError::AuthInvalid)));
        assert_eq!(harness.stored_token().as_deref(), Some(crate::testing::TOKEN));
    }

    #[tokio::test]
    async fn test_cancelled_rotation_keeps_the_current_token() {
        let harness = Harness::new();
        let ctx = harness.context().await.unwrap();
        ctx.cancellation.cancel();
        let controller = StandardRotationController::new(ctx);

        let err = controller.handle(request("ROTATING")).await.unwrap_err();
        assert!(matches!(err, RotationError::Workflow(ProvisioningError::Cancelled)));
        assert_eq!(harness.stored_token().as_deref(), Some(crate::testing::TOKEN));
        assert_eq!(harness.terraform.call_count("create_team_token"), 0);
    }

    #[tokio::test]
    async fn test_cancelled_pause_leaves_mappings_enabled() {
        let harness = Harness::new();
        let ctx = harness.context().await.unwrap();
        ctx.cancellation.cancel();
        let controller = StandardRotationController::new(ctx);

        let err = controller.handle(request("PAUSING")).await.unwrap_err();
        assert!(matches!(err, RotationError::Workflow(ProvisioningError::Cancelled)));
        for (_, uuid) in INGESTION_MAPPINGS {
            assert_eq!(harness.event_sources.state(uuid).as_deref(), Some("Enabled"));
        }
    }
}
