// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Test Harness
//!
//! In-process fakes for every port plus a [`Harness`] that wires them into
//! a [`HandlerContext`]. Used by the unit tests in this crate and by the
//! integration tests under `tests/`.
//!
//! # Usage
//!
//! ```ignore
//! let harness = Harness::new();
//! let workspace = harness.terraform.seed_workspace(ORGANIZATION, "123-pp-1");
//! let ctx = harness.context().await?;
//! ```

mod cloud;
mod terraform;

pub use cloud::{
    FakeEventSourceMappings, FakeRoleAssumer, FakeWorkflowRuntime, InMemoryObjectStore, InMemorySecretsBackend,
    RecordingCatalog, StartedExecution,
};
pub use terraform::{FakeTerraformClientFactory, FakeTerraformCloud, NEW_TEAM_TOKEN};

use crate::application::{HandlerContext, UploadPolling};
use crate::domain::config::{EngineConfig, PerOperation};
use crate::domain::credentials::SecretStoreError;
use crate::domain::event_source::MappingState;
use crate::infrastructure::artifact_downloader::ArtifactDownloader;
use crate::infrastructure::secrets::SecretStoreAdapter;
use crate::infrastructure::terraform_config::HclConfigurationParser;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const ORGANIZATION: &str = "tfc-provisioner-test";
pub const CREDENTIALS_SECRET_ID: &str = "tfc-provisioner/credentials";
pub const HOSTNAME: &str = "app.terraform.io";
pub const TEAM_ID: &str = "team-roLYatraNNailuJ2";
pub const TOKEN: &str = "supers3cret";
pub const REGION: &str = "us-east-1";
pub const INGRESS_STATE_MACHINE_ARN: &str = "arn:aws:states:us-east-1:123456789042:stateMachine:TerraformProvisioning";

/// Ingestion function name and mapping uuid per operation.
pub const INGESTION_MAPPINGS: [(&str, &str); 3] = [
    ("provisioning-ingress", "esm-provisioning"),
    ("updating-ingress", "esm-updating"),
    ("terminating-ingress", "esm-terminating"),
];

pub const STATE_MACHINES: [&str; 3] = [
    "arn:aws:states:us-east-1:123456789042:stateMachine:Provisioning",
    "arn:aws:states:us-east-1:123456789042:stateMachine:Updating",
    "arn:aws:states:us-east-1:123456789042:stateMachine:Terminating",
];

/// Build a tar+gzip archive holding `files` in order.
pub fn build_archive(files: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        builder
            .append_data(&mut header, name, *data)
            .expect("appending to an in-memory archive cannot fail");
    }
    builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .expect("finishing an in-memory archive cannot fail")
}

pub fn credentials_json(token: &str) -> String {
    serde_json::json!({ "hostname": HOSTNAME, "team_id": TEAM_ID, "token": token }).to_string()
}

pub fn test_config() -> EngineConfig {
    EngineConfig {
        credentials_secret_id: CREDENTIALS_SECRET_ID.to_string(),
        terraform_organization: ORGANIZATION.to_string(),
        state_machine_arn: INGRESS_STATE_MACHINE_ARN.to_string(),
        state_machines: PerOperation {
            provisioning: STATE_MACHINES[0].to_string(),
            updating: STATE_MACHINES[1].to_string(),
            terminating: STATE_MACHINES[2].to_string(),
        },
        ingestion_functions: PerOperation {
            provisioning: INGESTION_MAPPINGS[0].0.to_string(),
            updating: INGESTION_MAPPINGS[1].0.to_string(),
            terminating: INGESTION_MAPPINGS[2].0.to_string(),
        },
        region: REGION.to_string(),
        ..EngineConfig::default()
    }
}

pub struct Harness {
    pub config: EngineConfig,
    pub terraform: Arc<FakeTerraformCloud>,
    pub terraform_factory: Arc<FakeTerraformClientFactory>,
    pub secrets: Arc<InMemorySecretsBackend>,
    pub object_store: Arc<InMemoryObjectStore>,
    pub roles: Arc<FakeRoleAssumer>,
    pub workflow_runtime: Arc<FakeWorkflowRuntime>,
    pub event_sources: Arc<FakeEventSourceMappings>,
    pub catalog: Arc<RecordingCatalog>,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    /// Credentials seeded, ingestion mappings enabled, no running executions.
    pub fn new() -> Self {
        Self::with_event_sources(Self::enabled_mappings())
    }

    pub fn enabled_mappings() -> FakeEventSourceMappings {
        INGESTION_MAPPINGS
            .iter()
            .fold(FakeEventSourceMappings::new(), |mappings, (function, uuid)| {
                mappings.with_mapping(function, uuid, MappingState::Enabled)
            })
    }

    pub fn with_event_sources(event_sources: FakeEventSourceMappings) -> Self {
        let terraform = Arc::new(FakeTerraformCloud::new());
        terraform.set_team_token(TEAM_ID, TOKEN);

        let workflow_runtime = Arc::new(FakeWorkflowRuntime::new());
        for arn in STATE_MACHINES {
            workflow_runtime.set_running(arn, 0);
        }

        Self {
            config: test_config(),
            terraform_factory: Arc::new(FakeTerraformClientFactory::new(terraform.clone())),
            terraform,
            secrets: Arc::new(InMemorySecretsBackend::new().with_secret(CREDENTIALS_SECRET_ID, &credentials_json(TOKEN))),
            object_store: Arc::new(InMemoryObjectStore::new()),
            roles: Arc::new(FakeRoleAssumer::new()),
            workflow_runtime,
            event_sources: Arc::new(event_sources),
            catalog: Arc::new(RecordingCatalog::new()),
        }
    }

    /// Stored token of the credentials record.
    pub fn stored_token(&self) -> Option<String> {
        let raw = self.secrets.secret(CREDENTIALS_SECRET_ID)?;
        let value: serde_json::Value = serde_json::from_str(&raw).ok()?;
        value.get("token")?.as_str().map(str::to_string)
    }

    /// Context over the fakes. Upload confirmation is polled without delay.
    pub async fn context(&self) -> Result<HandlerContext, SecretStoreError> {
        let credentials = SecretStoreAdapter::new(self.secrets.clone(), CREDENTIALS_SECRET_ID).await?;

        Ok(HandlerContext {
            config: Arc::new(self.config.clone()),
            credentials: Arc::new(credentials),
            terraform: self.terraform_factory.clone(),
            downloader: Arc::new(ArtifactDownloader::new(self.object_store.clone(), self.roles.clone())),
            catalog: self.catalog.clone(),
            workflow_runtime: self.workflow_runtime.clone(),
            event_sources: self.event_sources.clone(),
            parser: Arc::new(HclConfigurationParser::new()),
            upload_polling: UploadPolling {
                interval: Duration::ZERO,
                max_checks: 120,
            },
            cancellation: CancellationToken::new(),
        })
    }
}
