// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Application layer: one use case per workflow stage, plus the credential
//! rotation controller.
//!
//! Every use case is stateless between invocations. Shared collaborators are
//! bundled in [`HandlerContext`], which is cheap to clone.

pub mod apply;
pub mod destroy;
pub mod ingress;
pub mod outputs;
pub mod parameter_parser;
pub mod poll;
pub mod result;
pub mod rotation;

pub use apply::{ApplyStageUseCase, StandardApplyStageUseCase};
pub use destroy::{DestroyStageUseCase, StandardDestroyStageUseCase};
pub use ingress::{IngressUseCase, StandardIngressUseCase};
pub use parameter_parser::{ParameterParserUseCase, StandardParameterParserUseCase};
pub use poll::{PollStageUseCase, StandardPollStageUseCase};
pub use result::{ResultStageUseCase, StandardResultStageUseCase};
pub use rotation::{RotationController, StandardRotationController};

use crate::domain::catalog::CatalogNotifier;
use crate::domain::config::EngineConfig;
use crate::domain::credentials::CredentialsStore;
use crate::domain::errors::ProvisioningError;
use crate::domain::event_source::EventSourceMappings;
use crate::domain::parameters::ConfigurationParser;
use crate::domain::terraform::{ProductMetadata, TerraformClientFactory, TerraformCloud};
use crate::domain::workflow_runtime::WorkflowRuntime;
use crate::infrastructure::artifact_downloader::ArtifactDownloader;
use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How the apply stage waits for an uploaded configuration version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPolling {
    pub interval: Duration,
    pub max_checks: u32,
}

impl Default for UploadPolling {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_checks: 120,
        }
    }
}

#[derive(Clone)]
pub struct HandlerContext {
    pub config: Arc<EngineConfig>,
    pub credentials: Arc<dyn CredentialsStore>,
    pub terraform: Arc<dyn TerraformClientFactory>,
    pub downloader: Arc<ArtifactDownloader>,
    pub catalog: Arc<dyn CatalogNotifier>,
    pub workflow_runtime: Arc<dyn WorkflowRuntime>,
    pub event_sources: Arc<dyn EventSourceMappings>,
    pub parser: Arc<dyn ConfigurationParser>,
    pub upload_polling: UploadPolling,
    pub cancellation: CancellationToken,
}

impl HandlerContext {
    pub fn with_upload_polling(mut self, upload_polling: UploadPolling) -> Self {
        self.upload_polling = upload_polling;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Build a Terraform Cloud client from the credentials record as it is
    /// right now, so a rotated token is always picked up.
    pub async fn terraform_client(&self, metadata: Option<ProductMetadata>) -> Result<Arc<dyn TerraformCloud>> {
        let credentials = self
            .credentials
            .read()
            .await
            .context("Failed to read Terraform Cloud credentials")?;
        let client = self
            .terraform
            .connect(&credentials, metadata)
            .await
            .context("Failed to create Terraform Cloud client")?;
        Ok(client)
    }

    /// Run `stage` until it finishes or the context is cancelled.
    ///
    /// Dropping `stage` on cancellation drops whatever outbound call it is
    /// awaiting. An already-cancelled context never polls `stage`.
    pub async fn cancellable<T, E, F>(&self, stage: F) -> std::result::Result<T, E>
    where
        F: Future<Output = std::result::Result<T, E>>,
        E: From<ProvisioningError>,
    {
        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(ProvisioningError::Cancelled.into()),
            result = stage => result,
        }
    }
}
