// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Terraform Cloud Port (Anti-Corruption Layer)
//!
//! Typed view of the remote Terraform platform: projects, workspaces,
//! variables, configuration versions, runs, applies, state versions and
//! team tokens. The HTTP implementation lives in
//! `crate::infrastructure::terraform_cloud`; an in-process fake lives in
//! `crate::testing`.
//!
//! Clients are created per handler invocation through a
//! [`TerraformClientFactory`] so a rotated team token is picked up without a
//! restart.

use crate::domain::credentials::TfeCredentials;
use crate::domain::run_status::RunStatus;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// Page size used for every list call.
pub const PAGE_SIZE: u32 = 100;

pub const AUTH_INVALID_GUIDANCE: &str = "Terraform Cloud rejected the team token as unauthorized. \
Rotate the token using the credential rotation state machine (see the engine README, \"Rotating the Terraform Cloud team token\"), then retry the operation.";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TerraformError {
    #[error("{}", AUTH_INVALID_GUIDANCE)]
    AuthInvalid,

    #[error("request to Terraform Cloud failed. cause: resource not found: {0}")]
    NotFound(String),

    #[error("request to Terraform Cloud failed. cause: {0}")]
    Request(String),
}

impl TerraformError {
    /// Shared mapper for transport failures.
    pub fn from_transport(cause: impl Into<String>) -> Self {
        let cause = cause.into();
        if cause.trim() == "unauthorized" {
            Self::AuthInvalid
        } else {
            Self::Request(cause)
        }
    }
}

/// Catalog metadata sent as headers on writes made for a provisioned product.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductMetadata {
    pub product_id: String,
    pub provisioned_product_id: String,
    pub product_version: String,
}

impl ProductMetadata {
    pub const PRODUCT_ID_HEADER: &'static str = "Tfp-Aws-Service-Catalog-Product-Id";
    pub const PROVISIONED_PRODUCT_ID_HEADER: &'static str = "Tfp-Aws-Service-Catalog-Prv-Product-Id";
    pub const PRODUCT_VERSION_HEADER: &'static str = "Tfp-Aws-Service-Catalog-Product-Ver";

    pub fn headers(&self) -> [(&'static str, &str); 3] {
        [
            (Self::PRODUCT_ID_HEADER, self.product_id.as_str()),
            (Self::PROVISIONED_PRODUCT_ID_HEADER, self.provisioned_product_id.as_str()),
            (Self::PRODUCT_VERSION_HEADER, self.product_version.as_str()),
        ]
    }
}

// ============================================================================
// Resources
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    pub name: String,
    pub project_id: Option<String>,
    pub terraform_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceCreateOptions {
    pub name: String,
    pub project_id: String,
    pub terraform_version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableCategory {
    Env,
    Terraform,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub id: String,
    pub key: String,
    pub value: String,
    pub category: VariableCategory,
    pub hcl: bool,
    pub sensitive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableOptions {
    pub key: String,
    pub value: String,
    pub category: VariableCategory,
    pub hcl: bool,
    pub sensitive: bool,
}

impl VariableOptions {
    /// Plain (non-HCL, non-sensitive) variable.
    pub fn plain(key: impl Into<String>, value: impl Into<String>, category: VariableCategory) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            category,
            hcl: false,
            sensitive: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigurationStatus {
    Pending,
    Fetching,
    Uploaded,
    Archived,
    Errored,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationVersion {
    pub id: String,
    pub status: ConfigurationStatus,
    pub upload_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub id: String,
    pub status: RunStatus,
    pub workspace_id: Option<String>,
    pub apply_id: Option<String>,
    pub is_destroy: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunCreateOptions {
    pub workspace_id: String,
    pub configuration_version_id: Option<String>,
    pub is_destroy: bool,
    pub auto_apply: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Apply {
    pub id: String,
    pub status: String,
    pub state_version_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateVersion {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateVersionOutput {
    pub id: String,
    pub name: String,
    pub value: serde_json::Value,
    pub sensitive: bool,
    pub output_type: String,
}

#[derive(Clone, PartialEq, Eq)]
pub struct TeamToken {
    pub id: String,
    pub token: String,
}

impl std::fmt::Debug for TeamToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeamToken").field("id", &self.id).finish_non_exhaustive()
    }
}

// ============================================================================
// Pagination
// ============================================================================

/// One-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub number: u32,
    pub size: u32,
}

impl PageRequest {
    pub fn new(number: u32) -> Self {
        Self { number, size: PAGE_SIZE }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total_count: u64) -> Self {
        Self { items, total_count }
    }

    /// True while `total_count` exceeds everything up to and including `request`.
    pub fn has_more(&self, request: PageRequest) -> bool {
        !self.items.is_empty() && self.total_count > u64::from(request.number) * u64::from(request.size)
    }
}

/// Lazily enumerate every item of a paginated list endpoint.
///
/// Pages are only fetched as the stream is polled; the sequence ends once
/// `total_count <= page * PAGE_SIZE`.
pub fn paginate<'a, T, F, Fut>(fetch: F) -> BoxStream<'a, Result<T, TerraformError>>
where
    T: Send + 'a,
    F: FnMut(PageRequest) -> Fut + Send + 'a,
    Fut: Future<Output = Result<Page<T>, TerraformError>> + Send + 'a,
{
    stream::try_unfold((fetch, Some(PageRequest::new(1))), |(mut fetch, next)| async move {
        let Some(request) = next else {
            return Ok(None);
        };
        let page = fetch(request).await?;
        let next = page.has_more(request).then(|| PageRequest::new(request.number + 1));
        Ok::<_, TerraformError>(Some((page.items, (fetch, next))))
    })
    .map_ok(|items| stream::iter(items.into_iter().map(Ok)))
    .try_flatten()
    .boxed()
}

// ============================================================================
// Ports
// ============================================================================

#[async_trait]
pub trait TerraformCloud: Send + Sync {
    async fn list_projects(&self, organization: &str, name: &str, page: PageRequest) -> Result<Page<Project>, TerraformError>;

    async fn create_project(&self, organization: &str, name: &str) -> Result<Project, TerraformError>;

    /// List workspaces whose name contains `search`.
    async fn list_workspaces(&self, organization: &str, search: &str, page: PageRequest) -> Result<Page<Workspace>, TerraformError>;

    async fn read_workspace(&self, organization: &str, name: &str) -> Result<Workspace, TerraformError>;

    async fn create_workspace(&self, organization: &str, options: WorkspaceCreateOptions) -> Result<Workspace, TerraformError>;

    async fn update_workspace_terraform_version(&self, workspace_id: &str, version: &str) -> Result<Workspace, TerraformError>;

    async fn delete_workspace(&self, organization: &str, name: &str) -> Result<(), TerraformError>;

    async fn list_variables(&self, workspace_id: &str, page: PageRequest) -> Result<Page<Variable>, TerraformError>;

    async fn create_variable(&self, workspace_id: &str, options: VariableOptions) -> Result<Variable, TerraformError>;

    async fn update_variable(&self, workspace_id: &str, variable_id: &str, options: VariableOptions) -> Result<Variable, TerraformError>;

    async fn delete_variable(&self, workspace_id: &str, variable_id: &str) -> Result<(), TerraformError>;

    async fn create_configuration_version(&self, workspace_id: &str, auto_queue_runs: bool) -> Result<ConfigurationVersion, TerraformError>;

    async fn read_configuration_version(&self, id: &str) -> Result<ConfigurationVersion, TerraformError>;

    async fn upload_configuration(&self, upload_url: &str, archive: Bytes) -> Result<(), TerraformError>;

    async fn create_run(&self, options: RunCreateOptions) -> Result<Run, TerraformError>;

    async fn read_run(&self, run_id: &str) -> Result<Run, TerraformError>;

    async fn read_apply(&self, apply_id: &str) -> Result<Apply, TerraformError>;

    /// Current state version of a workspace, `None` if it has never had one.
    async fn read_current_state_version(&self, workspace_id: &str) -> Result<Option<StateVersion>, TerraformError>;

    async fn list_state_version_outputs(&self, state_version_id: &str, page: PageRequest) -> Result<Page<StateVersionOutput>, TerraformError>;

    /// Create a team token, replacing any existing one.
    async fn create_team_token(&self, team_id: &str) -> Result<TeamToken, TerraformError>;
}

/// Builds a client from the current credentials record.
#[async_trait]
pub trait TerraformClientFactory: Send + Sync {
    async fn connect(
        &self,
        credentials: &TfeCredentials,
        metadata: Option<ProductMetadata>,
    ) -> Result<Arc<dyn TerraformCloud>, TerraformError>;
}
