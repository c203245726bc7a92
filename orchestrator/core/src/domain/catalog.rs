// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Product Catalog Callback Port
//!
//! The catalog exposes one result endpoint per lifecycle operation. The
//! result stage is the only caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length of a failure reason accepted by the catalog.
pub const MAX_FAILURE_REASON_LEN: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineWorkflowStatus {
    Succeeded,
    Failed,
}

/// A single Terraform output surfaced on the catalog record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecordOutput {
    pub output_key: String,
    pub output_value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Payload common to the three result endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowResult {
    pub workflow_token: String,
    pub record_id: String,
    pub status: EngineWorkflowStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub idempotency_token: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<RecordOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_identifier: Option<ResourceIdentifier>,
}

/// Identifies the remote resource backing the provisioned product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceIdentifier {
    pub unique_tag: crate::domain::operation::KeyValue,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog rejected the workflow result: {0}")]
    Rejected(String),

    #[error("catalog request failed: {0}")]
    Backend(String),
}

#[async_trait]
pub trait CatalogNotifier: Send + Sync {
    async fn notify_provision_result(&self, result: WorkflowResult) -> Result<(), CatalogError>;

    async fn notify_update_result(&self, result: WorkflowResult) -> Result<(), CatalogError>;

    async fn notify_terminate_result(&self, result: WorkflowResult) -> Result<(), CatalogError>;
}
