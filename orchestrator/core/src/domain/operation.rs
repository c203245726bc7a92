// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Provisioning Operations
//!
//! Wire and domain model for the lifecycle events the product catalog emits
//! for a provisioned product, and for the payloads the workflow runtime
//! carries between stages.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Operation request, stage inputs/outputs, identity helpers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Object-store tag every product artifact must carry.
pub const ARTIFACT_TYPE_OBJECT_STORE: &str = "AWS_S3";

/// Lifecycle operation requested by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceCatalogOperation {
    #[serde(rename = "PROVISION_PRODUCT", alias = "PROVISIONING")]
    Provision,
    #[serde(rename = "UPDATE_PROVISIONED_PRODUCT", alias = "UPDATING")]
    Update,
    #[serde(rename = "TERMINATE_PROVISIONED_PRODUCT", alias = "TERMINATING")]
    Terminate,
}

impl ServiceCatalogOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Provision => "PROVISION_PRODUCT",
            Self::Update => "UPDATE_PROVISIONED_PRODUCT",
            Self::Terminate => "TERMINATE_PROVISIONED_PRODUCT",
        }
    }
}

impl fmt::Display for ServiceCatalogOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceCatalogOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PROVISION_PRODUCT" | "PROVISIONING" => Ok(Self::Provision),
            "UPDATE_PROVISIONED_PRODUCT" | "UPDATING" => Ok(Self::Update),
            "TERMINATE_PROVISIONED_PRODUCT" | "TERMINATING" => Ok(Self::Terminate),
            other => Err(format!("unknown service catalog operation: {}", other)),
        }
    }
}

/// A single (key, value) pair. Used for tags, parameters and the tracer tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Caller identity attached to every catalog operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(default)]
    pub principal: String,
    pub aws_account_id: String,
    #[serde(default)]
    pub organization_id: String,
}

/// Reference to a product-configuration archive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(default)]
    pub path: String,
    #[serde(rename = "type", default)]
    pub artifact_type: String,
}

/// Operation request received by the ingress dispatcher and handed to the
/// apply stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningRequest {
    pub token: String,
    pub operation: ServiceCatalogOperation,
    pub product_id: String,
    pub provisioned_product_id: String,
    #[serde(default)]
    pub provisioned_product_name: String,
    #[serde(default)]
    pub provisioning_artifact_id: String,
    pub record_id: String,
    #[serde(default)]
    pub launch_role_arn: String,
    pub identity: Identity,
    pub tracer_tag: KeyValue,
    pub artifact: Artifact,
    #[serde(default)]
    pub tags: Vec<KeyValue>,
    #[serde(default)]
    pub parameters: Vec<KeyValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terraform_organization: Option<String>,
}

impl ProvisioningRequest {
    /// Name of the workflow execution started for this request.
    pub fn execution_name(&self) -> String {
        execution_name(&self.provisioned_product_id, &self.record_id)
    }

    pub fn workspace_name(&self) -> String {
        workspace_name(&self.identity.aws_account_id, &self.provisioned_product_id)
    }
}

/// Remote workspace name for a provisioned product.
pub fn workspace_name(aws_account_id: &str, provisioned_product_id: &str) -> String {
    format!("{}-{}", aws_account_id, provisioned_product_id)
}

/// Workflow execution name for one catalog operation.
pub fn execution_name(provisioned_product_id: &str, record_id: &str) -> String {
    format!("{}-{}", provisioned_product_id, record_id)
}

/// Output of the apply and destroy stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReference {
    pub terraform_run_id: String,
}

/// Input of the destroy stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestroyRequest {
    pub aws_account_id: String,
    pub terraform_organization: String,
    pub provisioned_product_id: String,
}

/// Input of the result stage.
///
/// `error` carries the workflow-runtime error name (e.g. `States.Timeout`),
/// `error_message` the failure cause produced by an earlier stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRequest {
    #[serde(default)]
    pub terraform_run_id: String,
    pub workflow_token: String,
    pub record_id: String,
    #[serde(default)]
    pub tracer_tag: Option<KeyValue>,
    pub service_catalog_operation: ServiceCatalogOperation,
    pub aws_account_id: String,
    pub terraform_organization: String,
    pub provisioned_product_id: String,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub error_message: String,
}

impl ResultRequest {
    pub fn has_error(&self) -> bool {
        !self.error.is_empty() || !self.error_message.is_empty()
    }

    pub fn workspace_name(&self) -> String {
        workspace_name(&self.aws_account_id, &self.provisioned_product_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_message() -> serde_json::Value {
        serde_json::json!({
            "token": "wf-token",
            "operation": "PROVISION_PRODUCT",
            "productId": "prod-abc",
            "provisionedProductId": "pp-123",
            "provisionedProductName": "my-instance",
            "provisioningArtifactId": "pa-1",
            "recordId": "rec-9",
            "launchRoleArn": "arn:aws:iam::123456789042:role/launch",
            "identity": {"principal": "me", "awsAccountId": "123456789042", "organizationId": "o-1"},
            "tracerTag": {"key": "tracer", "value": "t-1"},
            "artifact": {"path": "s3://bucket/key.tar.gz", "type": "AWS_S3"},
            "tags": [{"key": "cost-center", "value": "42"}],
            "parameters": [{"key": "size", "value": "small"}]
        })
    }

    #[test]
    fn test_request_deserializes_from_catalog_message() {
        let request: ProvisioningRequest = serde_json::from_value(sample_message()).unwrap();
        assert_eq!(request.operation, ServiceCatalogOperation::Provision);
        assert_eq!(request.identity.aws_account_id, "123456789042");
        assert_eq!(request.parameters[0], KeyValue::new("size", "small"));
        assert!(request.terraform_organization.is_none());
    }

    #[test]
    fn test_identity_helpers() {
        let request: ProvisioningRequest = serde_json::from_value(sample_message()).unwrap();
        assert_eq!(request.workspace_name(), "123456789042-pp-123");
        assert_eq!(request.execution_name(), "pp-123-rec-9");
    }

    #[test]
    fn test_operation_accepts_state_machine_names() {
        let op: ServiceCatalogOperation = serde_json::from_str("\"TERMINATING\"").unwrap();
        assert_eq!(op, ServiceCatalogOperation::Terminate);
        assert_eq!("UPDATING".parse::<ServiceCatalogOperation>().unwrap(), ServiceCatalogOperation::Update);
        assert!("REBOOT".parse::<ServiceCatalogOperation>().is_err());
    }

    #[test]
    fn test_result_request_error_detection() {
        let mut request = ResultRequest {
            terraform_run_id: "run-1".into(),
            workflow_token: "t".into(),
            record_id: "r".into(),
            tracer_tag: None,
            service_catalog_operation: ServiceCatalogOperation::Terminate,
            aws_account_id: "1".into(),
            terraform_organization: "org".into(),
            provisioned_product_id: "pp".into(),
            error: String::new(),
            error_message: String::new(),
        };
        assert!(!request.has_error());
        request.error = "States.Timeout".into();
        assert!(request.has_error());
    }
}
