// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Result Stage Use Case
//!
//! The only stage that calls back to the product catalog.
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Responsibility:** Turn the workflow's final state into one catalog
//!   notification, deleting the workspace after a clean terminate
//! - **Collaborators:**
//!   - Domain: ResultRequest, failure reasons, CatalogNotifier
//!   - Application: output collection
//!
//! Output-fetch failures are reported to the catalog, not to the workflow
//! runtime. A failing catalog call is logged and returned without retry.

use crate::application::outputs::collect_outputs;
use crate::application::HandlerContext;
use crate::domain::catalog::{EngineWorkflowStatus, RecordOutput, ResourceIdentifier, WorkflowResult};
use crate::domain::failure_reason::{format_failure_reason, truncate};
use crate::domain::operation::{ResultRequest, ServiceCatalogOperation};
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{error, info, warn};
use uuid::Uuid;

const OUTPUT_FETCH_GUIDANCE: &str = "Update the provisioned product to retry.";

#[async_trait]
pub trait ResultStageUseCase: Send + Sync {
    async fn notify(&self, request: ResultRequest) -> Result<()>;
}

pub struct StandardResultStageUseCase {
    ctx: HandlerContext,
}

impl StandardResultStageUseCase {
    pub fn new(ctx: HandlerContext) -> Self {
        Self { ctx }
    }

    async fn run(&self, request: ResultRequest) -> Result<()> {
        let mut failure_reason = request
            .has_error()
            .then(|| format_failure_reason(&request.error, &request.error_message));

        let workspace_name = request.workspace_name();
        let mut outputs: Vec<RecordOutput> = Vec::new();

        match request.service_catalog_operation {
            ServiceCatalogOperation::Terminate => {
                if failure_reason.is_none() {
                    if let Err(err) = self.delete_workspace(&request, &workspace_name).await {
                        warn!(workspace = %workspace_name, error = %format!("{:#}", err), "Workspace deletion failed");
                        failure_reason = Some(format_failure_reason("", &format!("{:#}", err)));
                    }
                }
            }
            ServiceCatalogOperation::Provision | ServiceCatalogOperation::Update => {
                if failure_reason.is_none() {
                    match self.fetch_outputs(&request, &workspace_name).await {
                        Ok(collected) => outputs = collected,
                        Err(err) => {
                            warn!(run_id = %request.terraform_run_id, error = %format!("{:#}", err), "Output collection failed");
                            failure_reason = Some(truncate(format!(
                                "Failed to fetch run outputs. {:#}. {}",
                                err, OUTPUT_FETCH_GUIDANCE
                            )));
                        }
                    }
                }
            }
        }

        let status = if failure_reason.is_some() {
            EngineWorkflowStatus::Failed
        } else {
            EngineWorkflowStatus::Succeeded
        };

        let result = WorkflowResult {
            workflow_token: request.workflow_token.clone(),
            record_id: request.record_id.clone(),
            status,
            failure_reason,
            idempotency_token: Uuid::new_v4().to_string(),
            outputs,
            resource_identifier: request.tracer_tag.clone().map(|unique_tag| ResourceIdentifier { unique_tag }),
        };

        let operation = request.service_catalog_operation;
        let notified = match operation {
            ServiceCatalogOperation::Provision => self.ctx.catalog.notify_provision_result(result).await,
            ServiceCatalogOperation::Update => self.ctx.catalog.notify_update_result(result).await,
            ServiceCatalogOperation::Terminate => self.ctx.catalog.notify_terminate_result(result).await,
        };

        let status_label = match status {
            EngineWorkflowStatus::Succeeded => "succeeded",
            EngineWorkflowStatus::Failed => "failed",
        };

        if let Err(err) = notified {
            error!(record_id = %request.record_id, operation = %operation, error = %err, "Catalog notification failed");
            metrics::counter!("tfc_provisioner_catalog_notification_errors_total", "operation" => operation.as_str())
                .increment(1);
            return Err(err).context("Failed to notify the product catalog");
        }

        info!(record_id = %request.record_id, operation = %operation, status = status_label, "Notified catalog");
        metrics::counter!(
            "tfc_provisioner_results_total",
            "operation" => operation.as_str(),
            "status" => status_label
        )
        .increment(1);
        Ok(())
    }

    async fn delete_workspace(&self, request: &ResultRequest, workspace_name: &str) -> Result<()> {
        let client = self.ctx.terraform_client(None).await?;
        client
            .delete_workspace(&request.terraform_organization, workspace_name)
            .await
            .with_context(|| format!("Failed to delete workspace {}", workspace_name))?;
        info!(workspace = %workspace_name, "Deleted workspace");
        Ok(())
    }

    async fn fetch_outputs(&self, request: &ResultRequest, workspace_name: &str) -> Result<Vec<RecordOutput>> {
        let client = self.ctx.terraform_client(None).await?;
        collect_outputs(
            &client,
            &request.terraform_organization,
            workspace_name,
            &request.terraform_run_id,
        )
        .await
    }
}

#[async_trait]
impl ResultStageUseCase for StandardResultStageUseCase {
    async fn notify(&self, request: ResultRequest) -> Result<()> {
        self.ctx.cancellable(self.run(request)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::MAX_FAILURE_REASON_LEN;
    use crate::domain::failure_reason::TIMEOUT_MESSAGE;
    use crate::domain::operation::KeyValue;
    use crate::domain::run_status::RunStatus;
    use crate::domain::terraform::TerraformError;
    use crate::testing::{Harness, ORGANIZATION};

    const WORKSPACE: &str = "123456789042-pp-1";

    fn request(operation: ServiceCatalogOperation) -> ResultRequest {
        ResultRequest {
            terraform_run_id: "run-1".into(),
            workflow_token: "wf-token".into(),
            record_id: "rec-1".into(),
            tracer_tag: Some(KeyValue::new("tfp:tracer", "trace-1")),
            service_catalog_operation: operation,
            aws_account_id: "123456789042".into(),
            terraform_organization: ORGANIZATION.into(),
            provisioned_product_id: "pp-1".into(),
            error: String::new(),
            error_message: String::new(),
        }
    }

    #[tokio::test]
    async fn test_update_success_uses_update_endpoint() {
        let harness = Harness::new();
        let workspace = harness.terraform.seed_workspace(ORGANIZATION, WORKSPACE);
        harness
            .terraform
            .seed_run("run-1", &workspace.id, RunStatus::Applied, Some("apply-1"));
        harness.terraform.seed_apply("apply-1", &["sv-1"]);
        harness.terraform.seed_outputs("sv-1", [("endpoint", "https://example.com")]);

        let use_case = StandardResultStageUseCase::new(harness.context().await.unwrap());
        use_case.notify(request(ServiceCatalogOperation::Update)).await.unwrap();

        let (operation, result) = harness.catalog.last().unwrap();
        assert_eq!(operation, ServiceCatalogOperation::Update);
        assert_eq!(result.status, EngineWorkflowStatus::Succeeded);
        assert_eq!(result.outputs[0].output_value, "https://example.com");
        assert_eq!(result.resource_identifier.unwrap().unique_tag.value, "trace-1");
        assert!(Uuid::parse_str(&result.idempotency_token).is_ok());
    }

    #[tokio::test]
    async fn test_timeout_error_reports_fixed_message() {
        let harness = Harness::new();
        let mut input = request(ServiceCatalogOperation::Provision);
        input.error = "States.Timeout".into();
        input.error_message = "Task timed out after 900 seconds".into();

        let use_case = StandardResultStageUseCase::new(harness.context().await.unwrap());
        use_case.notify(input).await.unwrap();

        let (_, result) = harness.catalog.last().unwrap();
        assert_eq!(result.status, EngineWorkflowStatus::Failed);
        assert_eq!(result.failure_reason.as_deref(), Some(TIMEOUT_MESSAGE));
        assert!(result.outputs.is_empty());
        assert_eq!(harness.terraform.call_count("read_run"), 0);
    }

    #[tokio::test]
    async fn test_long_errors_are_truncated() {
        let harness = Harness::new();
        let mut input = request(ServiceCatalogOperation::Provision);
        input.error_message = "x".repeat(5000);

        let use_case = StandardResultStageUseCase::new(harness.context().await.unwrap());
        use_case.notify(input).await.unwrap();

        let reason = harness.catalog.last().unwrap().1.failure_reason.unwrap();
        assert_eq!(reason.chars().count(), MAX_FAILURE_REASON_LEN);
        assert!(reason.ends_with("..."));
    }

    #[tokio::test]
    async fn test_deletion_failure_becomes_the_failure_reason() {
        let harness = Harness::new();
        harness.terraform.seed_workspace(ORGANIZATION, WORKSPACE);
        harness
            .terraform
            .fail_on("delete_workspace", TerraformError::Request("HTTP 409: workspace is locked".into()));

        let use_case = StandardResultStageUseCase::new(harness.context().await.unwrap());
        use_case.notify(request(ServiceCatalogOperation::Terminate)).await.unwrap();

        let (operation, result) = harness.catalog.last().unwrap();
        assert_eq!(operation, ServiceCatalogOperation::Terminate);
        assert_eq!(result.status, EngineWorkflowStatus::Failed);
        assert!(result.failure_reason.unwrap().contains("workspace is locked"));
        assert!(harness.terraform.workspace(ORGANIZATION, WORKSPACE).is_some());
    }

    #[tokio::test]
    async fn test_catalog_failure_is_returned() {
        let harness = Harness::new();
        harness.terraform.seed_workspace(ORGANIZATION, WORKSPACE);
        harness.catalog.fail_with("throttled");

        let use_case = StandardResultStageUseCase::new(harness.context().await.unwrap());
        let err = use_case
            .notify(request(ServiceCatalogOperation::Terminate))
            .await
            .unwrap_err();

        assert!(format!("{:#}", err).contains("throttled"));
        assert_eq!(harness.catalog.notifications().len(), 1);
    }
}
