// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the result stage
//!
//! These tests drive `StandardResultStageUseCase` against the in-process
//! Terraform Cloud fake and a recording catalog:
//! 1. Terminate with and without an upstream error
//! 2. Provision with outputs, without apply data, and with paginated outputs

use serde_json::Value;
use tfc_provisioner_core::application::{ResultStageUseCase, StandardResultStageUseCase};
use tfc_provisioner_core::domain::catalog::EngineWorkflowStatus;
use tfc_provisioner_core::domain::operation::{KeyValue, ResultRequest, ServiceCatalogOperation};
use tfc_provisioner_core::domain::run_status::RunStatus;
use tfc_provisioner_core::testing::{Harness, ORGANIZATION};

const ACCOUNT_ID: &str = "123456789042";
const PROVISIONED_PRODUCT_ID: &str = "amazingly-great-product-instance";
const WORKSPACE_NAME: &str = "123456789042-amazingly-great-product-instance";
const RUN_ID: &str = "run-forrest-run";
const APPLY_ID: &str = "apply-ran-ed";
const WORKFLOW_TOKEN: &str = "workflow-token-1234";

fn result_request(operation: ServiceCatalogOperation) -> ResultRequest {
    ResultRequest {
        terraform_run_id: RUN_ID.to_string(),
        workflow_token: WORKFLOW_TOKEN.to_string(),
        record_id: "rec-42".to_string(),
        tracer_tag: Some(KeyValue::new("tfp:tracer", PROVISIONED_PRODUCT_ID)),
        service_catalog_operation: operation,
        aws_account_id: ACCOUNT_ID.to_string(),
        terraform_organization: ORGANIZATION.to_string(),
        provisioned_product_id: PROVISIONED_PRODUCT_ID.to_string(),
        error: String::new(),
        error_message: String::new(),
    }
}

async fn notify(harness: &Harness, request: ResultRequest) -> anyhow::Result<()> {
    let ctx = harness.context().await?;
    StandardResultStageUseCase::new(ctx).notify(request).await
}

/// Seed a workspace whose applied run produced `count` outputs.
fn seed_applied_run_with_outputs(harness: &Harness, count: usize) {
    let workspace = harness.terraform.seed_workspace(ORGANIZATION, WORKSPACE_NAME);
    harness
        .terraform
        .seed_run(RUN_ID, &workspace.id, RunStatus::Applied, Some(APPLY_ID));
    harness.terraform.seed_apply(APPLY_ID, &["sv-1"]);
    harness
        .terraform
        .seed_outputs("sv-1", (0..count).map(|i| (format!("output_{:03}", i), Value::from(format!("value-{}", i)))));
}

#[tokio::test]
async fn test_terminate_success_deletes_workspace() {
    let harness = Harness::new();
    harness.terraform.seed_workspace(ORGANIZATION, WORKSPACE_NAME);

    notify(&harness, result_request(ServiceCatalogOperation::Terminate))
        .await
        .expect("terminate result should succeed");

    assert!(harness.terraform.workspace(ORGANIZATION, WORKSPACE_NAME).is_none());

    let notifications = harness.catalog.notifications();
    assert_eq!(notifications.len(), 1);
    let (operation, result) = &notifications[0];
    assert_eq!(*operation, ServiceCatalogOperation::Terminate);
    assert_eq!(result.status, EngineWorkflowStatus::Succeeded);
    assert_eq!(result.workflow_token, WORKFLOW_TOKEN);
    assert!(result.failure_reason.is_none());
    assert!(result.outputs.is_empty());
}

#[tokio::test]
async fn test_terminate_with_error_keeps_workspace() {
    let harness = Harness::new();
    harness.terraform.seed_workspace(ORGANIZATION, WORKSPACE_NAME);

    let mut request = result_request(ServiceCatalogOperation::Terminate);
    request.error_message = "you win some, you lose some".to_string();
    notify(&harness, request).await.expect("terminate result should succeed");

    assert!(harness.terraform.workspace(ORGANIZATION, WORKSPACE_NAME).is_some());
    assert_eq!(harness.terraform.call_count("delete_workspace"), 0);

    let (_, result) = harness.catalog.last().expect("catalog should be notified");
    assert_eq!(result.status, EngineWorkflowStatus::Failed);
    assert_eq!(result.failure_reason.as_deref(), Some("you win some, you lose some"));
}

#[tokio::test]
async fn test_provision_success_reports_outputs() {
    let harness = Harness::new();
    let workspace = harness.terraform.seed_workspace(ORGANIZATION, WORKSPACE_NAME);
    harness
        .terraform
        .seed_run(RUN_ID, &workspace.id, RunStatus::Applied, Some(APPLY_ID));
    harness.terraform.seed_apply(APPLY_ID, &["sv-1"]);
    harness
        .terraform
        .seed_outputs("sv-1", [("super_valuable_information_about_your_infra", "supervaluableinfo")]);

    notify(&harness, result_request(ServiceCatalogOperation::Provision))
        .await
        .expect("provision result should succeed");

    let (operation, result) = harness.catalog.last().expect("catalog should be notified");
    assert_eq!(operation, ServiceCatalogOperation::Provision);
    assert_eq!(result.status, EngineWorkflowStatus::Succeeded);
    assert_eq!(result.outputs.len(), 1);
    assert_eq!(result.outputs[0].output_key, "super_valuable_information_about_your_infra");
    assert_eq!(result.outputs[0].output_value, "supervaluableinfo");
    assert_eq!(
        result.resource_identifier.map(|r| r.unique_tag.value).as_deref(),
        Some(PROVISIONED_PRODUCT_ID)
    );
}

#[tokio::test]
async fn test_provision_with_missing_apply_fails_the_record() {
    let harness = Harness::new();
    let workspace = harness.terraform.seed_workspace(ORGANIZATION, WORKSPACE_NAME);
    harness.terraform.seed_run(RUN_ID, &workspace.id, RunStatus::Applied, None);

    notify(&harness, result_request(ServiceCatalogOperation::Provision))
        .await
        .expect("output failures are reported to the catalog, not the runtime");

    let (_, result) = harness.catalog.last().expect("catalog should be notified");
    assert_eq!(result.status, EngineWorkflowStatus::Failed);
    let reason = result.failure_reason.expect("failure reason should be set");
    assert!(reason.starts_with("Failed to fetch run outputs."), "unexpected reason: {}", reason);
    assert!(result.outputs.is_empty());
}

#[tokio::test]
async fn test_provision_with_more_than_one_page_of_outputs() {
    let harness = Harness::new();
    seed_applied_run_with_outputs(&harness, 250);

    notify(&harness, result_request(ServiceCatalogOperation::Provision))
        .await
        .expect("provision result should succeed");

    let (_, result) = harness.catalog.last().expect("catalog should be notified");
    assert_eq!(result.outputs.len(), 250);
    assert_eq!(harness.terraform.call_count("list_state_version_outputs"), 3);
}

#[tokio::test]
async fn test_output_pagination_boundaries() {
    for count in [0usize, 1, 99, 100, 101, 250] {
        let harness = Harness::new();
        seed_applied_run_with_outputs(&harness, count);

        notify(&harness, result_request(ServiceCatalogOperation::Update))
            .await
            .expect("update result should succeed");

        let (_, result) = harness.catalog.last().expect("catalog should be notified");
        assert_eq!(result.status, EngineWorkflowStatus::Succeeded, "count {}", count);
        assert_eq!(result.outputs.len(), count, "count {}", count);

        let keys: Vec<String> = result.outputs.iter().map(|o| o.output_key.clone()).collect();
        let expected: Vec<String> = (0..count).map(|i| format!("output_{:03}", i)).collect();
        assert_eq!(keys, expected, "outputs must keep pagination order");
    }
}
