// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for credential rotation
//!
//! Walks the controller through PAUSING → POLLING → ROTATING → RESUMING the
//! way the rotation state machine does, and checks that handlers started
//! after the rotation pick up the new token.

use tfc_provisioner_core::application::rotation::{RotationOutput, RotationRequest};
use tfc_provisioner_core::application::{
    PollStageUseCase, RotationController, StandardPollStageUseCase, StandardRotationController,
};
use tfc_provisioner_core::domain::event_source::MappingState;
use tfc_provisioner_core::domain::operation::RunReference;
use tfc_provisioner_core::domain::run_status::RunStatus;
use tfc_provisioner_core::testing::{Harness, INGESTION_MAPPINGS, NEW_TEAM_TOKEN, STATE_MACHINES, TEAM_ID, TOKEN};

async fn phase(controller: &StandardRotationController, operation: &str) -> RotationOutput {
    controller
        .handle(RotationRequest {
            operation: operation.to_string(),
        })
        .await
        .unwrap_or_else(|e| panic!("{} failed: {}", operation, e))
}

fn mapping_states(harness: &Harness) -> Vec<Option<String>> {
    INGESTION_MAPPINGS
        .iter()
        .map(|(_, uuid)| harness.event_sources.state(uuid))
        .collect()
}

#[tokio::test]
async fn test_rotation_happy_path() {
    let harness = Harness::new();
    harness.workflow_runtime.set_running(STATE_MACHINES[0], 11);
    harness.workflow_runtime.set_running(STATE_MACHINES[1], 11);
    harness.workflow_runtime.set_running(STATE_MACHINES[2], 1);
    assert_eq!(harness.stored_token().as_deref(), Some(TOKEN));

    let controller = StandardRotationController::new(harness.context().await.unwrap());

    phase(&controller, "PAUSING").await;
    assert!(mapping_states(&harness)
        .iter()
        .all(|s| s.as_deref() == Some("Disabled")));

    let polled = phase(&controller, "POLLING").await;
    assert_eq!(polled.state_machine_execution_count, 23);
    assert_eq!(polled.event_source_mapping_status, Some(MappingState::Disabled));

    phase(&controller, "ROTATING").await;
    assert_eq!(harness.stored_token().as_deref(), Some(NEW_TEAM_TOKEN));
    assert_eq!(harness.terraform.team_token(TEAM_ID).as_deref(), Some(NEW_TEAM_TOKEN));

    phase(&controller, "RESUMING").await;
    assert!(mapping_states(&harness)
        .iter()
        .all(|s| s.as_deref() == Some("Enabled")));
}

#[tokio::test]
async fn test_polling_output_wire_format() {
    let harness = Harness::with_event_sources(Harness::enabled_mappings().settling_slowly());
    let controller = StandardRotationController::new(harness.context().await.unwrap());

    phase(&controller, "PAUSING").await;
    let polled = phase(&controller, "POLLING").await;

    assert_eq!(
        serde_json::to_value(&polled).unwrap(),
        serde_json::json!({ "stateMachineExecutionCount": 0, "eventSourceMappingStatus": "Disabling" })
    );
}

#[tokio::test]
async fn test_stages_use_the_rotated_token() {
    let harness = Harness::new();
    harness.terraform.seed_run("run-1", "ws-1", RunStatus::Planning, None);

    // Context built before rotation; credentials are read per invocation.
    let ctx = harness.context().await.unwrap();
    let controller = StandardRotationController::new(ctx.clone());
    let poll = StandardPollStageUseCase::new(ctx);

    let reference = RunReference {
        terraform_run_id: "run-1".to_string(),
    };
    poll.poll(reference.clone()).await.unwrap();
    phase(&controller, "ROTATING").await;
    harness.terraform_factory.reject_token(TOKEN);
    poll.poll(reference).await.expect("poll should use the rotated token");

    let tokens: Vec<String> = harness
        .terraform_factory
        .connections()
        .into_iter()
        .map(|(credentials, _)| credentials.token)
        .collect();
    assert_eq!(tokens, vec![TOKEN, TOKEN, NEW_TEAM_TOKEN]);
}
