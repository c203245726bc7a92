// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Run output collection for the result stage.

use crate::domain::catalog::RecordOutput;
use crate::domain::errors::ProvisioningError;
use crate::domain::terraform::{paginate, StateVersionOutput, TerraformCloud};
use anyhow::{Context, Result};
use futures::TryStreamExt;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Outputs of the state version produced by `run_id`, in pagination order.
///
/// An apply with no linked state version means the plan had no changes;
/// the workspace's current state version is used instead, and a workspace
/// with no state at all yields no outputs.
pub async fn collect_outputs(
    client: &Arc<dyn TerraformCloud>,
    organization: &str,
    workspace_name: &str,
    run_id: &str,
) -> Result<Vec<RecordOutput>> {
    let workspace = client
        .read_workspace(organization, workspace_name)
        .await
        .with_context(|| format!("Failed to read workspace {}", workspace_name))?;
    let run = client
        .read_run(run_id)
        .await
        .with_context(|| format!("Failed to read run {}", run_id))?;

    let apply_id = run.apply_id.ok_or(ProvisioningError::MissingApply)?;
    let apply = client
        .read_apply(&apply_id)
        .await
        .with_context(|| format!("Failed to read apply {}", apply_id))?;

    let state_version_id = match apply.state_version_ids.as_slice() {
        [single] => single.clone(),
        [] => match client.read_current_state_version(&workspace.id).await? {
            Some(current) => current.id,
            None => {
                debug!(workspace = %workspace_name, "Workspace has no state; no outputs");
                return Ok(Vec::new());
            }
        },
        _ => return Err(ProvisioningError::AmbiguousState.into()),
    };

    let outputs: Vec<StateVersionOutput> = paginate(|page| {
        let client = client.clone();
        let state_version_id = state_version_id.clone();
        async move { client.list_state_version_outputs(&state_version_id, page).await }
    })
    .try_collect()
    .await
    .with_context(|| format!("Failed to list outputs of state version {}", state_version_id))?;

    Ok(outputs.into_iter().map(record_output).collect())
}

fn record_output(output: StateVersionOutput) -> RecordOutput {
    let output_value = match output.value {
        Value::String(s) => s,
        other => other.to_string(),
    };
    RecordOutput {
        output_key: output.name,
        output_value,
        description: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::run_status::RunStatus;
    use crate::testing::{FakeTerraformCloud, ORGANIZATION};

    const WORKSPACE: &str = "123456789042-pp-1";

    fn client(fake: &Arc<FakeTerraformCloud>) -> Arc<dyn TerraformCloud> {
        fake.clone()
    }

    #[tokio::test]
    async fn test_single_state_version_outputs() {
        let fake = Arc::new(FakeTerraformCloud::new());
        let workspace = fake.seed_workspace(ORGANIZATION, WORKSPACE);
        fake.seed_run("run-1", &workspace.id, RunStatus::Applied, Some("apply-1"));
        fake.seed_apply("apply-1", &["sv-1"]);
        fake.seed_outputs("sv-1", [("bucket", Value::from("my-bucket")), ("count", Value::from(3))]);

        let outputs = collect_outputs(&client(&fake), ORGANIZATION, WORKSPACE, "run-1").await.unwrap();

        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].output_key, "bucket");
        assert_eq!(outputs[0].output_value, "my-bucket");
        assert_eq!(outputs[1].output_value, "3");
        assert!(outputs.iter().all(|o| o.description.is_none()));
    }

    #[tokio::test]
    async fn test_structured_values_are_json_encoded() {
        let fake = Arc::new(FakeTerraformCloud::new());
        let workspace = fake.seed_workspace(ORGANIZATION, WORKSPACE);
        fake.seed_run("run-1", &workspace.id, RunStatus::Applied, Some("apply-1"));
        fake.seed_apply("apply-1", &["sv-1"]);
        fake.seed_outputs("sv-1", [("ids", serde_json::json!(["a", "b"]))]);

        let outputs = collect_outputs(&client(&fake), ORGANIZATION, WORKSPACE, "run-1").await.unwrap();
        assert_eq!(outputs[0].output_value, r#"["a","b"]"#);
    }

    #[tokio::test]
    async fn test_no_linked_state_version_falls_back_to_current() {
        let fake = Arc::new(FakeTerraformCloud::new());
        let workspace = fake.seed_workspace(ORGANIZATION, WORKSPACE);
        fake.seed_run("run-1", &workspace.id, RunStatus::PlannedAndFinished, Some("apply-1"));
        fake.seed_apply("apply-1", &[]);
        fake.set_current_state_version(&workspace.id, "sv-current");
        fake.seed_outputs("sv-current", [("name", "current")]);

        let outputs = collect_outputs(&client(&fake), ORGANIZATION, WORKSPACE, "run-1").await.unwrap();
        assert_eq!(outputs[0].output_value, "current");
    }

    #[tokio::test]
    async fn test_no_state_at_all_is_empty() {
        let fake = Arc::new(FakeTerraformCloud::new());
        let workspace = fake.seed_workspace(ORGANIZATION, WORKSPACE);
        fake.seed_run("run-1", &workspace.id, RunStatus::PlannedAndFinished, Some("apply-1"));
        fake.seed_apply("apply-1", &[]);

        let outputs = collect_outputs(&client(&fake), ORGANIZATION, WORKSPACE, "run-1").await.unwrap();
        assert!(outputs.is_empty());
    }

    #[tokio::test]
    async fn test_ambiguous_state_is_rejected() {
        let fake = Arc::new(FakeTerraformCloud::new());
        let workspace = fake.seed_workspace(ORGANIZATION, WORKSPACE);
        fake.seed_run("run-1", &workspace.id, RunStatus::Applied, Some("apply-1"));
        fake.seed_apply("apply-1", &["sv-1", "sv-2"]);

        let err = collect_outputs(&client(&fake), ORGANIZATION, WORKSPACE, "run-1").await.unwrap_err();
        assert_eq!(err.downcast_ref::<ProvisioningError>(), Some(&ProvisioningError::AmbiguousState));
    }

    #[tokio::test]
    async fn test_missing_apply_is_rejected() {
        let fake = Arc::new(FakeTerraformCloud::new());
        let workspace = fake.seed_workspace(ORGANIZATION, WORKSPACE);
        fake.seed_run("run-1", &workspace.id, RunStatus::Applied, None);

        let err = collect_outputs(&client(&fake), ORGANIZATION, WORKSPACE, "run-1").await.unwrap_err();
        assert_eq!(err.to_string(), crate::domain::errors::MISSING_APPLY_MESSAGE);
    }
}
