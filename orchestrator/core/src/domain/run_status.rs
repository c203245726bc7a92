// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Run status classification for the poll stage.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Remote run status as reported by Terraform Cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Fetching,
    FetchingCompleted,
    PrePlanRunning,
    PrePlanCompleted,
    Queuing,
    PlanQueued,
    Planning,
    Planned,
    CostEstimating,
    CostEstimated,
    PolicyChecking,
    PolicyOverride,
    PolicySoftFailed,
    PolicyChecked,
    Confirmed,
    PostPlanRunning,
    PostPlanCompleted,
    PostPlanAwaitingDecision,
    PlannedAndFinished,
    PlannedAndSaved,
    ApplyQueued,
    Applying,
    Applied,
    Discarded,
    Errored,
    Canceled,
    ForceCanceled,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fetching => "fetching",
            Self::FetchingCompleted => "fetching_completed",
            Self::PrePlanRunning => "pre_plan_running",
            Self::PrePlanCompleted => "pre_plan_completed",
            Self::Queuing => "queuing",
            Self::PlanQueued => "plan_queued",
            Self::Planning => "planning",
            Self::Planned => "planned",
            Self::CostEstimating => "cost_estimating",
            Self::CostEstimated => "cost_estimated",
            Self::PolicyChecking => "policy_checking",
            Self::PolicyOverride => "policy_override",
            Self::PolicySoftFailed => "policy_soft_failed",
            Self::PolicyChecked => "policy_checked",
            Self::Confirmed => "confirmed",
            Self::PostPlanRunning => "post_plan_running",
            Self::PostPlanCompleted => "post_plan_completed",
            Self::PostPlanAwaitingDecision => "post_plan_awaiting_decision",
            Self::PlannedAndFinished => "planned_and_finished",
            Self::PlannedAndSaved => "planned_and_saved",
            Self::ApplyQueued => "apply_queued",
            Self::Applying => "applying",
            Self::Applied => "applied",
            Self::Discarded => "discarded",
            Self::Errored => "errored",
            Self::Canceled => "canceled",
            Self::ForceCanceled => "force_canceled",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provisioning status reported back to the workflow runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductProvisioningStatus {
    Success,
    InProgress,
    Failed,
}

pub const RUN_CANCELLED_MESSAGE: &str = "Run was cancelled";
pub const RUN_DISCARDED_MESSAGE: &str = "Run was discarded";
pub const RUN_ERRORED_MESSAGE: &str = "Failed running terraform apply";
pub const RUN_AWAITING_DECISION_MESSAGE: &str = "Run requires approval in Terraform Cloud before it can continue. Approve or discard the run in the Terraform Cloud workspace, then update the provisioned product to clear the error.";

/// Classification of a run status for the workflow runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunClassification {
    pub status: ProductProvisioningStatus,
    pub error_message: Option<&'static str>,
}

/// Map a remote run status onto the provisioning status the poll loop uses.
pub fn classify(status: RunStatus) -> RunClassification {
    use ProductProvisioningStatus::*;

    let (status, error_message) = match status {
        RunStatus::Applied | RunStatus::PlannedAndFinished => (Success, None),
        RunStatus::Canceled => (Failed, Some(RUN_CANCELLED_MESSAGE)),
        RunStatus::Discarded => (Failed, Some(RUN_DISCARDED_MESSAGE)),
        RunStatus::Errored => (Failed, Some(RUN_ERRORED_MESSAGE)),
        RunStatus::PostPlanAwaitingDecision => (Failed, Some(RUN_AWAITING_DECISION_MESSAGE)),
        _ => (InProgress, None),
    };

    RunClassification { status, error_message }
}
