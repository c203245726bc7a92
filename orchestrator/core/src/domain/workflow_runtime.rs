// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Workflow Runtime Port
//!
//! The external state-machine service that drives stage-to-stage
//! transitions. The engine only starts executions (ingress) and counts the
//! running ones (rotation drain).

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkflowRuntimeError {
    #[error("an execution named {0} already exists")]
    ExecutionAlreadyExists(String),

    #[error("state machine {0} does not exist")]
    StateMachineNotFound(String),

    #[error("workflow runtime request failed: {0}")]
    Backend(String),
}

#[async_trait]
pub trait WorkflowRuntime: Send + Sync {
    /// Start one execution and return its execution ARN.
    async fn start_execution(
        &self,
        state_machine_arn: &str,
        name: &str,
        input: &str,
    ) -> Result<String, WorkflowRuntimeError>;

    /// Number of executions currently in the RUNNING state.
    async fn count_running_executions(&self, state_machine_arn: &str) -> Result<u64, WorkflowRuntimeError>;
}
