// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Poll Stage Use Case
//!
//! Reads one run and classifies it for the workflow runtime, which keeps
//! re-invoking this stage while the status is `IN_PROGRESS`.

use crate::application::HandlerContext;
use crate::domain::operation::RunReference;
use crate::domain::run_status::{classify, ProductProvisioningStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollOutput {
    pub product_provisioning_status: ProductProvisioningStatus,
    /// Raw remote status, e.g. `planning`.
    pub run_status: String,
    #[serde(default)]
    pub error_message: String,
}

#[async_trait]
pub trait PollStageUseCase: Send + Sync {
    async fn poll(&self, request: RunReference) -> Result<PollOutput>;
}

pub struct StandardPollStageUseCase {
    ctx: HandlerContext,
}

impl StandardPollStageUseCase {
    pub fn new(ctx: HandlerContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl PollStageUseCase for StandardPollStageUseCase {
    async fn poll(&self, request: RunReference) -> Result<PollOutput> {
        self.ctx
            .cancellable(async {
                let client = self.ctx.terraform_client(None).await?;
                let run = client
                    .read_run(&request.terraform_run_id)
                    .await
                    .with_context(|| format!("Failed to read run {}", request.terraform_run_id))?;

                let classification = classify(run.status);
                debug!(run_id = %run.id, status = %run.status, "Polled run");

                Ok::<_, anyhow::Error>(PollOutput {
                    product_provisioning_status: classification.status,
                    run_status: run.status.to_string(),
                    error_message: classification.error_message.unwrap_or_default().to_string(),
                })
            })
            .await
    }
}
