// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Destroy Stage Use Case
//!
//! Queues an auto-applied destroy run in the provisioned product's
//! workspace. A missing workspace is an error: the result stage must not
//! report a successful terminate for something that was never destroyed.

use crate::application::HandlerContext;
use crate::domain::operation::{workspace_name, DestroyRequest, RunReference};
use crate::domain::terraform::RunCreateOptions;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

#[async_trait]
pub trait DestroyStageUseCase: Send + Sync {
    async fn destroy(&self, request: DestroyRequest) -> Result<RunReference>;
}

pub struct StandardDestroyStageUseCase {
    ctx: HandlerContext,
}

impl StandardDestroyStageUseCase {
    pub fn new(ctx: HandlerContext) -> Self {
        Self { ctx }
    }

    async fn run(&self, request: DestroyRequest) -> Result<RunReference> {
        let name = workspace_name(&request.aws_account_id, &request.provisioned_product_id);
        let client = self.ctx.terraform_client(None).await?;

        let workspace = client
            .read_workspace(&request.terraform_organization, &name)
            .await
            .with_context(|| format!("Failed to read workspace {}", name))?;

        let run = client
            .create_run(RunCreateOptions {
                workspace_id: workspace.id.clone(),
                configuration_version_id: None,
                is_destroy: true,
                auto_apply: true,
                message: Some(format!("Destroying provisioned product {}", request.provisioned_product_id)),
            })
            .await
            .context("Failed to create destroy run")?;

        info!(workspace = %name, run_id = %run.id, "Created destroy run");
        metrics::counter!("tfc_provisioner_runs_created_total", "operation" => "TERMINATE_PROVISIONED_PRODUCT").increment(1);

        Ok(RunReference {
            terraform_run_id: run.id,
        })
    }
}

#[async_trait]
impl DestroyStageUseCase for StandardDestroyStageUseCase {
    async fn destroy(&self, request: DestroyRequest) -> Result<RunReference> {
        self.ctx.cancellable(self.run(request)).await
    }
}
