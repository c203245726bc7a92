// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Ingress Dispatcher
//!
//! Turns each queued catalog operation into one workflow execution. The
//! execution name `{provisionedProductId}-{recordId}` lets the workflow
//! runtime reject duplicate deliveries.
//!
//! A message that cannot be dispatched is reported back in
//! `batchItemFailures` so the queue redrives only that message. The batch
//! itself never fails and nothing is retried here.

use crate::application::HandlerContext;
use crate::domain::config::EngineConfig;
use crate::domain::operation::ProvisioningRequest;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueBatch {
    #[serde(rename = "Records", default)]
    pub records: Vec<QueueMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMessage {
    pub message_id: String,
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub batch_item_failures: Vec<BatchItemFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemFailure {
    pub item_identifier: String,
}

#[async_trait]
pub trait IngressUseCase: Send + Sync {
    async fn dispatch(&self, batch: QueueBatch) -> BatchResponse;
}

pub struct StandardIngressUseCase {
    ctx: HandlerContext,
}

impl StandardIngressUseCase {
    pub fn new(ctx: HandlerContext) -> Self {
        Self { ctx }
    }

    async fn dispatch_one(&self, message: &QueueMessage) -> Result<String> {
        let state_machine_arn = EngineConfig::require(&self.ctx.config.state_machine_arn, "STATE_MACHINE_ARN")?;
        let mut request: ProvisioningRequest =
            serde_json::from_str(&message.body).context("Failed to parse provisioning request")?;

        if !self.ctx.config.terraform_organization.is_empty() {
            request.terraform_organization = Some(self.ctx.config.terraform_organization.clone());
        }

        let input = serde_json::to_string(&request).context("Failed to serialize workflow input")?;
        let execution_arn = self
            .ctx
            .workflow_runtime
            .start_execution(state_machine_arn, &request.execution_name(), &input)
            .await
            .with_context(|| format!("Failed to start execution {}", request.execution_name()))?;

        info!(
            execution = %execution_arn,
            operation = %request.operation,
            record_id = %request.record_id,
            "Started provisioning workflow"
        );
        Ok(execution_arn)
    }
}

#[async_trait]
impl IngressUseCase for StandardIngressUseCase {
    async fn dispatch(&self, batch: QueueBatch) -> BatchResponse {
        let mut response = BatchResponse::default();

        for message in &batch.records {
            match self.dispatch_one(message).await {
                Ok(_) => {
                    metrics::counter!("tfc_provisioner_ingress_messages_total", "outcome" => "started").increment(1);
                }
                Err(err) => {
                    warn!(message_id = %message.message_id, error = %format!("{:#}", err), "Failed to dispatch message");
                    metrics::counter!("tfc_provisioner_ingress_messages_total", "outcome" => "failed").increment(1);
                    response.batch_item_failures.push(BatchItemFailure {
                        item_identifier: message.message_id.clone(),
                    });
                }
            }
        }

        response
    }
}
