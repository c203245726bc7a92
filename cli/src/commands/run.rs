// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `tfp run-status`: classify a Terraform Cloud run the way the poll stage
//! does.
//!
//! The token is read from `TFE_TOKEN` (or `.env`); the credentials record
//! in the secret store is not consulted.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use std::time::Duration;

use tfc_provisioner_core::domain::config::DEFAULT_HTTP_TIMEOUT_SECS;
use tfc_provisioner_core::domain::credentials::TfeCredentials;
use tfc_provisioner_core::domain::run_status::{classify, ProductProvisioningStatus};
use tfc_provisioner_core::domain::terraform::TerraformClientFactory;
use tfc_provisioner_core::infrastructure::HttpTerraformClientFactory;

#[derive(Args)]
pub struct RunStatusCommand {
    /// Run id, e.g. run-abc123
    #[arg(long, value_name = "ID")]
    run_id: String,

    /// Terraform Cloud / Enterprise hostname
    #[arg(long, env = "TFE_HOSTNAME", default_value = "app.terraform.io")]
    hostname: String,

    /// Team or user API token
    #[arg(long, env = "TFE_TOKEN", hide_env_values = true)]
    token: String,

    /// Request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_HTTP_TIMEOUT_SECS)]
    timeout_secs: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatusReport {
    pub run_id: String,
    pub run_status: String,
    pub product_provisioning_status: ProductProvisioningStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

pub async fn execute(command: RunStatusCommand) -> Result<()> {
    let report = fetch_report(&command).await?;

    let status = match report.product_provisioning_status {
        ProductProvisioningStatus::Success => report.run_status.green(),
        ProductProvisioningStatus::InProgress => report.run_status.yellow(),
        ProductProvisioningStatus::Failed => report.run_status.red(),
    };
    eprintln!("{} {}", report.run_id.bold(), status);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub async fn fetch_report(command: &RunStatusCommand) -> Result<RunStatusReport> {
    let credentials = TfeCredentials {
        hostname: command.hostname.clone(),
        team_id: String::new(),
        token: command.token.clone(),
    };
    let client = HttpTerraformClientFactory::new(Duration::from_secs(command.timeout_secs))
        .connect(&credentials, None)
        .await
        .context("Failed to create Terraform Cloud client")?;

    let run = client
        .read_run(&command.run_id)
        .await
        .with_context(|| format!("Failed to read run {}", command.run_id))?;
    let classification = classify(run.status);

    Ok(RunStatusReport {
        run_id: run.id,
        run_status: run.status.to_string(),
        product_provisioning_status: classification.status,
        error_message: classification.error_message.map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tfc_provisioner_core::domain::terraform::TerraformError;

    fn command(server: &mockito::ServerGuard) -> RunStatusCommand {
        RunStatusCommand {
            run_id: "run-1".into(),
            hostname: server.url(),
            token: "tok".into(),
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn test_errored_run_is_reported_failed() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v2/runs/run-1")
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_body(r#"{"data":{"id":"run-1","type":"runs","attributes":{"status":"errored"}}}"#)
            .create_async()
            .await;

        let report = fetch_report(&command(&server)).await.unwrap();
        assert_eq!(report.run_status, "errored");
        assert_eq!(report.product_provisioning_status, ProductProvisioningStatus::Failed);
        assert_eq!(report.error_message.as_deref(), Some("Failed running terraform apply"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unauthorized_token_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v2/runs/run-1")
            .with_status(401)
            .with_body(r#"{"errors":[{"status":"401","title":"unauthorized"}]}"#)
            .create_async()
            .await;

        let err = fetch_report(&command(&server)).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TerraformError>(),
            Some(TerraformError::AuthInvalid)
        ));
    }
}
