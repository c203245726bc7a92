// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Terraform Cloud provisioner CLI
//!
//! The `tfp` binary exposes the engine's pure pieces to operators, so a
//! failing provisioned product can be diagnosed from a shell without
//! replaying the workflow.
//!
//! ## Commands
//!
//! - `tfp format-error` - Failure reason the catalog would receive
//! - `tfp inject-override` - Append the provider override to an archive
//! - `tfp parameters` - List the variables a configuration declares
//! - `tfp run-status` - Classify a Terraform Cloud run
//! - `tfp workspace-name` - Workspace backing a provisioned product

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::debug;

use tfc_provisioner::commands::{
    self, FormatErrorCommand, InjectOverrideCommand, ParametersCommand, RunStatusCommand,
    WorkspaceNameCommand,
};
use tfc_provisioner_core::infrastructure::telemetry::{init_logging, LogFormat};

/// Terraform Cloud provisioner - operator tooling
#[derive(Parser)]
#[command(name = "tfp")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "TFP_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log output format (compact, json)
    #[arg(long, global = true, env = "TFP_LOG_FORMAT", default_value = "compact")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Format a stage error the way it is reported to the catalog
    #[command(name = "format-error")]
    FormatError(FormatErrorCommand),

    /// Append the provider override file to a configuration archive
    #[command(name = "inject-override")]
    InjectOverride(InjectOverrideCommand),

    /// List the variables declared by a configuration archive
    #[command(name = "parameters")]
    Parameters(ParametersCommand),

    /// Read a run and classify its status
    #[command(name = "run-status")]
    RunStatus(RunStatusCommand),

    /// Print the workspace name for a provisioned product
    #[command(name = "workspace-name")]
    WorkspaceName(WorkspaceNameCommand),
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // A missing .env is normal outside development.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format).context("Failed to initialize logging")?;
    debug!(version = env!("CARGO_PKG_VERSION"), "tfp starting");

    match cli.command {
        Commands::FormatError(cmd) => commands::failure::execute(cmd).await,
        Commands::InjectOverride(cmd) => commands::archive::inject_override(cmd).await,
        Commands::Parameters(cmd) => commands::archive::parameters(cmd).await,
        Commands::RunStatus(cmd) => commands::run::execute(cmd).await,
        Commands::WorkspaceName(cmd) => commands::workspace::execute(cmd).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_repeatable_tags() {
        let cli = Cli::try_parse_from([
            "tfp",
            "inject-override",
            "--archive",
            "in.tar.gz",
            "--output",
            "out.tar.gz",
            "--region",
            "us-east-1",
            "--tag",
            "team=platform",
            "--tag",
            "cost-center=42",
            "--tracer-tag",
            "tracer=pp-1",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::InjectOverride(_)));
        assert_eq!(cli.log_format, LogFormat::Compact);
    }

    #[test]
    fn test_log_format_rejects_unknown_value() {
        let result = Cli::try_parse_from(["tfp", "--log-format", "yaml", "workspace-name", "--account", "1", "--provisioned-product", "pp-1"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_format_error_takes_optional_error_name() {
        let cli = Cli::try_parse_from(["tfp", "format-error", "--error-name", "States.Timeout", "took too long"]).unwrap();
        assert!(matches!(cli.command, Commands::FormatError(_)));
    }
}
