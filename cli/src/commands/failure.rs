// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `tfp format-error`: show the failure reason the catalog would receive
//! for a stage error.

use anyhow::Result;
use clap::Args;

use tfc_provisioner_core::domain::failure_reason::format_failure_reason;

#[derive(Args)]
pub struct FormatErrorCommand {
    /// Error message, raw or as an `{"errorMessage", "errorType"}` envelope
    #[arg(value_name = "MESSAGE")]
    message: String,

    /// Workflow-runtime error name, e.g. States.Timeout
    #[arg(long, default_value = "")]
    error_name: String,
}

pub async fn execute(command: FormatErrorCommand) -> Result<()> {
    println!("{}", format_failure_reason(&command.error_name, &command.message));
    Ok(())
}
