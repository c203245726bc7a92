// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `tfp workspace-name`: the Terraform Cloud workspace backing a
//! provisioned product.

use anyhow::Result;
use clap::Args;

use tfc_provisioner_core::domain::operation::workspace_name;

#[derive(Args)]
pub struct WorkspaceNameCommand {
    /// AWS account that owns the provisioned product
    #[arg(long, value_name = "ACCOUNT_ID")]
    account: String,

    /// Provisioned product id, e.g. pp-abc123
    #[arg(long, value_name = "ID")]
    provisioned_product: String,
}

pub async fn execute(command: WorkspaceNameCommand) -> Result<()> {
    println!("{}", workspace_name(&command.account, &command.provisioned_product));
    Ok(())
}
