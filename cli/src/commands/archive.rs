// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Local archive commands
//!
//! Commands: inject-override, parameters
//!
//! Both operate on a tar+gzip product configuration on disk, so an operator
//! can see exactly what the apply stage would upload and what the parameter
//! parser would report without touching the object store.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing::debug;

use tfc_provisioner_core::domain::operation::KeyValue;
use tfc_provisioner_core::domain::parameters::{ConfigurationParser, TerraformVariable};
use tfc_provisioner_core::domain::provider_override::{build_provider_override, PROVIDER_OVERRIDE_FILE};
use tfc_provisioner_core::infrastructure::archive;
use tfc_provisioner_core::infrastructure::HclConfigurationParser;

use super::parse_key_value;

#[derive(Args)]
pub struct InjectOverrideCommand {
    /// Product configuration archive (tar+gzip)
    #[arg(long, value_name = "FILE")]
    archive: PathBuf,

    /// Where to write the modified archive
    #[arg(long, value_name = "FILE")]
    output: PathBuf,

    /// AWS region for the provider block
    #[arg(long, env = "AWS_REGION")]
    region: String,

    /// Billing tag applied to every resource (repeatable)
    #[arg(long = "tag", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    tags: Vec<KeyValue>,

    /// Tag identifying the provisioned product
    #[arg(long, value_name = "KEY=VALUE", value_parser = parse_key_value)]
    tracer_tag: KeyValue,
}

#[derive(Args)]
pub struct ParametersCommand {
    /// Product configuration archive (tar+gzip)
    #[arg(long, value_name = "FILE")]
    archive: PathBuf,
}

pub async fn inject_override(command: InjectOverrideCommand) -> Result<()> {
    let original = read_archive(&command.archive)?;
    let modified = with_provider_override(&original, &command.region, &command.tags, &command.tracer_tag)?;

    std::fs::write(&command.output, modified)
        .with_context(|| format!("Failed to write archive to {:?}", command.output))?;

    eprintln!(
        "{}",
        format!("✓ Appended {} to {}", PROVIDER_OVERRIDE_FILE, command.output.display()).green()
    );
    Ok(())
}

pub async fn parameters(command: ParametersCommand) -> Result<()> {
    let archive = read_archive(&command.archive)?;
    let variables = declared_variables(&archive)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({ "parameters": variables }))?
    );
    Ok(())
}

fn read_archive(path: &Path) -> Result<Vec<u8>> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read archive {:?}", path))?;
    debug!(path = %path.display(), bytes = bytes.len(), "Read archive");
    Ok(bytes)
}

/// Append the provider override the apply stage would add.
pub fn with_provider_override(
    archive_bytes: &[u8],
    region: &str,
    tags: &[KeyValue],
    tracer_tag: &KeyValue,
) -> Result<Vec<u8>> {
    let contents = serde_json::to_string_pretty(&build_provider_override(region, tags, tracer_tag))
        .context("Failed to encode provider override")?;
    archive::inject_entry(archive_bytes, PROVIDER_OVERRIDE_FILE, &contents).context("Failed to inject provider override")
}

pub fn declared_variables(archive_bytes: &[u8]) -> Result<Vec<TerraformVariable>> {
    HclConfigurationParser::new()
        .parse(archive_bytes)
        .context("Failed to extract Terraform variables")
}
