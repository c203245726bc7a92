// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Infrastructure layer: adapters behind the domain ports, plus the archive
//! toolkit and logging setup.

pub mod archive;
pub mod artifact_downloader;
pub mod secrets;
pub mod telemetry;
pub mod terraform_cloud;
pub mod terraform_config;

pub use artifact_downloader::ArtifactDownloader;
pub use secrets::SecretStoreAdapter;
pub use terraform_cloud::{HttpTerraformClientFactory, HttpTerraformCloud};
pub use terraform_config::HclConfigurationParser;
