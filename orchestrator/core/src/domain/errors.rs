// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Provisioning workflow failures that do not originate in a single port.

use thiserror::Error;

pub const AMBIGUOUS_STATE_MESSAGE: &str = "The Terraform Cloud apply is linked to more than one state version, so its outputs cannot be determined. \
Inspect the workspace's state versions in Terraform Cloud, then update the provisioned product to retry.";

pub const MISSING_APPLY_MESSAGE: &str = "run from TFC was missing apply data, retry again later";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProvisioningError {
    #[error("configuration version {configuration_version_id} was not uploaded after {attempts} status checks")]
    UploadTimeout {
        configuration_version_id: String,
        attempts: u32,
    },

    #[error("configuration version {0} has no upload URL")]
    MissingUploadUrl(String),

    #[error("{}", AMBIGUOUS_STATE_MESSAGE)]
    AmbiguousState,

    #[error("{}", MISSING_APPLY_MESSAGE)]
    MissingApply,

    #[error("the stage was cancelled")]
    Cancelled,
}
