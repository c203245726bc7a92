// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Declared Terraform input variables of a product configuration.

use crate::domain::errors::ProvisioningError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One `variable` block found in a product configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerraformVariable {
    pub key: String,
    /// Raw default expression, empty when the variable is required.
    pub default_value: String,
    #[serde(rename = "type")]
    pub variable_type: String,
    pub description: String,
    pub is_no_echo: bool,
}

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("invalid parameter {field}: {value}")]
    InvalidParameter { field: &'static str, value: String },

    #[error("access denied while fetching the product artifact: {0}")]
    AccessDenied(String),

    #[error("could not read the product artifact: {0}")]
    Archive(String),

    #[error("invalid Terraform configuration: {0}")]
    Configuration(String),

    #[error(transparent)]
    Workflow(#[from] ProvisioningError),
}

/// Extracts declared variables from a tar+gzip configuration archive.
pub trait ConfigurationParser: Send + Sync {
    fn parse(&self, archive: &[u8]) -> Result<Vec<TerraformVariable>, ParserError>;
}
