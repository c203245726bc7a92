// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Engine Configuration
//!
//! Settings shared by every stage handler, loaded from the process
//! environment of the cloud function hosting the handler.
//!
//! | Variable | Field |
//! |----------|-------|
//! | `TFE_CREDENTIALS_SECRET_ID` | `credentials_secret_id` |
//! | `TERRAFORM_ORGANIZATION` | `terraform_organization` |
//! | `STATE_MACHINE_ARN` | `state_machine_arn` |
//! | `PROVISIONING_STATE_MACHINE_ARN` | `state_machines.provisioning` |
//! | `UPDATING_STATE_MACHINE_ARN` | `state_machines.updating` |
//! | `TERMINATING_STATE_MACHINE_ARN` | `state_machines.terminating` |
//! | `PROVISIONING_FUNCTION_NAME` | `ingestion_functions.provisioning` |
//! | `UPDATING_FUNCTION_NAME` | `ingestion_functions.updating` |
//! | `TERMINATING_FUNCTION_NAME` | `ingestion_functions.terminating` |
//! | `TERRAFORM_VERSION` | `terraform_version` |
//! | `AWS_REGION` | `region` |
//! | `TFE_HTTP_TIMEOUT_SECS` | `http_timeout_secs` |
//!
//! Each cloud function hosts one [`HandlerRole`] and only needs that role's
//! variables. [`EngineConfig::from_env_for`] fails at startup with
//! [`ConfigError::Missing`] naming the first unset one. Handlers still call
//! [`EngineConfig::require`] on the fields they use, so a context built some
//! other way cannot run with an empty value.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub const DEFAULT_TERRAFORM_VERSION: &str = "1.5.7";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("environment variable {name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// One value per ingestion flavour (provision / update / terminate).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerOperation {
    pub provisioning: String,
    pub updating: String,
    pub terminating: String,
}

impl PerOperation {
    pub fn all(&self) -> [&str; 3] {
        [&self.provisioning, &self.updating, &self.terminating]
    }
}

/// The handler a function host runs, which decides its required variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerRole {
    Ingress,
    /// Apply, destroy, poll and result stages.
    Stage,
    ParameterParser,
    Rotation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub credentials_secret_id: String,
    pub terraform_organization: String,
    pub state_machine_arn: String,
    pub state_machines: PerOperation,
    pub ingestion_functions: PerOperation,
    pub terraform_version: String,
    pub region: String,
    pub http_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            credentials_secret_id: String::new(),
            terraform_organization: String::new(),
            state_machine_arn: String::new(),
            state_machines: PerOperation::default(),
            ingestion_functions: PerOperation::default(),
            terraform_version: DEFAULT_TERRAFORM_VERSION.to_string(),
            region: String::new(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

impl EngineConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars().collect())
    }

    /// Load configuration and check the variables `role` cannot run without.
    pub fn from_env_for(role: HandlerRole) -> Result<Self, ConfigError> {
        let config = Self::from_env()?;
        config.validate(role)?;
        Ok(config)
    }

    /// Load configuration from an explicit variable map.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |name: &str| vars.get(name).cloned().unwrap_or_default();

        let http_timeout_secs = match vars.get("TFE_HTTP_TIMEOUT_SECS") {
            Some(raw) if !raw.is_empty() => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "TFE_HTTP_TIMEOUT_SECS",
                value: raw.clone(),
            })?,
            _ => DEFAULT_HTTP_TIMEOUT_SECS,
        };

        let terraform_version = match get("TERRAFORM_VERSION") {
            v if v.is_empty() => DEFAULT_TERRAFORM_VERSION.to_string(),
            v => v,
        };

        let region = match get("AWS_REGION") {
            r if r.is_empty() => get("AWS_DEFAULT_REGION"),
            r => r,
        };

        Ok(Self {
            credentials_secret_id: get("TFE_CREDENTIALS_SECRET_ID"),
            terraform_organization: get("TERRAFORM_ORGANIZATION"),
            state_machine_arn: get("STATE_MACHINE_ARN"),
            state_machines: PerOperation {
                provisioning: get("PROVISIONING_STATE_MACHINE_ARN"),
                updating: get("UPDATING_STATE_MACHINE_ARN"),
                terminating: get("TERMINATING_STATE_MACHINE_ARN"),
            },
            ingestion_functions: PerOperation {
                provisioning: get("PROVISIONING_FUNCTION_NAME"),
                updating: get("UPDATING_FUNCTION_NAME"),
                terminating: get("TERMINATING_FUNCTION_NAME"),
            },
            terraform_version,
            region,
            http_timeout_secs,
        })
    }

    pub fn validate(&self, role: HandlerRole) -> Result<(), ConfigError> {
        let required: Vec<(&str, &'static str)> = match role {
            HandlerRole::Ingress => vec![(self.state_machine_arn.as_str(), "STATE_MACHINE_ARN")],
            HandlerRole::Stage => vec![
                (self.credentials_secret_id.as_str(), "TFE_CREDENTIALS_SECRET_ID"),
                (self.region.as_str(), "AWS_REGION"),
            ],
            HandlerRole::ParameterParser => vec![],
            HandlerRole::Rotation => vec![
                (self.credentials_secret_id.as_str(), "TFE_CREDENTIALS_SECRET_ID"),
                (self.state_machines.provisioning.as_str(), "PROVISIONING_STATE_MACHINE_ARN"),
                (self.state_machines.updating.as_str(), "UPDATING_STATE_MACHINE_ARN"),
                (self.state_machines.terminating.as_str(), "TERMINATING_STATE_MACHINE_ARN"),
                (self.ingestion_functions.provisioning.as_str(), "PROVISIONING_FUNCTION_NAME"),
                (self.ingestion_functions.updating.as_str(), "UPDATING_FUNCTION_NAME"),
                (self.ingestion_functions.terminating.as_str(), "TERMINATING_FUNCTION_NAME"),
            ],
        };
        for (value, name) in required {
            Self::require(value, name)?;
        }
        Ok(())
    }

    /// Return `value` unless it is empty, in which case report `name` missing.
    pub fn require<'a>(value: &'a str, name: &'static str) -> Result<&'a str, ConfigError> {
        if value.is_empty() {
            Err(ConfigError::Missing(name))
        } else {
            Ok(value)
        }
    }
}
