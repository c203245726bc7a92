// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Event-Source Mapping Port
//!
//! Bindings between the ingestion queues and the ingress functions. Disabling
//! a mapping stops delivery without losing messages.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MappingState {
    Creating,
    Enabling,
    Enabled,
    Disabling,
    Disabled,
    Updating,
    Deleting,
}

impl MappingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creating => "Creating",
            Self::Enabling => "Enabling",
            Self::Enabled => "Enabled",
            Self::Disabling => "Disabling",
            Self::Disabled => "Disabled",
            Self::Updating => "Updating",
            Self::Deleting => "Deleting",
        }
    }
}

impl fmt::Display for MappingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unrecognized event source mapping state {0:?}; re-apply the engine's infrastructure definition to restore the ingestion mappings")]
pub struct UnknownMappingState(pub String);

impl FromStr for MappingState {
    type Err = UnknownMappingState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Creating" => Ok(Self::Creating),
            "Enabling" => Ok(Self::Enabling),
            "Enabled" => Ok(Self::Enabled),
            "Disabling" => Ok(Self::Disabling),
            "Disabled" => Ok(Self::Disabled),
            "Updating" => Ok(Self::Updating),
            "Deleting" => Ok(Self::Deleting),
            other => Err(UnknownMappingState(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSourceMapping {
    pub uuid: String,
    pub function_name: String,
    /// Raw state string as reported by the backend.
    pub state: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventSourceError {
    #[error("no event source mapping is attached to function {0}")]
    NoMapping(String),

    #[error("event source mapping request failed: {0}")]
    Backend(String),
}

#[async_trait]
pub trait EventSourceMappings: Send + Sync {
    async fn list_mappings(&self, function_name: &str) -> Result<Vec<EventSourceMapping>, EventSourceError>;

    async fn set_enabled(&self, uuid: &str, enabled: bool) -> Result<(), EventSourceError>;

    /// Raw state string of one mapping.
    async fn get_state(&self, uuid: &str) -> Result<String, EventSourceError>;
}
