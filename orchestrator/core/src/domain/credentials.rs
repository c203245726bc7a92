// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Terraform Cloud Credentials
//!
//! The credentials record lives in the cloud secret store as a JSON string
//! `{"hostname": …, "team_id": …, "token": …}`. Every handler reads it on
//! each invocation; only the rotation controller writes it, and only the
//! token field changes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Decoded credentials record.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TfeCredentials {
    pub hostname: String,
    pub team_id: String,
    pub token: String,
}

// Keep the token out of logs.
impl fmt::Debug for TfeCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TfeCredentials")
            .field("hostname", &self.hostname)
            .field("team_id", &self.team_id)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum SecretStoreError {
    #[error("secret {0} was not found")]
    NotFound(String),

    #[error("secret {id} could not be decoded: {reason}")]
    Decode { id: String, reason: String },

    #[error("secret store request failed: {0}")]
    Backend(String),
}

/// Raw string secrets, keyed by secret identifier.
#[async_trait]
pub trait SecretsBackend: Send + Sync {
    async fn get_secret_string(&self, secret_id: &str) -> Result<String, SecretStoreError>;

    async fn put_secret_string(&self, secret_id: &str, value: &str) -> Result<(), SecretStoreError>;
}

/// Typed access to the credentials record.
#[async_trait]
pub trait CredentialsStore: Send + Sync {
    /// Fetch the current credentials record.
    async fn read(&self) -> Result<TfeCredentials, SecretStoreError>;

    /// Replace the stored token, preserving hostname and team id.
    async fn write_token(&self, token: &str) -> Result<(), SecretStoreError>;
}
