// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Object Store Port
//!
//! Product-configuration archives are fetched from the cloud object store,
//! optionally under a role assumed for the requesting account.

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use thiserror::Error;
use url::Url;

/// URI scheme of the object store.
pub const OBJECT_STORE_SCHEME: &str = "s3";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ObjectStoreError {
    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("object {0} was not found")]
    NotFound(String),

    #[error("object {0} is empty")]
    Empty(String),

    #[error("invalid object URI {uri}: {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("object store request failed: {0}")]
    Backend(String),
}

/// Bucket + key of one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    /// Parse `scheme://bucket/key…`.
    pub fn parse(uri: &str) -> Result<Self, ObjectStoreError> {
        let invalid = |reason: &str| ObjectStoreError::InvalidUri {
            uri: uri.to_string(),
            reason: reason.to_string(),
        };

        let parsed = Url::parse(uri).map_err(|e| invalid(&e.to_string()))?;
        if parsed.scheme() != OBJECT_STORE_SCHEME {
            return Err(invalid(&format!("scheme must be {}", OBJECT_STORE_SCHEME)));
        }
        let bucket = parsed.host_str().filter(|h| !h.is_empty()).ok_or_else(|| invalid("missing bucket"))?;
        let key = parsed.path().trim_start_matches('/');
        if key.is_empty() {
            return Err(invalid("missing object key"));
        }

        Ok(Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", OBJECT_STORE_SCHEME, self.bucket, self.key)
    }
}

/// Short-lived credentials obtained by assuming a role.
#[derive(Clone, PartialEq, Eq)]
pub struct TemporaryCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
}

impl fmt::Debug for TemporaryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemporaryCredentials")
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait RoleAssumer: Send + Sync {
    async fn assume_role(&self, role_arn: &str, session_name: &str) -> Result<TemporaryCredentials, ObjectStoreError>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch one object. `None` credentials means the ambient identity.
    async fn get_object(
        &self,
        location: &ObjectLocation,
        credentials: Option<&TemporaryCredentials>,
    ) -> Result<Bytes, ObjectStoreError>;
}
