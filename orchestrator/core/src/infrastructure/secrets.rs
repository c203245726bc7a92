// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Secret Store Adapter
//!
//! Typed [`CredentialsStore`] over a raw [`SecretsBackend`]. Construction
//! performs one read so the hostname and team id are cached for later token
//! writes; a failure at that point is fatal to the handler.

use crate::domain::credentials::{CredentialsStore, SecretStoreError, SecretsBackend, TfeCredentials};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

pub struct SecretStoreAdapter {
    backend: Arc<dyn SecretsBackend>,
    secret_id: String,
    cached: RwLock<TfeCredentials>,
}

impl SecretStoreAdapter {
    pub async fn new(backend: Arc<dyn SecretsBackend>, secret_id: impl Into<String>) -> Result<Self, SecretStoreError> {
        let secret_id = secret_id.into();
        let credentials = fetch(backend.as_ref(), &secret_id).await?;
        debug!(secret_id = %secret_id, hostname = %credentials.hostname, "Loaded Terraform Cloud credentials");

        Ok(Self {
            backend,
            secret_id,
            cached: RwLock::new(credentials),
        })
    }

    pub fn secret_id(&self) -> &str {
        &self.secret_id
    }
}

async fn fetch(backend: &dyn SecretsBackend, secret_id: &str) -> Result<TfeCredentials, SecretStoreError> {
    let raw = backend.get_secret_string(secret_id).await?;
    serde_json::from_str(&raw).map_err(|e| SecretStoreError::Decode {
        id: secret_id.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl CredentialsStore for SecretStoreAdapter {
    async fn read(&self) -> Result<TfeCredentials, SecretStoreError> {
        let credentials = fetch(self.backend.as_ref(), &self.secret_id).await?;
        *self.cached.write() = credentials.clone();
        Ok(credentials)
    }

    async fn write_token(&self, token: &str) -> Result<(), SecretStoreError> {
        let updated = {
            let cached = self.cached.read();
            TfeCredentials {
                hostname: cached.hostname.clone(),
                team_id: cached.team_id.clone(),
                token: token.to_string(),
            }
        };

        let raw = serde_json::to_string(&updated).map_err(|e| SecretStoreError::Decode {
            id: self.secret_id.clone(),
            reason: e.to_string(),
        })?;
        self.backend.put_secret_string(&self.secret_id, &raw).await?;
        *self.cached.write() = updated;

        info!(secret_id = %self.secret_id, "Stored rotated Terraform Cloud team token");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemorySecretsBackend;

    const RECORD: &str = r#"{"hostname":"app.terraform.io","team_id":"team-1","token":"old"}"#;

    #[tokio::test]
    async fn test_construction_requires_secret() {
        let backend = Arc::new(InMemorySecretsBackend::new());
        let result = SecretStoreAdapter::new(backend, "missing").await;
        assert!(matches!(result, Err(SecretStoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_undecodable_secret() {
        let backend = Arc::new(InMemorySecretsBackend::new().with_secret("creds", "not json"));
        let result = SecretStoreAdapter::new(backend, "creds").await;
        assert!(matches!(result, Err(SecretStoreError::Decode { .. })));
    }

    #[tokio::test]
    async fn test_write_preserves_hostname_and_team() {
        let backend = Arc::new(InMemorySecretsBackend::new().with_secret("creds", RECORD));
        let adapter = SecretStoreAdapter::new(backend.clone(), "creds").await.unwrap();

        adapter.write_token("new").await.unwrap();

        let stored: TfeCredentials = serde_json::from_str(&backend.secret("creds").unwrap()).unwrap();
        assert_eq!(stored.hostname, "app.terraform.io");
        assert_eq!(stored.team_id, "team-1");
        assert_eq!(stored.token, "new");
        assert_eq!(adapter.read().await.unwrap().token, "new");
    }
}
