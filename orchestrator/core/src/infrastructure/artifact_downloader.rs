// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Artifact Downloader
//!
//! Pulls one product-configuration archive from the object store. When a
//! launch role is supplied the role is assumed first and the fetch runs
//! under the temporary credentials; otherwise the ambient identity is used.

use crate::domain::object_store::{ObjectLocation, ObjectStore, ObjectStoreError, RoleAssumer};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, info};

const SESSION_NAME: &str = "tfc-provisioner-artifact-download";

pub struct ArtifactDownloader {
    store: Arc<dyn ObjectStore>,
    roles: Arc<dyn RoleAssumer>,
}

impl ArtifactDownloader {
    pub fn new(store: Arc<dyn ObjectStore>, roles: Arc<dyn RoleAssumer>) -> Self {
        Self { store, roles }
    }

    /// Download the object at `uri` (`scheme://bucket/key`).
    pub async fn download(&self, uri: &str, launch_role_arn: &str) -> Result<Bytes, ObjectStoreError> {
        let location = ObjectLocation::parse(uri)?;

        let credentials = if launch_role_arn.is_empty() {
            None
        } else {
            debug!(role_arn = %launch_role_arn, "Assuming launch role for artifact download");
            Some(self.roles.assume_role(launch_role_arn, SESSION_NAME).await?)
        };

        let body = self.store.get_object(&location, credentials.as_ref()).await?;
        if body.is_empty() {
            return Err(ObjectStoreError::Empty(location.to_string()));
        }

        info!(artifact = %location, bytes = body.len(), "Downloaded product artifact");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeRoleAssumer, InMemoryObjectStore};

    const ROLE: &str = "arn:aws:iam::123456789042:role/launch";

    #[tokio::test]
    async fn test_download_with_ambient_credentials() {
        let store = Arc::new(InMemoryObjectStore::new().with_object("bucket", "a.tar.gz", b"data".to_vec()));
        let roles = Arc::new(FakeRoleAssumer::new());
        let downloader = ArtifactDownloader::new(store.clone(), roles.clone());

        let body = downloader.download("s3://bucket/a.tar.gz", "").await.unwrap();
        assert_eq!(&body[..], b"data");
        assert!(roles.assumed_roles().is_empty());
        assert_eq!(store.last_credentials(), Some(None));
    }

    #[tokio::test]
    async fn test_download_assumes_launch_role() {
        let store = Arc::new(InMemoryObjectStore::new().with_object("bucket", "a.tar.gz", b"data".to_vec()));
        let roles = Arc::new(FakeRoleAssumer::new());
        let downloader = ArtifactDownloader::new(store.clone(), roles.clone());

        downloader.download("s3://bucket/a.tar.gz", ROLE).await.unwrap();
        assert_eq!(roles.assumed_roles(), vec![ROLE.to_string()]);
        assert!(matches!(store.last_credentials(), Some(Some(_))));
    }

    #[tokio::test]
    async fn test_empty_object_is_fatal() {
        let store = Arc::new(InMemoryObjectStore::new().with_object("bucket", "empty", Vec::new()));
        let downloader = ArtifactDownloader::new(store, Arc::new(FakeRoleAssumer::new()));
        let err = downloader.download("s3://bucket/empty", "").await.unwrap_err();
        assert!(matches!(err, ObjectStoreError::Empty(_)));
    }

    #[tokio::test]
    async fn test_denied_role_surfaces_access_denied() {
        let store = Arc::new(InMemoryObjectStore::new().with_object("bucket", "a", b"x".to_vec()));
        let roles = Arc::new(FakeRoleAssumer::new().denying(ROLE));
        let downloader = ArtifactDownloader::new(store, roles);
        let err = downloader.download("s3://bucket/a", ROLE).await.unwrap_err();
        assert!(matches!(err, ObjectStoreError::AccessDenied(_)));
    }
}
