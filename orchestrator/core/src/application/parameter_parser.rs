// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Parameter Parser Use Case
//!
//! Lists the input variables a product configuration declares, so the
//! catalog can render a launch form before anything is provisioned.
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Responsibility:** Validate the artifact reference, download it and
//!   extract declared variables
//! - **Collaborators:**
//!   - Domain: ConfigurationParser, ParserError
//!   - Infrastructure: ArtifactDownloader

use crate::application::HandlerContext;
use crate::domain::object_store::{ObjectStoreError, OBJECT_STORE_SCHEME};
use crate::domain::operation::{Artifact, ARTIFACT_TYPE_OBJECT_STORE};
use crate::domain::parameters::{ParserError, TerraformVariable};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

const IAM_SERVICE: &str = "iam";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterParserRequest {
    #[serde(default)]
    pub artifact: Option<Artifact>,
    #[serde(default)]
    pub launch_role_arn: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterParserResponse {
    pub parameters: Vec<TerraformVariable>,
}

#[async_trait]
pub trait ParameterParserUseCase: Send + Sync {
    async fn parse(&self, request: ParameterParserRequest) -> Result<ParameterParserResponse, ParserError>;
}

pub struct StandardParameterParserUseCase {
    ctx: HandlerContext,
}

impl StandardParameterParserUseCase {
    pub fn new(ctx: HandlerContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ParameterParserUseCase for StandardParameterParserUseCase {
    async fn parse(&self, request: ParameterParserRequest) -> Result<ParameterParserResponse, ParserError> {
        let artifact = validate(&request)?;

        let archive = self
            .ctx
            .cancellable(async {
                self.ctx
                    .downloader
                    .download(&artifact.path, &request.launch_role_arn)
                    .await
                    .map_err(|err| match err {
                        ObjectStoreError::AccessDenied(cause) => ParserError::AccessDenied(cause),
                        other => ParserError::Archive(other.to_string()),
                    })
            })
            .await?;

        let parser = self.ctx.parser.clone();
        let parameters = self
            .ctx
            .cancellable(async move {
                tokio::task::spawn_blocking(move || parser.parse(&archive))
                    .await
                    .map_err(|e| ParserError::Archive(format!("parser task failed: {}", e)))?
            })
            .await?;

        info!(artifact = %artifact.path, parameters = parameters.len(), "Parsed product parameters");
        Ok(ParameterParserResponse { parameters })
    }
}

/// Check the request shape before touching the object store.
pub fn validate(request: &ParameterParserRequest) -> Result<&Artifact, ParserError> {
    let artifact = request.artifact.as_ref().ok_or_else(|| ParserError::InvalidParameter {
        field: "artifact",
        value: "<missing>".to_string(),
    })?;

    if artifact.path.is_empty() {
        return Err(invalid("artifact.path", &artifact.path));
    }
    if artifact.artifact_type.is_empty() || artifact.artifact_type != ARTIFACT_TYPE_OBJECT_STORE {
        return Err(invalid("artifact.type", &artifact.artifact_type));
    }

    let uri = Url::parse(&artifact.path).map_err(|_| invalid("artifact.path", &artifact.path))?;
    let has_host = uri.host_str().is_some_and(|h| !h.is_empty());
    let has_path = !uri.path().trim_start_matches('/').is_empty();
    if uri.scheme() != OBJECT_STORE_SCHEME || !has_host || !has_path {
        return Err(invalid("artifact.path", &artifact.path));
    }

    if !request.launch_role_arn.is_empty() && arn_service(&request.launch_role_arn) != Some(IAM_SERVICE) {
        return Err(invalid("launchRoleArn", &request.launch_role_arn));
    }

    Ok(artifact)
}

fn invalid(field: &'static str, value: &str) -> ParserError {
    ParserError::InvalidParameter {
        field,
        value: value.to_string(),
    }
}

/// Service segment of `arn:partition:service:region:account:resource`.
fn arn_service(arn: &str) -> Option<&str> {
    let parts: Vec<&str> = arn.splitn(6, ':').collect();
    match parts.as_slice() {
        ["arn", partition, service, _region, _account, resource]
            if !partition.is_empty() && !service.is_empty() && !resource.is_empty() =>
        {
            Some(*service)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ProvisioningError;
    use crate::testing::build_archive;
    use crate::testing::{FakeRoleAssumer, Harness, InMemoryObjectStore};
    use std::sync::Arc;

    const ROLE: &str = "arn:aws:iam::123456789042:role/launch";

    fn request(path: &str, artifact_type: &str, role: &str) -> ParameterParserRequest {
        ParameterParserRequest {
            artifact: Some(Artifact {
                path: path.into(),
                artifact_type: artifact_type.into(),
            }),
            launch_role_arn: role.into(),
        }
    }

    fn assert_invalid(request: ParameterParserRequest, expected_field: &str) {
        match validate(&request) {
            Err(ParserError::InvalidParameter { field, .. }) => assert_eq!(field, expected_field),
            other => panic!("expected invalid {}, got {:?}", expected_field, other),
        }
    }

    #[test]
    fn test_validation_rules() {
        assert!(validate(&request("s3://bucket/product.tar.gz", "AWS_S3", ROLE)).is_ok());
        assert!(validate(&request("s3://bucket/product.tar.gz", "AWS_S3", "")).is_ok());

        assert_invalid(ParameterParserRequest::default(), "artifact");
        assert_invalid(request("", "AWS_S3", ""), "artifact.path");
        assert_invalid(request("s3://bucket/a.tar.gz", "", ""), "artifact.type");
        assert_invalid(request("s3://bucket/a.tar.gz", "MARKETPLACE", ""), "artifact.type");
        assert_invalid(request("https://bucket/a.tar.gz", "AWS_S3", ""), "artifact.path");
        assert_invalid(request("s3://bucket", "AWS_S3", ""), "artifact.path");
        assert_invalid(request("not a uri", "AWS_S3", ""), "artifact.path");
        assert_invalid(
            request("s3://bucket/a.tar.gz", "AWS_S3", "arn:aws:s3:::bucket/key"),
            "launchRoleArn",
        );
        assert_invalid(request("s3://bucket/a.tar.gz", "AWS_S3", "role/launch"), "launchRoleArn");
    }

    #[tokio::test]
    async fn test_declared_variables_are_returned_in_order() {
        let mut harness = Harness::new();
        let archive = build_archive(&[(
            "main.tf",
            r#"
variable "bucket_name" {
  type        = string
  description = "Name of the bucket"
}

variable "db_password" {
  type      = string
  sensitive = true
  default   = "changeme"
}
"#
            .as_bytes(),
        )]);
        harness.object_store = Arc::new(InMemoryObjectStore::new().with_object("bucket", "product.tar.gz", archive));

        let use_case = StandardParameterParserUseCase::new(harness.context().await.unwrap());
        let response = use_case
            .parse(request("s3://bucket/product.tar.gz", "AWS_S3", ROLE))
            .await
            .unwrap();

        let keys: Vec<_> = response.parameters.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["bucket_name", "db_password"]);
        assert_eq!(response.parameters[0].description, "Name of the bucket");
        assert!(response.parameters[1].is_no_echo);
        assert_eq!(harness.roles.assumed_roles(), vec![ROLE.to_string()]);
    }

    #[tokio::test]
    async fn test_denied_role_is_access_denied() {
        let mut harness = Harness::new();
        harness.roles = Arc::new(FakeRoleAssumer::new().denying(ROLE));

        let use_case = StandardParameterParserUseCase::new(harness.context().await.unwrap());
        let err = use_case
            .parse(request("s3://bucket/product.tar.gz", "AWS_S3", ROLE))
            .await
            .unwrap_err();
        assert!(matches!(err, ParserError::AccessDenied(_)));
    }

    #[tokio::test]
    async fn test_missing_object_is_archive_error() {
        let harness = Harness::new();
        let use_case = StandardParameterParserUseCase::new(harness.context().await.unwrap());
        let err = use_case
            .parse(request("s3://bucket/missing.tar.gz", "AWS_S3", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, ParserError::Archive(_)));
    }

    #[tokio::test]
    async fn test_cancelled_context_skips_the_download() {
        let harness = Harness::new();
        let ctx = harness.context().await.unwrap();
        ctx.cancellation.cancel();

        let err = StandardParameterParserUseCase::new(ctx)
            .parse(request("s3://bucket/product.tar.gz", "AWS_S3", ROLE))
            .await
            .unwrap_err();
        assert!(matches!(err, ParserError::Workflow(ProvisioningError::Cancelled)));
        assert!(harness.roles.assumed_roles().is_empty());
    }
}
