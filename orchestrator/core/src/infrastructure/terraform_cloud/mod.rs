// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Terraform Cloud HTTP Adapter
//!
//! Anti-Corruption Layer for the Terraform Cloud / Terraform Enterprise v2
//! API. Every request goes through one retrying transport: connection
//! failures, 5xx and 429 are retried up to [`retry::DEFAULT_MAX_ATTEMPTS`]
//! times, timeouts only for methods other than `POST`; anything else is
//! mapped straight to a [`TerraformError`].
//!
//! Writes (`POST`, `PATCH`, `DELETE`) carry the catalog metadata headers
//! when the client was built for a provisioned product.

pub mod jsonapi;
pub mod retry;

use crate::domain::credentials::TfeCredentials;
use crate::domain::terraform::{
    Apply, ConfigurationVersion, Page, PageRequest, ProductMetadata, Project, Run, RunCreateOptions, StateVersion,
    StateVersionOutput, TeamToken, TerraformClientFactory, TerraformCloud, TerraformError, Variable, VariableOptions,
    Workspace, WorkspaceCreateOptions,
};
use async_trait::async_trait;
use bytes::Bytes;
use jsonapi::{
    ApplyAttributes, ConfigurationVersionAttributes, Document, EmptyAttributes, ProjectAttributes, Resource,
    RunAttributes, StateVersionOutputAttributes, TeamTokenAttributes, VariableAttributes, WorkspaceAttributes,
};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use retry::{is_retryable_status, retries_timeout, RetryPolicy};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const USER_AGENT: &str = concat!("tfc-provisioner/", env!("CARGO_PKG_VERSION"));
const API_PATH: &str = "/api/v2";

/// `https://{hostname}/api/v2`; a hostname that already carries a scheme is
/// used as-is (local test servers).
pub fn base_url_for(hostname: &str) -> Result<Url, TerraformError> {
    let hostname = hostname.trim().trim_end_matches('/');
    if hostname.is_empty() {
        return Err(TerraformError::Request("Terraform Cloud hostname is empty".to_string()));
    }
    let root = if hostname.starts_with("http://") || hostname.starts_with("https://") {
        hostname.to_string()
    } else {
        format!("https://{}", hostname)
    };
    Url::parse(&format!("{}{}/", root, API_PATH))
        .map_err(|e| TerraformError::Request(format!("invalid Terraform Cloud hostname {}: {}", hostname, e)))
}

pub struct HttpTerraformCloud {
    client: reqwest::Client,
    base_url: Url,
    token: String,
    metadata: Option<ProductMetadata>,
    retry: RetryPolicy,
}

impl HttpTerraformCloud {
    pub fn new(
        hostname: &str,
        token: impl Into<String>,
        metadata: Option<ProductMetadata>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, TerraformError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TerraformError::Request(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url_for(hostname)?,
            token: token.into(),
            metadata,
            retry,
        })
    }

    fn url(&self, path: &str, query: &[(&str, String)]) -> Result<Url, TerraformError> {
        let mut url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| TerraformError::Request(format!("invalid request path {}: {}", path, e)))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn page_query(page: PageRequest) -> Vec<(&'static str, String)> {
        vec![("page[number]", page.number.to_string()), ("page[size]", page.size.to_string())]
    }

    /// Send one request through the retrying transport and return the body.
    async fn execute(&self, method: Method, url: Url, body: Option<Bytes>, api: bool) -> Result<String, TerraformError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;

            let mut request = self.client.request(method.clone(), url.clone());
            if api {
                request = request
                    .header(AUTHORIZATION, format!("Bearer {}", self.token))
                    .header(CONTENT_TYPE, jsonapi::CONTENT_TYPE);
                if method != Method::GET {
                    if let Some(metadata) = &self.metadata {
                        for (name, value) in metadata.headers() {
                            request = request.header(name, value);
                        }
                    }
                }
            } else {
                request = request.header(CONTENT_TYPE, "application/octet-stream");
            }
            if let Some(body) = &body {
                request = request.body(body.clone());
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    return response
                        .text()
                        .await
                        .map_err(|e| TerraformError::from_transport(e.to_string()));
                }
                Ok(response) => {
                    let status = response.status();
                    let text = match response.text().await {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(%method, path = url.path(), %status, error = %e, "Failed to read Terraform Cloud error body");
                            String::new()
                        }
                    };
                    if is_retryable_status(status) && self.retry.can_retry(attempt) {
                        let delay = self.retry.delay(attempt);
                        warn!(%method, path = url.path(), %status, attempt, ?delay, "Retrying Terraform Cloud request");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(map_status(status, &text, url.path()));
                }
                Err(e) => {
                    let retryable = e.is_connect() || (e.is_timeout() && retries_timeout(&method));
                    if retryable && self.retry.can_retry(attempt) {
                        let delay = self.retry.delay(attempt);
                        warn!(%method, path = url.path(), attempt, error = %e, "Retrying Terraform Cloud request");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(TerraformError::from_transport(e.to_string()));
                }
            }
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<T, TerraformError> {
        let url = self.url(path, query)?;
        debug!(%method, path = url.path(), "Terraform Cloud request");
        let payload = body
            .map(|value| serde_json::to_vec(&value).map(Bytes::from))
            .transpose()
            .map_err(|e| TerraformError::Request(format!("failed to encode request: {}", e)))?;
        let text = self.execute(method, url, payload, true).await?;
        decode(&text)
    }

    async fn call_empty(&self, method: Method, path: &str, body: Option<Value>) -> Result<(), TerraformError> {
        let url = self.url(path, &[])?;
        debug!(%method, path = url.path(), "Terraform Cloud request");
        let payload = body
            .map(|value| serde_json::to_vec(&value).map(Bytes::from))
            .transpose()
            .map_err(|e| TerraformError::Request(format!("failed to encode request: {}", e)))?;
        self.execute(method, url, payload, true).await.map(|_| ())
    }

    async fn get<A: DeserializeOwned, T: From<Resource<A>>>(&self, path: &str) -> Result<T, TerraformError> {
        let document: Document<Resource<A>> = self.call(Method::GET, path, &[], None).await?;
        Ok(T::from(document.data))
    }

    async fn list<A: DeserializeOwned, T: From<Resource<A>>>(
        &self,
        path: &str,
        mut query: Vec<(&'static str, String)>,
        page: PageRequest,
    ) -> Result<Page<T>, TerraformError> {
        query.extend(Self::page_query(page));
        let document: Document<Vec<Resource<A>>> = self.call(Method::GET, path, &query, None).await?;
        Ok(jsonapi::into_page(document))
    }

    async fn write<A: DeserializeOwned, T: From<Resource<A>>>(
        &self,
        method: Method,
        path: &str,
        body: Value,
    ) -> Result<T, TerraformError> {
        let document: Document<Resource<A>> = self.call(method, path, &[], Some(body)).await?;
        Ok(T::from(document.data))
    }
}

fn decode<T: DeserializeOwned>(text: &str) -> Result<T, TerraformError> {
    serde_json::from_str(text).map_err(|e| TerraformError::Request(format!("failed to decode response: {}", e)))
}

fn map_status(status: StatusCode, body: &str, path: &str) -> TerraformError {
    let summary = jsonapi::error_summary(body);
    if status == StatusCode::UNAUTHORIZED || summary == "unauthorized" {
        return TerraformError::AuthInvalid;
    }
    if status == StatusCode::NOT_FOUND {
        return TerraformError::NotFound(path.trim_start_matches(API_PATH).to_string());
    }
    if summary.is_empty() {
        TerraformError::Request(format!("HTTP {}", status))
    } else {
        TerraformError::Request(format!("HTTP {}: {}", status, summary))
    }
}

fn segment(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

fn variable_body(options: &VariableOptions, id: Option<&str>) -> Value {
    let mut data = json!({
        "type": "vars",
        "attributes": {
            "key": options.key,
            "value": options.value,
            "category": options.category,
            "hcl": options.hcl,
            "sensitive": options.sensitive,
        }
    });
    if let Some(id) = id {
        data["id"] = json!(id);
    }
    json!({ "data": data })
}

#[async_trait]
impl TerraformCloud for HttpTerraformCloud {
    async fn list_projects(&self, organization: &str, name: &str, page: PageRequest) -> Result<Page<Project>, TerraformError> {
        let path = format!("organizations/{}/projects", segment(organization));
        self.list::<ProjectAttributes, _>(&path, vec![("filter[names]", name.to_string())], page)
            .await
    }

    async fn create_project(&self, organization: &str, name: &str) -> Result<Project, TerraformError> {
        let path = format!("organizations/{}/projects", segment(organization));
        let body = json!({ "data": { "type": "projects", "attributes": { "name": name } } });
        self.write::<ProjectAttributes, _>(Method::POST, &path, body).await
    }

    async fn list_workspaces(&self, organization: &str, search: &str, page: PageRequest) -> Result<Page<Workspace>, TerraformError> {
        let path = format!("organizations/{}/workspaces", segment(organization));
        self.list::<WorkspaceAttributes, _>(&path, vec![("search[name]", search.to_string())], page)
            .await
    }

    async fn read_workspace(&self, organization: &str, name: &str) -> Result<Workspace, TerraformError> {
        let path = format!("organizations/{}/workspaces/{}", segment(organization), segment(name));
        self.get::<WorkspaceAttributes, _>(&path).await
    }

    async fn create_workspace(&self, organization: &str, options: WorkspaceCreateOptions) -> Result<Workspace, TerraformError> {
        let path = format!("organizations/{}/workspaces", segment(organization));
        let mut attributes = json!({ "name": options.name });
        if let Some(version) = &options.terraform_version {
            attributes["terraform-version"] = json!(version);
        }
        let body = json!({
            "data": {
                "type": "workspaces",
                "attributes": attributes,
                "relationships": {
                    "project": { "data": { "type": "projects", "id": options.project_id } }
                }
            }
        });
        self.write::<WorkspaceAttributes, _>(Method::POST, &path, body).await
    }

    async fn update_workspace_terraform_version(&self, workspace_id: &str, version: &str) -> Result<Workspace, TerraformError> {
        let path = format!("workspaces/{}", segment(workspace_id));
        let body = json!({
            "data": { "type": "workspaces", "attributes": { "terraform-version": version } }
        });
        self.write::<WorkspaceAttributes, _>(Method::PATCH, &path, body).await
    }

    async fn delete_workspace(&self, organization: &str, name: &str) -> Result<(), TerraformError> {
        let path = format!("organizations/{}/workspaces/{}", segment(organization), segment(name));
        self.call_empty(Method::DELETE, &path, None).await
    }

    async fn list_variables(&self, workspace_id: &str, page: PageRequest) -> Result<Page<Variable>, TerraformError> {
        let path = format!("workspaces/{}/vars", segment(workspace_id));
        self.list::<VariableAttributes, _>(&path, Vec::new(), page).await
    }

    async fn create_variable(&self, workspace_id: &str, options: VariableOptions) -> Result<Variable, TerraformError> {
        let path = format!("workspaces/{}/vars", segment(workspace_id));
        self.write::<VariableAttributes, _>(Method::POST, &path, variable_body(&options, None))
            .await
    }

    async fn update_variable(&self, workspace_id: &str, variable_id: &str, options: VariableOptions) -> Result<Variable, TerraformError> {
        let path = format!("workspaces/{}/vars/{}", segment(workspace_id), segment(variable_id));
        self.write::<VariableAttributes, _>(Method::PATCH, &path, variable_body(&options, Some(variable_id)))
            .await
    }

    async fn delete_variable(&self, workspace_id: &str, variable_id: &str) -> Result<(), TerraformError> {
        let path = format!("workspaces/{}/vars/{}", segment(workspace_id), segment(variable_id));
        self.call_empty(Method::DELETE, &path, None).await
    }

    async fn create_configuration_version(&self, workspace_id: &str, auto_queue_runs: bool) -> Result<ConfigurationVersion, TerraformError> {
        let path = format!("workspaces/{}/configuration-versions", segment(workspace_id));
        let body = json!({
            "data": { "type": "configuration-versions", "attributes": { "auto-queue-runs": auto_queue_runs } }
        });
        self.write::<ConfigurationVersionAttributes, _>(Method::POST, &path, body).await
    }

    async fn read_configuration_version(&self, id: &str) -> Result<ConfigurationVersion, TerraformError> {
        self.get::<ConfigurationVersionAttributes, _>(&format!("configuration-versions/{}", segment(id)))
            .await
    }

    async fn upload_configuration(&self, upload_url: &str, archive: Bytes) -> Result<(), TerraformError> {
        let url = Url::parse(upload_url).map_err(|e| TerraformError::Request(format!("invalid upload URL: {}", e)))?;
        debug!(bytes = archive.len(), "Uploading configuration archive");
        self.execute(Method::PUT, url, Some(archive), false).await.map(|_| ())
    }

    async fn create_run(&self, options: RunCreateOptions) -> Result<Run, TerraformError> {
        let mut attributes = json!({
            "is-destroy": options.is_destroy,
            "auto-apply": options.auto_apply,
        });
        if let Some(message) = &options.message {
            attributes["message"] = json!(message);
        }
        let mut relationships = json!({
            "workspace": { "data": { "type": "workspaces", "id": options.workspace_id } }
        });
        if let Some(cv) = &options.configuration_version_id {
            relationships["configuration-version"] = json!({ "data": { "type": "configuration-versions", "id": cv } });
        }
        let body = json!({
            "data": { "type": "runs", "attributes": attributes, "relationships": relationships }
        });
        self.write::<RunAttributes, _>(Method::POST, "runs", body).await
    }

    async fn read_run(&self, run_id: &str) -> Result<Run, TerraformError> {
        self.get::<RunAttributes, _>(&format!("runs/{}", segment(run_id))).await
    }

    async fn read_apply(&self, apply_id: &str) -> Result<Apply, TerraformError> {
        self.get::<ApplyAttributes, _>(&format!("applies/{}", segment(apply_id))).await
    }

    async fn read_current_state_version(&self, workspace_id: &str) -> Result<Option<StateVersion>, TerraformError> {
        let path = format!("workspaces/{}/current-state-version", segment(workspace_id));
        match self.get::<EmptyAttributes, StateVersion>(&path).await {
            Ok(state_version) => Ok(Some(state_version)),
            Err(TerraformError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list_state_version_outputs(&self, state_version_id: &str, page: PageRequest) -> Result<Page<StateVersionOutput>, TerraformError> {
        let path = format!("state-versions/{}/outputs", segment(state_version_id));
        self.list::<StateVersionOutputAttributes, _>(&path, Vec::new(), page).await
    }

    async fn create_team_token(&self, team_id: &str) -> Result<TeamToken, TerraformError> {
        let path = format!("teams/{}/authentication-token", segment(team_id));
        let body = json!({ "data": { "type": "authentication-tokens", "attributes": {} } });
        self.write::<TeamTokenAttributes, _>(Method::POST, &path, body).await
    }
}

/// Builds an [`HttpTerraformCloud`] from the current credentials record.
#[derive(Debug, Clone)]
pub struct HttpTerraformClientFactory {
    timeout: Duration,
    retry: RetryPolicy,
}

impl HttpTerraformClientFactory {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl TerraformClientFactory for HttpTerraformClientFactory {
    async fn connect(
        &self,
        credentials: &TfeCredentials,
        metadata: Option<ProductMetadata>,
    ) -> Result<Arc<dyn TerraformCloud>, TerraformError> {
        let client = HttpTerraformCloud::new(
            &credentials.hostname,
            credentials.token.clone(),
            metadata,
            self.timeout,
            self.retry.clone(),
        )?;
        Ok(Arc::new(client))
    }
}
