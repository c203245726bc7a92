// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! JSON:API wire models for the Terraform Cloud v2 API and their
//! translation into domain types.

use crate::domain::run_status::RunStatus;
use crate::domain::terraform::{
    Apply, ConfigurationStatus, ConfigurationVersion, Page, Project, Run, StateVersion, StateVersionOutput,
    TeamToken, Variable, VariableCategory, Workspace,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

pub const CONTENT_TYPE: &str = "application/vnd.api+json";

#[derive(Debug, Deserialize)]
pub struct Document<T> {
    pub data: T,
    #[serde(default)]
    pub meta: Option<Meta>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Pagination {
    #[serde(default)]
    pub total_count: u64,
}

#[derive(Debug, Deserialize)]
pub struct Resource<A> {
    pub id: String,
    pub attributes: A,
    #[serde(default)]
    pub relationships: HashMap<String, Relationship>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Relationship {
    #[serde(default)]
    pub data: Option<Linkage>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Linkage {
    One(Identifier),
    Many(Vec<Identifier>),
}

#[derive(Debug, Deserialize)]
pub struct Identifier {
    pub id: String,
}

impl<A> Resource<A> {
    fn related_id(&self, name: &str) -> Option<String> {
        match self.relationships.get(name)?.data.as_ref()? {
            Linkage::One(identifier) => Some(identifier.id.clone()),
            Linkage::Many(_) => None,
        }
    }

    fn related_ids(&self, name: &str) -> Vec<String> {
        match self.relationships.get(name).and_then(|r| r.data.as_ref()) {
            Some(Linkage::Many(identifiers)) => identifiers.iter().map(|i| i.id.clone()).collect(),
            Some(Linkage::One(identifier)) => vec![identifier.id.clone()],
            None => Vec::new(),
        }
    }
}

/// Collect a list document into a domain page.
pub fn into_page<A, T>(document: Document<Vec<Resource<A>>>) -> Page<T>
where
    T: From<Resource<A>>,
{
    let listed = document.data.len() as u64;
    let total_count = document
        .meta
        .and_then(|meta| meta.pagination)
        .map(|pagination| pagination.total_count)
        .unwrap_or(listed);
    Page::new(document.data.into_iter().map(T::from).collect(), total_count)
}

// ============================================================================
// Attributes
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ProjectAttributes {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WorkspaceAttributes {
    pub name: String,
    #[serde(default)]
    pub terraform_version: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VariableAttributes {
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
    pub category: VariableCategory,
    #[serde(default)]
    pub hcl: bool,
    #[serde(default)]
    pub sensitive: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConfigurationVersionAttributes {
    pub status: ConfigurationStatus,
    #[serde(default)]
    pub upload_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunAttributes {
    pub status: RunStatus,
    #[serde(default)]
    pub is_destroy: bool,
}

#[derive(Debug, Deserialize)]
pub struct ApplyAttributes {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct EmptyAttributes {}

#[derive(Debug, Deserialize)]
pub struct StateVersionOutputAttributes {
    pub name: String,
    #[serde(default)]
    pub sensitive: bool,
    #[serde(rename = "type", default)]
    pub output_type: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Deserialize)]
pub struct TeamTokenAttributes {
    #[serde(default)]
    pub token: Option<String>,
}

// ============================================================================
// Translation
// ============================================================================

impl From<Resource<ProjectAttributes>> for Project {
    fn from(resource: Resource<ProjectAttributes>) -> Self {
        Self {
            id: resource.id,
            name: resource.attributes.name,
        }
    }
}

impl From<Resource<WorkspaceAttributes>> for Workspace {
    fn from(resource: Resource<WorkspaceAttributes>) -> Self {
        Self {
            project_id: resource.related_id("project"),
            id: resource.id,
            name: resource.attributes.name,
            terraform_version: resource.attributes.terraform_version,
        }
    }
}

impl From<Resource<VariableAttributes>> for Variable {
    fn from(resource: Resource<VariableAttributes>) -> Self {
        let attributes = resource.attributes;
        Self {
            id: resource.id,
            key: attributes.key,
            value: attributes.value.unwrap_or_default(),
            category: attributes.category,
            hcl: attributes.hcl,
            sensitive: attributes.sensitive,
        }
    }
}

impl From<Resource<ConfigurationVersionAttributes>> for ConfigurationVersion {
    fn from(resource: Resource<ConfigurationVersionAttributes>) -> Self {
        Self {
            id: resource.id,
            status: resource.attributes.status,
            upload_url: resource.attributes.upload_url,
        }
    }
}

impl From<Resource<RunAttributes>> for Run {
    fn from(resource: Resource<RunAttributes>) -> Self {
        Self {
            workspace_id: resource.related_id("workspace"),
            apply_id: resource.related_id("apply"),
            id: resource.id,
            status: resource.attributes.status,
            is_destroy: resource.attributes.is_destroy,
        }
    }
}

impl From<Resource<ApplyAttributes>> for Apply {
    fn from(resource: Resource<ApplyAttributes>) -> Self {
        Self {
            state_version_ids: resource.related_ids("state-versions"),
            id: resource.id,
            status: resource.attributes.status,
        }
    }
}

impl From<Resource<EmptyAttributes>> for StateVersion {
    fn from(resource: Resource<EmptyAttributes>) -> Self {
        Self { id: resource.id }
    }
}

impl From<Resource<StateVersionOutputAttributes>> for StateVersionOutput {
    fn from(resource: Resource<StateVersionOutputAttributes>) -> Self {
        let attributes = resource.attributes;
        Self {
            id: resource.id,
            name: attributes.name,
            value: attributes.value,
            sensitive: attributes.sensitive,
            output_type: attributes.output_type,
        }
    }
}

impl From<Resource<TeamTokenAttributes>> for TeamToken {
    fn from(resource: Resource<TeamTokenAttributes>) -> Self {
        Self {
            id: resource.id,
            token: resource.attributes.token.unwrap_or_default(),
        }
    }
}

// ============================================================================
// Error documents
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ErrorDocument {
    #[serde(default)]
    pub errors: Vec<ErrorObject>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ErrorObject {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

/// Human-readable summary of an error response body.
pub fn error_summary(body: &str) -> String {
    let summary = serde_json::from_str::<ErrorDocument>(body)
        .map(|document| {
            document
                .errors
                .into_iter()
                .filter_map(|e| match (e.title, e.detail) {
                    (Some(title), Some(detail)) if !detail.is_empty() => Some(format!("{}: {}", title, detail)),
                    (Some(title), _) => Some(title),
                    (None, detail) => detail,
                })
                .collect::<Vec<_>>()
                .join("; ")
        })
        .unwrap_or_default();

    if summary.is_empty() {
        body.trim().to_string()
    } else {
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_relationships() {
        let body = r#"{
            "data": {
                "id": "run-1",
                "type": "runs",
                "attributes": {"status": "applied", "is-destroy": true},
                "relationships": {
                    "apply": {"data": {"id": "apply-1", "type": "applies"}},
                    "workspace": {"data": {"id": "ws-1", "type": "workspaces"}},
                    "plan": {"data": null}
                }
            }
        }"#;
        let document: Document<Resource<RunAttributes>> = serde_json::from_str(body).unwrap();
        let run = Run::from(document.data);
        assert_eq!(run.status, RunStatus::Applied);
        assert_eq!(run.apply_id.as_deref(), Some("apply-1"));
        assert_eq!(run.workspace_id.as_deref(), Some("ws-1"));
        assert!(run.is_destroy);
    }

    #[test]
    fn test_apply_state_versions() {
        let body = r#"{"data": {"id": "apply-1", "type": "applies",
            "attributes": {"status": "finished"},
            "relationships": {"state-versions": {"data": [
                {"id": "sv-1", "type": "state-versions"},
                {"id": "sv-2", "type": "state-versions"}
            ]}}}}"#;
        let document: Document<Resource<ApplyAttributes>> = serde_json::from_str(body).unwrap();
        assert_eq!(Apply::from(document.data).state_version_ids, vec!["sv-1", "sv-2"]);
    }

    #[test]
    fn test_list_page_total() {
        let body = r#"{"data": [
            {"id": "var-1", "type": "vars", "attributes": {"key": "a", "value": null, "category": "env", "sensitive": true}}
        ], "meta": {"pagination": {"current-page": 1, "total-count": 101}}}"#;
        let document: Document<Vec<Resource<VariableAttributes>>> = serde_json::from_str(body).unwrap();
        let page: Page<Variable> = into_page(document);
        assert_eq!(page.total_count, 101);
        assert_eq!(page.items[0].value, "");
        assert_eq!(page.items[0].category, VariableCategory::Env);
    }

    #[test]
    fn test_error_summary() {
        let body = r#"{"errors":[{"status":"422","title":"invalid attribute","detail":"Name has already been taken"}]}"#;
        assert_eq!(error_summary(body), "invalid attribute: Name has already been taken");
        assert_eq!(error_summary("plain text\n"), "plain text");
    }
}
