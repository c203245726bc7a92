// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-process Terraform Cloud.
//!
//! Behaves like the remote platform as far as the stage handlers can
//! observe: workspace search is a "contains" match, every list paginates
//! with the requested page size and reports `total_count`, uploads flip a
//! configuration version to `uploaded`, and `create_team_token` replaces
//! the team's token. Failures can be injected per operation name.

use crate::domain::credentials::TfeCredentials;
use crate::domain::run_status::RunStatus;
use crate::domain::terraform::{
    Apply, ConfigurationStatus, ConfigurationVersion, Page, PageRequest, ProductMetadata, Project, Run,
    RunCreateOptions, StateVersion, StateVersionOutput, TeamToken, TerraformClientFactory, TerraformCloud,
    TerraformError, Variable, VariableCategory, VariableOptions, Workspace, WorkspaceCreateOptions,
};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Token handed out by `create_team_token` unless overridden.
pub const NEW_TEAM_TOKEN: &str = "newsupers3cret";

const UPLOAD_URL_PREFIX: &str = "https://archivist.terraform.fake/v1/object/";

#[derive(Default)]
struct State {
    next_id: u64,
    projects: Vec<(String, Project)>,
    workspaces: Vec<(String, Workspace)>,
    variables: HashMap<String, Vec<Variable>>,
    configuration_versions: Vec<ConfigurationVersion>,
    uploads: HashMap<String, Bytes>,
    runs: Vec<Run>,
    run_options: Vec<RunCreateOptions>,
    applies: HashMap<String, Apply>,
    current_state_versions: HashMap<String, String>,
    outputs: HashMap<String, Vec<StateVersionOutput>>,
    team_tokens: HashMap<String, String>,
    new_team_token: Option<String>,
    hold_uploads: bool,
    failures: HashMap<String, TerraformError>,
    calls: Vec<String>,
}

impl State {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn enter(&mut self, operation: &str) -> Result<(), TerraformError> {
        self.calls.push(operation.to_string());
        match self.failures.get(operation) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn workspace_exists(&self, workspace_id: &str) -> bool {
        self.workspaces.iter().any(|(_, w)| w.id == workspace_id)
    }
}

fn page_of<T: Clone>(items: &[T], request: PageRequest) -> Page<T> {
    let start = (request.number.saturating_sub(1) as usize).saturating_mul(request.size as usize);
    let end = start.saturating_add(request.size as usize).min(items.len());
    let slice = if start < items.len() { items[start..end].to_vec() } else { Vec::new() };
    Page::new(slice, items.len() as u64)
}

#[derive(Default)]
pub struct FakeTerraformCloud {
    state: Mutex<State>,
}

impl FakeTerraformCloud {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------------

    pub fn seed_project(&self, organization: &str, name: &str) -> Project {
        let mut state = self.state.lock();
        let project = Project {
            id: state.id("prj"),
            name: name.to_string(),
        };
        state.projects.push((organization.to_string(), project.clone()));
        project
    }

    pub fn seed_workspace(&self, organization: &str, name: &str) -> Workspace {
        let mut state = self.state.lock();
        let workspace = Workspace {
            id: state.id("ws"),
            name: name.to_string(),
            project_id: None,
            terraform_version: None,
        };
        state.workspaces.push((organization.to_string(), workspace.clone()));
        workspace
    }

    pub fn seed_variable(&self, workspace_id: &str, key: &str, value: &str, category: VariableCategory) -> Variable {
        let mut state = self.state.lock();
        let variable = Variable {
            id: state.id("var"),
            key: key.to_string(),
            value: value.to_string(),
            category,
            hcl: false,
            sensitive: false,
        };
        state
            .variables
            .entry(workspace_id.to_string())
            .or_default()
            .push(variable.clone());
        variable
    }

    pub fn seed_run(&self, run_id: &str, workspace_id: &str, status: RunStatus, apply_id: Option<&str>) {
        self.state.lock().runs.push(Run {
            id: run_id.to_string(),
            status,
            workspace_id: Some(workspace_id.to_string()),
            apply_id: apply_id.map(str::to_string),
            is_destroy: false,
        });
    }

    pub fn seed_apply(&self, apply_id: &str, state_version_ids: &[&str]) {
        self.state.lock().applies.insert(
            apply_id.to_string(),
            Apply {
                id: apply_id.to_string(),
                status: "finished".to_string(),
                state_version_ids: state_version_ids.iter().map(|s| s.to_string()).collect(),
            },
        );
    }

    /// Attach string outputs to a state version, in order.
    pub fn seed_outputs<I, K, V>(&self, state_version_id: &str, outputs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut state = self.state.lock();
        let mut seeded = Vec::new();
        for (name, value) in outputs {
            let value = value.into();
            let output_type = match &value {
                Value::String(_) => "string",
                Value::Number(_) => "number",
                Value::Bool(_) => "bool",
                Value::Array(_) => "tuple",
                Value::Object(_) => "object",
                Value::Null => "null",
            };
            seeded.push(StateVersionOutput {
                id: state.id("wsout"),
                name: name.into(),
                value,
                sensitive: false,
                output_type: output_type.to_string(),
            });
        }
        state
            .outputs
            .entry(state_version_id.to_string())
            .or_default()
            .extend(seeded);
    }

    pub fn set_current_state_version(&self, workspace_id: &str, state_version_id: &str) {
        self.state
            .lock()
            .current_state_versions
            .insert(workspace_id.to_string(), state_version_id.to_string());
    }

    pub fn set_run_status(&self, run_id: &str, status: RunStatus) {
        let mut state = self.state.lock();
        if let Some(run) = state.runs.iter_mut().find(|r| r.id == run_id) {
            run.status = status;
        }
    }

    pub fn set_team_token(&self, team_id: &str, token: &str) {
        self.state
            .lock()
            .team_tokens
            .insert(team_id.to_string(), token.to_string());
    }

    /// Token returned by the next `create_team_token`.
    pub fn set_new_team_token(&self, token: &str) {
        self.state.lock().new_team_token = Some(token.to_string());
    }

    /// Leave uploaded configuration versions in `pending`.
    pub fn hold_uploads(&self) {
        self.state.lock().hold_uploads = true;
    }

    /// Make every call to `operation` (a trait method name) fail with `err`.
    pub fn fail_on(&self, operation: &str, err: TerraformError) {
        self.state.lock().failures.insert(operation.to_string(), err);
    }

    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn workspace(&self, organization: &str, name: &str) -> Option<Workspace> {
        self.state
            .lock()
            .workspaces
            .iter()
            .find(|(org, w)| org == organization && w.name == name)
            .map(|(_, w)| w.clone())
    }

    pub fn workspaces(&self) -> Vec<Workspace> {
        self.state.lock().workspaces.iter().map(|(_, w)| w.clone()).collect()
    }

    pub fn projects(&self) -> Vec<Project> {
        self.state.lock().projects.iter().map(|(_, p)| p.clone()).collect()
    }

    pub fn variables(&self, workspace_id: &str) -> Vec<Variable> {
        self.state
            .lock()
            .variables
            .get(workspace_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn configuration_versions(&self) -> Vec<ConfigurationVersion> {
        self.state.lock().configuration_versions.clone()
    }

    pub fn uploaded_archive(&self, configuration_version_id: &str) -> Option<Bytes> {
        self.state.lock().uploads.get(configuration_version_id).cloned()
    }

    pub fn runs(&self) -> Vec<Run> {
        self.state.lock().runs.clone()
    }

    pub fn run_options(&self) -> Vec<RunCreateOptions> {
        self.state.lock().run_options.clone()
    }

    pub fn team_token(&self, team_id: &str) -> Option<String> {
        self.state.lock().team_tokens.get(team_id).cloned()
    }

    /// Names of the trait methods called so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.state.lock().calls.iter().filter(|c| *c == operation).count()
    }
}

#[async_trait]
impl TerraformCloud for FakeTerraformCloud {
    async fn list_projects(&self, organization: &str, name: &str, page: PageRequest) -> Result<Page<Project>, TerraformError> {
        let mut state = self.state.lock();
        state.enter("list_projects")?;
        let matching: Vec<Project> = state
            .projects
            .iter()
            .filter(|(org, p)| org == organization && (name.is_empty() || p.name == name))
            .map(|(_, p)| p.clone())
            .collect();
        Ok(page_of(&matching, page))
    }

    async fn create_project(&self, organization: &str, name: &str) -> Result<Project, TerraformError> {
        let mut state = self.state.lock();
        state.enter("create_project")?;
        if state.projects.iter().any(|(org, p)| org == organization && p.name == name) {
            return Err(TerraformError::Request(format!("project {} already exists", name)));
        }
        let project = Project {
            id: state.id("prj"),
            name: name.to_string(),
        };
        state.projects.push((organization.to_string(), project.clone()));
        Ok(project)
    }

    async fn list_workspaces(&self, organization: &str, search: &str, page: PageRequest) -> Result<Page<Workspace>, TerraformError> {
        let mut state = self.state.lock();
        state.enter("list_workspaces")?;
        let matching: Vec<Workspace> = state
            .workspaces
            .iter()
            .filter(|(org, w)| org == organization && w.name.contains(search))
            .map(|(_, w)| w.clone())
            .collect();
        Ok(page_of(&matching, page))
    }

    async fn read_workspace(&self, organization: &str, name: &str) -> Result<Workspace, TerraformError> {
        let mut state = self.state.lock();
        state.enter("read_workspace")?;
        state
            .workspaces
            .iter()
            .find(|(org, w)| org == organization && w.name == name)
            .map(|(_, w)| w.clone())
            .ok_or_else(|| TerraformError::NotFound(format!("workspace {}", name)))
    }

    async fn create_workspace(&self, organization: &str, options: WorkspaceCreateOptions) -> Result<Workspace, TerraformError> {
        let mut state = self.state.lock();
        state.enter("create_workspace")?;
        if state
            .workspaces
            .iter()
            .any(|(org, w)| org == organization && w.name == options.name)
        {
            return Err(TerraformError::Request(format!("workspace {} already exists", options.name)));
        }
        let workspace = Workspace {
            id: state.id("ws"),
            name: options.name,
            project_id: Some(options.project_id),
            terraform_version: options.terraform_version,
        };
        state.workspaces.push((organization.to_string(), workspace.clone()));
        Ok(workspace)
    }

    async fn update_workspace_terraform_version(&self, workspace_id: &str, version: &str) -> Result<Workspace, TerraformError> {
        let mut state = self.state.lock();
        state.enter("update_workspace_terraform_version")?;
        let (_, workspace) = state
            .workspaces
            .iter_mut()
            .find(|(_, w)| w.id == workspace_id)
            .ok_or_else(|| TerraformError::NotFound(format!("workspace {}", workspace_id)))?;
        workspace.terraform_version = Some(version.to_string());
        Ok(workspace.clone())
    }

    async fn delete_workspace(&self, organization: &str, name: &str) -> Result<(), TerraformError> {
        let mut state = self.state.lock();
        state.enter("delete_workspace")?;
        let position = state
            .workspaces
            .iter()
            .position(|(org, w)| org == organization && w.name == name)
            .ok_or_else(|| TerraformError::NotFound(format!("workspace {}", name)))?;
        let (_, workspace) = state.workspaces.remove(position);
        state.variables.remove(&workspace.id);
        Ok(())
    }

    async fn list_variables(&self, workspace_id: &str, page: PageRequest) -> Result<Page<Variable>, TerraformError> {
        let mut state = self.state.lock();
        state.enter("list_variables")?;
        if !state.workspace_exists(workspace_id) {
            return Err(TerraformError::NotFound(format!("workspace {}", workspace_id)));
        }
        let variables = state.variables.get(workspace_id).cloned().unwrap_or_default();
        Ok(page_of(&variables, page))
    }

    async fn create_variable(&self, workspace_id: &str, options: VariableOptions) -> Result<Variable, TerraformError> {
        let mut state = self.state.lock();
        state.enter("create_variable")?;
        if !state.workspace_exists(workspace_id) {
            return Err(TerraformError::NotFound(format!("workspace {}", workspace_id)));
        }
        let duplicate = state
            .variables
            .get(workspace_id)
            .is_some_and(|vars| vars.iter().any(|v| v.key == options.key && v.category == options.category));
        if duplicate {
            return Err(TerraformError::Request(format!("variable {} already exists", options.key)));
        }
        let variable = Variable {
            id: state.id("var"),
            key: options.key,
            value: options.value,
            category: options.category,
            hcl: options.hcl,
            sensitive: options.sensitive,
        };
        state
            .variables
            .entry(workspace_id.to_string())
            .or_default()
            .push(variable.clone());
        Ok(variable)
    }

    async fn update_variable(&self, workspace_id: &str, variable_id: &str, options: VariableOptions) -> Result<Variable, TerraformError> {
        let mut state = self.state.lock();
        state.enter("update_variable")?;
        let variable = state
            .variables
            .get_mut(workspace_id)
            .and_then(|vars| vars.iter_mut().find(|v| v.id == variable_id))
            .ok_or_else(|| TerraformError::NotFound(format!("variable {}", variable_id)))?;
        variable.key = options.key;
        variable.value = options.value;
        variable.category = options.category;
        variable.hcl = options.hcl;
        variable.sensitive = options.sensitive;
        Ok(variable.clone())
    }

    async fn delete_variable(&self, workspace_id: &str, variable_id: &str) -> Result<(), TerraformError> {
        let mut state = self.state.lock();
        state.enter("delete_variable")?;
        let variables = state
            .variables
            .get_mut(workspace_id)
            .ok_or_else(|| TerraformError::NotFound(format!("variable {}", variable_id)))?;
        let before = variables.len();
        variables.retain(|v| v.id != variable_id);
        if variables.len() == before {
            return Err(TerraformError::NotFound(format!("variable {}", variable_id)));
        }
        Ok(())
    }

    async fn create_configuration_version(&self, workspace_id: &str, _auto_queue_runs: bool) -> Result<ConfigurationVersion, TerraformError> {
        let mut state = self.state.lock();
        state.enter("create_configuration_version")?;
        if !state.workspace_exists(workspace_id) {
            return Err(TerraformError::NotFound(format!("workspace {}", workspace_id)));
        }
        let id = state.id("cv");
        let configuration_version = ConfigurationVersion {
            upload_url: Some(format!("{}{}", UPLOAD_URL_PREFIX, id)),
            id,
            status: ConfigurationStatus::Pending,
        };
        state.configuration_versions.push(configuration_version.clone());
        Ok(configuration_version)
    }

    async fn read_configuration_version(&self, id: &str) -> Result<ConfigurationVersion, TerraformError> {
        let mut state = self.state.lock();
        state.enter("read_configuration_version")?;
        state
            .configuration_versions
            .iter()
            .find(|cv| cv.id == id)
            .cloned()
            .ok_or_else(|| TerraformError::NotFound(format!("configuration version {}", id)))
    }

    async fn upload_configuration(&self, upload_url: &str, archive: Bytes) -> Result<(), TerraformError> {
        let mut state = self.state.lock();
        state.enter("upload_configuration")?;
        let id = upload_url
            .strip_prefix(UPLOAD_URL_PREFIX)
            .ok_or_else(|| TerraformError::NotFound(format!("upload URL {}", upload_url)))?
            .to_string();
        let hold = state.hold_uploads;
        let configuration_version = state
            .configuration_versions
            .iter_mut()
            .find(|cv| cv.id == id)
            .ok_or_else(|| TerraformError::NotFound(format!("configuration version {}", id)))?;
        if !hold {
            configuration_version.status = ConfigurationStatus::Uploaded;
        }
        state.uploads.insert(id, archive);
        Ok(())
    }

    async fn create_run(&self, options: RunCreateOptions) -> Result<Run, TerraformError> {
        let mut state = self.state.lock();
        state.enter("create_run")?;
        if !state.workspace_exists(&options.workspace_id) {
            return Err(TerraformError::NotFound(format!("workspace {}", options.workspace_id)));
        }
        let run = Run {
            id: state.id("run"),
            status: RunStatus::Pending,
            workspace_id: Some(options.workspace_id.clone()),
            apply_id: None,
            is_destroy: options.is_destroy,
        };
        state.runs.push(run.clone());
        state.run_options.push(options);
        Ok(run)
    }

    async fn read_run(&self, run_id: &str) -> Result<Run, TerraformError> {
        let mut state = self.state.lock();
        state.enter("read_run")?;
        state
            .runs
            .iter()
            .find(|r| r.id == run_id)
            .cloned()
            .ok_or_else(|| TerraformError::NotFound(format!("run {}", run_id)))
    }

    async fn read_apply(&self, apply_id: &str) -> Result<Apply, TerraformError> {
        let mut state = self.state.lock();
        state.enter("read_apply")?;
        state
            .applies
            .get(apply_id)
            .cloned()
            .ok_or_else(|| TerraformError::NotFound(format!("apply {}", apply_id)))
    }

    async fn read_current_state_version(&self, workspace_id: &str) -> Result<Option<StateVersion>, TerraformError> {
        let mut state = self.state.lock();
        state.enter("read_current_state_version")?;
        Ok(state
            .current_state_versions
            .get(workspace_id)
            .map(|id| StateVersion { id: id.clone() }))
    }

    async fn list_state_version_outputs(&self, state_version_id: &str, page: PageRequest) -> Result<Page<StateVersionOutput>, TerraformError> {
        let mut state = self.state.lock();
        state.enter("list_state_version_outputs")?;
        let outputs = state.outputs.get(state_version_id).cloned().unwrap_or_default();
        Ok(page_of(&outputs, page))
    }

    async fn create_team_token(&self, team_id: &str) -> Result<TeamToken, TerraformError> {
        let mut state = self.state.lock();
        state.enter("create_team_token")?;
        let token = state
            .new_team_token
            .clone()
            .unwrap_or_else(|| NEW_TEAM_TOKEN.to_string());
        state.team_tokens.insert(team_id.to_string(), token.clone());
        Ok(TeamToken {
            id: state.id("at"),
            token,
        })
    }
}

/// Hands out the shared [`FakeTerraformCloud`] and records every connection.
pub struct FakeTerraformClientFactory {
    cloud: Arc<FakeTerraformCloud>,
    connections: Mutex<Vec<(TfeCredentials, Option<ProductMetadata>)>>,
    rejected_token: Mutex<Option<String>>,
}

impl FakeTerraformClientFactory {
    pub fn new(cloud: Arc<FakeTerraformCloud>) -> Self {
        Self {
            cloud,
            connections: Mutex::new(Vec::new()),
            rejected_token: Mutex::new(None),
        }
    }

    /// Connections made with `token` fail as unauthorized.
    pub fn reject_token(&self, token: &str) {
        *self.rejected_token.lock() = Some(token.to_string());
    }

    pub fn connections(&self) -> Vec<(TfeCredentials, Option<ProductMetadata>)> {
        self.connections.lock().clone()
    }
}

#[async_trait]
impl TerraformClientFactory for FakeTerraformClientFactory {
    async fn connect(
        &self,
        credentials: &TfeCredentials,
        metadata: Option<ProductMetadata>,
    ) -> Result<Arc<dyn TerraformCloud>, TerraformError> {
        self.connections.lock().push((credentials.clone(), metadata));
        if self.rejected_token.lock().as_deref() == Some(credentials.token.as_str()) {
            return Err(TerraformError::AuthInvalid);
        }
        Ok(self.cloud.clone())
    }
}
