// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Apply Stage Use Case
//!
//! Prepares the remote workspace for a provision or update operation and
//! queues an auto-applied run against a freshly uploaded configuration.
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Responsibility:** Converge project, workspace and variables, then
//!   upload the product configuration and create the run
//! - **Collaborators:**
//!   - Domain: ProvisioningRequest, provider override, Terraform Cloud port
//!   - Infrastructure: ArtifactDownloader, archive toolkit
//!
//! Step order is strict: the variable purge must finish before any variable
//! is written, otherwise the purge would remove what this stage just set.

use crate::application::HandlerContext;
use crate::domain::config::EngineConfig;
use crate::domain::errors::ProvisioningError;
use crate::domain::operation::{KeyValue, ProvisioningRequest, RunReference};
use crate::domain::provider_override::{build_provider_override, PROVIDER_OVERRIDE_FILE};
use crate::domain::terraform::{
    paginate, ConfigurationStatus, ProductMetadata, Project, RunCreateOptions, TerraformCloud, Variable,
    VariableCategory, VariableOptions, Workspace, WorkspaceCreateOptions,
};
use crate::infrastructure::archive;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Environment variable enabling dynamic provider credentials.
pub const PROVIDER_AUTH_VARIABLE: &str = "TFC_AWS_PROVIDER_AUTH";
/// Environment variable naming the role each run assumes.
pub const RUN_ROLE_ARN_VARIABLE: &str = "TFC_AWS_RUN_ROLE_ARN";

#[async_trait]
pub trait ApplyStageUseCase: Send + Sync {
    /// Returns the id of the created run.
    async fn apply(&self, request: ProvisioningRequest) -> Result<RunReference>;
}

pub struct StandardApplyStageUseCase {
    ctx: HandlerContext,
}

impl StandardApplyStageUseCase {
    pub fn new(ctx: HandlerContext) -> Self {
        Self { ctx }
    }

    fn organization<'a>(&'a self, request: &'a ProvisioningRequest) -> Result<&'a str> {
        match request.terraform_organization.as_deref() {
            Some(org) if !org.is_empty() => Ok(org),
            _ => Ok(EngineConfig::require(&self.ctx.config.terraform_organization, "TERRAFORM_ORGANIZATION")?),
        }
    }

    async fn run(&self, request: ProvisioningRequest) -> Result<RunReference> {
        let organization = self.organization(&request)?.to_string();
        let region = EngineConfig::require(&self.ctx.config.region, "AWS_REGION")?.to_string();
        let workspace_name = request.workspace_name();

        // Step 1: Client carrying the catalog metadata headers
        let metadata = ProductMetadata {
            product_id: request.product_id.clone(),
            provisioned_product_id: request.provisioned_product_id.clone(),
            product_version: request.provisioning_artifact_id.clone(),
        };
        let client = self.ctx.terraform_client(Some(metadata)).await?;

        // Step 2: Project named after the product
        let project = find_or_create_project(&client, &organization, &request.product_id)
            .await
            .with_context(|| format!("Failed to find or create project {}", request.product_id))?;

        // Step 3: Workspace named after the provisioned product
        let workspace = find_or_create_workspace(&client, &organization, &workspace_name, &project)
            .await
            .with_context(|| format!("Failed to find or create workspace {}", workspace_name))?;

        // Step 4: Enforce the configured Terraform version
        client
            .update_workspace_terraform_version(&workspace.id, &self.ctx.config.terraform_version)
            .await
            .context("Failed to update workspace Terraform version")?;

        // Step 5: Purge variables outside the closed set
        let remaining = purge_variables(&client, &workspace.id, &request.parameters)
            .await
            .context("Failed to purge workspace variables")?;

        // Step 6: OIDC environment variables
        let oidc = [
            KeyValue::new(PROVIDER_AUTH_VARIABLE, "true"),
            KeyValue::new(RUN_ROLE_ARN_VARIABLE, request.launch_role_arn.clone()),
        ];
        for variable in &oidc {
            upsert_variable(&client, &workspace.id, &remaining, variable, VariableCategory::Env)
                .await
                .with_context(|| format!("Failed to set environment variable {}", variable.key))?;
        }

        // Step 7: One Terraform variable per input parameter
        for parameter in &request.parameters {
            upsert_variable(&client, &workspace.id, &remaining, parameter, VariableCategory::Terraform)
                .await
                .with_context(|| format!("Failed to set Terraform variable {}", parameter.key))?;
        }

        // Step 8: Configuration version, queued manually
        let configuration_version = client
            .create_configuration_version(&workspace.id, false)
            .await
            .context("Failed to create configuration version")?;
        let upload_url = configuration_version
            .upload_url
            .clone()
            .ok_or_else(|| ProvisioningError::MissingUploadUrl(configuration_version.id.clone()))?;

        // Step 9: Product configuration archive
        let original = self
            .ctx
            .downloader
            .download(&request.artifact.path, &request.launch_role_arn)
            .await
            .with_context(|| format!("Failed to download product artifact {}", request.artifact.path))?;

        // Steps 10-11: Provider override appended to the archive
        let override_json = build_provider_override(&region, &request.tags, &request.tracer_tag);
        let contents = serde_json::to_string_pretty(&override_json).context("Failed to encode provider override")?;
        let modified = tokio::task::spawn_blocking(move || archive::inject_entry(&original, PROVIDER_OVERRIDE_FILE, &contents))
            .await
            .context("Archive task failed")?
            .context("Failed to inject provider override")?;

        // Step 12: Upload
        client
            .upload_configuration(&upload_url, Bytes::from(modified))
            .await
            .context("Failed to upload configuration")?;

        // Step 13: Wait for the platform to accept the upload
        self.await_upload(&client, &configuration_version.id).await?;

        // Step 14: Auto-applied run
        let run = client
            .create_run(RunCreateOptions {
                workspace_id: workspace.id.clone(),
                configuration_version_id: Some(configuration_version.id.clone()),
                is_destroy: false,
                auto_apply: true,
                message: Some(format!("Triggered by product catalog record {}", request.record_id)),
            })
            .await
            .context("Failed to create run")?;

        info!(
            provisioned_product_id = %request.provisioned_product_id,
            workspace = %workspace.name,
            run_id = %run.id,
            "Created Terraform run"
        );
        metrics::counter!("tfc_provisioner_runs_created_total", "operation" => request.operation.as_str()).increment(1);

        Ok(RunReference {
            terraform_run_id: run.id,
        })
    }

    async fn await_upload(&self, client: &Arc<dyn TerraformCloud>, configuration_version_id: &str) -> Result<()> {
        let polling = self.ctx.upload_polling;
        for check in 1..=polling.max_checks {
            let configuration_version = client
                .read_configuration_version(configuration_version_id)
                .await
                .context("Failed to read configuration version")?;
            match configuration_version.status {
                ConfigurationStatus::Uploaded => {
                    debug!(configuration_version_id, check, "Configuration uploaded");
                    return Ok(());
                }
                ConfigurationStatus::Errored => {
                    return Err(anyhow!("configuration version {} failed to process the upload", configuration_version_id));
                }
                _ if check < polling.max_checks => tokio::time::sleep(polling.interval).await,
                _ => {}
            }
        }

        Err(ProvisioningError::UploadTimeout {
            configuration_version_id: configuration_version_id.to_string(),
            attempts: polling.max_checks,
        }
        .into())
    }
}

#[async_trait]
impl ApplyStageUseCase for StandardApplyStageUseCase {
    async fn apply(&self, request: ProvisioningRequest) -> Result<RunReference> {
        info!(
            provisioned_product_id = %request.provisioned_product_id,
            record_id = %request.record_id,
            operation = %request.operation,
            "Starting apply stage"
        );
        self.ctx.cancellable(self.run(request)).await
    }
}

async fn find_or_create_project(client: &Arc<dyn TerraformCloud>, organization: &str, name: &str) -> Result<Project> {
    let mut projects = paginate(|page| {
        let client = client.clone();
        let (organization, name) = (organization.to_string(), name.to_string());
        async move { client.list_projects(&organization, &name, page).await }
    });
    while let Some(project) = projects.try_next().await? {
        if project.name == name {
            return Ok(project);
        }
    }

    let project = client.create_project(organization, name).await?;
    info!(project = %project.name, project_id = %project.id, "Created project");
    Ok(project)
}

async fn find_or_create_workspace(
    client: &Arc<dyn TerraformCloud>,
    organization: &str,
    name: &str,
    project: &Project,
) -> Result<Workspace> {
    // The search is a substring match, so only an exact name counts.
    let mut workspaces = paginate(|page| {
        let client = client.clone();
        let (organization, name) = (organization.to_string(), name.to_string());
        async move { client.list_workspaces(&organization, &name, page).await }
    });
    while let Some(workspace) = workspaces.try_next().await? {
        if workspace.name == name {
            if workspace.project_id.as_deref() != Some(project.id.as_str()) {
                debug!(workspace = %name, "Existing workspace belongs to another project");
            }
            return Ok(workspace);
        }
    }

    let workspace = client
        .create_workspace(
            organization,
            WorkspaceCreateOptions {
                name: name.to_string(),
                project_id: project.id.clone(),
                terraform_version: None,
            },
        )
        .await?;
    info!(workspace = %workspace.name, workspace_id = %workspace.id, "Created workspace");
    Ok(workspace)
}

/// Delete every variable outside the closed set and return the survivors.
///
/// All pages are read before the first deletion so the page cursor never
/// shifts under the enumeration.
async fn purge_variables(
    client: &Arc<dyn TerraformCloud>,
    workspace_id: &str,
    parameters: &[KeyValue],
) -> Result<Vec<Variable>> {
    let variables: Vec<Variable> = paginate(|page| {
        let client = client.clone();
        let workspace_id = workspace_id.to_string();
        async move { client.list_variables(&workspace_id, page).await }
    })
    .try_collect()
    .await?;

    let env_keys: HashSet<&str> = [PROVIDER_AUTH_VARIABLE, RUN_ROLE_ARN_VARIABLE].into_iter().collect();
    let terraform_keys: HashSet<&str> = parameters.iter().map(|p| p.key.as_str()).collect();

    let (keep, purge): (Vec<Variable>, Vec<Variable>) = variables.into_iter().partition(|v| match v.category {
        VariableCategory::Env => env_keys.contains(v.key.as_str()),
        VariableCategory::Terraform => terraform_keys.contains(v.key.as_str()),
    });

    for variable in &purge {
        client.delete_variable(workspace_id, &variable.id).await?;
    }
    if !purge.is_empty() {
        info!(workspace_id, purged = purge.len(), "Purged workspace variables");
    }
    Ok(keep)
}

async fn upsert_variable(
    client: &Arc<dyn TerraformCloud>,
    workspace_id: &str,
    existing: &[Variable],
    variable: &KeyValue,
    category: VariableCategory,
) -> Result<Variable> {
    let options = VariableOptions::plain(variable.key.clone(), variable.value.clone(), category);
    let current = existing.iter().find(|v| v.key == variable.key && v.category == category);
    let written = match current {
        Some(current) => client.update_variable(workspace_id, &current.id, options).await?,
        None => client.create_variable(workspace_id, options).await?,
    };
    Ok(written)
}
