//! Export of the current Permit.io policy schema as Terraform HCL for the
//! `permitio` provider.
//!
//! Blocks are emitted in dependency order: resources, roles, resource roles,
//! relations, then condition sets. Within each group entities are sorted by
//! key so repeated exports diff cleanly.

pub mod error;
pub mod generators;
pub mod hcl;

use permit_api::models::{ConditionSet, Relation, Resource, ResourceRole, Role};
use permit_api::{PermitApi, DEFAULT_API_URL};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

pub use error::{ExportError, Result};

pub const DEFAULT_PROVIDER_VERSION: &str = "~> 0.0.14";

#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// `api_url` written into the provider block
    pub api_url: String,
    pub provider_version: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            provider_version: DEFAULT_PROVIDER_VERSION.to_string(),
        }
    }
}

/// Rendered HCL plus whatever had to be left out of it
#[derive(Debug, Clone, Default)]
pub struct TerraformExport {
    pub hcl: String,
    pub warnings: Vec<String>,
    pub resources: usize,
    pub roles: usize,
    pub resource_roles: usize,
    pub relations: usize,
    pub condition_sets: usize,
}

impl TerraformExport {
    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }
}

#[derive(Debug, Default)]
struct Schema {
    resources: Vec<Resource>,
    roles: Vec<Role>,
    resource_roles: Vec<ResourceRole>,
    relations: Vec<Relation>,
    condition_sets: Vec<ConditionSet>,
}

/// Read the schema from the API and render it.
///
/// Only a failure to list resources is fatal; any other collection that
/// cannot be listed is skipped with a warning.
pub async fn export_terraform(
    api: &dyn PermitApi,
    options: &ExportOptions,
) -> Result<TerraformExport> {
    let mut export = TerraformExport::default();
    let schema = fetch(api, &mut export).await?;
    render(schema, options, &mut export);

    info!(
        "Exported {} resource(s), {} role(s), {} resource role(s), {} relation(s), {} condition set(s)",
        export.resources,
        export.roles,
        export.resource_roles,
        export.relations,
        export.condition_sets
    );
    Ok(export)
}

async fn fetch(api: &dyn PermitApi, export: &mut TerraformExport) -> Result<Schema> {
    let mut schema = Schema {
        resources: api
            .list_resources()
            .await
            .map_err(|source| ExportError::Fetch {
                collection: "resources",
                source,
            })?,
        ..Schema::default()
    };
    debug!("Fetched {} resource(s)", schema.resources.len());

    match api.list_roles().await {
        Ok(roles) => schema.roles = roles,
        Err(e) => export.warn(format!("Skipping roles: {}", e)),
    }

    for resource in &schema.resources {
        match api.list_resource_roles(&resource.key).await {
            Ok(roles) => schema
                .resource_roles
                .extend(roles.into_iter().map(|mut role| {
                    if role.resource.is_empty() {
                        role.resource = resource.key.clone();
                    }
                    role
                })),
            Err(e) => export.warn(format!(
                "Skipping roles of resource '{}': {}",
                resource.key, e
            )),
        }

        match api.list_relations(&resource.key).await {
            Ok(relations) => schema
                .relations
                .extend(relations.into_iter().map(|mut relation| {
                    if relation.object_resource.is_empty() {
                        relation.object_resource = resource.key.clone();
                    }
                    relation
                })),
            Err(e) => export.warn(format!(
                "Skipping relations of resource '{}': {}",
                resource.key, e
            )),
        }
    }

    match api.list_condition_sets().await {
        Ok(sets) => schema.condition_sets = sets,
        Err(e) => export.warn(format!("Skipping condition sets: {}", e)),
    }

    Ok(schema)
}

fn render(mut schema: Schema, options: &ExportOptions, export: &mut TerraformExport) {
    schema.resources.sort_by(|a, b| a.key.cmp(&b.key));
    schema.roles.sort_by(|a, b| a.key.cmp(&b.key));
    schema
        .resource_roles
        .sort_by(|a, b| (&a.resource, &a.key).cmp(&(&b.resource, &b.key)));
    schema
        .relations
        .sort_by(|a, b| (&a.object_resource, &a.key).cmp(&(&b.object_resource, &b.key)));
    schema.condition_sets.sort_by(|a, b| a.key.cmp(&b.key));

    let mut blocks = vec![generators::provider(
        &options.api_url,
        &options.provider_version,
    )];

    let exported: BTreeSet<String> = schema.resources.iter().map(|r| r.key.clone()).collect();
    blocks.extend(schema.resources.iter().map(generators::resource));
    blocks.extend(schema.roles.iter().map(|role| generators::role(role, &exported)));
    blocks.extend(schema.resource_roles.iter().map(generators::resource_role));
    blocks.extend(schema.relations.iter().map(generators::relation));

    export.resources = schema.resources.len();
    export.roles = schema.roles.len();
    export.resource_roles = schema.resource_roles.len();
    export.relations = schema.relations.len();

    for set in &schema.condition_sets {
        match generators::condition_set(set) {
            Ok(block) => {
                blocks.push(block);
                export.condition_sets += 1;
            }
            Err(e) => export.warn(e.to_string()),
        }
    }

    export.hcl = blocks.join("\n");
}
