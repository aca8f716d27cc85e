use crate::error::{ExportError, Result};
use crate::hcl::{self, Block};
use permit_api::models::{ConditionSet, ConditionSetType, Relation, Resource, ResourceRole, Role};
use serde_json::Value;
use std::collections::BTreeSet;

pub const PROVIDER_SOURCE: &str = "registry.terraform.io/permitio/permit-io";
pub const API_KEY_VARIABLE: &str = "PERMIT_API_KEY";

const RESOURCE: &str = "permitio_resource";
const ROLE: &str = "permitio_role";
const RELATION: &str = "permitio_relation";
const RESOURCE_SET: &str = "permitio_resource_set";
const USER_SET: &str = "permitio_user_set";

/// `terraform`, `variable` and `provider` blocks
pub fn provider(api_url: &str, provider_version: &str) -> String {
    format!(
        r#"terraform {{
  required_providers {{
    permitio = {{
      source  = {}
      version = {}
    }}
  }}
}}

variable {} {{
  type        = string
  description = "The API key for the Permit.io API"
  sensitive   = true
}}

provider "permitio" {{
  api_url = {}
  api_key = var.{}
}}
"#,
        hcl::quote(PROVIDER_SOURCE),
        hcl::quote(provider_version),
        hcl::quote(API_KEY_VARIABLE),
        hcl::quote(api_url),
        API_KEY_VARIABLE
    )
}

fn depends_on<'a, I>(resources: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    resources
        .into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|key| hcl::reference(RESOURCE, key))
        .collect()
}

fn resource_key_ref(key: &str) -> String {
    format!("{}.key", hcl::reference(RESOURCE, key))
}

pub fn resource(resource: &Resource) -> String {
    let actions = resource
        .actions
        .iter()
        .map(|(key, action)| {
            let body = Block::new()
                .string("name", action.name.as_deref().unwrap_or(key))
                .optional_string("description", action.description.as_deref());
            (key.clone(), body)
        })
        .collect();

    let name = if resource.name.is_empty() {
        &resource.key
    } else {
        &resource.name
    };
    let body = Block::new()
        .string("key", &resource.key)
        .string("name", name)
        .optional_string("description", resource.description.as_deref())
        .object("actions", actions);

    hcl::resource(RESOURCE, &resource.key, &body)
}

/// Top-level role; depends on every exported resource its permissions name
pub fn role(role: &Role, exported: &BTreeSet<String>) -> String {
    let referenced = role
        .permissions
        .iter()
        .filter_map(|permission| permission.split_once(':').map(|(resource, _)| resource))
        .filter(|resource| exported.contains(*resource));

    let body = Block::new()
        .string("key", &role.key)
        .string("name", if role.name.is_empty() { &role.key } else { &role.name })
        .optional_string("description", role.description.as_deref())
        .attr("permissions", hcl::list(role.permissions.iter().map(|p| hcl::quote(p))))
        .optional_list("extends", role.extends.iter().map(|r| hcl::quote(r)).collect())
        .optional_list("depends_on", depends_on(referenced));

    hcl::resource(ROLE, &role.key, &body)
}

pub fn resource_role(role: &ResourceRole) -> String {
    let body = Block::new()
        .string("key", &role.key)
        .string("name", if role.name.is_empty() { &role.key } else { &role.name })
        .optional_string("description", role.description.as_deref())
        .attr("resource", resource_key_ref(&role.resource))
        .attr("permissions", hcl::list(role.permissions.iter().map(|p| hcl::quote(p))))
        .optional_list("depends_on", depends_on([role.resource.as_str()]));

    hcl::resource(ROLE, &format!("{}__{}", role.resource, role.key), &body)
}

pub fn relation(relation: &Relation) -> String {
    let body = Block::new()
        .string("key", &relation.key)
        .string(
            "name",
            if relation.name.is_empty() { &relation.key } else { &relation.name },
        )
        .optional_string("description", relation.description.as_deref())
        .attr("subject_resource", resource_key_ref(&relation.subject_resource))
        .attr("object_resource", resource_key_ref(&relation.object_resource))
        .optional_list(
            "depends_on",
            depends_on([
                relation.subject_resource.as_str(),
                relation.object_resource.as_str(),
            ]),
        );

    hcl::resource(
        RELATION,
        &format!("{}_{}", relation.object_resource, relation.key),
        &body,
    )
}

/// Resource set or user set with its conditions inlined via `jsonencode`.
///
/// Conditions must be a JSON object, and a resource set must name its
/// resource; anything else is rejected instead of rendered.
pub fn condition_set(set: &ConditionSet) -> Result<String> {
    let invalid = |reason: &str| ExportError::InvalidConditionSet {
        key: set.key.clone(),
        reason: reason.to_string(),
    };

    let conditions = match &set.conditions {
        Value::Object(_) => hcl::jsonencode(&set.conditions),
        Value::Null => return Err(invalid("conditions are missing")),
        _ => return Err(invalid("conditions must be a JSON object")),
    };

    let body = Block::new()
        .string("key", &set.key)
        .string("name", if set.name.is_empty() { &set.key } else { &set.name })
        .optional_string("description", set.description.as_deref());

    let (kind, body) = match set.set_type {
        ConditionSetType::Resourceset => {
            let resource = set
                .resource
                .as_ref()
                .ok_or_else(|| invalid("resource set has no resource"))?;
            let body = body
                .attr("resource", resource_key_ref(&resource.key))
                .attr("conditions", conditions)
                .optional_list("depends_on", depends_on([resource.key.as_str()]));
            (RESOURCE_SET, body)
        }
        ConditionSetType::Userset => (
            USER_SET,
            body.attr("conditions", conditions),
        ),
    };

    Ok(hcl::resource(kind, &set.key, &body))
}
