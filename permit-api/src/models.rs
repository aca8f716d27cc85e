use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An action block as stored on a resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A resource type in the policy schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub actions: BTreeMap<String, ActionBlock>,
}

/// Request to create a resource
#[derive(Debug, Clone, Serialize)]
pub struct ResourceCreate {
    pub key: String,
    pub name: String,
    pub actions: BTreeMap<String, ActionBlock>,
}

/// Request to update a resource
#[derive(Debug, Clone, Serialize)]
pub struct ResourceUpdate {
    pub name: String,
}

/// An action as returned by the actions endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Request to create an action on a resource
#[derive(Debug, Clone, Serialize)]
pub struct ActionCreate {
    pub key: String,
    pub name: String,
    pub description: String,
}

/// A top-level (environment wide) role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub extends: Vec<String>,
}

/// Request to create a role, top-level or resource scoped
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleCreate {
    pub key: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub permissions: Vec<String>,
}

/// Request to replace the permissions of a role
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleUpdate {
    pub permissions: Vec<String>,
}

/// A role scoped to one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRole {
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// A relation declared on an object resource pointing at a subject resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub subject_resource: String,
    #[serde(default)]
    pub object_resource: String,
}

/// Request to create a relation on an object resource
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationCreate {
    pub key: String,
    pub name: String,
    pub subject_resource: String,
}

/// Implicit grant: holders of `role` on `on_resource` get the target role
/// through `linked_by_relation`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedRoleRule {
    pub role: String,
    pub on_resource: String,
    pub linked_by_relation: String,
}

/// Kind of condition set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionSetType {
    Resourceset,
    Userset,
}

/// A resource set or user set with its ABAC conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionSet {
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub set_type: ConditionSetType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceRef>,
    #[serde(default)]
    pub conditions: serde_json::Value,
}

/// Reference to a resource embedded in other payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub key: String,
}

/// A rule binding an HTTP route to a resource/action pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlMapping {
    pub url: String,
    pub http_method: String,
    pub resource: String,
    pub action: String,
}

/// How the PDP extracts the caller token for mapped routes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthMechanism {
    pub auth_type: String,
    pub token_header_name: String,
}

/// Body of the bulk URL mapping request
#[derive(Debug, Clone, Serialize)]
pub struct UrlMappingsRequest<'a> {
    pub mappings: &'a [UrlMapping],
    pub auth_mechanism: AuthMechanism,
}

/// Project and environment an API key is bound to
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiKeyScope {
    pub organization_id: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub environment_id: Option<String>,
}
