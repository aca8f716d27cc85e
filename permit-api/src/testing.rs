//! In-memory [`PermitApi`] for exercising callers without a network.
//!
//! Behaves like the remote API where callers can observe it: duplicates are
//! rejected with 409, missing parents with 404, and every call is logged so
//! tests can assert on what was (not) sent.

use crate::client::PermitApi;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    Action, ActionBlock, ConditionSet, DerivedRoleRule, Relation, RelationCreate, Resource,
    ResourceRole, Role, RoleCreate, RoleUpdate, UrlMapping,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct State {
    resources: BTreeMap<String, Resource>,
    roles: BTreeMap<String, Role>,
    resource_roles: BTreeMap<(String, String), ResourceRole>,
    relations: BTreeMap<(String, String), Relation>,
    derived_roles: Vec<(String, String, DerivedRoleRule)>,
    condition_sets: Vec<ConditionSet>,
    url_mappings: Vec<UrlMapping>,
    auth_mechanism: Option<(String, String)>,
}

#[derive(Debug, Default)]
pub struct InMemoryPermitApi {
    state: Mutex<State>,
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, ApiError>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn conflict(what: String) -> ApiError {
    ApiError::Http {
        status: 409,
        message: format!("{} already exists", what),
    }
}

fn not_found(what: String) -> ApiError {
    ApiError::Http {
        status: 404,
        message: format!("{} not found", what),
    }
}

impl InMemoryPermitApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(self, key: &str, name: &str, actions: &[&str]) -> Self {
        let resource = Resource {
            key: key.to_string(),
            name: name.to_string(),
            description: None,
            actions: actions
                .iter()
                .map(|action| (action.to_string(), ActionBlock::default()))
                .collect(),
        };
        lock(&self.state)
            .resources
            .insert(key.to_string(), resource);
        self
    }

    pub fn with_role(self, key: &str, permissions: &[&str]) -> Self {
        let role = Role {
            key: key.to_string(),
            name: key.to_string(),
            description: None,
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            extends: Vec::new(),
        };
        lock(&self.state).roles.insert(key.to_string(), role);
        self
    }

    pub fn with_resource_role(self, resource: &str, key: &str, permissions: &[&str]) -> Self {
        let role = ResourceRole {
            key: key.to_string(),
            name: key.to_string(),
            description: None,
            resource: resource.to_string(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
        };
        lock(&self.state)
            .resource_roles
            .insert((resource.to_string(), key.to_string()), role);
        self
    }

    pub fn with_relation(self, object_resource: &str, key: &str, subject_resource: &str) -> Self {
        let relation = Relation {
            key: key.to_string(),
            name: key.to_string(),
            description: None,
            subject_resource: subject_resource.to_string(),
            object_resource: object_resource.to_string(),
        };
        lock(&self.state)
            .relations
            .insert((object_resource.to_string(), key.to_string()), relation);
        self
    }

    pub fn with_condition_set(self, set: ConditionSet) -> Self {
        lock(&self.state).condition_sets.push(set);
        self
    }

    pub fn with_url_mappings(self, mappings: Vec<UrlMapping>) -> Self {
        lock(&self.state).url_mappings = mappings;
        self
    }

    /// Make every call to `operation` (a trait method name) fail with `error`
    pub fn fail_on(&self, operation: &str, error: ApiError) {
        lock(&self.failures).insert(operation.to_string(), error);
    }

    pub fn clear_failures(&self) {
        lock(&self.failures).clear();
    }

    /// Every call so far, as `"<operation> <target>"`
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        let prefix = format!("{} ", operation);
        lock(&self.calls)
            .iter()
            .filter(|call| call.starts_with(&prefix))
            .count()
    }

    /// Calls that change remote state
    pub fn write_count(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| !call.starts_with("list_") && !call.starts_with("get_"))
            .count()
    }

    pub fn reset_calls(&self) {
        lock(&self.calls).clear();
    }

    pub fn resource(&self, key: &str) -> Option<Resource> {
        lock(&self.state).resources.get(key).cloned()
    }

    pub fn role(&self, key: &str) -> Option<Role> {
        lock(&self.state).roles.get(key).cloned()
    }

    pub fn resource_role(&self, resource: &str, key: &str) -> Option<ResourceRole> {
        lock(&self.state)
            .resource_roles
            .get(&(resource.to_string(), key.to_string()))
            .cloned()
    }

    pub fn relation(&self, object_resource: &str, key: &str) -> Option<Relation> {
        lock(&self.state)
            .relations
            .get(&(object_resource.to_string(), key.to_string()))
            .cloned()
    }

    /// `(resource, role, rule)` for every implicit grant created
    pub fn derived_roles(&self) -> Vec<(String, String, DerivedRoleRule)> {
        lock(&self.state).derived_roles.clone()
    }

    pub fn url_mappings(&self) -> Vec<UrlMapping> {
        lock(&self.state).url_mappings.clone()
    }

    /// `(auth_type, token_header_name)` of the last mapping push
    pub fn auth_mechanism(&self) -> Option<(String, String)> {
        lock(&self.state).auth_mechanism.clone()
    }

    fn record(&self, operation: &str, target: &str) -> ApiResult<MutexGuard<'_, State>> {
        lock(&self.calls).push(format!("{} {}", operation, target));
        if let Some(error) = lock(&self.failures).get(operation) {
            return Err(error.clone());
        }
        Ok(lock(&self.state))
    }
}

#[async_trait]
impl PermitApi for InMemoryPermitApi {
    async fn list_resources(&self) -> ApiResult<Vec<Resource>> {
        let state = self.record("list_resources", "*")?;
        Ok(state.resources.values().cloned().collect())
    }

    async fn create_resource(&self, key: &str, name: &str) -> ApiResult<Resource> {
        let mut state = self.record("create_resource", key)?;
        if state.resources.contains_key(key) {
            return Err(conflict(format!("Resource '{}'", key)));
        }
        let resource = Resource {
            key: key.to_string(),
            name: name.to_string(),
            description: None,
            actions: BTreeMap::new(),
        };
        state.resources.insert(key.to_string(), resource.clone());
        Ok(resource)
    }

    async fn update_resource(&self, key: &str, name: &str) -> ApiResult<Resource> {
        let mut state = self.record("update_resource", key)?;
        let resource = state
            .resources
            .get_mut(key)
            .ok_or_else(|| not_found(format!("Resource '{}'", key)))?;
        resource.name = name.to_string();
        Ok(resource.clone())
    }

    async fn create_action(
        &self,
        resource_key: &str,
        action_key: &str,
        description: &str,
    ) -> ApiResult<Action> {
        let target = format!("{}:{}", resource_key, action_key);
        let mut state = self.record("create_action", &target)?;
        let resource = state
            .resources
            .get_mut(resource_key)
            .ok_or_else(|| not_found(format!("Resource '{}'", resource_key)))?;
        if resource.actions.contains_key(action_key) {
            return Err(conflict(format!("Action '{}'", target)));
        }
        resource.actions.insert(
            action_key.to_string(),
            ActionBlock {
                name: Some(action_key.to_string()),
                description: Some(description.to_string()),
            },
        );
        Ok(Action {
            key: action_key.to_string(),
            name: action_key.to_string(),
            description: Some(description.to_string()),
        })
    }

    async fn list_roles(&self) -> ApiResult<Vec<Role>> {
        let state = self.record("list_roles", "*")?;
        Ok(state.roles.values().cloned().collect())
    }

    async fn create_role(&self, role: &RoleCreate) -> ApiResult<Role> {
        let mut state = self.record("create_role", &role.key)?;
        if state.roles.contains_key(&role.key) {
            return Err(conflict(format!("Role '{}'", role.key)));
        }
        let created = Role {
            key: role.key.clone(),
            name: role.name.clone(),
            description: role.description.clone(),
            permissions: role.permissions.clone(),
            extends: Vec::new(),
        };
        state.roles.insert(role.key.clone(), created.clone());
        Ok(created)
    }

    async fn update_role(&self, role_key: &str, update: &RoleUpdate) -> ApiResult<Role> {
        let mut state = self.record("update_role", role_key)?;
        let role = state
            .roles
            .get_mut(role_key)
            .ok_or_else(|| not_found(format!("Role '{}'", role_key)))?;
        role.permissions = update.permissions.clone();
        Ok(role.clone())
    }

    async fn list_resource_roles(&self, resource_key: &str) -> ApiResult<Vec<ResourceRole>> {
        let state = self.record("list_resource_roles", resource_key)?;
        Ok(state
            .resource_roles
            .values()
            .filter(|role| role.resource == resource_key)
            .cloned()
            .collect())
    }

    async fn create_resource_role(
        &self,
        resource_key: &str,
        role: &RoleCreate,
    ) -> ApiResult<ResourceRole> {
        let target = format!("{}#{}", resource_key, role.key);
        let mut state = self.record("create_resource_role", &target)?;
        if !state.resources.contains_key(resource_key) {
            return Err(not_found(format!("Resource '{}'", resource_key)));
        }
        let id = (resource_key.to_string(), role.key.clone());
        if state.resource_roles.contains_key(&id) {
            return Err(conflict(format!("Resource role '{}'", target)));
        }
        let created = ResourceRole {
            key: role.key.clone(),
            name: role.name.clone(),
            description: role.description.clone(),
            resource: resource_key.to_string(),
            permissions: role.permissions.clone(),
        };
        state.resource_roles.insert(id, created.clone());
        Ok(created)
    }

    async fn update_resource_role(
        &self,
        resource_key: &str,
        role_key: &str,
        update: &RoleUpdate,
    ) -> ApiResult<ResourceRole> {
        let target = format!("{}#{}", resource_key, role_key);
        let mut state = self.record("update_resource_role", &target)?;
        let role = state
            .resource_roles
            .get_mut(&(resource_key.to_string(), role_key.to_string()))
            .ok_or_else(|| not_found(format!("Resource role '{}'", target)))?;
        role.permissions = update.permissions.clone();
        Ok(role.clone())
    }

    async fn get_relation_by_key(
        &self,
        object_resource: &str,
        relation_key: &str,
    ) -> ApiResult<Relation> {
        let target = format!("{}#{}", object_resource, relation_key);
        let state = self.record("get_relation_by_key", &target)?;
        state
            .relations
            .get(&(object_resource.to_string(), relation_key.to_string()))
            .cloned()
            .ok_or_else(|| not_found(format!("Relation '{}'", target)))
    }

    async fn list_relations(&self, object_resource: &str) -> ApiResult<Vec<Relation>> {
        let state = self.record("list_relations", object_resource)?;
        Ok(state
            .relations
            .values()
            .filter(|relation| relation.object_resource == object_resource)
            .cloned()
            .collect())
    }

    async fn create_relation(
        &self,
        object_resource: &str,
        relation: &RelationCreate,
    ) -> ApiResult<Relation> {
        let target = format!("{}#{}", object_resource, relation.key);
        let mut state = self.record("create_relation", &target)?;
        for resource in [object_resource, relation.subject_resource.as_str()] {
            if !state.resources.contains_key(resource) {
                return Err(not_found(format!("Resource '{}'", resource)));
            }
        }
        let id = (object_resource.to_string(), relation.key.clone());
        if state.relations.contains_key(&id) {
            return Err(conflict(format!("Relation '{}'", target)));
        }
        let created = Relation {
            key: relation.key.clone(),
            name: relation.name.clone(),
            description: None,
            subject_resource: relation.subject_resource.clone(),
            object_resource: object_resource.to_string(),
        };
        state.relations.insert(id, created.clone());
        Ok(created)
    }

    async fn create_derived_role(
        &self,
        resource_key: &str,
        role_key: &str,
        rule: &DerivedRoleRule,
    ) -> ApiResult<DerivedRoleRule> {
        let target = format!("{}#{}", resource_key, role_key);
        let mut state = self.record("create_derived_role", &target)?;
        if !state
            .resource_roles
            .contains_key(&(resource_key.to_string(), role_key.to_string()))
        {
            return Err(not_found(format!("Resource role '{}'", target)));
        }
        let duplicate = state
            .derived_roles
            .iter()
            .any(|(resource, role, existing)| {
                resource == resource_key && role == role_key && existing == rule
            });
        if duplicate {
            return Err(conflict(format!("Implicit grant on '{}'", target)));
        }
        state
            .derived_roles
            .push((resource_key.to_string(), role_key.to_string(), rule.clone()));
        Ok(rule.clone())
    }

    async fn list_condition_sets(&self) -> ApiResult<Vec<ConditionSet>> {
        let state = self.record("list_condition_sets", "*")?;
        Ok(state.condition_sets.clone())
    }

    async fn delete_url_mappings(&self, source: &str) -> ApiResult<()> {
        let mut state = self.record("delete_url_mappings", source)?;
        if state.url_mappings.is_empty() {
            return Err(not_found(format!("URL mappings for source '{}'", source)));
        }
        state.url_mappings.clear();
        Ok(())
    }

    async fn create_url_mappings(
        &self,
        mappings: &[UrlMapping],
        auth_type: &str,
        token_header_name: &str,
    ) -> ApiResult<Vec<UrlMapping>> {
        let mut state = self.record("create_url_mappings", &mappings.len().to_string())?;
        state.url_mappings.extend(mappings.iter().cloned());
        state.auth_mechanism = Some((auth_type.to_string(), token_header_name.to_string()));
        Ok(mappings.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_duplicates_conflict() {
        let api = InMemoryPermitApi::new();
        api.create_resource("order", "Order").await.unwrap();

        let err = api.create_resource("order", "Order").await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(api.call_count("create_resource"), 2);
    }

    #[tokio::test]
    async fn test_missing_parent_is_not_found() {
        let api = InMemoryPermitApi::new();
        let err = api.create_action("order", "get", "List").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let api = InMemoryPermitApi::new().with_resource("order", "Order", &["get"]);
        api.fail_on("list_resources", ApiError::Transport("down".to_string()));

        assert!(api.list_resources().await.is_err());
        api.clear_failures();
        assert_eq!(api.list_resources().await.unwrap().len(), 1);
        assert_eq!(api.write_count(), 0);
    }
}
