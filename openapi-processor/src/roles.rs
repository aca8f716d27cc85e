use crate::context::ProcessorContext;
use crate::ensure::{upsert, Entity};
use crate::extensions::{AnnotatedOperation, AnnotatedPath, RoleSpec};
use permit_api::models::{RoleCreate, RoleUpdate};
use permit_api::PermitApi;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// A role together with every permission the document grants it
#[derive(Debug, Clone)]
struct RoleDraft {
    resource: String,
    spec: RoleSpec,
    permissions: BTreeSet<String>,
}

impl RoleDraft {
    fn create_request(&self) -> RoleCreate {
        RoleCreate {
            key: self.spec.key.clone(),
            name: self.spec.name.clone(),
            description: self.spec.description.clone(),
            permissions: self.permissions.iter().cloned().collect(),
        }
    }
}

/// Group role annotations by key, keeping first-seen order
fn collect<F>(paths: &[AnnotatedPath], scoped: bool, select: F) -> Vec<RoleDraft>
where
    F: Fn(&AnnotatedOperation) -> Option<&RoleSpec>,
{
    let mut drafts: Vec<RoleDraft> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for path in paths {
        for operation in &path.operations {
            let Some(spec) = select(operation) else {
                continue;
            };

            let draft_key = if scoped {
                resource_role_key(&path.resource_key, &spec.key)
            } else {
                spec.key.clone()
            };
            let position = *index.entry(draft_key).or_insert_with(|| {
                drafts.push(RoleDraft {
                    resource: path.resource_key.clone(),
                    spec: spec.clone(),
                    permissions: BTreeSet::new(),
                });
                drafts.len() - 1
            });

            drafts[position]
                .permissions
                .insert(format!("{}:{}", path.resource_key, operation.action));
        }
    }

    drafts
}

/// `resource#role`
pub fn resource_role_key(resource: &str, role: &str) -> String {
    format!("{}#{}", resource, role)
}

/// Upsert every top-level role once, granted all of its annotated
/// permissions.
///
/// Roles that already exist keep the permissions they had remotely; the
/// update sends the union.
pub async fn process_roles(ctx: &mut ProcessorContext, api: &dyn PermitApi, paths: &[AnnotatedPath]) {
    for draft in collect(paths, false, |operation| operation.role.as_ref()) {
        let key = draft.spec.key.as_str();
        if ctx.roles.contains(key) {
            continue;
        }

        let existing = ctx.existing_roles.get(key);
        let mut permissions = draft.permissions.clone();
        if let Some(role) = existing {
            permissions.extend(role.permissions.iter().cloned());
        }
        let exists = existing.is_some();

        let create = draft.create_request();
        let update = RoleUpdate {
            permissions: permissions.into_iter().collect(),
        };
        debug!(
            "Role '{}' gets {} permission(s)",
            key,
            update.permissions.len()
        );

        upsert(
            ctx,
            Entity::new("role", key),
            exists,
            || api.create_role(&create),
            || api.update_role(key, &update),
        )
        .await;
        ctx.roles.insert(key.to_string());
    }
}

/// Upsert every resource-scoped role once per resource
pub async fn process_resource_roles(
    ctx: &mut ProcessorContext,
    api: &dyn PermitApi,
    paths: &[AnnotatedPath],
) {
    for draft in collect(paths, true, |operation| operation.resource_role.as_ref()) {
        let composite = resource_role_key(&draft.resource, &draft.spec.key);
        if ctx.resource_roles.contains_key(&composite) {
            continue;
        }

        let resource = draft.resource.as_str();
        let key = draft.spec.key.as_str();
        let create = draft.create_request();
        let update = RoleUpdate {
            permissions: create.permissions.clone(),
        };

        let outcome = upsert(
            ctx,
            Entity::new("resource role", &composite),
            false,
            || api.create_resource_role(resource, &create),
            || api.update_resource_role(resource, key, &update),
        )
        .await;
        ctx.resource_roles.insert(composite, outcome.exists());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::HttpMethod;

    fn operation(action: &str, role: Option<&str>) -> AnnotatedOperation {
        AnnotatedOperation {
            method: HttpMethod::Get,
            action: action.to_string(),
            description: String::new(),
            role: role.map(|name| RoleSpec {
                key: name.to_lowercase(),
                name: name.to_string(),
                description: None,
            }),
            resource_role: None,
            relation: None,
            derived_role: None,
        }
    }

    fn path(resource: &str, operations: Vec<AnnotatedOperation>) -> AnnotatedPath {
        AnnotatedPath {
            path: format!("/{}s", resource),
            resource_name: resource.to_string(),
            resource_key: resource.to_string(),
            operations,
        }
    }

    #[test]
    fn test_collect_merges_across_paths() {
        let paths = vec![
            path("order", vec![operation("get", Some("Viewer")), operation("post", None)]),
            path("invoice", vec![operation("get", Some("Viewer"))]),
        ];

        let drafts = collect(&paths, false, |op| op.role.as_ref());
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].spec.key, "viewer");
        assert_eq!(
            drafts[0].permissions.iter().cloned().collect::<Vec<_>>(),
            vec!["invoice:get".to_string(), "order:get".to_string()]
        );
    }

    #[test]
    fn test_collect_scoped_splits_by_resource() {
        let paths = vec![
            path("order", vec![operation("get", Some("Owner"))]),
            path("invoice", vec![operation("get", Some("Owner"))]),
        ];

        let drafts = collect(&paths, true, |op| op.role.as_ref());
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].resource, "order");
        assert_eq!(drafts[1].resource, "invoice");
    }

    #[test]
    fn test_resource_role_key() {
        assert_eq!(resource_role_key("order", "owner"), "order#owner");
    }
}
