use crate::context::ProcessorContext;
use crate::ensure::{ensure_created, Entity};
use crate::extensions::AnnotatedPath;
use permit_api::models::{DerivedRoleRule, RelationCreate};
use permit_api::PermitApi;
use tracing::debug;

/// `object_resource#key`, the identity of a relation
pub fn relation_key(object_resource: &str, key: &str) -> String {
    format!("{}#{}", object_resource, key)
}

/// Make sure every annotated relation exists on its object resource.
///
/// Each `object_resource#key` pair is resolved once; its subject resource is
/// remembered so derived roles can default their base resource to it.
pub async fn process_relations(
    ctx: &mut ProcessorContext,
    api: &dyn PermitApi,
    paths: &[AnnotatedPath],
) {
    let specs = paths
        .iter()
        .flat_map(|path| path.operations.iter())
        .filter_map(|operation| operation.relation.as_ref());

    for spec in specs {
        let label = relation_key(&spec.object_resource, &spec.key);
        if ctx.relations.contains_key(&label) {
            continue;
        }

        match api
            .get_relation_by_key(&spec.object_resource, &spec.key)
            .await
        {
            Ok(existing) => {
                debug!(
                    "Relation '{}' already exists on '{}'",
                    spec.key, spec.object_resource
                );
                if existing.subject_resource != spec.subject_resource {
                    ctx.warn(format!(
                        "Relation '{}' on '{}' points at '{}', not '{}'; keeping the remote definition",
                        spec.key, spec.object_resource, existing.subject_resource, spec.subject_resource
                    ));
                }
                ctx.relations.insert(label, existing.subject_resource);
            }
            Err(e) => {
                if !e.is_not_found() {
                    debug!("Lookup of relation '{}' failed ({}), creating", spec.key, e);
                }

                let create = RelationCreate {
                    key: spec.key.clone(),
                    name: spec.name.clone(),
                    subject_resource: spec.subject_resource.clone(),
                };
                ensure_created(ctx, Entity::new("relation", &label), || {
                    api.create_relation(&spec.object_resource, &create)
                })
                .await;
                ctx.relations
                    .insert(label, spec.subject_resource.clone());
            }
        }
    }
}

/// Create the implicit grants behind `x-permit-derived-role`.
///
/// Runs after [`process_relations`]. A rule whose base resource is neither
/// given nor derivable from a known relation is skipped with a warning.
pub async fn process_derived_roles(
    ctx: &mut ProcessorContext,
    api: &dyn PermitApi,
    paths: &[AnnotatedPath],
) {
    let specs = paths
        .iter()
        .flat_map(|path| path.operations.iter())
        .filter_map(|operation| operation.derived_role.as_ref());

    for spec in specs {
        let composite = format!("{}#{}#{}", spec.resource, spec.derived_role, spec.relation);
        if !ctx.derived_roles.insert(composite.clone()) {
            continue;
        }

        let resolved = match &spec.base_resource {
            Some(base_resource) => Ok(base_resource.clone()),
            None => relation_subject(ctx, &spec.resource, &spec.relation),
        };
        let base_resource = match resolved {
            Ok(base_resource) => base_resource,
            Err(reason) => {
                ctx.warn(format!(
                    "Skipping derived role '{}' on '{}': {} and no base_resource was given",
                    spec.derived_role, spec.resource, reason
                ));
                continue;
            }
        };

        let rule = DerivedRoleRule {
            role: spec.base_role.clone(),
            on_resource: base_resource,
            linked_by_relation: spec.relation.clone(),
        };
        ensure_created(ctx, Entity::new("derived role", &composite), || {
            api.create_derived_role(&spec.resource, &spec.derived_role, &rule)
        })
        .await;
    }
}

/// Subject resource of `relation`, preferring the one declared on
/// `object_resource`. Falls back to a unique match on the key alone.
fn relation_subject(
    ctx: &ProcessorContext,
    object_resource: &str,
    relation: &str,
) -> Result<String, String> {
    if let Some(subject) = ctx.relations.get(&relation_key(object_resource, relation)) {
        return Ok(subject.clone());
    }

    let mut matches: Vec<(&str, &String)> = ctx
        .relations
        .iter()
        .filter_map(|(label, subject)| {
            let (object, key) = label.split_once('#')?;
            (key == relation).then_some((object, subject))
        })
        .collect();
    matches.sort();

    match matches.as_slice() {
        [] => Err(format!("relation '{}' is unknown", relation)),
        [(_, subject)] => Ok((*subject).clone()),
        _ => {
            let objects: Vec<&str> = matches.iter().map(|(object, _)| *object).collect();
            Err(format!(
                "relation '{}' is not declared on '{}' and is ambiguous between {}",
                relation,
                object_resource,
                objects.join(", ")
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context_with(relations: &[(&str, &str, &str)]) -> ProcessorContext {
        let mut ctx = ProcessorContext::new("");
        for (object, key, subject) in relations {
            ctx.relations
                .insert(relation_key(object, key), subject.to_string());
        }
        ctx
    }

    #[test]
    fn test_relation_subject_prefers_own_resource() {
        let ctx = context_with(&[("folder", "parent", "team"), ("document", "parent", "folder")]);

        assert_eq!(relation_subject(&ctx, "document", "parent"), Ok("folder".to_string()));
        assert_eq!(relation_subject(&ctx, "folder", "parent"), Ok("team".to_string()));
    }

    #[test]
    fn test_relation_subject_falls_back_to_unique_key() {
        let ctx = context_with(&[("project", "owner", "team")]);

        assert_eq!(relation_subject(&ctx, "task", "owner"), Ok("team".to_string()));
        assert!(relation_subject(&ctx, "task", "member")
            .unwrap_err()
            .contains("unknown"));
    }

    #[test]
    fn test_relation_subject_rejects_ambiguous_key() {
        let ctx = context_with(&[("folder", "parent", "team"), ("document", "parent", "folder")]);

        let reason = relation_subject(&ctx, "task", "parent").unwrap_err();
        assert_eq!(
            reason,
            "relation 'parent' is not declared on 'task' and is ambiguous between document, folder"
        );
    }
}
