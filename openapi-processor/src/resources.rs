use crate::context::ProcessorContext;
use crate::ensure::{ensure_created, upsert, Entity};
use crate::extensions::AnnotatedPath;
use permit_api::PermitApi;
use tracing::debug;

/// Make sure every annotated resource and its actions exist remotely.
///
/// A resource is touched once per run even when several paths name it;
/// actions are recorded whether or not their creation succeeded so that
/// mappings and roles can still reference them.
pub async fn process_resources(
    ctx: &mut ProcessorContext,
    api: &dyn PermitApi,
    paths: &[AnnotatedPath],
) {
    for path in paths {
        let key = path.resource_key.as_str();
        let name = path.resource_name.as_str();

        if !ctx.resources.contains(key) {
            let exists = ctx.existing_resources.contains(key);
            upsert(
                ctx,
                Entity::new("resource", key),
                exists,
                || api.create_resource(key, name),
                || api.update_resource(key, name),
            )
            .await;
            ctx.register_resource(key);
        }

        for operation in &path.operations {
            let action = operation.action.as_str();
            if ctx.has_action(key, action) {
                debug!("Action '{}' already handled for '{}'", action, key);
                continue;
            }

            let label = format!("{}:{}", key, action);
            ensure_created(ctx, Entity::new("action", &label), || {
                api.create_action(key, action, &operation.description)
            })
            .await;
            ctx.record_action(key, action);
        }
    }
}
