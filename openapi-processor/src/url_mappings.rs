use crate::context::ProcessorContext;
use crate::extensions::AnnotatedPath;
use permit_api::models::UrlMapping;
use permit_api::PermitApi;
use tracing::{debug, info};

/// Source tag owning every mapping this tool pushes
pub const URL_MAPPING_SOURCE: &str = "openapi";

/// Build one mapping per annotated operation.
///
/// The URL is the base URL and the path template concatenated verbatim.
pub fn generate_url_mappings(ctx: &mut ProcessorContext, paths: &[AnnotatedPath]) {
    for path in paths {
        for operation in &path.operations {
            if !ctx.has_action(&path.resource_key, &operation.action) {
                ctx.warn(format!(
                    "Skipping mapping for {} {}: action '{}' was never recorded on '{}'",
                    operation.method, path.path, operation.action, path.resource_key
                ));
                continue;
            }

            let mapping = UrlMapping {
                url: format!("{}{}", ctx.base_url, path.path),
                http_method: operation.method.as_str().to_string(),
                resource: path.resource_key.clone(),
                action: operation.action.clone(),
            };
            ctx.mappings.push(mapping);
        }
    }
    debug!("Generated {} URL mapping(s)", ctx.mappings.len());
}

/// Replace the remote mappings owned by [`URL_MAPPING_SOURCE`]
pub async fn push_url_mappings(
    ctx: &mut ProcessorContext,
    api: &dyn PermitApi,
    auth_type: &str,
    token_header: &str,
) {
    if ctx.mappings.is_empty() {
        info!("No URL mappings to push");
        return;
    }

    match api.delete_url_mappings(URL_MAPPING_SOURCE).await {
        Ok(()) => debug!("Deleted previous '{}' URL mappings", URL_MAPPING_SOURCE),
        Err(e) if e.is_not_found() => debug!("No previous URL mappings to delete"),
        Err(e) => ctx.warn(format!("Could not delete previous URL mappings: {}", e)),
    }

    let pushed = api
        .create_url_mappings(&ctx.mappings, auth_type, token_header)
        .await;
    match pushed {
        Ok(_) => info!("Pushed {} URL mapping(s)", ctx.mappings.len()),
        Err(e) => ctx.error(format!("Failed to create URL mappings: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::HttpMethod;
    use crate::extensions::AnnotatedOperation;

    fn orders() -> AnnotatedPath {
        let operation = |method: HttpMethod, action: &str| AnnotatedOperation {
            method,
            action: action.to_string(),
            description: String::new(),
            role: None,
            resource_role: None,
            relation: None,
            derived_role: None,
        };

        AnnotatedPath {
            path: "/orders/{id}".to_string(),
            resource_name: "Order".to_string(),
            resource_key: "order".to_string(),
            operations: vec![
                operation(HttpMethod::Get, "get"),
                operation(HttpMethod::Delete, "cancel"),
            ],
        }
    }

    #[test]
    fn test_generate_concatenates_base_url() {
        let mut ctx = ProcessorContext::new("https://api.example.com/v1");
        ctx.register_resource("order");
        ctx.record_action("order", "get");
        ctx.record_action("order", "cancel");

        generate_url_mappings(&mut ctx, &[orders()]);

        assert_eq!(ctx.mappings.len(), 2);
        assert_eq!(ctx.mappings[0].url, "https://api.example.com/v1/orders/{id}");
        assert_eq!(ctx.mappings[0].http_method, "get");
        assert_eq!(ctx.mappings[1].action, "cancel");
        assert!(ctx.warnings.is_empty());
    }

    #[test]
    fn test_generate_skips_unrecorded_actions() {
        let mut ctx = ProcessorContext::new("");
        ctx.register_resource("order");
        ctx.record_action("order", "get");

        generate_url_mappings(&mut ctx, &[orders()]);

        assert_eq!(ctx.mappings.len(), 1);
        assert_eq!(ctx.warnings.len(), 1);
    }
}
