//! Turns `x-permit-*` annotations in an OpenAPI document into Permit.io
//! resources, actions, roles, relations and URL mappings.
//!
//! Runs are idempotent: entities that already exist are updated or left
//! alone, and the pushed URL mappings replace the previous set.

pub mod context;
pub mod document;
pub mod ensure;
pub mod error;
pub mod extensions;
pub mod loader;
pub mod relations;
pub mod report;
pub mod resources;
pub mod roles;
pub mod url_mappings;

use context::ProcessorContext;
use permit_api::PermitApi;
use std::time::Instant;
use tracing::info;

pub use document::OpenApiDocument;
pub use error::{ProcessorError, Result};
pub use loader::SpecLoader;
pub use report::{ProcessingReport, ProcessingSummary};
pub use url_mappings::URL_MAPPING_SOURCE;

pub const DEFAULT_AUTH_TYPE: &str = "Bearer";
pub const DEFAULT_TOKEN_HEADER: &str = "Authorization";

/// Knobs for a processing run
#[derive(Debug, Clone)]
pub struct ProcessorOptions {
    /// Prefix for mapping URLs; the document's first server URL when unset
    pub base_url: Option<String>,
    pub auth_type: String,
    pub token_header: String,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            base_url: None,
            auth_type: DEFAULT_AUTH_TYPE.to_string(),
            token_header: DEFAULT_TOKEN_HEADER.to_string(),
        }
    }
}

impl ProcessorOptions {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_auth(mut self, auth_type: impl Into<String>, token_header: impl Into<String>) -> Self {
        self.auth_type = auth_type.into();
        self.token_header = token_header.into();
        self
    }
}

/// Load `source` (file path or URL) and reconcile it against the remote API.
///
/// Only loading and parsing failures are returned as `Err`; no remote call is
/// made before the document has loaded.
pub async fn process_openapi(
    api: &dyn PermitApi,
    source: &str,
    options: &ProcessorOptions,
) -> Result<ProcessingReport> {
    let document = SpecLoader::load(source).await?;
    Ok(process_document(api, &document, options).await)
}

/// Reconcile an already loaded document
pub async fn process_document(
    api: &dyn PermitApi,
    document: &OpenApiDocument,
    options: &ProcessorOptions,
) -> ProcessingReport {
    let start = Instant::now();

    let base_url = options
        .base_url
        .clone()
        .or_else(|| document.default_base_url().map(str::to_string))
        .unwrap_or_default();
    let mut ctx = ProcessorContext::new(base_url);

    let extraction = extensions::extract(document);
    for warning in extraction.warnings {
        ctx.warn(warning);
    }
    let paths = extraction.paths;
    info!("Found {} annotated path(s)", paths.len());

    ctx.seed(api).await;

    resources::process_resources(&mut ctx, api, &paths).await;
    roles::process_roles(&mut ctx, api, &paths).await;
    roles::process_resource_roles(&mut ctx, api, &paths).await;
    relations::process_relations(&mut ctx, api, &paths).await;
    relations::process_derived_roles(&mut ctx, api, &paths).await;

    url_mappings::generate_url_mappings(&mut ctx, &paths);
    url_mappings::push_url_mappings(&mut ctx, api, &options.auth_type, &options.token_header)
        .await;

    let report = ctx.into_report(start.elapsed().as_millis());
    info!(
        "OpenAPI processing finished in {}ms with {} error(s) and {} warning(s)",
        report.execution_time_ms,
        report.errors.len(),
        report.warnings.len()
    );
    report
}
