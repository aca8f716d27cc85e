use crate::error::{ProcessorError, Result};
use serde_json::{Map, Value};
use std::fmt;
use tracing::debug;

/// Prefix shared by every Permit vendor extension
pub const EXTENSION_PREFIX: &str = "x-permit-";

/// HTTP methods an OpenAPI path item may define operations for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
}

impl HttpMethod {
    /// All methods, in the order OpenAPI lists them on a path item
    pub const ALL: [HttpMethod; 8] = [
        HttpMethod::Get,
        HttpMethod::Put,
        HttpMethod::Post,
        HttpMethod::Delete,
        HttpMethod::Options,
        HttpMethod::Head,
        HttpMethod::Patch,
        HttpMethod::Trace,
    ];

    /// Lowercase name, as used in path items and as the default action key
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Put => "put",
            HttpMethod::Post => "post",
            HttpMethod::Delete => "delete",
            HttpMethod::Options => "options",
            HttpMethod::Head => "head",
            HttpMethod::Patch => "patch",
            HttpMethod::Trace => "trace",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

/// One operation of a path item
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub method: HttpMethod,
    pub summary: Option<String>,
    pub description: Option<String>,
    /// `x-permit-*` extensions declared on the operation
    pub extensions: Map<String, Value>,
}

/// One entry of the document's `paths` object
#[derive(Debug, Clone, PartialEq)]
pub struct PathItem {
    pub path: String,
    /// `x-permit-*` extensions declared on the path item itself
    pub extensions: Map<String, Value>,
    /// Defined operations, in method order
    pub operations: Vec<Operation>,
}

impl PathItem {
    pub fn extension(&self, name: &str) -> Option<&Value> {
        self.extensions.get(name)
    }
}

impl Operation {
    pub fn extension(&self, name: &str) -> Option<&Value> {
        self.extensions.get(name)
    }
}

/// Read-only view over a parsed OpenAPI 3.x document
#[derive(Debug, Clone, PartialEq)]
pub struct OpenApiDocument {
    pub title: Option<String>,
    /// `servers[].url` entries, in document order
    pub servers: Vec<String>,
    /// Path items, in document order
    pub paths: Vec<PathItem>,
}

impl OpenApiDocument {
    /// Build the view from a parsed JSON/YAML value
    pub fn from_value(value: &Value) -> Result<Self> {
        let root = value.as_object().ok_or_else(|| {
            ProcessorError::InvalidDocument("document root must be an object".to_string())
        })?;

        let paths_object = root
            .get("paths")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                ProcessorError::InvalidDocument("document has no 'paths' object".to_string())
            })?;

        let title = root
            .get("info")
            .and_then(|info| info.get("title"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let servers = root
            .get("servers")
            .and_then(Value::as_array)
            .map(|servers| {
                servers
                    .iter()
                    .filter_map(|server| server.get("url").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let mut paths = Vec::with_capacity(paths_object.len());
        for (path, item) in paths_object {
            let Some(item) = item.as_object() else {
                debug!("Skipping path {} whose item is not an object", path);
                continue;
            };

            let operations = HttpMethod::ALL
                .iter()
                .filter_map(|method| {
                    let operation = item.get(method.as_str())?.as_object()?;
                    Some(Operation {
                        method: *method,
                        summary: string_field(operation, "summary"),
                        description: string_field(operation, "description"),
                        extensions: permit_extensions(operation),
                    })
                })
                .collect();

            paths.push(PathItem {
                path: path.clone(),
                extensions: permit_extensions(item),
                operations,
            });
        }

        Ok(Self {
            title,
            servers,
            paths,
        })
    }

    /// First declared server URL, used as the default mapping prefix
    pub fn default_base_url(&self) -> Option<&str> {
        self.servers.first().map(String::as_str)
    }
}

fn string_field(object: &Map<String, Value>, field: &str) -> Option<String> {
    object
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn permit_extensions(object: &Map<String, Value>) -> Map<String, Value> {
    object
        .iter()
        .filter(|(key, _)| key.starts_with(EXTENSION_PREFIX))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_paths_keep_document_order() {
        let doc = OpenApiDocument::from_value(&json!({
            "openapi": "3.0.0",
            "info": {"title": "Shop"},
            "paths": {
                "/zeta": {"get": {}},
                "/alpha": {"get": {}},
                "/middle": {"get": {}}
            }
        }))
        .unwrap();

        let order: Vec<&str> = doc.paths.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(order, vec!["/zeta", "/alpha", "/middle"]);
        assert_eq!(doc.title.as_deref(), Some("Shop"));
    }

    #[test]
    fn test_operations_and_extensions() {
        let doc = OpenApiDocument::from_value(&json!({
            "servers": [{"url": "https://api.example.com"}, {"url": "http://localhost"}],
            "paths": {
                "/orders": {
                    "x-permit-resource": "Order",
                    "summary": "not an operation",
                    "parameters": [],
                    "post": {"summary": "Create", "x-permit-action": "create", "tags": []},
                    "get": {"description": " List orders "}
                }
            }
        }))
        .unwrap();

        let item = &doc.paths[0];
        assert_eq!(item.extension("x-permit-resource"), Some(&json!("Order")));
        assert_eq!(item.extensions.len(), 1);

        let methods: Vec<HttpMethod> = item.operations.iter().map(|o| o.method).collect();
        assert_eq!(methods, vec![HttpMethod::Get, HttpMethod::Post]);
        assert_eq!(item.operations[0].description.as_deref(), Some("List orders"));
        assert_eq!(
            item.operations[1].extension("x-permit-action"),
            Some(&json!("create"))
        );
        assert_eq!(doc.default_base_url(), Some("https://api.example.com"));
    }

    #[test]
    fn test_missing_paths_is_invalid() {
        let err = OpenApiDocument::from_value(&json!({"openapi": "3.0.0"})).unwrap_err();
        assert!(matches!(err, ProcessorError::InvalidDocument(_)));

        let err = OpenApiDocument::from_value(&json!(["not", "a", "document"])).unwrap_err();
        assert!(matches!(err, ProcessorError::InvalidDocument(_)));
    }

    #[test]
    fn test_method_display() {
        assert_eq!(HttpMethod::Patch.to_string(), "PATCH");
        assert_eq!(HttpMethod::Patch.as_str(), "patch");
    }
}
