use crate::document::OpenApiDocument;
use crate::error::{ProcessorError, Result};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

const FETCH_TIMEOUT_SECS: u64 = 30;

/// Loads OpenAPI documents from disk or over HTTP
pub struct SpecLoader;

impl SpecLoader {
    /// Load and parse a document from a file path or an `http(s)://` URL
    pub async fn load(source: &str) -> Result<OpenApiDocument> {
        let content = if Self::is_url(source) {
            Self::fetch(source).await?
        } else {
            Self::read_file(Path::new(source)).await?
        };

        let document = Self::parse(&content)?;
        info!(
            "Loaded OpenAPI spec from {} ({} path(s))",
            source,
            document.paths.len()
        );
        Ok(document)
    }

    /// Parse JSON, falling back to YAML
    pub fn parse(content: &str) -> Result<OpenApiDocument> {
        let value: Value = match serde_json::from_str(content) {
            Ok(value) => value,
            Err(json_err) => {
                debug!("Spec is not JSON ({}), trying YAML", json_err);
                serde_yaml::from_str(content).map_err(|yaml_err| {
                    ProcessorError::Parse(format!(
                        "not valid JSON ({}) or YAML ({})",
                        json_err, yaml_err
                    ))
                })?
            }
        };

        OpenApiDocument::from_value(&value)
    }

    fn is_url(source: &str) -> bool {
        source.starts_with("http://") || source.starts_with("https://")
    }

    async fn read_file(path: &Path) -> Result<String> {
        debug!("Reading OpenAPI spec from {:?}", path);
        if !path.exists() {
            return Err(ProcessorError::SpecNotFound(path.display().to_string()));
        }
        Ok(tokio::fs::read_to_string(path).await?)
    }

    async fn fetch(url: &str) -> Result<String> {
        debug!("Fetching OpenAPI spec from {}", url);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()?;

        let response = client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProcessorError::Fetch(format!(
                "{} returned status {}",
                url, status
            )));
        }

        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const YAML_SPEC: &str = r#"
openapi: 3.0.0
info:
  title: Pets
paths:
  /pets:
    x-permit-resource: Pet
    get:
      summary: List pets
"#;

    #[test]
    fn test_parse_json() {
        let doc = SpecLoader::parse(r#"{"paths": {"/a": {"get": {}}}}"#).unwrap();
        assert_eq!(doc.paths.len(), 1);
    }

    #[test]
    fn test_parse_yaml_fallback() {
        let doc = SpecLoader::parse(YAML_SPEC).unwrap();
        assert_eq!(doc.title.as_deref(), Some("Pets"));
        assert_eq!(doc.paths[0].path, "/pets");
        assert_eq!(doc.paths[0].operations.len(), 1);
    }

    #[test]
    fn test_parse_garbage_fails() {
        let err = SpecLoader::parse("{ not: [valid").unwrap_err();
        assert!(matches!(err, ProcessorError::Parse(_)));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("openapi.yaml");
        fs::write(&path, YAML_SPEC).unwrap();

        let doc = SpecLoader::load(path.to_str().unwrap()).await.unwrap();
        assert_eq!(doc.paths.len(), 1);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.json");

        let err = SpecLoader::load(path.to_str().unwrap()).await.unwrap_err();
        assert!(matches!(err, ProcessorError::SpecNotFound(_)));
    }
}
