use crate::error::{ApiError, ApiResult};

/// Default Permit control-plane endpoint
pub const DEFAULT_API_URL: &str = "https://api.permit.io";

/// Default per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Client configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the Permit API
    pub api_url: String,
    /// Secret API key sent as a bearer token
    pub api_key: String,
    /// Project key or id; resolved from the key scope when absent
    pub project: Option<String>,
    /// Environment key or id; resolved from the key scope when absent
    pub environment: Option<String>,
    pub timeout_secs: u64,
}

impl ClientConfig {
    /// Create a configuration for the given API key with default settings
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: api_key.into(),
            project: None,
            environment: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Set the API base URL
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Pin the project and environment instead of resolving them from the key
    pub fn with_scope(mut self, project: impl Into<String>, environment: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self.environment = Some(environment.into());
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Check the configuration before any request is made
    pub fn validate(&self) -> ApiResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(ApiError::Config("API key cannot be empty".to_string()));
        }
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(ApiError::Config(format!(
                "API URL must start with http:// or https://, got '{}'",
                self.api_url
            )));
        }
        Ok(())
    }

    /// API base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new("permit_key_123");
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(config.project.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_key_and_bad_url() {
        assert!(ClientConfig::new("  ").validate().is_err());
        assert!(ClientConfig::new("k")
            .with_api_url("api.permit.io")
            .validate()
            .is_err());
    }

    #[test]
    fn test_base_url_trims_trailing_slash() {
        let config = ClientConfig::new("k").with_api_url("http://localhost:8000/");
        assert_eq!(config.base_url(), "http://localhost:8000");
    }
}
