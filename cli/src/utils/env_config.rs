use anyhow::{anyhow, Context, Result};
use permit_api::{ClientConfig, DEFAULT_API_URL};
use serde::Serialize;
use std::env;
use std::path::PathBuf;

pub const API_KEY_VAR: &str = "PERMIT_API_KEY";
pub const API_URL_VAR: &str = "PERMIT_API_URL";
pub const PROJECT_VAR: &str = "PERMIT_PROJECT";
pub const ENVIRONMENT_VAR: &str = "PERMIT_ENV";

/// Values given on the command line; they win over the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub project: Option<String>,
    pub environment: Option<String>,
}

/// Connection settings resolved from flags, environment and `.env`
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub project: Option<String>,
    pub environment: Option<String>,
}

/// Printable view of the configuration with the key masked
#[derive(Debug, Serialize)]
pub struct ConfigView {
    pub api_key: Option<String>,
    pub api_url: String,
    pub project: Option<String>,
    pub environment: Option<String>,
}

impl EnvConfig {
    /// Load `.env` from the current directory, then resolve every value
    pub fn load(overrides: ConfigOverrides) -> Result<Self> {
        Self::load_with_base(overrides, None)
    }

    /// Like [`EnvConfig::load`], reading `.env` from `base_dir` instead.
    /// This is primarily for testing purposes
    pub fn load_with_base(overrides: ConfigOverrides, base_dir: Option<PathBuf>) -> Result<Self> {
        let base = match base_dir {
            Some(base) => base,
            None => env::current_dir().context("Failed to get current directory")?,
        };

        // Variables already set in the process environment are kept
        let env_file = base.join(".env");
        if env_file.exists() {
            dotenv::from_path(&env_file).ok();
        }

        Ok(Self {
            api_key: overrides.api_key.or_else(|| get_from_env(API_KEY_VAR)),
            api_url: overrides
                .api_url
                .or_else(|| get_from_env(API_URL_VAR))
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            project: overrides.project.or_else(|| get_from_env(PROJECT_VAR)),
            environment: overrides
                .environment
                .or_else(|| get_from_env(ENVIRONMENT_VAR)),
        })
    }

    /// Build the API client configuration; fails without an API key
    pub fn client_config(&self) -> Result<ClientConfig> {
        let api_key = self.api_key.clone().ok_or_else(|| {
            anyhow!(
                "No API key configured. Set {} or pass --api-key",
                API_KEY_VAR
            )
        })?;

        let mut config = ClientConfig::new(api_key).with_api_url(self.api_url.clone());
        config.project = self.project.clone();
        config.environment = self.environment.clone();
        Ok(config)
    }

    pub fn view(&self) -> ConfigView {
        ConfigView {
            api_key: self.api_key.as_deref().map(mask),
            api_url: self.api_url.clone(),
            project: self.project.clone(),
            environment: self.environment.clone(),
        }
    }
}

/// Empty values count as unset
fn get_from_env(var_name: &str) -> Option<String> {
    env::var(var_name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Keep the last four characters of long secrets, nothing of short ones
pub fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Use a mutex to ensure tests don't interfere with each other's environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for var in [API_KEY_VAR, API_URL_VAR, PROJECT_VAR, ENVIRONMENT_VAR] {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let temp_dir = TempDir::new().unwrap();

        let config =
            EnvConfig::load_with_base(ConfigOverrides::default(), Some(temp_dir.path().into()))
                .unwrap();

        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert!(config.api_key.is_none());
        assert!(config.project.is_none());
        assert!(config.client_config().is_err());
    }

    #[test]
    fn test_env_vars_and_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let temp_dir = TempDir::new().unwrap();

        env::set_var(API_KEY_VAR, "permit_key_from_env");
        env::set_var(PROJECT_VAR, "default");
        env::set_var(ENVIRONMENT_VAR, "  ");

        let overrides = ConfigOverrides {
            project: Some("billing".to_string()),
            ..ConfigOverrides::default()
        };
        let config = EnvConfig::load_with_base(overrides, Some(temp_dir.path().into())).unwrap();

        assert_eq!(config.api_key.as_deref(), Some("permit_key_from_env"));
        assert_eq!(config.project.as_deref(), Some("billing"));
        // Blank values count as unset
        assert!(config.environment.is_none());

        let client = config.client_config().unwrap();
        assert_eq!(client.api_key, "permit_key_from_env");
        assert_eq!(client.project.as_deref(), Some("billing"));

        clear_env();
    }

    #[test]
    fn test_dotenv_file_does_not_override_process_env() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(".env"),
            "PERMIT_PROJECT=from-dotenv\nPERMIT_ENV=from-dotenv\n",
        )
        .unwrap();
        env::set_var(ENVIRONMENT_VAR, "from-process");

        let config =
            EnvConfig::load_with_base(ConfigOverrides::default(), Some(temp_dir.path().into()))
                .unwrap();

        assert_eq!(config.project.as_deref(), Some("from-dotenv"));
        assert_eq!(config.environment.as_deref(), Some("from-process"));

        clear_env();
    }

    #[test]
    fn test_mask() {
        assert_eq!(mask("short"), "****");
        assert_eq!(mask("permit_key_abcdef1234"), "****1234");

        let config = EnvConfig {
            api_key: Some("permit_key_abcdef1234".to_string()),
            api_url: DEFAULT_API_URL.to_string(),
            project: None,
            environment: None,
        };
        assert_eq!(config.view().api_key.as_deref(), Some("****1234"));
    }
}
