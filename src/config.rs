//! Configuration for the agent service and the event relay
//!
//! The agent reads an optional TOML file and then applies environment
//! overrides (`BUCKET`, `GOOGLE_CLOUD_PROJECT`, `GOOGLE_CLOUD_LOCATION`,
//! `PORT`). The relay is configured from the environment only.

use crate::storage::normalize_base_location;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment variable holding the base storage location
pub const BUCKET_ENV: &str = "BUCKET";
/// Environment variable holding the agent service address (relay side)
pub const TARGET_APP_URL_ENV: &str = "TARGET_APP_URL";
pub const PROJECT_ENV: &str = "GOOGLE_CLOUD_PROJECT";
pub const LOCATION_ENV: &str = "GOOGLE_CLOUD_LOCATION";
pub const PORT_ENV: &str = "PORT";

/// App name shared by the relay and the agent service
pub const DEFAULT_APP_NAME: &str = "test_agents";
/// Fixed user id the relay submits messages as
pub const DEFAULT_RELAY_USER_ID: &str = "Cloud Run Service";

/// Main agent configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub auth: AuthSection,
    #[serde(default)]
    pub server: ServerSection,
}

/// Storage section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageSection {
    /// Base location, `gs://bucket` or a bare bucket name (`BUCKET` overrides)
    pub bucket: Option<String>,
    /// Object backend
    #[serde(default)]
    pub backend: StorageBackend,
    /// Root directory for the local backend
    pub local_root: Option<String>,
    /// Ledger object name inside the bucket
    #[serde(default = "default_ledger_object")]
    pub ledger_object: String,
    #[serde(default = "default_storage_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            bucket: None,
            backend: StorageBackend::default(),
            local_root: None,
            ledger_object: default_ledger_object(),
            timeout_secs: default_storage_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Gcs,
    Local,
}

/// Cloud Storage keeps the leading `/` as part of the object name
fn default_ledger_object() -> String {
    "/product_holds.txt".to_string()
}

fn default_storage_timeout_secs() -> u64 {
    30
}

/// LLM section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmSection {
    /// Provider name; only "vertex" is supported
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,
    /// GCP project (`GOOGLE_CLOUD_PROJECT` fills it when absent)
    pub project: Option<String>,
    /// Vertex AI region
    #[serde(default = "default_location")]
    pub location: String,
    /// Override for the Vertex endpoint root
    pub base_url: Option<String>,
    /// Optional temperature (0.0 to 2.0)
    pub temperature: Option<f32>,
    /// Optional max tokens
    pub max_tokens: Option<u32>,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            project: None,
            location: default_location(),
            base_url: None,
            temperature: None,
            max_tokens: None,
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "vertex".to_string()
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_location() -> String {
    "us-central1".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    60
}

/// Credential section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthSection {
    #[serde(default)]
    pub mode: AuthMode,
    /// Environment variable holding the token when `mode = "static"`
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Override for the metadata server endpoint
    pub metadata_url: Option<String>,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            mode: AuthMode::default(),
            token_env: default_token_env(),
            metadata_url: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    #[default]
    Metadata,
    Static,
}

fn default_token_env() -> String {
    "GCP_ACCESS_TOKEN".to_string()
}

/// HTTP server section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    #[serde(default = "default_agent_port")]
    pub port: u16,
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_agent_port(),
            app_name: default_app_name(),
        }
    }
}

fn default_agent_port() -> u16 {
    8000
}

fn default_app_name() -> String {
    DEFAULT_APP_NAME.to_string()
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Required setting missing: {0}")]
    MissingSetting(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AgentConfig {
    /// Load configuration from TOML file with environment overrides
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content, |name| std::env::var(name).ok())
    }

    /// Build configuration from defaults plus environment only
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.resolve(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Parse TOML and resolve overrides through `lookup`
    pub fn from_toml_str<F>(content: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: AgentConfig = toml::from_str(content)?;
        config.resolve(lookup)?;
        Ok(config)
    }

    /// Apply environment overrides, then validate
    fn resolve<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(bucket) = non_empty(BUCKET_ENV) {
            self.storage.bucket = Some(bucket);
        }
        if let Some(project) = non_empty(PROJECT_ENV) {
            self.llm.project = Some(project);
        }
        if let Some(location) = non_empty(LOCATION_ENV) {
            self.llm.location = location;
        }
        if let Some(port) = non_empty(PORT_ENV) {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| {
                    ConfigError::InvalidConfig(format!("{PORT_ENV}='{port}' is not a port"))
                })?;
        }

        let bucket = self
            .storage
            .bucket
            .as_deref()
            .filter(|b| !b.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingSetting(BUCKET_ENV.to_string()))?;
        self.storage.bucket = Some(normalize_base_location(bucket));

        self.validate()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.provider != "vertex" {
            return Err(ConfigError::InvalidConfig(format!(
                "Unsupported LLM provider: {}",
                self.llm.provider
            )));
        }

        if let Some(temperature) = self.llm.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ConfigError::InvalidConfig(format!(
                    "temperature {temperature} is outside 0.0..=2.0"
                )));
            }
        }

        if self.storage.ledger_object.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "storage.ledger_object must not be empty".to_string(),
            ));
        }

        if self.storage.backend == StorageBackend::Local && self.storage.local_root.is_none() {
            return Err(ConfigError::InvalidConfig(
                "storage.local_root is required for the local backend".to_string(),
            ));
        }

        Ok(())
    }

    /// Normalized base location, e.g. `gs://coa-documents`
    pub fn base_location(&self) -> Result<&str, ConfigError> {
        self.storage
            .bucket
            .as_deref()
            .ok_or_else(|| ConfigError::MissingSetting(BUCKET_ENV.to_string()))
    }

    /// GCP project for Vertex AI
    pub fn project(&self) -> Result<&str, ConfigError> {
        self.llm
            .project
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ConfigError::MissingSetting(PROJECT_ENV.to_string()))
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm.timeout_secs)
    }

    pub fn storage_timeout(&self) -> Duration {
        Duration::from_secs(self.storage.timeout_secs)
    }
}

/// Relay configuration, read from the environment
#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    /// Agent service address; absence fails every event with a configuration error
    pub target_url: Option<String>,
    pub app_name: String,
    pub user_id: String,
    pub port: u16,
    pub timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            target_url: None,
            app_name: DEFAULT_APP_NAME.to_string(),
            user_id: DEFAULT_RELAY_USER_ID.to_string(),
            port: 8080,
            timeout: Duration::from_secs(30),
        }
    }
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self {
            target_url: lookup(TARGET_APP_URL_ENV)
                .map(|url| url.trim().trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty()),
            ..Default::default()
        };

        if let Some(port) = lookup(PORT_ENV).filter(|p| !p.trim().is_empty()) {
            config.port = port
                .trim()
                .parse()
                .map_err(|_| {
                    ConfigError::InvalidConfig(format!("{PORT_ENV}='{port}' is not a port"))
                })?;
        }

        Ok(config)
    }

    pub fn with_target_url(mut self, url: impl Into<String>) -> Self {
        self.target_url = Some(url.into());
        self
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config(target_url: &str) -> Self {
        Self::default().with_target_url(target_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_full_config() {
        let toml_content = r#"
[storage]
bucket = "gs://coa-documents"
ledger_object = "holds/product_holds.txt"

[llm]
model = "gemini-2.5-pro"
project = "qa-project"
location = "europe-west4"
temperature = 0.2
max_tokens = 2048

[auth]
mode = "static"
token_env = "MY_TOKEN"

[server]
port = 9000
app_name = "coa"
"#;

        let config = AgentConfig::from_toml_str(toml_content, env(&[])).unwrap();
        assert_eq!(config.base_location().unwrap(), "gs://coa-documents");
        assert_eq!(config.storage.ledger_object, "holds/product_holds.txt");
        assert_eq!(config.llm.model, "gemini-2.5-pro");
        assert_eq!(config.project().unwrap(), "qa-project");
        assert_eq!(config.llm.location, "europe-west4");
        assert_eq!(config.llm.temperature, Some(0.2));
        assert_eq!(config.auth.mode, AuthMode::Static);
        assert_eq!(config.auth.token_env, "MY_TOKEN");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.app_name, "coa");
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config =
            AgentConfig::from_toml_str("[storage]\nbucket = \"docs\"\n", env(&[])).unwrap();

        assert_eq!(config.base_location().unwrap(), "gs://docs");
        assert_eq!(config.storage.backend, StorageBackend::Gcs);
        assert_eq!(config.storage.ledger_object, "/product_holds.txt");
        assert_eq!(config.llm.provider, "vertex");
        assert_eq!(config.llm.model, "gemini-2.5-flash");
        assert_eq!(config.llm.location, "us-central1");
        assert_eq!(config.auth.mode, AuthMode::Metadata);
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.app_name, "test_agents");
        assert!(config.project().is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let config = AgentConfig::from_toml_str(
            "[storage]\nbucket = \"file-bucket\"\n",
            env(&[
                ("BUCKET", "gs://env-bucket"),
                ("GOOGLE_CLOUD_PROJECT", "env-project"),
                ("PORT", "8123"),
            ]),
        )
        .unwrap();

        assert_eq!(config.base_location().unwrap(), "gs://env-bucket");
        assert_eq!(config.project().unwrap(), "env-project");
        assert_eq!(config.server.port, 8123);
    }

    #[test]
    fn test_missing_bucket_is_error() {
        let result = AgentConfig::from_toml_str("", env(&[]));
        assert!(matches!(result, Err(ConfigError::MissingSetting(ref s)) if s == "BUCKET"));

        let result = AgentConfig::from_toml_str("", env(&[("BUCKET", "  ")]));
        assert!(matches!(result, Err(ConfigError::MissingSetting(_))));
    }

    #[test]
    fn test_invalid_port_is_error() {
        let result = AgentConfig::from_toml_str("", env(&[("BUCKET", "b"), ("PORT", "http")]));
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_unsupported_provider() {
        let toml_content = "[storage]\nbucket = \"b\"\n[llm]\nprovider = \"openai\"\n";
        let result = AgentConfig::from_toml_str(toml_content, env(&[]));
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_local_backend_requires_root() {
        let toml_content = "[storage]\nbucket = \"b\"\nbackend = \"local\"\n";
        let result = AgentConfig::from_toml_str(toml_content, env(&[]));
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));

        let toml_content = "[storage]\nbucket = \"b\"\nbackend = \"local\"\nlocal_root = \"/tmp/coa\"\n";
        let config = AgentConfig::from_toml_str(toml_content, env(&[])).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Local);
    }

    #[test]
    fn test_out_of_range_temperature() {
        let toml_content = "[storage]\nbucket = \"b\"\n[llm]\ntemperature = 3.5\n";
        let result = AgentConfig::from_toml_str(toml_content, env(&[]));
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn test_relay_config_from_lookup() {
        let config =
            RelayConfig::from_lookup(env(&[("TARGET_APP_URL", "https://agent.run.app/")])).unwrap();
        assert_eq!(config.target_url.as_deref(), Some("https://agent.run.app"));
        assert_eq!(config.app_name, "test_agents");
        assert_eq!(config.user_id, "Cloud Run Service");
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_relay_config_without_target() {
        let config = RelayConfig::from_lookup(env(&[("TARGET_APP_URL", "")])).unwrap();
        assert_eq!(config.target_url, None);
    }
}
