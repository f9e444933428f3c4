//! Configuration for a Paddock session.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::audit::DEFAULT_AUDIT_CAPACITY;

/// Error loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Could not read the file
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// File is not valid YAML for this config
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PaddockConfig {
    /// Inference backend configuration
    pub backend: BackendConfig,
    /// General settings
    pub general: GeneralConfig,
}

impl PaddockConfig {
    /// Load config from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Load config from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content)
    }
}

/// OpenAI-compatible backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the chat-completions API
    pub base_url: String,
    /// Model name
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Request timeout (ms)
    pub timeout_ms: u64,
    /// Maximum tokens to generate
    pub max_tokens: u32,
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// API key from the configured environment variable, if set and non-empty.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".to_string(),
            model: "llama3.2".to_string(),
            api_key_env: "PADDOCK_API_KEY".to_string(),
            timeout_ms: 30_000,
            max_tokens: 512,
        }
    }
}

/// General configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable the analysis audit log
    pub audit_enabled: bool,
    /// Audit entries kept
    pub audit_capacity: usize,
    /// Log level
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            audit_enabled: true,
            audit_capacity: DEFAULT_AUDIT_CAPACITY,
            log_level: "info".to_string(),
        }
    }
}
