//! Configuration types for the morpheus assistant

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// LLM provider selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderName {
    #[default]
    Ollama,
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub name: ProviderName,
    pub model: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: ProviderName::Ollama,
            model: "mistral".to_string(),
            endpoint: default_endpoint(),
        }
    }
}

/// Conversation memory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_conversations_dir")]
    pub conversations_dir: PathBuf,
}

fn default_conversations_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".morpheus")
        .join("conversations")
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            conversations_dir: default_conversations_dir(),
        }
    }
}

/// Complete assistant configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
}

impl AgentConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> crate::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from default locations with cascade:
    /// 1. ./morpheus.toml (local override)
    /// 2. ~/.morpheus/config.toml (global defaults)
    /// 3. Built-in defaults
    ///
    /// Environment overrides are applied on top in every case.
    pub fn load_default() -> Self {
        let mut config = Self::from_file("morpheus.toml")
            .or_else(|_| {
                dirs::home_dir()
                    .map(|home| home.join(".morpheus").join("config.toml"))
                    .ok_or(crate::Error::Config("no home directory".to_string()))
                    .and_then(Self::from_file)
            })
            .unwrap_or_default();

        config.apply_env_overrides();
        config
    }

    /// Apply MORPHEUS_MODEL / MORPHEUS_ENDPOINT environment overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(model) = std::env::var("MORPHEUS_MODEL") {
            if !model.is_empty() {
                self.provider.model = model;
            }
        }
        if let Ok(endpoint) = std::env::var("MORPHEUS_ENDPOINT") {
            if !endpoint.is_empty() {
                self.provider.endpoint = endpoint;
            }
        }
    }

    /// Get the path to the global config file
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".morpheus").join("config.toml"))
    }
}
