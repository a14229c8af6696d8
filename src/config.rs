//! Host configuration stored as TOML.
//!
//! The file wraps the engine's [`KnowledgeConfig`] and adds host-only
//! settings. API keys may come from the file or from the environment;
//! the environment wins.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use truthlens_knowledge::KnowledgeConfig;

use crate::error::{AppError, Result};

/// Environment variable holding the NewsAPI key.
pub const NEWSAPI_KEY_ENV: &str = "NEWSAPI_KEY";
/// Environment variable holding the Guardian Open Platform key.
pub const GUARDIAN_KEY_ENV: &str = "GUARDIAN_API_KEY";

/// Top-level host configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where cached search results are persisted between runs. Nothing is
    /// persisted when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_file: Option<PathBuf>,
    /// Tracing filter used when `RUST_LOG` is not set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
    /// Engine settings: cache, deadline and per-provider configuration.
    pub knowledge: KnowledgeConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| AppError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/truthlens/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("truthlens").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("truthlens")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/truthlens-config/config.toml")
        }
    }

    /// Load the effective configuration.
    ///
    /// An explicit `path` must exist. Without one, the default path is used
    /// when present and built-in defaults otherwise. Environment API keys
    /// are applied last and the result is validated.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read or parsed, or if the
    /// resulting engine configuration is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = Self::default_config_path();
                if default.exists() {
                    Self::from_file(&default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        config.knowledge.validate()?;
        Ok(config)
    }

    /// Apply API key overrides from `lookup` (normally the process
    /// environment). Blank values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(key) = value(NEWSAPI_KEY_ENV) {
            self.knowledge.newsapi_key = Some(key);
        }
        if let Some(key) = value(GUARDIAN_KEY_ENV) {
            self.knowledge.guardian_key = Some(key);
        }
    }
}
