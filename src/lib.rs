//! TruthLens host: configuration, logging and manager wiring around the
//! `truthlens-knowledge` engine.
//!
//! The `truthlens` binary uses this crate to load a TOML config, install a
//! tracing subscriber and build a [`KnowledgeManager`] with an optional
//! persisted result cache.

pub mod config;
pub mod error;

use std::sync::Arc;

use truthlens_knowledge::{JsonFileStore, KnowledgeManager};

pub use config::AppConfig;
pub use error::{AppError, Result};

/// Filter used when neither `RUST_LOG` nor the config sets one.
pub const DEFAULT_LOG_FILTER: &str = "truthlens=info,truthlens_knowledge=info";

/// Install a stderr tracing subscriber.
///
/// `RUST_LOG` takes precedence over `fallback`, which takes precedence
/// over [`DEFAULT_LOG_FILTER`]. Calling this twice is harmless.
pub fn init_logging(fallback: Option<&str>) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(fallback.unwrap_or(DEFAULT_LOG_FILTER))
    });
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

/// Build a manager with the built-in providers from `config`, attaching
/// the persisted result cache when one is configured.
///
/// # Errors
///
/// Returns [`AppError::Knowledge`] if the engine rejects the configuration
/// or an adapter cannot be constructed.
pub fn build_manager(config: &AppConfig) -> Result<KnowledgeManager> {
    let manager = KnowledgeManager::new(config.knowledge.clone())?;
    Ok(match &config.cache_file {
        Some(path) => {
            tracing::debug!(path = %path.display(), "using persisted result cache");
            manager.with_result_store(Arc::new(JsonFileStore::new(path.clone())))
        }
        None => manager,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_manager_with_builtin_providers() {
        let manager = build_manager(&AppConfig::default()).expect("manager");
        assert_eq!(
            manager.get_statistics().enabled_providers,
            vec!["wikipedia", "academic", "news"]
        );
    }

    #[test]
    fn builds_manager_with_cache_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = AppConfig {
            cache_file: Some(dir.path().join("results.json")),
            ..Default::default()
        };
        let manager = build_manager(&config).expect("manager");
        assert_eq!(manager.get_statistics().cache_size, 0);
    }

    #[test]
    fn logging_init_is_idempotent() {
        init_logging(Some("truthlens=debug"));
        init_logging(None);
    }
}
