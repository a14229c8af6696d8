//! Engine configuration with sensible defaults.
//!
//! [`KnowledgeConfig`] controls the cache, the overall search deadline and
//! the per-provider settings used when the manager registers the built-in
//! adapters. The defaults are tuned for polite use of public APIs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::KnowledgeError;
use crate::types::{duration_ms, ProviderConfig};

/// Default User-Agent sent to knowledge sources. Wikipedia and NCBI ask
/// clients to identify themselves.
pub const DEFAULT_USER_AGENT: &str =
    "TruthLens/0.1 (+https://github.com/truthlens/truthlens; knowledge-engine)";

/// Configuration for the knowledge manager and its built-in providers.
///
/// Use [`Default::default()`] for sensible defaults, or construct with
/// field overrides for custom behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// How long search results stay cached.
    #[serde(with = "duration_ms")]
    pub cache_ttl: Duration,
    /// Maximum number of cache entries before the oldest is evicted.
    pub cache_capacity: usize,
    /// Interval of the background sweep that drops expired entries.
    #[serde(with = "duration_ms")]
    pub cache_sweep_interval: Duration,
    /// Upper bound on any provider's effective timeout for a single search.
    #[serde(with = "duration_ms")]
    pub search_deadline: Duration,
    /// Random delay in milliseconds `(min, max)` added to each provider's
    /// minimum request interval.
    pub request_jitter_ms: (u64, u64),
    /// User-Agent sent with every outbound request.
    pub user_agent: String,
    /// NewsAPI key. The NewsAPI sub-source is skipped without one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newsapi_key: Option<String>,
    /// Guardian Open Platform key. Falls back to the public `test` key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guardian_key: Option<String>,
    /// Encyclopedia provider settings.
    pub encyclopedia: ProviderConfig,
    /// Academic provider settings.
    pub academic: ProviderConfig,
    /// News provider settings.
    pub news: ProviderConfig,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(30 * 60),
            cache_capacity: 1000,
            cache_sweep_interval: Duration::from_secs(60),
            search_deadline: Duration::from_secs(15),
            request_jitter_ms: (0, 150),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            encyclopedia: ProviderConfig {
                enabled: true,
                weight: 1.0,
                max_results: 10,
                timeout: Duration::from_secs(8),
            },
            academic: ProviderConfig {
                enabled: true,
                weight: 1.2,
                max_results: 10,
                timeout: Duration::from_secs(12),
            },
            news: ProviderConfig {
                enabled: true,
                weight: 0.8,
                max_results: 10,
                timeout: Duration::from_secs(8),
            },
            newsapi_key: None,
            guardian_key: None,
        }
    }
}

impl KnowledgeConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - `cache_capacity` must be greater than 0
    /// - `cache_ttl`, `cache_sweep_interval` and `search_deadline` must be non-zero
    /// - `request_jitter_ms.0` must be <= `request_jitter_ms.1`
    /// - every provider needs a positive weight, result cap and timeout
    pub fn validate(&self) -> Result<(), KnowledgeError> {
        if self.cache_capacity == 0 {
            return Err(KnowledgeError::Config(
                "cache_capacity must be greater than 0".into(),
            ));
        }
        if self.cache_ttl.is_zero() {
            return Err(KnowledgeError::Config("cache_ttl must be non-zero".into()));
        }
        if self.cache_sweep_interval.is_zero() {
            return Err(KnowledgeError::Config(
                "cache_sweep_interval must be non-zero".into(),
            ));
        }
        if self.search_deadline.is_zero() {
            return Err(KnowledgeError::Config(
                "search_deadline must be non-zero".into(),
            ));
        }
        if self.request_jitter_ms.0 > self.request_jitter_ms.1 {
            return Err(KnowledgeError::Config(
                "request_jitter_ms min must be <= max".into(),
            ));
        }
        for (name, provider) in [
            ("encyclopedia", &self.encyclopedia),
            ("academic", &self.academic),
            ("news", &self.news),
        ] {
            validate_provider(name, provider)?;
        }
        Ok(())
    }
}

/// Validates a single provider's settings.
pub fn validate_provider(name: &str, config: &ProviderConfig) -> Result<(), KnowledgeError> {
    if !(config.weight.is_finite() && config.weight > 0.0) {
        return Err(KnowledgeError::Config(format!(
            "{name}: weight must be a positive number"
        )));
    }
    if config.max_results == 0 {
        return Err(KnowledgeError::Config(format!(
            "{name}: max_results must be greater than 0"
        )));
    }
    if config.timeout.is_zero() {
        return Err(KnowledgeError::Config(format!(
            "{name}: timeout must be non-zero"
        )));
    }
    Ok(())
}
