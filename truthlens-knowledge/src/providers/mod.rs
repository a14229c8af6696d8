//! Built-in knowledge provider adapters.
//!
//! Each module provides a struct implementing
//! [`crate::provider::KnowledgeProvider`] for one family of sources.

pub mod academic;
pub mod encyclopedia;
pub mod fact_check;
pub mod news;

pub use academic::{AcademicEndpoints, AcademicProvider};
pub use encyclopedia::EncyclopediaProvider;
pub use fact_check::{FactCheckReport, FactChecker, StaticFactChecker};
pub use news::{NewsEndpoints, NewsProvider};

use std::time::Duration;

use crate::config::KnowledgeConfig;

/// HTTP settings shared by every built-in adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterSettings {
    /// User-Agent sent upstream.
    pub user_agent: String,
    /// Hard cap on a single HTTP request.
    pub request_timeout: Duration,
    /// Random extra delay range added to each upstream's request interval.
    pub jitter_ms: (u64, u64),
}

impl AdapterSettings {
    /// Derive adapter settings from the engine configuration.
    pub fn from_config(config: &KnowledgeConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            request_timeout: config.search_deadline,
            jitter_ms: config.request_jitter_ms,
        }
    }
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self::from_config(&KnowledgeConfig::default())
    }
}

/// Lowercase language code if it is a plausible ISO 639 tag.
pub(crate) fn sanitize_language(code: Option<&str>) -> Option<String> {
    let code = code?.trim().to_ascii_lowercase();
    let valid = (2..=12).contains(&code.len())
        && code.chars().all(|c| c.is_ascii_lowercase() || c == '-');
    valid.then_some(code)
}
