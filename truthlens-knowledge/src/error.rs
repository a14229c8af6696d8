//! Error types for the truthlens-knowledge crate.
//!
//! Recoverable failures (a single provider, a single claim, cache
//! persistence) are logged and absorbed by the manager; only the variants
//! documented on each public operation ever reach the caller. No API keys
//! appear in error messages.

/// Errors that can occur during knowledge search and claim verification.
#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    /// One provider failed. Recovered by the manager and excluded from
    /// aggregation.
    #[error("provider {provider} failed: {message}")]
    ProviderSearch {
        /// Registered provider name.
        provider: String,
        /// Underlying failure description.
        message: String,
    },

    /// A provider did not answer within its timeout.
    #[error("provider {provider} timed out after {timeout_ms}ms")]
    Timeout {
        /// Registered provider name.
        provider: String,
        /// Effective timeout that elapsed.
        timeout_ms: u64,
    },

    /// Every enabled provider failed or timed out.
    #[error("all knowledge providers failed: {0}")]
    AllProvidersFailed(String),

    /// No provider is enabled, so nothing was queried.
    #[error("no knowledge providers are enabled")]
    NoProviders,

    /// Cache persistence or load failure. Never fatal.
    #[error("cache error: {0}")]
    Cache(String),

    /// The search backing one claim failed during verification.
    #[error("claim search failed for {claim:?}: {message}")]
    ClaimSearch {
        /// The claim being verified.
        claim: String,
        /// Underlying failure description.
        message: String,
    },

    /// An HTTP request to a knowledge source failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A knowledge source response could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid configuration.
    #[error("config error: {0}")]
    Config(String),
}

/// Convenience type alias for truthlens-knowledge results.
pub type Result<T> = std::result::Result<T, KnowledgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_provider_search() {
        let err = KnowledgeError::ProviderSearch {
            provider: "wikipedia".into(),
            message: "connection refused".into(),
        };
        assert_eq!(
            err.to_string(),
            "provider wikipedia failed: connection refused"
        );
    }

    #[test]
    fn display_timeout() {
        let err = KnowledgeError::Timeout {
            provider: "news".into(),
            timeout_ms: 5000,
        };
        assert_eq!(err.to_string(), "provider news timed out after 5000ms");
    }

    #[test]
    fn display_all_providers_failed() {
        let err = KnowledgeError::AllProvidersFailed("wikipedia: timeout".into());
        assert_eq!(
            err.to_string(),
            "all knowledge providers failed: wikipedia: timeout"
        );
    }

    #[test]
    fn display_no_providers() {
        assert_eq!(
            KnowledgeError::NoProviders.to_string(),
            "no knowledge providers are enabled"
        );
    }

    #[test]
    fn display_claim_search() {
        let err = KnowledgeError::ClaimSearch {
            claim: "water is wet".into(),
            message: "boom".into(),
        };
        assert_eq!(
            err.to_string(),
            "claim search failed for \"water is wet\": boom"
        );
    }

    #[test]
    fn display_config() {
        let err = KnowledgeError::Config("cache_capacity must be > 0".into());
        assert_eq!(err.to_string(), "config error: cache_capacity must be > 0");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<KnowledgeError>();
    }
}
