//! # truthlens-knowledge
//!
//! Knowledge aggregation and claim verification for TruthLens.
//!
//! The crate queries several independent knowledge sources concurrently,
//! scores every document it gets back, merges and deduplicates the
//! results into one ranked list and uses that list as evidence when
//! verifying factual claims.
//!
//! ## Design
//!
//! - Built-in adapters for Wikipedia, arXiv + PubMed, and NewsAPI + the
//!   Guardian, all behind the [`KnowledgeProvider`] trait
//! - Providers are queried concurrently with per-provider timeouts; one
//!   slow or failing source never fails the whole search
//! - An opt-in per-provider circuit breaker skips sources that keep failing
//! - In-memory TTL cache with tag invalidation and optional persistence
//! - Per-upstream request throttling with jitter
//!
//! ## Security
//!
//! - API keys are sent in headers or query strings only and never appear
//!   in errors or logs
//! - Queries are logged at debug or trace level only

pub mod cache;
pub mod circuit_breaker;
pub mod config;
pub mod content;
pub mod error;
pub mod http;
pub mod manager;
pub mod provider;
pub mod providers;
pub mod scoring;
pub mod types;

pub use cache::{CacheOptions, CacheStats, CacheStore, JsonFileStore, TtlCache};
pub use circuit_breaker::{CircuitBreakerConfig, CircuitState, HealthReport};
pub use config::KnowledgeConfig;
pub use error::{KnowledgeError, Result};
pub use manager::{KnowledgeManager, KnowledgeStatistics};
pub use provider::{KnowledgeProvider, ProviderFactory};
pub use types::{
    ClaimVerificationResult, DateRange, Document, DocumentMetadata, FactCheckVerdict,
    KnowledgeProviderResult, ProviderConfig, ProviderConfigUpdate, ProviderInfo, ProviderKind,
    ReliabilityMetrics, SearchMetadata, SearchOptions, Verification,
};

/// Search every built-in provider with the default configuration.
///
/// Convenience wrapper that builds a throwaway [`KnowledgeManager`]; hold
/// on to a manager instead when searching more than once so the cache can
/// do its job.
///
/// # Errors
///
/// Same as [`KnowledgeManager::search`], plus construction errors.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> truthlens_knowledge::Result<()> {
/// let result = truthlens_knowledge::search_default("photosynthesis").await?;
/// for doc in &result.documents {
///     println!("{} ({:?})", doc.title, doc.metadata.provider);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn search_default(query: &str) -> Result<KnowledgeProviderResult> {
    let manager = KnowledgeManager::new(KnowledgeConfig::default())?;
    manager.search(query, &SearchOptions::default()).await
}
