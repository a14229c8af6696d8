//! Knowledge manager: concurrent provider fan-out, merge, rank, cache and
//! claim verification.
//!
//! The manager owns an ordered registry of providers. Each search takes a
//! snapshot of the enabled ones, queries them concurrently with
//! [`futures::future::join_all`], races every provider against its own
//! timeout, merges what came back and caches the combined result.
//! Reconfiguration only touches the registry, so searches already in
//! flight keep the snapshot they started with. The cache key carries each
//! provider's weight and result cap, so a result computed from an older
//! snapshot is never served after the change.

pub mod aggregate;
pub mod dedup;
pub mod verify;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::{CacheOptions, CacheStats, CacheStore, TtlCache};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, HealthReport};
use crate::config::{validate_provider, KnowledgeConfig};
use crate::error::{KnowledgeError, Result};
use crate::provider::{KnowledgeProvider, ProviderFactory};
use crate::providers::{self, AdapterSettings};
use crate::types::{
    ClaimVerificationResult, Document, KnowledgeProviderResult, ProviderConfig,
    ProviderConfigUpdate, ProviderInfo, SearchMetadata, SearchOptions,
};

use aggregate::{aggregate_reliability, rank, Contribution};
use dedup::deduplicate;

/// Tag carried by every cached search result.
pub const SEARCH_TAG: &str = "search";
/// Tag carried by every cached document.
pub const DOCUMENT_TAG: &str = "document";

struct ProviderEntry {
    name: String,
    config: ProviderConfig,
    adapter: Option<Arc<dyn KnowledgeProvider>>,
    factory: ProviderFactory,
}

/// A provider as seen by one search call.
#[derive(Clone)]
struct ActiveProvider {
    name: String,
    config: ProviderConfig,
    adapter: Arc<dyn KnowledgeProvider>,
}

/// Snapshot returned by [`KnowledgeManager::get_statistics`].
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeStatistics {
    /// Names of enabled providers in registration order.
    pub enabled_providers: Vec<String>,
    /// Live entries across the result and document caches.
    pub cache_size: usize,
    /// Description of every enabled provider.
    pub provider_info: Vec<ProviderInfo>,
    /// Circuit state of every provider that has been queried. Empty when
    /// no circuit breaker is configured.
    pub provider_health: Vec<HealthReport>,
    /// Counters of the search result cache.
    pub cache: CacheStats,
}

/// Returned by the document lookup when no provider has the id.
struct NotFound;

/// Aggregates knowledge providers behind one search and verification API.
pub struct KnowledgeManager {
    config: KnowledgeConfig,
    providers: RwLock<Vec<ProviderEntry>>,
    results: Arc<TtlCache<KnowledgeProviderResult>>,
    documents: Arc<TtlCache<Document>>,
    breaker: Option<Mutex<CircuitBreaker>>,
}

impl KnowledgeManager {
    /// Create a manager with the built-in Wikipedia, academic and news
    /// providers registered from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::Config`] for an invalid configuration and
    /// [`KnowledgeError::Http`] if an adapter's HTTP client cannot be built.
    pub fn new(config: KnowledgeConfig) -> Result<Self> {
        let manager = Self::empty(config)?;
        manager.register_builtin_providers()?;
        Ok(manager)
    }

    /// Create a manager with no providers registered.
    ///
    /// When called inside a tokio runtime, background sweeps of both
    /// caches start at `cache_sweep_interval`. They stop when the manager
    /// is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::Config`] for an invalid configuration.
    pub fn empty(config: KnowledgeConfig) -> Result<Self> {
        config.validate()?;
        let manager = Self {
            results: Arc::new(TtlCache::new(config.cache_capacity, config.cache_ttl)),
            documents: Arc::new(TtlCache::new(config.cache_capacity, config.cache_ttl)),
            providers: RwLock::new(Vec::new()),
            breaker: None,
            config,
        };
        manager.start_sweeper(&manager.results);
        manager.start_sweeper(&manager.documents);
        Ok(manager)
    }

    fn start_sweeper<V>(&self, cache: &Arc<TtlCache<V>>)
    where
        V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        if tokio::runtime::Handle::try_current().is_ok() {
            cache.spawn_sweeper(self.config.cache_sweep_interval);
        } else {
            tracing::debug!("no tokio runtime, cache sweeps disabled");
        }
    }

    /// Persist search results through `store`, restoring what it holds.
    pub fn with_result_store(mut self, store: Arc<dyn CacheStore<KnowledgeProviderResult>>) -> Self {
        self.results = Arc::new(
            TtlCache::new(self.config.cache_capacity, self.config.cache_ttl).with_store(store),
        );
        self.start_sweeper(&self.results);
        self
    }

    /// Skip providers that keep failing. Without this every enabled
    /// provider is queried on every search.
    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker = Some(Mutex::new(CircuitBreaker::new(config)));
        self
    }

    fn register_builtin_providers(&self) -> Result<()> {
        let settings = AdapterSettings::from_config(&self.config);

        let wiki_settings = settings.clone();
        let encyclopedia: ProviderFactory = Arc::new(move || {
            let provider = providers::EncyclopediaProvider::new(&wiki_settings)?;
            Ok(Arc::new(provider) as Arc<dyn KnowledgeProvider>)
        });

        let academic_settings = settings.clone();
        let academic: ProviderFactory = Arc::new(move || {
            let provider = providers::AcademicProvider::new(&academic_settings)?;
            Ok(Arc::new(provider) as Arc<dyn KnowledgeProvider>)
        });

        let newsapi_key = self.config.newsapi_key.clone();
        let guardian_key = self.config.guardian_key.clone();
        let news: ProviderFactory = Arc::new(move || {
            let provider =
                providers::NewsProvider::new(&settings, newsapi_key.clone(), guardian_key.clone())?;
            Ok(Arc::new(provider) as Arc<dyn KnowledgeProvider>)
        });

        self.register_provider(
            providers::encyclopedia::NAME,
            self.config.encyclopedia.clone(),
            encyclopedia,
        )?;
        self.register_provider(providers::academic::NAME, self.config.academic.clone(), academic)?;
        self.register_provider(providers::news::NAME, self.config.news.clone(), news)?;
        Ok(())
    }

    fn registry_read(&self) -> std::sync::RwLockReadGuard<'_, Vec<ProviderEntry>> {
        self.providers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn registry_write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<ProviderEntry>> {
        self.providers.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn breaker(&self) -> Option<MutexGuard<'_, CircuitBreaker>> {
        self.breaker
            .as_ref()
            .map(|breaker| breaker.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Register a provider under `name`. The factory is called now if the
    /// provider is enabled, and again whenever it is re-enabled.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::Config`] for an invalid config or a name
    /// that is already registered, or the factory's error.
    pub fn register_provider(
        &self,
        name: &str,
        config: ProviderConfig,
        factory: ProviderFactory,
    ) -> Result<()> {
        validate_provider(name, &config)?;
        let mut registry = self.registry_write();
        if registry.iter().any(|entry| entry.name == name) {
            return Err(KnowledgeError::Config(format!(
                "provider {name} is already registered"
            )));
        }
        let adapter = if config.enabled { Some(factory()?) } else { None };
        tracing::debug!(provider = name, enabled = config.enabled, "provider registered");
        registry.push(ProviderEntry {
            name: name.to_owned(),
            config,
            adapter,
            factory,
        });
        Ok(())
    }

    /// Register an already constructed adapter. Re-enabling it reuses the
    /// same instance.
    ///
    /// # Errors
    ///
    /// Same as [`KnowledgeManager::register_provider`].
    pub fn register_adapter(
        &self,
        name: &str,
        config: ProviderConfig,
        adapter: Arc<dyn KnowledgeProvider>,
    ) -> Result<()> {
        let factory: ProviderFactory = Arc::new(move || Ok(Arc::clone(&adapter)));
        self.register_provider(name, config, factory)
    }

    fn snapshot(&self) -> Vec<ActiveProvider> {
        self.registry_read()
            .iter()
            .filter(|entry| entry.config.enabled)
            .filter_map(|entry| {
                entry.adapter.as_ref().map(|adapter| ActiveProvider {
                    name: entry.name.clone(),
                    config: entry.config.clone(),
                    adapter: Arc::clone(adapter),
                })
            })
            .collect()
    }

    /// Current configuration of a registered provider.
    pub fn provider_config(&self, name: &str) -> Option<ProviderConfig> {
        self.registry_read()
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.config.clone())
    }

    /// Search every enabled provider and merge the results.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::NoProviders`] when nothing is enabled and
    /// [`KnowledgeError::AllProvidersFailed`] when every enabled provider
    /// failed or timed out (or was skipped by an open circuit, when a
    /// circuit breaker is configured).
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<KnowledgeProviderResult> {
        self.search_with(query, options, false).await
    }

    /// [`KnowledgeManager::search`] with an explicit cache bypass.
    ///
    /// # Errors
    ///
    /// Same as [`KnowledgeManager::search`].
    pub async fn search_with(
        &self,
        query: &str,
        options: &SearchOptions,
        force_refresh: bool,
    ) -> Result<KnowledgeProviderResult> {
        let active = self.snapshot();
        if active.is_empty() {
            return Err(KnowledgeError::NoProviders);
        }

        let key = cache_key(query, options, &active);
        let cache_options = CacheOptions {
            ttl: None,
            tags: std::iter::once(SEARCH_TAG.to_owned())
                .chain(active.iter().map(|p| p.name.clone()))
                .collect(),
            force_refresh,
        };

        let mut computed = false;
        let mut result = self
            .results
            .get(
                &key,
                || {
                    computed = true;
                    self.fan_out(query, options, &active)
                },
                cache_options,
            )
            .await?;

        result.search_metadata.cached = !computed;
        if !computed {
            tracing::debug!(query, "search served from cache");
        }
        if let Some(min) = options.min_reliability {
            result
                .documents
                .retain(|doc| doc.metadata.original_reliability.unwrap_or(0.0) >= min);
        }
        if let Some(limit) = options.limit {
            result.documents.truncate(limit);
        }
        result.search_metadata.total_results = result.documents.len();
        Ok(result)
    }

    async fn fan_out(
        &self,
        query: &str,
        options: &SearchOptions,
        active: &[ActiveProvider],
    ) -> Result<KnowledgeProviderResult> {
        let started = Instant::now();
        tracing::debug!(query, providers = active.len(), "fanning out search");

        let tasks = active.iter().map(|provider| async move {
            let outcome = self.query_provider(provider, query, options).await;
            (provider, outcome)
        });
        let outcomes = join_all(tasks).await;

        let mut contributions = Vec::new();
        let mut failed = Vec::new();
        let mut errors = Vec::new();
        for (provider, outcome) in outcomes {
            match outcome {
                Ok(result) => {
                    tracing::debug!(
                        provider = %provider.name,
                        count = result.documents.len(),
                        "provider returned documents"
                    );
                    contributions.push(Contribution {
                        provider: provider.name.clone(),
                        weight: provider.config.weight,
                        result,
                    });
                }
                Err(err) => {
                    tracing::warn!(provider = %provider.name, error = %err, "provider search failed");
                    failed.push(provider.name.clone());
                    errors.push(err.to_string());
                }
            }
        }

        if contributions.is_empty() {
            return Err(KnowledgeError::AllProvidersFailed(errors.join("; ")));
        }

        let mut documents = contributions
            .iter()
            .flat_map(Contribution::tagged_documents)
            .collect::<Vec<_>>();
        rank(&mut documents);
        let documents = deduplicate(documents);
        let reliability = aggregate_reliability(&contributions, &documents, Utc::now());

        Ok(KnowledgeProviderResult {
            search_metadata: SearchMetadata {
                query: query.to_owned(),
                providers: contributions.iter().map(|c| c.provider.clone()).collect(),
                failed_providers: failed,
                total_results: documents.len(),
                search_time_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                cached: false,
            },
            documents,
            reliability,
        })
    }

    fn effective_timeout(&self, provider: &ActiveProvider) -> Duration {
        provider.config.timeout.min(self.config.search_deadline)
    }

    /// One provider search raced against its timeout, with optional circuit
    /// breaker bookkeeping. Dropping the timed-out future cancels the
    /// provider's outbound request.
    async fn query_provider(
        &self,
        provider: &ActiveProvider,
        query: &str,
        options: &SearchOptions,
    ) -> Result<KnowledgeProviderResult> {
        if self
            .breaker()
            .is_some_and(|mut breaker| !breaker.should_attempt(&provider.name))
        {
            return Err(KnowledgeError::ProviderSearch {
                provider: provider.name.clone(),
                message: "circuit open, provider skipped".to_owned(),
            });
        }

        let per_provider = SearchOptions {
            limit: Some(provider.config.max_results),
            ..options.clone()
        };
        let timeout = self.effective_timeout(provider);
        let outcome =
            match tokio::time::timeout(timeout, provider.adapter.search(query, &per_provider)).await {
                Ok(Ok(result)) => Ok(result),
                Ok(Err(err)) => Err(KnowledgeError::ProviderSearch {
                    provider: provider.name.clone(),
                    message: err.to_string(),
                }),
                Err(_) => Err(KnowledgeError::Timeout {
                    provider: provider.name.clone(),
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                }),
            };

        if let Some(mut breaker) = self.breaker() {
            match &outcome {
                Ok(_) => breaker.record_success(&provider.name),
                Err(_) => breaker.record_failure(&provider.name),
            }
        }
        outcome
    }

    /// Fetch one document by id, trying `provider_hint` first and then the
    /// other enabled providers in registration order. Provider errors are
    /// logged and the next provider is tried. Returns `None` when no
    /// provider has the document, including when none is enabled.
    ///
    /// # Errors
    ///
    /// None at present: provider failures are logged and skipped.
    pub async fn get_document(&self, id: &str, provider_hint: Option<&str>) -> Result<Option<Document>> {
        let mut active = self.snapshot();
        if active.is_empty() {
            tracing::warn!(id, "document lookup with no enabled providers");
            return Ok(None);
        }
        if let Some(hint) = provider_hint {
            if let Some(pos) = active.iter().position(|p| p.name == hint) {
                let hinted = active.remove(pos);
                active.insert(0, hinted);
            }
        }

        let key = format!("document:{id}");
        let lookup = self
            .documents
            .get(
                &key,
                || self.find_document(id, &active),
                CacheOptions::default().tagged([DOCUMENT_TAG]),
            )
            .await;
        match lookup {
            Ok(doc) => Ok(Some(doc)),
            Err(NotFound) => Ok(None),
        }
    }

    async fn find_document(
        &self,
        id: &str,
        active: &[ActiveProvider],
    ) -> std::result::Result<Document, NotFound> {
        for provider in active {
            let timeout = self.effective_timeout(provider);
            match tokio::time::timeout(timeout, provider.adapter.get_document(id)).await {
                Ok(Ok(Some(mut doc))) => {
                    doc.metadata.provider = Some(provider.name.clone());
                    doc.metadata.provider_weight = Some(provider.config.weight);
                    return Ok(doc);
                }
                Ok(Ok(None)) => {}
                Ok(Err(err)) => {
                    tracing::warn!(provider = %provider.name, error = %err, "document lookup failed");
                }
                Err(_) => {
                    tracing::warn!(
                        provider = %provider.name,
                        timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                        "document lookup timed out"
                    );
                }
            }
        }
        Err(NotFound)
    }

    /// Verify every claim concurrently. A failed search degrades only its
    /// own claim to `unsupported`.
    pub async fn verify_claims<S: AsRef<str>>(&self, claims: &[S]) -> Vec<ClaimVerificationResult> {
        let checks = claims.iter().map(|claim| self.verify_claim(claim.as_ref()));
        join_all(checks).await
    }

    async fn verify_claim(&self, claim: &str) -> ClaimVerificationResult {
        if verify::claim_keywords(claim).is_empty() {
            return verify::empty_claim(claim);
        }
        match self
            .search(claim, &SearchOptions::with_limit(verify::EVIDENCE_LIMIT))
            .await
        {
            Ok(result) => verify::assess(claim, result.documents),
            Err(err) => {
                let err = KnowledgeError::ClaimSearch {
                    claim: claim.to_owned(),
                    message: err.to_string(),
                };
                tracing::warn!(error = %err, "claim evidence search failed");
                verify::search_failed(claim, &err)
            }
        }
    }

    /// Apply a partial config update to one provider.
    ///
    /// Enabling a disabled provider builds a fresh adapter from its
    /// factory; disabling drops the adapter. Cached searches that involved
    /// the provider are invalidated. Searches in flight are unaffected.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::Config`] for an unknown provider or an
    /// invalid resulting config, or the factory's error.
    pub fn update_provider_config(&self, name: &str, update: &ProviderConfigUpdate) -> Result<()> {
        {
            let mut registry = self.registry_write();
            let entry = registry
                .iter_mut()
                .find(|entry| entry.name == name)
                .ok_or_else(|| KnowledgeError::Config(format!("unknown provider {name}")))?;

            let mut config = entry.config.clone();
            update.apply_to(&mut config);
            validate_provider(name, &config)?;

            match (entry.config.enabled, config.enabled) {
                (false, true) => {
                    entry.adapter = Some((entry.factory)()?);
                    if let Some(mut breaker) = self.breaker() {
                        breaker.forget(name);
                    }
                }
                (true, false) => entry.adapter = None,
                _ => {}
            }
            entry.config = config;
        }

        let dropped = self.results.invalidate_by_tags(&[name]);
        tracing::info!(provider = name, invalidated = dropped, "provider reconfigured");
        Ok(())
    }

    /// Enabled providers, cache size, provider descriptions and health.
    pub fn get_statistics(&self) -> KnowledgeStatistics {
        let active = self.snapshot();
        KnowledgeStatistics {
            enabled_providers: active.iter().map(|p| p.name.clone()).collect(),
            cache_size: self.results.len() + self.documents.len(),
            provider_info: active.iter().map(|p| p.adapter.provider_info()).collect(),
            provider_health: self
                .breaker()
                .map(|breaker| breaker.health_report())
                .unwrap_or_default(),
            cache: self.results.stats(),
        }
    }

    /// Drop every cached search result and document.
    pub fn clear_cache(&self) {
        self.results.clear();
        self.documents.clear();
        tracing::info!("knowledge cache cleared");
    }

    /// Drop cached entries carrying any of `tags` (provider names,
    /// [`SEARCH_TAG`], [`DOCUMENT_TAG`]). Returns the number removed.
    pub fn invalidate_tags<S: AsRef<str>>(&self, tags: &[S]) -> usize {
        self.results.invalidate_by_tags(tags) + self.documents.invalidate_by_tags(tags)
    }

    /// Write cached search results to the attached store, if any.
    pub fn flush_cache(&self) {
        self.results.flush();
    }

    /// Engine configuration in use.
    pub fn config(&self) -> &KnowledgeConfig {
        &self.config
    }
}

/// Canonical cache key: normalised query, the options that reach the
/// providers, and every participating provider with its weight and result
/// cap. `limit` and `min_reliability` are applied to the cached result and
/// stay out of the key.
fn cache_key(query: &str, options: &SearchOptions, active: &[ActiveProvider]) -> String {
    let mut normalized = SearchOptions {
        limit: None,
        min_reliability: None,
        ..options.clone()
    };
    normalized.language = normalized.language.map(|l| l.trim().to_ascii_lowercase());
    if let Some(categories) = normalized.categories.as_mut() {
        for category in categories.iter_mut() {
            *category = category.trim().to_lowercase();
        }
        categories.sort();
        categories.dedup();
    }
    let options_json = serde_json::to_string(&normalized).unwrap_or_default();

    let mut providers = active
        .iter()
        .map(|p| format!("{}:{}:{}", p.name, p.config.weight, p.config.max_results))
        .collect::<Vec<_>>();
    providers.sort_unstable();

    format!(
        "search:{}|{}|{}",
        query.trim().to_lowercase(),
        options_json,
        providers.join(",")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ProviderKind, ReliabilityMetrics};
    use async_trait::async_trait;

    struct Fixed(&'static str);

    #[async_trait]
    impl KnowledgeProvider for Fixed {
        async fn search(&self, query: &str, _options: &SearchOptions) -> Result<KnowledgeProviderResult> {
            Ok(KnowledgeProviderResult::empty(query, self.0))
        }

        async fn get_document(&self, _id: &str) -> Result<Option<Document>> {
            Ok(None)
        }

        fn calculate_reliability(&self, _document: &Document) -> ReliabilityMetrics {
            ReliabilityMetrics::default()
        }

        fn provider_info(&self) -> ProviderInfo {
            ProviderInfo {
                name: self.0.to_owned(),
                kind: ProviderKind::Custom,
                base_reliability: 0.5,
                supported_languages: vec![],
                rate_limit: Duration::ZERO,
            }
        }
    }

    fn active(names: &[&'static str]) -> Vec<ActiveProvider> {
        names
            .iter()
            .map(|name| ActiveProvider {
                name: (*name).to_owned(),
                config: ProviderConfig::default(),
                adapter: Arc::new(Fixed(name)),
            })
            .collect()
    }

    #[test]
    fn cache_key_normalises_query_and_options() {
        let a = SearchOptions {
            language: Some("EN".into()),
            categories: Some(vec!["Biology".into(), "chemistry".into()]),
            ..Default::default()
        };
        let b = SearchOptions {
            language: Some("en".into()),
            categories: Some(vec!["Chemistry".into(), "biology".into()]),
            ..Default::default()
        };
        assert_eq!(
            cache_key("  Photosynthesis ", &a, &active(&["x", "y"])),
            cache_key("photosynthesis", &b, &active(&["y", "x"]))
        );
    }

    #[test]
    fn cache_key_depends_on_provider_set() {
        let opts = SearchOptions::default();
        assert_ne!(
            cache_key("q", &opts, &active(&["x"])),
            cache_key("q", &opts, &active(&["x", "y"]))
        );
    }

    #[test]
    fn cache_key_ignores_post_cache_filters() {
        let filtered = SearchOptions {
            limit: Some(3),
            min_reliability: Some(0.7),
            ..Default::default()
        };
        assert_eq!(
            cache_key("q", &filtered, &active(&["x"])),
            cache_key("q", &SearchOptions::with_limit(4), &active(&["x"]))
        );
    }

    #[test]
    fn cache_key_tracks_provider_weight_and_cap() {
        let opts = SearchOptions::default();
        let base = active(&["x"]);
        let mut reweighted = active(&["x"]);
        reweighted[0].config.weight = 2.0;
        let mut recapped = active(&["x"]);
        recapped[0].config.max_results = 3;
        assert_ne!(cache_key("q", &opts, &base), cache_key("q", &opts, &reweighted));
        assert_ne!(cache_key("q", &opts, &base), cache_key("q", &opts, &recapped));
    }

    #[test]
    fn builds_outside_a_runtime_without_breaker() {
        let manager = KnowledgeManager::empty(KnowledgeConfig::default()).expect("manager");
        assert!(manager.get_statistics().provider_health.is_empty());
    }

    #[test]
    fn builtin_providers_are_registered_in_order() {
        let manager = KnowledgeManager::new(KnowledgeConfig::default()).expect("manager");
        let stats = manager.get_statistics();
        assert_eq!(stats.enabled_providers, vec!["wikipedia", "academic", "news"]);
        assert_eq!(stats.provider_info.len(), 3);
        assert_eq!(stats.cache_size, 0);
        assert_eq!(manager.provider_config("academic").map(|c| c.weight), Some(1.2));
    }

    #[test]
    fn disabled_builtin_is_not_constructed() {
        let mut config = KnowledgeConfig::default();
        config.news.enabled = false;
        let manager = KnowledgeManager::new(config).expect("manager");
        assert_eq!(manager.get_statistics().enabled_providers, vec!["wikipedia", "academic"]);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let manager = KnowledgeManager::empty(KnowledgeConfig::default()).expect("manager");
        manager
            .register_adapter("x", ProviderConfig::default(), Arc::new(Fixed("x")))
            .expect("first");
        let err = manager
            .register_adapter("x", ProviderConfig::default(), Arc::new(Fixed("x")))
            .unwrap_err();
        assert!(matches!(err, KnowledgeError::Config(_)));
    }

    #[test]
    fn effective_timeout_is_capped_by_deadline() {
        let config = KnowledgeConfig {
            search_deadline: Duration::from_secs(2),
            ..Default::default()
        };
        let manager = KnowledgeManager::empty(config).expect("manager");
        let mut providers = active(&["x"]);
        providers[0].config.timeout = Duration::from_secs(30);
        assert_eq!(manager.effective_timeout(&providers[0]), Duration::from_secs(2));
        providers[0].config.timeout = Duration::from_millis(500);
        assert_eq!(manager.effective_timeout(&providers[0]), Duration::from_millis(500));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = KnowledgeConfig {
            cache_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(
            KnowledgeManager::empty(config),
            Err(KnowledgeError::Config(_))
        ));
    }
}
