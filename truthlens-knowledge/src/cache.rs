//! Generic in-memory TTL cache with tag invalidation.
//!
//! [`TtlCache`] stores cloneable values under string keys. Every entry has
//! its own TTL and an optional set of tags; expired entries are logically
//! absent and physically removed by lookups or by [`TtlCache::sweep_expired`]
//! (run periodically by [`TtlCache::spawn_sweeper`]). When the cache is full
//! the single oldest entry by insertion is evicted before a new key is
//! inserted.
//!
//! The map is guarded by a [`std::sync::Mutex`] that is never held across
//! an `.await`; compute functions run unlocked. A [`CacheStore`] can be
//! attached for best-effort persistence across restarts.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{join_all, BoxFuture};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::KnowledgeError;
use crate::types::duration_ms;

/// TTL used when neither the caller nor the cache config gives one.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Entry count used by [`TtlCache::default`].
pub const DEFAULT_CAPACITY: usize = 1000;

/// Per-call options for [`TtlCache::get`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheOptions {
    /// Override the cache's default TTL.
    pub ttl: Option<Duration>,
    /// Tags for bulk invalidation.
    pub tags: Vec<String>,
    /// Always recompute and overwrite.
    pub force_refresh: bool,
}

impl CacheOptions {
    /// Options with an explicit TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            ..Self::default()
        }
    }

    /// Add tags.
    pub fn tagged<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Bypass and overwrite any existing entry.
    pub fn refresh(mut self) -> Self {
        self.force_refresh = true;
        self
    }
}

/// A stored value with its bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    /// Cache key.
    pub key: String,
    /// Cached value.
    pub data: V,
    /// Wall-clock time of insertion.
    pub timestamp: DateTime<Utc>,
    /// Lifetime measured from `timestamp`.
    #[serde(with = "duration_ms")]
    pub ttl: Duration,
    /// Invalidation tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that had to compute.
    pub misses: u64,
    /// `hits / (hits + misses)`, or 0 before any lookup.
    pub hit_rate: f64,
    /// Live (unexpired) entries.
    pub total_entries: usize,
    /// Approximate size of live entries in bytes (serialized JSON length).
    pub total_size: usize,
    /// Entries held in memory, including expired ones not yet swept.
    pub stored_entries: usize,
}

/// Durable backing for a cache. Failures are logged by the cache and never
/// affect in-memory behaviour.
pub trait CacheStore<V>: Send + Sync {
    /// Load previously persisted entries.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::Cache`] if the store cannot be read.
    fn load(&self) -> Result<Vec<CacheEntry<V>>, KnowledgeError>;

    /// Replace the persisted snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::Cache`] if the store cannot be written.
    fn persist(&self, entries: &[CacheEntry<V>]) -> Result<(), KnowledgeError>;
}

/// [`CacheStore`] writing a JSON array to one file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store at `path`. The file is created on first persist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<V: Serialize + DeserializeOwned> CacheStore<V> for JsonFileStore {
    fn load(&self) -> Result<Vec<CacheEntry<V>>, KnowledgeError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let bytes = fs::read(&self.path)
            .map_err(|e| KnowledgeError::Cache(format!("read {}: {e}", self.path.display())))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| KnowledgeError::Cache(format!("decode {}: {e}", self.path.display())))
    }

    fn persist(&self, entries: &[CacheEntry<V>]) -> Result<(), KnowledgeError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                KnowledgeError::Cache(format!("create {}: {e}", parent.display()))
            })?;
        }
        let json = serde_json::to_vec(entries)
            .map_err(|e| KnowledgeError::Cache(format!("encode cache snapshot: {e}")))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)
            .map_err(|e| KnowledgeError::Cache(format!("write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| KnowledgeError::Cache(format!("rename to {}: {e}", self.path.display())))
    }
}

/// One pre-population job for [`TtlCache::warm_up`].
pub struct WarmUpEntry<V> {
    /// Key to fill.
    pub key: String,
    /// Produces the value.
    pub compute: BoxFuture<'static, Result<V, KnowledgeError>>,
    /// TTL and tags; `force_refresh` is always set.
    pub options: CacheOptions,
}

impl<V> WarmUpEntry<V> {
    /// Job for `key` computed by `compute`.
    pub fn new<F>(key: impl Into<String>, compute: F) -> Self
    where
        F: Future<Output = Result<V, KnowledgeError>> + Send + 'static,
    {
        Self {
            key: key.into(),
            compute: Box::pin(compute),
            options: CacheOptions::default(),
        }
    }

    /// Set TTL and tags.
    pub fn with_options(mut self, options: CacheOptions) -> Self {
        self.options = options;
        self
    }
}

struct Slot<V> {
    entry: CacheEntry<V>,
    expires_at: Instant,
    seq: u64,
    size: usize,
}

impl<V> Slot<V> {
    fn is_valid(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

struct Inner<V> {
    slots: HashMap<String, Slot<V>>,
    /// Insertion sequence → key; the first entry is the oldest.
    order: BTreeMap<u64, String>,
    next_seq: u64,
}

impl<V> Inner<V> {
    fn remove(&mut self, key: &str) -> Option<Slot<V>> {
        let slot = self.slots.remove(key)?;
        self.order.remove(&slot.seq);
        Some(slot)
    }

    fn evict_oldest(&mut self) -> Option<String> {
        let (_, key) = self.order.pop_first()?;
        self.slots.remove(&key);
        Some(key)
    }
}

/// Generic TTL cache with tags, capacity eviction and hit statistics.
pub struct TtlCache<V> {
    inner: Mutex<Inner<V>>,
    capacity: usize,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    store: Option<Arc<dyn CacheStore<V>>>,
}

impl<V> Default for TtlCache<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl<V> TtlCache<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Create an empty cache. A `capacity` of zero is treated as one.
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                slots: HashMap::new(),
                order: BTreeMap::new(),
                next_seq: 0,
            }),
            capacity: capacity.max(1),
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            store: None,
        }
    }

    /// Attach a persistent store and restore its unexpired entries.
    /// A failed load is logged and the cache starts empty.
    pub fn with_store(mut self, store: Arc<dyn CacheStore<V>>) -> Self {
        match store.load() {
            Ok(entries) => {
                let restored = self.restore(entries);
                tracing::debug!(restored, "cache restored from store");
            }
            Err(err) => tracing::warn!(error = %err, "cache load failed, starting empty"),
        }
        self.store = Some(store);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn restore(&self, entries: Vec<CacheEntry<V>>) -> usize {
        let now = Utc::now();
        let mut restored = 0;
        for entry in entries {
            let age = (now - entry.timestamp).to_std().unwrap_or(Duration::ZERO);
            let Some(remaining) = entry.ttl.checked_sub(age).filter(|r| !r.is_zero()) else {
                continue;
            };
            self.insert(entry, remaining);
            restored += 1;
        }
        restored
    }

    /// Return the cached value for `key`, computing and storing it on a miss.
    ///
    /// With `force_refresh` the compute always runs and overwrites any
    /// entry. Compute errors are returned unchanged and nothing is stored.
    ///
    /// # Errors
    ///
    /// Propagates the error of `compute`.
    pub async fn get<F, Fut, E>(&self, key: &str, compute: F, options: CacheOptions) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if !options.force_refresh {
            if let Some(value) = self.peek(key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(value);
            }
            self.misses.fetch_add(1, Ordering::Relaxed);
        }

        let value = compute().await?;
        self.set(key, value.clone(), options.ttl, options.tags);
        Ok(value)
    }

    /// Look up a live value without touching the hit counters.
    pub fn peek(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut inner = self.lock();
        let slot = inner.slots.get(key)?;
        if slot.is_valid(now) {
            return Some(slot.entry.data.clone());
        }
        inner.remove(key);
        None
    }

    /// Store `value` under `key`, replacing any existing entry.
    pub fn set(&self, key: &str, value: V, ttl: Option<Duration>, tags: Vec<String>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let entry = CacheEntry {
            key: key.to_owned(),
            data: value,
            timestamp: Utc::now(),
            ttl,
            tags,
        };
        self.insert(entry, ttl);
    }

    fn insert(&self, entry: CacheEntry<V>, lifetime: Duration) {
        let size = serde_json::to_vec(&entry.data).map_or(0, |bytes| bytes.len());
        let expires_at = Instant::now() + lifetime;
        let key = entry.key.clone();

        let mut inner = self.lock();
        if inner.remove(&key).is_none() && inner.slots.len() >= self.capacity {
            if let Some(evicted) = inner.evict_oldest() {
                tracing::debug!(key = %evicted, "cache full, evicted oldest entry");
            }
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.order.insert(seq, key.clone());
        inner.slots.insert(
            key,
            Slot {
                entry,
                expires_at,
                seq,
                size,
            },
        );
    }

    /// Remove one entry. Returns whether it existed.
    pub fn invalidate(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Remove every entry sharing at least one tag with `tags`.
    /// Returns the number removed.
    pub fn invalidate_by_tags<S: AsRef<str>>(&self, tags: &[S]) -> usize {
        let mut inner = self.lock();
        let doomed = inner
            .slots
            .iter()
            .filter(|(_, slot)| {
                slot.entry
                    .tags
                    .iter()
                    .any(|t| tags.iter().any(|wanted| wanted.as_ref() == t))
            })
            .map(|(key, _)| key.clone())
            .collect::<Vec<_>>();
        for key in &doomed {
            inner.remove(key);
        }
        doomed.len()
    }

    /// Remove everything. Counters are kept.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.slots.clear();
        inner.order.clear();
    }

    /// Drop expired entries. Returns the number removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.lock();
        let expired = inner
            .slots
            .iter()
            .filter(|(_, slot)| !slot.is_valid(now))
            .map(|(key, _)| key.clone())
            .collect::<Vec<_>>();
        for key in &expired {
            inner.remove(key);
        }
        expired.len()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock().slots.values().filter(|s| s.is_valid(now)).count()
    }

    /// Whether there are no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        let now = Instant::now();
        let inner = self.lock();
        let live = inner.slots.values().filter(|s| s.is_valid(now));
        let (total_entries, total_size) = live.fold((0, 0), |(n, bytes), s| (n + 1, bytes + s.size));
        CacheStats {
            hits,
            misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
            total_entries,
            total_size,
            stored_entries: inner.slots.len(),
        }
    }

    /// Run every job with `force_refresh`, concurrently. Failures are logged
    /// and skipped. Returns the number of entries filled.
    pub async fn warm_up(&self, entries: Vec<WarmUpEntry<V>>) -> usize {
        let jobs = entries.into_iter().map(|job| async move {
            let key = job.key;
            let compute = job.compute;
            let outcome = self
                .get(&key, move || compute, job.options.refresh())
                .await;
            if let Err(err) = &outcome {
                tracing::warn!(key = %key, error = %err, "cache warm-up entry failed");
            }
            outcome.is_ok()
        });
        let filled = join_all(jobs).await.into_iter().filter(|ok| *ok).count();
        tracing::debug!(filled, "cache warm-up finished");
        filled
    }

    /// Snapshot of live entries, oldest first.
    pub fn entries(&self) -> Vec<CacheEntry<V>> {
        let now = Instant::now();
        let inner = self.lock();
        inner
            .order
            .values()
            .filter_map(|key| inner.slots.get(key))
            .filter(|slot| slot.is_valid(now))
            .map(|slot| slot.entry.clone())
            .collect()
    }

    /// Write live entries to the attached store, if any. Failures are
    /// logged.
    pub fn flush(&self) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(err) = store.persist(&self.entries()) {
            tracing::warn!(error = %err, "cache persist failed");
        }
    }

    /// Sweep expired entries every `interval` and flush to the store.
    ///
    /// The task holds only a weak reference and exits once the cache is
    /// dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = weak.upgrade() else {
                    break;
                };
                let removed = cache.sweep_expired();
                if removed > 0 {
                    tracing::debug!(removed, "cache sweep removed expired entries");
                }
                cache.flush();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn cache(capacity: usize) -> TtlCache<String> {
        TtlCache::new(capacity, Duration::from_secs(60))
    }

    async fn ok(value: &str) -> Result<String, KnowledgeError> {
        Ok(value.to_owned())
    }

    #[tokio::test(start_paused = true)]
    async fn hit_after_miss() {
        let cache = cache(10);
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            let value = cache
                .get(
                    "k",
                    || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        ok("v")
                    },
                    CacheOptions::default(),
                )
                .await
                .expect("compute");
            assert_eq!(value, "v");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.total_size, 3); // "v" as JSON
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_is_strict() {
        let cache = cache(10);
        cache.set("k", "v".into(), Some(Duration::from_secs(5)), vec![]);
        tokio::time::advance(Duration::from_millis(4_999)).await;
        assert_eq!(cache.peek("k").as_deref(), Some("v"));
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(cache.peek("k").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_is_recomputed() {
        let cache = cache(10);
        cache
            .get("k", || ok("old"), CacheOptions::with_ttl(Duration::from_secs(1)))
            .await
            .expect("first");
        tokio::time::advance(Duration::from_secs(2)).await;
        let value = cache
            .get("k", || ok("new"), CacheOptions::default())
            .await
            .expect("second");
        assert_eq!(value, "new");
        assert_eq!(cache.stats().misses, 2);
    }

    #[tokio::test]
    async fn compute_errors_are_not_cached() {
        let cache = cache(10);
        let err = cache
            .get(
                "k",
                || async { Err::<String, _>(KnowledgeError::Http("down".into())) },
                CacheOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, KnowledgeError::Http(_)));
        assert!(cache.peek("k").is_none());

        let value = cache.get("k", || ok("up"), CacheOptions::default()).await.expect("retry");
        assert_eq!(value, "up");
    }

    #[tokio::test]
    async fn force_refresh_overwrites() {
        let cache = cache(10);
        cache.set("k", "stale".into(), None, vec![]);
        let value = cache
            .get("k", || ok("fresh"), CacheOptions::default().refresh())
            .await
            .expect("refresh");
        assert_eq!(value, "fresh");
        assert_eq!(cache.peek("k").as_deref(), Some("fresh"));
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn tags_invalidate_intersecting_entries() {
        let cache = cache(10);
        cache.set("a", "1".into(), None, vec!["search".into(), "wiki".into()]);
        cache.set("b", "2".into(), None, vec!["search".into()]);
        cache.set("c", "3".into(), None, vec!["document".into()]);
        cache.set("d", "4".into(), None, vec![]);

        assert_eq!(cache.invalidate_by_tags(&["wiki", "document"]), 2);
        assert!(cache.peek("a").is_none());
        assert!(cache.peek("c").is_none());
        assert!(cache.peek("b").is_some());
        assert!(cache.peek("d").is_some());
        assert_eq!(cache.invalidate_by_tags::<&str>(&[]), 0);
    }

    #[test]
    fn capacity_evicts_oldest_insertion() {
        let cache = cache(2);
        cache.set("first", "1".into(), None, vec![]);
        cache.set("second", "2".into(), None, vec![]);
        // Overwriting does not evict.
        cache.set("first", "1b".into(), None, vec![]);
        assert_eq!(cache.len(), 2);
        // "second" is now the oldest insertion.
        cache.set("third", "3".into(), None, vec![]);
        assert_eq!(cache.len(), 2);
        assert!(cache.peek("second").is_none());
        assert_eq!(cache.peek("first").as_deref(), Some("1b"));
        assert_eq!(cache.peek("third").as_deref(), Some("3"));
    }

    #[test]
    fn invalidate_and_clear() {
        let cache = cache(10);
        cache.set("a", "1".into(), None, vec![]);
        cache.set("b", "2".into(), None, vec![]);
        assert!(cache.invalidate("a"));
        assert!(!cache.invalidate("a"));
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.entries().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_only_expired() {
        let cache = cache(10);
        cache.set("short", "s".into(), Some(Duration::from_secs(1)), vec![]);
        cache.set("long", "l".into(), Some(Duration::from_secs(100)), vec![]);
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.sweep_expired(), 1);
        assert_eq!(cache.entries().len(), 1);
        assert_eq!(cache.entries()[0].key, "long");
    }

    #[tokio::test(start_paused = true)]
    async fn background_sweeper_runs() {
        let cache = Arc::new(cache(10));
        cache.set("short", "s".into(), Some(Duration::from_secs(1)), vec![]);
        let handle = cache.spawn_sweeper(Duration::from_secs(5));
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(cache.lock().slots.is_empty());
        drop(cache);
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(handle.is_finished());
    }

    #[tokio::test]
    async fn warm_up_tolerates_failures() {
        let cache = cache(10);
        cache.set("a", "stale".into(), None, vec![]);
        let filled = cache
            .warm_up(vec![
                WarmUpEntry::new("a", ok("fresh")),
                WarmUpEntry::new("b", async { Err(KnowledgeError::Http("boom".into())) }),
                WarmUpEntry::new("c", ok("c")).with_options(CacheOptions::default().tagged(["t"])),
            ])
            .await;
        assert_eq!(filled, 2);
        assert_eq!(cache.peek("a").as_deref(), Some("fresh"));
        assert!(cache.peek("b").is_none());
        assert_eq!(cache.invalidate_by_tags(&["t"]), 1);
    }

    #[test]
    fn json_store_round_trips_live_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("cache.json");
        let store: Arc<dyn CacheStore<String>> = Arc::new(JsonFileStore::new(&path));

        let cache = cache(10).with_store(Arc::clone(&store));
        cache.set("k", "v".into(), Some(Duration::from_secs(600)), vec!["t".into()]);
        cache.flush();
        assert!(path.exists());

        let restored = TtlCache::<String>::new(10, Duration::from_secs(60)).with_store(store);
        assert_eq!(restored.peek("k").as_deref(), Some("v"));
        assert_eq!(restored.invalidate_by_tags(&["t"]), 1);
    }

    #[test]
    fn restore_skips_expired_entries() {
        let cache = cache(10);
        let old = CacheEntry {
            key: "old".to_owned(),
            data: "x".to_owned(),
            timestamp: Utc::now() - chrono::Duration::seconds(120),
            ttl: Duration::from_secs(60),
            tags: vec![],
        };
        let fresh = CacheEntry {
            key: "fresh".to_owned(),
            timestamp: Utc::now(),
            ..old.clone()
        };
        assert_eq!(cache.restore(vec![old, fresh]), 1);
        assert!(cache.peek("old").is_none());
        assert!(cache.peek("fresh").is_some());
    }

    #[test]
    fn corrupt_store_starts_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cache.json");
        fs::write(&path, b"not json").expect("write");
        let cache = cache(10).with_store(Arc::new(JsonFileStore::new(&path)));
        assert!(cache.is_empty());
    }
}
