//! Per-server model list cache with stale-on-error fallback.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::telemetry;
use crate::types::duration_ms;
use crate::{HuginnError, Result};

/// Configuration for the model status cache.
///
/// ```rust
/// # use huginn::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .ttl(Duration::from_secs(30))
///     .max_entries(10);
/// assert_eq!(config.stale_limit(config.ttl), Duration::from_secs(150));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Time-to-live given to freshly fetched entries. Default: 15s.
    #[serde(rename = "ttl_secs", with = "duration_secs")]
    pub ttl: Duration,
    /// Maximum number of servers tracked. Default: 50.
    pub max_entries: usize,
    /// Multiple of an entry's ttl after which it is too old to serve even
    /// as a fallback. Default: 5.
    pub stale_factor: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(15),
            max_entries: 50,
            stale_factor: 5,
        }
    }
}

impl CacheConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default time-to-live for new entries.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the maximum number of cached servers.
    pub fn max_entries(mut self, n: usize) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the stale-fallback multiple.
    pub fn stale_factor(mut self, factor: u32) -> Self {
        self.stale_factor = factor;
        self
    }

    /// Age beyond which an entry with the given ttl is evicted outright.
    pub fn stale_limit(&self, ttl: Duration) -> Duration {
        ttl.saturating_mul(self.stale_factor)
    }

    /// Reject values that would make the cache unusable.
    pub fn validate(&self) -> Result<()> {
        if self.ttl.is_zero() {
            return Err(HuginnError::Configuration("cache ttl must be non-zero".into()));
        }
        if self.max_entries == 0 {
            return Err(HuginnError::Configuration(
                "cache max_entries must be at least 1".into(),
            ));
        }
        if self.stale_factor == 0 {
            return Err(HuginnError::Configuration(
                "cache stale_factor must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// One server's cached model list.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    key: String,
    models: Vec<String>,
    fetched_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    /// The normalized base URL this entry belongs to.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Borrow the cached model identifiers.
    pub fn models(&self) -> &[String] {
        &self.models
    }

    /// When the list was fetched.
    pub fn fetched_at(&self) -> Instant {
        self.fetched_at
    }

    /// Current time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Time since the list was fetched.
    pub fn age(&self) -> Duration {
        self.age_at(Instant::now())
    }

    /// Whether the entry is still within its ttl.
    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Instant::now())
    }

    fn age_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.fetched_at)
    }

    fn is_fresh_at(&self, now: Instant) -> bool {
        self.age_at(now) < self.ttl
    }
}

/// Diagnostic snapshot of the cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of entries held.
    pub size: usize,
    /// Configured capacity.
    pub max_entries: usize,
    /// Per-entry details, ordered by key.
    pub entries: Vec<EntryStats>,
}

impl CacheStats {
    /// Stats for a single key, if present.
    pub fn entry(&self, key: &str) -> Option<&EntryStats> {
        self.entries.iter().find(|e| e.key == key)
    }
}

/// Diagnostic details of a single cache entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryStats {
    pub key: String,
    #[serde(rename = "age_ms", serialize_with = "duration_ms::serialize")]
    pub age: Duration,
    pub model_count: usize,
    #[serde(rename = "ttl_ms", serialize_with = "duration_ms::serialize")]
    pub ttl: Duration,
    pub valid: bool,
}

/// Time-bounded cache of model identifier lists, keyed on base URL.
///
/// Thread-safe. The entry map sits behind an `RwLock` that is never held
/// across an await point. Refreshes are single-flight per key: concurrent
/// callers that find the same entry expired queue on a per-key gate and
/// re-check freshness once they hold it, so only the first one fetches.
///
/// Share one instance per process by wrapping it in an `Arc`.
pub struct ModelStatusCache {
    config: CacheConfig,
    entries: RwLock<HashMap<String, CacheEntry>>,
    refresh_gates: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ModelStatusCache {
    /// Create an empty cache with default configuration.
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Create an empty cache with the given configuration.
    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            refresh_gates: Mutex::new(HashMap::new()),
        }
    }

    /// The configuration this cache was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Return the models for `base_url`, fetching through `fetch` when the
    /// cached list is missing or expired.
    ///
    /// On fetch failure an expired list no older than the stale limit is
    /// returned instead; otherwise the error propagates.
    pub async fn get_models<F, Fut>(&self, base_url: &str, fetch: F) -> Result<Vec<String>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<String>>>,
    {
        if let Some(models) = self.fresh(base_url) {
            metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
            return Ok(models);
        }

        let gate = RefreshGate::new(self, base_url);
        let _held = gate.lock().await;
        match self.fresh(base_url) {
            // refreshed by a concurrent caller while we waited
            Some(models) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
                Ok(models)
            }
            None => self.refresh(base_url, fetch).await,
        }
    }

    /// Fetch `base_url` again even when the cached list is still fresh.
    ///
    /// The current entry stays in place until the fetch succeeds. A failed
    /// fetch falls back to it under the same rules as [`get_models()`], so a
    /// briefly unreachable server does not cost the cached list.
    ///
    /// [`get_models()`]: Self::get_models
    pub async fn revalidate<F, Fut>(&self, base_url: &str, fetch: F) -> Result<Vec<String>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<String>>>,
    {
        let seen = self.read().get(base_url).map(|entry| entry.fetched_at);
        let gate = RefreshGate::new(self, base_url);
        let _held = gate.lock().await;
        if let Some(models) = self.fresh_since(base_url, seen) {
            // a concurrent caller fetched while we waited
            metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
            return Ok(models);
        }
        self.refresh(base_url, fetch).await
    }

    /// Drop the entry for `base_url` and fetch it again.
    pub async fn force_refresh<F, Fut>(&self, base_url: &str, fetch: F) -> Result<Vec<String>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<String>>>,
    {
        self.invalidate(base_url);
        self.get_models(base_url, fetch).await
    }

    /// Evict a single entry. Returns whether an entry was present.
    pub fn invalidate(&self, base_url: &str) -> bool {
        let removed = self.write().remove(base_url).is_some();
        if removed {
            debug!(base_url, "invalidated cache entry");
        }
        removed
    }

    /// Evict every entry.
    pub fn invalidate_all(&self) {
        let mut entries = self.write();
        let count = entries.len();
        entries.clear();
        debug!(count, "invalidated all cache entries");
    }

    /// Override the ttl of an existing entry. No-op (returns `false`) if the
    /// key is absent.
    pub fn set_ttl(&self, base_url: &str, ttl: Duration) -> bool {
        match self.write().get_mut(base_url) {
            Some(entry) => {
                entry.ttl = ttl;
                true
            }
            None => false,
        }
    }

    /// Whether a fresh entry exists for `base_url`. Performs no I/O.
    pub fn is_valid(&self, base_url: &str) -> bool {
        self.read()
            .get(base_url)
            .is_some_and(|entry| entry.is_fresh_at(Instant::now()))
    }

    /// Copy of the retained list for `base_url`, fresh or not. Performs no I/O.
    pub fn peek(&self, base_url: &str) -> Option<Vec<String>> {
        self.read().get(base_url).map(|entry| entry.models.clone())
    }

    /// Copy of the retained entry for `base_url`.
    pub fn entry(&self, base_url: &str) -> Option<CacheEntry> {
        self.read().get(base_url).cloned()
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Diagnostic snapshot: size plus key, age, model count and ttl of each entry.
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let entries = self.read();
        let mut details: Vec<EntryStats> = entries
            .values()
            .map(|entry| EntryStats {
                key: entry.key.clone(),
                age: entry.age_at(now),
                model_count: entry.models.len(),
                ttl: entry.ttl,
                valid: entry.is_fresh_at(now),
            })
            .collect();
        details.sort_by(|a, b| a.key.cmp(&b.key));
        CacheStats {
            size: entries.len(),
            max_entries: self.config.max_entries,
            entries: details,
        }
    }

    fn fresh(&self, base_url: &str) -> Option<Vec<String>> {
        let now = Instant::now();
        self.read()
            .get(base_url)
            .filter(|entry| entry.is_fresh_at(now))
            .map(|entry| entry.models.clone())
    }

    /// Fresh list for `base_url` fetched after `seen`.
    fn fresh_since(&self, base_url: &str, seen: Option<Instant>) -> Option<Vec<String>> {
        let now = Instant::now();
        self.read()
            .get(base_url)
            .filter(|entry| entry.is_fresh_at(now))
            .filter(|entry| seen.is_none_or(|seen| entry.fetched_at > seen))
            .map(|entry| entry.models.clone())
    }

    async fn refresh<F, Fut>(&self, base_url: &str, fetch: F) -> Result<Vec<String>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<String>>>,
    {
        metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
        match fetch().await {
            Ok(models) => {
                self.insert(base_url, models.clone());
                Ok(models)
            }
            Err(e) => self.stale_fallback(base_url, e),
        }
    }

    fn insert(&self, base_url: &str, models: Vec<String>) {
        let mut entries = self.write();
        debug!(base_url, count = models.len(), "caching model list");
        entries.insert(
            base_url.to_string(),
            CacheEntry {
                key: base_url.to_string(),
                models,
                fetched_at: Instant::now(),
                ttl: self.config.ttl,
            },
        );
        if entries.len() > self.config.max_entries {
            self.cleanup(&mut entries);
        }
    }

    /// Serve an expired entry after a failed refresh, or evict it if it is
    /// past the stale limit.
    fn stale_fallback(&self, base_url: &str, err: HuginnError) -> Result<Vec<String>> {
        let now = Instant::now();
        let mut entries = self.write();
        let Some(entry) = entries.get(base_url) else {
            return Err(err);
        };

        let age = entry.age_at(now);
        if entry.is_fresh_at(now) {
            warn!(
                base_url,
                age_ms = age.as_millis() as u64,
                error = %err,
                "refresh failed; keeping current model list"
            );
            return Ok(entry.models.clone());
        }
        if age > self.config.stale_limit(entry.ttl) {
            warn!(
                base_url,
                age_ms = age.as_millis() as u64,
                error = %err,
                "refresh failed and cached model list is too old to serve; evicting"
            );
            entries.remove(base_url);
            metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL, "reason" => "expired_fallback")
                .increment(1);
            return Err(err);
        }

        warn!(
            base_url,
            age_ms = age.as_millis() as u64,
            error = %err,
            "refresh failed; serving stale model list"
        );
        metrics::counter!(telemetry::CACHE_STALE_SERVED_TOTAL).increment(1);
        Ok(entry.models.clone())
    }

    /// Bring the map back within capacity: drop entries past their stale
    /// limit, then the oldest remaining ones.
    fn cleanup(&self, entries: &mut HashMap<String, CacheEntry>) {
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| entry.age_at(now) <= self.config.stale_limit(entry.ttl));
        let stale = before - entries.len();
        if stale > 0 {
            metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL, "reason" => "stale")
                .increment(stale as u64);
        }

        let overflow = entries.len().saturating_sub(self.config.max_entries);
        if overflow > 0 {
            let mut by_age: Vec<(Instant, String)> = entries
                .values()
                .map(|entry| (entry.fetched_at, entry.key.clone()))
                .collect();
            by_age.sort();
            for (_, key) in by_age.into_iter().take(overflow) {
                entries.remove(&key);
            }
            metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL, "reason" => "capacity")
                .increment(overflow as u64);
        }

        info!(
            stale,
            capacity = overflow,
            remaining = entries.len(),
            "cache cleanup evicted entries"
        );
    }

    fn gates(&self) -> MutexGuard<'_, HashMap<String, Arc<tokio::sync::Mutex<()>>>> {
        self.refresh_gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A key's refresh gate, forgotten on drop once no other caller is queued
/// on it. Dropping a pending refresh future releases it too.
struct RefreshGate<'a> {
    cache: &'a ModelStatusCache,
    key: &'a str,
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl<'a> RefreshGate<'a> {
    fn new(cache: &'a ModelStatusCache, key: &'a str) -> Self {
        let gate = Arc::clone(cache.gates().entry(key.to_string()).or_default());
        Self { cache, key, gate }
    }

    async fn lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.gate.lock().await
    }
}

impl Drop for RefreshGate<'_> {
    fn drop(&mut self) {
        let mut gates = self.cache.gates();
        // one reference held by the map, one by us
        let ours = gates
            .get(self.key)
            .is_some_and(|gate| Arc::ptr_eq(gate, &self.gate));
        if ours && Arc::strong_count(&self.gate) <= 2 {
            gates.remove(self.key);
        }
    }
}

impl Default for ModelStatusCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Serde adapter for durations written as whole seconds.
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}
