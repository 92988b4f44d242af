use keyward_core::telemetry::tracing;
use keyward_core::time::{Clock, SystemClock};
use keyward_crypto::jose::JWKSet;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
/// Configuration of a [`JwksCache`].
///
/// ```
/// use keyward_jwks::JwksCacheConfig;
///
/// let config: JwksCacheConfig = serde_json::from_str(r#"{"stale_timeout_seconds": 600}"#).unwrap();
/// assert_eq!(config.stale_timeout_seconds(), 600);
/// assert_eq!(config.failure_timeout_seconds(), 86_400);
/// assert_eq!(config.max_cache_bytes(), 20_000_000);
/// ```
pub struct JwksCacheConfig {
    stale_timeout_seconds: u64,
    failure_timeout_seconds: u64,
    max_cache_bytes: u64,
}

impl JwksCacheConfig {
    /// Default age (in seconds) after which a cached key set is refreshed before use.
    pub const DEFAULT_STALE_TIMEOUT_SECONDS: u64 = 60 * 60;
    /// Default age (in seconds) up to which a cached key set is used when refreshing it fails.
    pub const DEFAULT_FAILURE_TIMEOUT_SECONDS: u64 = 24 * 60 * 60;
    /// Default upper bound of the summed size of all cached key sets.
    pub const DEFAULT_MAX_CACHE_BYTES: u64 = 20_000_000;

    /// Create a [`JwksCacheConfig`] with the default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            stale_timeout_seconds: Self::DEFAULT_STALE_TIMEOUT_SECONDS,
            failure_timeout_seconds: Self::DEFAULT_FAILURE_TIMEOUT_SECONDS,
            max_cache_bytes: Self::DEFAULT_MAX_CACHE_BYTES,
        }
    }

    /// Age (in seconds) from which a cached key set is no longer fresh.
    #[must_use]
    pub const fn stale_timeout_seconds(&self) -> u64 {
        self.stale_timeout_seconds
    }

    /// Set the age (in seconds) from which a cached key set is no longer fresh.
    #[must_use]
    pub const fn with_stale_timeout_seconds(mut self, seconds: u64) -> Self {
        self.stale_timeout_seconds = seconds;
        self
    }

    /// Set the age (in seconds) from which a cached key set is no longer fresh.
    pub const fn set_stale_timeout_seconds(&mut self, seconds: u64) -> &mut Self {
        self.stale_timeout_seconds = seconds;
        self
    }

    /// Age (in seconds) from which a cached key set can no longer
    /// stand in for a key set that failed to be fetched.
    #[must_use]
    pub const fn failure_timeout_seconds(&self) -> u64 {
        self.failure_timeout_seconds
    }

    /// Set the age (in seconds) from which a cached key set can no longer
    /// stand in for a key set that failed to be fetched.
    #[must_use]
    pub const fn with_failure_timeout_seconds(mut self, seconds: u64) -> Self {
        self.failure_timeout_seconds = seconds;
        self
    }

    /// Set the age (in seconds) from which a cached key set can no longer
    /// stand in for a key set that failed to be fetched.
    pub const fn set_failure_timeout_seconds(&mut self, seconds: u64) -> &mut Self {
        self.failure_timeout_seconds = seconds;
        self
    }

    /// Upper bound of the summed size (in bytes) of all cached key sets.
    #[must_use]
    pub const fn max_cache_bytes(&self) -> u64 {
        self.max_cache_bytes
    }

    /// Set the upper bound of the summed size (in bytes) of all cached key sets.
    #[must_use]
    pub const fn with_max_cache_bytes(mut self, bytes: u64) -> Self {
        self.max_cache_bytes = bytes;
        self
    }

    /// Set the upper bound of the summed size (in bytes) of all cached key sets.
    pub const fn set_max_cache_bytes(&mut self, bytes: u64) -> &mut Self {
        self.max_cache_bytes = bytes;
        self
    }
}

impl Default for JwksCacheConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
/// A key set stored in the [`JwksCache`], as returned by
/// [`JwksCache::get`] and [`JwksCache::snapshot`].
///
/// Entries are copies: holding on to one does not keep it in the cache.
pub struct CacheEntry {
    uri: String,
    jwks: Arc<JWKSet>,
    inserted_at: u64,
    size_bytes: u64,
}

impl CacheEntry {
    /// The uri the key set was fetched from.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The cached key set.
    #[must_use]
    pub fn jwks(&self) -> &Arc<JWKSet> {
        &self.jwks
    }

    /// Unix timestamp (seconds) at which the entry was inserted.
    #[must_use]
    pub fn inserted_at(&self) -> u64 {
        self.inserted_at
    }

    /// Size of the key set, as accounted against [`JwksCacheConfig::max_cache_bytes`].
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.inserted_at)
    }
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    total_bytes: u64,
}

impl CacheState {
    fn remove(&mut self, uri: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(uri)?;
        self.total_bytes -= entry.size_bytes;
        Some(entry)
    }

    /// Evict the entry inserted first, ties are broken on the (lowest) uri.
    fn evict_oldest(&mut self) -> Option<CacheEntry> {
        let uri = self
            .entries
            .values()
            .min_by(|a, b| {
                a.inserted_at
                    .cmp(&b.inserted_at)
                    .then_with(|| a.uri.cmp(&b.uri))
            })?
            .uri
            .clone();
        self.remove(&uri)
    }
}

/// Size and time bounded store of [`JWKSet`]s, keyed by the uri they were fetched from.
///
/// The cache is meant to live as long as the process (or at least as long as
/// the resolver using it) and is shared by reference (e.g. in an [`Arc`]).
/// All operations are synchronous and atomic.
///
/// - An entry is *fresh* while its age is below the stale timeout;
///   fresh entries answer without waiting on the network.
/// - An entry is *usable on failure* while its age is below the failure timeout;
///   such entries answer when fetching a fresh copy failed.
/// - The summed size of all entries never exceeds the max cache bytes:
///   the oldest entries are evicted before an insertion that would exceed it.
pub struct JwksCache {
    config: JwksCacheConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<CacheState>,
}

impl JwksCache {
    /// Create a new empty [`JwksCache`] using the default [`JwksCacheConfig`].
    #[must_use]
    pub fn new() -> Self {
        Self::new_with_config(JwksCacheConfig::default())
    }

    /// Create a new empty [`JwksCache`] using the given [`JwksCacheConfig`].
    #[must_use]
    pub fn new_with_config(config: JwksCacheConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock::new()),
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Use the given [`Clock`] to timestamp and age entries.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// The [`JwksCacheConfig`] of this cache.
    #[must_use]
    pub fn config(&self) -> &JwksCacheConfig {
        &self.config
    }

    /// Get the entry for the given uri, fresh or not.
    #[must_use]
    pub fn get(&self, uri: &str) -> Option<CacheEntry> {
        self.state.lock().entries.get(uri).cloned()
    }

    /// Get the entry for the given uri, only if it is fresh.
    #[must_use]
    pub fn get_fresh(&self, uri: &str) -> Option<CacheEntry> {
        let now = self.clock.now_unix_secs();
        self.state
            .lock()
            .entries
            .get(uri)
            .filter(|entry| entry.age(now) < self.config.stale_timeout_seconds)
            .cloned()
    }

    /// Returns true if there is a fresh entry for the given uri.
    #[must_use]
    pub fn is_fresh(&self, uri: &str) -> bool {
        let now = self.clock.now_unix_secs();
        self.state
            .lock()
            .entries
            .get(uri)
            .is_some_and(|entry| entry.age(now) < self.config.stale_timeout_seconds)
    }

    /// Insert (or replace) the key set for the given uri.
    ///
    /// Returns false, leaving the cache untouched, if `size_bytes` alone
    /// exceeds [`JwksCacheConfig::max_cache_bytes`]. Otherwise the oldest entries
    /// are evicted until the new entry fits, and the entry is inserted
    /// with the current time as its timestamp.
    pub fn put(&self, uri: impl Into<String>, jwks: impl Into<Arc<JWKSet>>, size_bytes: u64) -> bool {
        let uri = uri.into();
        let max = self.config.max_cache_bytes;
        if size_bytes > max {
            tracing::warn!(
                %uri,
                size_bytes,
                max_cache_bytes = max,
                "JWK set exceeds the cache budget on its own: not caching it"
            );
            return false;
        }

        let inserted_at = self.clock.now_unix_secs();
        let mut state = self.state.lock();

        // the previous entry of this uri is replaced, release its bytes first
        state.remove(&uri);

        while state.total_bytes + size_bytes > max {
            let Some(evicted) = state.evict_oldest() else {
                break;
            };
            tracing::debug!(
                uri = %evicted.uri,
                size_bytes = evicted.size_bytes,
                "evicted oldest JWK set from cache to make room"
            );
        }

        state.total_bytes += size_bytes;
        state.entries.insert(
            uri.clone(),
            CacheEntry {
                uri,
                jwks: jwks.into(),
                inserted_at,
                size_bytes,
            },
        );
        true
    }

    /// Drop the entry for the given uri if it can no longer stand in
    /// for a failed fetch. Called when fetching that uri failed.
    ///
    /// Returns the entry which remains cached for that uri, if any:
    /// a (stale) key set which may still be used instead of the failed fetch.
    pub fn prune_on_failure(&self, uri: &str) -> Option<CacheEntry> {
        let now = self.clock.now_unix_secs();
        let mut state = self.state.lock();
        let entry = state.entries.get(uri)?;
        if entry.age(now) < self.config.failure_timeout_seconds {
            return Some(entry.clone());
        }
        let pruned = state.remove(uri)?;
        tracing::debug!(
            %uri,
            age = pruned.age(now),
            "pruned JWK set which is too old to be used after a failed fetch"
        );
        None
    }

    /// Evict the oldest entry, returning the uri it was cached for.
    pub fn evict_oldest(&self) -> Option<String> {
        self.state.lock().evict_oldest().map(|entry| entry.uri)
    }

    /// Remove all entries.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.total_bytes = 0;
    }

    /// A copy of all entries, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<CacheEntry> {
        let mut entries: Vec<_> = self.state.lock().entries.values().cloned().collect();
        entries.sort_by(|a, b| {
            a.inserted_at
                .cmp(&b.inserted_at)
                .then_with(|| a.uri.cmp(&b.uri))
        });
        entries
    }

    /// Number of cached key sets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Summed size of all cached key sets.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.state.lock().total_bytes
    }
}

impl Default for JwksCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for JwksCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("JwksCache")
            .field("config", &self.config)
            .field("entries", &state.entries.len())
            .field("total_bytes", &state.total_bytes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::jwks;
    use keyward_core::time::ManualClock;
    use std::time::Duration;

    const T0: u64 = 1_700_000_000;

    fn cache(config: JwksCacheConfig) -> (JwksCache, ManualClock) {
        let clock = ManualClock::new(T0);
        (
            JwksCache::new_with_config(config).with_clock(clock.clone()),
            clock,
        )
    }

    fn uris(cache: &JwksCache) -> Vec<String> {
        cache
            .snapshot()
            .into_iter()
            .map(|entry| entry.uri().to_owned())
            .collect()
    }

    #[test]
    fn put_and_get() {
        let (cache, _) = cache(JwksCacheConfig::default());
        assert!(cache.get("https://a").is_none());
        assert!(cache.put("https://a", jwks(&["k1"]), 100));

        let entry = cache.get("https://a").unwrap();
        assert_eq!(entry.uri(), "https://a");
        assert_eq!(entry.inserted_at(), T0);
        assert_eq!(entry.size_bytes(), 100);
        assert!(entry.jwks().find(Some("k1")).is_some());
        assert_eq!(cache.total_bytes(), 100);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn put_replaces_entry_of_same_uri() {
        let (cache, clock) = cache(JwksCacheConfig::default());
        assert!(cache.put("https://a", jwks(&["k1"]), 100));
        clock.advance(Duration::from_secs(10));
        assert!(cache.put("https://a", jwks(&["k2"]), 40));

        let entry = cache.get("https://a").unwrap();
        assert_eq!(entry.inserted_at(), T0 + 10);
        assert!(entry.jwks().find(Some("k1")).is_none());
        assert!(entry.jwks().find(Some("k2")).is_some());
        assert_eq!(cache.total_bytes(), 40);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn freshness_window() {
        let config = JwksCacheConfig::default().with_stale_timeout_seconds(3_600);
        let (cache, clock) = cache(config);
        assert!(!cache.is_fresh("https://a"));
        cache.put("https://a", jwks(&["k1"]), 1);

        assert!(cache.is_fresh("https://a"));
        clock.set(T0 + 3_599);
        assert!(cache.is_fresh("https://a"));
        assert!(cache.get_fresh("https://a").is_some());
        clock.set(T0 + 3_600);
        assert!(!cache.is_fresh("https://a"));
        assert!(cache.get_fresh("https://a").is_none());
        // stale entries are still cached
        assert!(cache.get("https://a").is_some());
    }

    #[test]
    fn failure_window() {
        let (cache, clock) = cache(JwksCacheConfig::default());
        cache.put("https://a", jwks(&["k1"]), 10);

        clock.set(T0 + 86_399);
        let entry = cache.prune_on_failure("https://a").unwrap();
        assert_eq!(entry.uri(), "https://a");
        assert_eq!(cache.len(), 1);

        clock.set(T0 + 86_400);
        assert!(cache.prune_on_failure("https://a").is_none());
        assert!(cache.get("https://a").is_none());
        assert_eq!(cache.total_bytes(), 0);

        assert!(cache.prune_on_failure("https://unknown").is_none());
    }

    #[test]
    fn oversized_entry_is_refused_without_eviction() {
        let (cache, _) = cache(JwksCacheConfig::default().with_max_cache_bytes(100));
        assert!(cache.put("https://a", jwks(&["k1"]), 60));
        assert!(!cache.put("https://b", jwks(&["k2"]), 101));
        assert_eq!(uris(&cache), ["https://a"]);
        assert_eq!(cache.total_bytes(), 60);

        // exactly the budget is fine
        assert!(cache.put("https://c", jwks(&["k3"]), 100));
        assert_eq!(uris(&cache), ["https://c"]);
    }

    #[test]
    fn evicts_oldest_first_until_it_fits() {
        let (cache, clock) = cache(JwksCacheConfig::default().with_max_cache_bytes(100));
        cache.put("https://a", jwks(&["k"]), 30);
        clock.advance(Duration::from_secs(1));
        cache.put("https://b", jwks(&["k"]), 30);
        clock.advance(Duration::from_secs(1));
        cache.put("https://c", jwks(&["k"]), 30);
        assert_eq!(cache.total_bytes(), 90);

        clock.advance(Duration::from_secs(1));
        assert!(cache.put("https://d", jwks(&["k"]), 45));
        assert_eq!(uris(&cache), ["https://c", "https://d"]);
        assert_eq!(cache.total_bytes(), 75);
        assert!(cache.total_bytes() <= cache.config().max_cache_bytes());
    }

    #[test]
    fn eviction_ties_are_broken_on_uri() {
        let (cache, _) = cache(JwksCacheConfig::default().with_max_cache_bytes(100));
        cache.put("https://b", jwks(&["k"]), 40);
        cache.put("https://a", jwks(&["k"]), 40);
        cache.put("https://c", jwks(&["k"]), 40);
        assert_eq!(uris(&cache), ["https://b", "https://c"]);

        assert_eq!(cache.evict_oldest().as_deref(), Some("https://b"));
        assert_eq!(cache.evict_oldest().as_deref(), Some("https://c"));
        assert_eq!(cache.evict_oldest(), None);
        assert_eq!(cache.total_bytes(), 0);
    }

    #[test]
    fn clear_and_snapshot() {
        let (cache, clock) = cache(JwksCacheConfig::default());
        cache.put("https://b", jwks(&["k"]), 1);
        clock.advance(Duration::from_secs(5));
        cache.put("https://a", jwks(&["k"]), 2);

        let snapshot = cache.snapshot();
        assert_eq!(uris(&cache), ["https://b", "https://a"]);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.total_bytes(), 0);
        // the snapshot is a copy
        assert_eq!(snapshot.len(), 2);
    }
}
