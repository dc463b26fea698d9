//! TTL response cache
//!
//! Entries live in a sharded [`DashMap`], so reads and writes of unrelated
//! keys never wait on each other. Expiry is checked lazily when an entry is
//! read; there is no background sweeper. The loader passed to
//! [`TtlCache::get_or_fetch`] runs with no lock held, and its errors are
//! never stored.
//!
//! Two callers missing on the same key at the same time may both invoke
//! the loader; the later store wins.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use serde::Serialize;
use tracing::trace;

use super::config::{CacheConfig, CacheTtl};
use super::key::{CacheKey, CacheKeyError};
use super::stats::{CacheStats, MetricsCollector};
use crate::resilience::{Clock, SystemClock};

/// Entry stored in the cache
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(expires_at) => now < expires_at,
            None => true,
        }
    }
}

/// Thread-safe cache with per-label expiry
///
/// # Type Parameters
/// - `V`: Value type; callers receive clones, the cache keeps its own copy
/// - `C`: Clock type for time-based operations (defaults to `SystemClock`)
///
/// # Example
/// ```
/// use statline_common::cache::{CacheConfig, TtlCache};
///
/// let cache: TtlCache<String> = TtlCache::new(CacheConfig::default());
/// let params = serde_json::json!({"year": 2025});
///
/// let first: Result<String, statline_common::cache::CacheKeyError> =
///     cache.get_or_fetch("games", &params, || Ok("fresh".to_string()));
/// let second: Result<String, statline_common::cache::CacheKeyError> =
///     cache.get_or_fetch("games", &params, || Ok("never called".to_string()));
///
/// assert_eq!(first.unwrap(), "fresh");
/// assert_eq!(second.unwrap(), "fresh");
/// ```
pub struct TtlCache<V, C: Clock = SystemClock> {
    entries: DashMap<CacheKey, CacheEntry<V>>,
    config: CacheConfig,
    metrics: MetricsCollector,
    clock: Arc<C>,
}

impl<V: Clone> TtlCache<V, SystemClock> {
    /// Create a new cache with the given configuration using system clock
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<V: Clone, C: Clock> TtlCache<V, C> {
    /// Create a new cache with a custom clock (useful for testing)
    pub fn with_clock(config: CacheConfig, clock: C) -> Self {
        Self::with_shared_clock(config, Arc::new(clock))
    }

    /// Create a new cache sharing an existing clock handle
    pub fn with_shared_clock(config: CacheConfig, clock: Arc<C>) -> Self {
        Self { entries: DashMap::new(), config, metrics: MetricsCollector::new(), clock }
    }

    /// Active configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Return the cached value for `label`/`params`, or load and store it
    ///
    /// The loader is invoked only when no fresh entry exists. A failed load
    /// leaves the cache untouched. Labels whose TTL is zero bypass the
    /// cache entirely.
    pub fn get_or_fetch<P, F, E>(&self, label: &str, params: &P, loader: F) -> Result<V, E>
    where
        P: Serialize + ?Sized,
        F: FnOnce() -> Result<V, E>,
        E: From<CacheKeyError>,
    {
        let ttl = self.config.ttl_for(label);
        if ttl == CacheTtl::Disabled {
            self.metrics.record_miss();
            return loader();
        }

        let key = CacheKey::new(label, params)?;
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }

        let value = loader()?;
        self.store(key, value.clone(), ttl);
        Ok(value)
    }

    /// Fresh value for `key`, if any
    ///
    /// A stale entry is removed and counted as an expiration.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let now = self.clock.now();

        let stale = match self.entries.get(key) {
            Some(entry) if entry.is_fresh(now) => {
                self.metrics.record_hit();
                trace!(%key, "cache hit");
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        // The read guard is gone; re-check under the write guard so a value
        // stored in between is not thrown away.
        if stale && self.entries.remove_if(key, |_, entry| !entry.is_fresh(now)).is_some() {
            self.metrics.record_expiration();
        }
        self.metrics.record_miss();
        trace!(%key, stale, "cache miss");
        None
    }

    /// Store `value` under `key` using the key label's TTL
    ///
    /// Returns `false` when caching is disabled for the label.
    pub fn insert(&self, key: CacheKey, value: V) -> bool {
        let ttl = self.config.ttl_for(key.label());
        self.store(key, value, ttl)
    }

    fn store(&self, key: CacheKey, value: V, ttl: CacheTtl) -> bool {
        let expires_at = match ttl {
            CacheTtl::Disabled => return false,
            // A TTL past the end of `Instant` never expires.
            CacheTtl::Expires(ttl) => self.clock.now().checked_add(ttl),
            CacheTtl::NoExpiry => None,
        };

        self.entries.insert(key, CacheEntry { value, expires_at });
        self.metrics.record_insert();
        true
    }

    /// Remove entries for `label`, or every entry when `None`
    ///
    /// Returns the number of entries removed.
    pub fn invalidate(&self, label: Option<&str>) -> usize {
        let removed = match label {
            None => {
                let count = self.entries.len();
                self.entries.clear();
                count
            }
            Some(label) => {
                let mut count = 0;
                self.entries.retain(|key, _| {
                    let keep = key.label() != label;
                    if !keep {
                        count += 1;
                    }
                    keep
                });
                count
            }
        };

        self.metrics.record_invalidations(removed as u64);
        removed
    }

    /// Drop every expired entry now
    ///
    /// Optional housekeeping; reads already ignore stale entries.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut purged = 0;
        self.entries.retain(|_, entry| {
            let fresh = entry.is_fresh(now);
            if !fresh {
                purged += 1;
            }
            fresh
        });

        for _ in 0..purged {
            self.metrics.record_expiration();
        }
        purged
    }

    /// Number of stored entries, stale ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current statistics
    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot(self.entries.len())
    }

    /// Reset statistics counters without touching entries
    pub fn reset_stats(&self) {
        self.metrics.reset();
    }
}

impl<V, C: Clock> std::fmt::Debug for TtlCache<V, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("entries", &self.entries.len())
            .field("config", &self.config)
            .finish()
    }
}
