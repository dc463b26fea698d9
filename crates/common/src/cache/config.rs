//! Cache configuration types and builder patterns
//!
//! TTLs are resolved per label (operation name): an explicit override wins,
//! then the no-expiry list, then the default. A zero TTL turns caching off
//! for that label.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::utils::serde::{duration_secs, duration_secs_map};

/// Effective caching rule for a label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTtl {
    /// Never store; always call the loader
    Disabled,
    /// Store until `now + ttl`
    Expires(Duration),
    /// Store until explicitly invalidated
    NoExpiry,
}

/// Configuration for cache behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL for labels without an override
    #[serde(with = "duration_secs")]
    pub default_ttl: Duration,

    /// Per-label TTLs in seconds (`0` disables caching for the label)
    #[serde(with = "duration_secs_map")]
    pub ttl_overrides: HashMap<String, Duration>,

    /// Labels whose entries never expire
    pub no_expiry_labels: BTreeSet<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(15 * 60),
            ttl_overrides: HashMap::new(),
            no_expiry_labels: BTreeSet::new(),
        }
    }
}

impl CacheConfig {
    /// Create a new configuration builder
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Resolve the caching rule for `label`
    pub fn ttl_for(&self, label: &str) -> CacheTtl {
        let ttl = match self.ttl_overrides.get(label) {
            Some(ttl) => *ttl,
            None if self.no_expiry_labels.contains(label) => return CacheTtl::NoExpiry,
            None => self.default_ttl,
        };

        if ttl.is_zero() {
            CacheTtl::Disabled
        } else {
            CacheTtl::Expires(ttl)
        }
    }
}

/// Builder for CacheConfig
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    /// TTL for labels without an override
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.config.default_ttl = ttl;
        self
    }

    /// Override the TTL of one label
    pub fn ttl(mut self, label: impl Into<String>, ttl: Duration) -> Self {
        self.config.ttl_overrides.insert(label.into(), ttl);
        self
    }

    /// Never cache `label`
    pub fn disable(self, label: impl Into<String>) -> Self {
        self.ttl(label, Duration::ZERO)
    }

    /// Keep `label` entries until invalidated
    pub fn no_expiry(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        self.config.ttl_overrides.remove(&label);
        self.config.no_expiry_labels.insert(label);
        self
    }

    pub fn build(self) -> CacheConfig {
        self.config
    }
}
