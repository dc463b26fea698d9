//! Response cache with per-label expiry
//!
//! Values are cached under a [`CacheKey`] built from a label (the operation
//! name) and the request parameters. Each label resolves to its own TTL via
//! [`CacheConfig::ttl_for`]; a zero TTL disables caching for that label.
//!
//! # Features
//!
//! - **Concurrent**: sharded map, no cross-key locking
//! - **Lazy expiry**: an entry is served only while `now < expires_at`
//! - **Deterministic keys**: parameter order never changes the key
//! - **Metrics**: hit/miss/insert/expiration/invalidation counters
//! - **Testable**: clock abstraction for deterministic time-based testing
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use statline_common::cache::{CacheConfig, CacheKeyError, TtlCache};
//!
//! let config = CacheConfig::builder().ttl("lines", Duration::from_secs(120)).build();
//! let cache: TtlCache<Vec<u32>> = TtlCache::new(config);
//!
//! let lines: Result<_, CacheKeyError> =
//!     cache.get_or_fetch("lines", &[("year", 2025), ("week", 3)], || Ok(vec![1, 2, 3]));
//! assert_eq!(lines.unwrap().len(), 3);
//!
//! let stats = cache.stats();
//! assert_eq!(stats.misses, 1);
//! assert_eq!(stats.size, 1);
//! ```

pub mod config;
pub mod core;
pub mod key;
pub mod stats;

pub use self::config::{CacheConfig, CacheConfigBuilder, CacheTtl};
pub use self::core::TtlCache;
pub use self::key::{CacheKey, CacheKeyError};
pub use self::stats::CacheStats;
