//! Deterministic cache keys
//!
//! A key is the label followed by the blake3 digest of the parameters'
//! canonical JSON form. Object keys are sorted recursively before hashing,
//! so the same parameters always produce the same key regardless of the
//! order they were inserted in.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Parameters could not be turned into a cache key
#[derive(Debug, Error)]
#[error("failed to serialize cache key parameters for '{label}': {source}")]
pub struct CacheKeyError {
    label: String,
    #[source]
    source: serde_json::Error,
}

/// Cache key scoped to a label
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    label: String,
    digest: String,
}

impl CacheKey {
    /// Build the key for `label` and `params`
    pub fn new<P>(label: &str, params: &P) -> Result<Self, CacheKeyError>
    where
        P: Serialize + ?Sized,
    {
        let value = serde_json::to_value(params)
            .map_err(|source| CacheKeyError { label: label.to_string(), source })?;
        let canonical = serde_json::to_vec(&canonicalize(value))
            .map_err(|source| CacheKeyError { label: label.to_string(), source })?;

        let digest = hex::encode(blake3::hash(&canonical).as_bytes());
        Ok(Self { label: label.to_string(), digest })
    }

    /// Label the key is scoped to
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Hex digest of the canonical parameters
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.label, self.digest)
    }
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let sorted: Map<String, Value> =
                entries.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
