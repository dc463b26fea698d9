//! Serialization utilities for configuration durations
//!
//! Config files express short intervals (backoff, throttling) in
//! milliseconds and long ones (cache TTLs, recovery windows) in seconds.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

/// Serde serialization result type
type SerializeResult<S> = Result<<S as Serializer>::Ok, <S as Serializer>::Error>;

/// Custom serialization module for Duration as milliseconds
///
/// # Usage
/// ```rust
/// use std::time::Duration;
///
/// use serde::{Deserialize, Serialize};
/// use statline_common::duration_millis;
///
/// #[derive(Serialize, Deserialize)]
/// struct Example {
///     #[serde(with = "duration_millis")]
///     min_interval: Duration,
/// }
/// ```
pub mod duration_millis {
    use super::*;

    /// Serialize a Duration as milliseconds (u64)
    pub fn serialize<S>(duration: &Duration, serializer: S) -> SerializeResult<S>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    /// Deserialize milliseconds (u64) into a Duration
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Custom serialization module for Duration as whole seconds
///
/// Sub-second precision is truncated on serialization.
pub mod duration_secs {
    use super::*;

    /// Serialize a Duration as seconds (u64)
    pub fn serialize<S>(duration: &Duration, serializer: S) -> SerializeResult<S>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    /// Deserialize seconds (u64) into a Duration
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Label-keyed map of durations expressed in seconds
///
/// Used for per-label cache TTL overrides, e.g. `{"lines": 120}`.
pub mod duration_secs_map {
    use std::collections::HashMap;

    use serde::ser::SerializeMap;

    use super::*;

    /// Serialize a `HashMap<String, Duration>` as `{label: seconds}`
    pub fn serialize<S>(map: &HashMap<String, Duration>, serializer: S) -> SerializeResult<S>
    where
        S: Serializer,
    {
        let mut entries: Vec<(&String, &Duration)> = map.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));

        let mut out = serializer.serialize_map(Some(entries.len()))?;
        for (label, ttl) in entries {
            out.serialize_entry(label, &ttl.as_secs())?;
        }
        out.end()
    }

    /// Deserialize `{label: seconds}` into a `HashMap<String, Duration>`
    pub fn deserialize<'de, D>(deserializer: D) -> Result<HashMap<String, Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = HashMap::<String, u64>::deserialize(deserializer)?;
        Ok(raw.into_iter().map(|(label, secs)| (label, Duration::from_secs(secs))).collect())
    }
}
