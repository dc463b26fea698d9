//! Serialization helpers shared by the configuration types
//!
//! - **[`serde`]**: `Duration` encodings for config files (milliseconds,
//!   seconds, and label-keyed maps of seconds)

pub mod serde;

// Re-export commonly used items for convenience
pub use self::serde::{duration_millis, duration_secs, duration_secs_map};
