//! Test doubles shared by the larder integration tests.

pub mod codec;
pub mod store;
pub mod tracing;

pub use codec::{MALFORMED, ScriptedCodec};
pub use store::{CountingStore, FailingStore, StoreCounters};

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use larder_core::{CacheEntryMetadata, UniqueName};

/// Policy window used throughout the suites.
pub const MAX_AGE: Duration = Duration::from_secs(60);

/// Metadata of an entry written `age` ago.
pub fn metadata_aged(name: &str, age: TimeDelta) -> CacheEntryMetadata {
    CacheEntryMetadata::new(UniqueName::from(name), Utc::now() - age)
}

/// Shorthand for a past or future instant relative to now.
pub fn from_now(delta: TimeDelta) -> DateTime<Utc> {
    Utc::now() + delta
}
