//! Freshness metadata of persisted entries.
//!
//! A [`CacheEntryMetadata`] record exists for every persisted payload and
//! carries what the policy evaluator needs to judge staleness:
//!
//! - **updated time** - when the payload was last successfully written
//! - **expiration** - an optional per-object deadline, see [`Expiration`]
//!
//! ```
//! use chrono::{Duration, Utc};
//! use larder_core::{CacheEntryMetadata, Expiration, UniqueName};
//!
//! let now = Utc::now();
//! let meta = CacheEntryMetadata::new(UniqueName::from("user:id=1"), now - Duration::seconds(30))
//!     .with_expiration(Expiration::At(now + Duration::minutes(5)));
//!
//! assert_eq!(meta.age(now), Duration::seconds(30));
//! assert!(!meta.expiration_time.is_passed(now));
//! ```

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::key::UniqueName;

/// Per-object expiry of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Expiration {
    /// The entry never expires on its own.
    #[default]
    Never,
    /// The entry is stale from this instant on.
    At(DateTime<Utc>),
}

impl Expiration {
    /// Returns `true` once `now` has reached the expiry instant.
    #[inline]
    pub fn is_passed(&self, now: DateTime<Utc>) -> bool {
        match self {
            Expiration::Never => false,
            Expiration::At(at) => now >= *at,
        }
    }

    /// Returns the expiry instant, if any.
    #[inline]
    pub fn at(&self) -> Option<DateTime<Utc>> {
        match self {
            Expiration::Never => None,
            Expiration::At(at) => Some(*at),
        }
    }
}

impl From<Option<DateTime<Utc>>> for Expiration {
    fn from(at: Option<DateTime<Utc>>) -> Self {
        at.map_or(Expiration::Never, Expiration::At)
    }
}

/// Identity and freshness of one cached object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntryMetadata {
    /// Key of the entry; 1:1 with its payload record.
    pub unique_name: UniqueName,
    /// When the payload was last successfully written.
    pub updated_time: DateTime<Utc>,
    /// When the payload is considered stale regardless of policy.
    pub expiration_time: Expiration,
    /// Whether the payload is stored in the codec's optimized form.
    pub is_optimized: bool,
}

impl CacheEntryMetadata {
    /// Creates metadata for a raw payload with no expiry.
    pub fn new(unique_name: UniqueName, updated_time: DateTime<Utc>) -> Self {
        Self {
            unique_name,
            updated_time,
            expiration_time: Expiration::Never,
            is_optimized: false,
        }
    }

    /// Sets the per-object expiry.
    pub fn with_expiration(self, expiration_time: Expiration) -> Self {
        Self {
            expiration_time,
            ..self
        }
    }

    /// Marks the payload as optimized (or raw).
    pub fn optimized(self, is_optimized: bool) -> Self {
        Self {
            is_optimized,
            ..self
        }
    }

    /// Age of the payload at `now`.
    ///
    /// Negative when `updated_time` lies in the future (clock skew).
    pub fn age(&self, now: DateTime<Utc>) -> TimeDelta {
        now.signed_duration_since(self.updated_time)
    }
}
