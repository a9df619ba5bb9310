//! Freshness policies and the policy evaluator.
//!
//! Each object type carries one immutable [`CachePolicy`]. For every request
//! the orchestrator asks [`decide`] what to do, given the entry's metadata
//! (if any) and the current time:
//!
//! | Policy | No metadata | Fresh | Stale |
//! |--------|-------------|-------|-------|
//! | `NoCache` | `FetchOnly` | `FetchOnly` | `FetchOnly` |
//! | `CacheThenRefresh` | `FetchAndBlock` | `ServeCached` | `ServeCachedThenRefresh` |
//! | `ValidCacheOnly` | `FetchAndBlock` | `ServeCached` | `FetchAndBlock` |
//! | `Forever` | `FetchAndBlock` | `ServeCached` | `FetchAndBlock` (expired only) |
//!
//! An entry is stale once its age reaches `max_age`, or once its own
//! [`Expiration`](crate::Expiration) has passed, whichever comes first.
//!
//! ```
//! use std::time::Duration;
//! use chrono::Utc;
//! use larder_core::{Action, CacheEntryMetadata, CachePolicy, UniqueName, decide};
//!
//! let now = Utc::now();
//! let policy = CachePolicy::ValidCacheOnly { max_age: Duration::from_secs(60) };
//! let meta = CacheEntryMetadata::new(UniqueName::from("feed:id=1"), now - chrono::Duration::seconds(120));
//!
//! assert_eq!(decide(&policy, None, now), Action::FetchAndBlock);
//! assert_eq!(decide(&policy, Some(&meta), now), Action::FetchAndBlock);
//! ```

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::metadata::CacheEntryMetadata;

/// Per-type freshness policy.
///
/// Serialized with an internal `type` tag and human readable durations:
///
/// ```yaml
/// type: CacheThenRefresh
/// max_age: 60s
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CachePolicy {
    /// Never read or write the store; always fetch.
    NoCache,
    /// Serve any cached value immediately, refresh in background once older than `max_age`.
    CacheThenRefresh {
        /// Age after which a background refresh is triggered.
        #[serde(with = "humantime_serde")]
        max_age: Duration,
    },
    /// Serve cached values younger than `max_age`; otherwise fetch and wait.
    ValidCacheOnly {
        /// Age after which the cached value is no longer shown.
        #[serde(with = "humantime_serde")]
        max_age: Duration,
    },
    /// Once fetched, valid until explicitly invalidated.
    Forever,
}

impl CachePolicy {
    /// Returns `false` for [`CachePolicy::NoCache`].
    #[inline]
    pub fn uses_store(&self) -> bool {
        !matches!(self, CachePolicy::NoCache)
    }

    /// Returns the age tolerance, if the policy has one.
    pub fn max_age(&self) -> Option<Duration> {
        match self {
            CachePolicy::CacheThenRefresh { max_age } | CachePolicy::ValidCacheOnly { max_age } => {
                Some(*max_age)
            }
            CachePolicy::NoCache | CachePolicy::Forever => None,
        }
    }
}

/// What the orchestrator should do for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Fetch without touching the store.
    FetchOnly,
    /// Fetch; the caller waits for the outcome.
    FetchAndBlock,
    /// Serve the cached value; no fetch.
    ServeCached,
    /// Serve the cached value now, then refresh in background.
    ServeCachedThenRefresh,
}

impl Action {
    /// Returns the action as a string slice.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Action::FetchOnly => "fetch_only",
            Action::FetchAndBlock => "fetch_and_block",
            Action::ServeCached => "serve_cached",
            Action::ServeCachedThenRefresh => "serve_cached_then_refresh",
        }
    }

    /// Returns `true` if the cached value is delivered.
    #[inline]
    pub const fn serves_cached(&self) -> bool {
        matches!(self, Action::ServeCached | Action::ServeCachedThenRefresh)
    }

    /// Returns `true` if a fetch is started.
    #[inline]
    pub const fn fetches(&self) -> bool {
        !matches!(self, Action::ServeCached)
    }
}

/// Decides how to serve a request.
///
/// Pure: depends only on its arguments.
pub fn decide(
    policy: &CachePolicy,
    metadata: Option<&CacheEntryMetadata>,
    now: DateTime<Utc>,
) -> Action {
    if let CachePolicy::NoCache = policy {
        return Action::FetchOnly;
    }
    let Some(metadata) = metadata else {
        return Action::FetchAndBlock;
    };
    match *policy {
        CachePolicy::NoCache => Action::FetchOnly,
        CachePolicy::CacheThenRefresh { max_age } => {
            if is_fresh(metadata, max_age, now) {
                Action::ServeCached
            } else {
                Action::ServeCachedThenRefresh
            }
        }
        CachePolicy::ValidCacheOnly { max_age } => {
            if is_fresh(metadata, max_age, now) {
                Action::ServeCached
            } else {
                Action::FetchAndBlock
            }
        }
        CachePolicy::Forever => {
            if metadata.expiration_time.is_passed(now) {
                Action::FetchAndBlock
            } else {
                Action::ServeCached
            }
        }
    }
}

/// Per-object expiry overrides the policy window.
fn is_fresh(metadata: &CacheEntryMetadata, max_age: Duration, now: DateTime<Utc>) -> bool {
    if metadata.expiration_time.is_passed(now) {
        return false;
    }
    match TimeDelta::from_std(max_age) {
        Ok(max_age) => metadata.age(now) < max_age,
        // Windows beyond chrono's range never elapse.
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Expiration, UniqueName};

    fn meta_aged(now: DateTime<Utc>, secs: i64) -> CacheEntryMetadata {
        CacheEntryMetadata::new(
            UniqueName::from("user:id=1"),
            now - TimeDelta::seconds(secs),
        )
    }

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn no_cache_always_fetches_only() {
        let now = Utc::now();
        let meta = meta_aged(now, 1);
        assert_eq!(decide(&CachePolicy::NoCache, None, now), Action::FetchOnly);
        assert_eq!(
            decide(&CachePolicy::NoCache, Some(&meta), now),
            Action::FetchOnly
        );
    }

    #[test]
    fn missing_metadata_blocks_on_fetch() {
        let now = Utc::now();
        for policy in [
            CachePolicy::CacheThenRefresh { max_age: MINUTE },
            CachePolicy::ValidCacheOnly { max_age: MINUTE },
            CachePolicy::Forever,
        ] {
            assert_eq!(decide(&policy, None, now), Action::FetchAndBlock, "{policy:?}");
        }
    }

    #[test]
    fn cache_then_refresh() {
        let now = Utc::now();
        let policy = CachePolicy::CacheThenRefresh { max_age: MINUTE };
        assert_eq!(
            decide(&policy, Some(&meta_aged(now, 10)), now),
            Action::ServeCached
        );
        assert_eq!(
            decide(&policy, Some(&meta_aged(now, 120)), now),
            Action::ServeCachedThenRefresh
        );
    }

    #[test]
    fn valid_cache_only() {
        let now = Utc::now();
        let policy = CachePolicy::ValidCacheOnly { max_age: MINUTE };
        assert_eq!(
            decide(&policy, Some(&meta_aged(now, 10)), now),
            Action::ServeCached
        );
        assert_eq!(
            decide(&policy, Some(&meta_aged(now, 120)), now),
            Action::FetchAndBlock
        );
    }

    #[test]
    fn age_equal_to_max_age_is_stale() {
        let now = Utc::now();
        let policy = CachePolicy::ValidCacheOnly { max_age: MINUTE };
        assert_eq!(
            decide(&policy, Some(&meta_aged(now, 60)), now),
            Action::FetchAndBlock
        );
    }

    #[test]
    fn forever_ignores_age() {
        let now = Utc::now();
        let meta = meta_aged(now, 60 * 60 * 24 * 365);
        assert_eq!(
            decide(&CachePolicy::Forever, Some(&meta), now),
            Action::ServeCached
        );
    }

    #[test]
    fn passed_expiration_overrides_max_age() {
        let now = Utc::now();
        let meta = meta_aged(now, 5).with_expiration(Expiration::At(now - TimeDelta::seconds(1)));

        assert_eq!(
            decide(&CachePolicy::CacheThenRefresh { max_age: MINUTE }, Some(&meta), now),
            Action::ServeCachedThenRefresh
        );
        assert_eq!(
            decide(&CachePolicy::ValidCacheOnly { max_age: MINUTE }, Some(&meta), now),
            Action::FetchAndBlock
        );
        assert_eq!(
            decide(&CachePolicy::Forever, Some(&meta), now),
            Action::FetchAndBlock
        );
    }

    #[test]
    fn expiration_exactly_now_is_passed() {
        let now = Utc::now();
        let meta = meta_aged(now, 5).with_expiration(Expiration::At(now));
        assert_eq!(
            decide(&CachePolicy::ValidCacheOnly { max_age: MINUTE }, Some(&meta), now),
            Action::FetchAndBlock
        );
    }

    #[test]
    fn future_expiration_keeps_policy_window() {
        let now = Utc::now();
        let meta = meta_aged(now, 120).with_expiration(Expiration::At(now + TimeDelta::hours(1)));
        assert_eq!(
            decide(&CachePolicy::ValidCacheOnly { max_age: MINUTE }, Some(&meta), now),
            Action::FetchAndBlock
        );
    }

    #[test]
    fn updated_in_the_future_counts_as_fresh() {
        let now = Utc::now();
        let meta = meta_aged(now, -30);
        assert_eq!(
            decide(&CachePolicy::ValidCacheOnly { max_age: MINUTE }, Some(&meta), now),
            Action::ServeCached
        );
    }

    #[test]
    fn huge_max_age_never_elapses() {
        let now = Utc::now();
        let policy = CachePolicy::ValidCacheOnly {
            max_age: Duration::MAX,
        };
        assert_eq!(
            decide(&policy, Some(&meta_aged(now, 1_000_000)), now),
            Action::ServeCached
        );
    }

    #[test]
    fn policy_deserializes_from_tagged_json() {
        let policy: CachePolicy =
            serde_json::from_str(r#"{"type":"CacheThenRefresh","max_age":"90s"}"#).unwrap();
        assert_eq!(
            policy,
            CachePolicy::CacheThenRefresh {
                max_age: Duration::from_secs(90)
            }
        );
        let policy: CachePolicy = serde_json::from_str(r#"{"type":"Forever"}"#).unwrap();
        assert_eq!(policy, CachePolicy::Forever);
        assert_eq!(policy.max_age(), None);
        assert!(!CachePolicy::NoCache.uses_store());
    }
}
