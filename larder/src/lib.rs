#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]
//! # larder
//!
//! Policy-driven, offline-first object cache.
//!
//! Every object type registers an [`ObjectCodec`] (how to fetch and decode
//! it) and a [`CachePolicy`] (how long a persisted copy may be shown). The
//! [`CacheOrchestrator`] then answers requests from the [`PersistentStore`]
//! where the policy allows, and fetches otherwise, with at most one fetch per
//! object in flight at a time.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use larder::{CacheOrchestrator, CachePolicy, Resolution};
//! use larder_store::MemoryStore;
//! # use larder::{BoxFetchFuture, MalformedDataError, ObjectCodec, Raw};
//! # struct Profiles;
//! # impl ObjectCodec for Profiles {
//! #     type Identity = u64;
//! #     type Object = String;
//! #     type Request = BoxFetchFuture;
//! #     fn type_name(&self) -> &str { "profile" }
//! #     fn build_fetch_request(&self, id: &u64) -> BoxFetchFuture {
//! #         let id = *id;
//! #         Box::pin(async move { Ok(Raw::from(format!("user {id}"))) })
//! #     }
//! #     fn deserialize(&self, _: &u64, bytes: &Raw) -> Result<String, MalformedDataError> {
//! #         String::from_utf8(bytes.to_vec()).map_err(|e| MalformedDataError::with_source("utf-8", e))
//! #     }
//! # }
//!
//! # async fn run() -> Result<(), larder::CacheError> {
//! let cache = CacheOrchestrator::new(MemoryStore::new());
//! cache.register(
//!     Profiles,
//!     CachePolicy::CacheThenRefresh { max_age: Duration::from_secs(60) },
//! );
//!
//! match cache.resolve::<Profiles>(42).await? {
//!     Resolution::Ready(profile) => println!("cached: {profile}"),
//!     Resolution::Refreshing { cached, refresh } => {
//!         println!("stale: {cached}");
//!         println!("fresh: {}", refresh.await?);
//!     }
//!     Resolution::Pending(pending) => println!("fetched: {}", pending.await?),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! - `metrics`: counters for hits, stale serves, misses, fetches and store
//!   failures through the [`metrics`](https://docs.rs/metrics) facade.

mod config;
mod error;
mod inflight;
mod orchestrator;
mod registry;
mod resolution;

/// Metrics collection for cache observability.
///
/// When the `metrics` feature is enabled, every counter is labelled with
/// the `type` of the object it concerns.
pub mod metrics;

pub use config::OrchestratorConfig;
pub use error::CacheError;
pub use orchestrator::CacheOrchestrator;
pub use resolution::{Pending, Resolution};

pub use larder_core::{
    Action, BoxFetchFuture, CacheEntryMetadata, CachePolicy, Expiration, FetchError,
    FetchRequest, Identity, KeyPart, MalformedDataError, ObjectCodec, Raw, UniqueName, decide,
};
pub use larder_store::{DeleteStatus, PersistentStore, StoreError};
