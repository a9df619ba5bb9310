#![warn(missing_docs)]
//! # larder-core
//!
//! Core types and per-type contracts for the larder object cache.
//!
//! This crate has no I/O of its own. It defines what the orchestrator in the
//! `larder` crate works with:
//!
//! - **Identify** cached objects ([`Identity`], [`UniqueName`])
//! - **Describe** freshness of stored entries ([`CacheEntryMetadata`], [`Expiration`])
//! - **Decide** what to do with a request ([`CachePolicy`], [`decide`], [`Action`])
//! - **Fetch and decode** objects of one type ([`FetchRequest`], [`ObjectCodec`])
//!
//! Store backends live in `larder-store` and friends; the orchestration itself
//! lives in `larder`.

pub mod codec;
pub mod error;
pub mod key;
pub mod metadata;
pub mod policy;

pub use codec::{BoxFetchFuture, FetchRequest, ObjectCodec};
pub use error::{FetchError, MalformedDataError};
pub use key::{Identity, KeyPart, UniqueName};
pub use metadata::{CacheEntryMetadata, Expiration};
pub use policy::{Action, CachePolicy, decide};
#[doc(hidden)]
pub use smol_str::SmolStr;

/// Raw byte payload as fetched or as persisted.
/// Using `Bytes` keeps clones cheap when one payload is handed to several places.
pub type Raw = bytes::Bytes;
