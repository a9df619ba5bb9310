//! Per-type contracts: how to fetch and how to decode one object type.
//!
//! The orchestrator knows neither the transport nor the byte format of any
//! type. Each registered type supplies an [`ObjectCodec`], which builds a
//! [`FetchRequest`] for an identity and turns bytes back into objects.
//!
//! # Examples
//!
//! ```
//! use larder_core::{BoxFetchFuture, MalformedDataError, ObjectCodec, Raw};
//!
//! struct Greeting;
//!
//! impl ObjectCodec for Greeting {
//!     type Identity = String;
//!     type Object = String;
//!     type Request = BoxFetchFuture;
//!
//!     fn type_name(&self) -> &str {
//!         "greeting"
//!     }
//!
//!     fn build_fetch_request(&self, identity: &String) -> BoxFetchFuture {
//!         let body = format!("hello, {identity}");
//!         Box::pin(async move { Ok(Raw::from(body)) })
//!     }
//!
//!     fn deserialize(&self, _identity: &String, bytes: &Raw) -> Result<String, MalformedDataError> {
//!         String::from_utf8(bytes.to_vec())
//!             .map_err(|e| MalformedDataError::with_source("not utf-8", e))
//!     }
//! }
//! ```

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};

use crate::Raw;
use crate::error::{FetchError, MalformedDataError};
use crate::key::{Identity, UniqueName};
use crate::metadata::Expiration;

/// Boxed fetch future, the most convenient [`FetchRequest`].
pub type BoxFetchFuture = Pin<Box<dyn Future<Output = Result<Raw, FetchError>> + Send + 'static>>;

/// Produces the bytes of one logical object, asynchronously.
///
/// Transport-level timeouts and retries belong to the implementation; the
/// orchestrator runs the request to completion exactly once.
pub trait FetchRequest: Send + 'static {
    /// The future that resolves to the fetched bytes.
    type Future: Future<Output = Result<Raw, FetchError>> + Send + 'static;

    /// Starts the fetch.
    fn fetch(self) -> Self::Future;
}

impl FetchRequest for BoxFetchFuture {
    type Future = Self;

    fn fetch(self) -> Self::Future {
        self
    }
}

/// Fetch and decode rules of one object type.
///
/// `deserialize` is called for freshly fetched bytes and for bytes read from
/// the store alike; both must yield the same object.
pub trait ObjectCodec: Send + Sync + 'static {
    /// Identity of one object of this type.
    type Identity: Identity + Clone + 'static;
    /// The decoded object.
    type Object: Clone + Send + Sync + 'static;
    /// Fetch request built for one identity.
    type Request: FetchRequest;

    /// Stable name of the type; prefix of every [`UniqueName`] of this type.
    fn type_name(&self) -> &str;

    /// Builds the request that fetches `identity`.
    fn build_fetch_request(&self, identity: &Self::Identity) -> Self::Request;

    /// Decodes raw bytes.
    fn deserialize(
        &self,
        identity: &Self::Identity,
        bytes: &Raw,
    ) -> Result<Self::Object, MalformedDataError>;

    /// Decodes a payload previously produced by [`optimize`](Self::optimize).
    fn deserialize_optimized(
        &self,
        identity: &Self::Identity,
        bytes: &Raw,
    ) -> Result<Self::Object, MalformedDataError> {
        self.deserialize(identity, bytes)
    }

    /// Returns a fast-to-decode form of `object` to persist instead of the
    /// fetched bytes, or `None` to persist the fetched bytes as they are.
    fn optimize(&self, _identity: &Self::Identity, _object: &Self::Object) -> Option<Raw> {
        None
    }

    /// Per-object expiry attached to a freshly written entry.
    fn expiration(
        &self,
        _identity: &Self::Identity,
        _object: &Self::Object,
        _now: DateTime<Utc>,
    ) -> Expiration {
        Expiration::Never
    }

    /// Unique name of `identity` within this type.
    fn unique_name(&self, identity: &Self::Identity) -> UniqueName {
        UniqueName::for_identity(self.type_name(), identity)
    }
}
