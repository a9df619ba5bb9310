//! Persistent store contract for the larder object cache.
//!
//! A store keeps, per [`UniqueName`](larder_core::UniqueName), one metadata record and one opaque
//! payload record. Implement [`PersistentStore`] to plug in a new backend.
//!
//! ## Built-in stores
//!
//! | Store | Crate | Use case |
//! |-------|-------|----------|
//! | [`MemoryStore`] | `larder-store` | In-process, tests, ephemeral caches |
//! | `FeOxDbStore` | `larder-feoxdb` | Embedded, survives restarts |
mod error;
mod memory;
mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use store::{PersistentStore, StoreResult};

use larder_core::{CacheEntryMetadata, Raw};

/// Status of a delete operation.
#[derive(Debug, PartialEq, Eq)]
pub enum DeleteStatus {
    /// Entry removed.
    Deleted(u32),
    /// Entry was already missing.
    Missing,
}

/// Metadata and payload of one entry, as written together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    /// Freshness metadata.
    pub metadata: CacheEntryMetadata,
    /// Opaque payload bytes.
    pub payload: Raw,
}

impl StoredEntry {
    /// Pairs metadata with its payload.
    pub fn new(metadata: CacheEntryMetadata, payload: Raw) -> Self {
        Self { metadata, payload }
    }
}
