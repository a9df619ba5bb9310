//! In-process store backed by a concurrent hash map.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use larder_core::{CacheEntryMetadata, Raw, UniqueName};

use crate::{DeleteStatus, PersistentStore, StoreResult, StoredEntry};

/// In-memory [`PersistentStore`].
///
/// Metadata and payload of one entry live in a single map slot, so a pair is
/// always replaced as a whole. Clones share the same map.
///
/// Data does not survive the process; use `larder-feoxdb` for that.
///
/// ```
/// use larder_store::MemoryStore;
///
/// let store = MemoryStore::new();
/// assert!(store.is_empty());
/// ```
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<UniqueName, StoredEntry>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns a copy of one entry for inspection.
    pub fn get_entry(&self, name: &UniqueName) -> Option<StoredEntry> {
        self.entries.get(name).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl PersistentStore for MemoryStore {
    async fn get_metadata(&self, name: &UniqueName) -> StoreResult<Option<CacheEntryMetadata>> {
        Ok(self.entries.get(name).map(|entry| entry.metadata.clone()))
    }

    async fn get_all_metadata(&self) -> StoreResult<Vec<CacheEntryMetadata>> {
        Ok(self
            .entries
            .iter()
            .map(|entry| entry.metadata.clone())
            .collect())
    }

    async fn read_payload(&self, name: &UniqueName) -> StoreResult<Option<Raw>> {
        Ok(self.entries.get(name).map(|entry| entry.payload.clone()))
    }

    async fn write_payload(&self, metadata: CacheEntryMetadata, payload: Raw) -> StoreResult<()> {
        self.entries.insert(
            metadata.unique_name.clone(),
            StoredEntry::new(metadata, payload),
        );
        Ok(())
    }

    async fn delete(&self, name: &UniqueName) -> StoreResult<DeleteStatus> {
        Ok(match self.entries.remove(name) {
            Some(_) => DeleteStatus::Deleted(1),
            None => DeleteStatus::Missing,
        })
    }

    async fn delete_all(&self) -> StoreResult<()> {
        self.entries.clear();
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
