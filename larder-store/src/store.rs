use std::sync::Arc;

use async_trait::async_trait;
use larder_core::{CacheEntryMetadata, Raw, UniqueName};

use crate::{DeleteStatus, StoreError};

/// Result of a store operation.
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable metadata + payload storage.
///
/// For every name a metadata record exists if and only if a payload record
/// exists. [`write_payload`](Self::write_payload) upserts both atomically:
/// concurrent writers to one name may race (last write wins) but a reader
/// never observes half of a pair.
#[async_trait]
pub trait PersistentStore: Send + Sync {
    /// Reads the metadata of one entry.
    async fn get_metadata(&self, name: &UniqueName) -> StoreResult<Option<CacheEntryMetadata>>;

    /// Lists the metadata of every entry, in no particular order.
    async fn get_all_metadata(&self) -> StoreResult<Vec<CacheEntryMetadata>>;

    /// Reads the payload of one entry.
    async fn read_payload(&self, name: &UniqueName) -> StoreResult<Option<Raw>>;

    /// Atomically upserts metadata and payload for `metadata.unique_name`.
    async fn write_payload(&self, metadata: CacheEntryMetadata, payload: Raw) -> StoreResult<()>;

    /// Removes both records of one entry. Missing entries are not an error.
    async fn delete(&self, name: &UniqueName) -> StoreResult<DeleteStatus>;

    /// Removes every entry; either all are gone afterwards or none.
    async fn delete_all(&self) -> StoreResult<()>;

    /// Returns the name of this store for logs and metrics.
    fn name(&self) -> &str {
        "store"
    }
}

#[async_trait]
impl<T> PersistentStore for Arc<T>
where
    T: PersistentStore + ?Sized,
{
    async fn get_metadata(&self, name: &UniqueName) -> StoreResult<Option<CacheEntryMetadata>> {
        (**self).get_metadata(name).await
    }

    async fn get_all_metadata(&self) -> StoreResult<Vec<CacheEntryMetadata>> {
        (**self).get_all_metadata().await
    }

    async fn read_payload(&self, name: &UniqueName) -> StoreResult<Option<Raw>> {
        (**self).read_payload(name).await
    }

    async fn write_payload(&self, metadata: CacheEntryMetadata, payload: Raw) -> StoreResult<()> {
        (**self).write_payload(metadata, payload).await
    }

    async fn delete(&self, name: &UniqueName) -> StoreResult<DeleteStatus> {
        (**self).delete(name).await
    }

    async fn delete_all(&self) -> StoreResult<()> {
        (**self).delete_all().await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[async_trait]
impl<T> PersistentStore for Box<T>
where
    T: PersistentStore + ?Sized,
{
    async fn get_metadata(&self, name: &UniqueName) -> StoreResult<Option<CacheEntryMetadata>> {
        (**self).get_metadata(name).await
    }

    async fn get_all_metadata(&self) -> StoreResult<Vec<CacheEntryMetadata>> {
        (**self).get_all_metadata().await
    }

    async fn read_payload(&self, name: &UniqueName) -> StoreResult<Option<Raw>> {
        (**self).read_payload(name).await
    }

    async fn write_payload(&self, metadata: CacheEntryMetadata, payload: Raw) -> StoreResult<()> {
        (**self).write_payload(metadata, payload).await
    }

    async fn delete(&self, name: &UniqueName) -> StoreResult<DeleteStatus> {
        (**self).delete(name).await
    }

    async fn delete_all(&self) -> StoreResult<()> {
        (**self).delete_all().await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
