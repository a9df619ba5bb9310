use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use bincode::{
    config::standard as bincode_config,
    serde::{decode_from_slice, encode_to_vec},
};
use bytes::Bytes;
use feoxdb::{FeoxError, FeoxStore};
use larder_core::{CacheEntryMetadata, Raw, UniqueName};
use larder_store::{DeleteStatus, PersistentStore, StoreResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::FeOxDbError;

const GENERATION_KEY: &[u8] = b"~larder/generation";
const GENERATION_WIDTH: usize = 20;
const RANGE_LIMIT: usize = usize::MAX;

/// One entry: metadata and payload travel in a single FeOxDB record, so the
/// pair is replaced atomically.
#[derive(Serialize, Deserialize)]
struct EntryRecord {
    metadata: CacheEntryMetadata,
    #[serde(with = "serde_bytes")]
    payload: Vec<u8>,
}

/// Disk-based store using FeOxDB.
///
/// Entries are keyed `{generation}/{unique_name}`. [`delete_all`] switches
/// to a fresh generation with a single record write, which makes the wipe
/// all-or-nothing; records of older generations are purged afterwards.
///
/// ```no_run
/// use larder_feoxdb::FeOxDbStore;
///
/// let store = FeOxDbStore::builder()
///     .path("/var/cache/myapp")
///     .max_memory(64 * 1024 * 1024)
///     .build()?;
/// # Ok::<(), larder_feoxdb::FeOxDbError>(())
/// ```
///
/// Cloning is cheap; clones share the same database.
///
/// [`delete_all`]: PersistentStore::delete_all
#[derive(Clone)]
pub struct FeOxDbStore {
    store: Arc<FeoxStore>,
    generation: Arc<AtomicU64>,
}

impl std::fmt::Debug for FeOxDbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeOxDbStore")
            .field("generation", &self.generation.load(Ordering::Acquire))
            .finish()
    }
}

impl FeOxDbStore {
    /// Starts building a new store.
    pub fn builder() -> FeOxDbStoreBuilder {
        FeOxDbStoreBuilder::default()
    }

    /// Memory-only store. Data is lost when dropped.
    pub fn in_memory() -> Result<Self, FeOxDbError> {
        Self::builder().build()
    }

    /// Forces pending writes to disk.
    ///
    /// FeOxDB buffers writes and flushes them periodically. No-op in
    /// memory-only mode.
    pub fn flush(&self) {
        self.store.flush();
    }

    fn open(store: FeoxStore) -> Result<Self, FeOxDbError> {
        let generation = match store.get(GENERATION_KEY) {
            Ok(bytes) => decode_generation(&bytes)?,
            Err(FeoxError::KeyNotFound) => 0,
            Err(e) => return Err(e.into()),
        };
        let store = Arc::new(store);
        purge_generations_before(&store, generation);
        Ok(Self {
            store,
            generation: Arc::new(AtomicU64::new(generation)),
        })
    }

    fn entry_key(&self, name: &UniqueName) -> Vec<u8> {
        entry_key(self.generation.load(Ordering::Acquire), name)
    }

    async fn read_record(&self, name: &UniqueName) -> StoreResult<Option<EntryRecord>> {
        let store = self.store.clone();
        let key = self.entry_key(name);

        let record = tokio::task::spawn_blocking(move || match store.get(&key) {
            Ok(encoded) => decode_record(&encoded).map(Some),
            Err(FeoxError::KeyNotFound) => Ok(None),
            Err(e) => Err(FeOxDbError::from(e)),
        })
        .await
        .map_err(FeOxDbError::from)??;
        Ok(record)
    }
}

/// Builder for [`FeOxDbStore`].
#[derive(Debug, Default)]
pub struct FeOxDbStoreBuilder {
    path: Option<PathBuf>,
    max_file_size: Option<u64>,
    max_memory: Option<usize>,
}

impl FeOxDbStoreBuilder {
    /// Enables persistent storage at the given path.
    ///
    /// Without this, data lives only in memory. If path is a directory,
    /// creates `cache.db` inside it.
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Pre-allocates disk space and caps maximum storage.
    ///
    /// Ignored in memory-only mode.
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = Some(bytes);
        self
    }

    /// Limits RAM usage.
    ///
    /// FeOxDB has no eviction: writes fail once the limit is reached, and
    /// the orchestrator reports that as a store failure.
    pub fn max_memory(mut self, bytes: usize) -> Self {
        self.max_memory = Some(bytes);
        self
    }

    /// Opens the store.
    ///
    /// Fails if the database file can't be opened or created.
    pub fn build(self) -> Result<FeOxDbStore, FeOxDbError> {
        let mut builder = FeoxStore::builder();

        if let Some(mut path) = self.path {
            if path.is_dir() {
                path.push("cache.db");
            }
            builder = builder.device_path(path.to_string_lossy().to_string());
        }

        if let Some(file_size) = self.max_file_size {
            builder = builder.file_size(file_size);
        }

        if let Some(memory) = self.max_memory {
            builder = builder.max_memory(memory);
        }

        FeOxDbStore::open(builder.build()?)
    }
}

fn generation_prefix(generation: u64) -> String {
    format!("{generation:0width$}/", width = GENERATION_WIDTH)
}

fn entry_key(generation: u64, name: &UniqueName) -> Vec<u8> {
    let mut key = generation_prefix(generation).into_bytes();
    key.extend_from_slice(name.as_str().as_bytes());
    key
}

/// Smallest key sorting after every key starting with `prefix`.
fn prefix_end(prefix: &str) -> Vec<u8> {
    let mut end = prefix.as_bytes().to_vec();
    if let Some(last) = end.last_mut() {
        *last += 1;
    }
    end
}

fn decode_generation(bytes: &[u8]) -> Result<u64, FeOxDbError> {
    bytes
        .try_into()
        .map(u64::from_le_bytes)
        .map_err(|_| FeOxDbError::CorruptGeneration(bytes.len()))
}

fn decode_record(bytes: &[u8]) -> Result<EntryRecord, FeOxDbError> {
    let (record, _) = decode_from_slice(bytes, bincode_config())?;
    Ok(record)
}

/// Best-effort removal of every record older than `generation`.
fn purge_generations_before(store: &FeoxStore, generation: u64) {
    if generation == 0 {
        return;
    }
    let start = generation_prefix(0).into_bytes();
    let end = generation_prefix(generation).into_bytes();
    match store.range_query(&start, &end, RANGE_LIMIT) {
        Ok(records) => {
            let mut purged = 0usize;
            for (key, _) in records.iter().filter(|(key, _)| key.as_slice() != end) {
                match store.delete(key) {
                    Ok(_) => purged += 1,
                    Err(FeoxError::KeyNotFound) => {}
                    Err(error) => warn!(%error, "failed to purge record of a wiped generation"),
                }
            }
            debug!(purged, generation, "purged wiped generations");
        }
        Err(error) => warn!(%error, "failed to list records of wiped generations"),
    }
}

#[async_trait]
impl PersistentStore for FeOxDbStore {
    async fn get_metadata(&self, name: &UniqueName) -> StoreResult<Option<CacheEntryMetadata>> {
        Ok(self.read_record(name).await?.map(|record| record.metadata))
    }

    async fn get_all_metadata(&self) -> StoreResult<Vec<CacheEntryMetadata>> {
        let store = self.store.clone();
        let prefix = generation_prefix(self.generation.load(Ordering::Acquire));

        let metadata = tokio::task::spawn_blocking(move || {
            let start = prefix.as_bytes().to_vec();
            let end = prefix_end(&prefix);
            store
                .range_query(&start, &end, RANGE_LIMIT)?
                .iter()
                .filter(|(key, _)| key.starts_with(&start))
                .map(|(_, value)| decode_record(value).map(|record| record.metadata))
                .collect::<Result<Vec<_>, FeOxDbError>>()
        })
        .await
        .map_err(FeOxDbError::from)??;
        Ok(metadata)
    }

    async fn read_payload(&self, name: &UniqueName) -> StoreResult<Option<Raw>> {
        Ok(self
            .read_record(name)
            .await?
            .map(|record| Bytes::from(record.payload)))
    }

    async fn write_payload(&self, metadata: CacheEntryMetadata, payload: Raw) -> StoreResult<()> {
        let store = self.store.clone();
        let key = self.entry_key(&metadata.unique_name);
        let record = EntryRecord {
            metadata,
            payload: payload.to_vec(),
        };
        let value = encode_to_vec(&record, bincode_config()).map_err(FeOxDbError::from)?;

        tokio::task::spawn_blocking(move || {
            store.insert(&key, &value)?;
            Ok::<_, FeOxDbError>(())
        })
        .await
        .map_err(FeOxDbError::from)??;
        Ok(())
    }

    async fn delete(&self, name: &UniqueName) -> StoreResult<DeleteStatus> {
        let store = self.store.clone();
        let key = self.entry_key(name);

        let status = tokio::task::spawn_blocking(move || {
            if !store.contains_key(&key) {
                return Ok(DeleteStatus::Missing);
            }
            match store.delete(&key) {
                Ok(_) => Ok(DeleteStatus::Deleted(1)),
                Err(FeoxError::KeyNotFound) => Ok(DeleteStatus::Missing),
                Err(e) => Err(FeOxDbError::from(e)),
            }
        })
        .await
        .map_err(FeOxDbError::from)??;
        Ok(status)
    }

    async fn delete_all(&self) -> StoreResult<()> {
        let store = self.store.clone();
        let generation = self.generation.clone();

        tokio::task::spawn_blocking(move || {
            let next = generation.load(Ordering::Acquire) + 1;
            // Switching generations is a single record write: the wipe either
            // happens entirely or not at all.
            store.insert(GENERATION_KEY, &next.to_le_bytes())?;
            generation.store(next, Ordering::Release);
            purge_generations_before(&store, next);
            Ok::<_, FeOxDbError>(())
        })
        .await
        .map_err(FeOxDbError::from)??;
        Ok(())
    }

    fn name(&self) -> &str {
        "feoxdb"
    }
}
