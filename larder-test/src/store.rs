use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use larder_core::{CacheEntryMetadata, Raw, UniqueName};
use larder_store::{
    DeleteStatus, MemoryStore, PersistentStore, StoreError, StoreResult, StoredEntry,
};

#[derive(Debug, Default)]
pub struct StoreCounters {
    pub get_metadata_count: AtomicUsize,
    pub get_all_metadata_count: AtomicUsize,
    pub read_payload_count: AtomicUsize,
    pub write_count: AtomicUsize,
    pub delete_count: AtomicUsize,
    pub delete_all_count: AtomicUsize,
}

impl StoreCounters {
    pub fn get_metadata_count(&self) -> usize {
        self.get_metadata_count.load(Ordering::SeqCst)
    }

    pub fn get_all_metadata_count(&self) -> usize {
        self.get_all_metadata_count.load(Ordering::SeqCst)
    }

    pub fn read_payload_count(&self) -> usize {
        self.read_payload_count.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.write_count.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.delete_count.load(Ordering::SeqCst)
    }

    pub fn delete_all_count(&self) -> usize {
        self.delete_all_count.load(Ordering::SeqCst)
    }

    /// Total number of store calls of any kind.
    pub fn total(&self) -> usize {
        self.get_metadata_count()
            + self.get_all_metadata_count()
            + self.read_payload_count()
            + self.write_count()
            + self.delete_count()
            + self.delete_all_count()
    }

    pub fn reset(&self) {
        self.get_metadata_count.store(0, Ordering::SeqCst);
        self.get_all_metadata_count.store(0, Ordering::SeqCst);
        self.read_payload_count.store(0, Ordering::SeqCst);
        self.write_count.store(0, Ordering::SeqCst);
        self.delete_count.store(0, Ordering::SeqCst);
        self.delete_all_count.store(0, Ordering::SeqCst);
    }
}

/// [`MemoryStore`] that counts every call.
#[derive(Clone, Debug, Default)]
pub struct CountingStore {
    pub memory: MemoryStore,
    pub counters: Arc<StoreCounters>,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes an entry directly, bypassing the counters.
    pub async fn seed(&self, metadata: CacheEntryMetadata, payload: impl Into<Raw>) {
        self.memory
            .write_payload(metadata, payload.into())
            .await
            .expect("memory store never fails");
    }

    pub fn entry(&self, name: &str) -> Option<StoredEntry> {
        self.memory.get_entry(&UniqueName::from(name))
    }

    pub fn entry_count(&self) -> usize {
        self.memory.len()
    }
}

#[async_trait]
impl PersistentStore for CountingStore {
    async fn get_metadata(&self, name: &UniqueName) -> StoreResult<Option<CacheEntryMetadata>> {
        self.counters.get_metadata_count.fetch_add(1, Ordering::SeqCst);
        self.memory.get_metadata(name).await
    }

    async fn get_all_metadata(&self) -> StoreResult<Vec<CacheEntryMetadata>> {
        self.counters
            .get_all_metadata_count
            .fetch_add(1, Ordering::SeqCst);
        self.memory.get_all_metadata().await
    }

    async fn read_payload(&self, name: &UniqueName) -> StoreResult<Option<Raw>> {
        self.counters.read_payload_count.fetch_add(1, Ordering::SeqCst);
        self.memory.read_payload(name).await
    }

    async fn write_payload(&self, metadata: CacheEntryMetadata, payload: Raw) -> StoreResult<()> {
        self.counters.write_count.fetch_add(1, Ordering::SeqCst);
        self.memory.write_payload(metadata, payload).await
    }

    async fn delete(&self, name: &UniqueName) -> StoreResult<DeleteStatus> {
        self.counters.delete_count.fetch_add(1, Ordering::SeqCst);
        self.memory.delete(name).await
    }

    async fn delete_all(&self) -> StoreResult<()> {
        self.counters.delete_all_count.fetch_add(1, Ordering::SeqCst);
        self.memory.delete_all().await
    }

    fn name(&self) -> &str {
        "counting"
    }
}

#[derive(Debug, Default)]
struct Faults {
    reads: AtomicBool,
    writes: AtomicBool,
    deletes: AtomicBool,
}

/// [`MemoryStore`] whose operations fail on demand with an I/O error.
#[derive(Clone, Debug, Default)]
pub struct FailingStore {
    pub memory: MemoryStore,
    faults: Arc<Faults>,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `get_metadata`, `get_all_metadata` and `read_payload` fail.
    pub fn fail_reads(&self, fail: bool) {
        self.faults.reads.store(fail, Ordering::SeqCst);
    }

    /// `write_payload` fails.
    pub fn fail_writes(&self, fail: bool) {
        self.faults.writes.store(fail, Ordering::SeqCst);
    }

    /// `delete` and `delete_all` fail.
    pub fn fail_deletes(&self, fail: bool) {
        self.faults.deletes.store(fail, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool, operation: &str) -> StoreResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Io(io::Error::other(format!(
                "injected {operation} failure"
            ))));
        }
        Ok(())
    }
}

#[async_trait]
impl PersistentStore for FailingStore {
    async fn get_metadata(&self, name: &UniqueName) -> StoreResult<Option<CacheEntryMetadata>> {
        Self::check(&self.faults.reads, "read")?;
        self.memory.get_metadata(name).await
    }

    async fn get_all_metadata(&self) -> StoreResult<Vec<CacheEntryMetadata>> {
        Self::check(&self.faults.reads, "read")?;
        self.memory.get_all_metadata().await
    }

    async fn read_payload(&self, name: &UniqueName) -> StoreResult<Option<Raw>> {
        Self::check(&self.faults.reads, "read")?;
        self.memory.read_payload(name).await
    }

    async fn write_payload(&self, metadata: CacheEntryMetadata, payload: Raw) -> StoreResult<()> {
        Self::check(&self.faults.writes, "write")?;
        self.memory.write_payload(metadata, payload).await
    }

    async fn delete(&self, name: &UniqueName) -> StoreResult<DeleteStatus> {
        Self::check(&self.faults.deletes, "delete")?;
        self.memory.delete(name).await
    }

    async fn delete_all(&self) -> StoreResult<()> {
        Self::check(&self.faults.deletes, "delete")?;
        self.memory.delete_all().await
    }

    fn name(&self) -> &str {
        "failing"
    }
}
