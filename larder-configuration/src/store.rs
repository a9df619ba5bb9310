use std::sync::Arc;

use bytesize::ByteSize;
use larder_store::{MemoryStore, PersistentStore};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Settings of the FeOxDB store.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct FeOxDb {
    /// Database file or directory. Memory-only when absent.
    #[serde(default)]
    pub path: Option<String>,
    /// RAM limit, e.g. `64 MiB`.
    #[serde(default)]
    pub max_memory: Option<ByteSize>,
    /// Pre-allocated file size, e.g. `1 GiB`.
    #[serde(default)]
    pub max_file_size: Option<ByteSize>,
}

/// Which [`PersistentStore`] backs the cache.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum StoreConfig {
    /// In-process store; nothing survives a restart.
    #[default]
    Memory,
    /// Embedded FeOxDB store (requires the `feoxdb` feature).
    FeOxDb(FeOxDb),
}

impl StoreConfig {
    /// Opens the configured store.
    pub fn into_store(self) -> Result<Arc<dyn PersistentStore>, ConfigError> {
        match self {
            StoreConfig::Memory => Ok(Arc::new(MemoryStore::new())),
            #[cfg(feature = "feoxdb")]
            StoreConfig::FeOxDb(config) => {
                use larder_feoxdb::FeOxDbStore;

                let mut builder = FeOxDbStore::builder();
                if let Some(path) = config.path {
                    builder = builder.path(path);
                }
                if let Some(max_memory) = config.max_memory {
                    let max_memory = usize::try_from(max_memory.as_u64()).unwrap_or(usize::MAX);
                    builder = builder.max_memory(max_memory);
                }
                if let Some(max_file_size) = config.max_file_size {
                    builder = builder.max_file_size(max_file_size.as_u64());
                }

                let store = builder
                    .build()
                    .map_err(|e| ConfigError::StoreNotAvailable(format!("FeOxDb: {}", e)))?;

                Ok(Arc::new(store))
            }
            #[cfg(not(feature = "feoxdb"))]
            StoreConfig::FeOxDb(_) => Err(ConfigError::StoreNotAvailable("FeOxDb".to_string())),
        }
    }
}
