use bincode::error::{DecodeError, EncodeError};
use feoxdb::FeoxError;
use larder_store::StoreError;
use thiserror::Error;

/// Errors that can occur when using [`FeOxDbStore`](crate::FeOxDbStore).
#[derive(Debug, Error)]
pub enum FeOxDbError {
    /// An error from the underlying FeOxDB database.
    #[error("FeOxDB error: {0}")]
    FeOxDb(#[from] FeoxError),

    /// Failed to serialize an entry record.
    #[error("Serialization error: {0}")]
    Serialization(#[from] EncodeError),

    /// Failed to deserialize an entry record.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] DecodeError),

    /// An I/O error occurred while accessing the database file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored generation counter is not a little-endian `u64`.
    #[error("corrupt generation record: expected 8 bytes, found {0}")]
    CorruptGeneration(usize),

    /// A blocking store task was cancelled or panicked.
    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<FeOxDbError> for StoreError {
    fn from(error: FeOxDbError) -> Self {
        match error {
            FeOxDbError::Io(e) => StoreError::Io(e),
            e @ (FeOxDbError::Serialization(_) | FeOxDbError::Deserialization(_)) => {
                StoreError::encoding(e)
            }
            e => StoreError::backend(e),
        }
    }
}
