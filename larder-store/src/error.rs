//! Error types for store operations.

use thiserror::Error;

/// Failure reading or writing persisted entries.
///
/// Readers treat any variant as "no cached value available"; writers
/// surface it to whoever triggered the write.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem or device I/O failed.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted record could not be encoded or decoded.
    #[error("store encoding error: {0}")]
    Encoding(Box<dyn std::error::Error + Send + Sync>),

    /// Any other backend-specific failure.
    #[error(transparent)]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Wraps a backend-specific error.
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StoreError::Backend(Box::new(error))
    }

    /// Wraps an encoding error.
    pub fn encoding<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StoreError::Encoding(Box::new(error))
    }
}
