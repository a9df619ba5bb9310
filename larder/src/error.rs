use std::sync::Arc;

use larder_core::{FetchError, MalformedDataError};
use larder_store::StoreError;
use smol_str::SmolStr;
use thiserror::Error;

/// Error reported to callers of the orchestrator.
///
/// Cloneable: one outcome of an in-flight fetch is handed to every caller
/// attached to it.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The persistent store failed.
    #[error("store error: {0}")]
    Store(#[source] Arc<StoreError>),

    /// The fetch collaborator failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Freshly fetched bytes could not be decoded.
    #[error(transparent)]
    Malformed(#[from] MalformedDataError),

    /// No codec is registered for the requested type.
    #[error("no codec registered for `{0}`")]
    UnregisteredType(&'static str),

    /// The fetch task panicked or was cancelled by the runtime.
    #[error("fetch task aborted: {0}")]
    Aborted(SmolStr),
}

impl From<StoreError> for CacheError {
    fn from(error: StoreError) -> Self {
        CacheError::Store(Arc::new(error))
    }
}

impl From<tokio::task::JoinError> for CacheError {
    fn from(error: tokio::task::JoinError) -> Self {
        CacheError::Aborted(SmolStr::new(error.to_string()))
    }
}
