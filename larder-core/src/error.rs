//! Errors raised by per-type collaborators.

use std::error::Error as StdError;
use std::sync::Arc;

use smol_str::SmolStr;
use thiserror::Error;

/// The external fetch collaborator failed.
///
/// Cloneable so a single failure can be handed to every caller attached to
/// the same in-flight fetch.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Failure described by a message only.
    #[error("fetch failed: {0}")]
    Message(SmolStr),
    /// Failure caused by the underlying transport.
    #[error(transparent)]
    Transport(Arc<dyn StdError + Send + Sync>),
}

impl FetchError {
    /// Creates an error from a message.
    pub fn msg(message: impl Into<SmolStr>) -> Self {
        FetchError::Message(message.into())
    }

    /// Wraps a transport error.
    pub fn transport<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        FetchError::Transport(Arc::new(error))
    }
}

/// A codec could not interpret a payload.
#[derive(Debug, Clone, Error)]
#[error("malformed payload: {reason}")]
pub struct MalformedDataError {
    reason: SmolStr,
    #[source]
    source: Option<Arc<dyn StdError + Send + Sync>>,
}

impl MalformedDataError {
    /// Creates an error with a reason only.
    pub fn new(reason: impl Into<SmolStr>) -> Self {
        Self {
            reason: reason.into(),
            source: None,
        }
    }

    /// Creates an error caused by a decoder error.
    pub fn with_source<E>(reason: impl Into<SmolStr>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            reason: reason.into(),
            source: Some(Arc::new(source)),
        }
    }

    /// Returns the reason.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}
