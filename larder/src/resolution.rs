//! Delivery of resolved objects.
//!
//! A resolve call delivers at most two events, in order:
//!
//! | Variant | First event | Second event |
//! |---------|-------------|--------------|
//! | [`Resolution::Ready`] | cached object | - |
//! | [`Resolution::Refreshing`] | cached object | outcome of the refresh |
//! | [`Resolution::Pending`] | outcome of the fetch | - |

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::{BoxFuture, Shared};
use pin_project::pin_project;

use crate::CacheError;

pub(crate) type SharedOutcome<T> = Shared<BoxFuture<'static, Result<T, CacheError>>>;

/// Outcome of [`CacheOrchestrator::resolve`](crate::CacheOrchestrator::resolve).
pub enum Resolution<T> {
    /// A cached object, no fetch started.
    Ready(T),
    /// A stale cached object; a refresh is running.
    Refreshing {
        /// The cached object, delivered first.
        cached: T,
        /// Completes with the refreshed object.
        refresh: Pending<T>,
    },
    /// No acceptable cached object; completes once the fetch settles.
    Pending(Pending<T>),
}

impl<T> Resolution<T> {
    /// Returns the object available without waiting, if any.
    pub fn cached(&self) -> Option<&T> {
        match self {
            Resolution::Ready(cached) | Resolution::Refreshing { cached, .. } => Some(cached),
            Resolution::Pending(_) => None,
        }
    }

    /// Returns `true` if no fetch is involved.
    pub fn is_ready(&self) -> bool {
        matches!(self, Resolution::Ready(_))
    }

    /// Splits into the immediate object and the pending outcome.
    pub fn into_parts(self) -> (Option<T>, Option<Pending<T>>) {
        match self {
            Resolution::Ready(cached) => (Some(cached), None),
            Resolution::Refreshing { cached, refresh } => (Some(cached), Some(refresh)),
            Resolution::Pending(pending) => (None, Some(pending)),
        }
    }
}

impl<T: Clone> Resolution<T> {
    /// Waits for the most recent object.
    ///
    /// A failed refresh is returned as an error even though a cached object
    /// was available.
    pub async fn latest(self) -> Result<T, CacheError> {
        match self {
            Resolution::Ready(cached) => Ok(cached),
            Resolution::Refreshing { refresh, .. } => refresh.await,
            Resolution::Pending(pending) => pending.await,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Resolution<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Ready(cached) => f.debug_tuple("Ready").field(cached).finish(),
            Resolution::Refreshing { cached, .. } => f
                .debug_struct("Refreshing")
                .field("cached", cached)
                .finish_non_exhaustive(),
            Resolution::Pending(_) => f.debug_tuple("Pending").finish(),
        }
    }
}

/// Outcome of an in-flight fetch.
///
/// Every caller attached to the same fetch holds its own `Pending`. Dropping
/// it detaches this caller only; the fetch still runs to completion.
#[pin_project]
#[must_use = "dropping a Pending detaches from the fetch outcome"]
pub struct Pending<T> {
    #[pin]
    outcome: SharedOutcome<T>,
}

impl<T> Pending<T> {
    pub(crate) fn new(outcome: SharedOutcome<T>) -> Self {
        Self { outcome }
    }
}

impl<T: Clone> Future for Pending<T> {
    type Output = Result<T, CacheError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.project().outcome.poll(cx)
    }
}

impl<T> fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending").finish_non_exhaustive()
    }
}
