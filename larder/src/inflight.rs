//! Table of in-flight fetches.
//!
//! One fetch per [`UniqueName`] at a time: callers arriving while a fetch
//! runs attach to its shared outcome instead of starting another.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::{DashMap, Entry};
use futures::FutureExt;
use futures::future::BoxFuture;
use larder_core::UniqueName;
use smol_str::SmolStr;
use tokio::sync::{Notify, oneshot};

use crate::CacheError;
use crate::resolution::{Pending, SharedOutcome};

type FetchFuture<T> = BoxFuture<'static, Result<T, CacheError>>;

struct InFlightEntry<T> {
    id: u64,
    outcome: SharedOutcome<T>,
}

struct InFlightInner<T> {
    tasks: DashMap<UniqueName, InFlightEntry<T>>,
    id_counter: AtomicU64,
    idle: Arc<Notify>,
}

/// Shared handle to the table; clones see the same entries.
pub(crate) struct InFlight<T> {
    inner: Arc<InFlightInner<T>>,
}

impl<T> Clone for InFlight<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for InFlight<T> {
    fn default() -> Self {
        Self::new(Arc::new(Notify::new()))
    }
}

/// Whether [`InFlight::attach_or_start`] started a new fetch.
pub(crate) enum Attachment<T> {
    Started(Pending<T>),
    Attached(Pending<T>),
}

#[cfg(test)]
impl<T> Attachment<T> {
    fn into_pending(self) -> Pending<T> {
        match self {
            Attachment::Started(pending) | Attachment::Attached(pending) => pending,
        }
    }
}

impl<T> InFlight<T> {
    /// Creates an empty table; `idle` is notified whenever an entry is removed.
    pub(crate) fn new(idle: Arc<Notify>) -> Self {
        Self {
            inner: Arc::new(InFlightInner {
                tasks: DashMap::new(),
                id_counter: AtomicU64::new(0),
                idle,
            }),
        }
    }

    /// Number of fetches currently running.
    pub(crate) fn len(&self) -> usize {
        self.inner.tasks.len()
    }
}

impl<T> InFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Attaches to the fetch running for `name`, if any.
    pub(crate) fn attach(&self, name: &UniqueName) -> Option<Pending<T>> {
        self.inner
            .tasks
            .get(name)
            .map(|entry| Pending::new(entry.outcome.clone()))
    }

    /// Attaches to the fetch running for `name`, or starts one with `start`.
    ///
    /// The entry is reserved first and `start` runs after the table lock is
    /// released. `start` receives the slot that must be dropped once the
    /// outcome is final. If `start` panics, the entry is removed and every
    /// attached caller sees [`CacheError::Aborted`].
    pub(crate) fn attach_or_start<F>(&self, name: &UniqueName, start: F) -> Attachment<T>
    where
        F: FnOnce(InFlightSlot<T>) -> FetchFuture<T>,
    {
        let (fetch_tx, fetch_rx) = oneshot::channel::<FetchFuture<T>>();
        let (id, outcome) = match self.inner.tasks.entry(name.clone()) {
            Entry::Occupied(entry) => {
                return Attachment::Attached(Pending::new(entry.get().outcome.clone()));
            }
            Entry::Vacant(entry) => {
                let id = self.inner.id_counter.fetch_add(1, Ordering::Relaxed);
                let outcome = async move {
                    match fetch_rx.await {
                        Ok(fetch) => fetch.await,
                        Err(_) => Err(CacheError::Aborted(SmolStr::new_static(
                            "fetch could not be started",
                        ))),
                    }
                }
                .boxed()
                .shared();
                entry.insert(InFlightEntry {
                    id,
                    outcome: outcome.clone(),
                });
                (id, outcome)
            }
        };

        let slot = InFlightSlot {
            table: self.clone(),
            name: name.clone(),
            id,
        };
        if let Ok(fetch) = panic::catch_unwind(AssertUnwindSafe(|| start(slot))) {
            let _ = fetch_tx.send(fetch);
        }
        Attachment::Started(Pending::new(outcome))
    }
}

/// Ownership of one table entry; the entry is removed when dropped.
///
/// Dropped even if the fetch task panics, so the key never stays blocked.
pub(crate) struct InFlightSlot<T> {
    table: InFlight<T>,
    name: UniqueName,
    id: u64,
}

impl<T> Drop for InFlightSlot<T> {
    fn drop(&mut self) {
        let id = self.id;
        let inner = &self.table.inner;
        inner.tasks.remove_if(&self.name, |_, entry| entry.id == id);
        inner.idle.notify_waiters();
    }
}
