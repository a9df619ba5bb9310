//! Type-keyed registry of codecs and policies.

use std::any::{Any, TypeId};
use std::sync::Arc;

use dashmap::{DashMap, Entry};
use larder_core::{CachePolicy, ObjectCodec};
use tokio::sync::Notify;

use crate::inflight::InFlight;

/// Everything the orchestrator knows about one object type.
pub(crate) struct Registration<C: ObjectCodec> {
    pub(crate) codec: C,
    pub(crate) policy: CachePolicy,
    pub(crate) in_flight: InFlight<C::Object>,
}

/// Object-safe view of a [`Registration`].
trait AnyRegistration: Send + Sync {
    fn in_flight_count(&self) -> usize;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<C: ObjectCodec> AnyRegistration for Registration<C> {
    fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[derive(Default)]
pub(crate) struct Registry {
    types: DashMap<TypeId, Arc<dyn AnyRegistration>>,
    idle: Arc<Notify>,
}

impl Registry {
    /// Registers `C`, replacing any earlier registration of the same type.
    ///
    /// The replacement keeps the in-flight table of the earlier registration,
    /// so fetches already running stay attachable.
    pub(crate) fn register<C: ObjectCodec>(&self, codec: C, policy: CachePolicy) {
        match self.types.entry(TypeId::of::<C>()) {
            Entry::Occupied(mut entry) => {
                let in_flight = entry
                    .get()
                    .clone()
                    .into_any()
                    .downcast::<Registration<C>>()
                    .map(|previous| previous.in_flight.clone())
                    .unwrap_or_else(|_| InFlight::new(self.idle.clone()));
                entry.insert(Arc::new(Registration {
                    codec,
                    policy,
                    in_flight,
                }));
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(Registration {
                    codec,
                    policy,
                    in_flight: InFlight::new(self.idle.clone()),
                }));
            }
        }
    }

    /// Notified whenever an in-flight fetch of any type is released.
    pub(crate) fn idle(&self) -> &Notify {
        &self.idle
    }

    pub(crate) fn get<C: ObjectCodec>(&self) -> Option<Arc<Registration<C>>> {
        let registration = self.types.get(&TypeId::of::<C>())?.value().clone();
        registration.into_any().downcast::<Registration<C>>().ok()
    }

    /// Fetches in flight across every registered type.
    pub(crate) fn in_flight_count(&self) -> usize {
        self.types
            .iter()
            .map(|registration| registration.in_flight_count())
            .sum()
    }

    pub(crate) fn len(&self) -> usize {
        self.types.len()
    }
}
