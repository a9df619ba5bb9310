//! The cache orchestrator.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use larder_core::{
    Action, CacheEntryMetadata, CachePolicy, FetchRequest, ObjectCodec, UniqueName, decide,
};
use larder_store::{DeleteStatus, PersistentStore};
use tracing::{Instrument, debug, info_span, warn};

use crate::inflight::{Attachment, InFlightSlot};
use crate::metrics::{self, Event};
use crate::registry::{Registration, Registry};
use crate::{CacheError, OrchestratorConfig, Pending, Resolution};

/// How a fetch was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchMode {
    /// A caller waits for the outcome.
    Blocking,
    /// Callers already hold a stale object.
    Refresh,
}

struct Inner<S> {
    store: S,
    config: OrchestratorConfig,
    registry: Registry,
}

/// Resolves objects from the store or through their fetch collaborator,
/// according to the policy of their type.
///
/// Cloning is cheap; clones share the store, the registry and the in-flight
/// table. Fetches run on the Tokio runtime, so resolve from within one.
pub struct CacheOrchestrator<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for CacheOrchestrator<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: PersistentStore> fmt::Debug for CacheOrchestrator<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheOrchestrator")
            .field("store", &self.inner.store.name())
            .field("config", &self.inner.config)
            .field("registered_types", &self.inner.registry.len())
            .field("in_flight", &self.inner.registry.in_flight_count())
            .finish()
    }
}

impl<S> CacheOrchestrator<S>
where
    S: PersistentStore + 'static,
{
    /// Creates an orchestrator with the default configuration.
    pub fn new(store: S) -> Self {
        Self::with_config(store, OrchestratorConfig::default())
    }

    /// Creates an orchestrator with an explicit configuration.
    pub fn with_config(store: S, config: OrchestratorConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                config,
                registry: Registry::default(),
            }),
        }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    /// Returns the configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    /// Attaches a codec and its policy to the codec type `C`.
    ///
    /// Registering `C` again replaces the earlier registration. Fetches
    /// already running finish under the old one, and requests for their
    /// objects keep attaching to them.
    pub fn register<C: ObjectCodec>(&self, codec: C, policy: CachePolicy) {
        debug!(type_name = codec.type_name(), ?policy, "registered object type");
        self.inner.registry.register(codec, policy);
    }

    /// Returns `true` if `C` is registered.
    pub fn is_registered<C: ObjectCodec>(&self) -> bool {
        self.inner.registry.get::<C>().is_some()
    }

    /// Resolves the object of type `C` identified by `identity`.
    ///
    /// Only [`CacheError::UnregisteredType`] is returned directly. Store read
    /// failures degrade to "nothing cached"; fetch and decode failures are
    /// delivered through the returned [`Pending`].
    pub async fn resolve<C: ObjectCodec>(
        &self,
        identity: C::Identity,
    ) -> Result<Resolution<C::Object>, CacheError> {
        let registration = self.registration::<C>()?;
        let codec = &registration.codec;
        let type_name = codec.type_name();
        let name = codec.unique_name(&identity);

        if let Some(pending) = registration.in_flight.attach(&name) {
            debug!(unique_name = %name, "attached to in-flight fetch");
            metrics::record(Event::FetchDeduplicated, type_name);
            return Ok(Resolution::Pending(pending));
        }

        let metadata = if registration.policy.uses_store() {
            self.read_metadata(&name, type_name).await
        } else {
            None
        };
        let action = decide(&registration.policy, metadata.as_ref(), Utc::now());
        debug!(unique_name = %name, action = action.as_str(), "policy decision");

        if let Some(metadata) = metadata.filter(|_| action.serves_cached())
            && let Some(cached) = self
                .read_cached(&registration, &identity, &name, &metadata)
                .await
        {
            if action == Action::ServeCached {
                metrics::record(Event::Hit, type_name);
                return Ok(Resolution::Ready(cached));
            }
            metrics::record(Event::Stale, type_name);
            let refresh = self.start_fetch(&registration, identity, &name, FetchMode::Refresh);
            return Ok(Resolution::Refreshing { cached, refresh });
        }

        metrics::record(Event::Miss, type_name);
        let pending = self.start_fetch(&registration, identity, &name, FetchMode::Blocking);
        Ok(Resolution::Pending(pending))
    }

    /// Callback form of [`resolve`](Self::resolve).
    ///
    /// A cached object is handed to `on_success` before this returns. The
    /// outcome of a fetch is delivered later from a spawned task, so
    /// `on_success` may run twice when a stale object is being refreshed.
    /// Registration errors and failed fetches go to `on_failure`.
    pub async fn resolve_with<C, F, E>(&self, identity: C::Identity, mut on_success: F, on_failure: E)
    where
        C: ObjectCodec,
        F: FnMut(C::Object) + Send + 'static,
        E: FnOnce(CacheError) + Send + 'static,
    {
        let (cached, pending) = match self.resolve::<C>(identity).await {
            Ok(resolution) => resolution.into_parts(),
            Err(error) => {
                on_failure(error);
                return;
            }
        };
        if let Some(cached) = cached {
            on_success(cached);
        }
        if let Some(pending) = pending {
            tokio::spawn(async move {
                match pending.await {
                    Ok(object) => on_success(object),
                    Err(error) => on_failure(error),
                }
            });
        }
    }

    /// Deletes the entry of `identity`. A running fetch is not cancelled.
    pub async fn invalidate<C: ObjectCodec>(
        &self,
        identity: &C::Identity,
    ) -> Result<DeleteStatus, CacheError> {
        let registration = self.registration::<C>()?;
        let name = registration.codec.unique_name(identity);
        let status = self.inner.store.delete(&name).await?;
        debug!(unique_name = %name, ?status, "invalidated entry");
        Ok(status)
    }

    /// Deletes every entry of every type.
    pub async fn clear(&self) -> Result<(), CacheError> {
        self.inner.store.delete_all().await?;
        debug!(store = self.inner.store.name(), "cleared store");
        Ok(())
    }

    /// Lists the metadata of every persisted entry, in no particular order.
    pub async fn entries(&self) -> Result<Vec<CacheEntryMetadata>, CacheError> {
        Ok(self.inner.store.get_all_metadata().await?)
    }

    /// Deletes entries whose own expiration has passed at `now`.
    ///
    /// Returns the number of deleted entries. Failed deletes are logged and
    /// skipped.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, CacheError> {
        let mut purged = 0;
        for metadata in self.entries().await? {
            if !metadata.expiration_time.is_passed(now) {
                continue;
            }
            match self.inner.store.delete(&metadata.unique_name).await {
                Ok(DeleteStatus::Deleted(_)) => purged += 1,
                Ok(DeleteStatus::Missing) => {}
                Err(error) => {
                    warn!(unique_name = %metadata.unique_name, %error, "failed to purge expired entry");
                    metrics::record(Event::StoreError, metadata.unique_name.type_name());
                }
            }
        }
        debug!(purged, "purged expired entries");
        Ok(purged)
    }

    /// Number of fetches currently in flight, across all types.
    pub fn in_flight_count(&self) -> usize {
        self.inner.registry.in_flight_count()
    }

    /// Waits until no fetch is in flight.
    ///
    /// Fetches started while waiting are waited for too.
    pub async fn wait_idle(&self) {
        let idle = self.inner.registry.idle();
        loop {
            let notified = idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.in_flight_count() == 0 {
                break;
            }
            notified.await;
        }
    }

    fn registration<C: ObjectCodec>(&self) -> Result<Arc<Registration<C>>, CacheError> {
        self.inner
            .registry
            .get::<C>()
            .ok_or(CacheError::UnregisteredType(std::any::type_name::<C>()))
    }

    async fn read_metadata(&self, name: &UniqueName, type_name: &str) -> Option<CacheEntryMetadata> {
        match self.inner.store.get_metadata(name).await {
            Ok(metadata) => metadata,
            Err(error) => {
                warn!(unique_name = %name, %error, "failed to read cached metadata");
                metrics::record(Event::StoreError, type_name);
                None
            }
        }
    }

    /// Reads and decodes the cached object.
    ///
    /// A payload the codec rejects is deleted; `None` then sends the caller
    /// down the fetch path as if nothing was cached.
    async fn read_cached<C: ObjectCodec>(
        &self,
        registration: &Registration<C>,
        identity: &C::Identity,
        name: &UniqueName,
        metadata: &CacheEntryMetadata,
    ) -> Option<C::Object> {
        let codec = &registration.codec;
        let bytes = match self.inner.store.read_payload(name).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!(unique_name = %name, "metadata without payload");
                return None;
            }
            Err(error) => {
                warn!(unique_name = %name, %error, "failed to read cached payload");
                metrics::record(Event::StoreError, codec.type_name());
                return None;
            }
        };

        let decoded = if metadata.is_optimized {
            codec.deserialize_optimized(identity, &bytes)
        } else {
            codec.deserialize(identity, &bytes)
        };
        match decoded {
            Ok(object) => Some(object),
            Err(error) => {
                warn!(unique_name = %name, %error, "evicting malformed cached payload");
                metrics::record(Event::MalformedEviction, codec.type_name());
                if let Err(error) = self.inner.store.delete(name).await {
                    warn!(unique_name = %name, %error, "failed to evict malformed cached payload");
                    metrics::record(Event::StoreError, codec.type_name());
                }
                None
            }
        }
    }

    fn start_fetch<C: ObjectCodec>(
        &self,
        registration: &Arc<Registration<C>>,
        identity: C::Identity,
        name: &UniqueName,
        mode: FetchMode,
    ) -> Pending<C::Object> {
        let attachment = registration.in_flight.attach_or_start(name, |slot| {
            let request = registration.codec.build_fetch_request(&identity);
            let span = info_span!(
                "larder.fetch",
                unique_name = %name,
                mode = ?mode,
            );
            let task = tokio::spawn(
                self.inner
                    .clone()
                    .run_fetch(registration.clone(), identity, name.clone(), request, mode, slot)
                    .instrument(span),
            );
            async move {
                match task.await {
                    Ok(outcome) => outcome,
                    Err(error) => Err(CacheError::from(error)),
                }
            }
            .boxed()
        });

        let type_name = registration.codec.type_name();
        match attachment {
            Attachment::Started(pending) => {
                metrics::record(Event::FetchStarted, type_name);
                pending
            }
            Attachment::Attached(pending) => {
                debug!(unique_name = %name, "attached to in-flight fetch");
                metrics::record(Event::FetchDeduplicated, type_name);
                pending
            }
        }
    }
}

impl<S> Inner<S>
where
    S: PersistentStore + 'static,
{
    /// Body of a fetch task.
    ///
    /// The in-flight entry is released after persisting and before the
    /// outcome reaches any caller.
    async fn run_fetch<C: ObjectCodec>(
        self: Arc<Self>,
        registration: Arc<Registration<C>>,
        identity: C::Identity,
        name: UniqueName,
        request: C::Request,
        mode: FetchMode,
        slot: InFlightSlot<C::Object>,
    ) -> Result<C::Object, CacheError> {
        let outcome = self
            .fetch_and_store(&registration, &identity, &name, request)
            .await;
        if let Err(error) = &outcome {
            metrics::record(Event::FetchFailed, registration.codec.type_name());
            match mode {
                FetchMode::Refresh => warn!(%error, "background refresh failed"),
                FetchMode::Blocking => debug!(%error, "fetch failed"),
            }
        }
        drop(slot);
        outcome
    }

    async fn fetch_and_store<C: ObjectCodec>(
        &self,
        registration: &Registration<C>,
        identity: &C::Identity,
        name: &UniqueName,
        request: C::Request,
    ) -> Result<C::Object, CacheError> {
        let codec = &registration.codec;
        let bytes = request.fetch().await?;
        let object = codec.deserialize(identity, &bytes)?;

        if registration.policy.uses_store() {
            let now = Utc::now();
            let optimized = codec.optimize(identity, &object);
            let metadata = CacheEntryMetadata::new(name.clone(), now)
                .with_expiration(codec.expiration(identity, &object, now))
                .optimized(optimized.is_some());
            match self
                .store
                .write_payload(metadata, optimized.unwrap_or(bytes))
                .await
            {
                Ok(()) => debug!("persisted fetched object"),
                Err(error) => {
                    warn!(%error, "failed to persist fetched object");
                    metrics::record(Event::StoreError, codec.type_name());
                }
            }
        } else if self.config.purges_on_no_cache() {
            match self.store.delete(name).await {
                Ok(DeleteStatus::Deleted(_)) => debug!("purged leftover entry of uncached type"),
                Ok(DeleteStatus::Missing) => {}
                Err(error) => {
                    warn!(%error, "failed to purge leftover entry of uncached type");
                    metrics::record(Event::StoreError, codec.type_name());
                }
            }
        }

        Ok(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use larder_core::{BoxFetchFuture, MalformedDataError, Raw};
    use larder_store::MemoryStore;
    use std::time::Duration;

    struct Echo(&'static str);

    impl ObjectCodec for Echo {
        type Identity = String;
        type Object = String;
        type Request = BoxFetchFuture;

        fn type_name(&self) -> &str {
            "echo"
        }

        fn build_fetch_request(&self, identity: &String) -> BoxFetchFuture {
            let body = format!("{}{identity}", self.0);
            Box::pin(async move { Ok(Raw::from(body)) })
        }

        fn deserialize(&self, _identity: &String, bytes: &Raw) -> Result<String, MalformedDataError> {
            String::from_utf8(bytes.to_vec()).map_err(|e| MalformedDataError::with_source("utf-8", e))
        }
    }

    #[tokio::test]
    async fn unregistered_type_is_rejected() {
        let orchestrator = CacheOrchestrator::new(MemoryStore::new());
        let result = orchestrator.resolve::<Echo>("a".to_owned()).await;
        assert!(matches!(result, Err(CacheError::UnregisteredType(_))));
        assert!(!orchestrator.is_registered::<Echo>());
    }

    #[tokio::test]
    async fn registering_again_replaces_codec_and_policy() {
        let orchestrator = CacheOrchestrator::new(MemoryStore::new());
        orchestrator.register(Echo("first:"), CachePolicy::Forever);
        orchestrator.register(Echo("second:"), CachePolicy::NoCache);

        let object = orchestrator
            .resolve::<Echo>("a".to_owned())
            .await
            .unwrap()
            .latest()
            .await
            .unwrap();

        assert_eq!(object, "second:a");
        assert!(orchestrator.store().is_empty());
    }

    #[tokio::test]
    async fn fetched_object_is_served_from_store_next_time() {
        let orchestrator = CacheOrchestrator::new(MemoryStore::new());
        orchestrator.register(Echo("hello "), CachePolicy::Forever);

        let first = orchestrator.resolve::<Echo>("world".to_owned()).await.unwrap();
        assert!(!first.is_ready());
        assert_eq!(first.latest().await.unwrap(), "hello world");
        orchestrator.wait_idle().await;

        let second = orchestrator.resolve::<Echo>("world".to_owned()).await.unwrap();
        assert_eq!(second.cached().map(String::as_str), Some("hello world"));
        assert!(second.is_ready());

        let entry = orchestrator
            .store()
            .get_entry(&UniqueName::from("echo:id=world"))
            .unwrap();
        assert_eq!(entry.payload, Bytes::from_static(b"hello world"));
        assert!(!entry.metadata.is_optimized);
    }

    struct Panicky;

    impl ObjectCodec for Panicky {
        type Identity = String;
        type Object = String;
        type Request = BoxFetchFuture;

        fn type_name(&self) -> &str {
            "panicky"
        }

        fn build_fetch_request(&self, _identity: &String) -> BoxFetchFuture {
            panic!("request builder panicked");
        }

        fn deserialize(&self, _identity: &String, _bytes: &Raw) -> Result<String, MalformedDataError> {
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn panicking_request_builder_does_not_block_the_key() {
        let orchestrator = CacheOrchestrator::new(MemoryStore::new());
        orchestrator.register(Panicky, CachePolicy::Forever);

        for _ in 0..2 {
            let outcome = tokio::time::timeout(Duration::from_secs(5), async {
                orchestrator
                    .resolve::<Panicky>("a".to_owned())
                    .await
                    .unwrap()
                    .latest()
                    .await
            })
            .await
            .expect("resolve must not hang");
            assert!(matches!(outcome, Err(CacheError::Aborted(_))));
            assert_eq!(orchestrator.in_flight_count(), 0);
        }
    }
}
