use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, TimeDelta, Utc};
use larder_core::{
    BoxFetchFuture, Expiration, FetchError, MalformedDataError, ObjectCodec, Raw,
};
use tokio::sync::Semaphore;

/// Payload prefix the scripted codec refuses to decode.
pub const MALFORMED: &str = "malformed";

const OPTIMIZED_PREFIX: &str = "opt:";

type Responder = dyn Fn(&str, usize) -> Result<Raw, FetchError> + Send + Sync;

#[derive(Default)]
struct CodecCounters {
    fetch_count: AtomicUsize,
    decode_count: AtomicUsize,
    optimized_decode_count: AtomicUsize,
}

struct CodecState {
    type_name: &'static str,
    counters: CodecCounters,
    responder: Mutex<Arc<Responder>>,
    gate: Option<Arc<Semaphore>>,
    expires_in: Mutex<Option<TimeDelta>>,
    optimize: bool,
}

/// Codec of `String` objects identified by `String`s, with a scripted fetch.
///
/// By default the n-th fetch of identity `id` yields `"{id}#{n}"`, so tests
/// can tell a refreshed object from a cached one. Clones share counters and
/// script, so a test can keep a clone after registering the codec.
#[derive(Clone)]
pub struct ScriptedCodec {
    state: Arc<CodecState>,
}

impl Default for ScriptedCodec {
    fn default() -> Self {
        Self::new("scripted")
    }
}

impl ScriptedCodec {
    pub fn new(type_name: &'static str) -> Self {
        Self::build(type_name, None, false)
    }

    /// Fetches wait until [`release`](Self::release) lets them through.
    pub fn gated(type_name: &'static str) -> Self {
        Self::build(type_name, Some(Arc::new(Semaphore::new(0))), false)
    }

    /// Persists `"opt:{object}"` instead of the fetched bytes.
    pub fn optimizing(type_name: &'static str) -> Self {
        Self::build(type_name, None, true)
    }

    fn build(type_name: &'static str, gate: Option<Arc<Semaphore>>, optimize: bool) -> Self {
        let responder: Arc<Responder> =
            Arc::new(|identity: &str, n: usize| Ok(Raw::from(format!("{identity}#{n}"))));
        Self {
            state: Arc::new(CodecState {
                type_name,
                counters: CodecCounters::default(),
                responder: Mutex::new(responder),
                gate,
                expires_in: Mutex::new(None),
                optimize,
            }),
        }
    }

    /// Replaces the fetch script. Receives the identity and the 1-based fetch number.
    pub fn respond_with<F>(&self, responder: F)
    where
        F: Fn(&str, usize) -> Result<Raw, FetchError> + Send + Sync + 'static,
    {
        *self.state.responder.lock().unwrap() = Arc::new(responder);
    }

    /// Every following fetch fails.
    pub fn fail_fetches(&self) {
        self.respond_with(|_, _| Err(FetchError::msg("scripted fetch failure")));
    }

    /// Every following fetch yields bytes the codec rejects.
    pub fn return_malformed(&self) {
        self.respond_with(|_, _| Ok(Raw::from_static(MALFORMED.as_bytes())));
    }

    /// Written entries expire `delta` after they are written.
    pub fn expire_after(&self, delta: TimeDelta) {
        *self.state.expires_in.lock().unwrap() = Some(delta);
    }

    /// Lets `n` gated fetches complete.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.state.gate {
            gate.add_permits(n);
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.state.counters.fetch_count.load(Ordering::SeqCst)
    }

    pub fn decode_count(&self) -> usize {
        self.state.counters.decode_count.load(Ordering::SeqCst)
    }

    pub fn optimized_decode_count(&self) -> usize {
        self.state.counters.optimized_decode_count.load(Ordering::SeqCst)
    }
}

impl ObjectCodec for ScriptedCodec {
    type Identity = String;
    type Object = String;
    type Request = BoxFetchFuture;

    fn type_name(&self) -> &str {
        self.state.type_name
    }

    fn build_fetch_request(&self, identity: &String) -> BoxFetchFuture {
        let n = self.state.counters.fetch_count.fetch_add(1, Ordering::SeqCst) + 1;
        let responder = self.state.responder.lock().unwrap().clone();
        let gate = self.state.gate.clone();
        let identity = identity.clone();
        Box::pin(async move {
            if let Some(gate) = gate {
                gate.acquire()
                    .await
                    .map_err(FetchError::transport)?
                    .forget();
            }
            responder(&identity, n)
        })
    }

    fn deserialize(&self, _identity: &String, bytes: &Raw) -> Result<String, MalformedDataError> {
        self.state.counters.decode_count.fetch_add(1, Ordering::SeqCst);
        let text = std::str::from_utf8(bytes)
            .map_err(|e| MalformedDataError::with_source("payload is not utf-8", e))?;
        if text.starts_with(MALFORMED) {
            return Err(MalformedDataError::new("scripted malformed payload"));
        }
        Ok(text.to_owned())
    }

    fn deserialize_optimized(
        &self,
        identity: &String,
        bytes: &Raw,
    ) -> Result<String, MalformedDataError> {
        self.state
            .counters
            .optimized_decode_count
            .fetch_add(1, Ordering::SeqCst);
        let stripped = bytes
            .strip_prefix(OPTIMIZED_PREFIX.as_bytes())
            .ok_or_else(|| MalformedDataError::new("missing optimized prefix"))?;
        self.deserialize(identity, &Raw::copy_from_slice(stripped))
    }

    fn optimize(&self, _identity: &String, object: &String) -> Option<Raw> {
        self.state
            .optimize
            .then(|| Raw::from(format!("{OPTIMIZED_PREFIX}{object}")))
    }

    fn expiration(&self, _identity: &String, _object: &String, now: DateTime<Utc>) -> Expiration {
        match *self.state.expires_in.lock().unwrap() {
            Some(delta) => Expiration::At(now + delta),
            None => Expiration::Never,
        }
    }
}
