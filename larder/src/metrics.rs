//! Metrics declaration and recording.

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
lazy_static! {
    // Cache status metrics

    /// Track number of requests served from a fresh cached value.
    pub static ref CACHE_HIT_COUNTER: &'static str = {
        metrics::describe_counter!(
            "larder_cache_hit_total",
            "Total number of requests served from a fresh cached value."
        );
        "larder_cache_hit_total"
    };
    /// Track number of requests served stale while refreshing.
    pub static ref CACHE_STALE_COUNTER: &'static str = {
        metrics::describe_counter!(
            "larder_cache_stale_total",
            "Total number of requests served stale while a refresh runs."
        );
        "larder_cache_stale_total"
    };
    /// Track number of requests that had to wait for a fetch.
    pub static ref CACHE_MISS_COUNTER: &'static str = {
        metrics::describe_counter!(
            "larder_cache_miss_total",
            "Total number of requests that waited for a fetch."
        );
        "larder_cache_miss_total"
    };

    // Fetch metrics

    /// Track number of fetches started.
    pub static ref FETCH_STARTED_COUNTER: &'static str = {
        metrics::describe_counter!(
            "larder_fetch_started_total",
            "Total number of fetches started."
        );
        "larder_fetch_started_total"
    };
    /// Track number of requests attached to an in-flight fetch.
    pub static ref FETCH_DEDUPLICATED_COUNTER: &'static str = {
        metrics::describe_counter!(
            "larder_fetch_deduplicated_total",
            "Total number of requests attached to an already in-flight fetch."
        );
        "larder_fetch_deduplicated_total"
    };
    /// Track number of failed fetches.
    pub static ref FETCH_FAILED_COUNTER: &'static str = {
        metrics::describe_counter!(
            "larder_fetch_failed_total",
            "Total number of fetches that failed or returned malformed data."
        );
        "larder_fetch_failed_total"
    };

    // Store metrics

    /// Track number of store failures.
    pub static ref STORE_ERRORS_COUNTER: &'static str = {
        metrics::describe_counter!(
            "larder_store_errors_total",
            "Total number of failed store reads and writes."
        );
        "larder_store_errors_total"
    };
    /// Track number of cached entries evicted for being malformed.
    pub static ref MALFORMED_EVICTIONS_COUNTER: &'static str = {
        metrics::describe_counter!(
            "larder_malformed_evictions_total",
            "Total number of cached entries deleted because they could not be decoded."
        );
        "larder_malformed_evictions_total"
    };
}

/// Events counted by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Event {
    Hit,
    Stale,
    Miss,
    FetchStarted,
    FetchDeduplicated,
    FetchFailed,
    StoreError,
    MalformedEviction,
}

#[cfg(feature = "metrics")]
impl Event {
    fn counter(self) -> &'static str {
        match self {
            Event::Hit => *CACHE_HIT_COUNTER,
            Event::Stale => *CACHE_STALE_COUNTER,
            Event::Miss => *CACHE_MISS_COUNTER,
            Event::FetchStarted => *FETCH_STARTED_COUNTER,
            Event::FetchDeduplicated => *FETCH_DEDUPLICATED_COUNTER,
            Event::FetchFailed => *FETCH_FAILED_COUNTER,
            Event::StoreError => *STORE_ERRORS_COUNTER,
            Event::MalformedEviction => *MALFORMED_EVICTIONS_COUNTER,
        }
    }
}

/// Counts one event for the object type `type_name`.
#[cfg(feature = "metrics")]
#[inline]
pub(crate) fn record(event: Event, type_name: &str) {
    metrics::counter!(event.counter(), "type" => type_name.to_string()).increment(1);
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub(crate) fn record(_event: Event, _type_name: &str) {}
