use chrono::TimeDelta;
use futures::future::join_all;
use larder::{CacheError, CacheOrchestrator, CachePolicy, Raw, Resolution};
use larder_test::tracing::SpanCollector;
use larder_test::{CountingStore, MAX_AGE, ScriptedCodec, metadata_aged};
use pretty_assertions::assert_eq;

const NAME: &str = "gated:id=a";

fn setup(policy: CachePolicy) -> (CacheOrchestrator<CountingStore>, CountingStore, ScriptedCodec) {
    larder_test::tracing::init();
    let store = CountingStore::new();
    let codec = ScriptedCodec::gated("gated");
    let orchestrator = CacheOrchestrator::new(store.clone());
    orchestrator.register(codec.clone(), policy);
    (orchestrator, store, codec)
}

async fn resolve_many(
    orchestrator: &CacheOrchestrator<CountingStore>,
    callers: usize,
) -> Vec<Resolution<String>> {
    let tasks = (0..callers).map(|_| {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            orchestrator
                .resolve::<ScriptedCodec>("a".to_string())
                .await
                .expect("codec registered")
        })
    });
    join_all(tasks)
        .await
        .into_iter()
        .map(|task| task.expect("resolve task panicked"))
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_resolves_share_one_fetch() {
    let (orchestrator, store, codec) = setup(CachePolicy::ValidCacheOnly { max_age: MAX_AGE });

    let resolutions = resolve_many(&orchestrator, 16).await;
    assert!(resolutions.iter().all(|resolution| resolution.cached().is_none()));
    assert_eq!(orchestrator.in_flight_count(), 1);

    codec.release(1);
    let outcomes = join_all(resolutions.into_iter().map(Resolution::latest)).await;

    assert!(
        outcomes
            .iter()
            .all(|outcome| matches!(outcome.as_deref(), Ok("a#1")))
    );
    assert_eq!(codec.fetch_count(), 1);
    assert_eq!(store.counters.write_count(), 1);
    assert_eq!(orchestrator.in_flight_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_attached_callers_share_failure() {
    let (orchestrator, store, codec) = setup(CachePolicy::Forever);
    codec.fail_fetches();

    let resolutions = resolve_many(&orchestrator, 4).await;
    codec.release(1);
    let outcomes = join_all(resolutions.into_iter().map(Resolution::latest)).await;

    assert!(
        outcomes
            .iter()
            .all(|outcome| matches!(outcome, Err(CacheError::Fetch(_))))
    );
    assert_eq!(codec.fetch_count(), 1);
    assert_eq!(store.entry_count(), 0);
}

#[tokio::test]
async fn test_failed_fetch_clears_in_flight_entry() {
    let (orchestrator, _store, codec) = setup(CachePolicy::Forever);
    codec.fail_fetches();
    codec.release(2);

    let first = orchestrator
        .resolve::<ScriptedCodec>("a".to_string())
        .await
        .unwrap();
    assert!(first.latest().await.is_err());
    assert_eq!(orchestrator.in_flight_count(), 0);

    codec.respond_with(|identity, n| Ok(Raw::from(format!("{identity}#{n}"))));
    let second = orchestrator
        .resolve::<ScriptedCodec>("a".to_string())
        .await
        .unwrap();
    assert_eq!(second.latest().await.unwrap(), "a#2");
    assert_eq!(codec.fetch_count(), 2);
}

#[tokio::test]
async fn test_dropped_caller_does_not_cancel_fetch() {
    let (orchestrator, store, codec) = setup(CachePolicy::Forever);

    let resolution = orchestrator
        .resolve::<ScriptedCodec>("a".to_string())
        .await
        .unwrap();
    drop(resolution);
    assert_eq!(orchestrator.in_flight_count(), 1);

    codec.release(1);
    orchestrator.wait_idle().await;

    assert_eq!(store.entry(NAME).unwrap().payload, Raw::from_static(b"a#1"));
    assert_eq!(codec.fetch_count(), 1);
}

#[tokio::test]
async fn test_detached_caller_leaves_others_attached() {
    let (orchestrator, _store, codec) = setup(CachePolicy::Forever);

    let first = orchestrator
        .resolve::<ScriptedCodec>("a".to_string())
        .await
        .unwrap();
    let second = orchestrator
        .resolve::<ScriptedCodec>("a".to_string())
        .await
        .unwrap();
    drop(first);

    codec.release(1);
    assert_eq!(second.latest().await.unwrap(), "a#1");
    assert_eq!(codec.fetch_count(), 1);
}

#[tokio::test]
async fn test_different_identities_fetch_independently() {
    let (orchestrator, _store, codec) = setup(CachePolicy::Forever);

    let a = orchestrator
        .resolve::<ScriptedCodec>("a".to_string())
        .await
        .unwrap();
    let b = orchestrator
        .resolve::<ScriptedCodec>("b".to_string())
        .await
        .unwrap();
    assert_eq!(orchestrator.in_flight_count(), 2);

    codec.release(2);
    let mut objects = vec![a.latest().await.unwrap(), b.latest().await.unwrap()];
    objects.sort();
    assert_eq!(objects, vec!["a#1", "b#2"]);
}

#[tokio::test]
async fn test_request_during_refresh_attaches_to_it() {
    let (orchestrator, store, codec) = setup(CachePolicy::CacheThenRefresh { max_age: MAX_AGE });
    store
        .seed(metadata_aged(NAME, TimeDelta::seconds(120)), "stale")
        .await;

    let first = orchestrator
        .resolve::<ScriptedCodec>("a".to_string())
        .await
        .unwrap();
    assert_eq!(first.cached().map(String::as_str), Some("stale"));

    let second = orchestrator
        .resolve::<ScriptedCodec>("a".to_string())
        .await
        .unwrap();
    assert!(matches!(second, Resolution::Pending(_)));

    codec.release(1);
    assert_eq!(first.latest().await.unwrap(), "a#1");
    assert_eq!(second.latest().await.unwrap(), "a#1");
    assert_eq!(codec.fetch_count(), 1);
}

#[tokio::test]
async fn test_reregistering_keeps_running_fetch_attachable() {
    let (orchestrator, store, codec) = setup(CachePolicy::Forever);

    let first = orchestrator
        .resolve::<ScriptedCodec>("a".to_string())
        .await
        .unwrap();
    orchestrator.register(codec.clone(), CachePolicy::Forever);
    let second = orchestrator
        .resolve::<ScriptedCodec>("a".to_string())
        .await
        .unwrap();

    assert!(matches!(second, Resolution::Pending(_)));
    assert_eq!(orchestrator.in_flight_count(), 1);

    codec.release(1);
    assert_eq!(first.latest().await.unwrap(), "a#1");
    assert_eq!(second.latest().await.unwrap(), "a#1");
    assert_eq!(codec.fetch_count(), 1);
    assert_eq!(store.counters.write_count(), 1);
}

#[tokio::test]
async fn test_fetch_runs_in_span() {
    let collector = SpanCollector::new();
    let _guard = collector.set_default();
    let (orchestrator, _store, codec) = setup(CachePolicy::Forever);

    codec.release(1);
    orchestrator
        .resolve::<ScriptedCodec>("a".to_string())
        .await
        .unwrap()
        .latest()
        .await
        .unwrap();

    let spans = collector.spans_named("larder.fetch");
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].field("unique_name"), Some(NAME));
}
