use std::path::Path;

use larder::{CacheOrchestrator, CachePolicy, Resolution};
use larder_feoxdb::FeOxDbStore;
use larder_test::{MAX_AGE, ScriptedCodec};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn orchestrator(path: &Path, codec: &ScriptedCodec) -> CacheOrchestrator<FeOxDbStore> {
    larder_test::tracing::init();
    let store = FeOxDbStore::builder().path(path).build().unwrap();
    let orchestrator = CacheOrchestrator::new(store);
    orchestrator.register(codec.clone(), CachePolicy::ValidCacheOnly { max_age: MAX_AGE });
    orchestrator
}

async fn resolve(orchestrator: &CacheOrchestrator<FeOxDbStore>) -> Resolution<String> {
    orchestrator
        .resolve::<ScriptedCodec>("a".to_string())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_cached_object_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let codec = ScriptedCodec::default();

    {
        let orchestrator = orchestrator(temp_dir.path(), &codec);
        assert_eq!(resolve(&orchestrator).await.latest().await.unwrap(), "a#1");
        orchestrator.store().flush();
    }

    let orchestrator = orchestrator(temp_dir.path(), &codec);
    let resolution = resolve(&orchestrator).await;

    assert_eq!(resolution.cached().map(String::as_str), Some("a#1"));
    assert!(resolution.is_ready());
    assert_eq!(codec.fetch_count(), 1);
}

#[tokio::test]
async fn test_clear_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let codec = ScriptedCodec::default();

    {
        let orchestrator = orchestrator(temp_dir.path(), &codec);
        resolve(&orchestrator).await.latest().await.unwrap();
        orchestrator.clear().await.unwrap();
        assert!(orchestrator.entries().await.unwrap().is_empty());
        orchestrator.store().flush();
    }

    let orchestrator = orchestrator(temp_dir.path(), &codec);
    let resolution = resolve(&orchestrator).await;

    assert!(resolution.cached().is_none());
    assert_eq!(resolution.latest().await.unwrap(), "a#2");
}

#[tokio::test]
async fn test_entries_and_invalidate() {
    larder_test::tracing::init();
    let codec = ScriptedCodec::default();
    let orchestrator = CacheOrchestrator::new(FeOxDbStore::in_memory().unwrap());
    orchestrator.register(codec.clone(), CachePolicy::Forever);

    for identity in ["a", "b"] {
        orchestrator
            .resolve::<ScriptedCodec>(identity.to_string())
            .await
            .unwrap()
            .latest()
            .await
            .unwrap();
    }
    assert_eq!(orchestrator.entries().await.unwrap().len(), 2);

    orchestrator
        .invalidate::<ScriptedCodec>(&"a".to_string())
        .await
        .unwrap();

    let names: Vec<String> = orchestrator
        .entries()
        .await
        .unwrap()
        .into_iter()
        .map(|metadata| metadata.unique_name.to_string())
        .collect();
    assert_eq!(names, vec!["scripted:id=b"]);
}
