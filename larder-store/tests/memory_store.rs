//! Contract tests for the in-memory store.

use bytes::Bytes;
use chrono::{Duration, Utc};
use larder_core::{CacheEntryMetadata, Expiration, UniqueName};
use larder_store::{DeleteStatus, MemoryStore, PersistentStore};

fn make_meta(id: u32) -> CacheEntryMetadata {
    CacheEntryMetadata::new(UniqueName::for_identity("test", &id), Utc::now())
        .with_expiration(Expiration::At(Utc::now() + Duration::hours(1)))
}

#[tokio::test]
async fn test_write_then_read_round_trip() {
    let store = MemoryStore::new();
    let meta = make_meta(1).optimized(true);

    store
        .write_payload(meta.clone(), Bytes::from_static(b"payload"))
        .await
        .unwrap();

    let payload = store.read_payload(&meta.unique_name).await.unwrap();
    assert_eq!(payload.as_deref(), Some(&b"payload"[..]));

    let read_meta = store.get_metadata(&meta.unique_name).await.unwrap();
    assert_eq!(read_meta, Some(meta));
}

#[tokio::test]
async fn test_empty_payload_is_stored() {
    let store = MemoryStore::new();
    let meta = make_meta(2);

    store.write_payload(meta.clone(), Bytes::new()).await.unwrap();

    let payload = store.read_payload(&meta.unique_name).await.unwrap();
    assert_eq!(payload, Some(Bytes::new()));
}

#[tokio::test]
async fn test_upsert_replaces_both_records() {
    let store = MemoryStore::new();
    let first = make_meta(3);
    let second = CacheEntryMetadata::new(first.unique_name.clone(), Utc::now());

    store
        .write_payload(first.clone(), Bytes::from_static(b"old"))
        .await
        .unwrap();
    store
        .write_payload(second.clone(), Bytes::from_static(b"new"))
        .await
        .unwrap();

    assert_eq!(store.len(), 1);
    let entry = store.get_entry(&first.unique_name).unwrap();
    assert_eq!(entry.metadata, second);
    assert_eq!(entry.payload, Bytes::from_static(b"new"));
}

#[tokio::test]
async fn test_delete_removes_pair() {
    let store = MemoryStore::new();
    let meta = make_meta(4);
    store
        .write_payload(meta.clone(), Bytes::from_static(b"x"))
        .await
        .unwrap();

    let status = store.delete(&meta.unique_name).await.unwrap();
    assert_eq!(status, DeleteStatus::Deleted(1));
    assert!(store.get_metadata(&meta.unique_name).await.unwrap().is_none());
    assert!(store.read_payload(&meta.unique_name).await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_missing_is_not_an_error() {
    let store = MemoryStore::new();
    let status = store
        .delete(&UniqueName::from("test:id=missing"))
        .await
        .unwrap();
    assert_eq!(status, DeleteStatus::Missing);
}

#[tokio::test]
async fn test_get_all_metadata_and_delete_all() {
    let store = MemoryStore::new();
    for id in 0..5 {
        store
            .write_payload(make_meta(id), Bytes::from_static(b"x"))
            .await
            .unwrap();
    }

    let mut names: Vec<_> = store
        .get_all_metadata()
        .await
        .unwrap()
        .into_iter()
        .map(|meta| meta.unique_name)
        .collect();
    names.sort();
    let mut expected: Vec<_> = (0..5u32)
        .map(|id| UniqueName::for_identity("test", &id))
        .collect();
    expected.sort();
    assert_eq!(names, expected);

    store.delete_all().await.unwrap();
    assert!(store.is_empty());
    assert!(store.get_all_metadata().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_clones_share_entries() {
    let store = MemoryStore::new();
    let other = store.clone();
    let meta = make_meta(9);

    store
        .write_payload(meta.clone(), Bytes::from_static(b"shared"))
        .await
        .unwrap();

    assert_eq!(
        other.read_payload(&meta.unique_name).await.unwrap(),
        Some(Bytes::from_static(b"shared"))
    );
}
