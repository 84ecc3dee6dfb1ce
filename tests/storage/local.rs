use std::sync::Arc;

use assert_matches::assert_matches;
use chainwatch_store::storage::{LocalAdapter, LocalStore, StorageAdapter};
use chainwatch_store::{Backend, Record, StorageError};
use serde_json::json;

use super::support::{chain, record};

fn adapter(collection: &str) -> LocalAdapter {
    let store = Arc::new(LocalStore::open_in_memory().expect("open"));
    LocalAdapter::new(store, collection)
}

// ============================================================================
// Contract
// ============================================================================

#[tokio::test]
async fn missing_collection_reads_as_empty() {
    let adapter = adapter("ChainConfig");
    assert!(!adapter.exists().await.unwrap());
    assert!(adapter.get_all().await.unwrap().is_empty());
    assert_eq!(adapter.get(1).await.unwrap(), None);
    assert!(!adapter.delete(1).await.unwrap());
    assert_eq!(adapter.backend(), Backend::Local);
}

#[tokio::test]
async fn create_assigns_identity_and_discards_caller_identity() {
    let adapter = adapter("ChainConfig");
    let created = adapter.create(chain("eth", 1).with_id(999)).await.unwrap();

    let id = created.id.expect("assigned id");
    assert_ne!(id, 999);
    assert!(adapter.exists().await.unwrap());

    let fetched = adapter.get(id).await.unwrap().expect("stored");
    assert_eq!(fetched, created);
    assert_eq!(adapter.get(999).await.unwrap(), None);
}

#[tokio::test]
async fn get_all_is_ordered_by_identity() {
    let adapter = adapter("ChainConfig");
    for (name, chain_id) in [("eth", 1), ("bsc", 56), ("polygon", 137)] {
        adapter.create(chain(name, chain_id)).await.unwrap();
    }
    let names: Vec<_> = adapter
        .get_all()
        .await
        .unwrap()
        .iter()
        .map(|r| r.name().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["eth", "bsc", "polygon"]);
}

#[tokio::test]
async fn update_replaces_existing_document() {
    let adapter = adapter("ApiConfig");
    let created = adapter
        .create(record(json!({ "name": "prices", "url": "https://a" })))
        .await
        .unwrap();

    let changed = created.clone().with("url", "https://b").with("method", "POST");
    let updated = adapter.update(changed.clone()).await.unwrap();

    assert_eq!(updated, changed);
    assert_eq!(adapter.get(created.id.unwrap()).await.unwrap(), Some(changed));
}

#[tokio::test]
async fn update_requires_existing_identity() {
    let adapter = adapter("ApiConfig");
    adapter.create(record(json!({ "name": "a" }))).await.unwrap();

    let err = adapter
        .update(record(json!({ "name": "ghost" })).with_id(42))
        .await
        .unwrap_err();
    assert_matches!(err, StorageError::NotFound { id: 42, .. });

    let err = adapter.update(record(json!({ "name": "anon" }))).await.unwrap_err();
    assert_matches!(err, StorageError::MissingIdentity { .. });

    assert_eq!(adapter.get_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn update_on_missing_table_is_not_found() {
    let adapter = adapter("AlertConfig");
    let err = adapter
        .update(Record::new().with("name", "x").with_id(1))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(!adapter.exists().await.unwrap());
}

#[tokio::test]
async fn delete_is_idempotent() {
    let adapter = adapter("ChainConfig");
    let id = adapter.create(chain("eth", 1)).await.unwrap().id.unwrap();

    assert!(adapter.delete(id).await.unwrap());
    assert!(!adapter.delete(id).await.unwrap());
    assert_eq!(adapter.get(id).await.unwrap(), None);
}

#[tokio::test]
async fn bulk_update_is_atomic() {
    let adapter = adapter("ChainConfig");
    let created = adapter
        .bulk_create(vec![chain("eth", 1), chain("bsc", 56)])
        .await
        .unwrap();
    assert_eq!(created.len(), 2);
    let first = created[0].id.unwrap();

    let err = adapter
        .bulk_update(vec![
            (first, chain("eth-renamed", 1)),
            (9_999, chain("missing", 0)),
        ])
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let untouched = adapter.get(first).await.unwrap().unwrap();
    assert_eq!(untouched.name(), Some("eth"));
}

#[tokio::test]
async fn upsert_inserts_then_updates() {
    let adapter = adapter("ApiConfig");
    let inserted = adapter
        .upsert(record(json!({ "name": "feed" })))
        .await
        .unwrap();
    let id = inserted.id.unwrap();

    let updated = adapter
        .upsert(inserted.with("url", "https://feed"))
        .await
        .unwrap();
    assert_eq!(updated.id, Some(id));
    assert_eq!(adapter.get_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn nested_values_survive_storage() {
    let adapter = adapter("DataProcessingNode");
    let node = record(json!({
        "name": "avg",
        "inputs": [1, 2, 3],
        "config": { "window": { "size": 5, "unit": "m" }, "weights": [0.5, 0.5] }
    }));
    let created = adapter.create(node.clone()).await.unwrap();
    let fetched = adapter.get(created.id.unwrap()).await.unwrap().unwrap();
    assert_eq!(fetched.fields, node.fields);
}

// ============================================================================
// Store
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_writers_share_one_store() {
    let store = Arc::new(LocalStore::open_in_memory().unwrap());
    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let adapter = LocalAdapter::new(Arc::clone(&store), "ChainConfig");
            tokio::spawn(async move { adapter.create(chain(&format!("c{i}"), i)).await })
        })
        .collect();

    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await.unwrap().unwrap().id.unwrap());
    }
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 16);
    assert_eq!(store.all("ChainConfig").unwrap().len(), 16);
}

#[test]
fn collections_are_isolated_tables() {
    let store = LocalStore::open_in_memory().unwrap();
    store.insert("ChainConfig", chain("eth", 1)).unwrap();
    store.insert("ApiConfig", record(json!({ "name": "p" }))).unwrap();

    assert_eq!(store.collections().unwrap(), vec!["ApiConfig", "ChainConfig"]);
    assert_eq!(store.all("ChainConfig").unwrap().len(), 1);
}

#[test]
fn rejects_unsafe_collection_names() {
    let store = LocalStore::open_in_memory().unwrap();
    let err = store.insert("x\"; DROP TABLE kv; --", Record::new()).unwrap_err();
    assert_matches!(err, StorageError::InvalidConfig(_));
}

#[test]
fn key_value_round_trip() {
    let store = LocalStore::open_in_memory().unwrap();
    assert_eq!(store.kv_get("k").unwrap(), None);
    store.kv_set("k", "v1").unwrap();
    store.kv_set("k", "v2").unwrap();
    assert_eq!(store.kv_get("k").unwrap().as_deref(), Some("v2"));
    assert!(store.kv_remove("k").unwrap());
    assert!(!store.kv_remove("k").unwrap());
}

#[test]
fn file_backed_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chainwatch.db");

    let id = {
        let store = LocalStore::open(&path).unwrap();
        store.kv_set("storage_backend", "remote").unwrap();
        store.insert("ChainConfig", chain("eth", 1)).unwrap().id.unwrap()
    };

    let store = LocalStore::open(&path).unwrap();
    assert_eq!(store.kv_get("storage_backend").unwrap().as_deref(), Some("remote"));
    assert_eq!(store.get("ChainConfig", id).unwrap().unwrap().name(), Some("eth"));
}

#[test]
fn corrupt_document_is_storage_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corrupt.db");
    {
        let store = LocalStore::open(&path).unwrap();
        store.insert("ChainConfig", chain("eth", 1)).unwrap();
    }
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute("UPDATE \"doc_ChainConfig\" SET data = 'not json'", [])
            .unwrap();
    }
    let store = LocalStore::open(&path).unwrap();
    assert_matches!(
        store.all("ChainConfig").unwrap_err(),
        StorageError::StorageUnavailable { .. }
    );
}
