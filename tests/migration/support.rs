#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chainwatch_store::connectivity::ConnectivityMonitor;
use chainwatch_store::migration::MigrationEngine;
use chainwatch_store::selection::{MemorySelection, SelectionStore};
use chainwatch_store::storage::remote::RetryPolicy;
use chainwatch_store::storage::{AdapterFactory, LocalStore, SharedConnector, StorageAdapter};
use chainwatch_store::Record;
use serde_json::{json, Value};

#[path = "../common/memory_transport.rs"]
mod memory_transport;

pub use memory_transport::MemoryTransport;

pub struct Setup {
    pub local: Arc<LocalStore>,
    pub transport: Arc<MemoryTransport>,
    pub factory: Arc<AdapterFactory>,
}

impl Setup {
    pub fn new() -> Self {
        let local = Arc::new(LocalStore::open_in_memory().expect("open local store"));
        let transport = Arc::new(MemoryTransport::new().with_catalog_tables());
        let selection = Arc::new(SelectionStore::new(
            Arc::new(MemorySelection::new()),
            Arc::new(ConnectivityMonitor::new(true)),
        ));
        let factory = AdapterFactory::new(Arc::clone(&local), selection)
            .with_remote(Arc::new(SharedConnector(transport.clone())))
            .with_retry_policy(RetryPolicy::new(2, Duration::from_millis(5)));
        Self {
            local,
            transport,
            factory: Arc::new(factory),
        }
    }

    pub fn engine(&self) -> MigrationEngine {
        MigrationEngine::new(Arc::clone(&self.factory))
    }

    pub fn engine_for(&self, collections: &[&str]) -> MigrationEngine {
        self.engine().with_collections(collections.iter().copied())
    }

    /// Store `records` in the collection's primary local table.
    pub async fn seed_local(&self, collection: &str, records: Vec<Record>) {
        let adapter = self.factory.local_adapter(collection);
        adapter.bulk_create(records).await.expect("seed local");
    }

    pub fn seed_legacy(&self, key: &str, items: Value) {
        self.local
            .kv_set(key, &items.to_string())
            .expect("seed legacy");
    }

    pub fn remote_names(&self, table: &str) -> Vec<String> {
        self.transport
            .rows(table)
            .iter()
            .filter_map(|r| r.get("name").and_then(Value::as_str).map(str::to_string))
            .collect()
    }
}

pub fn record(value: Value) -> Record {
    Record::from_value(value).expect("record from json")
}

pub fn chain(name: &str, chain_id: i64) -> Record {
    record(json!({
        "name": name,
        "chainId": chain_id,
        "rpcUrl": format!("https://rpc.{name}.example"),
        "status": "connected"
    }))
}

pub fn api(name: &str) -> Value {
    json!({ "name": name, "url": format!("https://api.example/{name}") })
}
