#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chainwatch_store::connectivity::ConnectivityMonitor;
use chainwatch_store::selection::{MemorySelection, SelectionStore};
use chainwatch_store::storage::remote::{RemoteAdapter, RetryPolicy};
use chainwatch_store::storage::{AdapterFactory, LocalStore, SharedConnector};
use chainwatch_store::Record;
use serde_json::{json, Value};

#[path = "../common/memory_transport.rs"]
mod memory_transport;

pub use memory_transport::{Call, MemoryTransport, TableShape};

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(5))
}

pub fn record(value: Value) -> Record {
    Record::from_value(value).expect("record from json")
}

pub fn chain(name: &str, chain_id: i64) -> Record {
    record(json!({
        "name": name,
        "chainId": chain_id,
        "rpcUrl": format!("https://rpc.{name}.example"),
        "nativeCurrency": { "symbol": name.to_uppercase(), "decimals": 18 },
        "status": "connected"
    }))
}

pub fn remote(collection: &str, transport: &Arc<MemoryTransport>) -> RemoteAdapter {
    RemoteAdapter::new(collection, transport.clone())
        .expect("remote adapter")
        .with_retry_policy(fast_retry())
}

pub struct Harness {
    pub local: Arc<LocalStore>,
    pub transport: Arc<MemoryTransport>,
    pub connectivity: Arc<ConnectivityMonitor>,
    pub selection: Arc<SelectionStore>,
    pub factory: AdapterFactory,
}

pub fn harness() -> Harness {
    let local = Arc::new(LocalStore::open_in_memory().expect("open local store"));
    let transport = Arc::new(MemoryTransport::new().with_catalog_tables());
    let connectivity = Arc::new(ConnectivityMonitor::new(true));
    let selection = Arc::new(SelectionStore::new(
        Arc::new(MemorySelection::new()),
        Arc::clone(&connectivity),
    ));
    let factory = AdapterFactory::new(Arc::clone(&local), Arc::clone(&selection))
        .with_remote(Arc::new(SharedConnector(transport.clone())))
        .with_retry_policy(fast_retry())
        .with_probe_timeout(Duration::from_millis(200));
    Harness {
        local,
        transport,
        connectivity,
        selection,
        factory,
    }
}
