//! Wires the storage components together from a [`StoreConfig`].

use std::sync::Arc;

use crate::config::{RemoteConfig, StoreConfig};
use crate::connectivity::{
    ConnectivityMonitor, ConnectivityWatcher, HttpReachability, Reachability,
};
use crate::error::Result;
use crate::migration::MigrationEngine;
use crate::selection::SelectionStore;
use crate::storage::{AdapterFactory, HttpConnector, LocalStore};

pub struct StorageStack {
    pub config: StoreConfig,
    pub local: Arc<LocalStore>,
    pub connectivity: Arc<ConnectivityMonitor>,
    pub reachability: Arc<dyn Reachability>,
    pub selection: Arc<SelectionStore>,
    pub factory: Arc<AdapterFactory>,
    /// Re-checks the remote in the background; stopped when the stack drops.
    watcher: Option<ConnectivityWatcher>,
}

impl StorageStack {
    /// Open the local database and build every component on top of it.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let local = Arc::new(LocalStore::open(&config.db_path)?);
        let connectivity = Arc::new(ConnectivityMonitor::new(true));
        let api_key = config.remote.as_ref().map(|r| r.api_key.clone());
        let reachability: Arc<dyn Reachability> = Arc::new(HttpReachability::new(api_key));

        let mut selection = SelectionStore::new(local.clone(), Arc::clone(&connectivity));
        if let Some(remote) = &config.remote {
            selection = selection.with_remote_probe(
                Arc::clone(&reachability),
                remote.candidate_endpoints(),
                remote.probe_timeout,
            );
        }
        let selection = Arc::new(selection);
        selection.watch_connectivity();

        let mut factory = AdapterFactory::new(Arc::clone(&local), Arc::clone(&selection))
            .with_retry_policy(config.retry)
            .with_probe_timeout(config.probe_timeout());
        if let Some(remote) = &config.remote {
            factory = factory.with_remote(Arc::new(HttpConnector::new(remote.clone())));
        }

        let watcher = config
            .remote
            .as_ref()
            .and_then(|remote| start_watcher(remote, &connectivity, &reachability));

        tracing::debug!(
            db_path = %config.db_path.display(),
            remote = config.remote.is_some(),
            watching = watcher.is_some(),
            "Storage stack ready"
        );

        Ok(Self {
            config,
            local,
            connectivity,
            reachability,
            selection,
            factory: Arc::new(factory),
            watcher,
        })
    }

    /// Whether the background connectivity watcher is running.
    pub fn is_watching_connectivity(&self) -> bool {
        self.watcher.as_ref().is_some_and(ConnectivityWatcher::is_running)
    }

    pub fn migration_engine(&self) -> MigrationEngine {
        MigrationEngine::new(Arc::clone(&self.factory))
    }
}

fn start_watcher(
    remote: &RemoteConfig,
    connectivity: &Arc<ConnectivityMonitor>,
    reachability: &Arc<dyn Reachability>,
) -> Option<ConnectivityWatcher> {
    let interval = remote.connectivity_interval.filter(|d| !d.is_zero())?;
    if tokio::runtime::Handle::try_current().is_err() {
        tracing::warn!("No async runtime; connectivity will not be re-checked");
        return None;
    }
    Some(ConnectivityWatcher::spawn(
        Arc::clone(connectivity),
        Arc::clone(reachability),
        remote.candidate_endpoints(),
        interval,
        remote.probe_timeout,
    ))
}
