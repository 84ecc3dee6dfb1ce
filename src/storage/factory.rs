//! Picks the adapter for a collection, falling back to local storage when
//! the remote backend is unusable.

use std::sync::Arc;
use std::time::Duration;

use crate::config::RemoteConfig;
use crate::connectivity::{bounded, ConnectivityMonitor};
use crate::error::{Result, StorageError};
use crate::selection::SelectionStore;
use crate::types::Backend;

use super::local::{LocalAdapter, LocalStore};
use super::remote::{HttpTransport, RemoteAdapter, RestTransport, RetryPolicy, UpdateMode};
use super::traits::StorageAdapter;

/// Produces the transport for the remote backend.
pub trait RemoteConnector: Send + Sync {
    fn connect(&self) -> Result<Arc<dyn RestTransport>>;
}

/// Connects over HTTP with a fresh client per call.
pub struct HttpConnector {
    config: RemoteConfig,
}

impl HttpConnector {
    pub fn new(config: RemoteConfig) -> Self {
        Self { config }
    }
}

impl RemoteConnector for HttpConnector {
    fn connect(&self) -> Result<Arc<dyn RestTransport>> {
        Ok(Arc::new(HttpTransport::new(&self.config)?))
    }
}

/// Hands out one already-built transport to every adapter.
pub struct SharedConnector(pub Arc<dyn RestTransport>);

impl RemoteConnector for SharedConnector {
    fn connect(&self) -> Result<Arc<dyn RestTransport>> {
        Ok(Arc::clone(&self.0))
    }
}

pub struct AdapterFactory {
    local: Arc<LocalStore>,
    remote: Option<Arc<dyn RemoteConnector>>,
    selection: Arc<SelectionStore>,
    retry: RetryPolicy,
    update_mode: UpdateMode,
    probe_timeout: Duration,
}

impl AdapterFactory {
    pub fn new(local: Arc<LocalStore>, selection: Arc<SelectionStore>) -> Self {
        Self {
            local,
            remote: None,
            selection,
            retry: RetryPolicy::default(),
            update_mode: UpdateMode::default(),
            probe_timeout: Duration::from_secs(3),
        }
    }

    pub fn with_remote(mut self, connector: Arc<dyn RemoteConnector>) -> Self {
        self.remote = Some(connector);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_update_mode(mut self, mode: UpdateMode) -> Self {
        self.update_mode = mode;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn local_store(&self) -> &Arc<LocalStore> {
        &self.local
    }

    pub fn selection(&self) -> &Arc<SelectionStore> {
        &self.selection
    }

    fn connectivity(&self) -> &Arc<ConnectivityMonitor> {
        self.selection.connectivity()
    }

    pub fn local_adapter(&self, collection: &str) -> Arc<dyn StorageAdapter> {
        Arc::new(LocalAdapter::new(Arc::clone(&self.local), collection))
    }

    /// Remote adapter with its concrete type, for maintenance calls such as
    /// `clear` and `recreate`.
    pub fn remote_adapter(&self, collection: &str) -> Result<Arc<RemoteAdapter>> {
        let connector = self.remote.as_ref().ok_or_else(|| {
            StorageError::InvalidConfig("remote storage is not configured".into())
        })?;
        let adapter = RemoteAdapter::new(collection, connector.connect()?)?
            .with_retry_policy(self.retry)
            .with_update_mode(self.update_mode);
        Ok(Arc::new(adapter))
    }

    /// Adapter for exactly `backend`, without any connectivity check.
    pub fn adapter(&self, collection: &str, backend: Backend) -> Result<Arc<dyn StorageAdapter>> {
        match backend {
            Backend::Local => Ok(self.local_adapter(collection)),
            Backend::Remote => Ok(self.remote_adapter(collection)?),
        }
    }

    /// Adapter for `backend` (or the current selection), degrading to local
    /// whenever remote cannot be used. Never fails.
    pub async fn adapter_async(
        &self,
        collection: &str,
        backend: Option<Backend>,
        force_check: bool,
    ) -> Arc<dyn StorageAdapter> {
        let requested = backend.unwrap_or_else(|| self.selection.get_current(false));
        if requested == Backend::Local {
            return self.local_adapter(collection);
        }

        if !self.connectivity().is_online() {
            tracing::info!(collection, "Offline; using local storage");
            return self.local_adapter(collection);
        }

        let remote = match self.remote_adapter(collection) {
            Ok(remote) => remote,
            Err(e) => {
                tracing::warn!(collection, error = %e, "Remote adapter unavailable; using local storage");
                return self.local_adapter(collection);
            }
        };

        if force_check {
            if let Err(e) = bounded(self.probe_timeout, remote.ping()).await {
                tracing::warn!(collection, error = %e, "Remote probe failed; using local storage");
                return self.local_adapter(collection);
            }
        }
        remote
    }
}
