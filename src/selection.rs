//! Process-wide backend selection with persistence and change notification.
//!
//! The store is constructed once and handed to whoever needs it; there is
//! no global. Reads never fail: a missing or unreadable persisted value is
//! treated as [`Backend::Local`]. Whenever the platform is offline while
//! the selection says Remote, the selection is forced back to Local,
//! persisted, and announced.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use crate::connectivity::{first_reachable, ConnectivityMonitor, Reachability};
use crate::error::Result;
use crate::events::{EventEmitter, Subscription};
use crate::storage::LocalStore;
use crate::types::Backend;

/// Key-value key holding the persisted selection.
pub const SELECTION_KEY: &str = "storage_backend";

// ============================================================================
// Persistence
// ============================================================================

pub trait SelectionPersistence: Send + Sync {
    fn load(&self) -> Result<Option<String>>;
    fn save(&self, value: &str) -> Result<()>;
}

impl SelectionPersistence for LocalStore {
    fn load(&self) -> Result<Option<String>> {
        self.kv_get(SELECTION_KEY)
    }

    fn save(&self, value: &str) -> Result<()> {
        self.kv_set(SELECTION_KEY, value)
    }
}

/// Non-durable persistence, for tests and throwaway sessions.
#[derive(Default)]
pub struct MemorySelection {
    value: Mutex<Option<String>>,
}

impl MemorySelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: &str) -> Self {
        Self {
            value: Mutex::new(Some(value.to_string())),
        }
    }
}

impl SelectionPersistence for MemorySelection {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.value.lock().clone())
    }

    fn save(&self, value: &str) -> Result<()> {
        *self.value.lock() = Some(value.to_string());
        Ok(())
    }
}

// ============================================================================
// SelectionStore
// ============================================================================

struct RemoteProbe {
    reachability: Arc<dyn Reachability>,
    candidates: Vec<String>,
    timeout: Duration,
}

pub struct SelectionStore {
    persistence: Arc<dyn SelectionPersistence>,
    connectivity: Arc<ConnectivityMonitor>,
    probe: Option<RemoteProbe>,
    listeners: EventEmitter<Backend>,
    connectivity_sub: Mutex<Option<Subscription>>,
}

impl SelectionStore {
    pub fn new(
        persistence: Arc<dyn SelectionPersistence>,
        connectivity: Arc<ConnectivityMonitor>,
    ) -> Self {
        Self {
            persistence,
            connectivity,
            probe: None,
            listeners: EventEmitter::new(),
            connectivity_sub: Mutex::new(None),
        }
    }

    /// Endpoints that `try_set_current(Remote)` must reach before committing.
    pub fn with_remote_probe(
        mut self,
        reachability: Arc<dyn Reachability>,
        candidates: Vec<String>,
        timeout: Duration,
    ) -> Self {
        self.probe = Some(RemoteProbe {
            reachability,
            candidates,
            timeout,
        });
        self
    }

    pub fn connectivity(&self) -> &Arc<ConnectivityMonitor> {
        &self.connectivity
    }

    fn persisted(&self) -> Backend {
        match self.persistence.load() {
            Ok(Some(raw)) => raw.parse::<Backend>().unwrap_or_else(|e| {
                tracing::warn!(value = %raw, error = %e, "Ignoring unreadable backend selection");
                Backend::Local
            }),
            Ok(None) => Backend::Local,
            Err(e) => {
                tracing::warn!(error = %e, "Cannot read backend selection; assuming local");
                Backend::Local
            }
        }
    }

    /// The effective backend. With `force_check`, or whenever the persisted
    /// value is Remote, live connectivity is consulted first.
    pub fn get_current(&self, force_check: bool) -> Backend {
        let current = self.persisted();
        if (force_check || current == Backend::Remote) && !self.connectivity.is_online() {
            return self.downgrade_if_remote(current);
        }
        current
    }

    fn downgrade_if_remote(&self, current: Backend) -> Backend {
        if current != Backend::Remote {
            return current;
        }
        tracing::warn!("Offline while remote storage is selected; switching to local");
        if let Err(e) = self.set_current(Backend::Local) {
            tracing::error!(error = %e, "Failed to persist local fallback");
        }
        Backend::Local
    }

    /// Persist `backend`, then notify listeners in registration order.
    pub fn set_current(&self, backend: Backend) -> Result<()> {
        self.persistence.save(backend.as_str())?;
        tracing::info!(backend = %backend, "Storage backend selected");
        self.listeners.emit(&backend);
        Ok(())
    }

    /// Commit `backend` only if it is usable right now. Remote requires the
    /// platform to be online and one candidate endpoint to answer.
    pub async fn try_set_current(&self, backend: Backend) -> bool {
        if backend == Backend::Remote {
            if !self.connectivity.is_online() {
                tracing::warn!("Cannot select remote storage while offline");
                return false;
            }
            let Some(probe) = &self.probe else {
                tracing::warn!("Remote storage is not configured");
                return false;
            };
            let reached = first_reachable(
                probe.reachability.as_ref(),
                &probe.candidates,
                probe.timeout,
            )
            .await;
            if reached.is_none() {
                tracing::warn!(
                    candidates = probe.candidates.len(),
                    "No remote endpoint answered; keeping current backend"
                );
                return false;
            }
        }
        match self.set_current(backend) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(backend = %backend, error = %e, "Failed to persist backend selection");
                false
            }
        }
    }

    pub fn add_listener(&self, callback: impl Fn(&Backend) + Send + Sync + 'static) -> Subscription {
        self.listeners.subscribe(callback)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.size()
    }

    /// Follow connectivity transitions: going offline triggers the same
    /// downgrade as [`get_current`](Self::get_current). Calling it again
    /// replaces the previous subscription.
    pub fn watch_connectivity(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let subscription = self.connectivity.on_transition(move |online| {
            if *online {
                return;
            }
            if let Some(store) = weak.upgrade() {
                let current = store.persisted();
                store.downgrade_if_remote(current);
            }
        });
        if let Some(previous) = self.connectivity_sub.lock().replace(subscription) {
            previous.unsubscribe();
        }
    }
}

impl Drop for SelectionStore {
    fn drop(&mut self) {
        if let Some(subscription) = self.connectivity_sub.get_mut().take() {
            subscription.unsubscribe();
        }
    }
}
