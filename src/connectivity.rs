//! Online/offline state and endpoint reachability.
//!
//! [`ConnectivityMonitor`] holds the platform's view of connectivity and
//! fans out transitions. [`Reachability`] answers "does this URL respond"
//! and every check is bounded by [`bounded`]. [`ConnectivityWatcher`] ties
//! the two together on a timer.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::{Result, StorageError};
use crate::events::{EventEmitter, Subscription};

// ============================================================================
// ConnectivityMonitor
// ============================================================================

pub struct ConnectivityMonitor {
    online: AtomicBool,
    transitions: EventEmitter<bool>,
}

impl ConnectivityMonitor {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
            transitions: EventEmitter::new(),
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Record the current state. Listeners hear only actual transitions.
    pub fn set_online(&self, online: bool) {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous != online {
            tracing::info!(online, "Connectivity changed");
            self.transitions.emit(&online);
        }
    }

    pub fn on_transition(&self, callback: impl Fn(&bool) + Send + Sync + 'static) -> Subscription {
        self.transitions.subscribe(callback)
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

// ============================================================================
// Reachability
// ============================================================================

/// Run `fut` with a deadline; elapsing counts as a network failure.
pub async fn bounded<T, F>(timeout: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(StorageError::NetworkUnavailable(format!(
            "timed out after {} ms",
            timeout.as_millis()
        ))),
    }
}

#[async_trait]
pub trait Reachability: Send + Sync {
    /// HTTP status of a lightweight request to `url`. Any answer below 500
    /// counts as reachable.
    async fn check(&self, url: &str, timeout: Duration) -> Result<u16>;
}

pub struct HttpReachability {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl HttpReachability {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
        }
    }
}

#[async_trait]
impl Reachability for HttpReachability {
    async fn check(&self, url: &str, timeout: Duration) -> Result<u16> {
        let mut request = self.client.get(url).timeout(timeout);
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key).bearer_auth(key);
        }
        let send = async {
            request
                .send()
                .await
                .map_err(|e| StorageError::NetworkUnavailable(e.to_string()))
        };
        let response = bounded(timeout, send).await?;
        let status = response.status();
        if status.is_server_error() {
            return Err(StorageError::NetworkUnavailable(format!(
                "{url} answered {status}"
            )));
        }
        Ok(status.as_u16())
    }
}

/// Try `candidates` in order; the first reachable one wins.
pub async fn first_reachable(
    reachability: &dyn Reachability,
    candidates: &[String],
    timeout: Duration,
) -> Option<String> {
    for url in candidates {
        match bounded(timeout, reachability.check(url, timeout)).await {
            Ok(status) => {
                tracing::debug!(url = %url, status, "Endpoint reachable");
                return Some(url.clone());
            }
            Err(e) => tracing::debug!(url = %url, error = %e, "Endpoint unreachable"),
        }
    }
    None
}

// ============================================================================
// ConnectivityWatcher
// ============================================================================

/// Check `endpoints` once and record the outcome on `monitor`.
///
/// Returns the new online state.
pub async fn refresh_connectivity(
    monitor: &ConnectivityMonitor,
    reachability: &dyn Reachability,
    endpoints: &[String],
    timeout: Duration,
) -> bool {
    let online = first_reachable(reachability, endpoints, timeout)
        .await
        .is_some();
    monitor.set_online(online);
    online
}

/// Background task that re-checks the remote endpoints on an interval and
/// feeds the result into a [`ConnectivityMonitor`].
///
/// The task stops when the watcher is dropped.
pub struct ConnectivityWatcher {
    handle: JoinHandle<()>,
}

impl ConnectivityWatcher {
    /// Spawn the watcher on the current tokio runtime. The first check runs
    /// immediately.
    pub fn spawn(
        monitor: Arc<ConnectivityMonitor>,
        reachability: Arc<dyn Reachability>,
        endpoints: Vec<String>,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        let handle = tokio::spawn(async move {
            tracing::info!(
                interval_ms = interval.as_millis() as u64,
                endpoints = endpoints.len(),
                "Connectivity watcher started"
            );

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let online =
                    refresh_connectivity(&monitor, reachability.as_ref(), &endpoints, timeout)
                        .await;
                tracing::debug!(online, "Connectivity checked");
            }
        });
        Self { handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for ConnectivityWatcher {
    fn drop(&mut self) {
        self.handle.abort();
        tracing::debug!("Connectivity watcher stopped");
    }
}
