//! Synchronous fan-out for backend-selection changes and connectivity
//! transitions.
//!
//! Each emit walks a snapshot of the listener list, so a listener added
//! during emission first hears the next event and one removed during
//! emission still hears the current one. A panicking listener is caught and
//! logged and the rest still run. Callbacks may subscribe or unsubscribe
//! reentrantly; the lock is never held while they run.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

type ListenerId = u64;

type ListenerFn<T> = dyn Fn(&T) + Send + Sync;

type ListenerList<T> = Mutex<Vec<(ListenerId, Arc<ListenerFn<T>>)>>;

/// Typed synchronous event emitter.
pub struct EventEmitter<T> {
    listeners: Arc<ListenerList<T>>,
    next_id: AtomicU64,
}

impl<T: 'static> EventEmitter<T> {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(1),
        }
    }

    fn on(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, Arc::new(callback)));
        id
    }

    /// Register `callback` and return a [`Subscription`] that removes it.
    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let id = self.on(callback);
        let list: Weak<ListenerList<T>> = Arc::downgrade(&self.listeners);
        Subscription {
            remove: Mutex::new(Some(Box::new(move || {
                if let Some(list) = list.upgrade() {
                    list.lock().retain(|(lid, _)| *lid != id);
                }
            }))),
        }
    }

    /// Emit `event` to every listener registered when the call started,
    /// in registration order. The lock is not held during callbacks.
    pub fn emit(&self, event: &T) {
        let snapshot: Vec<(ListenerId, Arc<ListenerFn<T>>)> = {
            let guard = self.listeners.lock();
            guard.iter().map(|(id, cb)| (*id, Arc::clone(cb))).collect()
        };
        for (id, cb) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| cb(event))).is_err() {
                tracing::warn!(listener = id, "event listener panicked; continuing");
            }
        }
    }

    /// Number of currently registered listeners.
    pub fn size(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl<T: 'static> Default for EventEmitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// Handle that removes exactly one registration.
///
/// `unsubscribe` is idempotent; dropping the handle does NOT unsubscribe.
pub struct Subscription {
    remove: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        let remove = self.remove.lock().take();
        if let Some(remove) = remove {
            remove();
        }
    }

    pub fn is_active(&self) -> bool {
        self.remove.lock().is_some()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
