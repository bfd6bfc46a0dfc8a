use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::Notify;

type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: BTreeMap<u64, Listener>,
}

/// Payload-less "session changed" broadcast.
///
/// Listeners must re-read the session themselves; the notification only
/// says that something changed. No ordering is guaranteed between listeners.
#[derive(Clone, Default)]
pub struct SessionEvents {
    registry: Arc<Mutex<Registry>>,
}

impl std::fmt::Debug for SessionEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEvents")
            .field("listener_count", &self.listener_count())
            .finish()
    }
}

impl SessionEvents {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. It stays registered until the returned
    /// [`Subscription`] is dropped.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.insert(id, Arc::new(listener));
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Async view of the same notifications. Bursts coalesce into a single wake-up.
    #[must_use]
    pub fn notifications(&self) -> Notifications {
        let notify = Arc::new(Notify::new());
        let waker = notify.clone();
        let subscription = self.subscribe(move || waker.notify_one());
        Notifications {
            notify,
            _subscription: subscription,
        }
    }

    /// Invoke every listener. Returns how many were called.
    pub fn emit(&self) -> usize {
        // Listeners may subscribe, unsubscribe or read the session, so the
        // registry lock is released before any of them runs.
        let listeners: Vec<Listener> = self.registry.lock().listeners.values().cloned().collect();
        for listener in &listeners {
            listener();
        }
        tracing::trace!(listeners = listeners.len(), "Session change broadcast");
        listeners.len()
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.registry.lock().listeners.len()
    }

    /// Drop every listener. Outstanding subscriptions become no-ops.
    pub fn clear(&self) {
        self.registry.lock().listeners.clear();
    }
}

/// Disposer for a registered listener.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Same as dropping the subscription.
    pub fn unsubscribe(self) {}
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().listeners.remove(&self.id);
        }
    }
}

/// Awaitable change notifications, see [`SessionEvents::notifications`].
pub struct Notifications {
    notify: Arc<Notify>,
    _subscription: Subscription,
}

impl Notifications {
    /// Wait for the next change. Returns immediately if one arrived since the last call.
    pub async fn changed(&self) {
        self.notify.notified().await;
    }
}
