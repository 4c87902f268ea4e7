//! Low-memory notification registry.
//!
//! A [`LowMemoryNotifier`] is an explicit, cloneable registry of zero-argument
//! callbacks. Components register at construction and keep the returned
//! [`LowMemorySubscription`]; dropping the subscription unregisters the
//! callback. Whoever observes memory pressure (an allocator hook, a cgroup
//! watcher, a test) calls [`notify_low_memory`](LowMemoryNotifier::notify_low_memory).
//!
//! ```text
//!   DetailsCache::new ──register──► LowMemoryNotifier { id → callback }
//!         │                                    ▲
//!         └── holds LowMemorySubscription ─────┘ (Drop ⇒ unregister)
//!
//!   notify_low_memory(): snapshot callbacks under the lock, run them after
//!   releasing it.
//! ```
//!
//! Callbacks run on the notifying thread, outside the registry lock, so a
//! callback may itself register or drop subscriptions. A panicking callback is
//! logged and skipped; the remaining callbacks still run.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use detailcache::low_memory::LowMemoryNotifier;
//!
//! let notifier = LowMemoryNotifier::new();
//! let hits = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&hits);
//! let subscription = notifier.register(move || {
//!     counter.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! assert_eq!(notifier.notify_low_memory(), 1);
//! drop(subscription);
//! assert_eq!(notifier.notify_low_memory(), 0);
//! assert_eq!(hits.load(Ordering::SeqCst), 1);
//! ```

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, error};

type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    notifications: AtomicU64,
    listeners: Mutex<FxHashMap<u64, Listener>>,
}

/// Registry of low-memory callbacks.
///
/// Clones share the same registry.
#[derive(Clone, Default)]
pub struct LowMemoryNotifier {
    registry: Arc<Registry>,
}

impl LowMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` until the returned subscription is dropped.
    pub fn register<F>(&self, callback: F) -> LowMemorySubscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry.listeners.lock().insert(id, Arc::new(callback));
        debug!(subscription = id, "low-memory listener registered");
        LowMemorySubscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Runs every registered callback and returns how many completed.
    pub fn notify_low_memory(&self) -> usize {
        self.registry.notifications.fetch_add(1, Ordering::Relaxed);
        let listeners: Vec<(u64, Listener)> = self
            .registry
            .listeners
            .lock()
            .iter()
            .map(|(&id, listener)| (id, Arc::clone(listener)))
            .collect();

        debug!(listeners = listeners.len(), "low-memory signal");

        let mut completed = 0;
        for (id, listener) in listeners {
            match catch_unwind(AssertUnwindSafe(|| (*listener)())) {
                Ok(()) => completed += 1,
                Err(_) => error!(subscription = id, "low-memory listener panicked"),
            }
        }
        completed
    }

    pub fn listener_count(&self) -> usize {
        self.registry.listeners.lock().len()
    }

    /// Number of times [`notify_low_memory`](Self::notify_low_memory) was called.
    pub fn notification_count(&self) -> u64 {
        self.registry.notifications.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for LowMemoryNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LowMemoryNotifier")
            .field("listeners", &self.listener_count())
            .field("notifications", &self.notification_count())
            .finish()
    }
}

/// Scoped registration returned by [`LowMemoryNotifier::register`].
///
/// Holds only a weak reference to the registry, so it may outlive the
/// notifier.
#[must_use = "dropping the subscription unregisters the callback"]
pub struct LowMemorySubscription {
    id: u64,
    registry: Weak<Registry>,
}

impl LowMemorySubscription {
    /// Unregisters the callback now. Equivalent to dropping the subscription.
    pub fn unregister(self) {
        drop(self);
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for LowMemorySubscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            let removed = registry.listeners.lock().remove(&self.id);
            if removed.is_some() {
                debug!(subscription = self.id, "low-memory listener unregistered");
            }
        }
    }
}

impl fmt::Debug for LowMemorySubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LowMemorySubscription")
            .field("id", &self.id)
            .field("live", &(self.registry.strong_count() > 0))
            .finish()
    }
}
