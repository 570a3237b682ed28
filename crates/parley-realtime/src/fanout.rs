//! Event fan-out to in-process subscribers.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::events::{ConnectionEvent, EventCategory};

type Callback = Arc<dyn Fn(&ConnectionEvent) + Send + Sync>;

/// Handle returned by [`EventHub::on`], used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

struct Subscriber {
    id: SubscriberId,
    category: EventCategory,
    callback: Callback,
}

/// Registry of event callbacks, keyed by category.
///
/// Callbacks run synchronously on the emitting task, in registration order.
/// The registry lock is released before any callback runs, so a callback may
/// call [`EventHub::on`] or [`EventHub::off`] without deadlocking.
pub struct EventHub {
    next_id: AtomicU64,
    subscribers: RwLock<Vec<Subscriber>>,
}

impl EventHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Register `callback` for events of `category`.
    pub fn on<F>(&self, category: EventCategory, callback: F) -> SubscriberId
    where
        F: Fn(&ConnectionEvent) + Send + Sync + 'static,
    {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push(Subscriber {
            id,
            category,
            callback: Arc::new(callback),
        });
        debug!(category = category.as_str(), subscriber = id.0, "subscriber added");
        id
    }

    /// Remove a subscriber. Returns `false` if it was not registered.
    pub fn off(&self, id: SubscriberId) -> bool {
        let mut subs = self.subscribers.write();
        let before = subs.len();
        subs.retain(|s| s.id != id);
        subs.len() != before
    }

    /// Deliver `event` to every subscriber of its category.
    ///
    /// A panicking callback is logged and skipped; the rest still run.
    /// Returns the number of callbacks invoked.
    pub fn emit(&self, event: &ConnectionEvent) -> usize {
        let category = event.category();
        let targets: Vec<(SubscriberId, Callback)> = self
            .subscribers
            .read()
            .iter()
            .filter(|s| s.category == category)
            .map(|s| (s.id, Arc::clone(&s.callback)))
            .collect();

        for (id, callback) in &targets {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                warn!(
                    category = category.as_str(),
                    subscriber = id.0,
                    "subscriber panicked; continuing"
                );
            }
        }
        targets.len()
    }

    /// Number of subscribers for `category`.
    pub fn subscriber_count(&self, category: EventCategory) -> usize {
        self.subscribers
            .read()
            .iter()
            .filter(|s| s.category == category)
            .count()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHub")
            .field("subscribers", &self.subscribers.read().len())
            .finish_non_exhaustive()
    }
}
