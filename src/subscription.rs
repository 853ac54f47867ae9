//! Snapshot listeners.
//!
//! A listener is called with the new snapshot after every synchronization
//! that refreshed at least one collection. Listeners run on the task that
//! performed the synchronization and must not block.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::store::Snapshot;

type Listener = Arc<dyn Fn(&Arc<Snapshot>) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
pub(crate) struct Listeners {
    registry: Arc<Mutex<Registry>>,
}

impl Listeners {
    pub(crate) fn add(&self, listener: Listener) -> Subscription {
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.entries.push((id, listener));
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Call every listener. The registry lock is released first so a
    /// listener may subscribe or unsubscribe.
    pub(crate) fn notify(&self, snapshot: &Arc<Snapshot>) {
        let listeners: Vec<Listener> = lock(&self.registry)
            .entries
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(snapshot);
        }
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.registry).entries.len()
    }
}

/// Handle returned by `ClinicStore::subscribe`.
///
/// Dropping it (or calling `unsubscribe`) removes the listener.
#[must_use = "dropping a Subscription removes the listener"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn unsubscribe(self) {}

    /// Keep the listener registered for the lifetime of the store.
    pub fn detach(mut self) {
        self.registry = Weak::new();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).entries.retain(|(id, _)| *id != self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
