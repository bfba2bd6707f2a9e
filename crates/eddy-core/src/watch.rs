//! Key-scoped watcher registry for the reactive read layer.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// Callback invoked with the current effective value of a watched key.
pub type WatchFn = dyn Fn(&Value) + Send + Sync;

/// Identity of one watch registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WatchId(u64);

/// Per-key subscription table. Callbacks for a key fire in registration
/// order.
#[derive(Default)]
pub(crate) struct WatcherRegistry {
    next_id: u64,
    watchers: HashMap<String, Vec<(WatchId, Arc<WatchFn>)>>,
}

impl WatcherRegistry {
    pub(crate) fn subscribe(&mut self, key: &str, callback: Arc<WatchFn>) -> WatchId {
        let id = WatchId(self.next_id);
        self.next_id += 1;
        self.watchers
            .entry(key.to_string())
            .or_default()
            .push((id, callback));
        id
    }

    /// Remove one registration. Removing an already-removed id is a no-op.
    pub(crate) fn unsubscribe(&mut self, key: &str, id: WatchId) {
        if let Some(entries) = self.watchers.get_mut(key) {
            entries.retain(|(entry_id, _)| *entry_id != id);
            if entries.is_empty() {
                self.watchers.remove(key);
            }
        }
    }

    /// Snapshot of the callbacks for `key`, in registration order.
    ///
    /// Snapshotting lets the caller invoke callbacks without holding the
    /// registry lock, so a callback may itself watch or unsubscribe.
    pub(crate) fn callbacks(&self, key: &str) -> Vec<Arc<WatchFn>> {
        self.watchers
            .get(key)
            .map(|entries| entries.iter().map(|(_, cb)| cb.clone()).collect())
            .unwrap_or_default()
    }
}

/// Handle returned by [`Client::watch`](crate::Client::watch).
///
/// The subscription lives until [`unsubscribe`](Self::unsubscribe) is
/// called; dropping the handle does not remove it.
pub struct WatchHandle {
    registry: Weak<Mutex<WatcherRegistry>>,
    key: String,
    id: WatchId,
}

impl WatchHandle {
    pub(crate) fn new(registry: Weak<Mutex<WatcherRegistry>>, key: String, id: WatchId) -> Self {
        WatchHandle { registry, key, id }
    }

    /// Remove exactly this registration. Calling again is a no-op.
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().unsubscribe(&self.key, self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_callbacks_fire_in_registration_order() {
        let mut registry = WatcherRegistry::default();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let order = order.clone();
            registry.subscribe(
                "value",
                Arc::new(move |_value: &Value| order.lock().push(tag)),
            );
        }

        for callback in registry.callbacks("value") {
            callback(&json!(1));
        }
        assert_eq!(*order.lock(), vec!["first", "second"]);
    }

    #[test]
    fn test_unsubscribe_removes_exactly_one() {
        let mut registry = WatcherRegistry::default();
        let hits = Arc::new(AtomicUsize::new(0));

        let kept = hits.clone();
        registry.subscribe(
            "k",
            Arc::new(move |_| {
                kept.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let removed = hits.clone();
        let id = registry.subscribe(
            "k",
            Arc::new(move |_| {
                removed.fetch_add(10, Ordering::SeqCst);
            }),
        );

        registry.unsubscribe("k", id);
        // Second removal of the same id is a no-op.
        registry.unsubscribe("k", id);

        for callback in registry.callbacks("k") {
            callback(&json!(0));
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unwatched_key_has_no_callbacks() {
        let registry = WatcherRegistry::default();
        assert!(registry.callbacks("nothing").is_empty());
    }

    #[test]
    fn test_handle_unsubscribe_after_registry_dropped() {
        let registry = Arc::new(Mutex::new(WatcherRegistry::default()));
        let id = registry.lock().subscribe("k", Arc::new(|_| {}));
        let handle = WatchHandle::new(Arc::downgrade(&registry), "k".to_string(), id);
        drop(registry);
        // Must not panic.
        handle.unsubscribe();
    }
}
