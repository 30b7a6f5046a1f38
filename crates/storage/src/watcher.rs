//! Last-add-confirmed watch registration.

use std::sync::Arc;

use ledger_host_types::{EntryId, LedgerId};

/// Delivered to a [`LacWatcher`] once the ledger's LAC moves past the value
/// the watcher registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastAddConfirmedUpdateNotification {
    /// Ledger whose LAC advanced.
    pub ledger_id: LedgerId,
    /// The new last-add-confirmed.
    pub last_add_confirmed: EntryId,
}

/// Long-poll subscriber for LAC advances.
///
/// Implementations must not block: stores invoke `update` on the thread that
/// advanced the LAC.
pub trait LacWatcher: Send + Sync {
    /// Called at most once per registration.
    fn update(&self, notification: LastAddConfirmedUpdateNotification);
}

/// Returns true when both arcs point at the same watcher.
///
/// Compares data addresses only; vtable pointers for the same type may differ
/// across codegen units.
pub(crate) fn same_watcher(a: &Arc<dyn LacWatcher>, b: &Arc<dyn LacWatcher>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Registered watchers of a single ledger, each with the LAC it last saw.
#[derive(Default)]
pub struct WatcherSet {
    watchers: Vec<(EntryId, Arc<dyn LacWatcher>)>,
}

impl WatcherSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `watcher` to fire once the LAC exceeds `previous_lac`.
    ///
    /// Re-registering the same watcher replaces its previous value.
    pub fn register(&mut self, previous_lac: EntryId, watcher: Arc<dyn LacWatcher>) {
        match self.watchers.iter_mut().find(|(_, w)| same_watcher(w, &watcher)) {
            Some(slot) => slot.0 = previous_lac,
            None => self.watchers.push((previous_lac, watcher)),
        }
    }

    /// Removes `watcher`. Returns whether it was registered.
    pub fn cancel(&mut self, watcher: &Arc<dyn LacWatcher>) -> bool {
        let before = self.watchers.len();
        self.watchers.retain(|(_, w)| !same_watcher(w, watcher));
        self.watchers.len() != before
    }

    /// Removes and returns every watcher whose registered LAC is below `lac`.
    ///
    /// Callers notify the returned watchers after releasing their own locks.
    pub fn take_ready(&mut self, lac: EntryId) -> Vec<Arc<dyn LacWatcher>> {
        let mut ready = Vec::new();
        self.watchers.retain(|(previous, watcher)| {
            if lac > *previous {
                ready.push(Arc::clone(watcher));
                false
            } else {
                true
            }
        });
        ready
    }

    /// Number of registered watchers.
    pub fn len(&self) -> usize {
        self.watchers.len()
    }

    /// Returns true when no watcher is registered.
    pub fn is_empty(&self) -> bool {
        self.watchers.is_empty()
    }
}

impl std::fmt::Debug for WatcherSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherSet").field("len", &self.watchers.len()).finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<LastAddConfirmedUpdateNotification>>);

    impl LacWatcher for Recorder {
        fn update(&self, notification: LastAddConfirmedUpdateNotification) {
            self.0.lock().push(notification);
        }
    }

    #[test]
    fn test_take_ready_only_returns_passed_watchers() {
        let early: Arc<dyn LacWatcher> = Arc::new(Recorder::default());
        let late: Arc<dyn LacWatcher> = Arc::new(Recorder::default());
        let mut set = WatcherSet::new();
        set.register(EntryId::new(1), Arc::clone(&early));
        set.register(EntryId::new(5), Arc::clone(&late));

        let ready = set.take_ready(EntryId::new(3));
        assert_eq!(ready.len(), 1);
        assert!(same_watcher(&ready[0], &early));
        assert_eq!(set.len(), 1);

        assert!(set.take_ready(EntryId::new(5)).is_empty(), "LAC must exceed the registered value");
        assert_eq!(set.take_ready(EntryId::new(6)).len(), 1);
        assert!(set.is_empty());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let watcher: Arc<dyn LacWatcher> = Arc::new(Recorder::default());
        let mut set = WatcherSet::new();
        set.register(EntryId::new(0), Arc::clone(&watcher));
        assert!(set.cancel(&watcher));
        assert!(!set.cancel(&watcher));
        assert!(set.is_empty());
    }

    #[test]
    fn test_register_same_watcher_twice_replaces() {
        let watcher: Arc<dyn LacWatcher> = Arc::new(Recorder::default());
        let mut set = WatcherSet::new();
        set.register(EntryId::new(0), Arc::clone(&watcher));
        set.register(EntryId::new(9), Arc::clone(&watcher));
        assert_eq!(set.len(), 1);
        assert!(set.take_ready(EntryId::new(5)).is_empty());
    }
}
