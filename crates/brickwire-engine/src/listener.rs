/*!
 * Update listeners.
 *
 * Listeners are notified once per completed polling cycle. Registration is
 * by identity: adding the same handle twice keeps one entry.
 */
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::controller::Controller;

/// Observer of completed polling cycles
pub trait UpdateListener: Send + Sync {
    /// Called after every successful value exchange of the poller
    fn update_received(&self, controller: &Controller);
}

impl<F> UpdateListener for F
where
    F: Fn(&Controller) + Send + Sync,
{
    fn update_received(&self, controller: &Controller) {
        self(controller)
    }
}

/// Shared listener handle
pub type SharedListener = Arc<dyn UpdateListener>;

/// Registered listeners, deduplicated by handle identity
#[derive(Default)]
pub struct ListenerSet {
    listeners: RwLock<Vec<SharedListener>>,
}

impl std::fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSet")
            .field("len", &self.len())
            .finish()
    }
}

fn same_listener(a: &SharedListener, b: &SharedListener) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

impl ListenerSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Returns false if it was already registered.
    pub fn add(&self, listener: SharedListener) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        if listeners.iter().any(|existing| same_listener(existing, &listener)) {
            return false;
        }
        listeners.push(listener);
        debug!("Registered update listener ({} total)", listeners.len());
        true
    }

    /// Remove every registration of a listener and return how many were dropped
    pub fn remove(&self, listener: &SharedListener) -> usize {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|existing| !same_listener(existing, listener));
        before - listeners.len()
    }

    /// The listeners registered right now
    pub fn snapshot(&self) -> Vec<SharedListener> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no listener is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> SharedListener {
        Arc::new(|_: &Controller| {})
    }

    #[test]
    fn test_add_is_idempotent() {
        let set = ListenerSet::new();
        let listener = noop();

        assert!(set.add(listener.clone()));
        assert!(!set.add(listener.clone()));
        assert_eq!(set.len(), 1);

        assert!(set.add(noop()));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_remove_purges_and_counts() {
        let set = ListenerSet::new();
        let listener = noop();
        let other = noop();
        set.add(listener.clone());
        set.add(other.clone());

        assert_eq!(set.remove(&listener), 1);
        assert_eq!(set.remove(&listener), 0);
        assert_eq!(set.len(), 1);
        assert!(same_listener(&set.snapshot()[0], &other));

        set.remove(&other);
        assert!(set.is_empty());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let set = ListenerSet::new();
        set.add(noop());

        let snapshot = set.snapshot();
        set.add(noop());
        assert_eq!(snapshot.len(), 1);
        assert_eq!(set.len(), 2);
    }
}
