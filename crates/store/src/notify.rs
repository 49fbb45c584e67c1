//! Change notifications
//!
//! An explicit observer list stands in for a client-side change feed:
//! subscribers see the deserialized document of every committed write.
//! Delivery happens after the writer region is released, synchronously in
//! the writing caller's context, so only committed state is ever observed.
//! A slow or panicking subscriber delays or faults the triggering write;
//! subscribers must not re-enter the same store synchronously.

use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;

/// A change-notification callback.
pub type ChangeObserver = Arc<dyn Fn(&Value) + Send + Sync>;

/// Registered observers, in subscription order.
#[derive(Default)]
pub struct Observers {
    subscribers: RwLock<Vec<ChangeObserver>>,
}

impl Observers {
    /// Create an empty observer list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer.
    pub fn subscribe(&self, observer: ChangeObserver) {
        self.subscribers.write().push(observer);
    }

    /// Deliver a committed document to every observer, in order.
    pub fn notify(&self, document: &Value) {
        let subscribers = self.subscribers.read().clone();
        for observer in &subscribers {
            observer(document);
        }
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Whether no observers are registered.
    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }
}

impl std::fmt::Debug for Observers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("subscribers", &self.len())
            .finish()
    }
}
