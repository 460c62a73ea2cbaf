#![forbid(unsafe_code)]

//! Flush subscribers.
//!
//! A subscriber is called once per flush that changed at least one path,
//! with a snapshot of the state and the changed paths. Subscribers run in
//! registration order. A subscriber returning `Err` is logged and recorded;
//! the remaining subscribers still run.
//!
//! Unsubscribing is explicit through [`Subscription::unsubscribe`]. It is
//! idempotent and safe from inside a callback: the running flush works on a
//! copy of the subscriber list, so removal takes effect from the next flush.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use sprig_core::{CallbackError, KeyPath, StoreError, Value};

type SubscriberFn = Rc<dyn Fn(&Value, &[KeyPath]) -> Result<(), CallbackError>>;

/// Registration id of a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Ordered set of subscriber callbacks.
#[derive(Default)]
pub struct SubscriberRegistry {
    entries: Vec<(SubscriberId, SubscriberFn)>,
    next_id: u64,
}

impl SubscriberRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        callback: impl Fn(&Value, &[KeyPath]) -> Result<(), CallbackError> + 'static,
    ) -> SubscriberId {
        self.next_id += 1;
        let id = SubscriberId(self.next_id);
        self.entries.push((id, Rc::new(callback)));
        id
    }

    /// Returns `false` if the subscriber was already removed.
    pub fn remove(&mut self, id: SubscriberId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    #[must_use]
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.entries.iter().any(|(entry, _)| *entry == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Call every subscriber registered when the call starts.
    ///
    /// The registry borrow is released before any callback runs, so
    /// callbacks may subscribe, unsubscribe, or write to the store.
    /// Returns the number notified and the failures.
    pub fn notify_all(
        registry: &RefCell<Self>,
        state: &Value,
        changed: &[KeyPath],
    ) -> (usize, Vec<StoreError>) {
        let callbacks: Vec<(SubscriberId, SubscriberFn)> = registry.borrow().entries.clone();
        let mut failures = Vec::new();
        for (id, callback) in &callbacks {
            if let Err(err) = callback(state, changed) {
                tracing::error!(subscriber = id.get(), error = %err, "subscriber failed");
                failures.push(StoreError::SubscriberFailure {
                    subscriber: id.get(),
                    message: err.to_string(),
                });
            }
        }
        (callbacks.len(), failures)
    }
}

impl std::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("subscribers", &self.entries.len())
            .finish()
    }
}

/// Unsubscribe handle returned by `Store::subscribe`.
///
/// Dropping the handle keeps the subscriber registered.
#[derive(Clone)]
pub struct Subscription {
    id: SubscriberId,
    registry: Weak<RefCell<SubscriberRegistry>>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriberId, registry: &Rc<RefCell<SubscriberRegistry>>) -> Self {
        Self {
            id,
            registry: Rc::downgrade(registry),
        }
    }

    #[must_use]
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Remove the subscriber. Returns `false` if it was already removed.
    pub fn unsubscribe(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|reg| reg.borrow_mut().remove(self.id))
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|reg| reg.borrow().contains(self.id))
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
