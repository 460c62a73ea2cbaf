#![forbid(unsafe_code)]

//! In-memory binding targets and lookup for headless hosts and tests.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use sprig_core::Value;

use super::bind::{ElementLookup, LookupError};
use super::binding::BindTarget;

/// A [`BindTarget`] that records property writes in memory.
///
/// Starts attached. [`detach`](Self::detach) simulates removal from the
/// document.
#[derive(Debug)]
pub struct HeadlessTarget {
    properties: RefCell<BTreeMap<String, Value>>,
    connected: Cell<bool>,
    writes: Cell<usize>,
}

impl HeadlessTarget {
    #[must_use]
    pub fn new() -> Self {
        Self {
            properties: RefCell::new(BTreeMap::new()),
            connected: Cell::new(true),
            writes: Cell::new(0),
        }
    }

    /// Current value of a property, if it was ever written.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<Value> {
        self.properties.borrow().get(name).cloned()
    }

    /// Total number of property writes.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes.get()
    }

    pub fn detach(&self) {
        self.connected.set(false);
    }

    pub fn attach(&self) {
        self.connected.set(true);
    }
}

impl Default for HeadlessTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl BindTarget for HeadlessTarget {
    fn set_property(&self, property: &str, value: &Value) {
        self.writes.set(self.writes.get() + 1);
        self.properties
            .borrow_mut()
            .insert(property.to_owned(), value.clone());
    }

    fn is_connected(&self) -> bool {
        self.connected.get()
    }
}

/// [`ElementLookup`] over a fixed selector table.
///
/// Resolves immediately: a selector that is not registered fails with
/// [`LookupError::NotFound`] without waiting out the timeout.
#[derive(Default)]
pub struct HeadlessLookup {
    targets: RefCell<BTreeMap<String, Rc<dyn BindTarget>>>,
    lookups: Cell<usize>,
}

impl HeadlessLookup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, selector: &str, target: Rc<dyn BindTarget>) {
        self.targets.borrow_mut().insert(selector.to_owned(), target);
    }

    pub fn remove(&self, selector: &str) -> bool {
        self.targets.borrow_mut().remove(selector).is_some()
    }

    /// Number of `wait_for` calls served.
    #[must_use]
    pub fn lookups(&self) -> usize {
        self.lookups.get()
    }
}

impl ElementLookup for HeadlessLookup {
    async fn wait_for(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Rc<dyn BindTarget>, LookupError> {
        self.lookups.set(self.lookups.get() + 1);
        if selector.trim().is_empty() {
            return Err(LookupError::InvalidSelector(selector.to_owned()));
        }
        self.targets
            .borrow()
            .get(selector)
            .cloned()
            .ok_or_else(|| LookupError::NotFound {
                selector: selector.to_owned(),
                timeout,
            })
    }
}

impl std::fmt::Debug for HeadlessLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeadlessLookup")
            .field("selectors", &self.targets.borrow().keys().collect::<Vec<_>>())
            .field("lookups", &self.lookups.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_writes() {
        let t = HeadlessTarget::new();
        assert!(t.is_connected());
        t.set_property("textContent", &Value::from("hi"));
        t.set_property("textContent", &Value::from("there"));
        assert_eq!(t.property("textContent"), Some(Value::from("there")));
        assert_eq!(t.writes(), 2);
        t.detach();
        assert!(!t.is_connected());
    }

    #[test]
    fn lookup_resolves_registered_selectors() {
        let lookup = HeadlessLookup::new();
        lookup.insert("#a", Rc::new(HeadlessTarget::new()));
        let found = pollster::block_on(lookup.wait_for("#a", Duration::from_millis(5)));
        assert!(found.is_ok());
        let missing = pollster::block_on(lookup.wait_for("#b", Duration::from_millis(5)));
        assert!(matches!(missing, Err(LookupError::NotFound { .. })));
        assert!(lookup.remove("#a"));
        assert_eq!(lookup.lookups(), 2);
    }
}
