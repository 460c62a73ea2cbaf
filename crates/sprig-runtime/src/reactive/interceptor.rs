#![forbid(unsafe_code)]

//! Write interception and path tracking.
//!
//! Every write into the store's tree goes through [`intercept_write`], which
//! assigns the value and reports a [`Change`] only when the new value differs
//! from the old one. [`StateCursor`] is the tracked view handed to callers:
//! descending into a mapping yields a new cursor carrying the accumulated
//! base path, so a write two levels down is attributed `a.b.c`, not `c`.
//!
//! Sequences and scalars are returned as plain values. A path can never
//! traverse a sequence, so writes inside one are not tracked.

use sprig_core::{KeyPath, StoreError, Value};

use super::store::Store;

/// An observed write that changed the tree.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Change {
    pub(crate) path: KeyPath,
    pub(crate) old: Option<Value>,
    pub(crate) new: Value,
}

/// Assign `value` at `path` inside `tree`.
///
/// Returns `Ok(None)` when the slot already held an equal value.
pub(crate) fn intercept_write(
    tree: &mut Value,
    path: &KeyPath,
    value: Value,
) -> Result<Option<Change>, StoreError> {
    let parent = tree.parent_mapping_mut(path)?;
    let key = path.last().unwrap_or_default();
    match parent.get_mut(key) {
        Some(slot) if *slot == value => Ok(None),
        Some(slot) => {
            let old = std::mem::replace(slot, value.clone());
            Ok(Some(Change {
                path: path.clone(),
                old: Some(old),
                new: value,
            }))
        }
        None => {
            parent.insert(key.to_owned(), value.clone());
            Ok(Some(Change {
                path: path.clone(),
                old: None,
                new: value,
            }))
        }
    }
}

/// Tracked view of one mapping node in a store's tree.
///
/// Cursors hold no borrow of the tree; every read goes back to the live
/// state, so a cursor observes writes made after it was created.
#[derive(Clone)]
pub struct StateCursor<'s> {
    store: &'s Store,
    base: KeyPath,
}

impl<'s> StateCursor<'s> {
    pub(crate) fn new(store: &'s Store, base: KeyPath) -> Self {
        Self { store, base }
    }

    /// Path of the node this cursor tracks.
    #[must_use]
    pub fn path(&self) -> &KeyPath {
        &self.base
    }

    /// Copy of the child value at `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        let path = self.base.child(key).ok()?;
        self.store.get_path(&path)
    }

    /// Tracked cursor for the mapping at `key`.
    ///
    /// `None` if the child is missing or is not a mapping.
    #[must_use]
    pub fn child(&self, key: &str) -> Option<StateCursor<'s>> {
        let path = self.base.child(key).ok()?;
        let is_mapping = self
            .store
            .with_state(|tree| tree.get_path(&path).is_some_and(Value::is_mapping));
        is_mapping.then(|| StateCursor::new(self.store, path))
    }

    /// Keys of the tracked mapping, in order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.store.with_state(|tree| {
            tree.get_path(&self.base)
                .and_then(Value::as_mapping)
                .map(|map| map.keys().cloned().collect())
                .unwrap_or_default()
        })
    }

    /// Copy of the whole tracked node.
    #[must_use]
    pub fn read(&self) -> Value {
        self.store.get_path(&self.base).unwrap_or_default()
    }

    /// Write `value` to `key` under this node.
    ///
    /// Returns whether the write changed the tree (and was scheduled).
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<bool, StoreError> {
        let path = self.base.child(key)?;
        self.store.set_path(&path, value.into())
    }
}

impl std::fmt::Debug for StateCursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateCursor")
            .field("path", &self.base)
            .finish_non_exhaustive()
    }
}
