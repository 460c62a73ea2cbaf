#![forbid(unsafe_code)]

//! Bindings from key paths to target properties.
//!
//! A binding keeps one property of a [`BindTarget`] in sync with the value
//! at a key path, optionally through a [`Transform`]. The registry groups
//! bindings by key path so that routing a flush costs one relatedness check
//! per distinct path rather than per binding.
//!
//! # Lifecycle
//!
//! Bindings are never destroyed by the store on its own initiative while
//! their target is attached. Once [`BindTarget::is_connected`] reports
//! `false`, refreshes skip the binding and the next [`BindingRegistry::cleanup`]
//! removes it. [`BindingHandle::unbind`] removes one explicitly.
//!
//! # Invariants
//!
//! 1. Groups are visited in first-registration order; bindings within a
//!    group in registration order.
//! 2. The path index always points at the group holding that path.
//! 3. No group is empty after `remove` or `cleanup`.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;
use sprig_core::{CallbackError, KeyPath, Value};

/// Anything a binding can write into.
///
/// In a browser this is a DOM element; headless hosts can use
/// [`HeadlessTarget`](super::HeadlessTarget).
pub trait BindTarget {
    /// Assign `value` to the named property.
    fn set_property(&self, property: &str, value: &Value);

    /// Whether the target is still attached to its document.
    fn is_connected(&self) -> bool;
}

/// Value transform applied before a binding writes its target.
#[derive(Clone)]
pub struct Transform {
    apply: Rc<dyn Fn(&Value) -> Result<Value, CallbackError>>,
}

impl Transform {
    /// Fallible transform. An `Err` leaves the target untouched.
    pub fn new(f: impl Fn(&Value) -> Result<Value, CallbackError> + 'static) -> Self {
        Self { apply: Rc::new(f) }
    }

    /// Infallible transform.
    pub fn map(f: impl Fn(&Value) -> Value + 'static) -> Self {
        Self::new(move |v| Ok(f(v)))
    }

    pub fn apply(&self, value: &Value) -> Result<Value, CallbackError> {
        (self.apply)(value)
    }
}

impl std::fmt::Debug for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transform").finish_non_exhaustive()
    }
}

/// Registration id of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(u64);

impl BindingId {
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// A binding captured for one refresh, detached from the registry borrow.
#[derive(Clone)]
pub struct ActiveBinding {
    pub id: BindingId,
    pub path: KeyPath,
    pub property: Rc<str>,
    pub target: Rc<dyn BindTarget>,
    pub transform: Option<Transform>,
}

impl ActiveBinding {
    /// Compute the value to write for `current`, applying the transform.
    pub fn resolve(&self, current: &Value) -> Result<Value, CallbackError> {
        match &self.transform {
            Some(t) => t.apply(current),
            None => Ok(current.clone()),
        }
    }
}

impl std::fmt::Debug for ActiveBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveBinding")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("property", &self.property)
            .field("transformed", &self.transform.is_some())
            .finish_non_exhaustive()
    }
}

struct BindingGroup {
    path: KeyPath,
    entries: Vec<ActiveBinding>,
}

/// Key path → bindings, in registration order.
#[derive(Default)]
pub struct BindingRegistry {
    groups: Vec<BindingGroup>,
    index: FxHashMap<KeyPath, usize>,
    next_id: u64,
    len: usize,
}

impl BindingRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a binding and return a copy of it for the initial application.
    pub fn register(
        &mut self,
        path: KeyPath,
        target: Rc<dyn BindTarget>,
        property: &str,
        transform: Option<Transform>,
    ) -> ActiveBinding {
        self.next_id += 1;
        let binding = ActiveBinding {
            id: BindingId(self.next_id),
            path: path.clone(),
            property: Rc::from(property),
            target,
            transform,
        };
        let slot = match self.index.get(&path) {
            Some(&slot) => slot,
            None => {
                self.groups.push(BindingGroup {
                    path: path.clone(),
                    entries: Vec::new(),
                });
                let slot = self.groups.len() - 1;
                self.index.insert(path, slot);
                slot
            }
        };
        self.groups[slot].entries.push(binding.clone());
        self.len += 1;
        binding
    }

    /// Bindings whose path is related to any of `changed`.
    #[must_use]
    pub fn affected(&self, changed: &[KeyPath]) -> Vec<ActiveBinding> {
        self.groups
            .iter()
            .filter(|group| changed.iter().any(|c| group.path.is_related_to(c)))
            .flat_map(|group| group.entries.iter().cloned())
            .collect()
    }

    /// Remove one binding. Returns `false` if it was already gone.
    pub fn remove(&mut self, id: BindingId) -> bool {
        let mut removed = false;
        for group in &mut self.groups {
            if let Some(pos) = group.entries.iter().position(|b| b.id == id) {
                group.entries.remove(pos);
                removed = true;
                break;
            }
        }
        if removed {
            self.len -= 1;
            self.compact();
        }
        removed
    }

    /// Drop every binding whose target is detached. Returns how many went.
    pub fn cleanup(&mut self) -> usize {
        let before = self.len;
        for group in &mut self.groups {
            group.entries.retain(|b| b.target.is_connected());
        }
        self.len = self.groups.iter().map(|g| g.entries.len()).sum();
        self.compact();
        before - self.len
    }

    #[must_use]
    pub fn contains(&self, id: BindingId) -> bool {
        self.groups
            .iter()
            .any(|g| g.entries.iter().any(|b| b.id == id))
    }

    /// Number of live bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of distinct bound paths.
    #[must_use]
    pub fn path_count(&self) -> usize {
        self.groups.len()
    }

    fn compact(&mut self) {
        if self.groups.iter().all(|g| !g.entries.is_empty()) {
            return;
        }
        self.groups.retain(|g| !g.entries.is_empty());
        self.index = self
            .groups
            .iter()
            .enumerate()
            .map(|(slot, g)| (g.path.clone(), slot))
            .collect();
    }
}

impl std::fmt::Debug for BindingRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingRegistry")
            .field("bindings", &self.len)
            .field("paths", &self.groups.len())
            .finish()
    }
}

/// Disposer for one binding.
///
/// Dropping the handle does not unbind; bindings live until their target
/// detaches or [`unbind`](Self::unbind) is called.
#[derive(Clone)]
pub struct BindingHandle {
    id: BindingId,
    registry: Weak<RefCell<BindingRegistry>>,
}

impl BindingHandle {
    pub(crate) fn new(id: BindingId, registry: &Rc<RefCell<BindingRegistry>>) -> Self {
        Self {
            id,
            registry: Rc::downgrade(registry),
        }
    }

    #[must_use]
    pub fn id(&self) -> BindingId {
        self.id
    }

    /// Remove the binding. Safe to call repeatedly; a flush that already
    /// captured the binding still applies it once.
    pub fn unbind(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|reg| reg.borrow_mut().remove(self.id))
    }

    /// Whether the binding is still registered.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|reg| reg.borrow().contains(self.id))
    }
}

impl std::fmt::Debug for BindingHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::HeadlessTarget;

    fn p(raw: &str) -> KeyPath {
        KeyPath::parse(raw).unwrap()
    }

    fn target() -> Rc<HeadlessTarget> {
        Rc::new(HeadlessTarget::new())
    }

    #[test]
    fn register_groups_by_path() {
        let mut reg = BindingRegistry::new();
        reg.register(p("a"), target(), "text", None);
        reg.register(p("a"), target(), "title", None);
        reg.register(p("b"), target(), "text", None);
        assert_eq!(reg.len(), 3);
        assert_eq!(reg.path_count(), 2);
    }

    #[test]
    fn affected_uses_segment_relatedness() {
        let mut reg = BindingRegistry::new();
        let user = reg.register(p("user"), target(), "text", None);
        let name = reg.register(p("user.name"), target(), "text", None);
        let username = reg.register(p("username"), target(), "text", None);

        let ids = |changed: &[KeyPath]| -> Vec<BindingId> {
            reg.affected(changed).iter().map(|b| b.id).collect()
        };
        assert_eq!(ids(&[p("user.name")]), vec![user.id, name.id]);
        assert_eq!(ids(&[p("user")]), vec![user.id, name.id]);
        assert_eq!(ids(&[p("username")]), vec![username.id]);
        assert_eq!(
            ids(&[KeyPath::all()]),
            vec![user.id, name.id, username.id]
        );
        assert!(ids(&[p("other")]).is_empty());
    }

    #[test]
    fn same_path_keeps_registration_order() {
        let mut reg = BindingRegistry::new();
        let first = reg.register(p("a"), target(), "x", None);
        reg.register(p("b"), target(), "x", None);
        let third = reg.register(p("a"), target(), "y", None);
        let ids: Vec<_> = reg.affected(&[p("a")]).iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![first.id, third.id]);
    }

    #[test]
    fn remove_compacts_index() {
        let mut reg = BindingRegistry::new();
        let a = reg.register(p("a"), target(), "x", None);
        let b = reg.register(p("b"), target(), "x", None);
        assert!(reg.remove(a.id));
        assert!(!reg.remove(a.id));
        assert_eq!(reg.path_count(), 1);
        // Re-registering "a" after its group vanished must still work.
        let a2 = reg.register(p("a"), target(), "x", None);
        let ids: Vec<_> = reg.affected(&[p("a")]).iter().map(|x| x.id).collect();
        assert_eq!(ids, vec![a2.id]);
        assert!(reg.contains(b.id));
    }

    #[test]
    fn cleanup_drops_detached_targets() {
        let mut reg = BindingRegistry::new();
        let live = target();
        let dead = target();
        reg.register(p("a"), live.clone(), "x", None);
        let gone = reg.register(p("a"), dead.clone(), "x", None);
        reg.register(p("b"), dead.clone(), "x", None);
        dead.detach();

        assert_eq!(reg.cleanup(), 2);
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.path_count(), 1);
        assert!(!reg.contains(gone.id));
        assert_eq!(reg.cleanup(), 0);
    }

    #[test]
    fn handle_unbind_is_idempotent() {
        let reg = Rc::new(RefCell::new(BindingRegistry::new()));
        let binding = reg.borrow_mut().register(p("a"), target(), "x", None);
        let handle = BindingHandle::new(binding.id, &reg);
        assert!(handle.is_bound());
        assert!(handle.unbind());
        assert!(!handle.unbind());
        assert!(!handle.is_bound());
    }

    #[test]
    fn transform_resolution() {
        let binding = ActiveBinding {
            id: BindingId(1),
            path: p("n"),
            property: Rc::from("text"),
            target: target(),
            transform: Some(Transform::map(|v| {
                Value::from(format!("n={}", v.to_display_string()))
            })),
        };
        assert_eq!(
            binding.resolve(&Value::from(4)).unwrap(),
            Value::from("n=4")
        );
    }
}
