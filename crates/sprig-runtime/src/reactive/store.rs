#![forbid(unsafe_code)]

//! The reactive store.
//!
//! # Design
//!
//! [`Store`] is a cheap, clonable handle (`Rc`) to one state tree plus the
//! machinery that keeps observers in sync with it:
//!
//! ```text
//! set / set_state / cursor.set
//!   → intercept_write           // assign, compare old vs new
//!   → UpdateScheduler::record   // add path, arm at most one frame
//!   … next frame …
//!   → flush                     // drain paths
//!       → subscribers           // (snapshot, changed)
//!       → bindings              // refresh related, attached targets
//! ```
//!
//! All borrows of the tree and the registries are released before any user
//! callback runs, so subscribers, transforms, and targets may read and write
//! the store. Writes made during a flush are picked up by a separately
//! scheduled follow-up flush, never by recursion into the running one.
//!
//! # Failure Modes
//!
//! | Failure | Behavior |
//! |---------|----------|
//! | Non-mapping `set_state` partial | `Err(InvalidArgument)`, tree untouched |
//! | Write through a scalar/sequence/missing node | `Err(InvalidArgument)`, tree untouched |
//! | Transform returns `Err` | logged, target keeps its last value, recorded in the report |
//! | Subscriber returns `Err` | logged, remaining subscribers run, recorded in the report |
//! | Target detached | refresh skipped; removed on the next cleanup |

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use sprig_core::{CallbackError, KeyPath, StoreError, Value};
use tracing::{debug, debug_span, error, trace};

use super::binding::{ActiveBinding, BindTarget, BindingHandle, BindingRegistry, Transform};
use super::interceptor::{StateCursor, intercept_write};
use super::scheduler::{FrameScheduler, ScheduleAction, UpdateScheduler};
use super::subscriber::{SubscriberRegistry, Subscription};
use crate::config::StoreConfig;

/// How [`Store::set_state`] applies a partial tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetOptions {
    /// Merge top-level keys (`true`) or replace the whole tree (`false`).
    pub merge: bool,
}

impl SetOptions {
    #[must_use]
    pub fn merge() -> Self {
        Self { merge: true }
    }

    #[must_use]
    pub fn replace() -> Self {
        Self { merge: false }
    }
}

impl Default for SetOptions {
    fn default() -> Self {
        Self::merge()
    }
}

/// Outcome of one flush.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlushReport {
    /// Paths delivered to subscribers and bindings, in first-write order.
    pub changed: Vec<KeyPath>,
    /// Subscribers called.
    pub subscribers_notified: usize,
    /// Bindings whose target was written.
    pub bindings_applied: usize,
    /// Related bindings skipped because their target was detached.
    pub bindings_skipped: usize,
    /// Transform and subscriber failures, in the order they happened.
    pub failures: Vec<StoreError>,
}

impl FlushReport {
    /// Whether the flush had nothing to deliver.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }
}

struct StoreInner {
    tree: RefCell<Value>,
    updates: RefCell<UpdateScheduler>,
    frames: Box<dyn FrameScheduler>,
    bindings: Rc<RefCell<BindingRegistry>>,
    subscribers: Rc<RefCell<SubscriberRegistry>>,
    config: StoreConfig,
    last_cleanup: Cell<Duration>,
    flush_count: Cell<u64>,
    last_report: RefCell<Option<FlushReport>>,
    /// Set while `request_frame` runs; a callback seen then ran inline.
    requesting: Cell<bool>,
    ran_inline: Cell<bool>,
}

/// Shared handle to a reactive state tree.
///
/// Cloning a `Store` creates another handle to the **same** state,
/// scheduler, bindings, and subscribers.
#[derive(Clone)]
pub struct Store {
    inner: Rc<StoreInner>,
}

impl Store {
    /// Create a store with the default [`StoreConfig`].
    ///
    /// `initial` must be a mapping.
    pub fn new(initial: Value, frames: impl FrameScheduler + 'static) -> Result<Self, StoreError> {
        Self::with_config(initial, frames, StoreConfig::default())
    }

    pub fn with_config(
        initial: Value,
        frames: impl FrameScheduler + 'static,
        config: StoreConfig,
    ) -> Result<Self, StoreError> {
        require_mapping(&initial, "initial state")?;
        config
            .validate()
            .map_err(|err| StoreError::invalid(err.to_string()))?;
        Ok(Self {
            inner: Rc::new(StoreInner {
                tree: RefCell::new(initial),
                updates: RefCell::new(UpdateScheduler::new(config.max_chained_flushes)),
                frames: Box::new(frames),
                bindings: Rc::new(RefCell::new(BindingRegistry::new())),
                subscribers: Rc::new(RefCell::new(SubscriberRegistry::new())),
                config,
                last_cleanup: Cell::new(Duration::ZERO),
                flush_count: Cell::new(0),
                last_report: RefCell::new(None),
                requesting: Cell::new(false),
                ran_inline: Cell::new(false),
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    // -- Reads --------------------------------------------------------------

    /// Tracked cursor on the root of the live tree.
    #[must_use]
    pub fn state(&self) -> StateCursor<'_> {
        StateCursor::new(self, KeyPath::root())
    }

    /// Owned copy of the whole tree.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        self.inner.tree.borrow().clone()
    }

    /// Copy of the value at a dotted path. Malformed paths read as `None`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Value> {
        let path = KeyPath::parse(path).ok()?;
        self.get_path(&path)
    }

    #[must_use]
    pub fn get_path(&self, path: &KeyPath) -> Option<Value> {
        self.inner.tree.borrow().get_path(path).cloned()
    }

    /// Borrow the live tree for the duration of `f`.
    ///
    /// `f` must not write to the store.
    pub fn with_state<R>(&self, f: impl FnOnce(&Value) -> R) -> R {
        f(&self.inner.tree.borrow())
    }

    // -- Writes -------------------------------------------------------------

    /// Write `value` at a dotted path.
    ///
    /// Returns whether the tree changed. Equal values are not recorded.
    pub fn set(&self, path: &str, value: impl Into<Value>) -> Result<bool, StoreError> {
        let path = KeyPath::parse(path)?;
        self.set_path(&path, value.into())
    }

    pub fn set_path(&self, path: &KeyPath, value: Value) -> Result<bool, StoreError> {
        let change = intercept_write(&mut self.inner.tree.borrow_mut(), path, value)?;
        let Some(change) = change else {
            return Ok(false);
        };
        trace!(path = %change.path, old = ?change.old, new = ?change.new, "write intercepted");
        self.schedule_update(change.path);
        Ok(true)
    }

    /// Apply a partial tree.
    ///
    /// With [`SetOptions::merge`], every top-level key is written through
    /// the interceptor. With [`SetOptions::replace`], the tree is swapped
    /// wholesale and a single `*` change is recorded. Returns the number of
    /// recorded changes.
    pub fn set_state(&self, partial: Value, options: SetOptions) -> Result<usize, StoreError> {
        require_mapping(&partial, "set_state partial")?;
        if !options.merge {
            *self.inner.tree.borrow_mut() = partial;
            debug!("state replaced");
            self.schedule_update(KeyPath::all());
            return Ok(1);
        }

        let Value::Mapping(entries) = partial else {
            return Ok(0);
        };
        let writes = entries
            .into_iter()
            .map(|(key, value)| KeyPath::root().child(&key).map(|path| (path, value)))
            .collect::<Result<Vec<_>, StoreError>>()?;
        let mut changed = 0;
        for (path, value) in writes {
            if self.set_path(&path, value)? {
                changed += 1;
            }
        }
        Ok(changed)
    }

    // -- Observers ----------------------------------------------------------

    /// Register a subscriber called once per flush with changes.
    pub fn subscribe(&self, callback: impl Fn(&Value, &[KeyPath]) + 'static) -> Subscription {
        self.try_subscribe(move |state, changed| {
            callback(state, changed);
            Ok(())
        })
    }

    /// Register a fallible subscriber. An `Err` is logged and recorded in
    /// the flush report without affecting other subscribers.
    pub fn try_subscribe(
        &self,
        callback: impl Fn(&Value, &[KeyPath]) -> Result<(), CallbackError> + 'static,
    ) -> Subscription {
        let id = self.inner.subscribers.borrow_mut().add(callback);
        debug!(subscriber = id.get(), "subscriber registered");
        Subscription::new(id, &self.inner.subscribers)
    }

    /// Bind `property` of `target` to the value at `path`.
    ///
    /// The current value is applied immediately, without scheduling a flush.
    pub fn bind_target(
        &self,
        path: &str,
        target: Rc<dyn BindTarget>,
        property: &str,
    ) -> Result<BindingHandle, StoreError> {
        self.bind_target_with(path, target, property, None)
    }

    /// Like [`bind_target`](Self::bind_target), with an optional transform.
    pub fn bind_target_with(
        &self,
        path: &str,
        target: Rc<dyn BindTarget>,
        property: &str,
        transform: Option<Transform>,
    ) -> Result<BindingHandle, StoreError> {
        let path = KeyPath::parse(path)?;
        if path.is_all() {
            return Err(StoreError::invalid("cannot bind to the '*' sentinel"));
        }
        let binding = self
            .inner
            .bindings
            .borrow_mut()
            .register(path, target, property, transform);
        debug!(
            binding = binding.id.get(),
            path = %binding.path,
            property = %binding.property,
            "binding registered"
        );
        let current = self.get_path(&binding.path).unwrap_or_default();
        if let Err(failure) = apply_binding(&binding, &current) {
            trace!(
                binding = binding.id.get(),
                error = %failure,
                "initial apply failed; binding stays registered"
            );
        }
        Ok(BindingHandle::new(binding.id, &self.inner.bindings))
    }

    /// Remove bindings whose target is detached. Returns how many went.
    pub fn cleanup(&self) -> usize {
        let removed = self.inner.bindings.borrow_mut().cleanup();
        if removed > 0 {
            debug!(removed, "detached bindings cleaned up");
        }
        removed
    }

    /// Host-driven maintenance step.
    ///
    /// `now` is a monotonic timestamp from the host clock. Runs
    /// [`cleanup`](Self::cleanup) once the configured interval has elapsed
    /// since the previous run and returns its result.
    pub fn tick(&self, now: Duration) -> Option<usize> {
        let interval = self.inner.config.cleanup_interval();
        if now.saturating_sub(self.inner.last_cleanup.get()) < interval {
            return None;
        }
        self.inner.last_cleanup.set(now);
        Some(self.cleanup())
    }

    // -- Flushing -----------------------------------------------------------

    /// Flush pending changes now instead of waiting for the armed frame.
    ///
    /// Returns an empty report when nothing is pending or when called from
    /// inside a running flush. A frame already requested stays queued and
    /// later writes coalesce into it.
    pub fn flush_now(&self) -> FlushReport {
        self.flush()
    }

    /// Report of the most recent non-empty flush, if not yet taken.
    pub fn take_last_report(&self) -> Option<FlushReport> {
        self.inner.last_report.borrow_mut().take()
    }

    fn schedule_update(&self, path: KeyPath) {
        let action = self.inner.updates.borrow_mut().record(path);
        if action == ScheduleAction::Arm && self.arm_frame() {
            self.inner.updates.borrow_mut().frame_started();
            self.flush();
        }
    }

    /// Request a frame. Returns `true` if the scheduler ran the callback
    /// inline; the caller then flushes on its own stack.
    fn arm_frame(&self) -> bool {
        debug!("flush armed");
        let weak: Weak<StoreInner> = Rc::downgrade(&self.inner);
        self.inner.requesting.set(true);
        self.inner.frames.request_frame(Box::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if inner.requesting.get() {
                inner.ran_inline.set(true);
                return;
            }
            inner.updates.borrow_mut().frame_started();
            Store { inner }.flush();
        }));
        self.inner.requesting.set(false);
        self.inner.ran_inline.replace(false)
    }

    /// Run one flush, then any follow-ups that inline frames allow.
    ///
    /// Returns the report of the first flush.
    fn flush(&self) -> FlushReport {
        let Some(report) = self.flush_once() else {
            return FlushReport::default();
        };
        loop {
            let action = self.inner.updates.borrow_mut().end_flush();
            if action != ScheduleAction::Arm || !self.arm_frame() {
                break;
            }
            let proceed = self.inner.updates.borrow_mut().chain_inline();
            if !proceed || self.flush_once().is_none() {
                break;
            }
        }
        report
    }

    /// Drain and deliver pending paths. `None` when a flush is already running.
    fn flush_once(&self) -> Option<FlushReport> {
        let changed = self.inner.updates.borrow_mut().begin_flush()?;
        if changed.is_empty() {
            return Some(FlushReport::default());
        }

        let _span = debug_span!("store_flush", changed = changed.len()).entered();
        let mut report = FlushReport {
            changed,
            ..FlushReport::default()
        };

        let snapshot = self.snapshot();
        let (notified, failures) =
            SubscriberRegistry::notify_all(&self.inner.subscribers, &snapshot, &report.changed);
        report.subscribers_notified = notified;
        report.failures.extend(failures);

        let affected = self.inner.bindings.borrow().affected(&report.changed);
        for binding in &affected {
            if !binding.target.is_connected() {
                report.bindings_skipped += 1;
                continue;
            }
            let current = self.get_path(&binding.path).unwrap_or_default();
            match apply_binding(binding, &current) {
                Ok(()) => report.bindings_applied += 1,
                Err(failure) => report.failures.push(failure),
            }
        }

        debug!(
            changed = report.changed.len(),
            subscribers = report.subscribers_notified,
            bindings = report.bindings_applied,
            skipped = report.bindings_skipped,
            failures = report.failures.len(),
            "flush complete"
        );
        self.inner.flush_count.set(self.inner.flush_count.get() + 1);
        *self.inner.last_report.borrow_mut() = Some(report.clone());
        Some(report)
    }

    // -- Introspection ------------------------------------------------------

    /// Paths recorded since the last flush started.
    #[must_use]
    pub fn pending_paths(&self) -> Vec<KeyPath> {
        self.inner.updates.borrow().pending().paths().to_vec()
    }

    #[must_use]
    pub fn is_flush_armed(&self) -> bool {
        self.inner.updates.borrow().is_armed()
    }

    /// Number of non-empty flushes run so far.
    #[must_use]
    pub fn flush_count(&self) -> u64 {
        self.inner.flush_count.get()
    }

    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.inner.bindings.borrow().len()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("pending", &self.inner.updates.borrow().pending().len())
            .field("bindings", &self.binding_count())
            .field("subscribers", &self.subscriber_count())
            .field("flushes", &self.flush_count())
            .finish()
    }
}

fn require_mapping(value: &Value, what: &str) -> Result<(), StoreError> {
    if value.is_mapping() {
        Ok(())
    } else {
        Err(StoreError::invalid(format!(
            "{what} must be a mapping, got {}",
            value.kind()
        )))
    }
}

/// Resolve and write one binding. Transform errors are logged and returned.
fn apply_binding(binding: &ActiveBinding, current: &Value) -> Result<(), StoreError> {
    match binding.resolve(current) {
        Ok(value) => {
            binding.target.set_property(&binding.property, &value);
            Ok(())
        }
        Err(err) => {
            error!(
                binding = binding.id.get(),
                path = %binding.path,
                property = %binding.property,
                error = %err,
                "binding transform failed"
            );
            Err(StoreError::TransformFailure {
                path: binding.path.to_string(),
                property: binding.property.to_string(),
                message: err.to_string(),
            })
        }
    }
}
