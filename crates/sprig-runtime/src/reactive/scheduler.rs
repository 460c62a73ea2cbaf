#![forbid(unsafe_code)]

//! Frame scheduling and change coalescing.
//!
//! # Design
//!
//! Two pieces cooperate:
//!
//! - [`FrameScheduler`] is the host primitive "run this once before the next
//!   paint". The browser implementation wraps `requestAnimationFrame`
//!   (`sprig-web`); [`ImmediateScheduler`] runs the callback synchronously
//!   and [`ManualScheduler`] queues it until the host calls
//!   [`ManualScheduler::run_frame`].
//! - [`UpdateScheduler`] owns the pending change set and the arming state.
//!   It decides *when* a frame must be requested; the store performs the
//!   request so that no borrow is held while a synchronous scheduler
//!   re-enters.
//!
//! # Invariants
//!
//! 1. At most one frame is requested at a time. A flush started early by
//!    `flush_now` leaves the queued frame requested.
//! 2. Paths recorded while a flush is in flight never arm a frame directly;
//!    [`UpdateScheduler::end_flush`] arms a fresh one after the flush.
//! 3. [`UpdateScheduler::begin_flush`] drains the pending set atomically.
//! 4. The pending set is deduplicated and keeps first-insertion order.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rustc_hash::FxHashSet;
use sprig_core::KeyPath;

/// One-shot callback handed to a [`FrameScheduler`].
pub type FrameCallback = Box<dyn FnOnce()>;

/// Host primitive that runs a callback once before the next paint.
pub trait FrameScheduler {
    /// Arrange for `callback` to run exactly once.
    fn request_frame(&self, callback: FrameCallback);
}

/// Runs every frame callback immediately, inside `request_frame`.
///
/// Each write flushes on its own, so nothing is coalesced. Useful for
/// headless hosts and tests that only care about final state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateScheduler;

impl FrameScheduler for ImmediateScheduler {
    fn request_frame(&self, callback: FrameCallback) {
        callback();
    }
}

/// Queues frame callbacks until the host runs a frame.
///
/// Clones share the same queue, so a test can keep one handle and give the
/// other to the store.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    queue: Rc<RefCell<Vec<FrameCallback>>>,
    requested: Rc<Cell<u64>>,
}

impl ManualScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of callbacks waiting for the next frame.
    #[must_use]
    pub fn pending_frames(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Total number of frames ever requested.
    #[must_use]
    pub fn frames_requested(&self) -> u64 {
        self.requested.get()
    }

    /// Run the callbacks queued so far. Callbacks requested while these run
    /// wait for the following frame. Returns how many callbacks ran.
    pub fn run_frame(&self) -> usize {
        let due = std::mem::take(&mut *self.queue.borrow_mut());
        let count = due.len();
        for callback in due {
            callback();
        }
        count
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&self, callback: FrameCallback) {
        self.requested.set(self.requested.get() + 1);
        self.queue.borrow_mut().push(callback);
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("pending_frames", &self.pending_frames())
            .field("frames_requested", &self.frames_requested())
            .finish()
    }
}

/// Deduplicated, insertion-ordered set of changed paths.
#[derive(Debug, Clone, Default)]
pub struct PendingChanges {
    order: Vec<KeyPath>,
    seen: FxHashSet<KeyPath>,
}

impl PendingChanges {
    /// Add a path. Returns `false` if it was already pending.
    pub fn insert(&mut self, path: KeyPath) -> bool {
        if self.seen.contains(&path) {
            return false;
        }
        self.seen.insert(path.clone());
        self.order.push(path);
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    #[must_use]
    pub fn paths(&self) -> &[KeyPath] {
        &self.order
    }

    /// Take every pending path, leaving the set empty.
    pub fn drain(&mut self) -> Vec<KeyPath> {
        self.seen.clear();
        std::mem::take(&mut self.order)
    }
}

/// What the caller must do after recording a change or finishing a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleAction {
    /// Request a frame now.
    Arm,
    /// A frame is already requested, or the running flush will request one.
    Coalesced,
}

/// Pending-set bookkeeping and flush arming.
///
/// `frame_requested` tracks the host frame, `in_flight` tracks the flush.
/// They are separate because [`Store::flush_now`](crate::Store::flush_now)
/// can run a flush while the requested frame is still queued.
#[derive(Debug)]
pub struct UpdateScheduler {
    pending: PendingChanges,
    frame_requested: bool,
    in_flight: bool,
    chained: u32,
    max_chained: u32,
}

impl UpdateScheduler {
    /// `max_chained` bounds how many follow-up flushes may run back to back
    /// when the frame scheduler runs callbacks inline.
    #[must_use]
    pub fn new(max_chained: u32) -> Self {
        Self {
            pending: PendingChanges::default(),
            frame_requested: false,
            in_flight: false,
            chained: 0,
            max_chained: max_chained.max(1),
        }
    }

    /// Record a changed path and report whether a frame must be requested.
    ///
    /// Paths recorded while a flush runs never arm directly; see
    /// [`end_flush`](Self::end_flush). A write from outside a flush ends any
    /// inline chain.
    pub fn record(&mut self, path: KeyPath) -> ScheduleAction {
        self.pending.insert(path);
        if self.in_flight {
            return ScheduleAction::Coalesced;
        }
        self.chained = 0;
        if self.frame_requested {
            return ScheduleAction::Coalesced;
        }
        self.frame_requested = true;
        ScheduleAction::Arm
    }

    /// The requested frame callback started running.
    pub fn frame_started(&mut self) {
        self.frame_requested = false;
    }

    /// Start a flush: drain the pending set and mark the flush in flight.
    ///
    /// Returns `None` if a flush is already running. A queued frame stays
    /// requested.
    pub fn begin_flush(&mut self) -> Option<Vec<KeyPath>> {
        if self.in_flight {
            return None;
        }
        self.in_flight = true;
        Some(self.pending.drain())
    }

    /// Finish a flush. Returns [`ScheduleAction::Arm`] when writes made
    /// during the flush need a follow-up frame and none is queued yet.
    pub fn end_flush(&mut self) -> ScheduleAction {
        self.in_flight = false;
        if self.pending.is_empty() {
            self.chained = 0;
            return ScheduleAction::Coalesced;
        }
        if self.frame_requested {
            return ScheduleAction::Coalesced;
        }
        self.frame_requested = true;
        ScheduleAction::Arm
    }

    /// A follow-up frame ran inline, inside `request_frame`.
    ///
    /// Returns `false` once `max_chained` inline follow-ups ran in a row;
    /// the pending paths then wait for the next external write or
    /// [`Store::flush_now`](crate::Store::flush_now).
    pub fn chain_inline(&mut self) -> bool {
        self.frame_requested = false;
        if self.chained >= self.max_chained {
            tracing::warn!(
                chained = self.chained,
                pending = self.pending.len(),
                "inline flush chain limit reached; pending paths wait for the next write"
            );
            self.chained = 0;
            return false;
        }
        self.chained += 1;
        true
    }

    /// Whether a frame is requested and has not started yet.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.frame_requested
    }

    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    #[must_use]
    pub fn pending(&self) -> &PendingChanges {
        &self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(raw: &str) -> KeyPath {
        KeyPath::parse(raw).unwrap()
    }

    #[test]
    fn first_record_arms_then_coalesces() {
        let mut s = UpdateScheduler::new(8);
        assert_eq!(s.record(p("a")), ScheduleAction::Arm);
        assert_eq!(s.record(p("b")), ScheduleAction::Coalesced);
        assert_eq!(s.record(p("a")), ScheduleAction::Coalesced);
        assert!(s.is_armed());
        assert_eq!(s.pending().paths(), &[p("a"), p("b")]);
    }

    #[test]
    fn begin_flush_drains_atomically() {
        let mut s = UpdateScheduler::new(8);
        s.record(p("a"));
        s.frame_started();
        let drained = s.begin_flush().unwrap();
        assert_eq!(drained, vec![p("a")]);
        assert!(s.pending().is_empty());
        assert!(!s.is_armed());
        assert!(s.is_in_flight());
        assert!(s.begin_flush().is_none());
    }

    #[test]
    fn early_flush_keeps_queued_frame() {
        let mut s = UpdateScheduler::new(8);
        assert_eq!(s.record(p("a")), ScheduleAction::Arm);
        s.begin_flush();
        assert_eq!(s.end_flush(), ScheduleAction::Coalesced);
        assert!(s.is_armed());
        assert_eq!(s.record(p("b")), ScheduleAction::Coalesced);
        s.frame_started();
        assert_eq!(s.begin_flush().unwrap(), vec![p("b")]);
    }

    #[test]
    fn writes_during_flush_arm_after_it() {
        let mut s = UpdateScheduler::new(8);
        s.record(p("a"));
        s.frame_started();
        s.begin_flush();
        assert_eq!(s.record(p("b")), ScheduleAction::Coalesced);
        assert!(!s.is_armed());
        assert_eq!(s.end_flush(), ScheduleAction::Arm);
        assert!(s.is_armed());
        s.frame_started();
        assert_eq!(s.begin_flush().unwrap(), vec![p("b")]);
    }

    #[test]
    fn quiet_flush_does_not_rearm() {
        let mut s = UpdateScheduler::new(8);
        s.record(p("a"));
        s.frame_started();
        s.begin_flush();
        assert_eq!(s.end_flush(), ScheduleAction::Coalesced);
        assert!(!s.is_armed());
    }

    #[test]
    fn inline_chain_limit_stops_rearming() {
        let mut s = UpdateScheduler::new(2);
        s.record(p("a"));
        s.frame_started();
        for _ in 0..2 {
            s.begin_flush();
            s.record(p("loop"));
            assert_eq!(s.end_flush(), ScheduleAction::Arm);
            assert!(s.chain_inline());
        }
        s.begin_flush();
        s.record(p("loop"));
        assert_eq!(s.end_flush(), ScheduleAction::Arm);
        assert!(!s.chain_inline());
        assert!(!s.is_armed());
        assert_eq!(s.pending().len(), 1);
        // The next external write arms again.
        assert_eq!(s.record(p("other")), ScheduleAction::Arm);
    }

    #[test]
    fn deferred_follow_ups_are_unbounded() {
        let mut s = UpdateScheduler::new(2);
        s.record(p("a"));
        for _ in 0..10 {
            s.frame_started();
            s.begin_flush();
            s.record(p("loop"));
            assert_eq!(s.end_flush(), ScheduleAction::Arm);
        }
    }

    #[test]
    fn external_write_resets_inline_chain() {
        let mut s = UpdateScheduler::new(1);
        s.record(p("a"));
        s.frame_started();
        s.begin_flush();
        s.record(p("loop"));
        assert_eq!(s.end_flush(), ScheduleAction::Arm);
        assert!(s.chain_inline());
        s.begin_flush();
        assert_eq!(s.end_flush(), ScheduleAction::Coalesced);

        assert_eq!(s.record(p("b")), ScheduleAction::Arm);
        s.frame_started();
        s.begin_flush();
        s.record(p("loop"));
        assert_eq!(s.end_flush(), ScheduleAction::Arm);
        assert!(s.chain_inline());
    }

    #[test]
    fn manual_scheduler_defers_until_run() {
        let frames = ManualScheduler::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        frames.request_frame(Box::new(move || h.set(h.get() + 1)));
        assert_eq!(hits.get(), 0);
        assert_eq!(frames.pending_frames(), 1);
        assert_eq!(frames.run_frame(), 1);
        assert_eq!(hits.get(), 1);
        assert_eq!(frames.run_frame(), 0);
        assert_eq!(frames.frames_requested(), 1);
    }

    #[test]
    fn manual_scheduler_requests_during_run_wait() {
        let frames = ManualScheduler::new();
        let inner = frames.clone();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        frames.request_frame(Box::new(move || {
            let h2 = Rc::clone(&h);
            inner.request_frame(Box::new(move || h2.set(h2.get() + 1)));
        }));
        frames.run_frame();
        assert_eq!(hits.get(), 0);
        assert_eq!(frames.pending_frames(), 1);
        frames.run_frame();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn immediate_scheduler_runs_inline() {
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        ImmediateScheduler.request_frame(Box::new(move || h.set(1)));
        assert_eq!(hits.get(), 1);
    }
}
