#![forbid(unsafe_code)]

//! Reactive state store with batched updates and property bindings.
//!
//! - [`Store`]: owns the state tree and routes changes to observers.
//! - [`StateCursor`]: tracked view used to read and write nested nodes.
//! - [`UpdateScheduler`] + [`FrameScheduler`]: coalesce writes into one
//!   flush per frame.
//! - [`BindingRegistry`]: key path to target property bindings.
//! - [`SubscriberRegistry`]: callbacks run once per flush.
//!
//! # Architecture
//!
//! Single-threaded shared ownership through `Rc<RefCell<..>>`. Handles
//! returned to callers ([`Subscription`], [`BindingHandle`]) hold `Weak`
//! references, so they never keep a dropped store alive.
//!
//! # Invariants
//!
//! 1. Every tree write is attributed to its full dotted path.
//! 2. Writing a value equal to the current one records nothing.
//! 3. At most one frame is requested at a time, even across `flush_now`;
//!    all writes before it runs are delivered together.
//! 4. Each flush drains the pending set before notifying anyone, so writes
//!    made by observers land in a later flush.
//! 5. A binding at `p` refreshes for a change at `c` iff `p` and `c` are
//!    segment-aligned prefixes of each other, or `c` is `*`.
//! 6. A failing transform or subscriber never stops the rest of the flush.

pub mod bind;
pub mod binding;
pub mod headless;
pub mod interceptor;
pub mod scheduler;
pub mod store;
pub mod subscriber;

pub use bind::{BindOptions, ElementLookup, LookupError, bind};
pub use binding::{ActiveBinding, BindTarget, BindingHandle, BindingId, BindingRegistry, Transform};
pub use headless::{HeadlessLookup, HeadlessTarget};
pub use interceptor::StateCursor;
pub use scheduler::{
    FrameCallback, FrameScheduler, ImmediateScheduler, ManualScheduler, PendingChanges,
    ScheduleAction, UpdateScheduler,
};
pub use store::{FlushReport, SetOptions, Store};
pub use subscriber::{SubscriberId, SubscriberRegistry, Subscription};
