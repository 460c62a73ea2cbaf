#![forbid(unsafe_code)]

//! Runtime: the reactive store, its scheduler, bindings, and subscribers.
//!
//! # Role in sprig
//! `sprig-runtime` turns the passive tree from `sprig-core` into observable
//! state. Writes are intercepted, coalesced per frame, and delivered to
//! subscribers and bound targets in one flush.
//!
//! # Primary responsibilities
//! - **Store**: composition root; reads, writes, `set_state`, flushing.
//! - **Scheduling**: pluggable [`FrameScheduler`] with synchronous and manual
//!   implementations for headless hosts.
//! - **Bindings**: path-keyed registry with capability-based liveness.
//! - **Config**: [`StoreConfig`] tuning, loadable from JSON.
//!
//! # How it fits in the system
//! `sprig-web` supplies browser implementations of [`FrameScheduler`],
//! [`BindTarget`], and [`ElementLookup`]. Everything here runs natively.

pub mod config;
pub mod reactive;

pub use config::{ConfigError, StoreConfig};
pub use reactive::{
    BindOptions, BindTarget, BindingHandle, ElementLookup, FlushReport, FrameScheduler,
    HeadlessLookup, HeadlessTarget, ImmediateScheduler, LookupError, ManualScheduler, SetOptions,
    StateCursor, Store, Subscription, Transform, bind,
};
