#![forbid(unsafe_code)]

//! Browser host for the sprig store.
//!
//! Supplies the platform halves of the runtime's seams:
//!
//! - [`AnimationFrameScheduler`]: `requestAnimationFrame` as a
//!   `FrameScheduler`.
//! - [`DomTarget`]: a DOM element as a `BindTarget`, with liveness from
//!   `Node.isConnected`.
//! - [`DomLookup`]: `querySelector` polling as an `ElementLookup`.
//! - [`CleanupInterval`]: `setInterval` driving `Store::cleanup`.
//!
//! The DOM glue only compiles on `wasm32`. The polling schedule in [`poll`]
//! is host-agnostic and tested natively.

pub mod poll;

#[cfg(target_arch = "wasm32")]
mod dom;
#[cfg(target_arch = "wasm32")]
mod frame;
#[cfg(target_arch = "wasm32")]
mod interval;

#[cfg(target_arch = "wasm32")]
pub use dom::{DomLookup, DomTarget, value_to_js};
#[cfg(target_arch = "wasm32")]
pub use frame::AnimationFrameScheduler;
#[cfg(target_arch = "wasm32")]
pub use interval::CleanupInterval;

pub use poll::{DEFAULT_POLL_INTERVAL, PollPlan};
