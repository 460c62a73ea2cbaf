#![forbid(unsafe_code)]

//! Core: the state tree, key paths, and the error taxonomy.
//!
//! # Role in sprig
//! `sprig-core` holds the passive data model. It knows how to address and
//! assign nodes in a [`Value`] tree, but nothing about change tracking,
//! scheduling, or bindings; those live in `sprig-runtime`.
//!
//! # Primary responsibilities
//! - **Value**: tagged state tree (`Null | Bool | Number | String | Sequence | Mapping`).
//! - **KeyPath**: validated dotted paths with segment-aligned relatedness.
//! - **StoreError**: the error taxonomy shared by every crate.
//! - **logging**: opt-in `tracing-subscriber` setup.

pub mod error;
pub mod key_path;
pub mod logging;
pub mod value;

pub use error::{CallbackError, StoreError};
pub use key_path::KeyPath;
pub use value::{Mapping, Value};
