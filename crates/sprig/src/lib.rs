#![forbid(unsafe_code)]

//! sprig public facade.
//!
//! A reactive state store: writes through tracked cursors are coalesced
//! into one flush per frame, which notifies subscribers and refreshes the
//! target properties bound to related key paths.
//!
//! ```
//! use sprig::prelude::*;
//! use std::rc::Rc;
//!
//! let store = Store::new(
//!     Value::from(serde_json::json!({"user": {"name": "Ada"}})),
//!     ImmediateScheduler,
//! )?;
//! let label = Rc::new(HeadlessTarget::new());
//! store.bind_target("user.name", label.clone(), "textContent")?;
//!
//! store.state().child("user").unwrap().set("name", "Grace")?;
//! assert_eq!(label.property("textContent"), Some(Value::from("Grace")));
//! # Ok::<(), StoreError>(())
//! ```

pub use sprig_core as core;
pub use sprig_runtime as runtime;
#[cfg(feature = "web")]
pub use sprig_web as web;

pub use sprig_core::{CallbackError, KeyPath, Mapping, StoreError, Value};
pub use sprig_runtime::{
    BindOptions, BindTarget, BindingHandle, ConfigError, ElementLookup, FlushReport,
    FrameScheduler, HeadlessLookup, HeadlessTarget, ImmediateScheduler, LookupError,
    ManualScheduler, SetOptions, StateCursor, Store, StoreConfig, Subscription, Transform, bind,
};

#[cfg(feature = "tracing-fmt")]
pub use sprig_core::logging::{LogFormat, init_logging};

pub mod prelude {
    //! Common imports for store users.

    pub use crate::{
        BindOptions, BindTarget, BindingHandle, FrameScheduler, HeadlessTarget,
        ImmediateScheduler, KeyPath, ManualScheduler, SetOptions, Store, StoreConfig, StoreError,
        Subscription, Transform, Value, bind,
    };

    #[cfg(all(feature = "web", target_arch = "wasm32"))]
    pub use sprig_web::{AnimationFrameScheduler, CleanupInterval, DomLookup, DomTarget};
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::rc::Rc;

    #[test]
    fn prelude_covers_a_full_round() {
        let frames = ManualScheduler::new();
        let store = Store::new(Value::from(json!({"count": 0})), frames.clone()).unwrap();
        let out = Rc::new(HeadlessTarget::new());
        store
            .bind_target_with(
                "count",
                out.clone(),
                "textContent",
                Some(Transform::map(|v| Value::from(format!("#{}", v.to_display_string())))),
            )
            .unwrap();
        store
            .set_state(Value::from(json!({"count": 7})), SetOptions::merge())
            .unwrap();
        assert_eq!(out.property("textContent"), Some(Value::from("#0")));
        frames.run_frame();
        assert_eq!(out.property("textContent"), Some(Value::from("#7")));
    }
}
