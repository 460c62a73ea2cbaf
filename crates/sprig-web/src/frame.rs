#![forbid(unsafe_code)]

//! `requestAnimationFrame` as a frame scheduler.

use std::cell::Cell;
use std::rc::Rc;

use sprig_runtime::{FrameScheduler, reactive::FrameCallback};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::Window;

/// Runs flush callbacks on the next animation frame.
///
/// If the browser refuses the request, the callback runs immediately so the
/// store never stays armed without a frame.
#[derive(Debug, Clone)]
pub struct AnimationFrameScheduler {
    window: Window,
}

impl AnimationFrameScheduler {
    #[must_use]
    pub fn new(window: Window) -> Self {
        Self { window }
    }

    /// Scheduler on the global window.
    pub fn from_window() -> Result<Self, JsValue> {
        web_sys::window()
            .map(Self::new)
            .ok_or_else(|| JsValue::from_str("no global window"))
    }
}

impl FrameScheduler for AnimationFrameScheduler {
    fn request_frame(&self, callback: FrameCallback) {
        let slot = Rc::new(Cell::new(Some(callback)));
        let pending = Rc::clone(&slot);
        let on_frame = Closure::once_into_js(move |_timestamp: f64| {
            if let Some(callback) = pending.take() {
                callback();
            }
        });
        if let Err(err) = self
            .window
            .request_animation_frame(on_frame.unchecked_ref())
        {
            tracing::error!(error = ?err, "requestAnimationFrame failed; flushing inline");
            if let Some(callback) = slot.take() {
                callback();
            }
        }
    }
}
