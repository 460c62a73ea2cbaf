#![forbid(unsafe_code)]

//! Periodic liveness sweep on a browser interval timer.

use sprig_runtime::Store;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::Window;

/// Calls [`Store::cleanup`] every `cleanup_interval` from the store config.
///
/// The timer is cleared when this value is dropped.
pub struct CleanupInterval {
    window: Window,
    handle: i32,
    _tick: Closure<dyn FnMut()>,
}

impl CleanupInterval {
    pub fn start(window: &Window, store: &Store) -> Result<Self, JsValue> {
        let period = store.config().cleanup_interval();
        let ms = period.as_millis().min(i32::MAX as u128) as i32;
        let store = store.clone();
        let tick = Closure::<dyn FnMut()>::new(move || {
            store.cleanup();
        });
        let handle = window.set_interval_with_callback_and_timeout_and_arguments_0(
            tick.as_ref().unchecked_ref(),
            ms,
        )?;
        Ok(Self {
            window: window.clone(),
            handle,
            _tick: tick,
        })
    }
}

impl Drop for CleanupInterval {
    fn drop(&mut self) {
        self.window.clear_interval_with_handle(self.handle);
    }
}

impl std::fmt::Debug for CleanupInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupInterval")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}
