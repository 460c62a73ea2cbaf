#![forbid(unsafe_code)]

//! DOM elements as bind targets, and selector lookup by polling.

use std::rc::Rc;
use std::time::Duration;

use js_sys::{JSON, Promise, Reflect};
use sprig_core::Value;
use sprig_runtime::{BindTarget, ElementLookup, LookupError};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Document, Element, Window};
use web_time::Instant;

use crate::poll::{PollPlan, check_selector};

/// Convert a store value to the JS value assigned to a property.
///
/// Containers go through `JSON.parse`, so targets receive plain objects
/// and arrays.
#[must_use]
pub fn value_to_js(value: &Value) -> JsValue {
    match value {
        Value::Null => JsValue::NULL,
        Value::Bool(b) => JsValue::from_bool(*b),
        Value::Number(n) => JsValue::from_f64(*n),
        Value::String(s) => JsValue::from_str(s),
        Value::Sequence(_) | Value::Mapping(_) => {
            JSON::parse(&value.to_display_string()).unwrap_or(JsValue::NULL)
        }
    }
}

/// A DOM element bound by property assignment (`el[property] = value`).
#[derive(Debug, Clone)]
pub struct DomTarget {
    element: Element,
}

impl DomTarget {
    #[must_use]
    pub fn new(element: Element) -> Self {
        Self { element }
    }

    #[must_use]
    pub fn element(&self) -> &Element {
        &self.element
    }
}

impl BindTarget for DomTarget {
    fn set_property(&self, property: &str, value: &Value) {
        let key = JsValue::from_str(property);
        if let Err(err) = Reflect::set(&self.element, &key, &value_to_js(value)) {
            tracing::warn!(property, error = ?err, "property assignment rejected");
        }
    }

    fn is_connected(&self) -> bool {
        self.element.is_connected()
    }
}

/// [`ElementLookup`] that polls `document.querySelector` until a match
/// appears or the timeout passes.
#[derive(Debug, Clone)]
pub struct DomLookup {
    window: Window,
    document: Document,
    interval: Duration,
}

impl DomLookup {
    /// Lookup against the global window's document.
    pub fn from_window() -> Result<Self, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no global window"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("window has no document"))?;
        Ok(Self {
            window,
            document,
            interval: crate::poll::DEFAULT_POLL_INTERVAL,
        })
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    async fn sleep(&self, delay: Duration) {
        let window = self.window.clone();
        let ms = delay.as_millis().min(i32::MAX as u128) as i32;
        let promise = Promise::new(&mut |resolve, _reject| {
            if window
                .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms)
                .is_err()
            {
                let _ = resolve.call0(&JsValue::UNDEFINED);
            }
        });
        let _ = JsFuture::from(promise).await;
    }
}

impl ElementLookup for DomLookup {
    async fn wait_for(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Rc<dyn BindTarget>, LookupError> {
        check_selector(selector)?;
        let plan = PollPlan::new(timeout).with_interval(self.interval);
        let start = Instant::now();
        loop {
            match self.document.query_selector(selector) {
                Ok(Some(element)) => return Ok(Rc::new(DomTarget::new(element))),
                Ok(None) => {}
                Err(_) => return Err(LookupError::InvalidSelector(selector.to_owned())),
            }
            match plan.next_delay(start.elapsed()) {
                Some(delay) => self.sleep(delay).await,
                None => return Err(plan.not_found(selector)),
            }
        }
    }
}
