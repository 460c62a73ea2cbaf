//! Browser tests for the DOM glue. Run with `wasm-pack test --headless`.

#![cfg(target_arch = "wasm32")]

use std::rc::Rc;
use std::time::Duration;

use serde_json::json;
use sprig_core::Value;
use sprig_runtime::{BindOptions, BindTarget, ElementLookup, LookupError, ManualScheduler, Store, bind};
use sprig_web::{DomLookup, DomTarget, value_to_js};
use wasm_bindgen::JsCast;
use wasm_bindgen_test::*;
use web_sys::{Document, Element};

wasm_bindgen_test_configure!(run_in_browser);

fn document() -> Document {
    web_sys::window().unwrap().document().unwrap()
}

fn mount(id: &str) -> Element {
    let doc = document();
    let el = doc.create_element("div").unwrap();
    el.set_id(id);
    let body = doc.query_selector("body").unwrap().unwrap();
    body.append_child(&el).unwrap();
    el
}

#[wasm_bindgen_test]
fn scalars_convert_directly() {
    assert_eq!(value_to_js(&Value::from(3)).as_f64(), Some(3.0));
    assert_eq!(value_to_js(&Value::from("x")).as_string().as_deref(), Some("x"));
    assert!(value_to_js(&Value::Null).is_null());
    assert!(value_to_js(&Value::from(json!({"a": 1}))).is_object());
}

#[wasm_bindgen_test]
fn dom_target_tracks_connection() {
    let el = mount("target-connection");
    let target = DomTarget::new(el.clone());
    target.set_property("textContent", &Value::from("hello"));
    assert_eq!(el.text_content().as_deref(), Some("hello"));
    assert!(target.is_connected());
    el.remove();
    assert!(!target.is_connected());
}

#[wasm_bindgen_test]
async fn bind_waits_for_late_element() {
    let frames = ManualScheduler::new();
    let store = Store::new(Value::from(json!({"title": "Hi"})), frames.clone()).unwrap();
    let lookup = DomLookup::from_window().unwrap();

    let late = web_sys::window().unwrap();
    let cb = wasm_bindgen::closure::Closure::once_into_js(|| {
        mount("late-title");
    });
    late.set_timeout_with_callback_and_timeout_and_arguments_0(cb.unchecked_ref(), 60)
        .unwrap();

    let handle = bind(
        &store,
        &lookup,
        "#late-title",
        "title",
        "textContent",
        BindOptions::default().with_timeout(Duration::from_millis(1_000)),
    )
    .await
    .unwrap();
    assert!(handle.is_bound());

    let el = document().get_element_by_id("late-title").unwrap();
    assert_eq!(el.text_content().as_deref(), Some("Hi"));
    store.set("title", "Bye").unwrap();
    frames.run_frame();
    assert_eq!(el.text_content().as_deref(), Some("Bye"));
    el.remove();
    assert_eq!(store.cleanup(), 1);
}

#[wasm_bindgen_test]
async fn lookup_times_out() {
    let lookup = DomLookup::from_window().unwrap();
    let result = lookup
        .wait_for("#never-there", Duration::from_millis(120))
        .await;
    assert!(matches!(result, Err(LookupError::NotFound { .. })));
}
