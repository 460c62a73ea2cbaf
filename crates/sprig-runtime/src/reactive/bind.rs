#![forbid(unsafe_code)]

//! Asynchronous binding by selector.
//!
//! [`bind`] waits for a target through an [`ElementLookup`] and then
//! registers it with the store. The lookup owns the waiting strategy
//! (DOM polling in `sprig-web`, a plain map in headless hosts); the store
//! only sees the resolved target.

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use sprig_core::{KeyPath, StoreError};
use tracing::warn;

use super::binding::{BindTarget, BindingHandle, Transform};
use super::store::Store;

/// Failure to resolve a selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// No matching target appeared before the timeout.
    NotFound { selector: String, timeout: Duration },
    /// The host rejected the selector syntax.
    InvalidSelector(String),
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { selector, timeout } => write!(
                f,
                "no element matches '{selector}' after {}ms",
                timeout.as_millis()
            ),
            Self::InvalidSelector(selector) => write!(f, "invalid selector '{selector}'"),
        }
    }
}

impl std::error::Error for LookupError {}

/// Resolves a selector to a bind target, waiting up to `timeout`.
#[allow(async_fn_in_trait)]
pub trait ElementLookup {
    async fn wait_for(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Rc<dyn BindTarget>, LookupError>;
}

/// Options for [`bind`].
#[derive(Debug, Clone, Default)]
pub struct BindOptions {
    pub transform: Option<Transform>,
    /// Lookup timeout. `None` uses the store's `lookup_timeout`.
    pub timeout: Option<Duration>,
}

impl BindOptions {
    #[must_use]
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Wait for `selector` and bind its `property` to `path` in `store`.
///
/// The path is validated before waiting, so a malformed path fails fast.
/// A lookup timeout is logged and returned as
/// [`StoreError::BindingTargetMissing`]; the store is left unchanged.
pub async fn bind<L: ElementLookup>(
    store: &Store,
    lookup: &L,
    selector: &str,
    path: &str,
    property: &str,
    options: BindOptions,
) -> Result<BindingHandle, StoreError> {
    let key = KeyPath::parse(path)?;
    if key.is_all() {
        return Err(StoreError::invalid("cannot bind to the '*' sentinel"));
    }

    let timeout = options
        .timeout
        .unwrap_or_else(|| store.config().lookup_timeout());
    let target = match lookup.wait_for(selector, timeout).await {
        Ok(target) => target,
        Err(LookupError::NotFound { selector, timeout }) => {
            warn!(
                selector = %selector,
                timeout_ms = timeout.as_millis() as u64,
                "binding target not found"
            );
            return Err(StoreError::BindingTargetMissing { selector, timeout });
        }
        Err(err @ LookupError::InvalidSelector(_)) => {
            return Err(StoreError::invalid(err.to_string()));
        }
    };

    store.bind_target_with(key.as_str(), target, property, options.transform)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::reactive::{HeadlessLookup, HeadlessTarget, ManualScheduler};
    use pollster::block_on;
    use serde_json::json;
    use sprig_core::Value;
    use tracing_test::traced_test;

    fn store() -> (Store, ManualScheduler) {
        let frames = ManualScheduler::new();
        let store = Store::new(Value::from(json!({"title": "Hi", "n": 2})), frames.clone())
            .unwrap();
        (store, frames)
    }

    #[test]
    fn binds_found_target() {
        let (store, frames) = store();
        let lookup = HeadlessLookup::new();
        let el = Rc::new(HeadlessTarget::new());
        lookup.insert("#title", el.clone());

        let handle = block_on(bind(
            &store,
            &lookup,
            "#title",
            "title",
            "textContent",
            BindOptions::default(),
        ))
        .unwrap();
        assert!(handle.is_bound());
        assert_eq!(el.property("textContent"), Some(Value::from("Hi")));

        store.set("title", "Bye").unwrap();
        frames.run_frame();
        assert_eq!(el.property("textContent"), Some(Value::from("Bye")));
    }

    #[test]
    fn transform_applies_on_bind() {
        let (store, _) = store();
        let lookup = HeadlessLookup::new();
        let el = Rc::new(HeadlessTarget::new());
        lookup.insert(".count", el.clone());
        let options = BindOptions::default().with_transform(Transform::map(|v| {
            Value::from(format!("{} items", v.to_display_string()))
        }));
        block_on(bind(&store, &lookup, ".count", "n", "textContent", options)).unwrap();
        assert_eq!(el.property("textContent"), Some(Value::from("2 items")));
    }

    #[test]
    #[traced_test]
    fn missing_target_is_reported_not_fatal() {
        let (store, _) = store();
        let lookup = HeadlessLookup::new();
        let options = BindOptions::default().with_timeout(Duration::from_millis(20));
        let err = block_on(bind(&store, &lookup, "#nope", "title", "text", options)).unwrap_err();
        assert_eq!(
            err,
            StoreError::BindingTargetMissing {
                selector: "#nope".into(),
                timeout: Duration::from_millis(20),
            }
        );
        assert_eq!(store.binding_count(), 0);
        assert!(logs_contain("binding target not found"));
    }

    #[test]
    fn default_timeout_comes_from_store_config() {
        let config = StoreConfig::default().with_lookup_timeout(Duration::from_millis(75));
        let store = Store::with_config(Value::mapping(), ManualScheduler::new(), config).unwrap();
        let lookup = HeadlessLookup::new();
        let err = block_on(bind(&store, &lookup, "#x", "a", "text", BindOptions::default()))
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::BindingTargetMissing { timeout, .. } if timeout == Duration::from_millis(75)
        ));
    }

    #[test]
    fn bad_path_fails_before_lookup() {
        let (store, _) = store();
        let lookup = HeadlessLookup::new();
        let err = block_on(bind(
            &store,
            &lookup,
            "#title",
            "a..b",
            "text",
            BindOptions::default(),
        ))
        .unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
        assert_eq!(lookup.lookups(), 0);
    }

    #[test]
    fn invalid_selector_is_invalid_argument() {
        let (store, _) = store();
        let lookup = HeadlessLookup::new();
        let err = block_on(bind(&store, &lookup, "", "title", "text", BindOptions::default()))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }
}
