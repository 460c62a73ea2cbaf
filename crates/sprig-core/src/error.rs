#![forbid(unsafe_code)]

//! Error taxonomy shared by the store and its collaborators.
//!
//! # Propagation
//!
//! | Variant | Raised by | Surfaced as |
//! |---------|-----------|-------------|
//! | `InvalidArgument` | `set_state`, `set`, key-path parsing | `Err` to the direct caller |
//! | `BindingTargetMissing` | async `bind` | `Err` from the bind future, logged at `warn` |
//! | `TransformFailure` | binding refresh | logged at `error`, recorded in the flush report |
//! | `SubscriberFailure` | subscriber notification | logged at `error`, recorded in the flush report |
//!
//! Only `InvalidArgument` ever reaches a caller synchronously. The other
//! variants are local to one binding or subscriber and never abort a flush.

use std::fmt;
use std::time::Duration;

/// Errors produced by store operations.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Malformed input on a direct call (non-mapping partial, bad key path,
    /// write through a non-mapping node).
    InvalidArgument(String),
    /// The element a binding waits for never appeared.
    BindingTargetMissing {
        /// Selector passed to the element lookup.
        selector: String,
        /// How long the lookup waited before giving up.
        timeout: Duration,
    },
    /// A binding transform returned an error.
    TransformFailure {
        /// Key path of the failing binding.
        path: String,
        /// Target property the binding writes.
        property: String,
        /// Rendered error from the transform.
        message: String,
    },
    /// A subscriber callback returned an error.
    SubscriberFailure {
        /// Registration id of the subscriber.
        subscriber: u64,
        /// Rendered error from the callback.
        message: String,
    },
}

impl StoreError {
    /// Shorthand for [`StoreError::InvalidArgument`].
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Whether the failure was isolated to one binding or subscriber.
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::TransformFailure { .. } | Self::SubscriberFailure { .. }
        )
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::BindingTargetMissing { selector, timeout } => write!(
                f,
                "binding target '{selector}' not found after {}ms",
                timeout.as_millis()
            ),
            Self::TransformFailure {
                path,
                property,
                message,
            } => write!(f, "transform for '{path}' -> {property} failed: {message}"),
            Self::SubscriberFailure {
                subscriber,
                message,
            } => write!(f, "subscriber #{subscriber} failed: {message}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Boxed error returned by user callbacks (transforms, subscribers).
pub type CallbackError = Box<dyn std::error::Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            StoreError::invalid("partial must be a mapping").to_string(),
            "invalid argument: partial must be a mapping"
        );
        let missing = StoreError::BindingTargetMissing {
            selector: "#title".into(),
            timeout: Duration::from_millis(250),
        };
        assert_eq!(
            missing.to_string(),
            "binding target '#title' not found after 250ms"
        );
        let transform = StoreError::TransformFailure {
            path: "user.name".into(),
            property: "textContent".into(),
            message: "boom".into(),
        };
        assert!(transform.to_string().contains("user.name"));
        assert!(transform.to_string().contains("textContent"));
    }

    #[test]
    fn local_failures() {
        assert!(!StoreError::invalid("x").is_local());
        assert!(
            StoreError::SubscriberFailure {
                subscriber: 1,
                message: "x".into()
            }
            .is_local()
        );
    }
}
