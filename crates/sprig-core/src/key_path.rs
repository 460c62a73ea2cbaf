#![forbid(unsafe_code)]

//! Dot-delimited key paths into the state tree.
//!
//! A [`KeyPath`] names one location in a [`Value`](crate::Value) tree, e.g.
//! `"user.name"`. Two special paths exist:
//!
//! - the **root** path (`""`), which names the whole tree;
//! - the **all** sentinel (`"*"`), emitted when the tree is replaced
//!   wholesale so that every binding and subscriber refreshes once.
//!
//! # Relatedness
//!
//! Paths are compared segment by segment, never as raw strings: `"user"` is
//! a prefix of `"user.name"` but not of `"username"`. Two paths are related
//! when either is a segment prefix of the other. The root and the sentinel
//! are related to every path.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

const SEPARATOR: char = '.';
const ALL: &str = "*";

/// A validated, dot-delimited location in the state tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyPath {
    raw: String,
}

impl KeyPath {
    /// The root path (names the whole tree).
    #[must_use]
    pub fn root() -> Self {
        Self { raw: String::new() }
    }

    /// The "everything changed" sentinel.
    #[must_use]
    pub fn all() -> Self {
        Self { raw: ALL.into() }
    }

    /// Parse a dotted path.
    ///
    /// `""` is the root and `"*"` the sentinel. Every other input must be a
    /// sequence of non-empty segments, none of which is `*`.
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        if raw.is_empty() || raw == ALL {
            return Ok(Self { raw: raw.into() });
        }
        for segment in raw.split(SEPARATOR) {
            validate_segment(segment).map_err(|reason| {
                StoreError::invalid(format!("key path '{raw}': {reason}"))
            })?;
        }
        Ok(Self { raw: raw.into() })
    }

    /// Path of a direct child of `self`.
    ///
    /// Fails for the sentinel and for segments that are empty, contain a
    /// dot, or equal `*`.
    pub fn child(&self, segment: &str) -> Result<Self, StoreError> {
        if self.is_all() {
            return Err(StoreError::invalid("the '*' sentinel has no children"));
        }
        validate_segment(segment)
            .map_err(|reason| StoreError::invalid(format!("key '{segment}': {reason}")))?;
        if self.raw.is_empty() {
            return Ok(Self {
                raw: segment.into(),
            });
        }
        let mut raw = String::with_capacity(self.raw.len() + 1 + segment.len());
        raw.push_str(&self.raw);
        raw.push(SEPARATOR);
        raw.push_str(segment);
        Ok(Self { raw })
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.raw.is_empty()
    }

    #[must_use]
    pub fn is_all(&self) -> bool {
        self.raw == ALL
    }

    /// Path segments in order. Empty for the root and the sentinel.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        let raw = if self.is_root() || self.is_all() {
            None
        } else {
            Some(self.raw.as_str())
        };
        raw.into_iter().flat_map(|r| r.split(SEPARATOR))
    }

    /// Number of segments.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Last segment, if any.
    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.segments().last()
    }

    /// Parent path. `None` for the root and the sentinel.
    #[must_use]
    pub fn parent(&self) -> Option<KeyPath> {
        if self.is_root() || self.is_all() {
            return None;
        }
        Some(match self.raw.rfind(SEPARATOR) {
            Some(idx) => Self {
                raw: self.raw[..idx].into(),
            },
            None => Self::root(),
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether `self` is a segment prefix of `other` (or equal to it).
    #[must_use]
    pub fn is_prefix_of(&self, other: &KeyPath) -> bool {
        if self.is_root() || self.raw == other.raw {
            return true;
        }
        if self.is_all() || other.is_all() {
            return false;
        }
        other.raw.len() > self.raw.len()
            && other.raw.starts_with(&self.raw)
            && other.raw.as_bytes()[self.raw.len()] == SEPARATOR as u8
    }

    /// Whether a change at `self` can affect `other` or vice versa.
    #[must_use]
    pub fn is_related_to(&self, other: &KeyPath) -> bool {
        self.is_all() || other.is_all() || self.is_prefix_of(other) || other.is_prefix_of(self)
    }
}

fn validate_segment(segment: &str) -> Result<(), &'static str> {
    if segment.is_empty() {
        Err("empty segment")
    } else if segment.contains(SEPARATOR) {
        Err("segment contains '.'")
    } else if segment == ALL {
        Err("'*' is reserved")
    } else {
        Ok(())
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for KeyPath {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for KeyPath {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<KeyPath> for String {
    fn from(path: KeyPath) -> Self {
        path.raw
    }
}

impl AsRef<str> for KeyPath {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

impl PartialEq<str> for KeyPath {
    fn eq(&self, other: &str) -> bool {
        self.raw == other
    }
}

impl PartialEq<&str> for KeyPath {
    fn eq(&self, other: &&str) -> bool {
        self.raw == *other
    }
}
