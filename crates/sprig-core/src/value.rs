#![forbid(unsafe_code)]

//! The state tree value type.
//!
//! [`Value`] is a tagged variant over the shapes a store can hold: scalars,
//! sequences, and string-keyed mappings of further values. Mappings are the
//! only nodes a [`KeyPath`] can traverse; sequences are opaque leaves.
//!
//! Conversions to and from [`serde_json::Value`] are lossless apart from
//! numbers, which are always stored as `f64`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::key_path::KeyPath;

/// String-keyed children of a mapping node.
pub type Mapping = BTreeMap<String, Value>;

/// A node in the state tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Sequence(Vec<Value>),
    Mapping(Mapping),
}

impl Value {
    /// An empty mapping.
    #[must_use]
    pub fn mapping() -> Self {
        Self::Mapping(Mapping::new())
    }

    /// Short name of the variant, for diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Sequence(_) => "sequence",
            Self::Mapping(_) => "mapping",
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn is_mapping(&self) -> bool {
        matches!(self, Self::Mapping(_))
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Self::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Self::Mapping(map) => Some(map),
            _ => None,
        }
    }

    /// Direct child of a mapping node.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_mapping().and_then(|map| map.get(key))
    }

    /// Node at `path`. The root path returns `self`; the sentinel and any
    /// path crossing a non-mapping node return `None`.
    #[must_use]
    pub fn get_path(&self, path: &KeyPath) -> Option<&Value> {
        if path.is_all() {
            return None;
        }
        path.segments().try_fold(self, |node, seg| node.get(seg))
    }

    /// Mapping that owns the last segment of `path`.
    ///
    /// Every intermediate node must already exist and be a mapping; this
    /// mirrors assigning `a.b.c = x` where `a.b` must be an object.
    pub fn parent_mapping_mut(&mut self, path: &KeyPath) -> Result<&mut Mapping, StoreError> {
        if path.is_root() || path.is_all() {
            return Err(StoreError::invalid(format!(
                "'{path}' does not name a property"
            )));
        }
        let depth = path.depth();
        let mut node = self;
        let mut walked = KeyPath::root();
        for seg in path.segments().take(depth - 1) {
            walked = walked.child(seg)?;
            let kind = node.kind();
            node = node
                .as_mapping_mut()
                .ok_or_else(|| {
                    StoreError::invalid(format!("cannot traverse {kind} while resolving '{path}'"))
                })?
                .get_mut(seg)
                .ok_or_else(|| {
                    StoreError::invalid(format!("'{walked}' does not exist while resolving '{path}'"))
                })?;
        }
        let kind = node.kind();
        node.as_mapping_mut().ok_or_else(|| {
            StoreError::invalid(format!("cannot assign '{path}': parent is a {kind}"))
        })
    }

    /// Assign `value` at `path`, returning the previous value if any.
    pub fn set_path(&mut self, path: &KeyPath, value: Value) -> Result<Option<Value>, StoreError> {
        let parent = self.parent_mapping_mut(path)?;
        let key = path.last().unwrap_or_default();
        Ok(parent.insert(key.to_owned(), value))
    }

    /// Text rendering used when a value is written into a text property.
    ///
    /// Strings render bare, integral numbers without a fractional part,
    /// `Null` as the empty string, and containers as compact JSON.
    #[must_use]
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::String(s) => s.clone(),
            Self::Sequence(_) | Self::Mapping(_) => {
                serde_json::Value::from(self.clone()).to_string()
            }
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Sequence(items)
    }
}

impl From<Mapping> for Value {
    fn from(map: Mapping) -> Self {
        Self::Mapping(map)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Sequence(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => {
                Self::Mapping(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => number_to_json(n),
            Value::String(s) => Self::String(s),
            Value::Sequence(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Mapping(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.0e15 {
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn tree() -> Value {
        Value::from(json!({
            "user": { "name": "Ada", "age": 36, "tags": ["a", "b"] },
            "count": 0
        }))
    }

    fn p(raw: &str) -> KeyPath {
        KeyPath::parse(raw).unwrap()
    }

    #[test]
    fn get_path_walks_mappings() {
        let t = tree();
        assert_eq!(t.get_path(&p("user.name")), Some(&Value::from("Ada")));
        assert_eq!(t.get_path(&p("count")), Some(&Value::from(0)));
        assert_eq!(t.get_path(&KeyPath::root()), Some(&t));
        assert_eq!(t.get_path(&p("user.missing")), None);
        assert_eq!(t.get_path(&KeyPath::all()), None);
    }

    #[test]
    fn sequences_are_opaque() {
        let t = tree();
        assert!(t.get_path(&p("user.tags")).is_some());
        assert_eq!(t.get_path(&p("user.tags.0")), None);
    }

    #[test]
    fn set_path_returns_previous() {
        let mut t = tree();
        let old = t.set_path(&p("user.name"), "Grace".into()).unwrap();
        assert_eq!(old, Some(Value::from("Ada")));
        assert_eq!(t.get_path(&p("user.name")), Some(&Value::from("Grace")));

        let fresh = t.set_path(&p("user.email"), "g@x".into()).unwrap();
        assert_eq!(fresh, None);
    }

    #[test]
    fn set_path_rejects_missing_or_scalar_parents() {
        let mut t = tree();
        assert!(t.set_path(&p("nope.name"), Value::Null).is_err());
        assert!(t.set_path(&p("count.value"), Value::Null).is_err());
        assert!(t.set_path(&p("user.tags.0"), Value::Null).is_err());
        assert!(t.set_path(&KeyPath::root(), Value::Null).is_err());
    }

    #[test]
    fn display_string_rendering() {
        assert_eq!(Value::from(3).to_display_string(), "3");
        assert_eq!(Value::from(2.5).to_display_string(), "2.5");
        assert_eq!(Value::Null.to_display_string(), "");
        assert_eq!(Value::from(true).to_display_string(), "true");
        assert_eq!(Value::from("hi").to_display_string(), "hi");
        assert_eq!(
            Value::from(json!({"a": [1, 2]})).to_display_string(),
            r#"{"a":[1,2]}"#
        );
    }

    #[test]
    fn json_conversion_keeps_integers() {
        let t = tree();
        let back = serde_json::Value::from(t);
        assert_eq!(back["user"]["age"], json!(36));
        assert_eq!(back["user"]["tags"], json!(["a", "b"]));
    }

    #[test]
    fn serde_untagged_roundtrip() {
        let v: Value = serde_json::from_str(r#"{"a":null,"b":[true,1.5,"x"]}"#).unwrap();
        assert_eq!(v.get("a"), Some(&Value::Null));
        assert_eq!(
            v.get("b"),
            Some(&Value::Sequence(vec![
                Value::Bool(true),
                Value::Number(1.5),
                Value::from("x")
            ]))
        );
    }
}
