//! # Event Envelopes
//!
//! Raw XSI event envelopes as delivered by the push channel. The vendor sends
//! XML which the channel renders into nested maps, so an envelope looks like:
//!
//! ```text
//! {"xsi:Event": {"@xsi1:type": "xsi:SubscriptionEvent",
//!                "xsi:targetId": "queue@example.com",
//!                "xsi:eventData": {"@xsi1:type": "xsi:ACDCallAddedEvent", ...}}}
//! ```
//!
//! Keys may or may not carry a namespace prefix depending on the channel, so
//! every lookup here matches on the local name: `eventData` finds both
//! `eventData` and `xsi:eventData`, and `@type` finds `@xsi1:type`. Values are
//! returned untouched.
//!
//! ## Examples
//!
//! ```rust
//! use xsi_monitor_core::envelope::{Envelope, Lookup};
//!
//! let envelope = Envelope::from_json_str(
//!     r#"{"xsi:Event":{"xsi:targetId":"q1"}}"#
//! ).unwrap();
//!
//! assert_eq!(envelope.text(&["Event", "targetId"]), Some("q1"));
//! assert!(matches!(envelope.lookup(&["Event", "eventData"]), Lookup::Missing));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::NormalizationFault;

/// Key XML text nodes are stored under when an element also has attributes
const TEXT_NODE: &str = "#text";

/// An opaque, vendor-defined event payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Envelope(Value);

/// Outcome of descending a path inside an envelope
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<'a> {
    /// A key on the path does not exist
    Missing,
    /// The full path resolved to this value
    Found(&'a Value),
    /// An intermediate value on the path is not a map
    Mismatch {
        /// Dotted path of the offending value
        path: String,
        /// JSON kind of the offending value
        found: &'static str,
    },
}

impl Envelope {
    /// Wrap an already-parsed value
    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    /// Parse an envelope from JSON text
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text).map(Self)
    }

    /// Parse an envelope from JSON bytes
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes).map(Self)
    }

    /// Borrow the underlying value
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Unwrap into the underlying value
    pub fn into_value(self) -> Value {
        self.0
    }

    /// Null, empty map, empty list and empty string carry nothing to process
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Descend `path` one map at a time
    pub fn lookup(&self, path: &[&str]) -> Lookup<'_> {
        let mut current = &self.0;
        for (depth, segment) in path.iter().enumerate() {
            match current {
                Value::Object(map) => match find_key(map, segment) {
                    Some(next) => current = next,
                    None => return Lookup::Missing,
                },
                other => {
                    return Lookup::Mismatch {
                        path: dotted(&path[..depth]),
                        found: value_kind(other),
                    }
                }
            }
        }
        Lookup::Found(current)
    }

    /// Strict string lookup used by the normalizer
    ///
    /// Missing keys and nulls yield `Ok(None)`; any value of the wrong type on
    /// the way down is reported as a fault.
    pub fn string_at(&self, path: &[&str]) -> Result<Option<&str>, NormalizationFault> {
        match self.lookup(path) {
            Lookup::Missing => Ok(None),
            Lookup::Mismatch { path, found } => Err(NormalizationFault::TypeMismatch {
                path,
                expected: "object",
                found,
            }),
            Lookup::Found(Value::Null) => Ok(None),
            Lookup::Found(value) => match leaf_text(value) {
                Some(text) => Ok(Some(text)),
                None => Err(NormalizationFault::TypeMismatch {
                    path: dotted(path),
                    expected: "string",
                    found: value_kind(value),
                }),
            },
        }
    }

    /// Lenient string lookup; anything unexpected is treated as absent
    pub fn text(&self, path: &[&str]) -> Option<&str> {
        match self.lookup(path) {
            Lookup::Found(value) => leaf_text(value),
            _ => None,
        }
    }

    /// Whether `path` resolves to a map
    pub fn has_object(&self, path: &[&str]) -> bool {
        matches!(self.lookup(path), Lookup::Found(Value::Object(_)))
    }
}

impl From<Value> for Envelope {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Local part of a possibly namespaced name
///
/// `xsi:eventData` becomes `eventData`, `@xsi1:type` becomes `@type`.
pub fn local_name(name: &str) -> std::borrow::Cow<'_, str> {
    let (attribute, rest) = match name.strip_prefix('@') {
        Some(rest) => (true, rest),
        None => (false, name),
    };
    let local = rest.rsplit(':').next().unwrap_or(rest);
    if attribute {
        std::borrow::Cow::Owned(format!("@{local}"))
    } else {
        std::borrow::Cow::Borrowed(local)
    }
}

/// JSON kind name used in diagnostics
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn find_key<'a>(map: &'a Map<String, Value>, wanted: &str) -> Option<&'a Value> {
    if let Some(value) = map.get(wanted) {
        return Some(value);
    }
    let wanted = local_name(wanted);
    map.iter()
        .find(|(key, _)| local_name(key) == wanted)
        .map(|(_, value)| value)
}

fn leaf_text(value: &Value) -> Option<&str> {
    match value {
        Value::String(text) => Some(text.as_str()),
        Value::Object(map) => map.get(TEXT_NODE).and_then(Value::as_str),
        _ => None,
    }
}

fn dotted(path: &[&str]) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        path.join(".")
    }
}
