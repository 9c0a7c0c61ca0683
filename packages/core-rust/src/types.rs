use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single row as returned by the data-access layer.
///
/// Key order follows the payload (`serde_json` is built with `preserve_order`).
pub type Record = serde_json::Map<String, Value>;

/// Insertion-ordered mapping from a stored option value to its display label.
pub type OptionMap = IndexMap<String, String>;

/// Name of the identifier property used when a source does not declare one.
pub const DEFAULT_KEY_NAME: &str = "id";

/// Identifier of a record, used for point reads, deletes, and upserts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordKey {
    /// Numeric identifier.
    Int(i64),
    /// Textual identifier (UUIDs, slugs, numeric strings).
    Text(String),
}

impl RecordKey {
    /// Extracts a key from a JSON value. Integral floats are accepted;
    /// everything that is not a number or a string yields `None`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    return Some(Self::Int(i));
                }
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.is_finite())
                    .map(|f| Self::Int(f as i64))
            }
            Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    /// JSON representation used in query and mutation variables.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Int(i) => Value::from(*i),
            Self::Text(s) => Value::String(s.clone()),
        }
    }

    /// A key selects update mode when it is truthy: non-zero or non-empty.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Int(i) => *i != 0,
            Self::Text(s) => !s.is_empty(),
        }
    }

    /// Numeric comparison against zero. Text keys count only when they
    /// parse as a number.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        match self {
            Self::Int(i) => *i > 0,
            Self::Text(s) => s.trim().parse::<f64>().is_ok_and(|f| f > 0.0),
        }
    }

    /// Whether a JSON value identifies the same record.
    #[must_use]
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Int(i), Value::Number(_)) => Self::from_json(value) == Some(Self::Int(*i)),
            (Self::Text(s), Value::String(other)) => s == other,
            _ => false,
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RecordKey {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for RecordKey {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for RecordKey {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// A stored value, classified once instead of probed structurally.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawValue<'a> {
    /// Plain value, including objects without an identifier.
    Scalar(&'a Value),
    /// Composite object carrying an `id` member.
    Reference {
        /// The identifier member of the referenced object.
        id: &'a Value,
    },
}

impl<'a> RawValue<'a> {
    #[must_use]
    pub fn classify(value: &'a Value) -> Self {
        match value.as_object().and_then(|obj| obj.get(DEFAULT_KEY_NAME)) {
            Some(id) => Self::Reference { id },
            None => Self::Scalar(value),
        }
    }

    /// The value to work with: the identifier for references, the value itself otherwise.
    #[must_use]
    pub fn resolved(self) -> &'a Value {
        match self {
            Self::Scalar(value) => value,
            Self::Reference { id } => id,
        }
    }
}

/// Display form of a JSON value.
///
/// Integral numbers drop their fraction, arrays join with `,`, `null`
/// becomes the empty string, and objects keep their compact JSON form.
#[must_use]
pub fn display_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_string(n),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(display_string).collect::<Vec<_>>().join(","),
        Value::Object(_) => value.to_string(),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn number_string(n: &serde_json::Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => (f as i64).to_string(),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

/// Truthiness of a stored value: `null`, `false`, `0`, `NaN` and `""` are falsy.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Numeric reading of a value; numeric strings are parsed.
#[must_use]
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
