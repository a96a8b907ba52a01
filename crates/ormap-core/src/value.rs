//! Scalar values stored in rows and model fields.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A scalar column value.
///
/// Serialized untagged so JSON fixtures map directly: `null`, booleans,
/// integers, floats and strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL / absent value.
    #[default]
    Null,
    /// Boolean; persisted as 0/1.
    Bool(bool),
    /// Signed integer, also used for ids and foreign keys.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Text, including comma-separated id lists.
    Text(String),
}

impl Value {
    /// True for NULL.
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for NULL and the empty string.
    ///
    /// This is the "not worth caching" test used by single-field key caches.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Strict integer view: only `Int` values.
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Strict text view.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Lenient integer conversion.
    ///
    /// NULL and unparsable text become 0, booleans become 0/1, floats are
    /// truncated and text is parsed after trimming.
    pub fn to_int(&self) -> i64 {
        match self {
            Value::Null => 0,
            Value::Bool(b) => i64::from(*b),
            Value::Int(i) => *i,
            Value::Float(f) => *f as i64,
            Value::Text(s) => s.trim().parse().unwrap_or(0),
        }
    }

    /// Lenient float conversion, mirroring [`Value::to_int`].
    pub fn to_float(&self) -> f64 {
        match self {
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Int(i) => *i as f64,
            Value::Float(f) => *f,
            Value::Text(s) => s.trim().parse().unwrap_or(0.0),
        }
    }

    /// Truthiness: NULL, `false`, 0, 0.0, `""` and `"0"` are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Text(s) => !(s.is_empty() || s == "0"),
        }
    }

    /// Booleans become 0/1 integers; everything else is returned unchanged.
    #[must_use]
    pub fn into_storable(self) -> Value {
        match self {
            Value::Bool(b) => Value::Int(i64::from(b)),
            other => other,
        }
    }

    /// Text form used to key caches and build compound keys.
    pub fn to_key_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => s.clone(),
        }
    }

    /// Total order used for sorting rows.
    ///
    /// NULL sorts first; numbers compare numerically across `Int`/`Float`/
    /// `Bool`; text compares lexically and sorts after numbers.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Text(_), _) => Ordering::Greater,
            (_, Value::Text(_)) => Ordering::Less,
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (a, b) => a.to_float().total_cmp(&b.to_float()),
        }
    }

    /// Loose equality used by row filters: numbers compare numerically and
    /// numeric text matches the number it spells.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Text(s), n) | (n, Value::Text(s)) => s
                .trim()
                .parse::<f64>()
                .is_ok_and(|parsed| parsed == n.to_float()),
            (a, b) => a.to_float() == b.to_float(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            other => f.write_str(&other.to_key_string()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
