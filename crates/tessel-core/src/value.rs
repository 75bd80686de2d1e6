//! Dynamic structured values and hashable map keys.
//!
//! [`Value`] is the currency of every proxy operation: inputs to
//! `assign`, snapshots from `to_json`, and change sets from `diff`.
//! [`Key`] is the hashable projection of a scalar [`Value`] used to
//! address map entries.

use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// A dynamically shaped value.
///
/// Numeric variants compare by numeric value, so `Int(3)`, `UInt(3)`
/// and `Float(3.0)` are all equal. `Null` doubles as "absent": a freed
/// array slot or a removed map entry reports `Null` in a diff.
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// No value.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer (signed fixed-width kinds, `varint`, `int64`).
    Int(i64),
    /// An unsigned integer (unsigned fixed-width kinds, `varuint`, `uint64`).
    UInt(u64),
    /// A floating-point number (`float32` values are widened).
    Float(f64),
    /// A UTF-8 string.
    String(String),
    /// An ordered sequence (array snapshots).
    List(Vec<Value>),
    /// A keyed record in declaration order (object snapshots and diffs).
    Object(IndexMap<String, Value>),
    /// A sparse index → value mapping (array diffs and partial array input).
    Indexed(BTreeMap<usize, Value>),
    /// Ordered `[key, value]` pairs (map snapshots and diffs).
    Entries(Vec<(Value, Value)>),
}

impl Value {
    /// Build an [`Value::Object`] from `(name, value)` pairs.
    pub fn object<K, V, I>(fields: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::Object(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build a [`Value::List`].
    pub fn list<V, I>(items: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// Build a [`Value::Indexed`] from `(index, value)` pairs.
    pub fn indexed<V, I>(entries: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = (usize, V)>,
    {
        Self::Indexed(entries.into_iter().map(|(i, v)| (i, v.into())).collect())
    }

    /// Build a [`Value::Entries`] from `(key, value)` pairs.
    pub fn entries<K, V, I>(entries: I) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::Entries(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Whether this is [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether this is one of the numeric variants.
    pub fn is_number(&self) -> bool {
        matches!(self, Self::Int(_) | Self::UInt(_) | Self::Float(_))
    }

    /// Borrow the fields of an [`Value::Object`].
    pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Borrow the items of a [`Value::List`].
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow the string of a [`Value::String`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The value as an `f64`, if numeric or boolean.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Bool(b) => Some(if b { 1.0 } else { 0.0 }),
            Self::Int(n) => Some(n as f64),
            Self::UInt(n) => Some(n as f64),
            Self::Float(f) => Some(f),
            _ => None,
        }
    }

    /// The value as an `i64`, if it is an integer that fits.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Int(n) => Some(n),
            Self::UInt(n) => i64::try_from(n).ok(),
            Self::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(f as i64),
            _ => None,
        }
    }

    /// The value as a `u64`, if it is a non-negative integer that fits.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Self::Int(n) => u64::try_from(n).ok(),
            Self::UInt(n) => Some(n),
            Self::Float(f) if f.fract() == 0.0 && f >= 0.0 && f.is_finite() => Some(f as u64),
            _ => None,
        }
    }

    /// Look up a field of an [`Value::Object`].
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Integer view used by the codec: truncates floats toward zero,
    /// maps NaN and infinities to 0, booleans to 0/1.
    pub(crate) fn to_integer(&self) -> i128 {
        match *self {
            Self::Bool(b) => i128::from(b),
            Self::Int(n) => i128::from(n),
            Self::UInt(n) => i128::from(n),
            Self::Float(f) if f.is_finite() => f.trunc() as i128,
            Self::String(ref s) => s.trim().parse::<f64>().map_or(0, |f| {
                if f.is_finite() {
                    f.trunc() as i128
                } else {
                    0
                }
            }),
            _ => 0,
        }
    }

    /// Float view used by the codec. Non-numeric values become NaN,
    /// except `Null` and `false`, which become 0.
    pub(crate) fn to_float(&self) -> f64 {
        match self {
            Self::Null => 0.0,
            Self::String(s) => s.trim().parse().unwrap_or(f64::NAN),
            other => other.as_f64().unwrap_or(f64::NAN),
        }
    }

    /// Truthiness used when coercing into a boolean leaf.
    pub(crate) fn truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(n) => *n != 0,
            Self::UInt(n) => *n != 0,
            Self::Float(f) => *f != 0.0 && !f.is_nan(),
            Self::String(s) => !s.is_empty(),
            _ => true,
        }
    }
}

fn numeric_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::UInt(x), Value::UInt(y)) => x == y,
        (Value::Int(x), Value::UInt(y)) | (Value::UInt(y), Value::Int(x)) => {
            i128::from(*x) == i128::from(*y)
        }
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::Float(f), Value::Int(n)) | (Value::Int(n), Value::Float(f)) => *f == *n as f64,
        (Value::Float(f), Value::UInt(n)) | (Value::UInt(n), Value::Float(f)) => *f == *n as f64,
        _ => false,
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            (Self::Indexed(a), Self::Indexed(b)) => a == b,
            (Self::Entries(a), Self::Entries(b)) => a == b,
            (a, b) if a.is_number() && b.is_number() => numeric_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => f.write_str(&s),
            Err(_) => write!(f, "{self:?}"),
        }
    }
}

macro_rules! value_from {
    ($variant:ident as $target:ty: $($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Self::$variant(v as $target)
                }
            }
        )*
    };
}

value_from!(Int as i64: i8, i16, i32, i64);
value_from!(UInt as u64: u8, u16, u32, u64, usize);
value_from!(Float as f64: f32, f64);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(v: IndexMap<String, Value>) -> Self {
        Self::Object(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl From<&Value> for Value {
    fn from(v: &Value) -> Self {
        v.clone()
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(n) => serializer.serialize_i64(*n),
            Self::UInt(n) => serializer.serialize_u64(*n),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::String(s) => serializer.serialize_str(s),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Object(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (k, v) in fields {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Self::Indexed(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Self::Entries(pairs) => {
                let mut seq = serializer.serialize_seq(Some(pairs.len()))?;
                for pair in pairs {
                    seq.serialize_element(&[&pair.0, &pair.1])?;
                }
                seq.end()
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(b),
            Json::Number(n) => {
                if let Some(u) = n.as_u64() {
                    Self::UInt(u)
                } else if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else {
                    Self::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Json::String(s) => Self::String(s),
            Json::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Json::Object(fields) => {
                Self::Object(fields.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        // Serializing a `Value` into `serde_json::Value` cannot fail: every
        // map key is a string or an integer.
        serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
    }
}

/// Hashable projection of a scalar [`Value`], used to address map entries.
///
/// Floats hash by bit pattern, so `0.0` and `-0.0` are distinct keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    /// The `Null` key.
    Null,
    /// A boolean key.
    Bool(bool),
    /// A signed integer key.
    Int(i64),
    /// An unsigned integer key.
    UInt(u64),
    /// A float key, stored as its IEEE-754 bits.
    Float(u64),
    /// A string key.
    String(String),
}

impl Key {
    /// Project a scalar value into a key. Composite values have no key.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::Null),
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Int(n) => Some(Self::Int(*n)),
            Value::UInt(n) => Some(Self::UInt(*n)),
            Value::Float(f) => Some(Self::Float(f.to_bits())),
            Value::String(s) => Some(Self::String(s.clone())),
            _ => None,
        }
    }

    /// The scalar value this key was projected from.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(n) => Value::Int(*n),
            Self::UInt(n) => Value::UInt(*n),
            Self::Float(bits) => Value::Float(f64::from_bits(*bits)),
            Self::String(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}
