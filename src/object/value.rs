//! Attribute values.
//!
//! [`Value`] is the closed set of kinds an [`Attribute`](super::Attribute) can
//! carry: strings, booleans, characters, the integer and floating-point
//! families, raw bytes, arbitrary-precision integers and decimals, plus nested
//! name→value maps. `Null` is accepted as an explicit "no value" marker.
//! `List` only exists so that collections nested inside a map can be
//! represented; a list is never a valid attribute value on its own.

use std::{
    cmp::Ordering,
    collections::BTreeMap,
    fmt,
    hash::{Hash, Hasher},
};

use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::Serialize;

/// Discriminator of a [`Value`], used in validation and type-mismatch errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Null,
    String,
    Boolean,
    Character,
    Byte,
    Integer,
    Long,
    Float,
    Double,
    Bytes,
    BigInteger,
    BigDecimal,
    Map,
    List,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Character => "character",
            Self::Byte => "byte",
            Self::Integer => "integer",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::Bytes => "bytes",
            Self::BigInteger => "big_integer",
            Self::BigDecimal => "big_decimal",
            Self::Map => "map",
            Self::List => "list",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single attribute value.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    String(String),
    Boolean(bool),
    Character(char),
    Byte(i8),
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Bytes(Vec<u8>),
    BigInteger(i128),
    BigDecimal(Decimal),
    Map(BTreeMap<String, Value>),
    List(Vec<Value>),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::String(_) => ValueKind::String,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Character(_) => ValueKind::Character,
            Value::Byte(_) => ValueKind::Byte,
            Value::Integer(_) => ValueKind::Integer,
            Value::Long(_) => ValueKind::Long,
            Value::Float(_) => ValueKind::Float,
            Value::Double(_) => ValueKind::Double,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::BigInteger(_) => ValueKind::BigInteger,
            Value::BigDecimal(_) => ValueKind::BigDecimal,
            Value::Map(_) => ValueKind::Map,
            Value::List(_) => ValueKind::List,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Equality that optionally folds the case of strings and characters.
    pub fn equals(&self, other: &Value, case_ignore: bool) -> bool {
        match (self, other) {
            (Value::String(a), Value::String(b)) if case_ignore => fold_eq(a, b),
            (Value::Character(a), Value::Character(b)) if case_ignore => {
                a.to_lowercase().eq(b.to_lowercase())
            }
            _ => self == other,
        }
    }

    /// Natural ordering between two values.
    ///
    /// Returns `None` when the pair has no ordering: mismatched kinds, or
    /// kinds that are not ordered at all (bytes, maps, lists, null). Numeric
    /// kinds compare across families.
    pub fn compare(&self, other: &Value, case_ignore: bool) -> Option<Ordering> {
        match (self, other) {
            (Value::String(a), Value::String(b)) => Some(if case_ignore {
                a.to_lowercase().cmp(&b.to_lowercase())
            } else {
                a.cmp(b)
            }),
            (Value::Character(a), Value::Character(b)) => Some(if case_ignore {
                a.to_lowercase().cmp(b.to_lowercase())
            } else {
                a.cmp(b)
            }),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            _ => self.numeric()?.compare(&other.numeric()?),
        }
    }

    fn numeric(&self) -> Option<Numeric> {
        match self {
            Value::Byte(v) => Some(Numeric::Integer(i128::from(*v))),
            Value::Integer(v) => Some(Numeric::Integer(i128::from(*v))),
            Value::Long(v) => Some(Numeric::Integer(i128::from(*v))),
            Value::BigInteger(v) => Some(Numeric::Integer(*v)),
            Value::Float(v) => Some(Numeric::Float(f64::from(*v))),
            Value::Double(v) => Some(Numeric::Float(*v)),
            Value::BigDecimal(v) => Some(Numeric::Decimal(*v)),
            _ => None,
        }
    }
}

pub(crate) fn fold_eq(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

enum Numeric {
    Integer(i128),
    Float(f64),
    Decimal(Decimal),
}

impl Numeric {
    fn compare(&self, other: &Numeric) -> Option<Ordering> {
        match (self, other) {
            (Numeric::Integer(a), Numeric::Integer(b)) => Some(a.cmp(b)),
            (Numeric::Decimal(a), Numeric::Decimal(b)) => Some(a.cmp(b)),
            (Numeric::Decimal(d), Numeric::Integer(i)) => match integral_decimal(*i) {
                Some(i) => Some(d.cmp(&i)),
                None => d.to_f64()?.partial_cmp(&(*i as f64)),
            },
            (Numeric::Integer(_), Numeric::Decimal(_)) => {
                other.compare(self).map(Ordering::reverse)
            }
            _ => self.to_f64()?.partial_cmp(&other.to_f64()?),
        }
    }

    fn to_f64(&self) -> Option<f64> {
        match self {
            Numeric::Integer(v) => Some(*v as f64),
            Numeric::Float(v) => Some(*v),
            Numeric::Decimal(v) => v.to_f64(),
        }
    }
}

fn integral_decimal(value: i128) -> Option<Decimal> {
    Decimal::try_from_i128_with_scale(value, 0).ok()
}

// Floating-point values compare by bit pattern so that equality stays
// reflexive and agrees with `Hash`.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Character(a), Value::Character(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::BigInteger(a), Value::BigInteger(b)) => a == b,
            (Value::BigDecimal(a), Value::BigDecimal(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind().hash(state);
        match self {
            Value::Null => {}
            Value::String(v) => v.hash(state),
            Value::Boolean(v) => v.hash(state),
            Value::Character(v) => v.hash(state),
            Value::Byte(v) => v.hash(state),
            Value::Integer(v) => v.hash(state),
            Value::Long(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::Double(v) => v.to_bits().hash(state),
            Value::Bytes(v) => v.hash(state),
            Value::BigInteger(v) => v.hash(state),
            Value::BigDecimal(v) => v.hash(state),
            Value::Map(v) => v.hash(state),
            Value::List(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::String(v) => f.write_str(v),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Character(v) => write!(f, "{}", v),
            Value::Byte(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Bytes(v) => f.write_str(&hex::encode(v)),
            Value::BigInteger(v) => write!(f, "{}", v),
            Value::BigDecimal(v) => write!(f, "{}", v),
            Value::Map(map) => {
                f.write_str("{")?;
                for (idx, (key, value)) in map.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}={}", key, value)?;
                }
                f.write_str("}")
            }
            Value::List(items) => {
                f.write_str("[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

impl_from! {
    String => String,
    bool => Boolean,
    char => Character,
    i8 => Byte,
    i32 => Integer,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    Vec<u8> => Bytes,
    i128 => BigInteger,
    Decimal => BigDecimal,
    BTreeMap<String, Value> => Map,
    Vec<Value> => List,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Bytes(value.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Long(i)
                } else if let Some(u) = n.as_u64() {
                    Value::BigInteger(i128::from(u))
                } else {
                    n.as_f64().map_or(Value::Null, Value::Double)
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}
