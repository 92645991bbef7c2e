use std::{
    collections::BTreeMap,
    fmt,
    hash::{Hash, Hasher},
};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::{
    error::{ObjectError, ObjectResult},
    map::AttributeMap,
    value::{Value, ValueKind, fold_eq},
};

/// A named, ordered, multi-valued container of typed values.
///
/// The name is fixed at construction and must not be blank. Values are only
/// ever appended, and each one is validated against the supported kinds
/// before it is stored. Equality compares names case-insensitively and values
/// structurally.
#[derive(Debug, Clone, Serialize)]
pub struct Attribute {
    name: String,
    values: Vec<Value>,
}

impl Attribute {
    /// Create an attribute without values.
    pub fn build(name: impl Into<String>) -> ObjectResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ObjectError::BlankArgument("name"));
        }
        Ok(Self {
            name,
            values: Vec::new(),
        })
    }

    /// Create an attribute holding `values`.
    pub fn build_with<I, V>(name: impl Into<String>, values: I) -> ObjectResult<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let mut attribute = Self::build(name)?;
        attribute.add(values)?;
        Ok(attribute)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Whether this attribute is called `name`, ignoring case.
    pub fn is(&self, name: &str) -> bool {
        fold_eq(&self.name, name)
    }

    /// Append `values`.
    ///
    /// Every value is validated first; nothing is appended if any of them is
    /// rejected.
    pub fn add<I, V>(&mut self, values: I) -> ObjectResult<&mut Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        for value in &values {
            Self::check_attribute_value(Some(self.name.as_str()), value)?;
        }
        self.values.extend(values);
        Ok(self)
    }

    /// Locate the attribute called `name` (ignoring case) in `attributes`.
    pub fn find<'a, I>(name: &str, attributes: I) -> ObjectResult<Option<&'a Attribute>>
    where
        I: IntoIterator<Item = &'a Attribute>,
    {
        if name.trim().is_empty() {
            return Err(ObjectError::BlankArgument("name"));
        }
        Ok(attributes.into_iter().find(|cursor| cursor.is(name)))
    }

    /// Project `attributes` onto a case-insensitive name→attribute mapping.
    /// Later attributes win on name collision.
    pub fn to_map<I>(attributes: I) -> AttributeMap
    where
        I: IntoIterator<Item = Attribute>,
    {
        attributes.into_iter().collect()
    }

    /// Whether values of `kind` may be stored in an attribute.
    pub fn supported(kind: ValueKind) -> bool {
        !matches!(kind, ValueKind::Null | ValueKind::List)
    }

    pub fn check_attribute_type(kind: ValueKind) -> ObjectResult<()> {
        if Self::supported(kind) {
            Ok(())
        } else {
            Err(ObjectError::UnsupportedType(kind))
        }
    }

    /// Validate a candidate value for the attribute `name`.
    ///
    /// Nested maps are walked recursively; failures inside them carry a
    /// path such as `parent/key` or `parent/key[*]` for collection entries.
    /// `Null` is always accepted.
    pub fn check_attribute_value(name: Option<&str>, value: &Value) -> ObjectResult<()> {
        match (name, value) {
            (_, Value::Null) => Ok(()),
            (_, Value::Map(_)) => check_nested(name.unwrap_or("?"), value),
            (None, other) => Self::check_attribute_type(other.kind()),
            (Some(name), other) => check_nested(name, other),
        }
    }

    /// The only value, `None` when there is none.
    ///
    /// Fails with [`ObjectError::NotSingleValued`] when more than one value
    /// is present.
    pub fn single_value(&self) -> ObjectResult<Option<&Value>> {
        match self.values.as_slice() {
            [] => Ok(None),
            [value] => Ok(Some(value)),
            _ => Err(ObjectError::NotSingleValued(self.name.clone())),
        }
    }

    pub fn string_value(&self) -> ObjectResult<Option<&str>> {
        match self.single_value()? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(value)) => Ok(Some(value)),
            Some(other) => Err(self.mismatch(ValueKind::String, other)),
        }
    }

    pub fn byte_array_value(&self) -> ObjectResult<Option<&[u8]>> {
        match self.single_value()? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bytes(value)) => Ok(Some(value)),
            Some(other) => Err(self.mismatch(ValueKind::Bytes, other)),
        }
    }

    pub fn map_value(&self) -> ObjectResult<Option<&BTreeMap<String, Value>>> {
        match self.single_value()? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Map(value)) => Ok(Some(value)),
            Some(other) => Err(self.mismatch(ValueKind::Map, other)),
        }
    }

    /// The single value rendered as a string, whatever its kind.
    pub fn as_string_value(&self) -> ObjectResult<Option<String>> {
        Ok(self
            .single_value()?
            .filter(|value| !value.is_null())
            .map(ToString::to_string))
    }

    /// The single `Long` value read as epoch milliseconds.
    pub fn date_value(&self) -> ObjectResult<Option<DateTime<Utc>>> {
        match self.long_value()? {
            None => Ok(None),
            Some(millis) => DateTime::from_timestamp_millis(millis)
                .map(Some)
                .ok_or_else(|| ObjectError::InvalidDate {
                    name: self.name.clone(),
                    millis,
                }),
        }
    }

    fn mismatch(&self, expected: ValueKind, found: &Value) -> ObjectError {
        ObjectError::TypeMismatch {
            name: self.name.clone(),
            expected,
            found: found.kind(),
        }
    }
}

macro_rules! copy_accessors {
    ($($fn_name:ident => $variant:ident : $ty:ty),* $(,)?) => {
        impl Attribute {
            $(
                pub fn $fn_name(&self) -> ObjectResult<Option<$ty>> {
                    match self.single_value()? {
                        None | Some(Value::Null) => Ok(None),
                        Some(Value::$variant(value)) => Ok(Some(*value)),
                        Some(other) => Err(self.mismatch(ValueKind::$variant, other)),
                    }
                }
            )*
        }
    };
}

copy_accessors! {
    boolean_value => Boolean: bool,
    character_value => Character: char,
    byte_value => Byte: i8,
    integer_value => Integer: i32,
    long_value => Long: i64,
    float_value => Float: f32,
    double_value => Double: f64,
    big_integer_value => BigInteger: i128,
    big_decimal_value => BigDecimal: Decimal,
}

fn check_nested(path: &str, value: &Value) -> ObjectResult<()> {
    match value {
        Value::Null => Ok(()),
        Value::Map(entries) => {
            for (key, entry) in entries {
                let nested = format!("{}/{}", path, key);
                if let Value::List(items) = entry {
                    let nested = format!("{}[*]", nested);
                    for item in items {
                        check_nested(&nested, item)?;
                    }
                } else {
                    check_nested(&nested, entry)?;
                }
            }
            Ok(())
        }
        other if Attribute::supported(other.kind()) => Ok(()),
        other => Err(ObjectError::UnsupportedValue {
            path: path.to_string(),
            kind: other.kind(),
        }),
    }
}

impl PartialEq for Attribute {
    fn eq(&self, other: &Self) -> bool {
        self.is(&other.name) && self.values == other.values
    }
}

impl Eq for Attribute {}

impl Hash for Attribute {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.to_lowercase().hash(state);
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=[", self.name)?;
        for (idx, value) in self.values.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", value)?;
        }
        f.write_str("]")
    }
}
