use thiserror::Error;

use super::value::ValueKind;

/// Errors raised while building or reading attributes and entities, and while
/// comparing their values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObjectError {
    #[error("Argument '{0}' must not be blank")]
    BlankArgument(&'static str),

    #[error("The value set can not be empty")]
    EmptyValueSet,

    #[error("Attribute '{path}' type '{kind}' is not supported")]
    UnsupportedValue { path: String, kind: ValueKind },

    #[error("Attribute type '{0}' is not supported")]
    UnsupportedType(ValueKind),

    #[error("Attribute '{0}' is not single value attribute")]
    NotSingleValued(String),

    #[error("Attribute '{name}' holds a '{found}' value, not '{expected}'")]
    TypeMismatch {
        name: String,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("Attribute '{name}' value of type '{kind}' is not comparable")]
    NotComparable { name: String, kind: ValueKind },

    #[error("Attribute '{name}' value {millis} is not a valid timestamp")]
    InvalidDate { name: String, millis: i64 },
}

pub type ObjectResult<T> = Result<T, ObjectError>;
