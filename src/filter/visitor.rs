use std::{cmp::Ordering, fmt};

use serde::Serialize;

use super::{Filter, Substring};
use crate::object::{Attribute, Entity, ObjectError, ObjectResult, Value};

/// Three-valued evaluation result.
///
/// Variants are declared in truth order, so `and` keeps the minimum and `or`
/// keeps the maximum. `Undefined` means the compared attribute was absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TriState {
    False,
    Undefined,
    True,
}

impl TriState {
    pub fn and(self, other: TriState) -> TriState {
        self.min(other)
    }

    pub fn or(self, other: TriState) -> TriState {
        self.max(other)
    }

    pub fn negate(self) -> TriState {
        match self {
            TriState::False => TriState::True,
            TriState::Undefined => TriState::Undefined,
            TriState::True => TriState::False,
        }
    }
}

impl From<bool> for TriState {
    fn from(value: bool) -> Self {
        if value {
            TriState::True
        } else {
            TriState::False
        }
    }
}

/// `Undefined` collapses to `false`.
impl From<TriState> for bool {
    fn from(value: TriState) -> Self {
        value == TriState::True
    }
}

impl fmt::Display for TriState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TriState::False => "FALSE",
            TriState::Undefined => "UNDEFINED",
            TriState::True => "TRUE",
        })
    }
}

/// One method per [`Filter`] variant, called through
/// [`Filter::accept_visitor`] with a caller-supplied parameter.
///
/// [`Filter::Chained`] never reaches a visitor; it is dispatched as its inner
/// filter.
pub trait FilterVisitor<P: ?Sized> {
    type Output;

    fn and(&self, param: &P, filters: &[Filter]) -> Self::Output;

    fn or(&self, param: &P, filters: &[Filter]) -> Self::Output;

    fn not(&self, param: &P, filter: &Filter) -> Self::Output;

    fn presence(&self, param: &P, name: &str) -> Self::Output;

    fn equal(&self, param: &P, attribute: &Attribute) -> Self::Output;

    fn greater_than(&self, param: &P, attribute: &Attribute) -> Self::Output;

    fn greater_than_or_equal(&self, param: &P, attribute: &Attribute) -> Self::Output;

    fn less_than(&self, param: &P, attribute: &Attribute) -> Self::Output;

    fn less_than_or_equal(&self, param: &P, attribute: &Attribute) -> Self::Output;

    fn starts_with(&self, param: &P, leaf: &Substring) -> Self::Output;

    fn ends_with(&self, param: &P, leaf: &Substring) -> Self::Output;

    fn contains(&self, param: &P, leaf: &Substring) -> Self::Output;

    fn contains_all(&self, param: &P, attribute: &Attribute) -> Self::Output;
}

/// In-memory evaluator of a [`Filter`] against an [`Entity`].
///
/// Holds only the case-ignore flag, so instances are freely shared; use
/// [`DefaultVisitor::CASE_SENSITIVE`] and [`DefaultVisitor::CASE_IGNORE`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefaultVisitor {
    case_ignore: bool,
}

impl DefaultVisitor {
    pub const CASE_SENSITIVE: DefaultVisitor = DefaultVisitor { case_ignore: false };
    pub const CASE_IGNORE: DefaultVisitor = DefaultVisitor { case_ignore: true };

    pub const fn new(case_ignore: bool) -> Self {
        Self { case_ignore }
    }

    pub fn case_ignore(&self) -> bool {
        self.case_ignore
    }

    pub fn evaluate(&self, filter: &Filter, entity: &Entity) -> ObjectResult<TriState> {
        filter.accept_visitor(self, entity)
    }

    fn compare(
        &self,
        entity: &Entity,
        attribute: &Attribute,
        accept: fn(Ordering) -> bool,
    ) -> ObjectResult<TriState> {
        let Some(actual) = entity.get(attribute.name()) else {
            return Ok(TriState::Undefined);
        };
        let (Some(value), Some(expected)) = (actual.single_value()?, attribute.single_value()?)
        else {
            return Ok(TriState::Undefined);
        };
        if value.is_null() {
            return Ok(TriState::Undefined);
        }
        let ordering = value
            .compare(expected, self.case_ignore)
            .ok_or_else(|| ObjectError::NotComparable {
                name: actual.name().to_string(),
                kind: value.kind(),
            })?;
        Ok(accept(ordering).into())
    }

    fn substring(
        &self,
        entity: &Entity,
        leaf: &Substring,
        test: fn(&str, &str) -> bool,
    ) -> ObjectResult<TriState> {
        let Some(actual) = entity.get(leaf.attribute.name()) else {
            return Ok(TriState::Undefined);
        };
        let Some(Value::String(value)) = actual.single_value()? else {
            return Ok(TriState::Undefined);
        };
        let Some(expected) = leaf.attribute.as_string_value()? else {
            return Ok(TriState::Undefined);
        };
        let matched = if leaf.case_ignore || self.case_ignore {
            test(&value.to_lowercase(), &expected.to_lowercase())
        } else {
            test(value, &expected)
        };
        Ok(matched.into())
    }
}

impl FilterVisitor<Entity> for DefaultVisitor {
    type Output = ObjectResult<TriState>;

    fn and(&self, entity: &Entity, filters: &[Filter]) -> Self::Output {
        let mut result = TriState::True;
        for filter in filters {
            result = result.and(filter.accept_visitor(self, entity)?);
            if result == TriState::False {
                break;
            }
        }
        Ok(result)
    }

    fn or(&self, entity: &Entity, filters: &[Filter]) -> Self::Output {
        let mut result = TriState::False;
        for filter in filters {
            result = result.or(filter.accept_visitor(self, entity)?);
            if result == TriState::True {
                break;
            }
        }
        Ok(result)
    }

    fn not(&self, entity: &Entity, filter: &Filter) -> Self::Output {
        filter.accept_visitor(self, entity).map(TriState::negate)
    }

    fn presence(&self, entity: &Entity, name: &str) -> Self::Output {
        Ok(entity.contains_key(name).into())
    }

    fn equal(&self, entity: &Entity, attribute: &Attribute) -> Self::Output {
        let Some(actual) = entity.get(attribute.name()) else {
            return Ok(TriState::Undefined);
        };
        let (actual, expected) = (actual.values(), attribute.values());
        let matched = actual.len() == expected.len()
            && actual
                .iter()
                .zip(expected)
                .all(|(a, e)| a.equals(e, self.case_ignore));
        Ok(matched.into())
    }

    fn greater_than(&self, entity: &Entity, attribute: &Attribute) -> Self::Output {
        self.compare(entity, attribute, Ordering::is_gt)
    }

    fn greater_than_or_equal(&self, entity: &Entity, attribute: &Attribute) -> Self::Output {
        self.compare(entity, attribute, Ordering::is_ge)
    }

    fn less_than(&self, entity: &Entity, attribute: &Attribute) -> Self::Output {
        self.compare(entity, attribute, Ordering::is_lt)
    }

    fn less_than_or_equal(&self, entity: &Entity, attribute: &Attribute) -> Self::Output {
        self.compare(entity, attribute, Ordering::is_le)
    }

    fn starts_with(&self, entity: &Entity, leaf: &Substring) -> Self::Output {
        self.substring(entity, leaf, |value, expected| value.starts_with(expected))
    }

    fn ends_with(&self, entity: &Entity, leaf: &Substring) -> Self::Output {
        self.substring(entity, leaf, |value, expected| value.ends_with(expected))
    }

    fn contains(&self, entity: &Entity, leaf: &Substring) -> Self::Output {
        self.substring(entity, leaf, |value, expected| value.contains(expected))
    }

    fn contains_all(&self, entity: &Entity, attribute: &Attribute) -> Self::Output {
        let expected = attribute.values();
        if expected.is_empty() {
            return Ok(TriState::True);
        }
        let actual = entity.get(attribute.name()).map(Attribute::values).unwrap_or_default();
        if actual.is_empty() {
            return Ok(TriState::False);
        }
        let matched = expected
            .iter()
            .all(|e| actual.iter().any(|a| a.equals(e, self.case_ignore)));
        Ok(matched.into())
    }
}
