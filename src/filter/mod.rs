//! Filter algebra over [`Entity`] objects.
//!
//! A [`Filter`] is an immutable predicate tree: the combinators `and`, `or`
//! and `not` over leaves that test presence, equality, ordering, substrings
//! and set containment of a single attribute.
//!
//! Filters are consumed two ways:
//!
//! - evaluated in memory against an [`Entity`] with a [`DefaultVisitor`]
//!   (or any other [`FilterVisitor`])
//! - pushed down to a backend through a [`FilterTranslator`], which rewrites
//!   the tree into the native query fragments the backend can execute
//!
//! ## Display
//!
//! Filters render in SCIM-like infix notation:
//!
//! ```text
//! userName eq "john"
//! (active eq true and emails pr)
//! not (title sw "Dr")
//! members ca ["alice", "bob"]
//! ```

mod translator;
mod visitor;

use std::{fmt, str::FromStr};

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

pub use translator::{FilterTranslator, TranslateError};
pub use visitor::{DefaultVisitor, FilterVisitor, TriState};

use crate::{
    config::FilterConfig,
    object::{Attribute, Entity, ObjectResult, Value, fold_eq},
};

/// A filter expression.
///
/// Comparison and substring leaves carry an [`Attribute`] whose single value
/// is the assertion value; `ContainsAll` may carry any number of values.
/// `And`/`Or` are expected to hold at least two children; use
/// [`Filter::and_all`] / [`Filter::or_all`] to collapse smaller collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    /// Transparent grouping layer around a sub-expression, such as the one a
    /// parser keeps for an explicitly parenthesised term. Evaluates as the
    /// inner filter.
    Chained(Box<Filter>),
    Presence(String),
    Equals(Attribute),
    GreaterThan(Attribute),
    GreaterThanOrEqual(Attribute),
    LessThan(Attribute),
    LessThanOrEqual(Attribute),
    StartsWith(Substring),
    EndsWith(Substring),
    Contains(Substring),
    ContainsAll(Attribute),
}

/// Substring test leaf (`sw`, `ew`, `co`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substring {
    pub attribute: Attribute,
    pub case_ignore: bool,
}

/// Discriminator of a [`Filter`] variant with its short tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    And,
    Or,
    Not,
    Complex,
    Equal,
    Present,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    StartsWith,
    EndsWith,
    Contains,
    ContainsAll,
}

impl FilterKind {
    const ALL: [FilterKind; 14] = [
        FilterKind::And,
        FilterKind::Or,
        FilterKind::Not,
        FilterKind::Complex,
        FilterKind::Equal,
        FilterKind::Present,
        FilterKind::GreaterThan,
        FilterKind::GreaterOrEqual,
        FilterKind::LessThan,
        FilterKind::LessOrEqual,
        FilterKind::StartsWith,
        FilterKind::EndsWith,
        FilterKind::Contains,
        FilterKind::ContainsAll,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            FilterKind::And => "and",
            FilterKind::Or => "or",
            FilterKind::Not => "not",
            FilterKind::Complex => "complex",
            FilterKind::Equal => "eq",
            FilterKind::Present => "pr",
            FilterKind::GreaterThan => "gt",
            FilterKind::GreaterOrEqual => "ge",
            FilterKind::LessThan => "lt",
            FilterKind::LessOrEqual => "le",
            FilterKind::StartsWith => "sw",
            FilterKind::EndsWith => "ew",
            FilterKind::Contains => "co",
            FilterKind::ContainsAll => "ca",
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Tag that does not name any [`FilterKind`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown filter tag '{0}'")]
pub struct UnknownTag(pub String);

impl FromStr for FilterKind {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilterKind::ALL
            .into_iter()
            .find(|kind| kind.tag() == s)
            .ok_or_else(|| UnknownTag(s.to_string()))
    }
}

/// Date handling hints passed to an [`ExpressionParser`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateOptions {
    /// Attributes whose literal values are dates.
    pub attributes: Vec<String>,
    /// `chrono` format string the literals are written in.
    pub format: Option<String>,
}

impl DateOptions {
    pub const DEFAULT_FORMAT: &'static str = "%Y-%m-%d";

    /// Whether literals of `name` are dates. Names compare case-insensitively.
    pub fn is_date(&self, name: &str) -> bool {
        self.attributes.iter().any(|attribute| fold_eq(attribute, name))
    }

    /// Parse a date literal into epoch milliseconds (UTC), the form
    /// [`Attribute::date_value`] reads back. Date-only formats resolve to
    /// midnight.
    pub fn parse(&self, literal: &str) -> Option<i64> {
        let format = self.format.as_deref().unwrap_or(Self::DEFAULT_FORMAT);
        let timestamp = match NaiveDateTime::parse_from_str(literal, format) {
            Ok(timestamp) => timestamp,
            Err(_) => NaiveDate::parse_from_str(literal, format)
                .ok()?
                .and_hms_opt(0, 0, 0)?,
        };
        Some(timestamp.and_utc().timestamp_millis())
    }
}

/// Turns a textual filter expression into a [`Filter`].
///
/// The grammar is owned by the implementation; this crate only defines the
/// seam that [`Filter::build`] delegates to.
pub trait ExpressionParser {
    type Error: std::error::Error;

    fn parse(&self, expression: &str, dates: &DateOptions) -> Result<Filter, Self::Error>;
}

impl Filter {
    pub fn and(lhs: Filter, rhs: Filter) -> Filter {
        Filter::And(vec![lhs, rhs])
    }

    /// Conjunction of `filters`: `None` ("match everything") for an empty
    /// collection, the filter itself for a single one.
    pub fn and_all<I>(filters: I) -> Option<Filter>
    where
        I: IntoIterator<Item = Filter>,
    {
        collapse(filters.into_iter().collect(), Filter::And)
    }

    pub fn or(lhs: Filter, rhs: Filter) -> Filter {
        Filter::Or(vec![lhs, rhs])
    }

    /// Disjunction of `filters`, collapsed the same way as [`and_all`](Self::and_all).
    pub fn or_all<I>(filters: I) -> Option<Filter>
    where
        I: IntoIterator<Item = Filter>,
    {
        collapse(filters.into_iter().collect(), Filter::Or)
    }

    pub fn not(filter: Filter) -> Filter {
        Filter::Not(Box::new(filter))
    }

    pub fn chained(filter: Filter) -> Filter {
        Filter::Chained(Box::new(filter))
    }

    pub fn presence(name: impl Into<String>) -> Filter {
        Filter::Presence(name.into())
    }

    pub fn equal(attribute: Attribute) -> Filter {
        Filter::Equals(attribute)
    }

    pub fn greater_than(attribute: Attribute) -> Filter {
        Filter::GreaterThan(attribute)
    }

    pub fn greater_than_or_equal(attribute: Attribute) -> Filter {
        Filter::GreaterThanOrEqual(attribute)
    }

    pub fn less_than(attribute: Attribute) -> Filter {
        Filter::LessThan(attribute)
    }

    pub fn less_than_or_equal(attribute: Attribute) -> Filter {
        Filter::LessThanOrEqual(attribute)
    }

    pub fn starts_with(attribute: Attribute, case_ignore: bool) -> Filter {
        Filter::StartsWith(Substring {
            attribute,
            case_ignore,
        })
    }

    pub fn ends_with(attribute: Attribute, case_ignore: bool) -> Filter {
        Filter::EndsWith(Substring {
            attribute,
            case_ignore,
        })
    }

    pub fn contains(attribute: Attribute, case_ignore: bool) -> Filter {
        Filter::Contains(Substring {
            attribute,
            case_ignore,
        })
    }

    pub fn contains_all(attribute: Attribute) -> Filter {
        Filter::ContainsAll(attribute)
    }

    /// Parse `expression` with `parser`.
    pub fn build<P: ExpressionParser>(expression: &str, parser: &P) -> Result<Filter, P::Error> {
        parser.parse(expression, &DateOptions::default())
    }

    /// Parse `expression` with `parser`, treating the literals of
    /// `date_attributes` as dates written in `date_format`.
    pub fn build_with_dates<P: ExpressionParser>(
        expression: &str,
        dates: &DateOptions,
        parser: &P,
    ) -> Result<Filter, P::Error> {
        parser.parse(expression, dates)
    }

    /// Parse `expression` with the date options from `config`.
    pub fn build_configured<P: ExpressionParser>(
        expression: &str,
        config: &FilterConfig,
        parser: &P,
    ) -> Result<Filter, P::Error> {
        parser.parse(expression, &config.dates.options())
    }

    pub fn kind(&self) -> FilterKind {
        match self {
            Filter::And(_) => FilterKind::And,
            Filter::Or(_) => FilterKind::Or,
            Filter::Not(_) => FilterKind::Not,
            Filter::Chained(_) => FilterKind::Complex,
            Filter::Presence(_) => FilterKind::Present,
            Filter::Equals(_) => FilterKind::Equal,
            Filter::GreaterThan(_) => FilterKind::GreaterThan,
            Filter::GreaterThanOrEqual(_) => FilterKind::GreaterOrEqual,
            Filter::LessThan(_) => FilterKind::LessThan,
            Filter::LessThanOrEqual(_) => FilterKind::LessOrEqual,
            Filter::StartsWith(_) => FilterKind::StartsWith,
            Filter::EndsWith(_) => FilterKind::EndsWith,
            Filter::Contains(_) => FilterKind::Contains,
            Filter::ContainsAll(_) => FilterKind::ContainsAll,
        }
    }

    /// Short discriminator, e.g. `"eq"` or `"and"`.
    pub fn tag(&self) -> &'static str {
        self.kind().tag()
    }

    /// The assertion attribute of a comparison, substring or containment leaf.
    pub fn assertion(&self) -> Option<&Attribute> {
        match self {
            Filter::Equals(attribute)
            | Filter::GreaterThan(attribute)
            | Filter::GreaterThanOrEqual(attribute)
            | Filter::LessThan(attribute)
            | Filter::LessThanOrEqual(attribute)
            | Filter::ContainsAll(attribute) => Some(attribute),
            Filter::StartsWith(leaf) | Filter::EndsWith(leaf) | Filter::Contains(leaf) => {
                Some(&leaf.attribute)
            }
            Filter::And(_)
            | Filter::Or(_)
            | Filter::Not(_)
            | Filter::Chained(_)
            | Filter::Presence(_) => None,
        }
    }

    /// Evaluate against `entity` with case-sensitive comparison.
    /// `Undefined` counts as no match.
    pub fn accept(&self, entity: &Entity) -> ObjectResult<bool> {
        self.evaluate(entity, &DefaultVisitor::CASE_SENSITIVE)
            .map(bool::from)
    }

    /// Evaluate against `entity` with `visitor`, keeping the three-valued result.
    pub fn evaluate(&self, entity: &Entity, visitor: &DefaultVisitor) -> ObjectResult<TriState> {
        self.accept_visitor(visitor, entity)
    }

    /// Dispatch to the `visitor` method matching this variant.
    pub fn accept_visitor<P, V>(&self, visitor: &V, param: &P) -> V::Output
    where
        P: ?Sized,
        V: FilterVisitor<P> + ?Sized,
    {
        match self {
            Filter::And(filters) => visitor.and(param, filters),
            Filter::Or(filters) => visitor.or(param, filters),
            Filter::Not(filter) => visitor.not(param, filter),
            Filter::Chained(filter) => filter.accept_visitor(visitor, param),
            Filter::Presence(name) => visitor.presence(param, name),
            Filter::Equals(attribute) => visitor.equal(param, attribute),
            Filter::GreaterThan(attribute) => visitor.greater_than(param, attribute),
            Filter::GreaterThanOrEqual(attribute) => {
                visitor.greater_than_or_equal(param, attribute)
            }
            Filter::LessThan(attribute) => visitor.less_than(param, attribute),
            Filter::LessThanOrEqual(attribute) => visitor.less_than_or_equal(param, attribute),
            Filter::StartsWith(leaf) => visitor.starts_with(param, leaf),
            Filter::EndsWith(leaf) => visitor.ends_with(param, leaf),
            Filter::Contains(leaf) => visitor.contains(param, leaf),
            Filter::ContainsAll(attribute) => visitor.contains_all(param, attribute),
        }
    }
}

fn collapse(mut filters: Vec<Filter>, combine: fn(Vec<Filter>) -> Filter) -> Option<Filter> {
    match filters.len() {
        0 => None,
        1 => filters.pop(),
        _ => Some(combine(filters)),
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::And(filters) => write_joined(f, filters, "and"),
            Filter::Or(filters) => write_joined(f, filters, "or"),
            Filter::Not(inner) => write!(f, "not ({})", inner),
            Filter::Chained(inner) => write!(f, "({})", inner),
            Filter::Presence(name) => write!(f, "{} pr", name),
            Filter::ContainsAll(attribute) => {
                write!(f, "{} {} [", attribute.name(), self.tag())?;
                for (idx, value) in attribute.values().iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write_literal(f, value)?;
                }
                f.write_str("]")
            }
            other => match other.assertion() {
                Some(attribute) => {
                    write!(f, "{} {} ", attribute.name(), other.tag())?;
                    match attribute.values() {
                        [single] => write_literal(f, single),
                        _ => f.write_str("null"),
                    }
                }
                None => f.write_str(other.tag()),
            },
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, filters: &[Filter], op: &str) -> fmt::Result {
    f.write_str("(")?;
    for (idx, filter) in filters.iter().enumerate() {
        if idx > 0 {
            write!(f, " {} ", op)?;
        }
        write!(f, "{}", filter)?;
    }
    f.write_str(")")
}

fn write_literal(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::String(s) => write!(f, "\"{}\"", s.replace('"', "\\\"")),
        Value::Character(c) => write!(f, "\"{}\"", c),
        other => write!(f, "{}", other),
    }
}
