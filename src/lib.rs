//! Typed entity/attribute model with a filter algebra.
//!
//! - [`object`]: [`Entity`], [`Attribute`] and the [`Value`] kinds they hold
//! - [`filter`]: the [`Filter`] tree, the three-valued [`DefaultVisitor`]
//!   evaluator and the [`FilterTranslator`] push-down planner
//! - [`config`]: TOML configuration for evaluation, dates and logging
//! - [`observability`]: subscriber setup for the crate's `tracing` events
//!
//! ```
//! use entity_filter::{Attribute, Entity, Filter};
//!
//! let mut account = Entity::build("account")?;
//! account.add(Attribute::build_with("status", ["Revoke"])?);
//!
//! let filter = Filter::and(
//!     Filter::presence("status"),
//!     Filter::equal(Attribute::build_with("STATUS", ["Revoke"])?),
//! );
//! assert!(filter.accept(&account)?);
//! # Ok::<(), entity_filter::ObjectError>(())
//! ```

pub mod config;
pub mod filter;
pub mod object;
pub mod observability;

#[cfg(test)]
mod tests;

pub use config::{ConfigError, FilterConfig};
pub use filter::{
    DefaultVisitor, Filter, FilterTranslator, FilterVisitor, TranslateError, TriState,
};
pub use object::{Attribute, Entity, ObjectError, ObjectResult, Value};
