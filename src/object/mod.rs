//! Entity/attribute data model.
//!
//! - [`Value`]: the closed set of value kinds an attribute may hold
//! - [`Attribute`]: a named, ordered list of validated values
//! - [`AttributeMap`]: case-insensitive name→attribute mapping
//! - [`Entity`]: a type-tagged attribute bag representing one resource

mod attribute;
mod entity;
mod error;
mod map;
mod value;

pub use attribute::Attribute;
pub use entity::Entity;
pub use error::{ObjectError, ObjectResult};
pub use map::{AttributeMap, Iter};
pub use value::{Value, ValueKind};
pub(crate) use value::fold_eq;
