//! Schema model for fragkit.
//!
//! Defines the metadata the cache consults to find nested fragments:
//! - [`FieldSchema`]: one declared field (plain attribute, fragment, or
//!   read-only owner back-reference)
//! - [`EntitySchema`]: an entity type's kind and its fields in declaration order
//! - [`DefaultValue`] / [`TypeKey`]: field options for defaults and
//!   polymorphic fragments
//! - [`SchemaRegistry`]: the schema service, `fields_of(type)`
//!
//! The registry is read-only to the cache and the store once built.

mod default;
mod error;
mod registry;
mod schema;

pub use default::{DefaultValue, TypeKey};
pub use error::{ModelError, ModelResult};
pub use registry::SchemaRegistry;
pub use schema::{EntitySchema, FieldKind, FieldOptions, FieldSchema};
