//! Attribute caching for fragkit, with fragments kept consistent by cascade.
//!
//! A fragment is a nested entity persisted inside its owner's attribute
//! slot. The cache keeps two views of it in step at all times:
//!
//! - the **denormalized snapshot** under the owner's attribute, and
//! - the **normalized record** under the fragment's own derived identity.
//!
//! # Components
//!
//! - [`derive`]: maps `(owner, field, type)` to the fragment's identity
//!   descriptor (`lid = "{owner.lid}:{field}"`)
//! - [`IdentifierCache`]: get-or-create of reference-stable identifiers
//! - [`AttributeCache`]: per-identity remote/local/in-flight attributes
//! - [`OwnershipRegistry`]: fragment → (owner, field), plus the per-lid
//!   materialization state
//! - [`CascadingCache`]: wraps the base cache and replays every lifecycle
//!   operation onto each fragment field, recursively
//!
//! Operations are synchronous and single-threaded.

mod attributes;
mod cascade;
pub mod derive;
mod error;
mod identifiers;
pub mod operations;
mod ownership;

pub use attributes::{AttributeCache, AttributeChange, ChangedAttributes};
pub use cascade::CascadingCache;
pub use error::{CacheError, CacheResult};
pub use identifiers::IdentifierCache;
pub use operations::CacheOperation;
pub use ownership::{Materialization, Ownership, OwnershipRegistry};

/// Default prefix for generated local ids.
pub const DEFAULT_LID_PREFIX: &str = "@lid:";
