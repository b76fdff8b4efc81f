//! Core type definitions for fragkit.
//!
//! This crate defines the fundamental, schema-agnostic types used throughout
//! the cache and store layers:
//! - Local identifiers ([`Lid`]) and identity descriptors
//! - Stable, reference-identical identifiers ([`StableIdentifier`])
//! - The [`EntityKind`] discriminant separating top-level records from
//!   nested fragments
//! - Resource documents exchanged with the cache (push, commit payloads)
//!
//! Nothing in here knows about field schemas or cascading; those live in
//! `fragkit-model` and `fragkit-cache`.

mod ids;
mod kind;
mod resource;

pub use ids::{IdentityDescriptor, Lid, StableIdentifier};
pub use kind::EntityKind;
pub use resource::{Attributes, FieldError, ResourceData, ResourceDocument};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid resource document: {0}")]
    InvalidDocument(String),
}
