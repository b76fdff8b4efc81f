//! Error types for schema declaration.

use thiserror::Error;

/// Result type for schema operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while declaring or registering schemas.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A literal object/array default would be shared by every record.
    #[error(
        "non-primitive default values are not supported because they are shared between all instances; \
         provide a generator instead ({0})"
    )]
    UnsupportedDefaultValue(String),

    /// The entity type was registered twice.
    #[error("entity type already registered: {0}")]
    DuplicateEntityType(String),

    /// Two fields with the same name on one entity type.
    #[error("duplicate field {field} on {entity_type}")]
    DuplicateField { entity_type: String, field: String },

    /// A fragment field without a fragment type.
    #[error("fragment field {entity_type}.{field} does not name a fragment type")]
    MissingFragmentType { entity_type: String, field: String },

    /// A fragment field points at a type nobody registered.
    #[error("fragment field {entity_type}.{field} references unknown type {fragment_type}")]
    UnknownFragmentType {
        entity_type: String,
        field: String,
        fragment_type: String,
    },

    /// A fragment field points at a top-level record type.
    #[error("fragment field {entity_type}.{field} references {fragment_type}, which is not a fragment type")]
    NotAFragmentType {
        entity_type: String,
        field: String,
        fragment_type: String,
    },
}
