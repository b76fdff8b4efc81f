//! Error types for the store.

use fragkit_cache::CacheError;
use fragkit_model::ModelError;
use fragkit_types::EntityKind;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by store operations.
///
/// All of them are contract violations detected before any cache write.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A fragment field was given something other than null, an object or
    /// a fragment instance.
    #[error("validation error: {0}")]
    Validation(String),

    /// The fragment already belongs to another owner.
    #[error("fragment {fragment} is already owned by {owner} under '{field}'")]
    Ownership {
        fragment: String,
        owner: String,
        field: String,
    },

    /// Write attempted on an entity marked deleted.
    #[error("attempted to set '{field}' on deleted entity {entity}")]
    MutationOnDeletedEntity { entity: String, field: String },

    /// Schema declaration error.
    #[error("schema error: {0}")]
    Model(#[from] ModelError),

    /// Malformed resource document.
    #[error("document error: {0}")]
    Types(#[from] fragkit_types::Error),

    /// Malformed configuration.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("unknown field '{field}' on {entity_type}")]
    UnknownField { entity_type: String, field: String },

    #[error("'{field}' on {entity_type} is not a fragment field")]
    NotAFragmentField { entity_type: String, field: String },

    /// Write to an owner back-reference.
    #[error("'{field}' on {entity_type} is a read-only owner reference")]
    ReadOnlyOwner { entity_type: String, field: String },

    /// The instance has been torn down.
    #[error("record {0} has been destroyed")]
    RecordDestroyed(String),

    #[error("{entity_type} is not a {expected:?} type")]
    WrongEntityKind {
        entity_type: String,
        expected: EntityKind,
    },
}

impl From<CacheError> for StoreError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::OwnershipConflict {
                fragment,
                owner,
                field,
            } => StoreError::Ownership {
                fragment: fragment.to_string(),
                owner,
                field,
            },
        }
    }
}
