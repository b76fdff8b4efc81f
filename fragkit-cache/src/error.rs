//! Error types for the cache layer.

use fragkit_types::Lid;
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur in cache bookkeeping.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The fragment already belongs to a different owner or field.
    #[error("fragment {fragment} is already owned by {owner} under '{field}'")]
    OwnershipConflict {
        fragment: Lid,
        owner: String,
        field: String,
    },
}
