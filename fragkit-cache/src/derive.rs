//! Identity derivation for fragments.
//!
//! Pure and total: the same `(owner, field, type)` always yields a
//! structurally equal descriptor. Turning it into a reference-stable
//! identifier is the identifier cache's job.

use fragkit_types::{IdentityDescriptor, Lid, StableIdentifier};

/// Descriptor of the fragment stored under `field` of `owner`.
///
/// Both `id` and `lid` are `"{owner.lid}:{field}"`.
pub fn fragment_descriptor(
    owner: &StableIdentifier,
    field: &str,
    fragment_type: &str,
) -> IdentityDescriptor {
    let lid = Lid::derived(owner.lid(), field);
    IdentityDescriptor {
        entity_type: fragment_type.to_string(),
        id: Some(lid.as_str().to_string()),
        lid: Some(lid),
    }
}
