//! Identifier types used throughout the fragkit core.
//!
//! Every entity, top-level record or nested fragment, is addressed by a
//! `{type, id, lid}` triple. The `lid` (local id) is always present and is
//! the primary key of every cache; `id` is the server-assigned id and may be
//! unknown for client-created records.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use uuid::Uuid;

/// Local identifier, unique within one store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lid(String);

impl Lid {
    /// Wraps an existing local id string.
    pub fn new(lid: impl Into<String>) -> Self {
        Self(lid.into())
    }

    /// Generates a fresh local id using a time-ordered UUID.
    #[must_use]
    pub fn generate(prefix: &str) -> Self {
        Self(format!("{prefix}{}", Uuid::now_v7()))
    }

    /// Derives the local id of the fragment stored under `field` of `owner`.
    ///
    /// The result is `"{owner}:{field}"`, so nested fragments yield
    /// `"{owner}:{field}:{subfield}"` and so on.
    #[must_use]
    pub fn derived(owner: &Lid, field: &str) -> Self {
        Self(format!("{}:{field}", owner.0))
    }

    /// Returns the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Lid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Lid {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A plain, structurally comparable description of an identity.
///
/// Descriptors are what callers hand to the identifier cache; the cache
/// turns them into [`StableIdentifier`]s.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityDescriptor {
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lid: Option<Lid>,
}

impl IdentityDescriptor {
    /// Descriptor for a record known by its server id.
    pub fn with_id(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: Some(id.into()),
            lid: None,
        }
    }

    /// Descriptor for an entity known only by its local id.
    pub fn with_lid(entity_type: impl Into<String>, lid: Lid) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: None,
            lid: Some(lid),
        }
    }

    /// Descriptor for a brand-new entity with neither id nor lid.
    pub fn new_entity(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: None,
            lid: None,
        }
    }
}

#[derive(Debug)]
struct IdentifierInner {
    entity_type: String,
    lid: Lid,
    id: RefCell<Option<String>>,
}

/// A reference-identical identifier handed out by the identifier cache.
///
/// Cloning is cheap and keeps pointing at the same allocation; use
/// [`StableIdentifier::same`] to test for reference identity. Equality and
/// hashing go through the `lid`, which is unique per store.
#[derive(Clone)]
pub struct StableIdentifier(Rc<IdentifierInner>);

impl StableIdentifier {
    /// Builds a new identifier. Only the identifier cache should call this.
    pub fn new(entity_type: impl Into<String>, id: Option<String>, lid: Lid) -> Self {
        Self(Rc::new(IdentifierInner {
            entity_type: entity_type.into(),
            lid,
            id: RefCell::new(id),
        }))
    }

    /// The entity type name.
    pub fn entity_type(&self) -> &str {
        &self.0.entity_type
    }

    /// The local id.
    pub fn lid(&self) -> &Lid {
        &self.0.lid
    }

    /// The server id, if one has been assigned.
    pub fn id(&self) -> Option<String> {
        self.0.id.borrow().clone()
    }

    /// Assigns the server id in place, keeping every clone in sync.
    pub fn assign_id(&self, id: impl Into<String>) {
        *self.0.id.borrow_mut() = Some(id.into());
    }

    /// Returns true if both handles point at the same allocation.
    pub fn same(&self, other: &StableIdentifier) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// A structural descriptor of this identifier.
    pub fn descriptor(&self) -> IdentityDescriptor {
        IdentityDescriptor {
            entity_type: self.0.entity_type.clone(),
            id: self.id(),
            lid: Some(self.0.lid.clone()),
        }
    }
}

impl PartialEq for StableIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.0.lid == other.0.lid
    }
}

impl Eq for StableIdentifier {}

impl Hash for StableIdentifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.lid.hash(state);
    }
}

impl fmt::Debug for StableIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StableIdentifier")
            .field("type", &self.0.entity_type)
            .field("id", &*self.0.id.borrow())
            .field("lid", &self.0.lid)
            .finish()
    }
}

impl fmt::Display for StableIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0.id.borrow() {
            Some(id) => write!(f, "{}:{} ({})", self.0.entity_type, id, self.0.lid),
            None => write!(f, "{}:<new> ({})", self.0.entity_type, self.0.lid),
        }
    }
}
