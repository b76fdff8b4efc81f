use crate::DEFAULT_LID_PREFIX;
use fragkit_types::{IdentityDescriptor, Lid, StableIdentifier};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Get-or-create table of [`StableIdentifier`]s.
///
/// Structurally equal descriptors always resolve to the same identifier
/// allocation until it is forgotten.
#[derive(Debug)]
pub struct IdentifierCache {
    lid_prefix: String,
    by_lid: HashMap<Lid, StableIdentifier>,
    /// (type, id) → lid
    by_id: HashMap<(String, String), Lid>,
}

impl Default for IdentifierCache {
    fn default() -> Self {
        Self::new(DEFAULT_LID_PREFIX)
    }
}

impl IdentifierCache {
    pub fn new(lid_prefix: impl Into<String>) -> Self {
        Self {
            lid_prefix: lid_prefix.into(),
            by_lid: HashMap::new(),
            by_id: HashMap::new(),
        }
    }

    /// Returns the identifier for `descriptor`, creating it if needed.
    ///
    /// Lookup is by `lid` when the descriptor has one, otherwise by
    /// `(type, id)`. A lid registered under another type is replaced; callers
    /// that care about the old identifier should [`peek`](Self::peek) first.
    pub fn get_or_create(&mut self, descriptor: &IdentityDescriptor) -> StableIdentifier {
        if let Some(existing) = self.lookup(descriptor) {
            if existing.entity_type() == descriptor.entity_type {
                if let Some(id) = &descriptor.id {
                    if existing.id().is_none() {
                        self.index_id(&existing, id);
                    }
                }
                return existing;
            }
            debug!(
                lid = %existing.lid(),
                from = existing.entity_type(),
                to = %descriptor.entity_type,
                "re-typing identifier"
            );
            self.forget(&existing);
        }
        let lid = descriptor
            .lid
            .clone()
            .unwrap_or_else(|| Lid::generate(&self.lid_prefix));
        self.insert(descriptor, lid)
    }

    /// Allocates an identifier for a client-created entity.
    ///
    /// A fresh lid is generated unless the descriptor supplies one.
    pub fn create_for_new_entity(&mut self, descriptor: &IdentityDescriptor) -> StableIdentifier {
        let lid = descriptor
            .lid
            .clone()
            .unwrap_or_else(|| Lid::generate(&self.lid_prefix));
        if let Some(stale) = self.by_lid.get(&lid).cloned() {
            warn!(lid = %lid, "new entity reuses a registered lid; replacing");
            self.forget(&stale);
        }
        self.insert(descriptor, lid)
    }

    /// Applies `descriptor` to an existing identifier.
    ///
    /// A newly learned server id is assigned in place. A different lid means
    /// the identity moves: the old identifier is forgotten and the one for
    /// `descriptor` is returned.
    pub fn update_identity(
        &mut self,
        identity: &StableIdentifier,
        descriptor: &IdentityDescriptor,
    ) -> StableIdentifier {
        if let Some(lid) = &descriptor.lid {
            if lid != identity.lid() {
                self.forget(identity);
                return self.get_or_create(descriptor);
            }
        }
        if let Some(id) = &descriptor.id {
            if identity.id().as_deref() != Some(id.as_str()) {
                if let Some(old) = identity.id() {
                    self.by_id.remove(&(identity.entity_type().to_string(), old));
                }
                self.index_id(identity, id);
            }
        }
        identity.clone()
    }

    pub fn peek(&self, lid: &Lid) -> Option<StableIdentifier> {
        self.by_lid.get(lid).cloned()
    }

    pub fn peek_by_id(&self, entity_type: &str, id: &str) -> Option<StableIdentifier> {
        let lid = self.by_id.get(&(entity_type.to_string(), id.to_string()))?;
        self.by_lid.get(lid).cloned()
    }

    /// Drops `identity`. Returns false if it was not the registered identifier.
    pub fn forget(&mut self, identity: &StableIdentifier) -> bool {
        match self.by_lid.get(identity.lid()) {
            Some(registered) if registered.same(identity) => {}
            _ => return false,
        }
        self.by_lid.remove(identity.lid());
        if let Some(id) = identity.id() {
            let key = (identity.entity_type().to_string(), id);
            if self.by_id.get(&key) == Some(identity.lid()) {
                self.by_id.remove(&key);
            }
        }
        debug!(identity = %identity, "forgot identifier");
        true
    }

    pub fn len(&self) -> usize {
        self.by_lid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_lid.is_empty()
    }

    fn lookup(&self, descriptor: &IdentityDescriptor) -> Option<StableIdentifier> {
        if let Some(lid) = &descriptor.lid {
            return self.by_lid.get(lid).cloned();
        }
        let id = descriptor.id.as_ref()?;
        self.peek_by_id(&descriptor.entity_type, id)
    }

    fn insert(&mut self, descriptor: &IdentityDescriptor, lid: Lid) -> StableIdentifier {
        let identity = StableIdentifier::new(descriptor.entity_type.clone(), None, lid.clone());
        self.by_lid.insert(lid, identity.clone());
        if let Some(id) = &descriptor.id {
            self.index_id(&identity, id);
        }
        debug!(identity = %identity, "created identifier");
        identity
    }

    fn index_id(&mut self, identity: &StableIdentifier, id: &str) {
        identity.assign_id(id);
        let key = (identity.entity_type().to_string(), id.to_string());
        if let Some(previous) = self.by_id.insert(key, identity.lid().clone()) {
            if &previous != identity.lid() {
                warn!(identity = %identity, previous = %previous, "id re-pointed to a different lid");
            }
        }
    }
}
