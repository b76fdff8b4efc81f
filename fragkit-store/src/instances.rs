use crate::Record;
use fragkit_types::{EntityKind, Lid, StableIdentifier};
use std::collections::HashMap;

/// Live instances keyed by lid.
#[derive(Debug, Default)]
pub struct InstanceCache {
    instances: HashMap<Lid, Record>,
}

impl InstanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, lid: &Lid) -> Option<Record> {
        self.instances.get(lid).cloned()
    }

    /// Returns the instance bound to `identity`, creating it if needed.
    ///
    /// An instance cached at the same lid for a different identifier is
    /// evicted and handed back so the caller can tear it down.
    pub fn get_or_create(
        &mut self,
        identity: &StableIdentifier,
        kind: EntityKind,
    ) -> (Record, Option<Record>) {
        if let Some(existing) = self.instances.get(identity.lid()) {
            if existing.identity().same(identity) && !existing.is_destroyed() {
                return (existing.clone(), None);
            }
        }
        let stale = self.instances.remove(identity.lid());
        let record = Record::new(identity.clone(), kind);
        self.instances.insert(identity.lid().clone(), record.clone());
        (record, stale)
    }

    /// Caches `record` under its current lid, returning what was there.
    pub fn insert(&mut self, record: Record) -> Option<Record> {
        self.instances.insert(record.lid(), record)
    }

    /// Removes the entry at `lid` only if it is `record`.
    pub fn remove_if_same(&mut self, lid: &Lid, record: &Record) -> bool {
        if self.instances.get(lid).is_some_and(|r| r.same(record)) {
            self.instances.remove(lid);
            return true;
        }
        false
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
