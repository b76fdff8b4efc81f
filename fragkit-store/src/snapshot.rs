//! Plain-value snapshots of fragments.

use crate::{Record, Store, StoreError, StoreResult};
use fragkit_cache::Ownership;
use fragkit_types::{Attributes, EntityKind, StableIdentifier};
use serde_json::Value;

impl Store {
    /// The plain value of `fragment`.
    ///
    /// An owned fragment's value is its owner's raw attribute. A fragment
    /// without an owner is assembled from its own declared fields,
    /// defaults included.
    pub fn current_value(&self, fragment: &Record) -> StoreResult<Value> {
        match fragment.kind() {
            EntityKind::Fragment => {}
            EntityKind::Record => {
                return Err(StoreError::WrongEntityKind {
                    entity_type: fragment.entity_type(),
                    expected: EntityKind::Fragment,
                });
            }
        }
        let identity = fragment.identity();
        match self.ownership.owner_of(&identity) {
            Some(ownership) => Ok(self
                .cache
                .get_attr(&ownership.owner, &ownership.field)
                .unwrap_or(Value::Null)),
            None => Ok(Value::Object(self.assemble(&identity, true))),
        }
    }

    /// Stored fields of `identity` read from its own cache entry.
    pub(crate) fn assemble(&self, identity: &StableIdentifier, with_defaults: bool) -> Attributes {
        self.schema
            .fields_of(identity.entity_type())
            .iter()
            .filter(|f| f.kind.is_stored())
            .filter_map(|f| {
                let value = if with_defaults {
                    self.cache.get_attr(identity, &f.name)
                } else {
                    self.cache.peek_attr(identity, &f.name)
                };
                value.map(|v| (f.name.clone(), v))
            })
            .collect()
    }

    /// Re-writes the snapshot of every owner above `identity` after a change
    /// to its attributes.
    pub(crate) fn propagate_upward(&mut self, identity: &StableIdentifier) {
        let mut current = identity.clone();
        while let Some(Ownership { owner, field }) = self.ownership.owner_of(&current).cloned() {
            let raw = self.cache.peek_attr(&owner, &field);
            let mut snapshot = match &raw {
                Some(Value::Object(map)) => map.clone(),
                _ => Attributes::new(),
            };
            snapshot.extend(self.assemble(&current, false));
            let snapshot = Value::Object(snapshot);
            if raw.as_ref() == Some(&snapshot) {
                break;
            }
            self.cache.set_attr(&owner, &field, snapshot);
            current = owner;
        }
    }
}
