//! Accessors for fragment fields and owner back-references.

use crate::store::{is_absent, lookup_field};
use crate::{Record, Store, StoreError, StoreResult};
use fragkit_cache::Materialization;
use fragkit_model::{FieldKind, FieldSchema, SchemaRegistry, TypeKey};
use fragkit_types::{EntityKind, Lid, StableIdentifier};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// What can be assigned to a fragment field.
#[derive(Debug, Clone)]
pub enum FragmentValue {
    /// `null`, or a plain object snapshot.
    Value(Value),
    /// A live fragment instance.
    Entity(Record),
}

impl From<Value> for FragmentValue {
    fn from(value: Value) -> Self {
        FragmentValue::Value(value)
    }
}

impl From<Record> for FragmentValue {
    fn from(record: Record) -> Self {
        FragmentValue::Entity(record)
    }
}

impl From<&Record> for FragmentValue {
    fn from(record: &Record) -> Self {
        FragmentValue::Entity(record.clone())
    }
}

impl Store {
    /// Reads fragment field `key` of `owner`.
    ///
    /// Returns `None` for a null or missing value and for a torn-down owner.
    /// Repeated reads return the same instance until the slot changes.
    pub fn fragment(&mut self, owner: &Record, key: &str) -> StoreResult<Option<Record>> {
        if !owner.is_live() {
            return Ok(None);
        }
        let owner_identity = owner.identity();
        fragment_field(&self.schema, owner_identity.entity_type(), key)?;
        if is_absent(self.cache.get_attr(&owner_identity, key).as_ref()) {
            return Ok(None);
        }
        self.materialize(&owner_identity, key).map(Some)
    }

    /// Assigns fragment field `key` of `owner`.
    ///
    /// `null` empties the slot, an object is written as the new snapshot, and
    /// an instance is moved into the slot. Everything is validated before the
    /// first write.
    pub fn set_fragment(
        &mut self,
        owner: &Record,
        key: &str,
        value: impl Into<FragmentValue>,
    ) -> StoreResult<Option<Record>> {
        let value = value.into();
        if !owner.is_live() {
            return Err(StoreError::RecordDestroyed(owner.to_string()));
        }
        let owner_identity = owner.identity();
        let schema = Arc::clone(&self.schema);
        let field = fragment_field(&schema, owner_identity.entity_type(), key)?;
        self.check_assignable(&owner_identity, field, &value)?;
        let owner_identity = self.writable_identity(owner, key)?;

        let snapshot = match &value {
            FragmentValue::Value(value) => value.clone(),
            FragmentValue::Entity(fragment) => {
                tag_polymorphic(field, &fragment.entity_type(), self.current_value(fragment)?)
            }
        };
        let current = self.cache.get_attr(&owner_identity, key);
        let unchanged = match (&current, &snapshot) {
            (current, snapshot) if is_absent(current.as_ref()) => snapshot.is_null(),
            (Some(current), snapshot) => current == snapshot,
            (None, _) => false,
        };
        if !unchanged {
            self.cache.set_attr(&owner_identity, key, snapshot);
            self.propagate_upward(&owner_identity);
        }
        self.clear_errors(&owner_identity, key);

        match value {
            FragmentValue::Value(Value::Null) => {
                self.release_slot(&owner_identity, key);
                Ok(None)
            }
            FragmentValue::Value(_) => self.materialize(&owner_identity, key).map(Some),
            FragmentValue::Entity(fragment) => self.relink(&owner_identity, key, &fragment).map(Some),
        }
    }

    /// The current owner of `fragment`, read through back-reference `key`.
    pub fn fragment_owner(&self, fragment: &Record, key: &str) -> StoreResult<Option<Record>> {
        let entity_type = fragment.entity_type();
        let field = lookup_field(&self.schema, &entity_type, key)?;
        if field.kind != FieldKind::Owner {
            return Err(StoreError::Validation(format!(
                "'{key}' on {entity_type} is not an owner field"
            )));
        }
        if !fragment.is_live() {
            return Ok(None);
        }
        Ok(self
            .ownership
            .owner_of(&fragment.identity())
            .and_then(|ownership| self.instances.get(ownership.owner.lid())))
    }

    /// Owner back-references cannot be assigned.
    pub fn set_fragment_owner(
        &mut self,
        fragment: &Record,
        key: &str,
        _owner: Option<&Record>,
    ) -> StoreResult<()> {
        Err(StoreError::ReadOnlyOwner {
            entity_type: fragment.entity_type(),
            field: key.to_string(),
        })
    }

    /// Binds a live instance to the fragment under `owner.key`.
    ///
    /// A read that lands while the same lid is still being created gets the
    /// instance without attaching it; the outer call finishes the binding.
    fn materialize(&mut self, owner: &StableIdentifier, key: &str) -> StoreResult<Record> {
        let identity = self
            .cache
            .fragment_identity(owner, key)
            .ok_or_else(|| StoreError::NotAFragmentField {
                entity_type: owner.entity_type().to_string(),
                field: key.to_string(),
            })?;
        let lid = identity.lid().clone();
        if let Some(stale) = self
            .instances
            .get(&lid)
            .filter(|r| !r.identity().same(&identity))
        {
            debug!("Replacing stale fragment instance {}", stale);
            self.teardown(&stale);
        }

        let previous = self.ownership.begin_materialization(&lid);
        let (record, stale) = self.instances.get_or_create(&identity, EntityKind::Fragment);
        if let Some(stale) = stale {
            self.teardown(&stale);
        }
        if previous == Materialization::BeingCreated {
            return Ok(record);
        }
        if let Err(err) = self.ownership.attach(&identity, owner, key) {
            self.ownership.abandon_materialization(&lid);
            return Err(err.into());
        }
        if previous == Materialization::Absent {
            debug!("Materialized fragment {} under {}.{}", identity, owner, key);
        }
        self.ownership.finish_materialization(&lid);
        Ok(record)
    }

    /// Moves `fragment` into the slot `owner.key`, re-keying its instance
    /// tree to the derived lids.
    fn relink(&mut self, owner: &StableIdentifier, key: &str, fragment: &Record) -> StoreResult<Record> {
        let identity = self
            .cache
            .fragment_identity(owner, key)
            .ok_or_else(|| StoreError::NotAFragmentField {
                entity_type: owner.entity_type().to_string(),
                field: key.to_string(),
            })?;
        let target = identity.lid().clone();
        let old_identity = fragment.identity();

        if !old_identity.same(&identity) {
            let previous_owner = self.ownership.detach(&old_identity);
            if let Some(displaced) = self.instances.get(&target).filter(|r| !r.same(fragment)) {
                self.displace(owner, &displaced);
            }
            self.instances.remove_if_same(old_identity.lid(), fragment);
            fragment.rebind(identity.clone());
            self.instances.insert(fragment.clone());
            self.relink_children(fragment, old_identity.lid())?;
            if previous_owner.is_none() {
                // standalone: its state now lives under the slot
                self.cache.unload_record(&old_identity);
            }
            debug!("Relinked fragment {} to {}", old_identity, identity);
        }

        self.ownership.attach(&identity, owner, key)?;
        self.ownership.finish_materialization(&target);
        Ok(fragment.clone())
    }

    fn relink_children(&mut self, record: &Record, old_lid: &Lid) -> StoreResult<()> {
        let identity = record.identity();
        let schema = Arc::clone(&self.schema);
        for field in schema.fields_of(identity.entity_type()).iter().filter(|f| f.is_fragment()) {
            let child_lid = Lid::derived(old_lid, &field.name);
            let Some(child) = self.instances.get(&child_lid) else {
                continue;
            };
            if is_absent(self.cache.get_attr(&identity, &field.name).as_ref()) {
                self.teardown(&child);
                continue;
            }
            let Some(child_identity) = self.cache.fragment_identity(&identity, &field.name) else {
                self.teardown(&child);
                continue;
            };
            self.instances.remove_if_same(&child_lid, &child);
            self.ownership.detach_lid(&child_lid);
            child.rebind(child_identity.clone());
            if let Some(replaced) = self.instances.insert(child.clone()) {
                self.teardown(&replaced);
            }
            self.ownership.attach(&child_identity, &identity, &field.name)?;
            self.ownership.finish_materialization(child_identity.lid());
            self.relink_children(&child, &child_lid)?;
        }
        Ok(())
    }

    /// Validation, kind and ownership checks for an assignment.
    fn check_assignable(
        &self,
        owner: &StableIdentifier,
        field: &FieldSchema,
        value: &FragmentValue,
    ) -> StoreResult<()> {
        let fragment = match value {
            FragmentValue::Value(Value::Null | Value::Object(_)) => return Ok(()),
            FragmentValue::Value(other) => {
                return Err(StoreError::Validation(format!(
                    "'{}' on {} takes a fragment, an object or null; got {other}",
                    field.name,
                    owner.entity_type()
                )));
            }
            FragmentValue::Entity(fragment) => fragment,
        };
        match fragment.kind() {
            EntityKind::Record => {
                return Err(StoreError::Validation(format!(
                    "record {fragment} cannot be assigned to fragment field '{}'",
                    field.name
                )));
            }
            EntityKind::Fragment => {}
        }
        if !fragment.is_live() {
            return Err(StoreError::RecordDestroyed(fragment.to_string()));
        }
        let entity_type = fragment.entity_type();
        if !field.options.polymorphic && field.fragment_type() != Some(entity_type.as_str()) {
            return Err(StoreError::Validation(format!(
                "'{}' on {} takes {}, got {entity_type}",
                field.name,
                owner.entity_type(),
                field.fragment_type().unwrap_or_default()
            )));
        }
        if let Some(current) = self.ownership.owner_of(&fragment.identity()) {
            if current.owner != *owner {
                return Err(StoreError::Ownership {
                    fragment: fragment.to_string(),
                    owner: current.owner.to_string(),
                    field: current.field.clone(),
                });
            }
        }
        Ok(())
    }
}

fn fragment_field<'s>(
    schema: &'s SchemaRegistry,
    entity_type: &str,
    key: &str,
) -> StoreResult<&'s FieldSchema> {
    let field = lookup_field(schema, entity_type, key)?;
    match field.kind {
        FieldKind::Fragment => Ok(field),
        FieldKind::Owner => Err(StoreError::ReadOnlyOwner {
            entity_type: entity_type.to_string(),
            field: key.to_string(),
        }),
        FieldKind::Attribute => Err(StoreError::NotAFragmentField {
            entity_type: entity_type.to_string(),
            field: key.to_string(),
        }),
    }
}

/// Adds the type tag to an instance's snapshot for polymorphic slots.
fn tag_polymorphic(field: &FieldSchema, entity_type: &str, mut snapshot: Value) -> Value {
    if !field.options.polymorphic {
        return snapshot;
    }
    let key = match &field.options.type_key {
        Some(TypeKey::Field(key)) => key.as_str(),
        Some(TypeKey::Dynamic(_)) => return snapshot,
        None => "type",
    };
    if let Value::Object(map) = &mut snapshot {
        map.entry(key.to_string())
            .or_insert_with(|| Value::String(entity_type.to_string()));
    }
    snapshot
}
