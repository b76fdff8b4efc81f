use crate::{DetachedFragmentPolicy, InstanceCache, LifecycleState, Record, StoreConfig, StoreError, StoreResult};
use fragkit_cache::{CascadingCache, ChangedAttributes, IdentifierCache, OwnershipRegistry};
use fragkit_model::{FieldKind, FieldSchema, SchemaRegistry};
use fragkit_types::{
    Attributes, EntityKind, FieldError, IdentityDescriptor, Lid, ResourceData, ResourceDocument,
    StableIdentifier,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// In-memory record store with fragment support.
///
/// Owns the cascading cache, the live instances and the fragment ownership
/// table. Single-threaded; every operation runs to completion.
pub struct Store {
    pub(crate) config: StoreConfig,
    pub(crate) schema: Arc<SchemaRegistry>,
    pub(crate) cache: CascadingCache,
    pub(crate) instances: InstanceCache,
    pub(crate) ownership: OwnershipRegistry,
    /// Owner lid → instances displaced from its fragment fields and kept
    /// alive under [`DetachedFragmentPolicy::Retain`].
    pub(crate) retained: HashMap<Lid, Vec<Record>>,
}

impl Store {
    /// Creates a store with the default configuration.
    pub fn new(schema: SchemaRegistry) -> StoreResult<Self> {
        Self::with_config(schema, StoreConfig::default())
    }

    /// Creates a store. Fails if a fragment field names an unknown type.
    pub fn with_config(schema: SchemaRegistry, config: StoreConfig) -> StoreResult<Self> {
        schema.validate_references()?;
        let schema = Arc::new(schema);
        let identifiers = IdentifierCache::new(config.lid_prefix.clone());
        Ok(Self {
            cache: CascadingCache::with_identifiers(Arc::clone(&schema), identifiers),
            schema,
            config,
            instances: InstanceCache::new(),
            ownership: OwnershipRegistry::new(),
            retained: HashMap::new(),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    /// Read access to the underlying cache.
    pub fn cache(&self) -> &CascadingCache {
        &self.cache
    }

    /// Number of live instances, records and fragments.
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    // ── Loading and creating ─────────────────────────────────────

    /// Loads remote state for a record and returns its instance.
    ///
    /// Pushing the same identity again merges into the cached state and
    /// returns the same instance.
    pub fn push(&mut self, data: ResourceData) -> StoreResult<Record> {
        self.expect_kind(&data.entity_type, EntityKind::Record)?;
        let identity = self.cache.identifiers_mut().get_or_create(&data.descriptor());
        let existed = self.cache.has_resource(&identity);
        let nulled = nulled_fragment_fields(&self.schema, &identity, data.attributes.as_ref());

        self.cache.upsert(&identity, data.attributes, existed);
        for field in nulled {
            // a local override can keep the slot populated
            if is_absent(self.cache.get_attr(&identity, &field).as_ref()) {
                self.release_slot(&identity, &field);
            }
        }

        let (record, stale) = self.instances.get_or_create(&identity, EntityKind::Record);
        if let Some(stale) = stale {
            self.teardown(&stale);
        }
        debug!("Pushed {} (existing: {})", identity, existed);
        Ok(record)
    }

    /// [`push`](Self::push) for a `{"data": {...}}` JSON document.
    pub fn push_document(&mut self, document: &Value) -> StoreResult<Record> {
        let document = ResourceDocument::from_value(document.clone())?;
        self.push(document.data)
    }

    /// Creates a new client-side record.
    ///
    /// Fragment fields take an object or null; absent fragment fields with a
    /// default are created from it.
    pub fn create_record(&mut self, entity_type: &str, properties: Value) -> StoreResult<Record> {
        self.expect_kind(entity_type, EntityKind::Record)?;
        let options = self.creation_options(entity_type, properties)?;
        let descriptor = IdentityDescriptor {
            entity_type: entity_type.to_string(),
            id: options.get("id").and_then(Value::as_str).map(str::to_string),
            lid: None,
        };
        let identity = self.cache.identifiers_mut().create_for_new_entity(&descriptor);
        self.cache.client_did_create(&identity, options);
        let (record, _) = self.instances.get_or_create(&identity, EntityKind::Record);
        debug!("Created record {}", identity);
        Ok(record)
    }

    /// Creates a standalone fragment with no owner.
    ///
    /// Its snapshot is assembled from its own attributes until it is
    /// assigned to a fragment field.
    pub fn create_fragment(&mut self, entity_type: &str, properties: Value) -> StoreResult<Record> {
        self.expect_kind(entity_type, EntityKind::Fragment)?;
        let options = self.creation_options(entity_type, properties)?;
        let identity = self
            .cache
            .identifiers_mut()
            .create_for_new_entity(&IdentityDescriptor::new_entity(entity_type));
        self.cache.client_did_create(&identity, options);
        let (record, _) = self.instances.get_or_create(&identity, EntityKind::Fragment);
        debug!("Created fragment {}", identity);
        Ok(record)
    }

    /// The live instance for `(entity_type, id)`, if loaded.
    pub fn peek_record(&self, entity_type: &str, id: &str) -> Option<Record> {
        let identity = self.cache.identifiers().peek_by_id(entity_type, id)?;
        self.instances.get(identity.lid())
    }

    // ── Plain attributes ─────────────────────────────────────────

    /// Current value of `key`, falling back to its declared default.
    ///
    /// For a fragment field this is the raw snapshot.
    pub fn attr(&self, record: &Record, key: &str) -> StoreResult<Option<Value>> {
        let identity = record.identity();
        lookup_field(&self.schema, identity.entity_type(), key)?;
        if record.is_destroyed() {
            return Ok(None);
        }
        Ok(self.cache.get_attr(&identity, key))
    }

    /// Writes a plain attribute.
    ///
    /// On a fragment the re-assembled snapshot is written up through every
    /// owner level. Fragment fields are delegated to
    /// [`set_fragment`](Self::set_fragment).
    pub fn set_attr(&mut self, record: &Record, key: &str, value: Value) -> StoreResult<()> {
        let entity_type = record.entity_type();
        let schema = Arc::clone(&self.schema);
        let field = lookup_field(&schema, &entity_type, key)?;
        match field.kind {
            FieldKind::Attribute => {}
            FieldKind::Fragment => return self.set_fragment(record, key, value).map(|_| ()),
            FieldKind::Owner => {
                return Err(StoreError::ReadOnlyOwner {
                    entity_type,
                    field: key.to_string(),
                });
            }
        }

        let identity = self.writable_identity(record, key)?;
        if self.cache.get_attr(&identity, key).as_ref() != Some(&value) {
            self.cache.set_attr(&identity, key, value);
            self.propagate_upward(&identity);
        }
        self.clear_errors(&identity, key);
        Ok(())
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Marks the record (and its fragments) deleted.
    pub fn delete_record(&mut self, record: &Record) -> StoreResult<()> {
        if !record.is_live() {
            return Err(StoreError::RecordDestroyed(record.to_string()));
        }
        self.cache.set_is_deleted(&record.identity(), true);
        Ok(())
    }

    /// Moves local changes in flight.
    pub fn will_commit(&mut self, record: &Record) {
        self.cache.will_commit(&record.identity());
    }

    /// Acknowledges a save.
    ///
    /// Fragment members missing from `result` are filled with the value that
    /// was sent (or the declared default), so nested in-flight state is
    /// always promoted. A committed deletion unloads the record.
    pub fn did_commit(&mut self, record: &Record, result: Option<ResourceData>) {
        let identity = record.identity();
        let mut attributes = Attributes::new();
        if let Some(data) = result {
            if data.id.is_some() {
                let descriptor = IdentityDescriptor {
                    entity_type: identity.entity_type().to_string(),
                    id: data.id.clone(),
                    lid: None,
                };
                self.cache.identifiers_mut().update_identity(&identity, &descriptor);
            }
            attributes = data.attributes.unwrap_or_default();
        }

        let schema = Arc::clone(&self.schema);
        for field in schema.fields_of(identity.entity_type()).iter().filter(|f| f.is_fragment()) {
            if attributes.contains_key(&field.name) {
                continue;
            }
            if let Some(sent) = self.cache.get_attr(&identity, &field.name) {
                attributes.insert(field.name.clone(), sent);
            }
        }

        self.cache.did_commit(&identity, Some(attributes));
        if self.cache.is_deletion_committed(&identity) {
            debug!("Deletion of {} committed", identity);
            self.unload_record(record);
        }
    }

    /// Records a rejected save and its field errors.
    ///
    /// Errors on `field.member` paths are routed to the fragment under
    /// `field`.
    pub fn commit_was_rejected(&mut self, record: &Record, errors: Vec<FieldError>) {
        self.cache.commit_was_rejected(&record.identity(), errors);
    }

    /// Discards local changes. Returns the rolled-back keys.
    ///
    /// A new record has nothing to roll back to and is unloaded.
    pub fn rollback_attributes(&mut self, record: &Record) -> Vec<String> {
        let identity = record.identity();
        if record.kind() == EntityKind::Record && self.cache.is_new(&identity) {
            self.unload_record(record);
            return Vec::new();
        }
        let rolled_back = self.cache.rollback_attrs(&identity);

        let schema = Arc::clone(&self.schema);
        for field in schema.fields_of(identity.entity_type()).iter().filter(|f| f.is_fragment()) {
            if is_absent(self.cache.get_attr(&identity, &field.name).as_ref()) {
                self.release_slot(&identity, &field.name);
            }
        }
        self.propagate_upward(&identity);
        rolled_back
    }

    /// Tears down the instance and its fragments, then drops their cached state.
    pub fn unload_record(&mut self, record: &Record) {
        let identity = record.identity();
        self.teardown(record);
        self.cache.unload_record(&identity);
    }

    // ── Queries ──────────────────────────────────────────────────

    /// New and not deleted, a pending deletion, or changes anywhere below.
    pub fn has_dirty_attributes(&mut self, record: &Record) -> bool {
        let identity = record.identity();
        let is_deleted = self.cache.is_deleted(&identity);
        (is_deleted && !self.cache.is_deletion_committed(&identity))
            || (self.cache.is_new(&identity) && !is_deleted)
            || self.cache.has_changed_attrs(&identity)
    }

    pub fn changed_attributes(&self, record: &Record) -> ChangedAttributes {
        self.cache.changed_attrs(&record.identity())
    }

    pub fn errors(&self, record: &Record) -> Vec<FieldError> {
        self.cache.errors(&record.identity()).to_vec()
    }

    pub fn is_valid(&self, record: &Record) -> bool {
        self.cache.errors(&record.identity()).is_empty()
    }

    pub fn is_new(&self, record: &Record) -> bool {
        self.cache.is_new(&record.identity())
    }

    pub fn is_deleted(&self, record: &Record) -> bool {
        self.cache.is_deleted(&record.identity())
    }

    // ── Internals ────────────────────────────────────────────────

    pub(crate) fn expect_kind(&self, entity_type: &str, expected: EntityKind) -> StoreResult<()> {
        match self.schema.kind_of(entity_type) {
            None => Err(StoreError::UnknownEntityType(entity_type.to_string())),
            Some(kind) if kind == expected => Ok(()),
            Some(_) => Err(StoreError::WrongEntityKind {
                entity_type: entity_type.to_string(),
                expected,
            }),
        }
    }

    /// Checks creation properties before anything is written.
    fn creation_options(&self, entity_type: &str, properties: Value) -> StoreResult<Attributes> {
        let options = match properties {
            Value::Object(map) => map,
            Value::Null => Attributes::new(),
            other => {
                return Err(StoreError::Validation(format!(
                    "properties for {entity_type} must be an object, got {other}"
                )));
            }
        };
        for (key, value) in &options {
            if key == "id" {
                continue;
            }
            let field = lookup_field(&self.schema, entity_type, key)?;
            match field.kind {
                FieldKind::Attribute => {}
                FieldKind::Fragment => check_fragment_json(entity_type, key, value)?,
                FieldKind::Owner => {
                    return Err(StoreError::ReadOnlyOwner {
                        entity_type: entity_type.to_string(),
                        field: key.clone(),
                    });
                }
            }
        }
        Ok(options)
    }

    /// The identity of `record`, if it may be written.
    pub(crate) fn writable_identity(&self, record: &Record, field: &str) -> StoreResult<StableIdentifier> {
        if !record.is_live() {
            return Err(StoreError::RecordDestroyed(record.to_string()));
        }
        let identity = record.identity();
        if self.cache.is_deleted(&identity) {
            return Err(StoreError::MutationOnDeletedEntity {
                entity: identity.to_string(),
                field: field.to_string(),
            });
        }
        Ok(identity)
    }

    /// Clears errors on `key` and on the matching nested path of every owner.
    pub(crate) fn clear_errors(&mut self, identity: &StableIdentifier, key: &str) {
        self.cache.remove_errors_for(identity, key);
        let mut current = identity.clone();
        let mut path = key.to_string();
        while let Some(ownership) = self.ownership.owner_of(&current).cloned() {
            path = format!("{}.{path}", ownership.field);
            self.cache.remove_error_path(&ownership.owner, &path);
            current = ownership.owner;
        }
    }

    /// Unbinds the fragment slot `owner.field` after it became null.
    pub(crate) fn release_slot(&mut self, owner: &StableIdentifier, field: &str) {
        let lid = Lid::derived(owner.lid(), field);
        let Some(instance) = self.instances.get(&lid) else {
            self.ownership.detach_lid(&lid);
            return;
        };
        match self.config.detached_fragments {
            DetachedFragmentPolicy::Teardown => {
                debug!("Tearing down detached fragment {}", instance);
                self.teardown(&instance);
            }
            DetachedFragmentPolicy::Retain => {
                debug!("Retaining detached fragment {}", instance);
                self.ownership.detach_lid(&lid);
            }
        }
    }

    /// Takes `instance` out of its slot under `owner`, applying the policy.
    pub(crate) fn displace(&mut self, owner: &StableIdentifier, instance: &Record) {
        match self.config.detached_fragments {
            DetachedFragmentPolicy::Teardown => {
                debug!("Tearing down displaced fragment {}", instance);
                self.teardown(instance);
            }
            DetachedFragmentPolicy::Retain => {
                debug!("Parking displaced fragment {} on {}", instance, owner);
                let mut subtree = Vec::new();
                self.take_subtree(instance, &mut subtree);
                self.retained.entry(owner.lid().clone()).or_default().extend(subtree);
            }
        }
    }

    /// Unregisters `record` and its registered fragments, collecting them.
    fn take_subtree(&mut self, record: &Record, out: &mut Vec<Record>) {
        let lid = record.lid();
        if self.instances.remove_if_same(&lid, record) {
            self.ownership.detach_lid(&lid);
            let schema = Arc::clone(&self.schema);
            for field in schema.fields_of(&record.entity_type()).iter().filter(|f| f.is_fragment()) {
                if let Some(child) = self.instances.get(&Lid::derived(&lid, &field.name)) {
                    self.take_subtree(&child, out);
                }
            }
        }
        out.push(record.clone());
    }

    /// Destroys `record` and, depth first, the fragment instances under it.
    ///
    /// Cached attributes are left alone.
    pub(crate) fn teardown(&mut self, record: &Record) {
        if !record.is_live() {
            return;
        }
        record.set_state(LifecycleState::Destroying);
        let lid = record.lid();
        if self.instances.remove_if_same(&lid, record) {
            self.ownership.detach_lid(&lid);
            let schema = Arc::clone(&self.schema);
            for field in schema.fields_of(&record.entity_type()).iter().filter(|f| f.is_fragment()) {
                if let Some(child) = self.instances.get(&Lid::derived(&lid, &field.name)) {
                    self.teardown(&child);
                }
            }
            for parked in self.retained.remove(&lid).unwrap_or_default() {
                self.teardown(&parked);
            }
        }
        record.set_state(LifecycleState::Destroyed);
        debug!("Destroyed {}", record);
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("config", &self.config)
            .field("instances", &self.instances.len())
            .field("fragments_owned", &self.ownership.len())
            .finish()
    }
}

pub(crate) fn lookup_field<'s>(
    schema: &'s SchemaRegistry,
    entity_type: &str,
    field: &str,
) -> StoreResult<&'s FieldSchema> {
    if !schema.contains(entity_type) {
        return Err(StoreError::UnknownEntityType(entity_type.to_string()));
    }
    schema
        .field(entity_type, field)
        .ok_or_else(|| StoreError::UnknownField {
            entity_type: entity_type.to_string(),
            field: field.to_string(),
        })
}

/// Null or missing, the two ways a fragment slot can be empty.
pub(crate) fn is_absent(value: Option<&Value>) -> bool {
    value.is_none_or(Value::is_null)
}

fn check_fragment_json(entity_type: &str, field: &str, value: &Value) -> StoreResult<()> {
    match value {
        Value::Null | Value::Object(_) => Ok(()),
        other => Err(StoreError::Validation(format!(
            "'{field}' on {entity_type} takes a fragment, an object or null; got {other}"
        ))),
    }
}

fn nulled_fragment_fields(
    schema: &SchemaRegistry,
    identity: &StableIdentifier,
    attributes: Option<&Attributes>,
) -> Vec<String> {
    let Some(attributes) = attributes else {
        return Vec::new();
    };
    schema
        .fields_of(identity.entity_type())
        .iter()
        .filter(|f| f.is_fragment() && attributes.get(&f.name).is_some_and(Value::is_null))
        .map(|f| f.name.clone())
        .collect()
}
