use fragkit_model::{FieldSchema, SchemaRegistry};
use fragkit_types::{Attributes, FieldError, Lid, StableIdentifier};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// One entry of a change set: the persisted value and the local override.
///
/// `before` is `None` when the attribute was never persisted, and
/// `Some(Value::Null)` when it was persisted as null.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeChange {
    pub before: Option<Value>,
    pub after: Value,
}

impl AttributeChange {
    pub fn new(before: Option<Value>, after: Value) -> Self {
        Self { before, after }
    }
}

/// Changed attributes keyed by attribute name.
pub type ChangedAttributes = BTreeMap<String, AttributeChange>;

#[derive(Debug, Clone, Default)]
struct CachedResource {
    remote: Attributes,
    local: Attributes,
    inflight: Option<Attributes>,
    is_new: bool,
    is_deleted: bool,
    is_deletion_committed: bool,
    errors: Vec<FieldError>,
}

impl CachedResource {
    /// The value a local override is compared against.
    fn persisted(&self, field: &str) -> Option<&Value> {
        self.inflight
            .as_ref()
            .and_then(|inflight| inflight.get(field))
            .or_else(|| self.remote.get(field))
    }

    fn current(&self, field: &str) -> Option<&Value> {
        self.local.get(field).or_else(|| self.persisted(field))
    }

    /// Drops local overrides that now equal their persisted value.
    fn patch_local(&mut self) {
        let CachedResource {
            remote,
            local,
            inflight,
            ..
        } = self;
        local.retain(|key, value| {
            let persisted = inflight
                .as_ref()
                .and_then(|i| i.get(key))
                .or_else(|| remote.get(key));
            persisted != Some(value)
        });
    }
}

/// The base, non-cascading attribute cache.
///
/// Holds per-identity remote (persisted), local (mutated) and in-flight
/// (mid-save) attributes. Owners and fragments use the identical structure.
#[derive(Debug)]
pub struct AttributeCache {
    schema: Arc<SchemaRegistry>,
    resources: HashMap<Lid, CachedResource>,
}

impl AttributeCache {
    pub fn new(schema: Arc<SchemaRegistry>) -> Self {
        Self {
            schema,
            resources: HashMap::new(),
        }
    }

    pub fn has_resource(&self, identity: &StableIdentifier) -> bool {
        self.contains_lid(identity.lid())
    }

    pub fn contains_lid(&self, lid: &Lid) -> bool {
        self.resources.contains_key(lid)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    fn peek(&self, identity: &StableIdentifier) -> Option<&CachedResource> {
        self.resources.get(identity.lid())
    }

    fn entry(&mut self, identity: &StableIdentifier) -> &mut CachedResource {
        self.resources.entry(identity.lid().clone()).or_default()
    }

    fn field(&self, identity: &StableIdentifier, field: &str) -> Option<&FieldSchema> {
        self.schema.field(identity.entity_type(), field)
    }

    // ── Reads ────────────────────────────────────────────────────

    /// Current value: local, then in-flight, then remote, then the schema default.
    pub fn get_attr(&self, identity: &StableIdentifier, field: &str) -> Option<Value> {
        self.peek_attr(identity, field)
            .or_else(|| self.field(identity, field).and_then(FieldSchema::default_value))
    }

    /// Like [`get_attr`](Self::get_attr) without the default fallback.
    pub fn peek_attr(&self, identity: &StableIdentifier, field: &str) -> Option<Value> {
        self.peek(identity)?.current(field).cloned()
    }

    pub fn changed_attrs(&self, identity: &StableIdentifier) -> ChangedAttributes {
        let Some(resource) = self.peek(identity) else {
            return ChangedAttributes::new();
        };
        resource
            .local
            .iter()
            .map(|(key, after)| {
                let before = resource.persisted(key).cloned();
                (key.clone(), AttributeChange::new(before, after.clone()))
            })
            .collect()
    }

    pub fn has_changed_attrs(&self, identity: &StableIdentifier) -> bool {
        self.peek(identity).is_some_and(|r| {
            !r.local.is_empty() || r.inflight.as_ref().is_some_and(|i| !i.is_empty())
        })
    }

    pub fn is_new(&self, identity: &StableIdentifier) -> bool {
        self.peek(identity).is_some_and(|r| r.is_new)
    }

    pub fn is_deleted(&self, identity: &StableIdentifier) -> bool {
        self.peek(identity).is_some_and(|r| r.is_deleted)
    }

    pub fn is_deletion_committed(&self, identity: &StableIdentifier) -> bool {
        self.peek(identity).is_some_and(|r| r.is_deletion_committed)
    }

    pub fn errors(&self, identity: &StableIdentifier) -> &[FieldError] {
        self.peek(identity)
            .map(|r| r.errors.as_slice())
            .unwrap_or(&[])
    }

    // ── Writes ───────────────────────────────────────────────────

    /// Writes a local value, or drops the override if it equals the persisted value.
    pub fn set_attr(&mut self, identity: &StableIdentifier, field: &str, value: Value) {
        let resource = self.entry(identity);
        if resource.persisted(field) == Some(&value) {
            resource.local.remove(field);
        } else {
            resource.local.insert(field.to_string(), value);
        }
    }

    /// Merges remote state. Returns the changed keys when `calculate_changes`.
    pub fn upsert(
        &mut self,
        identity: &StableIdentifier,
        attributes: Option<&Attributes>,
        calculate_changes: bool,
    ) -> Option<Vec<String>> {
        let resource = self.entry(identity);
        let changed = calculate_changes.then(|| {
            attributes
                .map(|attrs| {
                    attrs
                        .iter()
                        .filter(|(key, value)| {
                            !resource.local.contains_key(*key)
                                && resource.persisted(key) != Some(*value)
                        })
                        .map(|(key, _)| key.clone())
                        .collect()
                })
                .unwrap_or_default()
        });
        if let Some(attrs) = attributes {
            for (key, value) in attrs {
                resource.remote.insert(key.clone(), value.clone());
            }
        }
        resource.patch_local();
        changed
    }

    /// Marks the resource new and applies the creation options.
    ///
    /// Keys that are not declared attribute or fragment fields are ignored.
    pub fn client_did_create(&mut self, identity: &StableIdentifier, options: &Attributes) {
        self.entry(identity).is_new = true;
        for (key, value) in options {
            if key == "id" {
                continue;
            }
            let stored = self
                .field(identity, key)
                .is_some_and(|field| field.kind.is_stored());
            if stored {
                self.set_attr(identity, key, value.clone());
            } else {
                debug!(identity = %identity, key = %key, "ignoring undeclared create option");
            }
        }
    }

    /// Moves local changes in flight.
    pub fn will_commit(&mut self, identity: &StableIdentifier) {
        let resource = self.entry(identity);
        let local = std::mem::take(&mut resource.local);
        match &mut resource.inflight {
            Some(inflight) => inflight.extend(local),
            None => resource.inflight = Some(local),
        }
    }

    /// Promotes in-flight state and the response attributes to remote.
    pub fn did_commit(
        &mut self,
        identity: &StableIdentifier,
        attributes: Option<&Attributes>,
    ) -> Vec<String> {
        let resource = self.entry(identity);
        let mut changed = Vec::new();
        if let Some(inflight) = resource.inflight.take() {
            for (key, value) in inflight {
                if resource.remote.get(&key) != Some(&value) {
                    changed.push(key.clone());
                }
                resource.remote.insert(key, value);
            }
        }
        if let Some(attrs) = attributes {
            for (key, value) in attrs {
                if resource.remote.get(key) != Some(value) && !changed.contains(key) {
                    changed.push(key.clone());
                }
                resource.remote.insert(key.clone(), value.clone());
            }
        }
        resource.is_new = false;
        if resource.is_deleted {
            resource.is_deletion_committed = true;
        }
        resource.errors.clear();
        resource.patch_local();
        changed
    }

    /// Folds in-flight state back under the local overrides and records errors.
    pub fn commit_was_rejected(&mut self, identity: &StableIdentifier, errors: &[FieldError]) {
        let resource = self.entry(identity);
        if let Some(mut inflight) = resource.inflight.take() {
            inflight.extend(std::mem::take(&mut resource.local));
            resource.local = inflight;
        }
        if !errors.is_empty() {
            resource.errors = errors.to_vec();
        }
    }

    /// Drops local overrides and errors, and undoes an uncommitted deletion.
    pub fn rollback_attrs(&mut self, identity: &StableIdentifier) -> Vec<String> {
        let Some(resource) = self.resources.get_mut(identity.lid()) else {
            return Vec::new();
        };
        let keys: Vec<String> = resource.local.keys().cloned().collect();
        resource.local.clear();
        resource.errors.clear();
        if resource.is_deleted && !resource.is_deletion_committed {
            resource.is_deleted = false;
        }
        keys
    }

    pub fn set_is_deleted(&mut self, identity: &StableIdentifier, is_deleted: bool) {
        self.entry(identity).is_deleted = is_deleted;
    }

    /// Removes all cached state. Returns whether anything was cached.
    pub fn unload_record(&mut self, identity: &StableIdentifier) -> bool {
        self.resources.remove(identity.lid()).is_some()
    }

    /// Removes the validation errors reported against `field`.
    pub fn remove_errors_for(&mut self, identity: &StableIdentifier, field: &str) -> bool {
        let Some(resource) = self.resources.get_mut(identity.lid()) else {
            return false;
        };
        let before = resource.errors.len();
        resource.errors.retain(|e| e.field() != field);
        resource.errors.len() != before
    }

    /// Folds the current values of `fragment` into the local snapshot under
    /// `owner.field`.
    ///
    /// Keys the written object left out keep their fragment values, so the
    /// snapshot always matches the fragment. Null slots are left alone.
    pub fn reconcile_snapshot(
        &mut self,
        owner: &StableIdentifier,
        field: &str,
        fragment: &StableIdentifier,
    ) -> bool {
        let current = self.peek_attr(owner, field);
        let Some(merged) = self.merged_snapshot(current.as_ref(), fragment, |resource, key| {
            resource.current(key)
        }) else {
            return false;
        };
        if current.as_ref() == Some(&merged) {
            return false;
        }
        self.set_attr(owner, field, merged);
        true
    }

    /// Like [`reconcile_snapshot`](Self::reconcile_snapshot) for remote state:
    /// folds the remote values of `fragment` into the remote snapshot under
    /// `owner.field`.
    pub fn reconcile_remote_snapshot(
        &mut self,
        owner: &StableIdentifier,
        field: &str,
        fragment: &StableIdentifier,
    ) -> bool {
        let current = self.peek(owner).and_then(|r| r.remote.get(field)).cloned();
        let Some(merged) = self.merged_snapshot(current.as_ref(), fragment, |resource, key| {
            resource.remote.get(key)
        }) else {
            return false;
        };
        if current.as_ref() == Some(&merged) {
            return false;
        }
        let resource = self.entry(owner);
        resource.remote.insert(field.to_string(), merged);
        resource.patch_local();
        true
    }

    /// `snapshot` overlaid with the stored fields of `fragment` read through
    /// `read`. `None` when the snapshot is not an object or is missing while
    /// the fragment has nothing to contribute.
    fn merged_snapshot(
        &self,
        snapshot: Option<&Value>,
        fragment: &StableIdentifier,
        read: impl for<'r> Fn(&'r CachedResource, &str) -> Option<&'r Value>,
    ) -> Option<Value> {
        let mut merged = match snapshot {
            Some(Value::Object(map)) => map.clone(),
            Some(_) => return None,
            None => Attributes::new(),
        };
        let resource = self.peek(fragment)?;
        for field in self.schema.fields_of(fragment.entity_type()) {
            if !field.kind.is_stored() {
                continue;
            }
            if let Some(value) = read(resource, &field.name) {
                merged.insert(field.name.clone(), value.clone());
            }
        }
        if snapshot.is_none() && merged.is_empty() {
            return None;
        }
        Some(Value::Object(merged))
    }

    /// Removes the validation errors reported against exactly `path`.
    pub fn remove_error_path(&mut self, identity: &StableIdentifier, path: &str) -> bool {
        let Some(resource) = self.resources.get_mut(identity.lid()) else {
            return false;
        };
        let before = resource.errors.len();
        resource.errors.retain(|e| e.attribute != path);
        resource.errors.len() != before
    }
}
