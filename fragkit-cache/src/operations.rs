//! Lifecycle operations replayed by the [`CascadingCache`](crate::CascadingCache).
//!
//! Each operation knows how to apply itself to one identity in the base
//! cache and how to derive the operation for a nested fragment field. The
//! traversal itself lives in one place, `CascadingCache::cascade`.

use crate::AttributeCache;
use fragkit_model::FieldSchema;
use fragkit_types::{Attributes, FieldError, StableIdentifier};
use serde_json::Value;

/// A lifecycle operation that can be cascaded onto fragment fields.
pub trait CacheOperation: Sized {
    type Output;

    /// Name used in trace output.
    const NAME: &'static str;

    /// Whether a nested identity is visited only when it already has cached
    /// state. Operations that carry data to write set this to false.
    const REQUIRES_STATE: bool = true;

    /// Performs the base, non-cascading operation on `identity`.
    fn apply(&self, base: &mut AttributeCache, identity: &StableIdentifier) -> Self::Output;

    /// The operation to replay on `field` of `owner`, or `None` to skip it.
    ///
    /// Called after [`apply`](Self::apply) has run on the owner.
    fn descend(
        &self,
        base: &AttributeCache,
        owner: &StableIdentifier,
        field: &FieldSchema,
    ) -> Option<Self>;

    /// Runs on the owner once the operation has been replayed on `nested`,
    /// the fragment under `field`.
    fn ascend(
        &self,
        _base: &mut AttributeCache,
        _owner: &StableIdentifier,
        _field: &FieldSchema,
        _nested: &StableIdentifier,
    ) {
    }

    /// Folds a nested result into the owner's result.
    fn combine(_out: &mut Self::Output, _nested: Self::Output) {}

    /// True when the remaining fields need not be visited.
    fn is_settled(_out: &Self::Output) -> bool {
        false
    }
}

fn nested_object(value: &Value) -> Option<Attributes> {
    value.as_object().cloned()
}

// ── Writes carrying data ─────────────────────────────────────────

/// Local writes; object values under fragment fields decompose into the
/// fragment's own attributes.
#[derive(Debug, Clone)]
pub struct SetAttributes {
    pub values: Attributes,
}

impl SetAttributes {
    pub fn single(field: &str, value: Value) -> Self {
        let mut values = Attributes::new();
        values.insert(field.to_string(), value);
        Self { values }
    }
}

impl CacheOperation for SetAttributes {
    type Output = ();
    const NAME: &'static str = "set_attr";
    const REQUIRES_STATE: bool = false;

    fn apply(&self, base: &mut AttributeCache, identity: &StableIdentifier) {
        for (key, value) in &self.values {
            base.set_attr(identity, key, value.clone());
        }
    }

    fn descend(&self, _: &AttributeCache, _: &StableIdentifier, field: &FieldSchema) -> Option<Self> {
        let values = self.values.get(&field.name).and_then(nested_object)?;
        Some(Self { values })
    }

    fn ascend(
        &self,
        base: &mut AttributeCache,
        owner: &StableIdentifier,
        field: &FieldSchema,
        nested: &StableIdentifier,
    ) {
        base.reconcile_snapshot(owner, &field.name, nested);
    }
}

/// Remote merge. Absent fragment fields fall back to their declared default.
///
/// Fragment members merge key by key; the owner's snapshot is then rebuilt
/// from the merged fragment.
#[derive(Debug, Clone)]
pub struct Upsert {
    pub attributes: Option<Attributes>,
    pub calculate_changes: bool,
}

impl CacheOperation for Upsert {
    type Output = Option<Vec<String>>;
    const NAME: &'static str = "upsert";
    const REQUIRES_STATE: bool = false;

    fn apply(&self, base: &mut AttributeCache, identity: &StableIdentifier) -> Self::Output {
        base.upsert(identity, self.attributes.as_ref(), self.calculate_changes)
    }

    fn descend(
        &self,
        base: &AttributeCache,
        owner: &StableIdentifier,
        field: &FieldSchema,
    ) -> Option<Self> {
        if field.name == "id" {
            return None;
        }
        let attributes = match self.attributes.as_ref().and_then(|a| a.get(&field.name)) {
            Some(value) => nested_object(value),
            None if base.peek_attr(owner, &field.name).is_none() => {
                Some(nested_object(&field.default_value()?)?)
            }
            None => return None,
        };
        Some(Self {
            attributes,
            calculate_changes: self.calculate_changes,
        })
    }

    fn ascend(
        &self,
        base: &mut AttributeCache,
        owner: &StableIdentifier,
        field: &FieldSchema,
        nested: &StableIdentifier,
    ) {
        base.reconcile_remote_snapshot(owner, &field.name, nested);
    }
}

/// Client-side creation with the supplied options.
#[derive(Debug, Clone)]
pub struct ClientDidCreate {
    pub options: Attributes,
}

impl CacheOperation for ClientDidCreate {
    type Output = ();
    const NAME: &'static str = "client_did_create";
    const REQUIRES_STATE: bool = false;

    fn apply(&self, base: &mut AttributeCache, identity: &StableIdentifier) {
        base.client_did_create(identity, &self.options);
    }

    fn descend(&self, _: &AttributeCache, _: &StableIdentifier, field: &FieldSchema) -> Option<Self> {
        if field.name == "id" {
            return None;
        }
        let options = match self.options.get(&field.name) {
            Some(value) => nested_object(value)?,
            None => nested_object(&field.default_value()?)?,
        };
        Some(Self { options })
    }
}

// ── Commit lifecycle ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct WillCommit;

impl CacheOperation for WillCommit {
    type Output = ();
    const NAME: &'static str = "will_commit";

    fn apply(&self, base: &mut AttributeCache, identity: &StableIdentifier) {
        base.will_commit(identity);
    }

    fn descend(&self, _: &AttributeCache, _: &StableIdentifier, _: &FieldSchema) -> Option<Self> {
        Some(WillCommit)
    }
}

/// Commit acknowledgement. Fragments are visited only when the response
/// carries their member.
#[derive(Debug, Clone)]
pub struct DidCommit {
    pub attributes: Option<Attributes>,
}

impl CacheOperation for DidCommit {
    type Output = Vec<String>;
    const NAME: &'static str = "did_commit";

    fn apply(&self, base: &mut AttributeCache, identity: &StableIdentifier) -> Self::Output {
        base.did_commit(identity, self.attributes.as_ref())
    }

    fn descend(&self, _: &AttributeCache, _: &StableIdentifier, field: &FieldSchema) -> Option<Self> {
        let value = self.attributes.as_ref()?.get(&field.name)?;
        Some(Self {
            attributes: nested_object(value),
        })
    }

    fn ascend(
        &self,
        base: &mut AttributeCache,
        owner: &StableIdentifier,
        field: &FieldSchema,
        nested: &StableIdentifier,
    ) {
        base.reconcile_remote_snapshot(owner, &field.name, nested);
    }
}

/// Commit rejection. Errors addressed to `field.member` are handed to the
/// fragment as errors on `member`.
#[derive(Debug, Clone)]
pub struct CommitWasRejected {
    pub errors: Vec<FieldError>,
}

impl CacheOperation for CommitWasRejected {
    type Output = ();
    const NAME: &'static str = "commit_was_rejected";

    fn apply(&self, base: &mut AttributeCache, identity: &StableIdentifier) {
        base.commit_was_rejected(identity, &self.errors);
    }

    fn descend(&self, _: &AttributeCache, _: &StableIdentifier, field: &FieldSchema) -> Option<Self> {
        Some(Self {
            errors: self
                .errors
                .iter()
                .filter_map(|e| e.nested_under(&field.name))
                .collect(),
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RollbackAttrs;

impl CacheOperation for RollbackAttrs {
    type Output = Vec<String>;
    const NAME: &'static str = "rollback_attrs";

    fn apply(&self, base: &mut AttributeCache, identity: &StableIdentifier) -> Self::Output {
        base.rollback_attrs(identity)
    }

    fn descend(&self, _: &AttributeCache, _: &StableIdentifier, _: &FieldSchema) -> Option<Self> {
        Some(RollbackAttrs)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SetIsDeleted(pub bool);

impl CacheOperation for SetIsDeleted {
    type Output = ();
    const NAME: &'static str = "set_is_deleted";

    fn apply(&self, base: &mut AttributeCache, identity: &StableIdentifier) {
        base.set_is_deleted(identity, self.0);
    }

    fn descend(&self, _: &AttributeCache, _: &StableIdentifier, _: &FieldSchema) -> Option<Self> {
        Some(*self)
    }
}

// ── Teardown and queries ─────────────────────────────────────────

/// Drops cached state. Yields every identity visited, owner first.
#[derive(Debug, Clone, Copy)]
pub struct UnloadRecord;

impl CacheOperation for UnloadRecord {
    type Output = Vec<StableIdentifier>;
    const NAME: &'static str = "unload_record";

    fn apply(&self, base: &mut AttributeCache, identity: &StableIdentifier) -> Self::Output {
        base.unload_record(identity);
        vec![identity.clone()]
    }

    fn descend(&self, _: &AttributeCache, _: &StableIdentifier, _: &FieldSchema) -> Option<Self> {
        Some(UnloadRecord)
    }

    fn combine(out: &mut Self::Output, nested: Self::Output) {
        out.extend(nested);
    }
}

/// Dirty query: the owner or any fragment below it has changes.
#[derive(Debug, Clone, Copy)]
pub struct HasChangedAttrs;

impl CacheOperation for HasChangedAttrs {
    type Output = bool;
    const NAME: &'static str = "has_changed_attrs";

    fn apply(&self, base: &mut AttributeCache, identity: &StableIdentifier) -> bool {
        base.has_changed_attrs(identity)
    }

    fn descend(&self, _: &AttributeCache, _: &StableIdentifier, _: &FieldSchema) -> Option<Self> {
        Some(HasChangedAttrs)
    }

    fn combine(out: &mut bool, nested: bool) {
        *out |= nested;
    }

    fn is_settled(out: &bool) -> bool {
        *out
    }
}
