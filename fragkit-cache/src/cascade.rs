use crate::derive::fragment_descriptor;
use crate::operations::{
    CacheOperation, ClientDidCreate, CommitWasRejected, DidCommit, HasChangedAttrs, RollbackAttrs,
    SetAttributes, SetIsDeleted, UnloadRecord, Upsert, WillCommit,
};
use crate::{AttributeCache, ChangedAttributes, IdentifierCache};
use fragkit_model::{FieldSchema, SchemaRegistry};
use fragkit_types::{Attributes, FieldError, Lid, StableIdentifier};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Attribute cache that replays every lifecycle operation onto the
/// fragment fields of the identity it was applied to.
///
/// Fragments are ordinary identities to the base cache; this wrapper only
/// adds the traversal. Because a nested identity is visited through the same
/// [`cascade`](Self::cascade), consistency reaches any nesting depth.
#[derive(Debug)]
pub struct CascadingCache {
    schema: Arc<SchemaRegistry>,
    base: AttributeCache,
    identifiers: IdentifierCache,
}

impl CascadingCache {
    pub fn new(schema: Arc<SchemaRegistry>) -> Self {
        Self::with_identifiers(schema, IdentifierCache::default())
    }

    pub fn with_identifiers(schema: Arc<SchemaRegistry>, identifiers: IdentifierCache) -> Self {
        Self {
            base: AttributeCache::new(Arc::clone(&schema)),
            schema,
            identifiers,
        }
    }

    pub fn schema(&self) -> &Arc<SchemaRegistry> {
        &self.schema
    }

    pub fn base(&self) -> &AttributeCache {
        &self.base
    }

    pub fn identifiers(&self) -> &IdentifierCache {
        &self.identifiers
    }

    pub fn identifiers_mut(&mut self) -> &mut IdentifierCache {
        &mut self.identifiers
    }

    // ── Traversal ────────────────────────────────────────────────

    /// Applies `op` to `identity`, then to each fragment field it descends
    /// into, in declaration order.
    pub fn cascade<O: CacheOperation>(&mut self, identity: &StableIdentifier, op: O) -> O::Output {
        trace!(op = O::NAME, identity = %identity, "cascade");
        let mut out = op.apply(&mut self.base, identity);
        let schema = Arc::clone(&self.schema);
        for field in fragment_fields(&schema, identity) {
            if O::is_settled(&out) {
                break;
            }
            let Some(nested_op) = op.descend(&self.base, identity, field) else {
                continue;
            };
            if O::REQUIRES_STATE && !self.is_known(&Lid::derived(identity.lid(), &field.name)) {
                continue;
            }
            let nested = self.resolve_fragment_identity(identity, field);
            let nested_out = self.cascade(&nested, nested_op);
            op.ascend(&mut self.base, identity, field, &nested);
            O::combine(&mut out, nested_out);
        }
        out
    }

    /// Calls `f` with the nested identity of every fragment field of
    /// `identity`, creating identities that do not exist yet.
    pub fn for_each_fragment_field<T>(
        &mut self,
        identity: &StableIdentifier,
        mut f: impl FnMut(&mut Self, &StableIdentifier, &FieldSchema) -> T,
    ) -> Vec<T> {
        let schema = Arc::clone(&self.schema);
        let mut results = Vec::new();
        for field in fragment_fields(&schema, identity) {
            let nested = self.resolve_fragment_identity(identity, field);
            results.push(f(self, &nested, field));
        }
        results
    }

    /// The nested identity for fragment field `field` of `owner`.
    ///
    /// `None` when `field` is not a fragment field of the owner's type.
    pub fn fragment_identity(
        &mut self,
        owner: &StableIdentifier,
        field: &str,
    ) -> Option<StableIdentifier> {
        let schema = Arc::clone(&self.schema);
        let field = schema
            .field(owner.entity_type(), field)
            .filter(|f| f.fragment_type().is_some())?;
        Some(self.resolve_fragment_identity(owner, field))
    }

    fn is_known(&self, lid: &Lid) -> bool {
        self.base.contains_lid(lid) || self.identifiers.peek(lid).is_some()
    }

    /// Resolves the concrete type of the fragment under `field`, re-typing
    /// the identity when a polymorphic snapshot names another type.
    fn resolve_fragment_identity(
        &mut self,
        owner: &StableIdentifier,
        field: &FieldSchema,
    ) -> StableIdentifier {
        let lid = Lid::derived(owner.lid(), &field.name);
        let existing = self.identifiers.peek(&lid);
        let snapshot = self.base.peek_attr(owner, &field.name);
        let entity_type = field
            .polymorphic_type(snapshot.as_ref())
            .or_else(|| existing.as_ref().map(|e| e.entity_type().to_string()))
            .or_else(|| field.fragment_type().map(str::to_string))
            .unwrap_or_default();
        if let Some(stale) = existing.filter(|e| e.entity_type() != entity_type) {
            debug!(
                lid = %lid,
                from = stale.entity_type(),
                to = %entity_type,
                "fragment changed type"
            );
            self.unload_record(&stale);
        }
        self.identifiers
            .get_or_create(&fragment_descriptor(owner, &field.name, &entity_type))
    }

    // ── Reads ────────────────────────────────────────────────────

    pub fn get_attr(&self, identity: &StableIdentifier, field: &str) -> Option<Value> {
        self.base.get_attr(identity, field)
    }

    pub fn peek_attr(&self, identity: &StableIdentifier, field: &str) -> Option<Value> {
        self.base.peek_attr(identity, field)
    }

    pub fn changed_attrs(&self, identity: &StableIdentifier) -> ChangedAttributes {
        self.base.changed_attrs(identity)
    }

    pub fn errors(&self, identity: &StableIdentifier) -> &[FieldError] {
        self.base.errors(identity)
    }

    pub fn is_new(&self, identity: &StableIdentifier) -> bool {
        self.base.is_new(identity)
    }

    pub fn is_deleted(&self, identity: &StableIdentifier) -> bool {
        self.base.is_deleted(identity)
    }

    pub fn is_deletion_committed(&self, identity: &StableIdentifier) -> bool {
        self.base.is_deletion_committed(identity)
    }

    pub fn has_resource(&self, identity: &StableIdentifier) -> bool {
        self.base.has_resource(identity)
    }

    /// True if `identity` or any fragment below it has changes.
    pub fn has_changed_attrs(&mut self, identity: &StableIdentifier) -> bool {
        self.cascade(identity, HasChangedAttrs)
    }

    // ── Cascading writes ─────────────────────────────────────────

    pub fn set_attr(&mut self, identity: &StableIdentifier, field: &str, value: Value) {
        self.cascade(identity, SetAttributes::single(field, value));
    }

    pub fn set_attrs(&mut self, identity: &StableIdentifier, values: Attributes) {
        self.cascade(identity, SetAttributes { values });
    }

    pub fn upsert(
        &mut self,
        identity: &StableIdentifier,
        attributes: Option<Attributes>,
        calculate_changes: bool,
    ) -> Option<Vec<String>> {
        self.cascade(
            identity,
            Upsert {
                attributes,
                calculate_changes,
            },
        )
    }

    pub fn client_did_create(&mut self, identity: &StableIdentifier, options: Attributes) {
        self.cascade(identity, ClientDidCreate { options });
    }

    pub fn will_commit(&mut self, identity: &StableIdentifier) {
        self.cascade(identity, WillCommit);
    }

    pub fn did_commit(
        &mut self,
        identity: &StableIdentifier,
        attributes: Option<Attributes>,
    ) -> Vec<String> {
        self.cascade(identity, DidCommit { attributes })
    }

    pub fn commit_was_rejected(&mut self, identity: &StableIdentifier, errors: Vec<FieldError>) {
        self.cascade(identity, CommitWasRejected { errors });
    }

    pub fn rollback_attrs(&mut self, identity: &StableIdentifier) -> Vec<String> {
        self.cascade(identity, RollbackAttrs)
    }

    pub fn set_is_deleted(&mut self, identity: &StableIdentifier, is_deleted: bool) {
        self.cascade(identity, SetIsDeleted(is_deleted));
    }

    /// Drops the cached state of `identity` and every fragment below it and
    /// forgets their identifiers. Returns the identities unloaded.
    pub fn unload_record(&mut self, identity: &StableIdentifier) -> Vec<StableIdentifier> {
        let unloaded = self.cascade(identity, UnloadRecord);
        for identity in &unloaded {
            self.identifiers.forget(identity);
        }
        unloaded
    }

    pub fn remove_errors_for(&mut self, identity: &StableIdentifier, field: &str) -> bool {
        self.base.remove_errors_for(identity, field)
    }

    pub fn remove_error_path(&mut self, identity: &StableIdentifier, path: &str) -> bool {
        self.base.remove_error_path(identity, path)
    }
}

fn fragment_fields<'s>(schema: &'s SchemaRegistry, identity: &StableIdentifier) -> Vec<&'s FieldSchema> {
    if !schema.contains(identity.entity_type()) {
        warn!(identity = %identity, "no schema registered; not cascading");
    }
    schema
        .fields_of(identity.entity_type())
        .iter()
        .filter(|f| f.fragment_type().is_some())
        .collect()
}
