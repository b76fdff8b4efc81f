use fragkit_cache::{CacheError, Materialization, OwnershipRegistry};
use fragkit_types::{Lid, StableIdentifier};

fn make_identity(entity_type: &str, lid: &str) -> StableIdentifier {
    StableIdentifier::new(entity_type, Some(lid.to_string()), Lid::new(lid))
}

// ── attach / detach ──────────────────────────────────────────────

#[test]
fn attach_records_owner() {
    let mut registry = OwnershipRegistry::new();
    let owner = make_identity("person", "p1");
    let name = make_identity("name", "p1:name");

    registry.attach(&name, &owner, "name").unwrap();
    let ownership = registry.owner_of(&name).unwrap();
    assert_eq!(ownership.owner, owner);
    assert_eq!(ownership.field, "name");
}

#[test]
fn reattach_to_same_owner_is_noop() {
    let mut registry = OwnershipRegistry::new();
    let owner = make_identity("person", "p1");
    let name = make_identity("name", "p1:name");

    registry.attach(&name, &owner, "name").unwrap();
    registry.attach(&name, &owner, "name").unwrap();
    assert_eq!(registry.len(), 1);
}

#[test]
fn attach_to_other_owner_conflicts() {
    let mut registry = OwnershipRegistry::new();
    let p1 = make_identity("person", "p1");
    let p2 = make_identity("person", "p2");
    let name = make_identity("name", "p1:name");

    registry.attach(&name, &p1, "name").unwrap();
    let err = registry.attach(&name, &p2, "name").unwrap_err();
    match err {
        CacheError::OwnershipConflict { fragment, field, .. } => {
            assert_eq!(fragment.as_str(), "p1:name");
            assert_eq!(field, "name");
        }
    }
}

#[test]
fn attach_to_other_field_conflicts() {
    let mut registry = OwnershipRegistry::new();
    let p1 = make_identity("person", "p1");
    let name = make_identity("name", "p1:name");

    registry.attach(&name, &p1, "name").unwrap();
    assert!(registry.attach(&name, &p1, "alias").is_err());
}

#[test]
fn detach_is_idempotent() {
    let mut registry = OwnershipRegistry::new();
    let owner = make_identity("person", "p1");
    let name = make_identity("name", "p1:name");

    registry.attach(&name, &owner, "name").unwrap();
    assert!(registry.detach(&name).is_some());
    assert!(registry.detach(&name).is_none());
    assert!(registry.owner_of(&name).is_none());
    assert!(registry.is_empty());

    let p2 = make_identity("person", "p2");
    registry.attach(&name, &p2, "name").unwrap();
}

// ── Materialization state ────────────────────────────────────────

#[test]
fn only_first_caller_owns_creation() {
    let mut registry = OwnershipRegistry::new();
    let lid = Lid::new("p1:name");

    assert_eq!(registry.materialization(&lid), Materialization::Absent);
    assert_eq!(registry.begin_materialization(&lid), Materialization::Absent);
    // a reentrant read of the same key sees the creation in progress
    assert_eq!(registry.begin_materialization(&lid), Materialization::BeingCreated);
    assert_eq!(registry.materialization(&lid), Materialization::BeingCreated);

    registry.finish_materialization(&lid);
    assert_eq!(registry.begin_materialization(&lid), Materialization::Ready);
    assert_eq!(registry.materialization(&lid), Materialization::Ready);
}

#[test]
fn abandoned_creation_resets_to_absent() {
    let mut registry = OwnershipRegistry::new();
    let lid = Lid::new("p1:name");
    registry.begin_materialization(&lid);
    registry.abandon_materialization(&lid);
    assert_eq!(registry.materialization(&lid), Materialization::Absent);

    registry.finish_materialization(&lid);
    registry.abandon_materialization(&lid);
    assert_eq!(registry.materialization(&lid), Materialization::Ready);
}

#[test]
fn states_are_tracked_per_lid() {
    let mut registry = OwnershipRegistry::new();
    let name = Lid::new("p1:name");
    let title = Lid::new("p1:title");
    registry.begin_materialization(&name);
    registry.finish_materialization(&title);
    assert_eq!(registry.materialization(&name), Materialization::BeingCreated);
    assert_eq!(registry.materialization(&title), Materialization::Ready);
}

#[test]
fn detach_clears_materialization() {
    let mut registry = OwnershipRegistry::new();
    let owner = make_identity("person", "p1");
    let name = make_identity("name", "p1:name");
    registry.attach(&name, &owner, "name").unwrap();
    registry.finish_materialization(name.lid());

    registry.detach(&name);
    assert_eq!(registry.materialization(name.lid()), Materialization::Absent);
}
