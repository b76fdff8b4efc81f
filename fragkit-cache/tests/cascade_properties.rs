//! Property tests for cascaded writes through a chain of fragments.
//!
//! - Placement: every level of a pushed payload lands at its derived lid.
//! - Consistency: after any write, each owner's snapshot agrees with the
//!   fragment stored under it, at every depth.

use fragkit_cache::CascadingCache;
use fragkit_model::{EntitySchema, FieldSchema, SchemaRegistry};
use fragkit_types::{Attributes, IdentityDescriptor, StableIdentifier};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use serde_json::{Value, json};
use std::sync::Arc;

const DEPTH: usize = 5;

fn level_type(depth: usize) -> String {
    format!("level{depth}")
}

/// `root → level1 → … → level5`, each level with a value and a child.
fn make_schema() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    registry
        .register(EntitySchema::record("root").with_field(FieldSchema::fragment("child", &level_type(1))))
        .unwrap();
    for depth in 1..=DEPTH {
        let mut schema = EntitySchema::fragment(level_type(depth))
            .with_field(FieldSchema::attribute("value"))
            .with_field(FieldSchema::attribute("label"));
        if depth < DEPTH {
            schema = schema.with_field(FieldSchema::fragment("child", &level_type(depth + 1)));
        }
        registry.register(schema).unwrap();
    }
    registry
}

/// Nests `levels` innermost-last under `child` keys.
fn nest(levels: &[Value]) -> Value {
    levels.iter().rev().fold(Value::Null, |inner, level| {
        let mut object = level.as_object().cloned().unwrap_or_default();
        if !inner.is_null() {
            object.insert("child".to_string(), inner);
        }
        Value::Object(object)
    })
}

fn payload(levels: &[Value]) -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert("child".to_string(), nest(levels));
    attributes
}

fn make_loaded(levels: &[Value]) -> (CascadingCache, StableIdentifier) {
    let mut cache = CascadingCache::new(Arc::new(make_schema()));
    let root = cache
        .identifiers_mut()
        .get_or_create(&IdentityDescriptor::with_id("root", "1"));
    cache.upsert(&root, Some(payload(levels)), false);
    (cache, root)
}

/// The fragment identities from level1 down, as far as populated slots reach.
fn chain(cache: &mut CascadingCache, root: &StableIdentifier) -> Vec<StableIdentifier> {
    let mut identities = Vec::new();
    let mut owner = root.clone();
    while cache.get_attr(&owner, "child").is_some_and(|v| v.is_object()) {
        let Some(child) = cache.fragment_identity(&owner, "child") else {
            break;
        };
        identities.push(child.clone());
        owner = child;
    }
    identities
}

/// Each owner's `child` snapshot carries the same stored values as the
/// fragment under it.
fn check_snapshots(cache: &mut CascadingCache, root: &StableIdentifier) -> Result<(), TestCaseError> {
    let mut owner = root.clone();
    for child in chain(cache, root) {
        let snapshot = cache.get_attr(&owner, "child").unwrap_or(Value::Null);
        for key in ["value", "label", "child"] {
            prop_assert_eq!(snapshot.get(key).cloned(), cache.get_attr(&child, key), "{}.{}", child, key);
        }
        owner = child;
    }
    Ok(())
}

fn level_strategy() -> impl Strategy<Value = Value> {
    (0u64..1000, prop::option::of("[a-z]{1,8}")).prop_map(|(value, label)| match label {
        Some(label) => json!({"value": value, "label": label}),
        None => json!({"value": value}),
    })
}

fn levels_strategy() -> impl Strategy<Value = Vec<Value>> {
    prop::collection::vec(level_strategy(), 1..=DEPTH)
}

/// A sparse rewrite: each level either sets a new label or leaves it out.
fn partial_strategy() -> impl Strategy<Value = Vec<Value>> {
    prop::collection::vec(prop::option::of("[A-Z]{1,8}"), 1..=DEPTH).prop_map(|labels| {
        labels
            .into_iter()
            .map(|label| match label {
                Some(label) => json!({"label": label}),
                None => json!({}),
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn pushed_levels_land_at_derived_lids(levels in levels_strategy()) {
        let (mut cache, root) = make_loaded(&levels);
        let identities = chain(&mut cache, &root);
        prop_assert_eq!(identities.len(), levels.len());

        let mut expected_lid = root.lid().as_str().to_string();
        for (depth, (identity, level)) in identities.iter().zip(&levels).enumerate() {
            expected_lid.push_str(":child");
            prop_assert_eq!(identity.lid().as_str(), expected_lid.as_str());
            let expected_type = level_type(depth + 1);
            prop_assert_eq!(identity.entity_type(), expected_type.as_str());
            prop_assert_eq!(cache.get_attr(identity, "value"), level.get("value").cloned());
        }
        prop_assert!(!cache.has_changed_attrs(&root));
        check_snapshots(&mut cache, &root)?;
    }

    #[test]
    fn partial_local_write_keeps_snapshots_consistent(
        levels in levels_strategy(),
        rewrite in partial_strategy(),
    ) {
        let (mut cache, root) = make_loaded(&levels);
        let before = chain(&mut cache, &root);

        cache.set_attr(&root, "child", nest(&rewrite));
        check_snapshots(&mut cache, &root)?;

        let after = chain(&mut cache, &root);
        for (old, new) in before.iter().zip(&after) {
            prop_assert!(old.same(new));
        }
        for (identity, level) in after.iter().zip(&levels) {
            prop_assert_eq!(cache.get_attr(identity, "value"), level.get("value").cloned());
        }
    }

    #[test]
    fn partial_push_keeps_snapshots_consistent(
        levels in levels_strategy(),
        rewrite in partial_strategy(),
    ) {
        let (mut cache, root) = make_loaded(&levels);

        cache.upsert(&root, Some(payload(&rewrite)), true);
        check_snapshots(&mut cache, &root)?;
        prop_assert!(!cache.has_changed_attrs(&root));

        for (identity, level) in chain(&mut cache, &root).iter().zip(&levels) {
            prop_assert_eq!(cache.get_attr(identity, "value"), level.get("value").cloned());
        }
    }
}
