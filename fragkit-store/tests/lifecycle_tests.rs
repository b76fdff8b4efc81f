mod common;

use common::{load_tyrion, make_schema, make_store, push};
use fragkit_model::{DefaultValue, EntitySchema, FieldSchema, ModelError, SchemaRegistry};
use fragkit_store::{DetachedFragmentPolicy, LifecycleState, Store, StoreConfig, StoreError};
use fragkit_types::{FieldError, ResourceData};
use pretty_assertions::assert_eq;
use serde_json::json;

// ── Unload ───────────────────────────────────────────────────────

#[test]
fn unload_destroys_every_nested_instance() {
    let mut store = make_store();
    let person = load_tyrion(&mut store);
    let name = store.fragment(&person, "name").unwrap().unwrap();
    let address = store.fragment(&person, "address").unwrap().unwrap();
    let geo = store.fragment(&address, "geo").unwrap().unwrap();
    assert_eq!(store.instance_count(), 4);

    store.unload_record(&person);

    for record in [&person, &name, &address, &geo] {
        assert_eq!(record.state(), LifecycleState::Destroyed);
    }
    assert_eq!(store.instance_count(), 0);
    assert!(!store.cache().has_resource(&geo.identity()));
    assert!(store.peek_record("person", "1").is_none());
}

#[test]
fn destroyed_records_read_nothing_and_reject_writes() {
    let mut store = make_store();
    let person = load_tyrion(&mut store);
    let name = store.fragment(&person, "name").unwrap().unwrap();
    store.unload_record(&person);

    assert_eq!(store.attr(&person, "title").unwrap(), None);
    assert!(store.fragment(&person, "name").unwrap().is_none());
    assert!(matches!(
        store.set_attr(&name, "first", json!("Imp")),
        Err(StoreError::RecordDestroyed(_))
    ));
    assert!(matches!(
        store.set_fragment(&person, "name", json!(null)),
        Err(StoreError::RecordDestroyed(_))
    ));
}

#[test]
fn reloading_after_unload_gives_new_instance() {
    let mut store = make_store();
    let person = load_tyrion(&mut store);
    store.unload_record(&person);

    let again = load_tyrion(&mut store);
    assert!(!again.same(&person));
    assert!(again.is_live());
    assert_eq!(store.peek_record("person", "1"), Some(again));
}

// ── Save ─────────────────────────────────────────────────────────

#[test]
fn save_promotes_nested_state_and_assigns_id() {
    let mut store = make_store();
    let person = store
        .create_record(
            "person",
            json!({"title": "Lord", "name": {"first": "Balon", "last": "Greyjoy"}}),
        )
        .unwrap();
    assert!(store.is_new(&person));
    assert_eq!(person.id(), None);

    store.will_commit(&person);
    assert!(store.has_dirty_attributes(&person));
    store.did_commit(
        &person,
        Some(ResourceData::from_attributes("person", "7", json!({})).unwrap()),
    );

    assert!(!store.is_new(&person));
    assert!(!store.has_dirty_attributes(&person));
    assert_eq!(person.id(), Some("7".to_string()));
    assert_eq!(store.peek_record("person", "7"), Some(person.clone()));

    let name = store.fragment(&person, "name").unwrap().unwrap();
    assert!(!store.is_new(&name));
    assert!(!store.has_dirty_attributes(&name));
    assert_eq!(store.attr(&name, "first").unwrap(), Some(json!("Balon")));
}

#[test]
fn save_response_overrides_sent_fragment() {
    let mut store = make_store();
    let person = load_tyrion(&mut store);
    let name = store.fragment(&person, "name").unwrap().unwrap();
    store.set_attr(&name, "first", json!("Imp")).unwrap();

    store.will_commit(&person);
    store.did_commit(
        &person,
        Some(
            ResourceData::from_attributes(
                "person",
                "1",
                json!({"name": {"first": "The Imp", "last": "Lannister"}}),
            )
            .unwrap(),
        ),
    );

    assert!(!store.has_dirty_attributes(&person));
    assert_eq!(store.attr(&name, "first").unwrap(), Some(json!("The Imp")));
}

#[test]
fn rejected_save_keeps_changes_and_routes_errors() {
    let mut store = make_store();
    let person = store
        .create_record("person", json!({"name": {"first": "Balon", "last": "Greyjoy"}}))
        .unwrap();
    store.will_commit(&person);
    store.commit_was_rejected(&person, vec![FieldError::new("name.last", "is taken")]);

    assert!(store.has_dirty_attributes(&person));
    assert!(store.changed_attributes(&person).contains_key("name"));
    let name = store.fragment(&person, "name").unwrap().unwrap();
    assert_eq!(store.errors(&name), vec![FieldError::new("last", "is taken")]);
    assert_eq!(store.errors(&person), vec![FieldError::new("name.last", "is taken")]);
}

// ── Rollback ─────────────────────────────────────────────────────

#[test]
fn rollback_of_new_record_unloads_it() {
    let mut store = make_store();
    let person = store
        .create_record("person", json!({"name": {"first": "Balon", "last": "Greyjoy"}}))
        .unwrap();
    let name = store.fragment(&person, "name").unwrap().unwrap();

    assert!(store.rollback_attributes(&person).is_empty());
    assert!(person.is_destroyed());
    assert!(name.is_destroyed());
    assert_eq!(store.instance_count(), 0);
}

#[test]
fn rollback_restores_fragment_values() {
    let mut store = make_store();
    let person = load_tyrion(&mut store);
    let name = store.fragment(&person, "name").unwrap().unwrap();
    store
        .set_fragment(&person, "name", json!({"first": "Jaime", "last": "Lannister"}))
        .unwrap();
    store.set_attr(&person, "title", json!("Kingslayer")).unwrap();

    let mut rolled_back = store.rollback_attributes(&person);
    rolled_back.sort();
    assert_eq!(rolled_back, vec!["name".to_string(), "title".to_string()]);
    assert!(name.is_live());
    assert_eq!(store.attr(&name, "first").unwrap(), Some(json!("Tyrion")));
    assert!(!store.has_dirty_attributes(&person));
}

// ── Deletion ─────────────────────────────────────────────────────

#[test]
fn deletion_is_dirty_until_rolled_back() {
    let mut store = make_store();
    let person = load_tyrion(&mut store);
    store.delete_record(&person).unwrap();
    assert!(store.is_deleted(&person));
    assert!(store.has_dirty_attributes(&person));

    store.rollback_attributes(&person);
    assert!(!store.is_deleted(&person));
    assert!(!store.has_dirty_attributes(&person));
}

#[test]
fn committed_deletion_unloads_record() {
    let mut store = make_store();
    let person = load_tyrion(&mut store);
    let name = store.fragment(&person, "name").unwrap().unwrap();
    store.delete_record(&person).unwrap();
    store.will_commit(&person);
    store.did_commit(&person, None);

    assert!(person.is_destroyed());
    assert!(name.is_destroyed());
    assert!(store.peek_record("person", "1").is_none());
}

// ── Loading and creating ─────────────────────────────────────────

#[test]
fn push_returns_same_instance_for_same_identity() {
    let mut store = make_store();
    let first = load_tyrion(&mut store);
    let second = push(&mut store, "person", "1", json!({"title": "Lord"}));

    assert_eq!(first, second);
    assert_eq!(store.attr(&first, "title").unwrap(), Some(json!("Lord")));
    assert_eq!(store.peek_record("person", "1"), Some(first));
}

#[test]
fn push_document_loads_record() {
    let mut store = make_store();
    let person = store
        .push_document(&json!({
            "data": {
                "type": "person",
                "id": "3",
                "attributes": {"name": {"first": "Sansa", "last": "Stark"}}
            }
        }))
        .unwrap();

    let name = store.fragment(&person, "name").unwrap().unwrap();
    assert_eq!(store.attr(&name, "first").unwrap(), Some(json!("Sansa")));
    assert!(matches!(
        store.push_document(&json!({"data": 3})),
        Err(StoreError::Types(_))
    ));
}

#[test]
fn loading_and_creating_check_entity_kinds() {
    let mut store = make_store();
    assert!(matches!(
        store.push(ResourceData::from_attributes("name", "1", json!({})).unwrap()),
        Err(StoreError::WrongEntityKind { .. })
    ));
    assert!(matches!(
        store.create_record("name", json!({})),
        Err(StoreError::WrongEntityKind { .. })
    ));
    assert!(matches!(
        store.create_fragment("person", json!({})),
        Err(StoreError::WrongEntityKind { .. })
    ));
    assert!(matches!(
        store.create_record("dragon", json!({})),
        Err(StoreError::UnknownEntityType(_))
    ));
    assert_eq!(store.instance_count(), 0);
}

#[test]
fn create_validates_properties_before_writing() {
    let mut store = make_store();
    assert!(matches!(
        store.create_record("person", json!({"name": 42})),
        Err(StoreError::Validation(_))
    ));
    assert!(matches!(
        store.create_record("person", json!({"nickname": "Imp"})),
        Err(StoreError::UnknownField { .. })
    ));
    assert!(matches!(
        store.create_record("person", json!("Tyrion")),
        Err(StoreError::Validation(_))
    ));
    assert_eq!(store.instance_count(), 0);
    assert!(store.cache().base().is_empty());
}

#[test]
fn create_with_null_fragment_has_no_instance() {
    let mut store = make_store();
    let person = store.create_record("person", json!({"name": null})).unwrap();
    assert!(store.fragment(&person, "name").unwrap().is_none());
    assert!(store.has_dirty_attributes(&person));
}

#[test]
fn generated_defaults_are_independent() {
    let mut store = make_store();
    let first = store.create_record("ship", json!({"name": "Black Betha"})).unwrap();
    let second = store.create_record("ship", json!({"name": "Fury"})).unwrap();

    let first_sword = store.fragment(&first, "sword").unwrap().unwrap();
    let second_sword = store.fragment(&second, "sword").unwrap().unwrap();
    assert!(!first_sword.same(&second_sword));
    assert_eq!(store.attr(&first_sword, "name").unwrap(), Some(json!("Longclaw")));

    store.set_attr(&first_sword, "name", json!("Ice")).unwrap();
    assert_eq!(store.attr(&second_sword, "name").unwrap(), Some(json!("Longclaw")));
    assert_eq!(store.attr(&first, "sword").unwrap(), Some(json!({"name": "Ice"})));
}

#[test]
fn default_fragment_survives_save() {
    let mut store = make_store();
    let ship = store.create_record("ship", json!({})).unwrap();
    store.will_commit(&ship);
    store.did_commit(&ship, None);

    let sword = store.fragment(&ship, "sword").unwrap().unwrap();
    assert!(!store.is_new(&sword));
    assert!(!store.has_dirty_attributes(&ship));
}

// ── Configuration and schema errors ──────────────────────────────

#[test]
fn config_from_json_fills_defaults() {
    let config = StoreConfig::from_json(r#"{"detached_fragments": "retain"}"#).unwrap();
    assert_eq!(config.detached_fragments, DetachedFragmentPolicy::Retain);
    assert_eq!(config.lid_prefix, StoreConfig::default().lid_prefix);

    assert!(matches!(
        StoreConfig::from_json(r#"{"detached_fragments": "forget"}"#),
        Err(StoreError::Serialization(_))
    ));
}

#[test]
fn lid_prefix_applies_to_new_records() {
    let config = StoreConfig {
        lid_prefix: "tmp-".to_string(),
        ..StoreConfig::default()
    };
    let mut store = Store::with_config(make_schema(), config).unwrap();
    let person = store.create_record("person", json!({})).unwrap();
    assert!(person.lid().as_str().starts_with("tmp-"));
}

#[test]
fn object_literal_default_is_unsupported() {
    let err: StoreError = DefaultValue::literal(json!({"name": "Longclaw"}))
        .unwrap_err()
        .into();
    assert!(matches!(
        err,
        StoreError::Model(ModelError::UnsupportedDefaultValue(_))
    ));
}

#[test]
fn store_rejects_unknown_fragment_type() {
    let schema = SchemaRegistry::new()
        .with(EntitySchema::record("cart").with_field(FieldSchema::fragment("wheel", "wheel")))
        .unwrap();
    assert!(matches!(
        Store::new(schema),
        Err(StoreError::Model(ModelError::UnknownFragmentType { .. }))
    ));
}
