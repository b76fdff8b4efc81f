//! Shared fixtures for store tests.

#![allow(dead_code)]

use fragkit_model::{DefaultValue, EntitySchema, FieldSchema, SchemaRegistry, TypeKey};
use fragkit_store::{DetachedFragmentPolicy, Record, Store, StoreConfig};
use fragkit_types::ResourceData;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

/// Installs a test-writer subscriber once. Filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// person { title, name, alias, address } with nested address.geo,
/// zoo { star: animal (polymorphic) } and ship { sword (defaulted) }.
pub fn make_schema() -> SchemaRegistry {
    SchemaRegistry::new()
        .with(
            EntitySchema::record("person")
                .with_field(FieldSchema::attribute("title"))
                .with_field(FieldSchema::fragment("name", "name"))
                .with_field(FieldSchema::fragment("alias", "name"))
                .with_field(FieldSchema::fragment("address", "address")),
        )
        .unwrap()
        .with(
            EntitySchema::fragment("name")
                .with_field(FieldSchema::attribute("first"))
                .with_field(FieldSchema::attribute("last"))
                .with_field(FieldSchema::owner("person")),
        )
        .unwrap()
        .with(
            EntitySchema::fragment("address")
                .with_field(FieldSchema::attribute("street"))
                .with_field(FieldSchema::fragment("geo", "geo")),
        )
        .unwrap()
        .with(
            EntitySchema::fragment("geo")
                .with_field(FieldSchema::attribute("lat"))
                .with_field(FieldSchema::attribute("lng")),
        )
        .unwrap()
        .with(
            EntitySchema::record("zoo")
                .with_field(FieldSchema::attribute("city"))
                .with_field(FieldSchema::fragment("star", "animal").polymorphic(TypeKey::field("type"))),
        )
        .unwrap()
        .with(EntitySchema::fragment("animal").with_field(FieldSchema::attribute("name")))
        .unwrap()
        .with(
            EntitySchema::fragment("lion")
                .with_field(FieldSchema::attribute("name"))
                .with_field(FieldSchema::attribute("roar")),
        )
        .unwrap()
        .with(
            EntitySchema::fragment("elephant")
                .with_field(FieldSchema::attribute("name"))
                .with_field(FieldSchema::attribute("trunk")),
        )
        .unwrap()
        .with(
            EntitySchema::record("ship")
                .with_field(FieldSchema::attribute("name"))
                .with_field(
                    FieldSchema::fragment("sword", "sword")
                        .with_default(DefaultValue::generator(|| json!({"name": "Longclaw"}))),
                ),
        )
        .unwrap()
        .with(EntitySchema::fragment("sword").with_field(FieldSchema::attribute("name")))
        .unwrap()
}

pub fn make_store() -> Store {
    init_tracing();
    Store::new(make_schema()).unwrap()
}

pub fn make_store_with(policy: DetachedFragmentPolicy) -> Store {
    init_tracing();
    let config = StoreConfig {
        detached_fragments: policy,
        ..StoreConfig::default()
    };
    Store::with_config(make_schema(), config).unwrap()
}

pub fn push(store: &mut Store, entity_type: &str, id: &str, attributes: Value) -> Record {
    store
        .push(ResourceData::from_attributes(entity_type, id, attributes).unwrap())
        .unwrap()
}

/// Loads person 1, Tyrion Lannister, with a nested address and geo.
pub fn load_tyrion(store: &mut Store) -> Record {
    push(
        store,
        "person",
        "1",
        json!({
            "title": "Hand",
            "name": {"first": "Tyrion", "last": "Lannister"},
            "address": {"street": "Tower", "geo": {"lat": 1, "lng": 2}}
        }),
    )
}
