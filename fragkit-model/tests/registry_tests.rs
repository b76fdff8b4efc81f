use fragkit_model::{EntitySchema, FieldSchema, ModelError, SchemaRegistry};
use fragkit_types::EntityKind;

fn make_registry() -> SchemaRegistry {
    SchemaRegistry::new()
        .with(
            EntitySchema::record("person")
                .with_field(FieldSchema::attribute("title"))
                .with_field(FieldSchema::fragment("name", "name")),
        )
        .unwrap()
        .with(
            EntitySchema::fragment("name")
                .with_field(FieldSchema::attribute("first"))
                .with_field(FieldSchema::attribute("last"))
                .with_field(FieldSchema::owner("person")),
        )
        .unwrap()
}

#[test]
fn registry_lookup() {
    let r = make_registry();
    assert_eq!(r.len(), 2);
    assert!(r.contains("person"));
    assert_eq!(r.kind_of("name"), Some(EntityKind::Fragment));
    assert_eq!(r.kind_of("ship"), None);
}

#[test]
fn fields_of_known_type() {
    let r = make_registry();
    let names: Vec<&str> = r.fields_of("name").iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["first", "last", "person"]);
}

#[test]
fn fields_of_unknown_type_is_empty() {
    assert!(make_registry().fields_of("ship").is_empty());
}

#[test]
fn field_lookup() {
    let r = make_registry();
    assert!(r.field("person", "name").unwrap().is_fragment());
    assert!(r.field("person", "nope").is_none());
    assert!(r.field("nope", "name").is_none());
}

#[test]
fn duplicate_registration_fails() {
    let mut r = make_registry();
    let err = r.register(EntitySchema::record("person")).unwrap_err();
    assert!(matches!(err, ModelError::DuplicateEntityType(t) if t == "person"));
}

#[test]
fn references_validate_when_complete() {
    assert!(make_registry().validate_references().is_ok());
}

#[test]
fn references_to_unknown_type_fail() {
    let r = SchemaRegistry::new()
        .with(EntitySchema::record("person").with_field(FieldSchema::fragment("name", "name")))
        .unwrap();
    assert!(matches!(
        r.validate_references(),
        Err(ModelError::UnknownFragmentType { .. })
    ));
}

#[test]
fn references_to_record_type_fail() {
    let r = SchemaRegistry::new()
        .with(EntitySchema::record("person").with_field(FieldSchema::fragment("boss", "person")))
        .unwrap();
    assert!(matches!(
        r.validate_references(),
        Err(ModelError::NotAFragmentType { .. })
    ));
}

#[test]
fn empty_registry() {
    let r = SchemaRegistry::new();
    assert!(r.is_empty());
    assert!(r.validate_references().is_ok());
}
