use crate::{EntitySchema, FieldSchema, ModelError, ModelResult};
use fragkit_types::EntityKind;
use std::collections::HashMap;

/// The schema service: entity type name → declared schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, EntitySchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one entity type.
    pub fn register(&mut self, schema: EntitySchema) -> ModelResult<()> {
        schema.validate()?;
        if self.schemas.contains_key(&schema.entity_type) {
            return Err(ModelError::DuplicateEntityType(schema.entity_type));
        }
        self.schemas.insert(schema.entity_type.clone(), schema);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, schema: EntitySchema) -> ModelResult<Self> {
        self.register(schema)?;
        Ok(self)
    }

    pub fn schema(&self, entity_type: &str) -> Option<&EntitySchema> {
        self.schemas.get(entity_type)
    }

    pub fn contains(&self, entity_type: &str) -> bool {
        self.schemas.contains_key(entity_type)
    }

    pub fn kind_of(&self, entity_type: &str) -> Option<EntityKind> {
        self.schemas.get(entity_type).map(|s| s.kind)
    }

    /// Declared fields of `entity_type` in order; empty for unknown types.
    pub fn fields_of(&self, entity_type: &str) -> &[FieldSchema] {
        self.schemas
            .get(entity_type)
            .map(|s| s.fields.as_slice())
            .unwrap_or(&[])
    }

    pub fn field(&self, entity_type: &str, name: &str) -> Option<&FieldSchema> {
        self.schemas.get(entity_type).and_then(|s| s.field(name))
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Checks that every non-polymorphic fragment field names a registered
    /// fragment type.
    ///
    /// Polymorphic fields only need their declared base type to exist.
    pub fn validate_references(&self) -> ModelResult<()> {
        for schema in self.schemas.values() {
            for field in schema.fragment_fields() {
                let Some(fragment_type) = field.fragment_type() else {
                    continue;
                };
                match self.kind_of(fragment_type) {
                    Some(EntityKind::Fragment) => {}
                    Some(EntityKind::Record) => {
                        return Err(ModelError::NotAFragmentType {
                            entity_type: schema.entity_type.clone(),
                            field: field.name.clone(),
                            fragment_type: fragment_type.to_string(),
                        });
                    }
                    None => {
                        return Err(ModelError::UnknownFragmentType {
                            entity_type: schema.entity_type.clone(),
                            field: field.name.clone(),
                            fragment_type: fragment_type.to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
