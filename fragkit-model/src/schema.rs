use crate::{DefaultValue, ModelError, ModelResult, TypeKey};
use fragkit_types::EntityKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Describes an entity type: its kind and its fields in declaration order.
#[derive(Debug, Clone)]
pub struct EntitySchema {
    pub entity_type: String,
    pub kind: EntityKind,
    pub fields: Vec<FieldSchema>,
}

impl EntitySchema {
    /// Schema for a top-level record type.
    pub fn record(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            kind: EntityKind::Record,
            fields: Vec::new(),
        }
    }

    /// Schema for a fragment type.
    pub fn fragment(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            kind: EntityKind::Fragment,
            fields: Vec::new(),
        }
    }

    /// Appends a field declaration.
    pub fn with_field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields declared as fragments, in declaration order.
    pub fn fragment_fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields.iter().filter(|f| f.is_fragment())
    }

    /// Fields that hold stored data (attributes and fragments), in order.
    pub fn stored_fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields.iter().filter(|f| f.kind.is_stored())
    }

    /// Checks the declaration on its own, without looking at other types.
    pub fn validate(&self) -> ModelResult<()> {
        for (i, field) in self.fields.iter().enumerate() {
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(ModelError::DuplicateField {
                    entity_type: self.entity_type.clone(),
                    field: field.name.clone(),
                });
            }
            if field.kind == FieldKind::Fragment && field.field_type.is_none() {
                return Err(ModelError::MissingFragmentType {
                    entity_type: self.entity_type.clone(),
                    field: field.name.clone(),
                });
            }
            if field
                .options
                .default_value
                .as_ref()
                .is_some_and(DefaultValue::is_unsupported)
            {
                return Err(ModelError::UnsupportedDefaultValue(format!(
                    "{}.{}",
                    self.entity_type, field.name
                )));
            }
        }
        Ok(())
    }
}

/// What a declared field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// A plain value.
    Attribute,
    /// A nested fragment stored as an embedded snapshot.
    Fragment,
    /// Read-only back-reference from a fragment to its current owner.
    Owner,
}

impl FieldKind {
    /// Whether values of this kind live in the attribute cache.
    pub fn is_stored(self) -> bool {
        matches!(self, FieldKind::Attribute | FieldKind::Fragment)
    }
}

/// Options attached to a field declaration.
#[derive(Debug, Clone, Default)]
pub struct FieldOptions {
    pub default_value: Option<DefaultValue>,
    pub polymorphic: bool,
    pub type_key: Option<TypeKey>,
}

/// One declared field.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    pub name: String,
    pub kind: FieldKind,
    /// Value transform for attributes (e.g. `"string"`), fragment type for fragments.
    pub field_type: Option<String>,
    pub options: FieldOptions,
}

impl FieldSchema {
    fn simple(name: &str, kind: FieldKind, field_type: Option<&str>) -> Self {
        Self {
            name: name.into(),
            kind,
            field_type: field_type.map(Into::into),
            options: FieldOptions::default(),
        }
    }

    /// Shorthand for an untyped attribute.
    pub fn attribute(name: &str) -> Self {
        Self::simple(name, FieldKind::Attribute, None)
    }

    /// Shorthand for an attribute with a value type tag.
    pub fn typed_attribute(name: &str, value_type: &str) -> Self {
        Self::simple(name, FieldKind::Attribute, Some(value_type))
    }

    /// Shorthand for a fragment field of `fragment_type`.
    pub fn fragment(name: &str, fragment_type: &str) -> Self {
        Self::simple(name, FieldKind::Fragment, Some(fragment_type))
    }

    /// Shorthand for a read-only owner back-reference.
    pub fn owner(name: &str) -> Self {
        Self::simple(name, FieldKind::Owner, None)
    }

    /// Sets the default value.
    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.options.default_value = Some(default);
        self
    }

    /// Marks the fragment field polymorphic, resolving its type via `type_key`.
    pub fn polymorphic(mut self, type_key: TypeKey) -> Self {
        self.options.polymorphic = true;
        self.options.type_key = Some(type_key);
        self
    }

    pub fn is_fragment(&self) -> bool {
        self.kind == FieldKind::Fragment
    }

    /// The declared fragment type, for fragment fields.
    pub fn fragment_type(&self) -> Option<&str> {
        match self.kind {
            FieldKind::Fragment => self.field_type.as_deref(),
            FieldKind::Attribute | FieldKind::Owner => None,
        }
    }

    pub fn has_default(&self) -> bool {
        self.options.default_value.is_some()
    }

    /// Computes this field's default, if one is declared.
    pub fn default_value(&self) -> Option<Value> {
        self.options.default_value.as_ref().map(DefaultValue::compute)
    }

    /// For polymorphic fragment fields, the concrete type named by `snapshot`.
    pub fn polymorphic_type(&self, snapshot: Option<&Value>) -> Option<String> {
        if !self.options.polymorphic {
            return None;
        }
        let snapshot = snapshot.filter(|v| v.is_object())?;
        match &self.options.type_key {
            Some(key) => key.resolve(snapshot),
            None => TypeKey::default().resolve(snapshot),
        }
    }

    /// Diagnostic tag: `-mf-{kind}$type[$typeKey]`.
    pub fn meta_type(&self) -> String {
        let kind = match self.kind {
            FieldKind::Attribute => "attribute",
            FieldKind::Fragment => "fragment",
            FieldKind::Owner => "owner",
        };
        let mut meta = format!("-mf-{kind}");
        if let Some(ty) = &self.field_type {
            meta.push('$');
            meta.push_str(ty);
        }
        if self.options.polymorphic {
            meta.push('$');
            match &self.options.type_key {
                Some(key) => meta.push_str(key.tag()),
                None => meta.push_str("type"),
            }
        }
        meta
    }
}
