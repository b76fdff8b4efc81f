use crate::{ModelError, ModelResult};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// A declared default value for a field.
///
/// Literal defaults must be primitives (or null). Objects and arrays are
/// only accepted from a generator, which is invoked once per read so that
/// no two records ever share one mutable default.
#[derive(Clone)]
pub enum DefaultValue {
    Literal(Value),
    Generator(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl DefaultValue {
    /// A literal default. Fails for objects and arrays.
    pub fn literal(value: Value) -> ModelResult<Self> {
        if is_shared_structure(&value) {
            return Err(ModelError::UnsupportedDefaultValue(value.to_string()));
        }
        Ok(DefaultValue::Literal(value))
    }

    /// A default produced by calling `f` for every record that needs one.
    pub fn generator<F>(f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        DefaultValue::Generator(Arc::new(f))
    }

    /// Produces the default for one read.
    pub fn compute(&self) -> Value {
        match self {
            DefaultValue::Literal(value) => value.clone(),
            DefaultValue::Generator(generate) => generate(),
        }
    }

    /// True if a literal default holds a structure that would be shared.
    pub(crate) fn is_unsupported(&self) -> bool {
        match self {
            DefaultValue::Literal(value) => is_shared_structure(value),
            DefaultValue::Generator(_) => false,
        }
    }
}

fn is_shared_structure(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            DefaultValue::Generator(_) => f.write_str("Generator(..)"),
        }
    }
}

/// Where a polymorphic fragment field finds the concrete fragment type.
#[derive(Clone)]
pub enum TypeKey {
    /// Read the type name from this member of the fragment's snapshot.
    Field(String),
    /// Compute the type name from the snapshot.
    Dynamic(Arc<dyn Fn(&Value) -> Option<String> + Send + Sync>),
}

impl TypeKey {
    pub fn field(name: impl Into<String>) -> Self {
        TypeKey::Field(name.into())
    }

    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Option<String> + Send + Sync + 'static,
    {
        TypeKey::Dynamic(Arc::new(f))
    }

    /// Resolves the concrete type named by `snapshot`, if any.
    pub fn resolve(&self, snapshot: &Value) -> Option<String> {
        match self {
            TypeKey::Field(key) => snapshot.get(key).and_then(Value::as_str).map(str::to_string),
            TypeKey::Dynamic(resolve) => resolve(snapshot),
        }
    }

    /// The tag used in meta type names.
    pub(crate) fn tag(&self) -> &str {
        match self {
            TypeKey::Field(key) => key,
            TypeKey::Dynamic(_) => "__dynamic__",
        }
    }
}

impl Default for TypeKey {
    fn default() -> Self {
        TypeKey::Field("type".to_string())
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKey::Field(key) => f.debug_tuple("Field").field(key).finish(),
            TypeKey::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}
