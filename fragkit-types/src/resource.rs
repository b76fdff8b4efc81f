//! Resource documents exchanged with the attribute cache.
//!
//! A push carries a `ResourceDocument` whose `data` member describes one
//! resource; commit responses carry the same `ResourceData` shape. Fragment
//! values travel as plain JSON objects nested inside `attributes`.

use crate::{Error, IdentityDescriptor, Lid, Result};
use serde::{Deserialize, Serialize};

/// A resource's attribute map.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// One resource as found under a document's `data` member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceData {
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lid: Option<Lid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Attributes>,
}

impl ResourceData {
    /// Creates a resource with an id and attributes.
    pub fn new(entity_type: impl Into<String>, id: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: Some(id.into()),
            lid: None,
            attributes: Some(attributes),
        }
    }

    /// Builds a resource from a JSON object value of attributes.
    ///
    /// Non-object values are rejected.
    pub fn from_attributes(
        entity_type: impl Into<String>,
        id: impl Into<String>,
        attributes: serde_json::Value,
    ) -> Result<Self> {
        match attributes {
            serde_json::Value::Object(map) => Ok(Self::new(entity_type, id, map)),
            other => Err(Error::InvalidDocument(format!(
                "attributes must be an object, got {other}"
            ))),
        }
    }

    /// The identity descriptor this resource addresses.
    pub fn descriptor(&self) -> IdentityDescriptor {
        IdentityDescriptor {
            entity_type: self.entity_type.clone(),
            id: self.id.clone(),
            lid: self.lid.clone(),
        }
    }

    /// Returns true if `attributes` contains `field`.
    pub fn has_attribute(&self, field: &str) -> bool {
        self.attributes
            .as_ref()
            .is_some_and(|attrs| attrs.contains_key(field))
    }
}

/// A single-resource document (`{"data": {...}}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDocument {
    pub data: ResourceData,
}

impl ResourceDocument {
    /// Parses a document from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parses a document from an already-decoded JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

/// A validation error reported by the server for one attribute path.
///
/// `attribute` is a dotted path; `"name.first"` targets the `first`
/// attribute of the fragment stored under `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub attribute: String,
    pub message: String,
}

impl FieldError {
    pub fn new(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            message: message.into(),
        }
    }

    /// The first path segment, i.e. the field on the entity receiving the error.
    pub fn field(&self) -> &str {
        self.attribute
            .split_once('.')
            .map_or(self.attribute.as_str(), |(head, _)| head)
    }

    /// Re-roots this error under the fragment stored at `field`.
    ///
    /// Returns `None` when the error does not point inside that fragment.
    pub fn nested_under(&self, field: &str) -> Option<FieldError> {
        let rest = self.attribute.strip_prefix(field)?.strip_prefix('.')?;
        Some(FieldError::new(rest, self.message.clone()))
    }
}
