//! Declarative mapping between items and entities.
//!
//! [`ItemToEntityMapper`] builds entities from decoded items (reading a
//! dataset); [`EntityToItemMapper`] builds items from entities (writing a
//! dataset). Both are configured once per dataset and validated at
//! construction.
//!
//! # Configuration
//!
//! ```json
//! {
//!   "baseUri": "http://data.example.io/people/",
//!   "mapAll": false,
//!   "propertyMappings": [
//!     {"property": "id", "isIdentity": true, "urlValuePattern": "http://data.example.io/people/{value}"},
//!     {"property": "name", "entityProperty": "name", "required": true},
//!     {"property": "worksfor", "entityProperty": "worksfor", "isReference": true,
//!      "urlValuePattern": "http://data.example.io/companies/{value}"}
//!   ]
//! }
//! ```

mod incoming;
mod outgoing;
mod template;

pub use incoming::EntityToItemMapper;
pub use outgoing::ItemToEntityMapper;
pub use template::{UrlTemplate, expand, is_absolute, local_name, strip_prefix};

use crate::models::Value;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Reference emitted for `defaultType`.
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// Item to entity mapping for one dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMappingConfig {
    /// Prefix for short entity property names.
    #[serde(default)]
    pub base_uri: String,
    /// Explicit mappings, applied in order.
    #[serde(default)]
    pub property_mappings: Vec<ItemToEntityMapping>,
    /// Copy every unmapped item field as `base_uri + name`.
    #[serde(default)]
    pub map_all: bool,
    /// Type reference added to every entity.
    #[serde(default)]
    pub default_type: Option<String>,
}

/// One item field to entity rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemToEntityMapping {
    /// Source item field.
    pub property: String,
    /// Target property or reference name.
    #[serde(default)]
    pub entity_property: Option<String>,
    /// Produces the entity identifier.
    #[serde(default)]
    pub is_identity: bool,
    /// Produces a reference instead of a literal.
    #[serde(default)]
    pub is_reference: bool,
    /// Truthy values mark the entity deleted.
    #[serde(default)]
    pub is_deleted: bool,
    /// Integer values set the recorded timestamp.
    #[serde(default)]
    pub is_recorded: bool,
    /// An absent value fails the record.
    #[serde(default)]
    pub required: bool,
    /// Template with a `{value}` placeholder.
    #[serde(default)]
    pub url_value_pattern: Option<String>,
    /// Coerce the value (`int`, `float`, `bool`, `string`).
    #[serde(default)]
    pub datatype: Option<String>,
}

/// Entity to item mapping for one dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingMappingConfig {
    /// Prefix used to resolve short names.
    #[serde(default)]
    pub base_uri: String,
    /// Explicit mappings, applied in order.
    #[serde(default)]
    pub property_mappings: Vec<EntityToItemMapping>,
    /// Without explicit mappings, copy properties whose local name the
    /// target item accepts.
    #[serde(default)]
    pub map_named: bool,
}

/// One entity to item field rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityToItemMapping {
    /// Target item field.
    pub property: String,
    /// Source property or reference name.
    #[serde(default)]
    pub entity_property: Option<String>,
    /// Copy the entity identifier.
    #[serde(default)]
    pub is_identity: bool,
    /// Read from references instead of properties.
    #[serde(default)]
    pub is_reference: bool,
    /// Copy the deleted flag.
    #[serde(default)]
    pub is_deleted: bool,
    /// Copy the recorded timestamp.
    #[serde(default)]
    pub is_recorded: bool,
    /// An absent value without default fails the record.
    #[serde(default)]
    pub required: bool,
    /// Reduce URIs to their last path segment.
    #[serde(default)]
    pub strip_reference_prefix: bool,
    /// Used when the entity lacks the property.
    #[serde(default)]
    pub default_value: Option<serde_json::Value>,
    /// Coerce the value (`int`, `float`, `bool`, `string`).
    #[serde(default)]
    pub datatype: Option<String>,
}

/// Target of a `datatype` coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Datatype {
    /// 64-bit integer.
    Integer,
    /// 64-bit float.
    Float,
    /// Boolean.
    Boolean,
    /// Text.
    String,
}

impl Datatype {
    /// Parses a datatype name.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unknown names.
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "int" | "integer" | "long" => Ok(Self::Integer),
            "float" | "double" | "decimal" => Ok(Self::Float),
            "bool" | "boolean" => Ok(Self::Boolean),
            "string" | "text" => Ok(Self::String),
            other => Err(Error::Configuration(format!("unknown datatype: {other}"))),
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "int",
            Self::Float => "float",
            Self::Boolean => "bool",
            Self::String => "string",
        }
    }

    /// Converts `value`, element-wise for sequences.
    ///
    /// # Errors
    ///
    /// Returns a type conversion error naming `field` when the value cannot
    /// be represented.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn coerce(self, field: &str, value: &Value) -> Result<Value> {
        let fail = || Error::TypeConversion {
            field: field.to_string(),
            expected: self.as_str().to_string(),
            actual: value.to_string(),
        };
        match (self, value) {
            (_, Value::Null) => Ok(Value::Null),
            (_, Value::Sequence(values)) => values
                .iter()
                .map(|v| self.coerce(field, v))
                .collect::<Result<Vec<_>>>()
                .map(Value::Sequence),
            (Self::String, v) => Ok(Value::String(v.as_text())),
            (Self::Integer, Value::Integer(i)) => Ok(Value::Integer(*i)),
            (Self::Integer, Value::Float(f)) if f.is_finite() => Ok(Value::Integer(f.trunc() as i64)),
            (Self::Integer, Value::Boolean(b)) => Ok(Value::Integer(i64::from(*b))),
            (Self::Integer, Value::String(s)) => {
                s.trim().parse().map(Value::Integer).map_err(|_| fail())
            },
            (Self::Float, Value::Float(f)) => Ok(Value::Float(*f)),
            (Self::Float, Value::Integer(i)) => Ok(Value::Float(*i as f64)),
            (Self::Float, Value::String(s)) => s.trim().parse().map(Value::Float).map_err(|_| fail()),
            (Self::Boolean, Value::Boolean(b)) => Ok(Value::Boolean(*b)),
            (Self::Boolean, Value::Integer(i)) => Ok(Value::Boolean(*i != 0)),
            (Self::Boolean, Value::String(s)) => match s.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(Value::Boolean(true)),
                "false" | "0" | "no" | "" => Ok(Value::Boolean(false)),
                _ => Err(fail()),
            },
            _ => Err(fail()),
        }
    }
}

pub(crate) fn parse_datatype(datatype: Option<&str>) -> Result<Option<Datatype>> {
    datatype.map(Datatype::parse).transpose()
}
