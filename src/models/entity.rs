//! Graph entity types.
//!
//! An [`Entity`] is an identified node with literal properties and typed
//! references to other nodes. Property and reference keys are URIs (or
//! short names when the dataset strips prefixes upstream).
//!
//! # Example
//!
//! ```rust
//! use datalayer::models::{Entity, EntityRef, Value};
//!
//! let mut entity = Entity::new("http://data.example.io/people/1");
//! entity.set_property("http://data.example.io/people/name", Value::from("Ada"));
//! entity.set_reference(
//!     "http://data.example.io/people/worksfor",
//!     EntityRef::One("http://data.example.io/companies/acme".to_string()),
//! );
//! assert_eq!(entity.references.len(), 1);
//! ```

use super::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A reference value: one target URI or an ordered list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityRef {
    /// Single target.
    One(String),
    /// Ordered targets.
    Many(Vec<String>),
}

impl EntityRef {
    /// Returns the targets as a slice-like vector of string slices.
    #[must_use]
    pub fn targets(&self) -> Vec<&str> {
        match self {
            Self::One(target) => vec![target.as_str()],
            Self::Many(targets) => targets.iter().map(String::as_str).collect(),
        }
    }
}

/// A node in the entity graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Entity identifier, usually a URI built from a template.
    pub id: String,
    /// Recorded timestamp (nanoseconds) assigned by the owning store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded: Option<u64>,
    /// Whether the entity is a deletion marker.
    #[serde(default)]
    pub deleted: bool,
    /// Literal properties keyed by property URI.
    #[serde(default, rename = "props")]
    pub properties: BTreeMap<String, Value>,
    /// References keyed by reference URI.
    #[serde(default, rename = "refs")]
    pub references: BTreeMap<String, EntityRef>,
}

impl Entity {
    /// Creates an entity with the given identifier and no properties.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Sets a literal property.
    pub fn set_property(&mut self, key: impl Into<String>, value: Value) {
        self.properties.insert(key.into(), value);
    }

    /// Sets a reference.
    pub fn set_reference(&mut self, key: impl Into<String>, target: EntityRef) {
        self.references.insert(key.into(), target);
    }
}
