//! Loosely typed per-dataset source configuration.
//!
//! Datasets describe their storage representation with a flat key/value map
//! (`encoding`, `columns`, `fields`, `schema`, ...). Each codec reads the keys
//! it needs through the typed accessors here and turns them into its own
//! configuration struct once, at construction.

use crate::io::formats::Encoding;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// A dataset's source configuration.
///
/// Accessors return `Ok(None)` when a key is absent and
/// [`Error::Configuration`] when it is present but malformed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceConfig {
    values: Map<String, JsonValue>,
}

impl SourceConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a JSON object.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is not an object.
    pub fn from_json(value: JsonValue) -> Result<Self> {
        match value {
            JsonValue::Object(values) => Ok(Self { values }),
            other => Err(Error::Configuration(format!(
                "source config must be an object, got {other}"
            ))),
        }
    }

    /// Builder-style setter.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Returns the raw value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.values.get(key)
    }

    /// Returns `true` if `key` is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Resolves the `encoding` key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is absent or names no known encoding.
    pub fn encoding(&self) -> Result<Encoding> {
        let name = require(self.get_str("encoding")?, "encoding")?;
        name.parse()
    }

    /// Reads a string value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a string.
    pub fn get_str(&self, key: &str) -> Result<Option<&str>> {
        match self.get(key) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(JsonValue::String(s)) => Ok(Some(s)),
            Some(other) => Err(malformed(key, "a string", other)),
        }
    }

    /// Reads a boolean, accepting `"true"`/`"false"` strings.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not boolean-like.
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(JsonValue::Bool(b)) => Ok(Some(*b)),
            Some(JsonValue::String(s)) => match s.trim().to_lowercase().as_str() {
                "true" => Ok(Some(true)),
                "false" => Ok(Some(false)),
                _ => Err(malformed(key, "a boolean", &JsonValue::String(s.clone()))),
            },
            Some(other) => Err(malformed(key, "a boolean", other)),
        }
    }

    /// Reads a non-negative integer, accepting numeric strings.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a non-negative integer.
    pub fn get_usize(&self, key: &str) -> Result<Option<usize>> {
        match self.get(key) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(value) => json_usize(value)
                .map(Some)
                .ok_or_else(|| malformed(key, "a non-negative integer", value)),
        }
    }

    /// Reads a single character.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a one-character string.
    pub fn get_char(&self, key: &str) -> Result<Option<char>> {
        let Some(s) = self.get_str(key)? else {
            return Ok(None);
        };
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Some(c)),
            _ => Err(Error::Configuration(format!(
                "{key} must be a single character, got {s:?}"
            ))),
        }
    }

    /// Reads a list of strings; a comma separated string is also accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is neither an array of strings nor a string.
    pub fn get_string_list(&self, key: &str) -> Result<Option<Vec<String>>> {
        match self.get(key) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(JsonValue::String(s)) => Ok(Some(
                s.split(',').map(|part| part.trim().to_string()).collect(),
            )),
            Some(JsonValue::Array(values)) => values
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| malformed(key, "a list of strings", v))
                })
                .collect::<Result<Vec<_>>>()
                .map(Some),
            Some(other) => Err(malformed(key, "a list of strings", other)),
        }
    }

    /// Reads an array of raw values.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not an array.
    pub fn get_array(&self, key: &str) -> Result<Option<&Vec<JsonValue>>> {
        match self.get(key) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(JsonValue::Array(values)) => Ok(Some(values)),
            Some(other) => Err(malformed(key, "an array", other)),
        }
    }
}

/// Turns an absent required key into a configuration error.
///
/// # Errors
///
/// Returns an error if `value` is `None`.
pub fn require<T>(value: Option<T>, key: &str) -> Result<T> {
    value.ok_or_else(|| Error::Configuration(format!("{key} is required")))
}

/// Reads a non-negative integer out of a JSON number or numeric string.
pub(crate) fn json_usize(value: &JsonValue) -> Option<usize> {
    match value {
        JsonValue::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn malformed(key: &str, expected: &str, got: &JsonValue) -> Error {
    Error::Configuration(format!("{key} must be {expected}, got {got}"))
}
