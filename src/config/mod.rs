//! Configuration management.
//!
//! A layer configuration file lists datasets, each with a loosely typed
//! [`SourceConfig`] and optional mapping configurations, plus logging
//! settings. TOML is the default file format; files ending in `.json` are
//! parsed as JSON.
//!
//! ```toml
//! [logging]
//! format = "json"
//!
//! [[datasets]]
//! name = "people"
//!
//! [datasets.sourceConfig]
//! encoding = "csv"
//! columns = ["id", "name"]
//! columnSeparator = ","
//! hasHeader = true
//!
//! [datasets.outgoingMappingConfig]
//! baseUri = "http://data.example.io/people/"
//!
//! [[datasets.outgoingMappingConfig.propertyMappings]]
//! property = "id"
//! isIdentity = true
//! urlValuePattern = "http://data.example.io/people/{value}"
//! ```

mod source;

pub use source::{SourceConfig, require};
pub(crate) use source::json_usize;

use crate::mapping::{IncomingMappingConfig, OutgoingMappingConfig};
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// Definition of one named dataset.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetDefinition {
    /// Dataset name, unique within a layer.
    pub name: String,
    /// Storage representation (`encoding` plus codec specific keys).
    #[serde(default, alias = "source_config")]
    pub source_config: SourceConfig,
    /// Entity to item mapping, used when entities are written to the dataset.
    #[serde(default, alias = "incoming_mapping_config")]
    pub incoming_mapping_config: Option<IncomingMappingConfig>,
    /// Item to entity mapping, used when entities are read from the dataset.
    #[serde(default, alias = "outgoing_mapping_config")]
    pub outgoing_mapping_config: Option<OutgoingMappingConfig>,
}

/// Logging section of the configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingSettings {
    /// Output format: `pretty` (default) or `json`.
    pub format: Option<String>,
    /// `EnvFilter` directive, e.g. `datalayer=debug`.
    pub filter: Option<String>,
    /// Optional log file; logs go to stderr when unset.
    pub file: Option<String>,
}

/// Top-level configuration file structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LayerConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: Option<LoggingSettings>,
    /// Configured datasets.
    #[serde(default)]
    pub datasets: Vec<DatasetDefinition>,
}

impl LayerConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, does not parse, or
    /// fails [`LayerConfig::validate`].
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;

        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        let config = if is_json {
            Self::from_json_str(&contents)?
        } else {
            Self::from_toml_str(&contents)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not parse.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| Error::Configuration(format!("cannot parse config file: {e}")))
    }

    /// Parses a JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not parse.
    pub fn from_json_str(contents: &str) -> Result<Self> {
        serde_json::from_str(contents)
            .map_err(|e| Error::Configuration(format!("cannot parse config file: {e}")))
    }

    /// Checks that dataset names are present and unique.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first offending dataset.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for dataset in &self.datasets {
            if dataset.name.trim().is_empty() {
                return Err(Error::Configuration("dataset name is required".to_string()));
            }
            if !seen.insert(dataset.name.as_str()) {
                return Err(Error::Configuration(format!(
                    "dataset {} is defined more than once",
                    dataset.name
                )));
            }
        }
        Ok(())
    }

    /// Looks up a dataset by name.
    #[must_use]
    pub fn dataset(&self, name: &str) -> Option<&DatasetDefinition> {
        self.datasets.iter().find(|d| d.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
[logging]
format = "json"

[[datasets]]
name = "people"

[datasets.sourceConfig]
encoding = "csv"
columns = ["id", "name"]
hasHeader = true

[datasets.outgoingMappingConfig]
baseUri = "http://x/"

[[datasets.outgoingMappingConfig.propertyMappings]]
property = "id"
isIdentity = true
urlValuePattern = "http://x/{value}"
"#;

    #[test]
    fn test_parse_toml() {
        let config = LayerConfig::from_toml_str(CONFIG).unwrap();
        assert_eq!(config.logging.as_ref().unwrap().format.as_deref(), Some("json"));
        let people = config.dataset("people").unwrap();
        assert_eq!(people.source_config.get_str("encoding").unwrap(), Some("csv"));
        let outgoing = people.outgoing_mapping_config.as_ref().unwrap();
        assert_eq!(outgoing.property_mappings.len(), 1);
        assert!(outgoing.property_mappings[0].is_identity);
    }

    #[test]
    fn test_duplicate_dataset_names() {
        let config = LayerConfig::from_json_str(
            r#"{"datasets": [{"name": "a"}, {"name": "a"}]}"#,
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_load_from_file_missing() {
        let err = LayerConfig::load_from_file(Path::new("/nonexistent/layer.toml")).unwrap_err();
        assert!(matches!(err, Error::OperationFailed { .. }));
    }
}
