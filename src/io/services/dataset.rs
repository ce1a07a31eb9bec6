//! A named dataset: codec, item factory and mappers composed once.

use crate::config::{DatasetDefinition, SourceConfig};
use crate::io::formats::{CodecFactory, CodecRegistry, WriterOptions};
use crate::io::traits::{ConcatenatingWriter, ItemFactory, ItemReader, ItemWriter};
use crate::mapping::{EntityToItemMapper, IncomingMappingConfig, ItemToEntityMapper};
use crate::{Error, Result};
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

/// One configured dataset.
///
/// Mapping configurations are validated when the dataset is built, so a
/// broken mapping surfaces before the first record is touched.
pub struct Dataset {
    name: String,
    source_config: SourceConfig,
    codec: Arc<dyn CodecFactory>,
    item_factory: Arc<dyn ItemFactory>,
    outgoing: Option<ItemToEntityMapper>,
    incoming: EntityToItemMapper,
}

impl fmt::Debug for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dataset")
            .field("name", &self.name)
            .field("encoding", &self.codec.name())
            .field("outgoing", &self.outgoing)
            .field("incoming", &self.incoming)
            .finish_non_exhaustive()
    }
}

impl Dataset {
    /// Builds a dataset from its definition.
    ///
    /// Without an incoming mapping config, entities are written by copying
    /// properties whose local name the encoding accepts. The source config's
    /// `stripProps` flag tells the incoming mapper that entity keys arrive
    /// without their URI prefix.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the encoding is unknown, the codec
    /// configuration is malformed or a mapping configuration is invalid.
    pub fn from_definition(definition: &DatasetDefinition, registry: &CodecRegistry) -> Result<Self> {
        if definition.name.trim().is_empty() {
            return Err(Error::Configuration("dataset name must not be empty".to_string()));
        }
        let codec = registry.for_config(&definition.source_config)?;
        let item_factory = codec.item_factory(&definition.source_config)?;

        let outgoing = definition
            .outgoing_mapping_config
            .as_ref()
            .map(ItemToEntityMapper::new)
            .transpose()?;
        let incoming_config = definition
            .incoming_mapping_config
            .clone()
            .unwrap_or_else(|| IncomingMappingConfig {
                map_named: true,
                ..IncomingMappingConfig::default()
            });
        let strip_props = definition
            .source_config
            .get_bool("stripProps")?
            .unwrap_or(false);
        let incoming = EntityToItemMapper::new(&incoming_config, Arc::clone(&item_factory))?
            .with_strip_props(strip_props);

        Ok(Self {
            name: definition.name.clone(),
            source_config: definition.source_config.clone(),
            codec,
            item_factory,
            outgoing,
            incoming,
        })
    }

    /// Dataset name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registered name of the dataset's codec.
    #[must_use]
    pub fn encoding(&self) -> &str {
        self.codec.name()
    }

    /// The loosely typed source configuration.
    #[must_use]
    pub const fn source_config(&self) -> &SourceConfig {
        &self.source_config
    }

    /// Item factory of the dataset's codec.
    #[must_use]
    pub fn item_factory(&self) -> &dyn ItemFactory {
        self.item_factory.as_ref()
    }

    /// Mapper used when reading entities out of the dataset.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no outgoing mapping is configured.
    pub fn outgoing(&self) -> Result<&ItemToEntityMapper> {
        self.outgoing.as_ref().ok_or_else(|| {
            Error::Configuration(format!(
                "dataset {} has no outgoing mapping config",
                self.name
            ))
        })
    }

    /// Mapper used when writing entities into the dataset.
    #[must_use]
    pub const fn incoming(&self) -> &EntityToItemMapper {
        &self.incoming
    }

    /// Opens an item reader over `stream`.
    ///
    /// # Errors
    ///
    /// Returns an error if the codec rejects the stream header.
    pub fn reader<'a>(&self, stream: Box<dyn Read + 'a>) -> Result<Box<dyn ItemReader + 'a>> {
        self.codec.new_reader(&self.source_config, stream)
    }

    /// Opens an item writer over `stream`.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer cannot be created.
    pub fn writer<'a>(
        &self,
        stream: Box<dyn Write + Send + 'a>,
        options: WriterOptions,
    ) -> Result<Box<dyn ItemWriter + 'a>> {
        self.codec.new_writer(&self.source_config, stream, options)
    }

    /// Opens a concatenating writer over `stream`.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer cannot be created.
    pub fn concatenating_writer<'a>(
        &self,
        stream: Box<dyn Write + Send + 'a>,
    ) -> Result<Box<dyn ConcatenatingWriter + 'a>> {
        self.codec.concatenating_writer(&self.source_config, stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn definition(source: serde_json::Value) -> DatasetDefinition {
        DatasetDefinition {
            name: "people".to_string(),
            source_config: SourceConfig::from_json(source).unwrap(),
            ..DatasetDefinition::default()
        }
    }

    #[test]
    fn test_from_definition() {
        let registry = CodecRegistry::with_defaults();
        let dataset = Dataset::from_definition(
            &definition(json!({"encoding": "csv", "columns": ["id", "name"]})),
            &registry,
        )
        .unwrap();

        assert_eq!(dataset.name(), "people");
        assert_eq!(dataset.encoding(), "csv");
        assert!(dataset.item_factory().accepts("name"));
        assert!(!dataset.item_factory().accepts("age"));
        assert!(matches!(dataset.outgoing(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_codec_config_fails_fast() {
        let registry = CodecRegistry::with_defaults();
        let err = Dataset::from_definition(&definition(json!({"encoding": "csv"})), &registry)
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let err = Dataset::from_definition(&definition(json!({"encoding": "xml"})), &registry)
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_strip_props_flag() {
        let registry = CodecRegistry::with_defaults();
        let dataset = Dataset::from_definition(&definition(json!({"encoding": "json"})), &registry)
            .unwrap();
        assert!(!dataset.incoming().strip_props());

        let dataset = Dataset::from_definition(
            &definition(json!({"encoding": "json", "stripProps": true})),
            &registry,
        )
        .unwrap();
        assert!(dataset.incoming().strip_props());

        let err = Dataset::from_definition(
            &definition(json!({"encoding": "json", "stripProps": "sometimes"})),
            &registry,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_mapping_fails_fast() {
        let registry = CodecRegistry::with_defaults();
        let mut def = definition(json!({"encoding": "json"}));
        def.outgoing_mapping_config = Some(crate::mapping::OutgoingMappingConfig::default());
        assert!(matches!(
            Dataset::from_definition(&def, &registry),
            Err(Error::Configuration(_))
        ));
    }
}
