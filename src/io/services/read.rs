//! Entity read service.
//!
//! Decodes a dataset stream into items and maps them to entities.

use super::Dataset;
use crate::Result;
use crate::models::Entity;
use std::io::Read;
use std::sync::Arc;
use tracing::Span;

/// Options for reading entities.
#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    /// Skip records failing validation or type conversion instead of aborting.
    pub skip_invalid: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self { skip_invalid: true }
    }
}

impl ReadOptions {
    /// Enables or disables skipping invalid records.
    #[must_use]
    pub const fn with_skip_invalid(mut self, skip: bool) -> Self {
        self.skip_invalid = skip;
        self
    }
}

/// Result of a read pass.
#[derive(Debug, Clone, Default)]
pub struct ReadResult {
    /// Mapped entities in stream order.
    pub entities: Vec<Entity>,
    /// Items decoded from the stream.
    pub total_processed: usize,
    /// Items skipped as invalid.
    pub skipped_invalid: usize,
    /// One message per skipped item.
    pub errors: Vec<String>,
}

impl ReadResult {
    /// Returns whether any records were skipped.
    #[must_use]
    pub const fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Reads entities out of one dataset.
#[derive(Debug, Clone)]
pub struct EntityReadService {
    dataset: Arc<Dataset>,
    span: Span,
}

impl EntityReadService {
    /// Creates a read service logging under a `dataset.read` span.
    #[must_use]
    pub fn new(dataset: Arc<Dataset>) -> Self {
        let span = tracing::info_span!("dataset.read", dataset = %dataset.name());
        Self { dataset, span }
    }

    /// Creates a read service logging under `span`.
    #[must_use]
    pub const fn with_span(dataset: Arc<Dataset>, span: Span) -> Self {
        Self { dataset, span }
    }

    /// The dataset being read.
    #[must_use]
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Reads every item of `stream` and maps it to an entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the dataset has no outgoing mapping, the stream
    /// is malformed, or a record is invalid and `skip_invalid` is off.
    pub fn read_entities<'a>(
        &self,
        stream: Box<dyn Read + 'a>,
        options: ReadOptions,
    ) -> Result<ReadResult> {
        let _guard = self.span.enter();
        let mapper = self.dataset.outgoing()?;
        let mut reader = self.dataset.reader(stream)?;
        let mut result = ReadResult::default();

        while let Some(item) = reader.read()? {
            result.total_processed += 1;
            match mapper.map(&item) {
                Ok(entity) => result.entities.push(entity),
                Err(e) if options.skip_invalid && e.is_record_scoped() => {
                    tracing::debug!(record = result.total_processed, error = %e, "Skipping invalid record");
                    result.skipped_invalid += 1;
                    result
                        .errors
                        .push(format!("Record {}: {e}", result.total_processed));
                },
                Err(e) => return Err(e),
            }
        }
        reader.close()?;

        tracing::info!(
            processed = result.total_processed,
            entities = result.entities.len(),
            skipped = result.skipped_invalid,
            "Read entities"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::config::{DatasetDefinition, SourceConfig};
    use crate::io::formats::CodecRegistry;
    use crate::mapping::{ItemToEntityMapping, OutgoingMappingConfig};
    use serde_json::json;

    fn service() -> EntityReadService {
        let definition = DatasetDefinition {
            name: "people".to_string(),
            source_config: SourceConfig::from_json(json!({"encoding": "json"})).unwrap(),
            outgoing_mapping_config: Some(OutgoingMappingConfig {
                base_uri: "http://x/".to_string(),
                property_mappings: vec![ItemToEntityMapping {
                    property: "id".to_string(),
                    is_identity: true,
                    url_value_pattern: Some("http://x/{value}".to_string()),
                    ..ItemToEntityMapping::default()
                }],
                map_all: true,
                default_type: None,
            }),
            ..DatasetDefinition::default()
        };
        let dataset = Dataset::from_definition(&definition, &CodecRegistry::with_defaults()).unwrap();
        EntityReadService::new(Arc::new(dataset))
    }

    #[test]
    fn test_read_skips_invalid() {
        let input = r#"[{"id": 1, "name": "a"}, {"name": "b"}, {"id": 3}]"#;
        let result = service()
            .read_entities(Box::new(input.as_bytes()), ReadOptions::default())
            .unwrap();

        assert_eq!(result.total_processed, 3);
        assert_eq!(result.skipped_invalid, 1);
        assert_eq!(result.entities.len(), 2);
        assert_eq!(result.entities[1].id, "http://x/3");
        assert!(result.errors[0].starts_with("Record 2:"));
    }

    #[test]
    fn test_read_aborts_without_skip() {
        let input = r#"[{"name": "b"}]"#;
        let err = service()
            .read_entities(
                Box::new(input.as_bytes()),
                ReadOptions::default().with_skip_invalid(false),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_decode_error_is_fatal() {
        let err = service()
            .read_entities(Box::new("{}".as_bytes()), ReadOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }
}
