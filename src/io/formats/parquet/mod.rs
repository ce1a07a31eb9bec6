//! Apache Parquet codec.
//!
//! Columns come from an explicit schema. The writer converts each item
//! strictly per column type and buffers rows until the row group exceeds
//! `flush_threshold` bytes. The reader returns the declared columns only,
//! rendering DATE and TIME columns as strings.
//!
//! | declared | logical | accepted input | stored as |
//! |----------|---------|----------------|-----------|
//! | boolean | | boolean | boolean |
//! | int32 | | integer | int32 |
//! | int32 | DATE | timestamp or date string | days since epoch |
//! | int64 | | integer or float (truncated) | int64 |
//! | int64 | TIME | timestamp or date string | nanoseconds since epoch (UTC) |
//! | float | | float or integer | float |
//! | double | | float or integer | double |
//! | binary | | bytes | binary |
//! | binary | STRING | string, sequence (joined with `,`) or map (JSON text) | UTF-8 |

mod concat;
mod convert;
mod reader;
mod schema;
mod writer;

pub use concat::ParquetConcatWriter;
pub use convert::{Cell, display_value, native_value, to_cell};
pub use reader::ParquetItemReader;
pub use schema::{ColumnSpec, LogicalType, ParquetSchema, PhysicalType};
pub use writer::ParquetItemWriter;

use super::{CodecFactory, WriterOptions};
use crate::config::SourceConfig;
use crate::io::traits::{ConcatenatingWriter, FixedItemFactory, ItemFactory, ItemReader, ItemWriter};
use crate::{Error, Result};
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;
use std::io::{Read, Write};
use std::sync::Arc;

/// Row group size in bytes that triggers a flush when none is configured.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 1_048_576;

/// Typed Parquet configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParquetConfig {
    /// Declared columns (`schema`).
    pub schema: ParquetSchema,
    /// Buffered row group size that triggers a flush (`flush_threshold`).
    pub flush_threshold: usize,
}

impl ParquetConfig {
    /// Parses the Parquet keys of a source config.
    ///
    /// # Errors
    ///
    /// Returns an error if `schema` is absent or malformed, or `fields`
    /// does not name exactly the schema columns.
    pub fn from_source(config: &SourceConfig) -> Result<Self> {
        let schema = ParquetSchema::from_config_value(config.get("schema"))?;
        let flush_threshold = match config.get_usize("flush_threshold")? {
            Some(threshold) => threshold,
            None => config
                .get_usize("flushThreshold")?
                .unwrap_or(DEFAULT_FLUSH_THRESHOLD),
        };
        if let Some(fields) = config.get_array("fields")? {
            check_fields(&schema, fields)?;
        }
        Ok(Self {
            schema,
            flush_threshold,
        })
    }
}

/// Checks that `fields` names exactly the schema columns.
fn check_fields(schema: &ParquetSchema, fields: &[JsonValue]) -> Result<()> {
    let names = fields
        .iter()
        .map(|field| match field {
            JsonValue::String(name) => Ok(name.as_str()),
            JsonValue::Object(entry) => entry
                .get("name")
                .and_then(JsonValue::as_str)
                .ok_or_else(|| Error::Configuration("fields entries need a name".to_string())),
            other => Err(Error::Configuration(format!(
                "fields entries must be names or objects, got {other}"
            ))),
        })
        .collect::<Result<Vec<_>>>()?;

    let declared: BTreeSet<&str> = schema.columns().iter().map(|c| c.name.as_str()).collect();
    let listed: BTreeSet<&str> = names.iter().copied().collect();
    if names.len() != declared.len() || listed != declared {
        return Err(Error::Configuration(format!(
            "fields {names:?} do not match schema columns {:?}",
            schema.names()
        )));
    }
    Ok(())
}

/// Codec factory for `encoding = "parquet"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParquetCodec;

impl CodecFactory for ParquetCodec {
    fn name(&self) -> &str {
        "parquet"
    }

    fn item_factory(&self, config: &SourceConfig) -> Result<Arc<dyn ItemFactory>> {
        let config = ParquetConfig::from_source(config)?;
        Ok(Arc::new(FixedItemFactory::new(config.schema.names())))
    }

    fn new_reader<'a>(
        &self,
        config: &SourceConfig,
        stream: Box<dyn Read + 'a>,
    ) -> Result<Box<dyn ItemReader + 'a>> {
        let config = ParquetConfig::from_source(config)?;
        Ok(Box::new(ParquetItemReader::new(stream, &config.schema)?))
    }

    fn new_writer<'a>(
        &self,
        config: &SourceConfig,
        stream: Box<dyn Write + Send + 'a>,
        _options: WriterOptions,
    ) -> Result<Box<dyn ItemWriter + 'a>> {
        let config = ParquetConfig::from_source(config)?;
        Ok(Box::new(ParquetItemWriter::new(stream, config)?))
    }

    /// The output takes the first part's schema; the declared schema only
    /// shapes the empty file written when there are no parts.
    fn concatenating_writer<'a>(
        &self,
        config: &SourceConfig,
        stream: Box<dyn Write + Send + 'a>,
    ) -> Result<Box<dyn ConcatenatingWriter + 'a>> {
        let config = ParquetConfig::from_source(config)?;
        Ok(Box::new(
            ParquetConcatWriter::new(stream).with_fallback_schema(config.schema.arrow_schema()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Item, Value};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use serde_json::json;

    const SCHEMA: &str = "message people {
        required int64 id;
        optional binary name (STRING);
        optional int32 born (DATE);
        optional double score;
    }";

    fn source() -> SourceConfig {
        SourceConfig::from_json(json!({"encoding": "parquet", "schema": SCHEMA})).unwrap()
    }

    fn encode(items: &[Item]) -> Vec<u8> {
        let mut out = Vec::new();
        let config = ParquetConfig::from_source(&source()).unwrap();
        let mut writer = Box::new(ParquetItemWriter::new(&mut out, config).unwrap());
        for item in items {
            writer.write(item).unwrap();
        }
        writer.close().unwrap();
        out
    }

    fn decode(data: &[u8]) -> Vec<Item> {
        let config = ParquetConfig::from_source(&source()).unwrap();
        let mut reader = ParquetItemReader::new(data, &config.schema).unwrap();
        let mut items = Vec::new();
        while let Some(item) = reader.read().unwrap() {
            items.push(item);
        }
        items
    }

    #[test]
    fn test_config_defaults() {
        let config = ParquetConfig::from_source(&source()).unwrap();
        assert_eq!(config.flush_threshold, DEFAULT_FLUSH_THRESHOLD);
        assert_eq!(config.schema.columns().len(), 4);
    }

    #[test]
    fn test_fields_must_match_schema() {
        let ok = source().with("fields", vec!["score", "born", "name", "id"]);
        assert!(ParquetConfig::from_source(&ok).is_ok());

        let missing = source().with("fields", vec!["id", "name"]);
        assert!(matches!(
            ParquetConfig::from_source(&missing),
            Err(Error::Configuration(_))
        ));

        let objects = source().with(
            "fields",
            json!([{"name": "id"}, {"name": "name"}, {"name": "born"}, {"name": "score"}]),
        );
        assert!(ParquetConfig::from_source(&objects).is_ok());
    }

    #[test]
    fn test_round_trip() {
        let items = vec![
            Item::new()
                .with("id", 1)
                .with("name", "Ada")
                .with("born", "1815-12-10")
                .with("score", 9.5),
            Item::new().with("id", 2),
        ];
        let decoded = decode(&encode(&items));

        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].get("id"), Some(&Value::Integer(1)));
        assert_eq!(decoded[0].get("name"), Some(&Value::from("Ada")));
        assert_eq!(decoded[0].get("born"), Some(&Value::from("1815-12-10")));
        assert_eq!(decoded[0].get("score"), Some(&Value::Float(9.5)));
        assert_eq!(decoded[1].len(), 1);
    }

    #[test]
    fn test_reader_rejects_missing_column() {
        let data = encode(&[Item::new().with("id", 1)]);
        let wider = ParquetSchema::parse_message(
            "message m { required int64 id; optional binary email (STRING); }",
        )
        .unwrap();
        let err = ParquetItemReader::new(data.as_slice(), &wider).err().unwrap();
        assert!(matches!(err, Error::Decode { format: "parquet", .. }));
    }

    #[test]
    fn test_reader_rejects_garbage() {
        let config = ParquetConfig::from_source(&source()).unwrap();
        assert!(ParquetItemReader::new("not parquet".as_bytes(), &config.schema).is_err());
    }

    #[test]
    fn test_concat_parts_in_order() {
        let first = encode(&[Item::new().with("id", 1), Item::new().with("id", 2)]);
        let second = encode(&[Item::new().with("id", 3)]);

        let mut out = Vec::new();
        {
            let mut concat = Box::new(ParquetConcatWriter::new(&mut out));
            concat.write_part(&mut first.as_slice()).unwrap();
            concat.write_part(&mut second.as_slice()).unwrap();
            assert_eq!(concat.parts(), 2);
            concat.finalize().unwrap();
        }

        let ids: Vec<Value> = decode(&out)
            .iter()
            .filter_map(|item| item.get("id").cloned())
            .collect();
        assert_eq!(
            ids,
            vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]
        );
    }

    #[test]
    fn test_concat_writes_one_row_group_per_part() {
        let parts = [
            encode(&[Item::new().with("id", 1), Item::new().with("id", 2)]),
            encode(&[Item::new().with("id", 3)]),
            encode(&[Item::new().with("id", 4), Item::new().with("id", 5)]),
        ];
        let mut out = Vec::new();
        {
            let mut concat = ParquetCodec.concatenating_writer(&source(), Box::new(&mut out)).unwrap();
            for part in &parts {
                concat.write_part(&mut part.as_slice()).unwrap();
            }
            concat.finalize().unwrap();
        }

        let builder =
            ParquetRecordBatchReaderBuilder::try_new(bytes::Bytes::from(out.clone())).unwrap();
        assert_eq!(builder.metadata().num_row_groups(), parts.len());
        assert_eq!(decode(&out).len(), 5);
    }

    #[test]
    fn test_concat_without_parts_writes_empty_file() {
        let mut out = Vec::new();
        ParquetCodec
            .concatenating_writer(&source(), Box::new(&mut out))
            .unwrap()
            .finalize()
            .unwrap();

        assert!(!out.is_empty());
        assert!(decode(&out).is_empty());
    }

    #[test]
    fn test_concat_requires_schema() {
        let config = SourceConfig::from_json(json!({"encoding": "parquet"})).unwrap();
        assert!(matches!(
            ParquetCodec.concatenating_writer(&config, Box::new(Vec::new())),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_concat_schema_mismatch() {
        let first = encode(&[Item::new().with("id", 1)]);
        let other_config = ParquetConfig::from_source(
            &SourceConfig::from_json(json!({"schema": "message m { required int32 x; }"})).unwrap(),
        )
        .unwrap();
        let mut second = Vec::new();
        let mut writer = Box::new(ParquetItemWriter::new(&mut second, other_config).unwrap());
        writer.write(&Item::new().with("x", 1)).unwrap();
        writer.close().unwrap();

        let mut concat = Box::new(ParquetConcatWriter::new(Vec::new()));
        concat.write_part(&mut first.as_slice()).unwrap();
        assert!(matches!(
            concat.write_part(&mut second.as_slice()),
            Err(Error::Decode { .. })
        ));
    }
}
