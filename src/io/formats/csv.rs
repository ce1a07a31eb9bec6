//! CSV codec.
//!
//! Values are matched to the configured `columns` by position. Types are not
//! recovered from text: every decoded value is a string.

use super::concat::LineConcatWriter;
use super::{CodecFactory, WriterOptions};
use crate::config::{SourceConfig, require};
use crate::io::traits::{ConcatenatingWriter, FixedItemFactory, ItemFactory, ItemReader, ItemWriter};
use crate::models::{Item, Value};
use crate::{Error, Result};
use std::io::{Read, Write};
use std::sync::Arc;

/// Typed CSV configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvConfig {
    /// Ordered column names (`columns`).
    pub columns: Vec<String>,
    /// Field separator (`columnSeparator`, default `,`).
    pub separator: u8,
    /// Whether the first line is a header (`hasHeader`, default `false`).
    pub has_header: bool,
}

impl CsvConfig {
    /// Parses the CSV keys of a source config.
    ///
    /// # Errors
    ///
    /// Returns an error if `columns` is absent or empty, or the separator is
    /// not a single ASCII character.
    pub fn from_source(config: &SourceConfig) -> Result<Self> {
        let columns = require(config.get_string_list("columns")?, "columns")?;
        if columns.is_empty() {
            return Err(Error::Configuration("columns must not be empty".to_string()));
        }
        let separator = match config.get_char("columnSeparator")? {
            None => b',',
            Some(c) => u8::try_from(c)
                .ok()
                .filter(u8::is_ascii)
                .ok_or_else(|| {
                    Error::Configuration(format!("columnSeparator must be ASCII, got {c:?}"))
                })?,
        };
        let has_header = config.get_bool("hasHeader")?.unwrap_or(false);
        Ok(Self {
            columns,
            separator,
            has_header,
        })
    }
}

fn csv_error(operation: &str, e: csv::Error) -> Error {
    if e.is_io_error() {
        Error::operation(operation, e)
    } else {
        Error::Decode {
            format: "csv",
            message: e.to_string(),
        }
    }
}

/// Reads one item per CSV record.
pub struct CsvItemReader<R: Read> {
    reader: csv::Reader<R>,
    columns: Vec<String>,
    skip_header: bool,
    record: csv::StringRecord,
}

impl<R: Read> CsvItemReader<R> {
    /// Creates a new CSV reader.
    pub fn new(stream: R, config: CsvConfig) -> Self {
        let reader = csv::ReaderBuilder::new()
            .delimiter(config.separator)
            .has_headers(false)
            .flexible(true)
            .from_reader(stream);
        Self {
            reader,
            columns: config.columns,
            skip_header: config.has_header,
            record: csv::StringRecord::new(),
        }
    }
}

impl<R: Read> ItemReader for CsvItemReader<R> {
    fn read(&mut self) -> Result<Option<Item>> {
        loop {
            let more = self
                .reader
                .read_record(&mut self.record)
                .map_err(|e| csv_error("read_csv", e))?;
            if !more {
                return Ok(None);
            }
            if self.skip_header {
                self.skip_header = false;
                continue;
            }
            break;
        }

        let mut item = Item::with_capacity(self.columns.len());
        for (column, value) in self.columns.iter().zip(self.record.iter()) {
            item.set(column.as_str(), value);
        }
        Ok(Some(item))
    }
}

/// Writes one CSV record per item in configured column order.
pub struct CsvItemWriter<W: Write> {
    writer: csv::Writer<W>,
    columns: Vec<String>,
}

impl<W: Write> CsvItemWriter<W> {
    /// Creates a new CSV writer, emitting the header row when configured
    /// and requested.
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be written.
    pub fn new(stream: W, config: CsvConfig, options: WriterOptions) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(config.separator)
            .has_headers(false)
            .flexible(true)
            .from_writer(stream);
        if config.has_header && options.emit_header {
            writer
                .write_record(&config.columns)
                .map_err(|e| csv_error("write_csv_header", e))?;
        }
        Ok(Self {
            writer,
            columns: config.columns,
        })
    }
}

impl<W: Write> ItemWriter for CsvItemWriter<W> {
    fn write(&mut self, item: &Item) -> Result<bool> {
        let row = self
            .columns
            .iter()
            .map(|column| item.get(column).map(Value::as_text).unwrap_or_default());
        self.writer
            .write_record(row)
            .map_err(|e| csv_error("write_csv", e))?;
        Ok(true)
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| Error::operation("flush_csv", e))
    }
}

/// Codec factory for `encoding = "csv"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvCodec;

impl CodecFactory for CsvCodec {
    fn name(&self) -> &str {
        "csv"
    }

    fn item_factory(&self, config: &SourceConfig) -> Result<Arc<dyn ItemFactory>> {
        let config = CsvConfig::from_source(config)?;
        Ok(Arc::new(FixedItemFactory::new(config.columns)))
    }

    fn new_reader<'a>(
        &self,
        config: &SourceConfig,
        stream: Box<dyn Read + 'a>,
    ) -> Result<Box<dyn ItemReader + 'a>> {
        let config = CsvConfig::from_source(config)?;
        Ok(Box::new(CsvItemReader::new(stream, config)))
    }

    fn new_writer<'a>(
        &self,
        config: &SourceConfig,
        stream: Box<dyn Write + Send + 'a>,
        options: WriterOptions,
    ) -> Result<Box<dyn ItemWriter + 'a>> {
        let config = CsvConfig::from_source(config)?;
        Ok(Box::new(CsvItemWriter::new(stream, config, options)?))
    }

    fn concatenating_writer<'a>(
        &self,
        config: &SourceConfig,
        stream: Box<dyn Write + Send + 'a>,
    ) -> Result<Box<dyn ConcatenatingWriter + 'a>> {
        CsvConfig::from_source(config)?;
        Ok(Box::new(LineConcatWriter::new(stream)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(separator: &str, has_header: bool) -> CsvConfig {
        CsvConfig::from_source(
            &SourceConfig::new()
                .with("columns", vec!["id", "name", "age"])
                .with("columnSeparator", separator)
                .with("hasHeader", has_header),
        )
        .unwrap()
    }

    #[test]
    fn test_config_requires_columns() {
        let err = CsvConfig::from_source(&SourceConfig::new()).unwrap_err();
        assert_eq!(err.to_string(), "configuration error: columns is required");
    }

    #[test]
    fn test_config_rejects_multichar_separator() {
        let source = SourceConfig::new()
            .with("columns", vec!["a"])
            .with("columnSeparator", ";;");
        assert!(matches!(
            CsvConfig::from_source(&source),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_read_skips_header() {
        let input = "id;name;age\n1;Ada;36\n2;Alan\n";
        let mut reader = CsvItemReader::new(input.as_bytes(), config(";", true));

        let first = reader.read().unwrap().unwrap();
        assert_eq!(first.get("name"), Some(&Value::from("Ada")));
        assert_eq!(first.get("age"), Some(&Value::from("36")));

        let second = reader.read().unwrap().unwrap();
        assert_eq!(second.len(), 2);
        assert!(!second.contains("age"));

        assert!(reader.read().unwrap().is_none());
    }

    #[test]
    fn test_read_without_header() {
        let mut reader = CsvItemReader::new("1,Ada,36\n".as_bytes(), config(",", false));
        let item = reader.read().unwrap().unwrap();
        assert_eq!(item.get("id"), Some(&Value::from("1")));
    }

    #[test]
    fn test_write_with_header_and_absent_fields() {
        let mut out = Vec::new();
        let mut writer = Box::new(
            CsvItemWriter::new(&mut out, config(",", true), WriterOptions::default()).unwrap(),
        );
        writer
            .write(&Item::new().with("name", "Ada").with("id", 1).with("extra", "x"))
            .unwrap();
        writer.write(&Item::new().with("id", 2)).unwrap();
        writer.close().unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "id,name,age\n1,Ada,\n2,,\n");
    }

    #[test]
    fn test_write_suppressed_header_and_quoting() {
        let mut out = Vec::new();
        let mut writer = Box::new(
            CsvItemWriter::new(&mut out, config(",", true), WriterOptions { emit_header: false })
                .unwrap(),
        );
        writer.write(&Item::new().with("id", "1").with("name", "Lovelace, Ada")).unwrap();
        writer.close().unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "1,\"Lovelace, Ada\",\n");
    }
}
