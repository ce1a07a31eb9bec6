//! Fixed-width flat-file codec.
//!
//! Each line is a sequence of byte ranges described by ordered
//! [`FieldDescriptor`]s. Integer-like fields are zero padded, everything else
//! is left aligned and space padded. Values longer than their width are
//! truncated.

use super::concat::LineConcatWriter;
use super::{CodecFactory, WriterOptions};
use crate::config::{SourceConfig, json_usize, require};
use crate::io::traits::{ConcatenatingWriter, FixedItemFactory, ItemFactory, ItemReader, ItemWriter};
use crate::models::{Item, Value};
use crate::{Error, Result};
use serde_json::Value as JsonValue;
use std::io::{BufRead, BufReader, Read, Write};
use std::str::FromStr;
use std::sync::Arc;

/// Declared type of a fixed-width field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FieldType {
    /// Left aligned text.
    #[default]
    String,
    /// Zero padded integer (`int`, `integer`, `long`).
    Integer,
    /// Left aligned number (`float`, `double`, `decimal`).
    Float,
}

impl FromStr for FieldType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "string" | "text" => Ok(Self::String),
            "int" | "integer" | "long" => Ok(Self::Integer),
            "float" | "double" | "decimal" => Ok(Self::Float),
            other => Err(Error::Configuration(format!("unknown field type: {other}"))),
        }
    }
}

/// One positional field of a flat-file line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Item field name; empty for ignored filler.
    pub name: String,
    /// Width in bytes.
    pub length: usize,
    /// Declared type.
    pub field_type: FieldType,
    /// Filler bytes that carry no field.
    pub ignore: bool,
    /// The writer rejects items without a value for this field.
    pub required: bool,
}

impl FieldDescriptor {
    /// Creates a string descriptor.
    #[must_use]
    pub fn new(name: impl Into<String>, length: usize) -> Self {
        Self {
            name: name.into(),
            length,
            field_type: FieldType::String,
            ignore: false,
            required: false,
        }
    }

    /// Creates an ignored filler descriptor.
    #[must_use]
    pub fn filler(length: usize) -> Self {
        Self {
            ignore: true,
            ..Self::new("", length)
        }
    }

    /// Sets the declared type.
    #[must_use]
    pub const fn with_type(mut self, field_type: FieldType) -> Self {
        self.field_type = field_type;
        self
    }

    fn from_json(index: usize, value: &JsonValue) -> Result<Self> {
        let JsonValue::Object(entry) = value else {
            return Err(Error::Configuration(format!(
                "fields[{index}] must be an object, got {value}"
            )));
        };
        let config = SourceConfig::from_json(JsonValue::Object(entry.clone()))?;

        let ignore = config.get_bool("ignore")?.unwrap_or(false);
        let name = config.get_str("name")?.unwrap_or_default().to_string();
        if name.is_empty() && !ignore {
            return Err(Error::Configuration(format!("fields[{index}].name is required")));
        }
        let length = entry
            .get("length")
            .and_then(json_usize)
            .filter(|len| *len > 0)
            .ok_or_else(|| {
                Error::Configuration(format!("fields[{index}].length must be a positive integer"))
            })?;
        let field_type = config
            .get_str("type")?
            .map(FieldType::from_str)
            .transpose()?
            .unwrap_or_default();
        let required = config.get_bool("required")?.unwrap_or(false);

        Ok(Self {
            name,
            length,
            field_type,
            ignore,
            required,
        })
    }
}

/// Typed flat-file configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatFileConfig {
    /// Ordered descriptors (`fields`).
    pub fields: Vec<FieldDescriptor>,
    /// Byte offset of the first field on each line (`indexFrom`).
    pub index_from: usize,
}

impl FlatFileConfig {
    /// Parses the flat-file keys of a source config.
    ///
    /// # Errors
    ///
    /// Returns an error if `fields` is absent, empty or malformed.
    pub fn from_source(config: &SourceConfig) -> Result<Self> {
        let raw = require(config.get_array("fields")?, "fields")?;
        if raw.is_empty() {
            return Err(Error::Configuration("fields must not be empty".to_string()));
        }
        let fields = raw
            .iter()
            .enumerate()
            .map(|(i, v)| FieldDescriptor::from_json(i, v))
            .collect::<Result<Vec<_>>>()?;
        let index_from = config.get_usize("indexFrom")?.unwrap_or(0);
        Ok(Self { fields, index_from })
    }

    /// Names of the fields that carry data.
    #[must_use]
    pub fn field_names(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|d| !d.ignore)
            .map(|d| d.name.clone())
            .collect()
    }
}

/// Reads one item per non-blank line.
pub struct FlatFileItemReader<R: Read> {
    reader: BufReader<R>,
    config: FlatFileConfig,
    line: Vec<u8>,
}

impl<R: Read> FlatFileItemReader<R> {
    /// Creates a new flat-file reader.
    pub fn new(stream: R, config: FlatFileConfig) -> Self {
        Self {
            reader: BufReader::new(stream),
            config,
            line: Vec::new(),
        }
    }

    fn decode_line(&self) -> Item {
        let line = self.line.as_slice();
        let mut item = Item::with_capacity(self.config.fields.len());
        let mut cursor = self.config.index_from;
        for descriptor in &self.config.fields {
            let end = cursor.saturating_add(descriptor.length);
            if !descriptor.ignore {
                let slice = &line[cursor.min(line.len())..end.min(line.len())];
                let text = String::from_utf8_lossy(slice);
                item.set(descriptor.name.as_str(), text.trim());
            }
            cursor = end;
        }
        item
    }
}

impl<R: Read> ItemReader for FlatFileItemReader<R> {
    fn read(&mut self) -> Result<Option<Item>> {
        loop {
            self.line.clear();
            let n = self
                .reader
                .read_until(b'\n', &mut self.line)
                .map_err(|e| Error::operation("read_flatfile", e))?;
            if n == 0 {
                return Ok(None);
            }
            while matches!(self.line.last(), Some(b'\n' | b'\r')) {
                self.line.pop();
            }
            if !self.line.iter().all(u8::is_ascii_whitespace) {
                return Ok(Some(self.decode_line()));
            }
        }
    }
}

/// Truncates `text` to at most `width` bytes on a char boundary, then pads
/// with spaces to exactly `width` bytes.
fn fit(text: &str, width: usize) -> String {
    let mut end = text.len().min(width);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let mut cell = String::with_capacity(width);
    cell.push_str(&text[..end]);
    cell.extend(std::iter::repeat_n(' ', width - end));
    cell
}

#[allow(clippy::cast_possible_truncation)]
fn integer_value(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(i) => Some(*i),
        Value::Float(f) if f.is_finite() => Some(f.trunc() as i64),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Zero pads an integer to `width`, keeping the sign in front.
fn zero_pad(n: i64, width: usize) -> String {
    let digits = n.unsigned_abs().to_string();
    if n < 0 {
        format!("-{digits:0>w$}", w = width.saturating_sub(1))
    } else {
        format!("{digits:0>width$}")
    }
}

/// Renders a value into a cell of exactly `descriptor.length` bytes.
#[must_use]
pub fn render_cell(descriptor: &FieldDescriptor, value: &Value) -> String {
    let width = descriptor.length;
    match descriptor.field_type {
        FieldType::Integer => integer_value(value).map_or_else(
            || fit(&value.as_text(), width),
            |n| fit(&zero_pad(n, width), width),
        ),
        FieldType::Float | FieldType::String => fit(&value.as_text(), width),
    }
}

/// Writes one fixed-width line per item that has data.
pub struct FlatFileItemWriter<W: Write> {
    writer: W,
    config: FlatFileConfig,
}

impl<W: Write> FlatFileItemWriter<W> {
    /// Creates a new flat-file writer.
    pub const fn new(writer: W, config: FlatFileConfig) -> Self {
        Self { writer, config }
    }

    /// Renders the line for `item`, or `None` when no field carries data.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a required field is absent.
    pub fn render_line(&self, item: &Item) -> Result<Option<String>> {
        let width: usize = self.config.index_from
            + self.config.fields.iter().map(|d| d.length).sum::<usize>();
        let mut line = String::with_capacity(width + 1);
        line.extend(std::iter::repeat_n(' ', self.config.index_from));

        let mut populated = 0usize;
        for descriptor in &self.config.fields {
            let value = if descriptor.ignore {
                None
            } else {
                item.get_present(&descriptor.name)
            };
            match value {
                Some(value) => {
                    populated += 1;
                    line.push_str(&render_cell(descriptor, value));
                },
                None if descriptor.required => {
                    return Err(Error::validation(
                        &descriptor.name,
                        format!("property {} is required", descriptor.name),
                    ));
                },
                None => line.extend(std::iter::repeat_n(' ', descriptor.length)),
            }
        }

        if populated == 0 {
            return Ok(None);
        }
        line.push('\n');
        Ok(Some(line))
    }
}

impl<W: Write> ItemWriter for FlatFileItemWriter<W> {
    fn write(&mut self, item: &Item) -> Result<bool> {
        let Some(line) = self.render_line(item)? else {
            return Ok(false);
        };
        self.writer
            .write_all(line.as_bytes())
            .map_err(|e| Error::operation("write_flatfile", e))?;
        Ok(true)
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| Error::operation("flush_flatfile", e))
    }
}

/// Codec factory for `encoding = "flatfile"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatFileCodec;

impl CodecFactory for FlatFileCodec {
    fn name(&self) -> &str {
        "flatfile"
    }

    fn item_factory(&self, config: &SourceConfig) -> Result<Arc<dyn ItemFactory>> {
        let config = FlatFileConfig::from_source(config)?;
        Ok(Arc::new(FixedItemFactory::new(config.field_names())))
    }

    fn new_reader<'a>(
        &self,
        config: &SourceConfig,
        stream: Box<dyn Read + 'a>,
    ) -> Result<Box<dyn ItemReader + 'a>> {
        let config = FlatFileConfig::from_source(config)?;
        Ok(Box::new(FlatFileItemReader::new(stream, config)))
    }

    fn new_writer<'a>(
        &self,
        config: &SourceConfig,
        stream: Box<dyn Write + Send + 'a>,
        _options: WriterOptions,
    ) -> Result<Box<dyn ItemWriter + 'a>> {
        let config = FlatFileConfig::from_source(config)?;
        Ok(Box::new(FlatFileItemWriter::new(stream, config)))
    }

    fn concatenating_writer<'a>(
        &self,
        config: &SourceConfig,
        stream: Box<dyn Write + Send + 'a>,
    ) -> Result<Box<dyn ConcatenatingWriter + 'a>> {
        FlatFileConfig::from_source(config)?;
        Ok(Box::new(LineConcatWriter::new(stream)))
    }
}
