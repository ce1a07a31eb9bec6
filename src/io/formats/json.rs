//! JSON codec.
//!
//! The reader expects one top-level array of objects and decodes lazily, one
//! object per [`ItemReader::read`] call. The default writer,
//! [`JsonItemWriter`], emits a stream of newline separated objects and makes
//! no bracket or comma decisions; a valid top-level array comes from
//! [`JsonConcatWriter`] merging one or more such parts. [`JsonArrayWriter`]
//! frames a single writer's output as an array when `framing = "array"`.

use super::concat::JsonConcatWriter;
use super::{CodecFactory, WriterOptions};
use crate::config::SourceConfig;
use crate::io::traits::{ConcatenatingWriter, ItemFactory, ItemReader, ItemWriter, OpenItemFactory};
use crate::models::Item;
use crate::{Error, Result};
use serde::Deserialize;
use std::io::{BufRead, BufReader, Read, Write};
use std::sync::Arc;

/// How the writer frames its output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JsonFraming {
    /// One object per line, no brackets or commas.
    #[default]
    Lines,
    /// `[` ... `,` ... `]` around the objects.
    Array,
}

/// Typed JSON configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonConfig {
    /// Writer framing (`framing = "lines" | "array"`).
    pub framing: JsonFraming,
}

impl JsonConfig {
    /// Parses the JSON keys of a source config.
    ///
    /// # Errors
    ///
    /// Returns an error if `framing` names an unknown mode.
    pub fn from_source(config: &SourceConfig) -> Result<Self> {
        let framing = match config.get_str("framing")?.map(str::to_lowercase).as_deref() {
            None | Some("lines" | "ndjson") => JsonFraming::Lines,
            Some("array") => JsonFraming::Array,
            Some(other) => {
                return Err(Error::Configuration(format!(
                    "framing must be 'lines' or 'array', got '{other}'"
                )));
            },
        };
        Ok(Self { framing })
    }
}

fn decode_error(message: impl Into<String>) -> Error {
    Error::Decode {
        format: "json",
        message: message.into(),
    }
}

fn describe(byte: Option<u8>) -> String {
    byte.map_or_else(|| "end of stream".to_string(), |b| format!("'{}'", char::from(b)))
}

/// Lazy reader over a JSON array of objects.
pub struct JsonItemReader<R: Read> {
    reader: BufReader<R>,
    /// At least one element has been returned.
    in_body: bool,
    /// The closing bracket has been consumed.
    done: bool,
}

impl<R: Read> JsonItemReader<R> {
    /// Creates a reader, consuming the opening `[`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the stream does not start with `[`.
    pub fn new(stream: R) -> Result<Self> {
        let mut reader = BufReader::new(stream);
        match peek_token(&mut reader)? {
            Some(b'[') => {
                reader.consume(1);
                Ok(Self {
                    reader,
                    in_body: false,
                    done: false,
                })
            },
            other => Err(decode_error(format!(
                "expected '[' at start of stream, found {}",
                describe(other)
            ))),
        }
    }

    fn peek(&mut self) -> Result<Option<u8>> {
        peek_token(&mut self.reader)
    }
}

/// Skips whitespace and returns the next byte without consuming it.
fn peek_token<R: BufRead>(reader: &mut R) -> Result<Option<u8>> {
    loop {
        let buf = reader
            .fill_buf()
            .map_err(|e| Error::operation("read_json", e))?;
        if buf.is_empty() {
            return Ok(None);
        }
        if let Some(pos) = buf.iter().position(|b| !b.is_ascii_whitespace()) {
            let byte = buf[pos];
            reader.consume(pos);
            return Ok(Some(byte));
        }
        let len = buf.len();
        reader.consume(len);
    }
}

impl<R: Read> ItemReader for JsonItemReader<R> {
    fn read(&mut self) -> Result<Option<Item>> {
        if self.done {
            return Ok(None);
        }

        let mut token = self.peek()?;
        if token == Some(b']') {
            self.reader.consume(1);
            self.done = true;
            return Ok(None);
        }
        if self.in_body {
            if token != Some(b',') {
                return Err(decode_error(format!(
                    "expected ',' or ']' after array element, found {}",
                    describe(token)
                )));
            }
            self.reader.consume(1);
            token = self.peek()?;
        }
        if token != Some(b'{') {
            return Err(decode_error(format!(
                "expected object in array, found {}",
                describe(token)
            )));
        }

        let mut de = serde_json::Deserializer::from_reader(&mut self.reader);
        let item = Item::deserialize(&mut de).map_err(|e| {
            if e.is_io() {
                Error::operation("read_json", e)
            } else {
                decode_error(e.to_string())
            }
        })?;
        self.in_body = true;
        Ok(Some(item))
    }
}

/// Writes one JSON object per item, newline separated, with no framing.
pub struct JsonItemWriter<W: Write> {
    writer: W,
}

impl<W: Write> JsonItemWriter<W> {
    /// Creates a new object-stream writer.
    #[must_use]
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> ItemWriter for JsonItemWriter<W> {
    fn write(&mut self, item: &Item) -> Result<bool> {
        serde_json::to_writer(&mut self.writer, item)
            .map_err(|e| Error::operation("write_json", e))?;
        writeln!(self.writer).map_err(|e| Error::operation("write_json", e))?;
        Ok(true)
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| Error::operation("flush_json", e))
    }
}

/// Writes items as one JSON array.
pub struct JsonArrayWriter<W: Write> {
    writer: W,
    count: usize,
}

impl<W: Write> JsonArrayWriter<W> {
    /// Creates a new array writer.
    #[must_use]
    pub const fn new(writer: W) -> Self {
        Self { writer, count: 0 }
    }
}

impl<W: Write> ItemWriter for JsonArrayWriter<W> {
    fn write(&mut self, item: &Item) -> Result<bool> {
        let separator: &[u8] = if self.count == 0 { b"[" } else { b"," };
        self.writer
            .write_all(separator)
            .map_err(|e| Error::operation("write_json", e))?;
        serde_json::to_writer(&mut self.writer, item)
            .map_err(|e| Error::operation("write_json", e))?;
        self.count += 1;
        Ok(true)
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        let closing: &[u8] = if self.count == 0 { b"[]" } else { b"]" };
        self.writer
            .write_all(closing)
            .and_then(|()| self.writer.flush())
            .map_err(|e| Error::operation("flush_json", e))
    }
}

/// Codec factory for `encoding = "json"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl CodecFactory for JsonCodec {
    fn name(&self) -> &str {
        "json"
    }

    fn item_factory(&self, _config: &SourceConfig) -> Result<Arc<dyn ItemFactory>> {
        Ok(Arc::new(OpenItemFactory))
    }

    fn new_reader<'a>(
        &self,
        config: &SourceConfig,
        stream: Box<dyn Read + 'a>,
    ) -> Result<Box<dyn ItemReader + 'a>> {
        JsonConfig::from_source(config)?;
        Ok(Box::new(JsonItemReader::new(stream)?))
    }

    fn new_writer<'a>(
        &self,
        config: &SourceConfig,
        stream: Box<dyn Write + Send + 'a>,
        _options: WriterOptions,
    ) -> Result<Box<dyn ItemWriter + 'a>> {
        Ok(match JsonConfig::from_source(config)?.framing {
            JsonFraming::Array => Box::new(JsonArrayWriter::new(stream)),
            JsonFraming::Lines => Box::new(JsonItemWriter::new(stream)),
        })
    }

    fn concatenating_writer<'a>(
        &self,
        config: &SourceConfig,
        stream: Box<dyn Write + Send + 'a>,
    ) -> Result<Box<dyn ConcatenatingWriter + 'a>> {
        JsonConfig::from_source(config)?;
        Ok(Box::new(JsonConcatWriter::new(stream)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Value;

    fn read_all(input: &str) -> Result<Vec<Item>> {
        let mut reader = JsonItemReader::new(input.as_bytes())?;
        let mut items = Vec::new();
        while let Some(item) = reader.read()? {
            items.push(item);
        }
        Ok(items)
    }

    #[test]
    fn test_read_array() {
        let items = read_all(r#"[{"id":1},{"id":2}]"#).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].get("id"), Some(&Value::Integer(1)));
        assert_eq!(items[1].get("id"), Some(&Value::Integer(2)));
    }

    #[test]
    fn test_read_with_whitespace() {
        let items = read_all("  [\n  {\"a\": \"x\"} ,\n  {\"a\": \"y\"}\n]\n").unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_empty_array() {
        assert!(read_all("[]").unwrap().is_empty());
    }

    #[test]
    fn test_missing_opening_bracket_fails_immediately() {
        let err = JsonItemReader::new(r#"{"id":1}"#.as_bytes()).err().unwrap();
        assert!(matches!(err, Error::Decode { format: "json", .. }));
        assert!(JsonItemReader::new("".as_bytes()).is_err());
    }

    #[test]
    fn test_missing_separator() {
        assert!(matches!(
            read_all(r#"[{"id":1} {"id":2}]"#),
            Err(Error::Decode { .. })
        ));
    }

    #[test]
    fn test_non_object_element() {
        assert!(matches!(read_all("[1,2]"), Err(Error::Decode { .. })));
    }

    #[test]
    fn test_truncated_array() {
        assert!(read_all(r#"[{"id":1},"#).is_err());
    }

    #[test]
    fn test_end_of_stream_is_sticky() {
        let mut reader = JsonItemReader::new("[]".as_bytes()).unwrap();
        assert!(reader.read().unwrap().is_none());
        assert!(reader.read().unwrap().is_none());
    }

    #[test]
    fn test_object_stream_writer() {
        let mut out = Vec::new();
        let mut writer = Box::new(JsonItemWriter::new(&mut out));
        writer.write(&Item::new().with("id", 1)).unwrap();
        writer.write(&Item::new().with("id", 2)).unwrap();
        writer.close().unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "{\"id\":1}\n{\"id\":2}\n");
    }

    #[test]
    fn test_array_writer() {
        let mut out = Vec::new();
        let mut writer = Box::new(JsonArrayWriter::new(&mut out));
        writer.write(&Item::new().with("id", 1).with("name", "a")).unwrap();
        writer.write(&Item::new().with("id", 2)).unwrap();
        writer.close().unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            r#"[{"id":1,"name":"a"},{"id":2}]"#
        );
    }

    #[test]
    fn test_array_writer_empty() {
        let mut out = Vec::new();
        Box::new(JsonArrayWriter::new(&mut out)).close().unwrap();
        assert_eq!(out, b"[]");
    }

    #[test]
    fn test_framing_config() {
        assert_eq!(
            JsonConfig::from_source(&SourceConfig::new()).unwrap().framing,
            JsonFraming::Lines
        );
        let config = SourceConfig::new().with("framing", "array");
        assert_eq!(
            JsonConfig::from_source(&config).unwrap().framing,
            JsonFraming::Array
        );
        let config = SourceConfig::new().with("framing", "xml");
        assert!(JsonConfig::from_source(&config).is_err());
    }
}
