//! Concatenating writers for text encodings.
//!
//! Parts are merged without decoding to items. Line based encodings are
//! appended byte for byte. JSON parts are either arrays, whose brackets are
//! stripped, or object streams as written by the default JSON writer; their
//! values are joined into one array.

use crate::io::traits::ConcatenatingWriter;
use crate::{Error, Result};
use serde::de::IgnoredAny;
use std::io::{Read, Write};

/// Appends parts byte for byte (CSV, flat-file, plain text).
///
/// Header deduplication is not done here; writers producing later parts
/// should suppress their header instead.
pub struct LineConcatWriter<W: Write> {
    writer: W,
}

impl<W: Write> LineConcatWriter<W> {
    /// Creates a new line concatenating writer.
    #[must_use]
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> ConcatenatingWriter for LineConcatWriter<W> {
    fn write_part(&mut self, part: &mut dyn Read) -> Result<()> {
        std::io::copy(part, &mut self.writer).map_err(|e| Error::operation("concat_part", e))?;
        Ok(())
    }

    fn finalize(mut self: Box<Self>) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| Error::operation("concat_finalize", e))
    }
}

/// Merges JSON parts into one array.
pub struct JsonConcatWriter<W: Write> {
    writer: W,
    opened: bool,
    bodies: usize,
}

impl<W: Write> JsonConcatWriter<W> {
    /// Creates a new JSON concatenating writer.
    #[must_use]
    pub const fn new(writer: W) -> Self {
        Self {
            writer,
            opened: false,
            bodies: 0,
        }
    }

    fn open(&mut self) -> Result<()> {
        if !self.opened {
            self.writer
                .write_all(b"[")
                .map_err(|e| Error::operation("concat_part", e))?;
            self.opened = true;
        }
        Ok(())
    }
}

fn part_error(message: String) -> Error {
    Error::Decode {
        format: "json",
        message,
    }
}

/// Returns the raw array elements of a part, as comma-joinable chunks.
///
/// An array part yields its body as one chunk; an object stream yields
/// one chunk per object. Blank parts yield nothing.
fn part_chunks(part: &[u8]) -> Result<Vec<&[u8]>> {
    let trimmed = part.trim_ascii();
    match trimmed.first() {
        None => Ok(Vec::new()),
        Some(b'[') => {
            serde_json::from_slice::<Vec<IgnoredAny>>(trimmed)
                .map_err(|e| part_error(format!("part is not a JSON array: {e}")))?;
            // A valid array always starts with '[' and ends with ']'.
            let body = trimmed
                .get(1..trimmed.len().saturating_sub(1))
                .unwrap_or_default()
                .trim_ascii();
            Ok(if body.is_empty() { Vec::new() } else { vec![body] })
        },
        Some(_) => object_stream_chunks(trimmed),
    }
}

fn object_stream_chunks(part: &[u8]) -> Result<Vec<&[u8]>> {
    let mut chunks = Vec::new();
    let mut stream = serde_json::Deserializer::from_slice(part).into_iter::<IgnoredAny>();
    let mut start = 0;
    while let Some(value) = stream.next() {
        value.map_err(|e| part_error(format!("part is not a JSON object stream: {e}")))?;
        let end = stream.byte_offset();
        let chunk = part.get(start..end).unwrap_or_default().trim_ascii();
        if chunk.first() != Some(&b'{') {
            return Err(part_error(format!(
                "object stream part holds a non-object value at byte {start}"
            )));
        }
        chunks.push(chunk);
        start = end;
    }
    Ok(chunks)
}

impl<W: Write> ConcatenatingWriter for JsonConcatWriter<W> {
    fn write_part(&mut self, part: &mut dyn Read) -> Result<()> {
        let mut buf = Vec::new();
        part.read_to_end(&mut buf)
            .map_err(|e| Error::operation("concat_part", e))?;
        let chunks = part_chunks(&buf)?;

        self.open()?;
        for chunk in chunks {
            if self.bodies > 0 {
                self.writer
                    .write_all(b",")
                    .map_err(|e| Error::operation("concat_part", e))?;
            }
            self.writer
                .write_all(chunk)
                .map_err(|e| Error::operation("concat_part", e))?;
            self.bodies += 1;
        }
        Ok(())
    }

    fn finalize(mut self: Box<Self>) -> Result<()> {
        self.open()?;
        self.writer
            .write_all(b"]")
            .and_then(|()| self.writer.flush())
            .map_err(|e| Error::operation("concat_finalize", e))
    }
}
