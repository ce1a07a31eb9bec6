//! Concatenation of Parquet parts.
//!
//! The schema comes from the first part. Each part's rows are re-appended
//! and flushed as one row group, so the combined file keeps per-part order.
//! With no parts at all, the dataset's declared schema (when given) yields
//! a valid file without rows.

use super::reader::{decode_error, read_stream};
use super::writer::writer_properties;
use crate::io::traits::ConcatenatingWriter;
use crate::{Error, Result};
use arrow::datatypes::SchemaRef;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::io::{Read, Write};

/// Merges Parquet parts into one file.
pub struct ParquetConcatWriter<W: Write + Send> {
    /// Output stream until the first part creates the writer.
    stream: Option<W>,
    writer: Option<ArrowWriter<W>>,
    schema: Option<SchemaRef>,
    /// Schema for an empty output when no part arrives.
    fallback: Option<SchemaRef>,
    parts: usize,
}

impl<W: Write + Send> ParquetConcatWriter<W> {
    /// Creates a new Parquet concatenating writer.
    #[must_use]
    pub const fn new(stream: W) -> Self {
        Self {
            stream: Some(stream),
            writer: None,
            schema: None,
            fallback: None,
            parts: 0,
        }
    }

    /// Uses `schema` for the output file when no part is written.
    #[must_use]
    pub fn with_fallback_schema(mut self, schema: SchemaRef) -> Self {
        self.fallback = Some(schema);
        self
    }

    /// Number of parts merged so far.
    #[must_use]
    pub const fn parts(&self) -> usize {
        self.parts
    }

    fn writer_for(&mut self, schema: &SchemaRef) -> Result<&mut ArrowWriter<W>> {
        if let Some(first) = &self.schema {
            if first.fields() != schema.fields() {
                return Err(decode_error(format!(
                    "part {} schema does not match the first part",
                    self.parts + 1
                )));
            }
        } else {
            let stream = self
                .stream
                .take()
                .ok_or_else(|| Error::operation("concat_parquet", "output already released"))?;
            let writer =
                ArrowWriter::try_new(stream, SchemaRef::clone(schema), Some(writer_properties()))
                    .map_err(|e| Error::operation("create_parquet_writer", e))?;
            self.writer = Some(writer);
            self.schema = Some(SchemaRef::clone(schema));
        }
        self.writer
            .as_mut()
            .ok_or_else(|| Error::operation("concat_parquet", "output already released"))
    }
}

impl<W: Write + Send> ConcatenatingWriter for ParquetConcatWriter<W> {
    fn write_part(&mut self, part: &mut dyn Read) -> Result<()> {
        let data = read_stream(part)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(data)
            .map_err(|e| decode_error(format!("part {}: {e}", self.parts + 1)))?;
        let schema = SchemaRef::clone(builder.schema());
        let batches = builder.build().map_err(decode_error)?;

        let writer = self.writer_for(&schema)?;
        for batch in batches {
            let batch = batch.map_err(decode_error)?;
            writer
                .write(&batch)
                .map_err(|e| Error::operation("write_parquet", e))?;
        }
        writer
            .flush()
            .map_err(|e| Error::operation("flush_parquet", e))?;
        self.parts += 1;
        Ok(())
    }

    fn finalize(mut self: Box<Self>) -> Result<()> {
        if self.writer.is_none()
            && let Some(schema) = self.fallback.take()
        {
            self.writer_for(&schema)?;
        }

        let this = *self;
        if let Some(writer) = this.writer {
            writer
                .close()
                .map_err(|e| Error::operation("close_parquet", e))?;
        } else if let Some(mut stream) = this.stream {
            stream
                .flush()
                .map_err(|e| Error::operation("concat_finalize", e))?;
        }
        Ok(())
    }
}
