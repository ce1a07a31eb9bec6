//! Schema-driven Parquet reader.

use super::convert::{display_value, native_value};
use super::schema::{ColumnSpec, ParquetSchema};
use crate::io::traits::ItemReader;
use crate::models::{Item, Value};
use crate::{Error, Result};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use std::io::Read;

pub(super) fn decode_error(message: impl std::fmt::Display) -> Error {
    Error::Decode {
        format: "parquet",
        message: message.to_string(),
    }
}

/// Reads a whole stream into memory; Parquet footers sit at the end.
pub(super) fn read_stream(stream: &mut dyn Read) -> Result<Bytes> {
    let mut buf = Vec::new();
    stream
        .read_to_end(&mut buf)
        .map_err(|e| Error::operation("read_parquet", e))?;
    Ok(Bytes::from(buf))
}

/// Reads the declared columns of a Parquet file, one item per row.
///
/// Null cells leave the field absent.
pub struct ParquetItemReader {
    batches: ParquetRecordBatchReader,
    /// Declared columns with their index in the file schema.
    columns: Vec<(ColumnSpec, usize)>,
    current: Option<RecordBatch>,
    row: usize,
}

impl ParquetItemReader {
    /// Opens a reader over the full contents of `stream`.
    ///
    /// # Errors
    ///
    /// Returns a decode error if the stream is not a Parquet file or lacks a
    /// declared column.
    pub fn new<R: Read>(mut stream: R, schema: &ParquetSchema) -> Result<Self> {
        let data = read_stream(&mut stream)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(data).map_err(decode_error)?;
        let file_schema = builder.schema();

        let columns = schema
            .columns()
            .iter()
            .map(|column| {
                file_schema
                    .index_of(&column.name)
                    .map(|index| (column.clone(), index))
                    .map_err(|_| decode_error(format!("column {} is missing from file", column.name)))
            })
            .collect::<Result<Vec<_>>>()?;

        let batches = builder.build().map_err(decode_error)?;
        Ok(Self {
            batches,
            columns,
            current: None,
            row: 0,
        })
    }

    fn item_at(&self, batch: &RecordBatch, row: usize) -> Result<Item> {
        let mut item = Item::with_capacity(self.columns.len());
        for (column, index) in &self.columns {
            let value = native_value(&column.name, batch.column(*index).as_ref(), row)?;
            if value != Value::Null {
                item.set(column.name.as_str(), display_value(column, value));
            }
        }
        Ok(item)
    }
}

impl ItemReader for ParquetItemReader {
    fn read(&mut self) -> Result<Option<Item>> {
        loop {
            if let Some(batch) = &self.current
                && self.row < batch.num_rows()
            {
                let item = self.item_at(batch, self.row)?;
                self.row += 1;
                return Ok(Some(item));
            }
            match self.batches.next() {
                None => {
                    self.current = None;
                    return Ok(None);
                },
                Some(batch) => {
                    self.current = Some(batch.map_err(decode_error)?);
                    self.row = 0;
                },
            }
        }
    }
}
