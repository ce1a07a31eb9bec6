//! Row-group buffering Parquet writer.

use super::ParquetConfig;
use super::convert::{Cell, to_cell};
use super::schema::{ColumnSpec, LogicalType, ParquetSchema, PhysicalType};
use crate::io::traits::ItemWriter;
use crate::models::{Item, Value};
use crate::{Error, Result};
use arrow::array::{
    ArrayRef, BinaryArray, BooleanArray, Date32Array, Float32Array, Float64Array, Int32Array,
    Int64Array, StringArray, TimestampNanosecondArray,
};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::io::Write;
use std::sync::Arc;

/// Writer properties shared by item and concatenating writers.
pub(super) fn writer_properties() -> WriterProperties {
    WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build()
}

macro_rules! collect_cells {
    ($cells:expr, $variant:ident) => {
        $cells
            .iter()
            .map(|cell| match cell {
                Cell::$variant(v) => Some(*v),
                _ => None,
            })
            .collect::<Vec<_>>()
    };
}

/// Builds the Arrow array for one column of buffered cells.
fn build_array(column: &ColumnSpec, cells: &[Cell]) -> ArrayRef {
    match (column.physical, column.logical) {
        (PhysicalType::Boolean, _) => Arc::new(BooleanArray::from(collect_cells!(cells, Boolean))),
        (PhysicalType::Int32, Some(LogicalType::Date)) => {
            Arc::new(Date32Array::from(collect_cells!(cells, Int32)))
        },
        (PhysicalType::Int32, _) => Arc::new(Int32Array::from(collect_cells!(cells, Int32))),
        (PhysicalType::Int64, Some(LogicalType::Time)) => Arc::new(
            TimestampNanosecondArray::from(collect_cells!(cells, Int64)).with_timezone("UTC"),
        ),
        (PhysicalType::Int64, _) => Arc::new(Int64Array::from(collect_cells!(cells, Int64))),
        (PhysicalType::Float, _) => Arc::new(Float32Array::from(collect_cells!(cells, Float))),
        (PhysicalType::Double, _) => Arc::new(Float64Array::from(collect_cells!(cells, Double))),
        (PhysicalType::Binary, Some(LogicalType::String)) => {
            let values: Vec<Option<&str>> = cells
                .iter()
                .map(|cell| match cell {
                    Cell::Text(s) => Some(s.as_str()),
                    _ => None,
                })
                .collect();
            Arc::new(StringArray::from(values))
        },
        (PhysicalType::Binary, _) => {
            let values: Vec<Option<&[u8]>> = cells
                .iter()
                .map(|cell| match cell {
                    Cell::Bytes(b) => Some(b.as_slice()),
                    _ => None,
                })
                .collect();
            Arc::new(BinaryArray::from(values))
        },
    }
}

fn field<'a>(native: &'a [(String, Value)], name: &str) -> Option<&'a Value> {
    native.iter().find(|(field, _)| field == name).map(|(_, v)| v)
}

/// Writes items into row groups, flushing each one once its buffered size
/// exceeds the configured threshold.
pub struct ParquetItemWriter<W: Write + Send> {
    writer: ArrowWriter<W>,
    schema: ParquetSchema,
    arrow_schema: SchemaRef,
    columns: Vec<Vec<Cell>>,
    buffered_bytes: usize,
    flush_threshold: usize,
    row_groups_flushed: usize,
}

impl<W: Write + Send> ParquetItemWriter<W> {
    /// Creates a new writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the Parquet writer cannot be created.
    pub fn new(stream: W, config: ParquetConfig) -> Result<Self> {
        let arrow_schema = config.schema.arrow_schema();
        let writer = ArrowWriter::try_new(stream, Arc::clone(&arrow_schema), Some(writer_properties()))
            .map_err(|e| Error::operation("create_parquet_writer", e))?;
        let columns = vec![Vec::new(); config.schema.columns().len()];
        Ok(Self {
            writer,
            schema: config.schema,
            arrow_schema,
            columns,
            buffered_bytes: 0,
            flush_threshold: config.flush_threshold,
            row_groups_flushed: 0,
        })
    }

    /// Number of row groups flushed so far.
    #[must_use]
    pub const fn row_groups_flushed(&self) -> usize {
        self.row_groups_flushed
    }

    /// Bytes currently buffered in the open row group.
    #[must_use]
    pub const fn buffered_bytes(&self) -> usize {
        self.buffered_bytes
    }

    fn buffered_rows(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    /// Writes the buffered rows as one row group.
    fn flush_row_group(&mut self) -> Result<()> {
        if self.buffered_rows() == 0 {
            return Ok(());
        }
        let arrays: Vec<ArrayRef> = self
            .schema
            .columns()
            .iter()
            .zip(&self.columns)
            .map(|(column, cells)| build_array(column, cells))
            .collect();
        let batch = RecordBatch::try_new(Arc::clone(&self.arrow_schema), arrays)
            .map_err(|e| Error::operation("build_parquet_batch", e))?;
        self.writer
            .write(&batch)
            .map_err(|e| Error::operation("write_parquet", e))?;
        self.writer
            .flush()
            .map_err(|e| Error::operation("flush_parquet", e))?;

        for cells in &mut self.columns {
            cells.clear();
        }
        self.buffered_bytes = 0;
        self.row_groups_flushed += 1;
        Ok(())
    }
}

impl<W: Write + Send> ItemWriter for ParquetItemWriter<W> {
    fn write(&mut self, item: &Item) -> Result<bool> {
        // Convert the whole row before buffering any of it.
        let row = self
            .schema
            .columns()
            .iter()
            .map(|column| to_cell(column, field(item.native(), &column.name)))
            .collect::<Result<Vec<_>>>()?;

        for (cells, cell) in self.columns.iter_mut().zip(row) {
            self.buffered_bytes += cell.byte_size();
            cells.push(cell);
        }

        if self.buffered_bytes > self.flush_threshold {
            self.flush_row_group()?;
        }
        Ok(true)
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        self.flush_row_group()?;
        self.writer
            .close()
            .map_err(|e| Error::operation("close_parquet", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceConfig;
    use serde_json::json;

    fn config(threshold: usize) -> ParquetConfig {
        ParquetConfig::from_source(
            &SourceConfig::from_json(json!({
                "encoding": "parquet",
                "schema": "message m { required int64 id; optional binary name (STRING); }",
                "flush_threshold": threshold
            }))
            .unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_flushes_once_threshold_is_exceeded() {
        let mut writer = ParquetItemWriter::new(Vec::new(), config(10)).unwrap();

        writer.write(&Item::new().with("id", 1)).unwrap();
        assert_eq!(writer.row_groups_flushed(), 0);
        assert_eq!(writer.buffered_bytes(), 8);

        writer.write(&Item::new().with("id", 2)).unwrap();
        assert_eq!(writer.row_groups_flushed(), 1);
        assert_eq!(writer.buffered_bytes(), 0);

        writer.write(&Item::new().with("id", 3)).unwrap();
        assert_eq!(writer.row_groups_flushed(), 1);
    }

    #[test]
    fn test_default_threshold_keeps_one_row_group() {
        let mut writer = ParquetItemWriter::new(Vec::new(), config(1_048_576)).unwrap();
        for i in 0..100 {
            writer.write(&Item::new().with("id", i).with("name", "x")).unwrap();
        }
        assert_eq!(writer.row_groups_flushed(), 0);
        assert_eq!(writer.buffered_bytes(), 900);
    }

    #[test]
    fn test_rejected_row_leaves_no_partial_state() {
        let mut writer = ParquetItemWriter::new(Vec::new(), config(1024)).unwrap();
        let err = writer
            .write(&Item::new().with("id", "not a number").with("name", "x"))
            .unwrap_err();
        assert!(err.is_record_scoped());
        assert_eq!(writer.buffered_bytes(), 0);
        assert_eq!(writer.buffered_rows(), 0);

        let err = writer.write(&Item::new().with("name", "x")).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let mut writer = ParquetItemWriter::new(Vec::new(), config(1024)).unwrap();
        writer.write(&Item::new().with("id", 1).with("other", true)).unwrap();
        assert_eq!(writer.buffered_rows(), 1);
    }
}
