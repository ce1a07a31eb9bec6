//! Column schema for the Parquet codec.
//!
//! A schema is either a Parquet message type
//! (`message m { required int64 id; optional binary name (STRING); }`) or a
//! declarative list of `{name, type, required, logicalType}` entries. Both
//! end up as ordered [`ColumnSpec`]s.

use crate::{Error, Result};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use parquet::arrow::parquet_to_arrow_schema;
use parquet::schema::parser::parse_message_type;
use parquet::schema::types::SchemaDescriptor;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

/// Physical storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysicalType {
    /// `boolean`
    Boolean,
    /// `int32`
    Int32,
    /// `int64`
    Int64,
    /// `float`
    Float,
    /// `double`
    Double,
    /// `binary` / `byte_array`
    Binary,
}

impl PhysicalType {
    fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "boolean" | "bool" => Ok(Self::Boolean),
            "int32" | "int" => Ok(Self::Int32),
            "int64" | "long" => Ok(Self::Int64),
            "float" => Ok(Self::Float),
            "double" => Ok(Self::Double),
            "binary" | "byte_array" | "bytes" => Ok(Self::Binary),
            other => Err(Error::Configuration(format!("unknown column type: {other}"))),
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float => "float",
            Self::Double => "double",
            Self::Binary => "binary",
        }
    }
}

/// Logical annotation of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalType {
    /// UTF-8 text stored as binary.
    String,
    /// Days since the epoch stored as int32.
    Date,
    /// Nanoseconds since the epoch stored as int64.
    Time,
}

impl LogicalType {
    fn parse(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "STRING" | "UTF8" => Ok(Self::String),
            "DATE" => Ok(Self::Date),
            "TIME" | "TIMESTAMP" => Ok(Self::Time),
            other => Err(Error::Configuration(format!("unknown logical type: {other}"))),
        }
    }

    const fn storage(self) -> PhysicalType {
        match self {
            Self::String => PhysicalType::Binary,
            Self::Date => PhysicalType::Int32,
            Self::Time => PhysicalType::Int64,
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Date => "DATE",
            Self::Time => "TIME",
        }
    }
}

/// One declared column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Column name, matched against item field names.
    pub name: String,
    /// Physical type.
    pub physical: PhysicalType,
    /// Optional logical annotation.
    pub logical: Option<LogicalType>,
    /// Whether every row must carry a value.
    pub required: bool,
}

impl fmt::Display for ColumnSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.logical {
            Some(logical) => write!(f, "{} ({})", self.physical.as_str(), logical.as_str()),
            None => f.write_str(self.physical.as_str()),
        }
    }
}

impl ColumnSpec {
    /// Creates a column, checking that the logical type fits the storage type.
    ///
    /// # Errors
    ///
    /// Returns an error for combinations such as `int64 (DATE)`.
    pub fn new(
        name: impl Into<String>,
        physical: PhysicalType,
        logical: Option<LogicalType>,
        required: bool,
    ) -> Result<Self> {
        let name = name.into();
        if let Some(logical) = logical
            && logical.storage() != physical
        {
            return Err(Error::Configuration(format!(
                "column {name}: logical type {} requires {}, got {}",
                logical.as_str(),
                logical.storage().as_str(),
                physical.as_str()
            )));
        }
        Ok(Self {
            name,
            physical,
            logical,
            required,
        })
    }

    /// Arrow type used when writing this column.
    #[must_use]
    pub fn arrow_type(&self) -> DataType {
        match (self.physical, self.logical) {
            (PhysicalType::Boolean, _) => DataType::Boolean,
            (PhysicalType::Int32, Some(LogicalType::Date)) => DataType::Date32,
            (PhysicalType::Int32, _) => DataType::Int32,
            (PhysicalType::Int64, Some(LogicalType::Time)) => {
                DataType::Timestamp(TimeUnit::Nanosecond, Some("UTC".into()))
            },
            (PhysicalType::Int64, _) => DataType::Int64,
            (PhysicalType::Float, _) => DataType::Float32,
            (PhysicalType::Double, _) => DataType::Float64,
            (PhysicalType::Binary, Some(LogicalType::String)) => DataType::Utf8,
            (PhysicalType::Binary, _) => DataType::Binary,
        }
    }

    /// Arrow field used when writing this column.
    #[must_use]
    pub fn arrow_field(&self) -> Field {
        Field::new(&self.name, self.arrow_type(), !self.required)
    }

    fn from_arrow_field(field: &Field) -> Result<Self> {
        let (physical, logical) = match field.data_type() {
            DataType::Boolean => (PhysicalType::Boolean, None),
            DataType::Int32 => (PhysicalType::Int32, None),
            DataType::Date32 => (PhysicalType::Int32, Some(LogicalType::Date)),
            DataType::Int64 => (PhysicalType::Int64, None),
            DataType::Timestamp(_, _) | DataType::Time64(_) => {
                (PhysicalType::Int64, Some(LogicalType::Time))
            },
            DataType::Float32 => (PhysicalType::Float, None),
            DataType::Float64 => (PhysicalType::Double, None),
            DataType::Binary | DataType::LargeBinary | DataType::BinaryView => {
                (PhysicalType::Binary, None)
            },
            DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => {
                (PhysicalType::Binary, Some(LogicalType::String))
            },
            other => {
                return Err(Error::Configuration(format!(
                    "column {} has unsupported type {other}",
                    field.name()
                )));
            },
        };
        Self::new(field.name(), physical, logical, !field.is_nullable())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ColumnDeclaration {
    name: String,
    #[serde(rename = "type")]
    physical: String,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    logical_type: Option<String>,
}

/// Ordered column declarations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParquetSchema {
    columns: Vec<ColumnSpec>,
}

impl ParquetSchema {
    /// Creates a schema from columns.
    ///
    /// # Errors
    ///
    /// Returns an error if the list is empty or names repeat.
    pub fn new(columns: Vec<ColumnSpec>) -> Result<Self> {
        if columns.is_empty() {
            return Err(Error::Configuration("schema has no columns".to_string()));
        }
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == column.name) {
                return Err(Error::Configuration(format!(
                    "schema declares column {} more than once",
                    column.name
                )));
            }
        }
        Ok(Self { columns })
    }

    /// Parses a Parquet message type.
    ///
    /// # Errors
    ///
    /// Returns an error if the text does not parse or uses nested or
    /// unsupported types.
    pub fn parse_message(text: &str) -> Result<Self> {
        let message = parse_message_type(text)
            .map_err(|e| Error::Configuration(format!("invalid schema: {e}")))?;
        let descriptor = SchemaDescriptor::new(Arc::new(message));
        let arrow = parquet_to_arrow_schema(&descriptor, None)
            .map_err(|e| Error::Configuration(format!("invalid schema: {e}")))?;
        Self::from_arrow(&arrow)
    }

    /// Builds a schema from `{name, type, required, logicalType}` entries.
    ///
    /// # Errors
    ///
    /// Returns an error if an entry is malformed.
    pub fn from_declarations(entries: &[JsonValue]) -> Result<Self> {
        let columns = entries
            .iter()
            .map(|entry| {
                let decl: ColumnDeclaration = serde_json::from_value(entry.clone())
                    .map_err(|e| Error::Configuration(format!("invalid schema column: {e}")))?;
                let physical = PhysicalType::parse(&decl.physical)?;
                let logical = decl.logical_type.as_deref().map(LogicalType::parse).transpose()?;
                ColumnSpec::new(decl.name, physical, logical, decl.required)
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(columns)
    }

    /// Builds a schema from an Arrow schema.
    ///
    /// # Errors
    ///
    /// Returns an error if a field type is unsupported.
    pub fn from_arrow(schema: &Schema) -> Result<Self> {
        let columns = schema
            .fields()
            .iter()
            .map(|f| ColumnSpec::from_arrow_field(f))
            .collect::<Result<Vec<_>>>()?;
        Self::new(columns)
    }

    /// Parses the `schema` value of a source config.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is absent or malformed.
    pub fn from_config_value(value: Option<&JsonValue>) -> Result<Self> {
        match value {
            Some(JsonValue::String(text)) => Self::parse_message(text),
            Some(JsonValue::Array(entries)) => Self::from_declarations(entries),
            Some(other) => Err(Error::Configuration(format!(
                "schema must be a message type string or a column list, got {other}"
            ))),
            None => Err(Error::Configuration("schema is required".to_string())),
        }
    }

    /// Declared columns in order.
    #[must_use]
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Declared column names in order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Arrow schema used by the writer.
    #[must_use]
    pub fn arrow_schema(&self) -> SchemaRef {
        Arc::new(Schema::new(
            self.columns
                .iter()
                .map(ColumnSpec::arrow_field)
                .collect::<Vec<_>>(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_message_type() {
        let schema = ParquetSchema::parse_message(
            "message people {
                required int64 id;
                optional binary name (STRING);
                optional int32 born (DATE);
                optional int64 seen (TIMESTAMP(NANOS,true));
                optional double score;
                optional boolean active;
                optional binary blob;
            }",
        )
        .unwrap();

        let columns = schema.columns();
        assert_eq!(columns.len(), 7);
        assert_eq!(columns[0].physical, PhysicalType::Int64);
        assert!(columns[0].required);
        assert_eq!(columns[1].logical, Some(LogicalType::String));
        assert!(!columns[1].required);
        assert_eq!(columns[2].logical, Some(LogicalType::Date));
        assert_eq!(columns[3].logical, Some(LogicalType::Time));
        assert_eq!(columns[4].physical, PhysicalType::Double);
        assert_eq!(columns[6].logical, None);
    }

    #[test]
    fn test_parse_message_errors() {
        assert!(ParquetSchema::parse_message("not a schema").is_err());
        assert!(
            ParquetSchema::parse_message("message m { repeated int32 xs; }").is_err()
        );
    }

    #[test]
    fn test_declarations() {
        let schema = ParquetSchema::from_config_value(Some(&json!([
            {"name": "id", "type": "int64", "required": true},
            {"name": "day", "type": "int32", "logicalType": "DATE"},
            {"name": "name", "type": "binary", "logicalType": "UTF8"}
        ])))
        .unwrap();
        assert_eq!(schema.names(), vec!["id", "day", "name"]);
        assert_eq!(schema.columns()[1].arrow_type(), DataType::Date32);
        assert_eq!(schema.columns()[2].arrow_type(), DataType::Utf8);
        assert_eq!(schema.columns()[1].to_string(), "int32 (DATE)");
    }

    #[test]
    fn test_declaration_errors() {
        assert!(ParquetSchema::from_config_value(None).is_err());
        assert!(ParquetSchema::from_config_value(Some(&json!(3))).is_err());
        assert!(
            ParquetSchema::from_declarations(&[json!({"name": "x", "type": "int64", "logicalType": "DATE"})])
                .is_err()
        );
        assert!(
            ParquetSchema::from_declarations(&[
                json!({"name": "x", "type": "int64"}),
                json!({"name": "x", "type": "int32"})
            ])
            .is_err()
        );
        assert!(ParquetSchema::from_declarations(&[]).is_err());
    }

    #[test]
    fn test_arrow_round_trip() {
        let schema = ParquetSchema::from_declarations(&[
            json!({"name": "t", "type": "int64", "logicalType": "TIME", "required": true}),
            json!({"name": "f", "type": "float"}),
        ])
        .unwrap();
        let arrow = schema.arrow_schema();
        assert!(!arrow.field(0).is_nullable());
        assert_eq!(ParquetSchema::from_arrow(&arrow).unwrap(), schema);
    }
}
