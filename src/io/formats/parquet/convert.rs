//! Conversions between item values and Parquet cells.
//!
//! Writing is strict: a value whose runtime type does not fit the declared
//! column fails with [`Error::TypeConversion`]. Reading surfaces plain
//! columns as native values and logical columns (DATE, TIME) as display
//! strings.

use super::schema::{ColumnSpec, LogicalType, PhysicalType};
use crate::models::Value;
use crate::{Error, Result};
use arrow::array::{Array, AsArray};
use arrow::datatypes::{
    DataType, Date32Type, Float32Type, Float64Type, Int32Type, Int64Type, Time64MicrosecondType,
    Time64NanosecondType, TimeUnit, TimestampMicrosecondType, TimestampMillisecondType,
    TimestampNanosecondType, TimestampSecondType,
};
use chrono::{DateTime, NaiveTime, SecondsFormat, Utc};

const SECONDS_PER_DAY: i64 = 86_400;
const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// A converted value ready to be appended to a column buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// No value (optional columns only).
    Null,
    /// `boolean`
    Boolean(bool),
    /// `int32`, including DATE days.
    Int32(i32),
    /// `int64`, including TIME nanoseconds.
    Int64(i64),
    /// `float`
    Float(f32),
    /// `double`
    Double(f64),
    /// Plain `binary`.
    Bytes(Vec<u8>),
    /// `binary (STRING)`.
    Text(String),
}

impl Cell {
    /// Encoded size used for row group accounting.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        match self {
            Self::Null => 0,
            Self::Boolean(_) => 1,
            Self::Int32(_) | Self::Float(_) => 4,
            Self::Int64(_) | Self::Double(_) => 8,
            Self::Bytes(b) => b.len(),
            Self::Text(s) => s.len(),
        }
    }
}

/// Converts an item value for `column`.
///
/// # Errors
///
/// Returns a validation error when a required column has no value, and a
/// type conversion error when the value does not fit the column.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn to_cell(column: &ColumnSpec, value: Option<&Value>) -> Result<Cell> {
    let Some(value) = value.filter(|v| !v.is_null()) else {
        if column.required {
            return Err(Error::validation(
                &column.name,
                format!("column {} is required", column.name),
            ));
        }
        return Ok(Cell::Null);
    };
    let mismatch = || Error::TypeConversion {
        field: column.name.clone(),
        expected: column.to_string(),
        actual: value.to_string(),
    };

    match (column.physical, column.logical) {
        (PhysicalType::Boolean, _) => match value {
            Value::Boolean(b) => Ok(Cell::Boolean(*b)),
            _ => Err(mismatch()),
        },
        (PhysicalType::Int32, Some(LogicalType::Date)) => {
            let t = value.as_timestamp().ok_or_else(mismatch)?;
            i32::try_from(t.timestamp() / SECONDS_PER_DAY)
                .map(Cell::Int32)
                .map_err(|_| mismatch())
        },
        (PhysicalType::Int32, _) => match value {
            Value::Integer(i) => i32::try_from(*i).map(Cell::Int32).map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        (PhysicalType::Int64, Some(LogicalType::Time)) => value
            .as_timestamp()
            .and_then(|t| t.timestamp_nanos_opt())
            .map(Cell::Int64)
            .ok_or_else(mismatch),
        (PhysicalType::Int64, _) => match value {
            Value::Integer(i) => Ok(Cell::Int64(*i)),
            Value::Float(f) if f.is_finite() => Ok(Cell::Int64(f.trunc() as i64)),
            _ => Err(mismatch()),
        },
        (PhysicalType::Float, _) => match value {
            Value::Float(f) => Ok(Cell::Float(*f as f32)),
            Value::Integer(i) => Ok(Cell::Float(*i as f32)),
            _ => Err(mismatch()),
        },
        (PhysicalType::Double, _) => match value {
            Value::Float(f) => Ok(Cell::Double(*f)),
            Value::Integer(i) => Ok(Cell::Double(*i as f64)),
            _ => Err(mismatch()),
        },
        (PhysicalType::Binary, Some(LogicalType::String)) => match value {
            Value::String(s) => Ok(Cell::Text(s.clone())),
            Value::Sequence(_) | Value::Map(_) => Ok(Cell::Text(value.as_text())),
            _ => Err(mismatch()),
        },
        (PhysicalType::Binary, _) => match value {
            Value::Bytes(b) => Ok(Cell::Bytes(b.clone())),
            _ => Err(mismatch()),
        },
    }
}

fn unsupported(name: &str, data_type: &DataType) -> Error {
    Error::Decode {
        format: "parquet",
        message: format!("column {name} has unsupported type {data_type}"),
    }
}

fn out_of_range(name: &str) -> Error {
    Error::Decode {
        format: "parquet",
        message: format!("column {name} holds an out of range time value"),
    }
}

fn time_of_day(name: &str, nanos: i64) -> Result<Value> {
    let secs = u32::try_from(nanos.div_euclid(NANOS_PER_SECOND)).map_err(|_| out_of_range(name))?;
    let frac = u32::try_from(nanos.rem_euclid(NANOS_PER_SECOND)).map_err(|_| out_of_range(name))?;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, frac)
        .map(|t| Value::String(t.to_string()))
        .ok_or_else(|| out_of_range(name))
}

/// Reads row `row` of `array` as a native value.
///
/// # Errors
///
/// Returns a decode error for array types the codec does not handle.
pub fn native_value(name: &str, array: &dyn Array, row: usize) -> Result<Value> {
    if array.is_null(row) {
        return Ok(Value::Null);
    }
    let data_type = array.data_type();
    let wrong = || unsupported(name, data_type);

    let value = match data_type {
        DataType::Boolean => Value::Boolean(array.as_boolean_opt().ok_or_else(wrong)?.value(row)),
        DataType::Int32 => Value::Integer(i64::from(
            array.as_primitive_opt::<Int32Type>().ok_or_else(wrong)?.value(row),
        )),
        DataType::Int64 => {
            Value::Integer(array.as_primitive_opt::<Int64Type>().ok_or_else(wrong)?.value(row))
        },
        DataType::Float32 => Value::Float(f64::from(
            array.as_primitive_opt::<Float32Type>().ok_or_else(wrong)?.value(row),
        )),
        DataType::Float64 => {
            Value::Float(array.as_primitive_opt::<Float64Type>().ok_or_else(wrong)?.value(row))
        },
        DataType::Utf8 => Value::String(
            array.as_string_opt::<i32>().ok_or_else(wrong)?.value(row).to_string(),
        ),
        DataType::LargeUtf8 => Value::String(
            array.as_string_opt::<i64>().ok_or_else(wrong)?.value(row).to_string(),
        ),
        DataType::Utf8View => Value::String(
            array.as_string_view_opt().ok_or_else(wrong)?.value(row).to_string(),
        ),
        DataType::Binary => {
            Value::Bytes(array.as_binary_opt::<i32>().ok_or_else(wrong)?.value(row).to_vec())
        },
        DataType::LargeBinary => {
            Value::Bytes(array.as_binary_opt::<i64>().ok_or_else(wrong)?.value(row).to_vec())
        },
        DataType::BinaryView => {
            Value::Bytes(array.as_binary_view_opt().ok_or_else(wrong)?.value(row).to_vec())
        },
        DataType::Date32 => {
            let days = array.as_primitive_opt::<Date32Type>().ok_or_else(wrong)?.value(row);
            DateTime::from_timestamp(i64::from(days) * SECONDS_PER_DAY, 0)
                .map(Value::Timestamp)
                .ok_or_else(|| out_of_range(name))?
        },
        DataType::Timestamp(unit, _) => {
            let t = match unit {
                TimeUnit::Second => DateTime::from_timestamp(
                    array.as_primitive_opt::<TimestampSecondType>().ok_or_else(wrong)?.value(row),
                    0,
                ),
                TimeUnit::Millisecond => DateTime::from_timestamp_millis(
                    array
                        .as_primitive_opt::<TimestampMillisecondType>()
                        .ok_or_else(wrong)?
                        .value(row),
                ),
                TimeUnit::Microsecond => DateTime::from_timestamp_micros(
                    array
                        .as_primitive_opt::<TimestampMicrosecondType>()
                        .ok_or_else(wrong)?
                        .value(row),
                ),
                TimeUnit::Nanosecond => Some(DateTime::from_timestamp_nanos(
                    array
                        .as_primitive_opt::<TimestampNanosecondType>()
                        .ok_or_else(wrong)?
                        .value(row),
                )),
            };
            Value::Timestamp(t.ok_or_else(|| out_of_range(name))?)
        },
        DataType::Time64(TimeUnit::Nanosecond) => time_of_day(
            name,
            array.as_primitive_opt::<Time64NanosecondType>().ok_or_else(wrong)?.value(row),
        )?,
        DataType::Time64(TimeUnit::Microsecond) => time_of_day(
            name,
            array
                .as_primitive_opt::<Time64MicrosecondType>()
                .ok_or_else(wrong)?
                .value(row)
                .saturating_mul(1_000),
        )?,
        _ => return Err(wrong()),
    };
    Ok(value)
}

/// Applies the read-side rendering for logical columns.
///
/// DATE columns become `YYYY-MM-DD`, TIME columns RFC 3339 strings; plain
/// columns are returned unchanged.
#[must_use]
pub fn display_value(column: &ColumnSpec, value: Value) -> Value {
    match (column.logical, value) {
        (Some(LogicalType::Date), Value::Timestamp(t)) => {
            Value::String(t.date_naive().format("%Y-%m-%d").to_string())
        },
        (Some(LogicalType::Date), Value::Integer(days)) => days
            .checked_mul(SECONDS_PER_DAY)
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .map_or(Value::Integer(days), |t| {
                Value::String(t.date_naive().format("%Y-%m-%d").to_string())
            }),
        (Some(LogicalType::Time), Value::Timestamp(t)) => {
            Value::String(t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        },
        (Some(LogicalType::Time), Value::Integer(nanos)) => Value::String(
            DateTime::from_timestamp_nanos(nanos).to_rfc3339_opts(SecondsFormat::AutoSi, true),
        ),
        (Some(LogicalType::String), Value::Bytes(b)) => {
            Value::String(String::from_utf8_lossy(&b).into_owned())
        },
        (_, value) => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Date32Array, Int64Array, StringArray, TimestampNanosecondArray};

    fn column(physical: PhysicalType, logical: Option<LogicalType>, required: bool) -> ColumnSpec {
        ColumnSpec::new("c", physical, logical, required).unwrap()
    }

    #[test]
    fn test_int64_accepts_integers_and_truncates_floats() {
        let c = column(PhysicalType::Int64, None, false);
        assert_eq!(to_cell(&c, Some(&Value::Integer(42))).unwrap(), Cell::Int64(42));
        assert_eq!(to_cell(&c, Some(&Value::Float(3.9))).unwrap(), Cell::Int64(3));
        assert!(matches!(
            to_cell(&c, Some(&Value::from("42"))),
            Err(Error::TypeConversion { .. })
        ));
    }

    #[test]
    fn test_int32_overflow() {
        let c = column(PhysicalType::Int32, None, false);
        assert_eq!(to_cell(&c, Some(&Value::Integer(7))).unwrap(), Cell::Int32(7));
        let err = to_cell(&c, Some(&Value::Integer(i64::MAX))).unwrap_err();
        assert!(err.is_record_scoped());
    }

    #[test]
    fn test_date_day_count() {
        let c = column(PhysicalType::Int32, Some(LogicalType::Date), false);
        let t = DateTime::parse_from_rfc3339("2021-03-04T15:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        // 2021-03-04 is day 18690 after 1970-01-01
        assert_eq!(to_cell(&c, Some(&Value::Timestamp(t))).unwrap(), Cell::Int32(18_690));
        assert_eq!(
            to_cell(&c, Some(&Value::from("2021-03-04"))).unwrap(),
            Cell::Int32(18_690)
        );
        assert!(to_cell(&c, Some(&Value::Integer(5))).is_err());
    }

    #[test]
    fn test_time_nanos() {
        let c = column(PhysicalType::Int64, Some(LogicalType::Time), false);
        let cell = to_cell(&c, Some(&Value::from("1970-01-01T00:00:01.5Z"))).unwrap();
        assert_eq!(cell, Cell::Int64(1_500_000_000));
    }

    #[test]
    fn test_string_joins_sequences() {
        let c = column(PhysicalType::Binary, Some(LogicalType::String), false);
        let value = Value::from(vec!["a", "b"]);
        assert_eq!(to_cell(&c, Some(&value)).unwrap(), Cell::Text("a,b".into()));
        assert!(to_cell(&c, Some(&Value::Integer(1))).is_err());
    }

    #[test]
    fn test_plain_binary_requires_bytes() {
        let c = column(PhysicalType::Binary, None, false);
        assert_eq!(
            to_cell(&c, Some(&Value::Bytes(vec![1, 2]))).unwrap(),
            Cell::Bytes(vec![1, 2])
        );
        assert!(to_cell(&c, Some(&Value::from("x"))).is_err());
    }

    #[test]
    fn test_required_and_optional_absence() {
        let optional = column(PhysicalType::Boolean, None, false);
        assert_eq!(to_cell(&optional, None).unwrap(), Cell::Null);
        assert_eq!(to_cell(&optional, Some(&Value::Null)).unwrap(), Cell::Null);

        let required = column(PhysicalType::Boolean, None, true);
        assert!(matches!(
            to_cell(&required, None),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn test_byte_size() {
        assert_eq!(Cell::Int64(1).byte_size(), 8);
        assert_eq!(Cell::Text("abc".into()).byte_size(), 3);
        assert_eq!(Cell::Null.byte_size(), 0);
    }

    #[test]
    fn test_read_side_rendering() {
        let dates = Date32Array::from(vec![Some(18_690), None]);
        let date_col = column(PhysicalType::Int32, Some(LogicalType::Date), false);
        let value = native_value("c", &dates, 0).unwrap();
        assert_eq!(display_value(&date_col, value), Value::from("2021-03-04"));
        assert_eq!(native_value("c", &dates, 1).unwrap(), Value::Null);

        let times = TimestampNanosecondArray::from(vec![1_500_000_000]).with_timezone("UTC");
        let time_col = column(PhysicalType::Int64, Some(LogicalType::Time), false);
        let value = native_value("c", &times, 0).unwrap();
        assert_eq!(
            display_value(&time_col, value),
            Value::from("1970-01-01T00:00:01.500Z")
        );

        let ints = Int64Array::from(vec![9]);
        let plain = column(PhysicalType::Int64, None, false);
        let value = native_value("c", &ints, 0).unwrap();
        assert_eq!(display_value(&plain, value), Value::Integer(9));

        let strings = StringArray::from(vec!["x"]);
        assert_eq!(native_value("c", &strings, 0).unwrap(), Value::from("x"));
    }
}
