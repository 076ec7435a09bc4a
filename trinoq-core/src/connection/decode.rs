//! Conversion of Trino JSON rows into Arrow tables
//!
//! Trino reports every column with a type signature and ships row values as
//! JSON. Types with a lossless Arrow counterpart get one; everything else is
//! kept as text so nothing is silently rounded or re-zoned.

use crate::connection::protocol::Column;
use crate::error::{Result, TrinoqError};
use crate::table::Table;
use arrow_array::builder::{
    BooleanBuilder, Date32Builder, Float64Builder, Int64Builder, StringBuilder,
    TimestampMicrosecondBuilder,
};
use arrow_array::{ArrayRef, RecordBatch};
use arrow_schema::{DataType, Field, Schema, TimeUnit};
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::sync::Arc;

/// Arrow representation chosen for a Trino type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    Boolean,
    Date,
    Timestamp,
    Text,
}

impl ColumnKind {
    /// Classify a Trino type signature such as `bigint` or `timestamp(3)`
    pub fn from_trino_type(type_name: &str) -> Self {
        let lowered = type_name.trim().to_ascii_lowercase();
        let (base, args) = match lowered.split_once('(') {
            Some((base, rest)) => (base.trim(), rest.split(')').next().unwrap_or("")),
            None => (lowered.as_str(), ""),
        };

        match base {
            "tinyint" | "smallint" | "integer" | "int" | "bigint" => ColumnKind::Integer,
            "real" | "double" => ColumnKind::Float,
            "boolean" => ColumnKind::Boolean,
            "date" => ColumnKind::Date,
            "timestamp" if !lowered.contains("with time zone") => {
                // timestamp without precision means timestamp(3)
                let precision = args.trim().parse::<u32>().unwrap_or(3);
                if precision <= 6 {
                    ColumnKind::Timestamp
                } else {
                    ColumnKind::Text
                }
            }
            _ => ColumnKind::Text,
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            ColumnKind::Integer => DataType::Int64,
            ColumnKind::Float => DataType::Float64,
            ColumnKind::Boolean => DataType::Boolean,
            ColumnKind::Date => DataType::Date32,
            ColumnKind::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, None),
            ColumnKind::Text => DataType::Utf8,
        }
    }
}

/// Build a table from column descriptions and row-major JSON data
pub fn build_table(columns: &[Column], rows: &[Vec<Value>]) -> Result<Table> {
    let kinds: Vec<ColumnKind> = columns
        .iter()
        .map(|c| ColumnKind::from_trino_type(&c.type_name))
        .collect();

    let schema = Arc::new(Schema::new(
        columns
            .iter()
            .zip(&kinds)
            .map(|(c, kind)| Field::new(&c.name, kind.data_type(), true))
            .collect::<Vec<_>>(),
    ));

    if columns.is_empty() {
        return Ok(Table::empty(schema));
    }

    for (i, row) in rows.iter().enumerate() {
        if row.len() != columns.len() {
            return Err(TrinoqError::Protocol(format!(
                "row {} has {} values, expected {}",
                i,
                row.len(),
                columns.len()
            )));
        }
    }

    let arrays = columns
        .iter()
        .zip(&kinds)
        .enumerate()
        .map(|(index, (column, kind))| build_column(column, *kind, rows.iter().map(|r| &r[index])))
        .collect::<Result<Vec<ArrayRef>>>()?;

    let batch = RecordBatch::try_new(schema, arrays)?;
    Ok(Table::from_batch(batch))
}

fn build_column<'a>(
    column: &Column,
    kind: ColumnKind,
    values: impl Iterator<Item = &'a Value>,
) -> Result<ArrayRef> {
    let bad = |value: &Value| {
        TrinoqError::Protocol(format!(
            "column {:?} of type {} got unexpected value {}",
            column.name, column.type_name, value
        ))
    };

    let array: ArrayRef = match kind {
        ColumnKind::Integer => {
            let mut builder = Int64Builder::new();
            for value in values {
                match value {
                    Value::Null => builder.append_null(),
                    Value::Number(n) => builder.append_value(n.as_i64().ok_or_else(|| bad(value))?),
                    Value::String(s) => builder.append_value(s.parse().map_err(|_| bad(value))?),
                    _ => return Err(bad(value)),
                }
            }
            Arc::new(builder.finish())
        }
        ColumnKind::Float => {
            let mut builder = Float64Builder::new();
            for value in values {
                match value {
                    Value::Null => builder.append_null(),
                    Value::Number(n) => builder.append_value(n.as_f64().ok_or_else(|| bad(value))?),
                    // Non-finite values travel as strings
                    Value::String(s) => builder.append_value(parse_special_float(s).ok_or_else(|| bad(value))?),
                    _ => return Err(bad(value)),
                }
            }
            Arc::new(builder.finish())
        }
        ColumnKind::Boolean => {
            let mut builder = BooleanBuilder::new();
            for value in values {
                match value {
                    Value::Null => builder.append_null(),
                    Value::Bool(b) => builder.append_value(*b),
                    _ => return Err(bad(value)),
                }
            }
            Arc::new(builder.finish())
        }
        ColumnKind::Date => {
            let mut builder = Date32Builder::new();
            for value in values {
                match value {
                    Value::Null => builder.append_null(),
                    Value::String(s) => builder.append_value(parse_date(s).ok_or_else(|| bad(value))?),
                    _ => return Err(bad(value)),
                }
            }
            Arc::new(builder.finish())
        }
        ColumnKind::Timestamp => {
            let mut builder = TimestampMicrosecondBuilder::new();
            for value in values {
                match value {
                    Value::Null => builder.append_null(),
                    Value::String(s) => builder.append_value(parse_timestamp(s).ok_or_else(|| bad(value))?),
                    _ => return Err(bad(value)),
                }
            }
            Arc::new(builder.finish())
        }
        ColumnKind::Text => {
            let mut builder = StringBuilder::new();
            for value in values {
                match value {
                    Value::Null => builder.append_null(),
                    Value::String(s) => builder.append_value(s),
                    // Arrays, maps, rows and numeric decimals keep their JSON text
                    other => builder.append_value(other.to_string()),
                }
            }
            Arc::new(builder.finish())
        }
    };

    Ok(array)
}

fn parse_special_float(s: &str) -> Option<f64> {
    match s {
        "NaN" => Some(f64::NAN),
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        other => other.parse().ok(),
    }
}

/// Days since the Unix epoch
fn parse_date(s: &str) -> Option<i32> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    i32::try_from((date - epoch).num_days()).ok()
}

/// Microseconds since the Unix epoch, fractional seconds optional
fn parse_timestamp(s: &str) -> Option<i64> {
    let parsed = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").ok()?;
    Some(parsed.and_utc().timestamp_micros())
}
