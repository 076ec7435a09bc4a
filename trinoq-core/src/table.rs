//! In-memory result tables
//!
//! A [`Table`] is an Arrow schema plus zero or more record batches sharing it.
//! Batches are an implementation detail: two tables with the same columns and
//! rows compare equal no matter how their rows are chunked.

use crate::error::{Result, TrinoqError};
use arrow_array::RecordBatch;
use arrow_schema::{DataType, SchemaRef};
use std::fmt;

/// Tabular query result with named, typed columns and ordered rows
#[derive(Debug, Clone)]
pub struct Table {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl Table {
    /// Create a table from a schema and batches that all share it
    pub fn new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Result<Self> {
        for batch in &batches {
            if !same_columns(&schema, &batch.schema()) {
                return Err(TrinoqError::Protocol(format!(
                    "record batch schema {:?} does not match table schema {:?}",
                    batch.schema(),
                    schema
                )));
            }
        }

        Ok(Self { schema, batches })
    }

    /// Create a table holding a single batch
    pub fn from_batch(batch: RecordBatch) -> Self {
        Self {
            schema: batch.schema(),
            batches: vec![batch],
        }
    }

    /// Create a table with columns but no rows
    pub fn empty(schema: SchemaRef) -> Self {
        Self {
            schema,
            batches: Vec::new(),
        }
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(|b| b.num_rows()).sum()
    }

    pub fn num_columns(&self) -> usize {
        self.schema.fields().len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// Column names in schema order
    pub fn column_names(&self) -> Vec<String> {
        self.schema.fields().iter().map(|f| f.name().clone()).collect()
    }

    /// Index of the first column with the given name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.schema.fields().iter().position(|f| f.name() == name)
    }

    /// Data type of the named column
    pub fn column_type(&self, name: &str) -> Option<&DataType> {
        self.column_index(name)
            .map(|i| self.schema.field(i).data_type())
    }

    /// Merge all batches into one, keeping row order
    pub fn concat(&self) -> Result<RecordBatch> {
        Ok(arrow_select::concat::concat_batches(
            &self.schema,
            &self.batches,
        )?)
    }

    /// Render the table with Arrow's pretty printer
    ///
    /// A table without rows still prints its header.
    pub fn to_pretty_string(&self) -> Result<String> {
        let rendered = if self.is_empty() {
            arrow_cast::pretty::pretty_format_batches(&[RecordBatch::new_empty(
                self.schema.clone(),
            )])?
        } else {
            arrow_cast::pretty::pretty_format_batches(&self.batches)?
        };

        Ok(rendered.to_string())
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        if !same_columns(&self.schema, &other.schema) {
            return false;
        }

        match (self.concat(), other.concat()) {
            (Ok(left), Ok(right)) => left.columns() == right.columns(),
            _ => false,
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_pretty_string() {
            Ok(rendered) => f.write_str(&rendered),
            Err(e) => write!(f, "<unprintable table: {}>", e),
        }
    }
}

/// Names, types and nullability match in order; schema metadata is ignored
fn same_columns(left: &SchemaRef, right: &SchemaRef) -> bool {
    left.fields().len() == right.fields().len()
        && left.fields().iter().zip(right.fields().iter()).all(|(l, r)| {
            l.name() == r.name()
                && l.data_type() == r.data_type()
                && l.is_nullable() == r.is_nullable()
        })
}
