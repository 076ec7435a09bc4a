//! Expression evaluator for inspecting a result table
//!
//! A program is one expression per line. Blank lines and lines starting with
//! `#` are skipped. Every expression reads the table and produces a
//! [`Value`]; the table itself is never modified.
//!
//! ```text
//! shape                 (rows, columns)
//! columns               column names
//! dtypes                name: type, one per line
//! count                 number of rows
//! head(n) / tail(n)     first / last n rows, n defaults to 5
//! select(a, b, ...)     only the named columns
//! sum(c) min(c) max(c)  aggregates over a numeric column (min/max also on text)
//! mean(c)               average of a numeric column
//! nulls(c)              null count of a column
//! distinct(c)           number of distinct non-null values
//! ```
//!
//! Column names containing spaces or punctuation can be written in double
//! quotes: `sum("order total")`.
//!
//! The language has no variables, no assignment and no way to reach the
//! filesystem, the network or other processes.

use arrow_arith::aggregate;
use arrow_array::cast::AsArray;
use arrow_array::types::{Float64Type, Int64Type};
use arrow_array::{Array, ArrayRef, RecordBatch};
use arrow_cast::cast::{cast_with_options, CastOptions};
use arrow_cast::display::{ArrayFormatter, FormatOptions};
use arrow_schema::{ArrowError, DataType};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;
use trinoq_core::{Table, TrinoqError};

/// Rows shown by `head` and `tail` without an argument
pub const DEFAULT_PREVIEW_ROWS: usize = 5;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("unknown function `{0}`")]
    UnknownFunction(String),

    #[error("`{function}` takes {expected}, got {got} argument(s)")]
    Arity {
        function: String,
        expected: &'static str,
        got: usize,
    },

    #[error("no column named {0:?}")]
    UnknownColumn(String),

    #[error("`{function}` needs a numeric column, {column:?} is {data_type}")]
    NotNumeric {
        function: &'static str,
        column: String,
        data_type: DataType,
    },

    #[error("line {line}: {source}")]
    Line {
        line: usize,
        source: Box<EvalError>,
    },

    #[error(transparent)]
    Arrow(#[from] ArrowError),

    #[error(transparent)]
    Table(#[from] TrinoqError),
}

/// A parsed expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Shape,
    Columns,
    Dtypes,
    Count,
    Head(usize),
    Tail(usize),
    Select(Vec<String>),
    Aggregate(Aggregate, String),
    Nulls(String),
    Distinct(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Sum,
    Min,
    Max,
    Mean,
}

impl Aggregate {
    fn name(&self) -> &'static str {
        match self {
            Aggregate::Sum => "sum",
            Aggregate::Min => "min",
            Aggregate::Max => "max",
            Aggregate::Mean => "mean",
        }
    }
}

/// Single value produced by an aggregate
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
    Null,
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{}", v),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Text(v) => write!(f, "{}", v),
            Scalar::Null => write!(f, "null"),
        }
    }
}

/// Result of evaluating one expression
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Shape { rows: usize, columns: usize },
    Names(Vec<String>),
    Types(Vec<(String, DataType)>),
    Count(usize),
    Scalar(Scalar),
    Table(Table),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Shape { rows, columns } => write!(f, "({}, {})", rows, columns),
            Value::Names(names) => write!(f, "{:?}", names),
            Value::Types(types) => {
                let lines: Vec<String> = types
                    .iter()
                    .map(|(name, data_type)| format!("{}: {}", name, data_type))
                    .collect();
                write!(f, "{}", lines.join("\n"))
            }
            Value::Count(n) => write!(f, "{}", n),
            Value::Scalar(scalar) => write!(f, "{}", scalar),
            Value::Table(table) => write!(f, "{}", table),
        }
    }
}

/// One expression together with where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub line: usize,
    pub text: String,
    pub expr: Expr,
}

/// A parsed list of expressions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    statements: Vec<Statement>,
}

impl Program {
    /// Parse every line up front so a typo fails before any query runs
    pub fn parse(source: &str) -> Result<Self, EvalError> {
        let mut statements = Vec::new();

        for (index, raw) in source.lines().enumerate() {
            let text = raw.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }

            let line = index + 1;
            let expr = parse_expr(text).map_err(|e| EvalError::Line {
                line,
                source: Box::new(e),
            })?;
            statements.push(Statement {
                line,
                text: text.to_string(),
                expr,
            });
        }

        Ok(Self { statements })
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Evaluate every statement in order, stopping at the first failure
    pub fn eval(&self, table: &Table) -> Result<Vec<Value>, EvalError> {
        self.statements
            .iter()
            .map(|statement| {
                evaluate(&statement.expr, table).map_err(|e| EvalError::Line {
                    line: statement.line,
                    source: Box::new(e),
                })
            })
            .collect()
    }
}

/// Parse a single expression such as `head(10)` or `sum(revenue)`
pub fn parse_expr(text: &str) -> Result<Expr, EvalError> {
    let text = text.trim();
    let (name, args) = match text.find('(') {
        Some(open) => {
            let inner = text[open + 1..]
                .strip_suffix(')')
                .ok_or_else(|| EvalError::Syntax(format!("missing `)` in {:?}", text)))?;
            (text[..open].trim(), Some(split_args(inner)?))
        }
        None => (text, None),
    };

    if !is_identifier(name) {
        return Err(EvalError::Syntax(format!("expected a function name, got {:?}", name)));
    }

    let args = args.unwrap_or_default();
    let arity = |expected: &'static str| EvalError::Arity {
        function: name.to_string(),
        expected,
        got: args.len(),
    };

    let expr = match name {
        "shape" | "columns" | "dtypes" | "count" => {
            if !args.is_empty() {
                return Err(arity("no arguments"));
            }
            match name {
                "shape" => Expr::Shape,
                "columns" => Expr::Columns,
                "dtypes" => Expr::Dtypes,
                _ => Expr::Count,
            }
        }
        "head" | "tail" => {
            let n = match args.as_slice() {
                [] => DEFAULT_PREVIEW_ROWS,
                [n] => n.parse::<usize>().map_err(|_| {
                    EvalError::Syntax(format!("`{}` expects a row count, got {:?}", name, n))
                })?,
                _ => return Err(arity("at most one argument")),
            };
            if name == "head" {
                Expr::Head(n)
            } else {
                Expr::Tail(n)
            }
        }
        "select" => {
            if args.is_empty() {
                return Err(arity("at least one column"));
            }
            Expr::Select(args)
        }
        "sum" | "min" | "max" | "mean" | "nulls" | "distinct" => {
            let column = match args.as_slice() {
                [column] => column.clone(),
                _ => return Err(arity("exactly one column")),
            };
            match name {
                "sum" => Expr::Aggregate(Aggregate::Sum, column),
                "min" => Expr::Aggregate(Aggregate::Min, column),
                "max" => Expr::Aggregate(Aggregate::Max, column),
                "mean" => Expr::Aggregate(Aggregate::Mean, column),
                "nulls" => Expr::Nulls(column),
                _ => Expr::Distinct(column),
            }
        }
        other => return Err(EvalError::UnknownFunction(other.to_string())),
    };

    Ok(expr)
}

/// Evaluate `expr` against `table`
pub fn evaluate(expr: &Expr, table: &Table) -> Result<Value, EvalError> {
    let value = match expr {
        Expr::Shape => Value::Shape {
            rows: table.num_rows(),
            columns: table.num_columns(),
        },
        Expr::Columns => Value::Names(table.column_names()),
        Expr::Dtypes => Value::Types(
            table
                .schema()
                .fields()
                .iter()
                .map(|f| (f.name().clone(), f.data_type().clone()))
                .collect(),
        ),
        Expr::Count => Value::Count(table.num_rows()),
        Expr::Head(n) => {
            let batch = table.concat()?;
            let len = (*n).min(batch.num_rows());
            Value::Table(Table::from_batch(batch.slice(0, len)))
        }
        Expr::Tail(n) => {
            let batch = table.concat()?;
            let len = (*n).min(batch.num_rows());
            let offset = batch.num_rows() - len;
            Value::Table(Table::from_batch(batch.slice(offset, len)))
        }
        Expr::Select(names) => {
            let indices = names
                .iter()
                .map(|name| {
                    table
                        .column_index(name)
                        .ok_or_else(|| EvalError::UnknownColumn(name.clone()))
                })
                .collect::<Result<Vec<usize>, EvalError>>()?;
            Value::Table(Table::from_batch(table.concat()?.project(&indices)?))
        }
        Expr::Aggregate(aggregate, name) => {
            let array = column(table, name)?;
            Value::Scalar(aggregate_column(*aggregate, name, &array)?)
        }
        Expr::Nulls(name) => Value::Count(column(table, name)?.null_count()),
        Expr::Distinct(name) => Value::Count(count_distinct(&column(table, name)?)?),
    };

    Ok(value)
}

fn column(table: &Table, name: &str) -> Result<ArrayRef, EvalError> {
    let index = table
        .column_index(name)
        .ok_or_else(|| EvalError::UnknownColumn(name.to_string()))?;
    let batch: RecordBatch = table.concat()?;
    Ok(batch.column(index).clone())
}

fn aggregate_column(
    aggregate: Aggregate,
    name: &str,
    array: &ArrayRef,
) -> Result<Scalar, EvalError> {
    let data_type = array.data_type();
    // Values that do not fit the widened type are an error, not a null
    let strict = CastOptions {
        safe: false,
        ..Default::default()
    };

    if data_type.is_integer() {
        let ints = cast_with_options(array.as_ref(), &DataType::Int64, &strict)?;
        let ints = ints.as_primitive::<Int64Type>();
        let scalar = match aggregate {
            Aggregate::Sum => aggregate::sum_checked(ints)?.map(Scalar::Int),
            Aggregate::Min => aggregate::min(ints).map(Scalar::Int),
            Aggregate::Max => aggregate::max(ints).map(Scalar::Int),
            Aggregate::Mean => mean(ints.iter().flatten().map(|v| v as f64)),
        };
        return Ok(scalar.unwrap_or(Scalar::Null));
    }

    if data_type.is_floating() {
        let floats = cast_with_options(array.as_ref(), &DataType::Float64, &strict)?;
        let floats = floats.as_primitive::<Float64Type>();
        let scalar = match aggregate {
            Aggregate::Sum => aggregate::sum(floats).map(Scalar::Float),
            Aggregate::Min => aggregate::min(floats).map(Scalar::Float),
            Aggregate::Max => aggregate::max(floats).map(Scalar::Float),
            Aggregate::Mean => mean(floats.iter().flatten()),
        };
        return Ok(scalar.unwrap_or(Scalar::Null));
    }

    if *data_type == DataType::Utf8 && matches!(aggregate, Aggregate::Min | Aggregate::Max) {
        let strings = array.as_string::<i32>();
        let extreme = match aggregate {
            Aggregate::Min => aggregate::min_string(strings),
            _ => aggregate::max_string(strings),
        };
        return Ok(extreme
            .map(|s| Scalar::Text(s.to_string()))
            .unwrap_or(Scalar::Null));
    }

    Err(EvalError::NotNumeric {
        function: aggregate.name(),
        column: name.to_string(),
        data_type: data_type.clone(),
    })
}

fn mean(values: impl Iterator<Item = f64>) -> Option<Scalar> {
    let (total, count) = values.fold((0.0, 0usize), |(total, count), v| (total + v, count + 1));
    (count > 0).then(|| Scalar::Float(total / count as f64))
}

fn count_distinct(array: &ArrayRef) -> Result<usize, EvalError> {
    let options = FormatOptions::default();
    let formatter = ArrayFormatter::try_new(array.as_ref(), &options)?;

    let seen: HashSet<String> = (0..array.len())
        .filter(|&i| array.is_valid(i))
        .map(|i| formatter.value(i).to_string())
        .collect();

    Ok(seen.len())
}

fn split_args(inner: &str) -> Result<Vec<String>, EvalError> {
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut args = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut was_quoted = false;

    for c in inner.chars() {
        match c {
            '"' if quoted => quoted = false,
            '"' => {
                if was_quoted || !current.trim().is_empty() {
                    return Err(EvalError::Syntax(format!("misplaced quote in ({})", inner)));
                }
                current.clear();
                quoted = true;
                was_quoted = true;
            }
            _ if quoted => current.push(c),
            ',' => {
                args.push(finish_arg(&current, was_quoted)?);
                current.clear();
                was_quoted = false;
            }
            // Only whitespace may follow a closing quote
            c if was_quoted => {
                if !c.is_whitespace() {
                    return Err(EvalError::Syntax(format!("misplaced quote in ({})", inner)));
                }
            }
            c => current.push(c),
        }
    }

    if quoted {
        return Err(EvalError::Syntax(format!("unterminated quote in ({})", inner)));
    }
    args.push(finish_arg(&current, was_quoted)?);

    Ok(args)
}

fn finish_arg(raw: &str, was_quoted: bool) -> Result<String, EvalError> {
    if was_quoted {
        return Ok(raw.to_string());
    }

    let arg = raw.trim();
    if arg.is_empty() {
        return Err(EvalError::Syntax("empty argument".to_string()));
    }
    if arg.contains(|c: char| c.is_whitespace() || "()".contains(c)) {
        return Err(EvalError::Syntax(format!(
            "unexpected {:?}, quote names with spaces or punctuation",
            arg
        )));
    }

    Ok(arg.to_string())
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
