use crate::types::{AppError, AppResult};
use serde::Serialize;
use sqlx::mysql::MySqlRow;
use sqlx::{Column, Row as _, TypeInfo, ValueRef};
use std::fmt;

/// A dynamically typed value from a result row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::UInt(u) => write!(f, "{}", u),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "'{}'", s),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// One result row, rendered like a tuple: `(1,)`, `('a', 2)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Row(pub Vec<Value>);

impl Row {
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.0.get(idx)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", value)?;
        }
        if self.0.len() == 1 {
            f.write_str(",")?;
        }
        f.write_str(")")
    }
}

/// Column names and rows returned by a statement.
///
/// `columns` is empty when the statement produced no rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    pub(crate) fn from_mysql_rows(rows: Vec<MySqlRow>) -> AppResult<Self> {
        let columns = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();
        let rows = rows.iter().map(decode_row).collect::<AppResult<Vec<_>>>()?;
        Ok(Self { columns, rows })
    }
}

impl IntoIterator for QueryResult {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a QueryResult {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Decodes every column of a MySQL row.
///
/// Statements run over the text protocol, so numeric columns are parsed from
/// their textual form and everything without a native mapping is kept as text.
pub fn decode_row(row: &MySqlRow) -> AppResult<Row> {
    let mut values = Vec::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        if row.try_get_raw(idx)?.is_null() {
            values.push(Value::Null);
            continue;
        }

        let type_name = column.type_info().name();
        let value = match ValueKind::of(type_name) {
            ValueKind::Bool => Value::Bool(row.try_get_unchecked(idx)?),
            ValueKind::Int => Value::Int(row.try_get_unchecked(idx)?),
            ValueKind::UInt => Value::UInt(row.try_get_unchecked(idx)?),
            ValueKind::Float => Value::Float(row.try_get_unchecked(idx)?),
            ValueKind::Bytes => Value::Bytes(row.try_get_unchecked(idx)?),
            ValueKind::Null => Value::Null,
            ValueKind::Text => match row.try_get_unchecked::<String, _>(idx) {
                Ok(text) => Value::Text(text),
                Err(_) => Value::Bytes(row.try_get_unchecked(idx).map_err(|_| {
                    AppError::Decode {
                        column: column.name().to_string(),
                        type_name: type_name.to_string(),
                    }
                })?),
            },
        };
        values.push(value);
    }
    Ok(Row(values))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Null,
    Bool,
    Int,
    UInt,
    Float,
    Bytes,
    Text,
}

impl ValueKind {
    /// Maps a MySQL type name, as reported by the driver, to a value kind.
    fn of(type_name: &str) -> Self {
        let upper = type_name.to_ascii_uppercase();
        match upper.as_str() {
            "NULL" => ValueKind::Null,
            "BOOLEAN" => ValueKind::Bool,
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => ValueKind::Int,
            "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
            | "BIGINT UNSIGNED" => ValueKind::UInt,
            "FLOAT" | "DOUBLE" => ValueKind::Float,
            "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
            | "GEOMETRY" => ValueKind::Bytes,
            // DECIMAL, temporal, character, JSON, ENUM, SET
            _ => ValueKind::Text,
        }
    }
}
