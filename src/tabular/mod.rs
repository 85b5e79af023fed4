//! In-memory tables read from spreadsheet and CSV objects.
//!
//! The first row of a sheet is taken as the header. Blank headers are named
//! `Unnamed: <index>` and repeated headers get a `.1`, `.2`, ... suffix, so
//! every column has a distinct name. Column types are inferred from the data
//! cells after the header.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

pub mod delimited;
pub mod spreadsheet;

pub use delimited::read_csv;
pub use spreadsheet::read_spreadsheet;

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Empty,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    DateTime(NaiveDateTime),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    fn kind(&self) -> ColumnType {
        match self {
            Cell::Empty => ColumnType::Empty,
            Cell::Bool(_) => ColumnType::Bool,
            Cell::Int(_) => ColumnType::Int,
            Cell::Float(_) => ColumnType::Float,
            Cell::Text(_) => ColumnType::Text,
            Cell::DateTime(_) => ColumnType::DateTime,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Float(x) => write!(f, "{}", x),
            Cell::Text(s) => f.write_str(s),
            Cell::DateTime(dt) => write!(f, "{}", dt),
        }
    }
}

/// Inferred type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// Every data cell is empty.
    Empty,
    Bool,
    Int,
    Float,
    DateTime,
    /// Text, or a mix of kinds that has no common numeric type.
    Text,
}

impl ColumnType {
    fn merge(self, other: ColumnType) -> ColumnType {
        use ColumnType::*;
        match (self, other) {
            (Empty, t) | (t, Empty) => t,
            (a, b) if a == b => a,
            (Int, Float) | (Float, Int) => Float,
            _ => Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub dtype: ColumnType,
}

/// Rows and typed columns of a single sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Builds a table from raw header cells and data rows.
    ///
    /// Short rows are padded with `Cell::Empty`; cells beyond the header width
    /// get generated column names.
    pub fn from_parts(header: Vec<Cell>, mut rows: Vec<Vec<Cell>>) -> Self {
        let width = rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(header.len()))
            .max()
            .unwrap_or(0);

        let mut header = header;
        header.resize(width, Cell::Empty);
        for row in &mut rows {
            row.resize(width, Cell::Empty);
        }

        let names = column_names(&header);
        let mut columns = Vec::with_capacity(width);
        for (idx, name) in names.into_iter().enumerate() {
            let dtype = infer_column(&mut rows, idx);
            columns.push(Column { name, dtype });
        }

        Self { columns, rows }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn headers(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Number of data rows, header excluded.
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cells of the named column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let idx = self.columns.iter().position(|c| c.name == name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// A copy holding only the first `n` rows.
    pub fn head(&self, n: usize) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(ToString::to_string).collect())
            .collect();

        let index_width = self.rows.len().saturating_sub(1).to_string().len();
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                rendered
                    .iter()
                    .map(|row| row[idx].chars().count())
                    .chain(std::iter::once(col.name.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        write!(f, "{:index_width$}", "")?;
        for (col, width) in self.columns.iter().zip(&widths) {
            write!(f, "  {:>width$}", col.name, width = *width)?;
        }
        writeln!(f)?;

        for (i, row) in rendered.iter().enumerate() {
            write!(f, "{:<index_width$}", i)?;
            for (value, width) in row.iter().zip(&widths) {
                write!(f, "  {:>width$}", value, width = *width)?;
            }
            writeln!(f)?;
        }

        write!(f, "\n[{} rows x {} columns]", self.height(), self.width())
    }
}

fn column_names(header: &[Cell]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    header
        .iter()
        .enumerate()
        .map(|(idx, cell)| {
            let base = match cell {
                Cell::Empty => format!("Unnamed: {}", idx),
                Cell::Text(s) if s.trim().is_empty() => format!("Unnamed: {}", idx),
                Cell::Float(x) if x.fract() == 0.0 => format!("{}", *x as i64),
                other => other.to_string(),
            };
            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 {
                base
            } else {
                format!("{}.{}", base, count)
            };
            *count += 1;
            name
        })
        .collect()
}

/// Infers the type of column `idx` and normalises its numeric cells to it.
///
/// A float column whose values are all whole numbers, with no empty cells,
/// becomes an integer column.
fn infer_column(rows: &mut [Vec<Cell>], idx: usize) -> ColumnType {
    let mut dtype = ColumnType::Empty;
    let mut has_empty = false;
    let mut all_whole = true;

    for row in rows.iter() {
        let cell = &row[idx];
        match cell {
            Cell::Empty => has_empty = true,
            Cell::Float(x) if x.fract() != 0.0 || !x.is_finite() => all_whole = false,
            _ => {}
        }
        dtype = dtype.merge(cell.kind());
    }

    if dtype == ColumnType::Float && all_whole && !has_empty {
        dtype = ColumnType::Int;
    }

    for row in rows.iter_mut() {
        let converted = match (dtype, &row[idx]) {
            (ColumnType::Int, Cell::Float(x)) => Cell::Int(*x as i64),
            (ColumnType::Float, Cell::Int(i)) => Cell::Float(*i as f64),
            _ => continue,
        };
        row[idx] = converted;
    }

    dtype
}
