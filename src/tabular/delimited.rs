// CSV decoding

use super::{Cell, Table};
use crate::types::AppResult;
use chrono::NaiveDateTime;

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%d-%m-%Y %H:%M:%S"];

/// Parses comma-separated bytes into a [`Table`], first record as header.
pub fn read_csv(bytes: &[u8]) -> AppResult<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    // Header names are kept verbatim; only data fields are typed.
    let header = reader
        .headers()?
        .iter()
        .map(|name| {
            if name.is_empty() {
                Cell::Empty
            } else {
                Cell::Text(name.to_string())
            }
        })
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(parse_field).collect());
    }

    Ok(Table::from_parts(header, rows))
}

fn parse_field(field: &str) -> Cell {
    if field.is_empty() {
        return Cell::Empty;
    }
    if field.eq_ignore_ascii_case("true") {
        return Cell::Bool(true);
    }
    if field.eq_ignore_ascii_case("false") {
        return Cell::Bool(false);
    }
    if let Ok(i) = field.parse::<i64>() {
        return Cell::Int(i);
    }
    if let Ok(x) = field.parse::<f64>() {
        return Cell::Float(x);
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(field, format) {
            return Cell::DateTime(dt);
        }
    }
    Cell::Text(field.to_string())
}
