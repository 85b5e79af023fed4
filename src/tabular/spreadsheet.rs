// Spreadsheet decoding (xlsx, xlsm, xlsb, xls, ods) via calamine

use super::{Cell, Table};
use crate::types::{AppError, AppResult};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::NaiveDateTime;
use std::io::Cursor;
use tracing::debug;

/// Parses the first sheet of an in-memory workbook into a [`Table`].
pub fn read_spreadsheet(bytes: Vec<u8>) -> AppResult<Table> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AppError::NotFound("workbook has no sheets".to_string()))??;

    let mut rows = range.rows().map(|row| row.iter().map(to_cell).collect::<Vec<_>>());
    let header = rows.next().unwrap_or_default();
    let data: Vec<Vec<Cell>> = rows.collect();

    debug!(rows = data.len(), columns = header.len(), "Parsed spreadsheet");
    Ok(Table::from_parts(header, data))
}

fn to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::Int(i) => Cell::Int(*i),
        Data::Float(x) => Cell::Float(*x),
        Data::Bool(b) => Cell::Bool(*b),
        Data::String(s) if s.is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(Cell::DateTime)
            .unwrap_or(Cell::Float(dt.as_f64())),
        Data::DateTimeIso(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
            .map(Cell::DateTime)
            .unwrap_or_else(|_| Cell::Text(s.clone())),
        Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::tabular::ColumnType;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

    const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

    const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets></workbook>"#;

    const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

    fn column_letter(idx: usize) -> char {
        (b'A' + idx as u8) as char
    }

    /// Builds a single-sheet xlsx workbook. Cells that parse as numbers are
    /// written as numeric cells, everything else as inline strings.
    pub(crate) fn build_xlsx(rows: &[&[&str]]) -> Vec<u8> {
        let mut sheet = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
        );
        for (r, row) in rows.iter().enumerate() {
            sheet.push_str(&format!(r#"<row r="{}">"#, r + 1));
            for (c, value) in row.iter().enumerate() {
                let reference = format!("{}{}", column_letter(c), r + 1);
                if value.parse::<f64>().is_ok() {
                    sheet.push_str(&format!(r#"<c r="{}"><v>{}</v></c>"#, reference, value));
                } else {
                    sheet.push_str(&format!(
                        r#"<c r="{}" t="inlineStr"><is><t>{}</t></is></c>"#,
                        reference, value
                    ));
                }
            }
            sheet.push_str("</row>");
        }
        sheet.push_str("</sheetData></worksheet>");

        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, body) in [
            ("[Content_Types].xml", CONTENT_TYPES),
            ("_rels/.rels", ROOT_RELS),
            ("xl/workbook.xml", WORKBOOK),
            ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
            ("xl/worksheets/sheet1.xml", sheet.as_str()),
        ] {
            zip.start_file(name, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_read_single_sheet() {
        let bytes = build_xlsx(&[
            &["city", "pollutant", "avg"],
            &["Delhi", "PM2.5", "153"],
            &["Mumbai", "NO2", "41.5"],
            &["Chennai", "PM10", "88"],
        ]);

        let table = read_spreadsheet(bytes).unwrap();

        assert_eq!(table.headers(), vec!["city", "pollutant", "avg"]);
        assert_eq!(table.height(), 3);
        assert_eq!(table.columns()[0].dtype, ColumnType::Text);
        assert_eq!(table.columns()[2].dtype, ColumnType::Float);
        assert_eq!(table.rows()[0][0], Cell::Text("Delhi".to_string()));
        assert_eq!(table.rows()[1][2], Cell::Float(41.5));
    }

    #[test]
    fn test_whole_number_column_is_int() {
        let bytes = build_xlsx(&[&["station", "readings"], &["A", "10"], &["B", "12"]]);

        let table = read_spreadsheet(bytes).unwrap();

        assert_eq!(table.columns()[1].dtype, ColumnType::Int);
        assert_eq!(table.rows()[1][1], Cell::Int(12));
    }

    #[test]
    fn test_malformed_bytes_fail() {
        let result = read_spreadsheet(b"definitely not a workbook".to_vec());
        assert!(result.is_err());
    }
}
