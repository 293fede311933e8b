//! Spreadsheet step tables (`.xls` and `.xlsx`)
//!
//! One worksheet is one table: the named sheet, or the first sheet when the
//! source spec names none. Each worksheet row becomes a raw row.

use calamine::{open_workbook, Data, Range, Reader, Xls, Xlsx};
use std::fmt;
use std::io::{Read, Seek};
use std::path::Path;

use crate::common::{Error, Result};

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

fn range_rows(range: &Range<Data>) -> Vec<Vec<String>> {
    range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect()
}

fn sheet_rows<R, RS>(workbook: &mut R, sheet: Option<&str>, source: &str) -> Result<Vec<Vec<String>>>
where
    RS: Read + Seek,
    R: Reader<RS>,
    R::Error: fmt::Display,
{
    let range = match sheet {
        Some(name) => workbook.worksheet_range(name).map_err(|e| {
            Error::source_parse(source, format!("worksheet '{}': {}", name, e))
        })?,
        None => workbook
            .worksheet_range_at(0)
            .ok_or_else(|| Error::source_parse(source, "workbook has no worksheets"))?
            .map_err(|e| Error::source_parse(source, e.to_string()))?,
    };
    Ok(range_rows(&range))
}

/// Read a legacy binary workbook
pub fn read_xls(path: &Path, sheet: Option<&str>) -> Result<Vec<Vec<String>>> {
    let source = path.display().to_string();
    let mut workbook = open_workbook::<Xls<_>, _>(path)
        .map_err(|e| Error::source_parse(&source, e.to_string()))?;
    sheet_rows(&mut workbook, sheet, &source)
}

/// Read an Office Open XML workbook
pub fn read_xlsx(path: &Path, sheet: Option<&str>) -> Result<Vec<Vec<String>>> {
    let source = path.display().to_string();
    let mut workbook = open_workbook::<Xlsx<_>, _>(path)
        .map_err(|e| Error::source_parse(&source, e.to_string()))?;
    sheet_rows(&mut workbook, sheet, &source)
}
