//! CSV input: a delimited text file read as a single table

use crate::error::{ConvertError, Result};
use crate::types::{Column, Table, Value};
use log::debug;
use std::collections::HashSet;
use std::path::Path;

/// Sheet name given to tables read from CSV
pub const CSV_SHEET_NAME: &str = "Sheet1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Int,
    Float,
    Text,
}

/// Read a CSV file with a header row into a table
///
/// Column types are inferred per column: integer when every non-empty cell
/// is an integer, float when every non-empty cell is a number, text
/// otherwise. Short rows are padded with empty cells.
pub fn read_csv_table(path: &Path) -> Result<Table> {
    let file = std::fs::File::open(path).map_err(|e| {
        ConvertError::FileFormat(format!("cannot open {}: {}", path.display(), e))
    })?;
    read_csv_from(file)
}

pub fn read_csv_from<R: std::io::Read>(input: R) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(input);

    let headers = unique_headers(reader.headers()?.iter());
    let width = headers.len();
    let mut cells: Vec<Vec<String>> = vec![Vec::new(); width];

    for (row_no, result) in reader.records().enumerate() {
        let record = result?;
        if record.len() > width {
            return Err(ConvertError::Csv(format!(
                "row {}: expected {} fields, saw {}",
                row_no + 2,
                width,
                record.len()
            )));
        }
        for (index, column) in cells.iter_mut().enumerate() {
            column.push(record.get(index).unwrap_or("").to_string());
        }
    }

    let mut table = Table::new(CSV_SHEET_NAME);
    for (name, raw) in headers.into_iter().zip(cells) {
        let kind = infer_kind(&raw);
        debug!("CSV column '{}': {:?}, {} rows", name, kind, raw.len());
        let values = raw.iter().map(|cell| convert_cell(cell, kind)).collect();
        table.push_column(Column::new(name, values))?;
    }
    Ok(table)
}

/// Blank headers become `Unnamed: N`, repeated headers get `.1`, `.2`, ...
fn unique_headers<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.enumerate()
        .map(|(index, header)| {
            let base = if header.trim().is_empty() {
                format!("Unnamed: {index}")
            } else {
                header.to_string()
            };
            let mut name = base.clone();
            let mut suffix = 1;
            while !seen.insert(name.clone()) {
                name = format!("{base}.{suffix}");
                suffix += 1;
            }
            name
        })
        .collect()
}

fn infer_kind(cells: &[String]) -> ColumnKind {
    let mut kind = ColumnKind::Int;
    for cell in cells.iter().map(|c| c.trim()).filter(|c| !c.is_empty()) {
        if kind == ColumnKind::Int && cell.parse::<i64>().is_err() {
            kind = ColumnKind::Float;
        }
        if kind == ColumnKind::Float && cell.parse::<f64>().is_err() {
            return ColumnKind::Text;
        }
    }
    kind
}

fn convert_cell(cell: &str, kind: ColumnKind) -> Value {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Value::Empty;
    }
    match kind {
        ColumnKind::Int => trimmed.parse().map(Value::Int).unwrap_or(Value::Empty),
        ColumnKind::Float => trimmed.parse().map(Value::Float).unwrap_or(Value::Empty),
        ColumnKind::Text => Value::Text(cell.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_inference() {
        let input = "time,speed,gear,note\n0,1.5,1,start\n1,2,2,\n2,,3,stop\n";
        let table = read_csv_from(input.as_bytes()).unwrap();
        assert_eq!(table.name, CSV_SHEET_NAME);
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.column_names(), vec!["time", "speed", "gear", "note"]);
        assert_eq!(table.columns[0].values[2], Value::Int(2));
        assert_eq!(table.columns[1].values[1], Value::Float(2.0));
        assert_eq!(table.columns[1].values[2], Value::Empty);
        assert_eq!(table.columns[3].values[0], Value::Text("start".to_string()));
        assert_eq!(table.columns[3].values[1], Value::Empty);
    }

    #[test]
    fn test_mixed_column_stays_text() {
        let table = read_csv_from("id\n1\nA7\n".as_bytes()).unwrap();
        assert_eq!(table.columns[0].values[0], Value::Text("1".to_string()));
    }

    #[test]
    fn test_short_rows_are_padded() {
        let table = read_csv_from("a,b\n1\n2,3\n".as_bytes()).unwrap();
        assert_eq!(table.columns[1].values, vec![Value::Empty, Value::Int(3)]);
    }

    #[test]
    fn test_long_rows_are_rejected() {
        let err = read_csv_from("a,b\n1,2,3\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ConvertError::Csv(_)));
    }

    #[test]
    fn test_header_only_gives_zero_rows() {
        let table = read_csv_from("a,b\n".as_bytes()).unwrap();
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.row_count(), 0);
    }

    #[test]
    fn test_unique_headers() {
        let headers = unique_headers(["x", "x", "", "x"].into_iter());
        assert_eq!(headers, vec!["x", "x.1", "Unnamed: 2", "x.2"]);
    }
}
