//! Export functionality for tables
//!
//! Writes named tables to a multi-sheet XLSX workbook or to a flat CSV file,
//! and derives output paths from input paths.

use crate::error::{ConvertError, Result};
use crate::types::{Table, Value};
use log::debug;
use regex::Regex;
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Longest worksheet name XLSX accepts
pub const MAX_SHEET_NAME_LEN: usize = 31;

/// Rows per worksheet, header included
pub const MAX_XLSX_ROWS: usize = 1_048_576;

/// Serializes named tables into one output file
pub trait SpreadsheetWriter {
    /// File extension of the output, without the dot
    fn extension(&self) -> &'static str;

    /// Create or overwrite `path` with the given (sheet name, table) pairs
    fn write(&self, path: &Path, sheets: &[(String, Table)]) -> Result<()>;
}

/// Compute the output path for an input file
///
/// Same file stem as the input, `extension` appended, placed in
/// `output_dir` or next to the input when no directory is given.
pub fn compute_output_path(input_path: &Path, output_dir: Option<&Path>, extension: &str) -> PathBuf {
    let base_name = input_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let output_dir = output_dir.unwrap_or_else(|| input_path.parent().unwrap_or(Path::new(".")));
    output_dir.join(format!("{base_name}.{extension}"))
}

fn create_parent_dir(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            std::fs::create_dir_all(dir).map_err(|e| {
                ConvertError::Write(format!("cannot create directory {}: {}", dir.display(), e))
            })?;
            debug!("Created output directory: {}", dir.display());
        }
    }
    Ok(())
}

fn invalid_sheet_chars() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[\[\]:*?/\\]").expect("static regex"))
}

/// Make a name acceptable as an XLSX worksheet name
///
/// Forbidden characters become `_`, leading and trailing apostrophes are
/// dropped and the result is cut to 31 characters.
pub fn sanitize_sheet_name(name: &str) -> String {
    let replaced = invalid_sheet_chars().replace_all(name, "_");
    let trimmed = replaced.trim_matches('\'');
    let cut: String = trimmed.chars().take(MAX_SHEET_NAME_LEN).collect();
    if cut.trim().is_empty() {
        "Sheet".to_string()
    } else {
        cut
    }
}

/// Multi-sheet XLSX output
#[derive(Debug, Default, Clone, Copy)]
pub struct XlsxWriter;

impl XlsxWriter {
    fn write_table(worksheet: &mut Worksheet, table: &Table, header: &Format) -> Result<()> {
        if table.row_count() + 1 > MAX_XLSX_ROWS {
            return Err(ConvertError::Write(format!(
                "table '{}' has {} rows, a worksheet holds at most {}",
                table.name,
                table.row_count(),
                MAX_XLSX_ROWS - 1
            )));
        }

        for (col, column) in table.columns.iter().enumerate() {
            let col = u16::try_from(col).map_err(|_| {
                ConvertError::Write(format!("table '{}' has too many columns", table.name))
            })?;
            worksheet.write_string_with_format(0, col, column.header(), header)?;

            for (row, value) in column.values.iter().enumerate() {
                let row = row as u32 + 1;
                match value {
                    Value::Int(v) => {
                        worksheet.write_number(row, col, *v as f64)?;
                    }
                    Value::UInt(v) => {
                        worksheet.write_number(row, col, *v as f64)?;
                    }
                    Value::Float(v) if v.is_finite() => {
                        worksheet.write_number(row, col, *v)?;
                    }
                    Value::Float(v) if v.is_nan() => {}
                    Value::Float(v) => {
                        let text = if *v > 0.0 { "inf" } else { "-inf" };
                        worksheet.write_string(row, col, text)?;
                    }
                    Value::Text(s) => {
                        worksheet.write_string(row, col, s)?;
                    }
                    Value::Empty => {}
                }
            }
        }

        worksheet.set_freeze_panes(1, 0)?;
        Ok(())
    }
}

impl SpreadsheetWriter for XlsxWriter {
    fn extension(&self) -> &'static str {
        "xlsx"
    }

    fn write(&self, path: &Path, sheets: &[(String, Table)]) -> Result<()> {
        let mut workbook = Workbook::new();
        let header = Format::new().set_bold();
        let mut seen = HashSet::new();

        for (name, table) in sheets {
            table.check_rectangular()?;
            let sheet_name = sanitize_sheet_name(name);
            // worksheet names are case-insensitive
            if !seen.insert(sheet_name.to_lowercase()) {
                return Err(ConvertError::Write(format!(
                    "duplicate sheet name '{sheet_name}'"
                )));
            }

            let worksheet = workbook.add_worksheet();
            worksheet.set_name(&sheet_name)?;
            Self::write_table(worksheet, table, &header)?;
            debug!(
                "Sheet '{}': {} rows x {} columns",
                sheet_name,
                table.row_count(),
                table.column_count()
            );
        }

        create_parent_dir(path)?;
        workbook.save(path).map_err(|e| {
            ConvertError::Write(format!("cannot write {}: {}", path.display(), e))
        })?;
        Ok(())
    }
}

/// Single-table CSV output
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvWriter;

/// Float text that keeps a decimal point on whole numbers
fn format_cell(value: &Value) -> String {
    match value {
        Value::Float(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 => {
            format!("{v:.1}")
        }
        Value::Float(v) if v.is_infinite() => {
            let text = if *v > 0.0 { "inf" } else { "-inf" };
            text.to_string()
        }
        Value::Float(v) if v.is_nan() => String::new(),
        other => other.to_string(),
    }
}

impl SpreadsheetWriter for CsvWriter {
    fn extension(&self) -> &'static str {
        "csv"
    }

    fn write(&self, path: &Path, sheets: &[(String, Table)]) -> Result<()> {
        let table = match sheets {
            [(_, table)] => table,
            _ => {
                return Err(ConvertError::Write(format!(
                    "CSV output holds exactly one table, got {}",
                    sheets.len()
                )))
            }
        };
        table.check_rectangular()?;

        create_parent_dir(path)?;
        let mut writer = csv::Writer::from_path(path).map_err(|e| {
            ConvertError::Write(format!("cannot write {}: {}", path.display(), e))
        })?;

        let write_error =
            |e: csv::Error| ConvertError::Write(format!("cannot write {}: {}", path.display(), e));
        writer
            .write_record(table.columns.iter().map(|c| c.header()))
            .map_err(write_error)?;
        for row in 0..table.row_count() {
            writer
                .write_record(table.row(row).into_iter().map(format_cell))
                .map_err(write_error)?;
        }
        writer.flush().map_err(|e| {
            ConvertError::Write(format!("cannot flush {}: {}", path.display(), e))
        })?;

        debug!(
            "Wrote {} rows x {} columns to {}",
            table.row_count(),
            table.column_count(),
            path.display()
        );
        Ok(())
    }
}
