use crate::error::{ConvertError, Result};
use crate::types::Value;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Sheet name used for tables that only carry a status message
pub const INFO_SHEET_NAME: &str = "Info";

/// Column header of the placeholder table
pub const INFO_COLUMN_NAME: &str = "Message";

/// One named column of a table
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Column {
    pub name: String,
    pub unit: Option<String>,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            unit: None,
            values,
        }
    }

    pub fn with_unit(mut self, unit: Option<String>) -> Self {
        self.unit = unit.filter(|u| !u.is_empty());
        self
    }

    /// Header text, `name [unit]` when a unit is known
    pub fn header(&self) -> String {
        match &self.unit {
            Some(unit) => format!("{} [{}]", self.name, unit),
            None => self.name.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Rectangular, column-named data
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// One-row table carrying an informational message
    pub fn placeholder(message: impl Into<String>) -> Self {
        Self {
            name: INFO_SHEET_NAME.to_string(),
            columns: vec![Column::new(
                INFO_COLUMN_NAME,
                vec![Value::Text(message.into())],
            )],
        }
    }

    /// Append a column, rejecting one whose length differs from the rest
    pub fn push_column(&mut self, column: Column) -> Result<()> {
        if let Some(first) = self.columns.first() {
            if first.len() != column.len() {
                return Err(ConvertError::Write(format!(
                    "column '{}' has {} rows, table '{}' has {}",
                    column.name,
                    column.len(),
                    self.name,
                    first.len()
                )));
            }
        }
        self.columns.push(column);
        Ok(())
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Check that every column has the same length
    pub fn check_rectangular(&self) -> Result<()> {
        let expected = self.row_count();
        for column in &self.columns {
            if column.len() != expected {
                return Err(ConvertError::Write(format!(
                    "table '{}' is not rectangular: column '{}' has {} rows, expected {}",
                    self.name,
                    column.name,
                    column.len(),
                    expected
                )));
            }
        }
        Ok(())
    }

    /// Values of one row, in column order
    pub fn row(&self, index: usize) -> Vec<&Value> {
        self.columns
            .iter()
            .filter_map(|c| c.values.get(index))
            .collect()
    }
}
