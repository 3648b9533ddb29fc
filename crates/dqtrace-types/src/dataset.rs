//! Column-oriented, read-only tabular view consumed by rules and stages.

use std::collections::HashMap;

use crate::{CellValue, DqError, Result};

/// A named column and its cells, in row order.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<CellValue>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<CellValue>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_null()).count()
    }
}

/// Immutable table handed to the engine for the duration of a run.
///
/// All columns have the same length and column names are unique; both are
/// checked once in [`Dataset::new`].
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    tag: String,
    columns: Vec<Column>,
    index: HashMap<String, usize>,
    rows: usize,
}

impl Dataset {
    /// Build a dataset from columns. `tag` identifies it in results and events.
    pub fn new(tag: impl Into<String>, columns: Vec<Column>) -> Result<Self> {
        let rows = columns.first().map(|c| c.values.len()).unwrap_or(0);
        let mut index = HashMap::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            if index.insert(column.name.clone(), i).is_some() {
                return Err(DqError::DuplicateColumn {
                    column: column.name.clone(),
                });
            }
            if column.values.len() != rows {
                return Err(DqError::RaggedColumn {
                    column: column.name.clone(),
                    expected: rows,
                    actual: column.values.len(),
                });
            }
        }
        Ok(Self {
            tag: tag.into(),
            columns,
            index,
            rows,
        })
    }

    /// Build a dataset from a header and row-major records.
    pub fn from_rows(
        tag: impl Into<String>,
        header: Vec<String>,
        records: Vec<Vec<CellValue>>,
    ) -> Result<Self> {
        let mut columns: Vec<Column> = header
            .into_iter()
            .map(|name| Column::new(name, Vec::with_capacity(records.len())))
            .collect();
        for (row, record) in records.into_iter().enumerate() {
            if record.len() != columns.len() {
                return Err(DqError::Other(format!(
                    "record {row} has {} fields, expected {}",
                    record.len(),
                    columns.len()
                )));
            }
            for (column, cell) in columns.iter_mut().zip(record) {
                column.values.push(cell);
            }
        }
        Self::new(tag, columns)
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Cells of the named column in row order.
    pub fn column(&self, name: &str) -> Result<&[CellValue]> {
        self.index
            .get(name)
            .map(|&i| self.columns[i].values.as_slice())
            .ok_or_else(|| DqError::ColumnNotFound {
                column: name.to_string(),
            })
    }

    pub fn cell(&self, name: &str, row: usize) -> Result<&CellValue> {
        let values = self.column(name)?;
        values.get(row).ok_or(DqError::RowOutOfRange {
            row,
            rows: self.rows,
        })
    }

    pub fn is_null(&self, name: &str, row: usize) -> Result<bool> {
        Ok(self.cell(name, row)?.is_null())
    }

    /// `true` iff any cell in any column is null.
    pub fn has_any_null(&self) -> bool {
        self.columns
            .iter()
            .any(|c| c.values.iter().any(CellValue::is_null))
    }

    /// Null counts for every column with at least one null, in column order.
    pub fn null_counts(&self) -> Vec<(String, usize)> {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), c.null_count()))
            .filter(|(_, count)| *count > 0)
            .collect()
    }
}
