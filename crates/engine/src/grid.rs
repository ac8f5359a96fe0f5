//! The displayed 2D grid: the current slice payload as display strings.

use std::fmt;

use serde_json::Value;
use tensorlens_core::column_label;

use crate::format::format_value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridLayout {
    Empty,
    /// A bare scalar shown as a single cell.
    Scalar,
    /// A 1D array shown as one column.
    Column,
    /// Rows of an array of arrays.
    Table,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceGrid {
    layout: GridLayout,
    cells: Vec<Vec<String>>,
    cols: usize,
}

impl Default for SliceGrid {
    fn default() -> Self {
        Self::empty()
    }
}

impl SliceGrid {
    pub fn empty() -> Self {
        Self { layout: GridLayout::Empty, cells: Vec::new(), cols: 0 }
    }

    /// Build from an opaque payload. Anything nested deeper than two levels
    /// is shown as JSON text in its cell.
    pub fn from_payload(payload: &Value) -> Self {
        let cells: Vec<Vec<String>> = match payload {
            Value::Array(items) if items.is_empty() => return Self::empty(),
            Value::Array(items) if items.iter().any(Value::is_array) => items
                .iter()
                .map(|row| match row {
                    Value::Array(values) => values.iter().map(format_value).collect(),
                    other => vec![format_value(other)],
                })
                .collect(),
            Value::Array(items) => {
                let cells = items.iter().map(|v| vec![format_value(v)]).collect();
                return Self { layout: GridLayout::Column, cells, cols: 1 };
            }
            scalar => {
                return Self { layout: GridLayout::Scalar, cells: vec![vec![format_value(scalar)]], cols: 1 };
            }
        };
        let cols = cells.iter().map(Vec::len).max().unwrap_or(0);
        Self { layout: GridLayout::Table, cells, cols }
    }

    pub fn layout(&self) -> GridLayout {
        self.layout
    }

    /// (rows, cols)
    pub fn dims(&self) -> (usize, usize) {
        (self.cells.len(), self.cols)
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&str> {
        self.cells.get(row)?.get(col).map(String::as_str)
    }

    /// Overwrite a cell, returning the previous text. `None` when the cell
    /// does not exist.
    pub fn set(&mut self, row: usize, col: usize, value: impl Into<String>) -> Option<String> {
        let cell = self.cells.get_mut(row)?.get_mut(col)?;
        Some(std::mem::replace(cell, value.into()))
    }

    pub fn rows(&self) -> impl Iterator<Item = &[String]> {
        self.cells.iter().map(Vec::as_slice)
    }

    /// The part of the grid that fits the render window.
    pub fn window(&self, max_rows: usize, max_cols: usize) -> GridWindow<'_> {
        let (rows, cols) = self.dims();
        let shown_cols = cols.min(max_cols);
        GridWindow {
            column_labels: (0..shown_cols).map(column_label).collect(),
            rows: self
                .cells
                .iter()
                .take(max_rows)
                .map(|row| row.iter().take(shown_cols).map(String::as_str).collect())
                .collect(),
            hidden_rows: rows.saturating_sub(max_rows),
            hidden_cols: cols.saturating_sub(max_cols),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridWindow<'a> {
    pub column_labels: Vec<String>,
    pub rows: Vec<Vec<&'a str>>,
    pub hidden_rows: usize,
    pub hidden_cols: usize,
}

/// Tab-separated with a header of column labels and 1-based row numbers.
impl fmt::Display for GridWindow<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\t{}", self.column_labels.join("\t"))?;
        if self.hidden_cols > 0 {
            write!(f, "\t… {} more columns", self.hidden_cols)?;
        }
        writeln!(f)?;
        for (i, row) in self.rows.iter().enumerate() {
            writeln!(f, "{}\t{}", i + 1, row.join("\t"))?;
        }
        if self.hidden_rows > 0 {
            writeln!(f, "… {} more rows", self.hidden_rows)?;
        }
        Ok(())
    }
}
