//! Spreadsheet-style cell addressing.
//!
//! Columns use bijective base-26 letters with no zero digit:
//! `0 = A`, `25 = Z`, `26 = AA`, `701 = ZZ`, `702 = AAA`.
//! Rows are rendered 1-based, so `(0, 0)` is `A1`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A zero-based (row, column) position in the displayed grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellAddress {
    pub row: usize,
    pub col: usize,
}

impl CellAddress {
    #[inline]
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// The display label, e.g. `B3`.
    pub fn label(&self) -> String {
        cell_label(self.row, self.col)
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl From<(usize, usize)> for CellAddress {
    fn from((row, col): (usize, usize)) -> Self {
        Self { row, col }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelError {
    /// Nothing to parse.
    Empty,
    /// A character outside `A-Z` / `a-z` in the column part.
    InvalidLetter(char),
    /// Row part missing, zero, or not a number.
    InvalidRow(String),
    /// Column label too long to fit in a `usize`.
    Overflow,
}

impl fmt::Display for LabelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty cell label"),
            Self::InvalidLetter(c) => write!(f, "invalid column letter '{c}'"),
            Self::InvalidRow(row) => write!(f, "invalid row '{row}' (rows start at 1)"),
            Self::Overflow => write!(f, "column label out of range"),
        }
    }
}

impl std::error::Error for LabelError {}

/// Convert a 0-based column index to its letter label.
pub fn column_label(col: usize) -> String {
    let mut result = String::new();
    let mut n = col;
    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

/// Convert a letter label back to its 0-based column index.
///
/// Case-insensitive. Exact inverse of [`column_label`].
pub fn label_to_column(letters: &str) -> Result<usize, LabelError> {
    if letters.is_empty() {
        return Err(LabelError::Empty);
    }
    let mut col = 0usize;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return Err(LabelError::InvalidLetter(c));
        }
        let digit = c.to_ascii_uppercase() as usize - 'A' as usize + 1;
        col = col
            .checked_mul(26)
            .and_then(|v| v.checked_add(digit))
            .ok_or(LabelError::Overflow)?;
    }
    Ok(col - 1)
}

/// Label for a 0-based cell, e.g. `(9, 26)` → `AA10`.
pub fn cell_label(row: usize, col: usize) -> String {
    format!("{}{}", column_label(col), row + 1)
}

/// Parse a label like `AA10` into a 0-based address.
pub fn parse_cell_label(label: &str) -> Result<CellAddress, LabelError> {
    let label = label.trim();
    if label.is_empty() {
        return Err(LabelError::Empty);
    }
    let split = label
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(label.len());
    let (col_str, row_str) = label.split_at(split);
    let col = label_to_column(col_str)?;
    let row: usize = row_str
        .parse()
        .map_err(|_| LabelError::InvalidRow(row_str.to_string()))?;
    if row == 0 {
        return Err(LabelError::InvalidRow(row_str.to_string()));
    }
    Ok(CellAddress::new(row - 1, col))
}
