use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::store::StoreError;

lazy_static! {
    static ref CELL_REGEX: Regex = Regex::new(r"^([A-Za-z]+)([0-9]+)$").unwrap();
}

/// A rectangular block of cells, 1-based and inclusive on both ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRange {
    pub start_row: u32,
    pub start_col: u32,
    pub end_row: u32,
    pub end_col: u32,
}

impl CellRange {
    pub fn new(start_row: u32, start_col: u32, end_row: u32, end_col: u32) -> Self {
        CellRange {
            start_row,
            start_col,
            end_row,
            end_col,
        }
    }

    /// Full-width span of sheet rows `start_row..=end_row`, starting at column A.
    pub fn rows(start_row: u32, end_row: u32, width: u32) -> Self {
        CellRange::new(start_row, 1, end_row, width)
    }

    pub fn cell(row: u32, col: u32) -> Self {
        CellRange::new(row, col, row, col)
    }

    pub fn height(&self) -> u32 {
        self.end_row + 1 - self.start_row
    }

    pub fn width(&self) -> u32 {
        self.end_col + 1 - self.start_col
    }

    pub fn is_single_cell(&self) -> bool {
        self.start_row == self.end_row && self.start_col == self.end_col
    }

    /// Parse `A1` notation: either a single cell (`J8`) or a block (`A1:G100`).
    pub fn parse(text: &str) -> Result<Self, StoreError> {
        let text = text.trim();
        let (first, second) = match text.split_once(':') {
            Some((a, b)) => (a, b),
            None => (text, text),
        };

        let (r1, c1) = parse_cell(first).ok_or_else(|| StoreError::InvalidRange(text.to_string()))?;
        let (r2, c2) = parse_cell(second).ok_or_else(|| StoreError::InvalidRange(text.to_string()))?;

        Ok(CellRange::new(r1.min(r2), c1.min(c2), r1.max(r2), c1.max(c2)))
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", cell_name(self.start_row, self.start_col))?;
        if !self.is_single_cell() {
            write!(f, ":{}", cell_name(self.end_row, self.end_col))?;
        }
        Ok(())
    }
}

fn parse_cell(text: &str) -> Option<(u32, u32)> {
    let captures = CELL_REGEX.captures(text)?;
    let col = letter_to_column(captures.get(1)?.as_str())?;
    let row = captures.get(2)?.as_str().parse::<u32>().ok()?;
    if row == 0 {
        return None;
    }
    Some((row, col))
}

/// Name of a single cell, e.g. `cell_name(8, 10) == "J8"`.
pub fn cell_name(row: u32, col: u32) -> String {
    format!("{}{}", column_to_letter(col), row)
}

/// Convert column number to letter (A=1, B=2, ..., Z=26, AA=27).
pub fn column_to_letter(col: u32) -> String {
    let mut name = String::new();
    let mut n = col;

    while n > 0 {
        n -= 1;
        name.insert(0, (b'A' + (n % 26) as u8) as char);
        n /= 26;
    }

    name
}

/// Inverse of [`column_to_letter`]. Case-insensitive; `None` for anything but letters.
pub fn letter_to_column(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    letters.chars().try_fold(0u32, |acc, c| {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = c.to_ascii_uppercase() as u32 - 'A' as u32 + 1;
        acc.checked_mul(26)?.checked_add(digit)
    })
}
