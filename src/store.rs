//! The tabular workbook store that quotations are kept in.
//!
//! [`SheetStore`] is the capability set the rest of the crate relies on:
//! listing and adding worksheets, and reading, writing and clearing cell
//! ranges. [`MemoryWorkbook`] keeps everything in memory and is what
//! [`crate::saving::FileWorkbook`] persists to disk.

use serde::{Deserialize, Serialize};

use crate::range::CellRange;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sheet API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("worksheet '{0}' not found")]
    WorksheetNotFound(String),
    #[error("worksheet '{0}' already exists")]
    WorksheetExists(String),
    #[error("invalid range: {0}")]
    InvalidRange(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("workbook encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

impl StoreError {
    /// Errors worth retrying: rate limiting, server-side failures, dropped connections.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Unavailable(_) => true,
            StoreError::Api { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }
}

/// One labeled write inside a [`SheetStore::batch_update`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RangeUpdate {
    pub range: CellRange,
    pub values: Vec<Vec<String>>,
}

impl RangeUpdate {
    pub fn single(range: CellRange, value: impl Into<String>) -> Self {
        RangeUpdate {
            range,
            values: vec![vec![value.into()]],
        }
    }
}

pub trait SheetStore {
    fn worksheet_titles(&self) -> Result<Vec<String>, StoreError>;

    fn add_worksheet(&mut self, title: &str, rows: u32, cols: u32) -> Result<(), StoreError>;

    /// Values inside `range`. Trailing empty cells and trailing empty rows are omitted.
    fn read_range(&self, title: &str, range: &CellRange) -> Result<Vec<Vec<String>>, StoreError>;

    /// Overwrite cells starting at the top-left of `range`; `values` must fit inside it.
    fn write_range(
        &mut self,
        title: &str,
        range: &CellRange,
        values: &[Vec<String>],
    ) -> Result<(), StoreError>;

    fn clear_range(&mut self, title: &str, range: &CellRange) -> Result<(), StoreError>;

    fn batch_update(&mut self, title: &str, updates: &[RangeUpdate]) -> Result<(), StoreError>;
}

impl<S: SheetStore + ?Sized> SheetStore for Box<S> {
    fn worksheet_titles(&self) -> Result<Vec<String>, StoreError> {
        (**self).worksheet_titles()
    }

    fn add_worksheet(&mut self, title: &str, rows: u32, cols: u32) -> Result<(), StoreError> {
        (**self).add_worksheet(title, rows, cols)
    }

    fn read_range(&self, title: &str, range: &CellRange) -> Result<Vec<Vec<String>>, StoreError> {
        (**self).read_range(title, range)
    }

    fn write_range(
        &mut self,
        title: &str,
        range: &CellRange,
        values: &[Vec<String>],
    ) -> Result<(), StoreError> {
        (**self).write_range(title, range, values)
    }

    fn clear_range(&mut self, title: &str, range: &CellRange) -> Result<(), StoreError> {
        (**self).clear_range(title, range)
    }

    fn batch_update(&mut self, title: &str, updates: &[RangeUpdate]) -> Result<(), StoreError> {
        (**self).batch_update(title, updates)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Worksheet {
    pub title: String,
    pub rows: u32,
    pub cols: u32,
    /// Row-major cells; always `rows` rows of `cols` cells each.
    cells: Vec<Vec<String>>,
}

impl Worksheet {
    pub fn new(title: &str, rows: u32, cols: u32) -> Self {
        Worksheet {
            title: title.to_string(),
            rows,
            cols,
            cells: vec![vec![String::new(); cols as usize]; rows as usize],
        }
    }

    pub fn get(&self, row: u32, col: u32) -> Option<&str> {
        if row == 0 || col == 0 {
            return None;
        }
        self.cells
            .get((row - 1) as usize)
            .and_then(|r| r.get((col - 1) as usize))
            .map(String::as_str)
    }

    fn grow(&mut self, rows: u32, cols: u32) {
        if cols > self.cols {
            for row in self.cells.iter_mut() {
                row.resize(cols as usize, String::new());
            }
            self.cols = cols;
        }
        if rows > self.rows {
            self.cells
                .resize(rows as usize, vec![String::new(); self.cols as usize]);
            self.rows = rows;
        }
    }

    fn read(&self, range: &CellRange) -> Vec<Vec<String>> {
        let mut out = Vec::new();
        let last_row = range.end_row.min(self.rows);
        let last_col = range.end_col.min(self.cols);

        for r in range.start_row..=last_row {
            let mut row: Vec<String> = (range.start_col..=last_col)
                .map(|c| self.get(r, c).unwrap_or_default().to_string())
                .collect();
            while row.last().is_some_and(|v| v.is_empty()) {
                row.pop();
            }
            out.push(row);
        }

        while out.last().is_some_and(|r| r.is_empty()) {
            out.pop();
        }
        out
    }

    fn write(&mut self, range: &CellRange, values: &[Vec<String>]) -> Result<(), StoreError> {
        let height = values.len() as u32;
        let width = values.iter().map(|r| r.len()).max().unwrap_or(0) as u32;
        if height > range.height() || width > range.width() {
            return Err(StoreError::InvalidRange(format!(
                "{}x{} values do not fit in {}",
                height, width, range
            )));
        }
        if height == 0 || width == 0 {
            return Ok(());
        }

        self.grow(range.start_row + height - 1, range.start_col + width - 1);
        for (dr, row) in values.iter().enumerate() {
            let r = (range.start_row - 1) as usize + dr;
            for (dc, value) in row.iter().enumerate() {
                let c = (range.start_col - 1) as usize + dc;
                self.cells[r][c] = value.clone();
            }
        }
        Ok(())
    }

    fn clear(&mut self, range: &CellRange) {
        let last_row = range.end_row.min(self.rows);
        let last_col = range.end_col.min(self.cols);
        for r in range.start_row..=last_row {
            for c in range.start_col..=last_col {
                self.cells[(r - 1) as usize][(c - 1) as usize].clear();
            }
        }
    }
}

/// A workbook held entirely in memory.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MemoryWorkbook {
    sheets: Vec<Worksheet>,
}

impl MemoryWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn worksheet(&self, title: &str) -> Result<&Worksheet, StoreError> {
        self.sheets
            .iter()
            .find(|ws| ws.title == title)
            .ok_or_else(|| StoreError::WorksheetNotFound(title.to_string()))
    }

    fn worksheet_mut(&mut self, title: &str) -> Result<&mut Worksheet, StoreError> {
        self.sheets
            .iter_mut()
            .find(|ws| ws.title == title)
            .ok_or_else(|| StoreError::WorksheetNotFound(title.to_string()))
    }
}

impl SheetStore for MemoryWorkbook {
    fn worksheet_titles(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.sheets.iter().map(|ws| ws.title.clone()).collect())
    }

    fn add_worksheet(&mut self, title: &str, rows: u32, cols: u32) -> Result<(), StoreError> {
        if self.sheets.iter().any(|ws| ws.title == title) {
            return Err(StoreError::WorksheetExists(title.to_string()));
        }
        self.sheets.push(Worksheet::new(title, rows, cols));
        Ok(())
    }

    fn read_range(&self, title: &str, range: &CellRange) -> Result<Vec<Vec<String>>, StoreError> {
        Ok(self.worksheet(title)?.read(range))
    }

    fn write_range(
        &mut self,
        title: &str,
        range: &CellRange,
        values: &[Vec<String>],
    ) -> Result<(), StoreError> {
        self.worksheet_mut(title)?.write(range, values)
    }

    fn clear_range(&mut self, title: &str, range: &CellRange) -> Result<(), StoreError> {
        self.worksheet_mut(title)?.clear(range);
        Ok(())
    }

    fn batch_update(&mut self, title: &str, updates: &[RangeUpdate]) -> Result<(), StoreError> {
        let ws = self.worksheet_mut(title)?;
        for update in updates {
            ws.write(&update.range, &update.values)?;
        }
        Ok(())
    }
}
