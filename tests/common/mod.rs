#![allow(dead_code)]

use quotesheet::{CellRange, MemoryWorkbook, RangeUpdate, SheetStore, StoreError};
use std::cell::RefCell;

/// One store call as seen by [`RecordingStore`].
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Read(String),
    Write(String, usize),
    Clear(String),
    Batch(usize),
}

/// A [`MemoryWorkbook`] that records every call and can fail on demand.
///
/// `fail_writes` is a queue of outcomes for the next write/clear calls:
/// `Some(err)` fails that call, `None` lets it through.
#[derive(Default)]
pub struct RecordingStore {
    pub book: MemoryWorkbook,
    pub calls: RefCell<Vec<Call>>,
    pub fail_writes: Vec<Option<StoreError>>,
}

impl RecordingStore {
    pub fn new(book: MemoryWorkbook) -> Self {
        RecordingStore {
            book,
            ..Default::default()
        }
    }

    pub fn writes(&self) -> Vec<Call> {
        self.calls
            .borrow()
            .iter()
            .filter(|c| matches!(c, Call::Write(..)))
            .cloned()
            .collect()
    }

    pub fn reset(&self) {
        self.calls.borrow_mut().clear();
    }

    fn next_failure(&mut self) -> Result<(), StoreError> {
        if self.fail_writes.is_empty() {
            return Ok(());
        }
        match self.fail_writes.remove(0) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl SheetStore for RecordingStore {
    fn worksheet_titles(&self) -> Result<Vec<String>, StoreError> {
        self.book.worksheet_titles()
    }

    fn add_worksheet(&mut self, title: &str, rows: u32, cols: u32) -> Result<(), StoreError> {
        self.book.add_worksheet(title, rows, cols)
    }

    fn read_range(&self, title: &str, range: &CellRange) -> Result<Vec<Vec<String>>, StoreError> {
        self.calls.borrow_mut().push(Call::Read(range.to_string()));
        self.book.read_range(title, range)
    }

    fn write_range(
        &mut self,
        title: &str,
        range: &CellRange,
        values: &[Vec<String>],
    ) -> Result<(), StoreError> {
        self.next_failure()?;
        self.calls
            .borrow_mut()
            .push(Call::Write(range.to_string(), values.len()));
        self.book.write_range(title, range, values)
    }

    fn clear_range(&mut self, title: &str, range: &CellRange) -> Result<(), StoreError> {
        self.next_failure()?;
        self.calls.borrow_mut().push(Call::Clear(range.to_string()));
        self.book.clear_range(title, range)
    }

    fn batch_update(&mut self, title: &str, updates: &[RangeUpdate]) -> Result<(), StoreError> {
        self.calls.borrow_mut().push(Call::Batch(updates.len()));
        self.book.batch_update(title, updates)
    }
}

pub fn transient() -> StoreError {
    StoreError::Api {
        status: 503,
        message: "backend unavailable".into(),
    }
}
