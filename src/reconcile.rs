//! Row reconciliation between a known table and a locally edited one.
//!
//! Saving a quotation should not rewrite the whole worksheet when only a few
//! rows changed: a full rewrite is slow and clobbers edits other sessions made
//! to rows we never touched. [`diff_rows`] classifies the edit, [`plan_writes`]
//! turns that into range writes, and [`apply_sheet_updates`] issues them.
//!
//! Rows are matched by position. Writes are independent store calls and are
//! not rolled back when a later one fails.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;

use crate::quotation::{COLUMN_COUNT, FIRST_DATA_ROW, HEADER_ROW, QuotationTable, SheetLayout, header_row};
use crate::range::CellRange;
use crate::store::{SheetStore, StoreError};

/// Inclusive span of 0-based data row indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RowBlock {
    pub start: usize,
    pub end: usize,
}

impl RowBlock {
    pub fn row_count(&self) -> usize {
        self.end + 1 - self.start
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RowDiff {
    /// Nothing to write.
    Unchanged,
    /// The known table was empty: write header and every row.
    FullWrite,
    /// Rows were deleted: clear the window and write header and every row.
    Rewrite,
    /// Overwrite the changed blocks, then append the trailing new rows.
    Patch {
        changed: Vec<RowBlock>,
        appended: Option<RowBlock>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SheetWrite {
    /// Clear `clear`, then write `values` (header included) at `range`.
    Rewrite {
        clear: CellRange,
        range: CellRange,
        values: Vec<Vec<String>>,
    },
    Update {
        range: CellRange,
        values: Vec<Vec<String>>,
    },
    Append {
        range: CellRange,
        values: Vec<Vec<String>>,
    },
}

impl SheetWrite {
    pub fn range(&self) -> &CellRange {
        match self {
            SheetWrite::Rewrite { range, .. }
            | SheetWrite::Update { range, .. }
            | SheetWrite::Append { range, .. } => range,
        }
    }

    pub fn values(&self) -> &[Vec<String>] {
        match self {
            SheetWrite::Rewrite { values, .. }
            | SheetWrite::Update { values, .. }
            | SheetWrite::Append { values, .. } => values,
        }
    }

    /// Data rows written, header excluded.
    pub fn data_rows(&self) -> usize {
        match self {
            SheetWrite::Rewrite { values, .. } => values.len().saturating_sub(1),
            SheetWrite::Update { values, .. } | SheetWrite::Append { values, .. } => values.len(),
        }
    }

    /// On failure also returns the range that was already cleared, if any.
    fn apply<S: SheetStore + ?Sized>(
        &self,
        store: &mut S,
        title: &str,
    ) -> Result<(), (StoreError, Option<CellRange>)> {
        match self {
            SheetWrite::Rewrite {
                clear,
                range,
                values,
            } => {
                store.clear_range(title, clear).map_err(|e| (e, None))?;
                store.write_range(title, range, values).map_err(|e| {
                    warn!(
                        "worksheet '{}': {} was cleared but the table could not be rewritten",
                        title, clear
                    );
                    (e, Some(*clear))
                })
            }
            SheetWrite::Update { range, values } | SheetWrite::Append { range, values } => {
                store.write_range(title, range, values).map_err(|e| (e, None))
            }
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ApplyReport {
    pub writes: usize,
    pub rows_written: usize,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("could not read worksheet '{title}': {source}")]
    Read { title: String, source: StoreError },
    #[error("save stopped after {applied} of {planned} writes{}: {source}", cleared_note(.cleared))]
    Partial {
        applied: usize,
        planned: usize,
        /// Set when a rewrite cleared this range before its write failed.
        cleared: Option<CellRange>,
        source: StoreError,
    },
}

fn cleared_note(cleared: &Option<CellRange>) -> String {
    match cleared {
        Some(range) => format!(" ({} was cleared and is now empty)", range),
        None => String::new(),
    }
}

/// Group sorted indices into maximal runs of consecutive values.
pub fn contiguous_blocks(indices: &[usize]) -> Vec<RowBlock> {
    let Some((&first, rest)) = indices.split_first() else {
        return Vec::new();
    };

    let mut blocks = Vec::new();
    let mut block = RowBlock {
        start: first,
        end: first,
    };
    for &idx in rest {
        if idx == block.end + 1 {
            block.end = idx;
        } else {
            blocks.push(block);
            block = RowBlock { start: idx, end: idx };
        }
    }
    blocks.push(block);
    blocks
}

/// Classify the edit from `old` to `new`. Both are header-less rows of the same schema.
pub fn diff_rows(old: &[Vec<String>], new: &[Vec<String>]) -> RowDiff {
    if old.is_empty() {
        return if new.is_empty() {
            RowDiff::Unchanged
        } else {
            RowDiff::FullWrite
        };
    }
    if new.len() < old.len() {
        return RowDiff::Rewrite;
    }

    let changed: Vec<usize> = old
        .iter()
        .zip(new)
        .enumerate()
        .filter(|(_, (a, b))| a != b)
        .map(|(i, _)| i)
        .collect();
    let appended = (new.len() > old.len()).then(|| RowBlock {
        start: old.len(),
        end: new.len() - 1,
    });

    if changed.is_empty() && appended.is_none() {
        return RowDiff::Unchanged;
    }
    RowDiff::Patch {
        changed: contiguous_blocks(&changed),
        appended,
    }
}

/// 1-based sheet row of the last row holding any non-blank cell; 0 for an empty block.
///
/// `values` is read from row 1 downwards.
pub fn last_populated_row(values: &[Vec<String>]) -> u32 {
    values
        .iter()
        .rposition(|row| row.iter().any(|v| !v.trim().is_empty()))
        .map_or(0, |i| i as u32 + 1)
}

/// Turn a diff into store writes. `last_populated` positions the append.
pub fn plan_writes(
    diff: &RowDiff,
    new: &[Vec<String>],
    last_populated: u32,
    layout: &SheetLayout,
) -> Vec<SheetWrite> {
    let sheet_row = |idx: usize| idx as u32 + FIRST_DATA_ROW;

    match diff {
        RowDiff::Unchanged => Vec::new(),
        RowDiff::FullWrite | RowDiff::Rewrite => {
            let mut values = Vec::with_capacity(new.len() + 1);
            values.push(header_row());
            values.extend(new.iter().cloned());
            let range = CellRange::rows(HEADER_ROW, values.len() as u32, COLUMN_COUNT);
            let clear = CellRange::rows(HEADER_ROW, layout.max_rows.max(range.end_row), COLUMN_COUNT);
            vec![SheetWrite::Rewrite {
                clear,
                range,
                values,
            }]
        }
        RowDiff::Patch { changed, appended } => {
            let mut writes: Vec<SheetWrite> = changed
                .iter()
                .map(|block| SheetWrite::Update {
                    range: CellRange::rows(sheet_row(block.start), sheet_row(block.end), COLUMN_COUNT),
                    values: new[block.start..=block.end].to_vec(),
                })
                .collect();

            if let Some(block) = appended {
                let start = last_populated.max(HEADER_ROW) + 1;
                let end = start + block.row_count() as u32 - 1;
                writes.push(SheetWrite::Append {
                    range: CellRange::rows(start, end, COLUMN_COUNT),
                    values: new[block.start..=block.end].to_vec(),
                });
            }
            writes
        }
    }
}

/// Bring worksheet `title` from `old` to `new` with as few row writes as possible.
///
/// Appends need the last populated row of the table window, so one read is
/// issued when rows were added. Store calls are retried by whatever policy the
/// store carries; the first call that still fails abandons the remaining writes.
pub fn apply_sheet_updates<S: SheetStore + ?Sized>(
    store: &mut S,
    title: &str,
    layout: &SheetLayout,
    old: &QuotationTable,
    new: &QuotationTable,
) -> Result<ApplyReport, ApplyError> {
    let old_rows = old.to_sheet_rows();
    let new_rows = new.to_sheet_rows();
    let diff = diff_rows(&old_rows, &new_rows);

    let last_populated = match &diff {
        RowDiff::Patch {
            appended: Some(_), ..
        } => {
            let window = CellRange::rows(HEADER_ROW, layout.max_rows, COLUMN_COUNT);
            let values = store
                .read_range(title, &window)
                .map_err(|source| ApplyError::Read {
                    title: title.to_string(),
                    source,
                })?;
            let last = last_populated_row(&values);
            let expected = old_rows.len() as u32 + HEADER_ROW;
            if last != expected {
                warn!(
                    "worksheet '{}' ends at row {} but the known table ends at row {}",
                    title, last, expected
                );
            }
            last
        }
        _ => 0,
    };

    let writes = plan_writes(&diff, &new_rows, last_populated, layout);
    debug!("worksheet '{}': {:?} -> {} write(s)", title, diff, writes.len());

    let planned = writes.len();
    let mut rows_written = 0;
    for (applied, write) in writes.iter().enumerate() {
        write
            .apply(store, title)
            .map_err(|(source, cleared)| ApplyError::Partial {
                applied,
                planned,
                cleared,
                source,
            })?;
        rows_written += write.data_rows();
    }

    if planned > 0 {
        info!(
            "worksheet '{}' saved: {} write(s), {} row(s)",
            title, planned, rows_written
        );
    }
    Ok(ApplyReport {
        writes: planned,
        rows_written,
        finished_at: Utc::now(),
    })
}
