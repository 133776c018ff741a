/*!
# Quotation Manager

Back end for a project quotation editor. Every project's quotation lives in
one worksheet of a workbook; clients load the table, edit it locally and save
it back.

## Architecture

### Store Layer
- **store**: the `SheetStore` capability set (list/add worksheets, read,
  write and clear cell ranges, batch updates) and the in-memory workbook
- **saving**: gzip + bincode persistence of the workbook (`FileWorkbook`)
- **retry**: `RetryPolicy` and the `RetryingStore` wrapper that applies it to
  every store call

### Quotation Layer
- **quotation**: the fixed-schema Quotation Table (`Item`, `Part Number`,
  `Description`, `Quantity`, `Unit`, `Unit Price`, `Subtotal`); item numbers
  and subtotals are always derived
- **reconcile**: the row diff that saves an edited table with as few range
  writes as possible
- **project**: project worksheets (create, open, load, save, terms)
- **terms**: terms & conditions kept in columns I/J beside the table

### Surfaces
- **app**: axum JSON API with explicit per-project session state
- **loader** / **downloader**: CSV import, CSV and XLSX export
- **config**: JSON configuration with defaults

## Saving

Rows have no stable id: they are matched by position. On save the local table
is compared with the stored one row by row:

- stored table empty: one full write (header + rows)
- changed rows: one write per contiguous block of changed rows
- added rows: one append after the last populated row of the worksheet
- removed rows: clear and rewrite the whole table

Each write is its own store call. Transient failures are retried by the
store's policy; a write that still fails stops the save and is reported
together with how many writes already landed.
*/

#[cfg(feature = "web")]
pub mod app;
pub mod config;
pub mod downloader;
pub mod loader;
pub mod project;
pub mod quotation;
pub mod range;
pub mod reconcile;
pub mod retry;
pub mod saving;
pub mod store;
pub mod terms;

/// Re-export the types most callers need
pub use project::{ProjectSheet, QuoteError, create_project, list_projects};
pub use quotation::{QuotationRow, QuotationTable, SHEET_HEADERS, SheetLayout};
pub use range::CellRange;
pub use reconcile::{ApplyError, ApplyReport, apply_sheet_updates};
pub use retry::{Backoff, RetryPolicy, RetryingStore};
pub use saving::FileWorkbook;
pub use store::{MemoryWorkbook, RangeUpdate, SheetStore, StoreError};
pub use terms::Terms;
