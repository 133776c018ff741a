mod common;

use common::{Call, RecordingStore, transient};
use quotesheet::reconcile::SheetWrite;
use quotesheet::{
    ApplyError, Backoff, MemoryWorkbook, ProjectSheet, QuotationRow, QuotationTable, RetryPolicy,
    RetryingStore, SheetLayout, StoreError, apply_sheet_updates, create_project,
};

const PROJECT: &str = "Harbor Lights";

fn item(part: &str, quantity: f64) -> QuotationRow {
    QuotationRow::new(part, format!("{} description", part), quantity, "pc", 10.0)
}

fn table(parts: &[(&str, f64)]) -> QuotationTable {
    QuotationTable::from_rows(parts.iter().map(|(p, q)| item(p, *q)).collect())
}

fn five_rows() -> QuotationTable {
    table(&[("A", 1.0), ("B", 2.0), ("C", 3.0), ("D", 4.0), ("E", 5.0)])
}

/// A store holding `PROJECT` with `initial` already saved, call log cleared.
fn store_with(initial: &QuotationTable) -> RecordingStore {
    let mut book = MemoryWorkbook::new();
    let layout = SheetLayout::default();
    create_project(&mut book, &layout, PROJECT).unwrap();
    if !initial.is_empty() {
        ProjectSheet::open(&mut book, &layout, PROJECT)
            .unwrap()
            .save_table(initial)
            .unwrap();
    }
    RecordingStore::new(book)
}

fn remote_table(book: &mut MemoryWorkbook) -> QuotationTable {
    ProjectSheet::open(book, &SheetLayout::default(), PROJECT)
        .unwrap()
        .load_table()
        .unwrap()
}

#[test]
fn single_changed_row_is_one_write() {
    let old = five_rows();
    let new = QuotationTable::from_rows(
        old.rows()
            .iter()
            .enumerate()
            .map(|(i, r)| if i == 2 { item("C", 30.0) } else { r.clone() })
            .collect(),
    );

    let mut store = store_with(&old);
    let report = apply_sheet_updates(&mut store, PROJECT, &SheetLayout::default(), &old, &new).unwrap();

    assert_eq!(report.writes, 1);
    assert_eq!(report.rows_written, 1);
    assert_eq!(store.writes(), vec![Call::Write("A4:G4".into(), 1)]);
    assert_eq!(remote_table(&mut store.book), new);
}

#[test]
fn separated_groups_are_two_writes() {
    let old = five_rows();
    let new = table(&[("A", 9.0), ("B", 9.0), ("C", 3.0), ("D", 4.0), ("E", 9.0)]);

    let mut store = store_with(&old);
    let report = apply_sheet_updates(&mut store, PROJECT, &SheetLayout::default(), &old, &new).unwrap();

    assert_eq!(report.writes, 2);
    assert_eq!(
        store.writes(),
        vec![Call::Write("A2:G3".into(), 2), Call::Write("A6:G6".into(), 1)]
    );
    assert_eq!(remote_table(&mut store.book), new);
}

#[test]
fn appended_row_is_one_append() {
    let old = table(&[("A", 2.0)]);
    let new = table(&[("A", 2.0), ("B", 1.0)]);

    let mut store = store_with(&old);
    let report = apply_sheet_updates(&mut store, PROJECT, &SheetLayout::default(), &old, &new).unwrap();

    assert_eq!(report.writes, 1);
    assert_eq!(store.writes(), vec![Call::Write("A3:G3".into(), 1)]);
    // the append position comes from the store, not from the old table
    assert_eq!(store.calls.borrow()[0], Call::Read("A1:G100".into()));
    assert_eq!(remote_table(&mut store.book), new);
}

#[test]
fn append_lands_after_rows_added_elsewhere() {
    let old = table(&[("A", 2.0)]);
    let new = table(&[("A", 2.0), ("B", 1.0)]);

    // another session already wrote a second row
    let mut store = store_with(&table(&[("A", 2.0), ("X", 7.0)]));
    apply_sheet_updates(&mut store, PROJECT, &SheetLayout::default(), &old, &new).unwrap();

    assert_eq!(store.writes(), vec![Call::Write("A4:G4".into(), 1)]);
    let remote = remote_table(&mut store.book);
    assert_eq!(remote.len(), 3);
    assert_eq!(remote.rows()[1].part_number, "X");
    assert_eq!(remote.rows()[2].part_number, "B");
}

#[test]
fn change_and_append_together() {
    let old = table(&[("A", 1.0), ("B", 2.0)]);
    let new = table(&[("A", 1.0), ("B", 5.0), ("C", 1.0), ("D", 1.0)]);

    let mut store = store_with(&old);
    let report = apply_sheet_updates(&mut store, PROJECT, &SheetLayout::default(), &old, &new).unwrap();

    assert_eq!((report.writes, report.rows_written), (2, 3));
    assert_eq!(
        store.writes(),
        vec![Call::Write("A3:G3".into(), 1), Call::Write("A4:G5".into(), 2)]
    );
    assert_eq!(remote_table(&mut store.book), new);
}

#[test]
fn deleted_rows_fall_back_to_full_rewrite() {
    let old = five_rows();
    let new = table(&[("A", 1.0), ("C", 3.0)]);

    let mut store = store_with(&old);
    let report = apply_sheet_updates(&mut store, PROJECT, &SheetLayout::default(), &old, &new).unwrap();

    assert_eq!((report.writes, report.rows_written), (1, 2));
    assert_eq!(
        *store.calls.borrow(),
        vec![Call::Clear("A1:G100".into()), Call::Write("A1:G3".into(), 3)]
    );
    assert_eq!(remote_table(&mut store.book), new);
}

#[test]
fn deleting_every_row_leaves_the_header() {
    let old = table(&[("A", 1.0)]);
    let new = QuotationTable::new();

    let mut store = store_with(&old);
    apply_sheet_updates(&mut store, PROJECT, &SheetLayout::default(), &old, &new).unwrap();

    assert_eq!(store.writes(), vec![Call::Write("A1:G1".into(), 1)]);
    assert!(remote_table(&mut store.book).is_empty());
    let ws = store.book.worksheet(PROJECT).unwrap();
    assert_eq!(ws.get(1, 1), Some("Item"));
}

#[test]
fn empty_old_table_is_a_full_write() {
    let old = QuotationTable::new();
    let new = table(&[("A", 1.0), ("B", 2.0)]);

    let mut store = store_with(&old);
    let report = apply_sheet_updates(&mut store, PROJECT, &SheetLayout::default(), &old, &new).unwrap();

    assert_eq!(report.writes, 1);
    assert_eq!(store.writes(), vec![Call::Write("A1:G3".into(), 3)]);
    assert_eq!(remote_table(&mut store.book), new);
}

#[test]
fn fractional_values_settle_after_one_save() {
    let table = QuotationTable::from_rows(vec![
        QuotationRow::new("P-1", "Cable", 0.125, "m", 100.0),
        QuotationRow::new("P-2", "Gland", 3.0, "pc", 0.333),
    ]);
    let mut store = store_with(&QuotationTable::new());
    let layout = SheetLayout::default();
    let mut sheet = ProjectSheet::open(&mut store, &layout, PROJECT).unwrap();

    assert_eq!(sheet.save_changes(&table).unwrap().writes, 1);
    assert_eq!(sheet.save_changes(&table).unwrap().writes, 0);
    assert_eq!(sheet.save_changes(&table).unwrap().writes, 0);

    let stored = sheet.load_table().unwrap();
    assert_eq!(stored, table);
    assert_eq!(stored.to_sheet_rows()[0][6], "13");
}

#[test]
fn identical_tables_write_nothing() {
    let old = five_rows();
    let mut store = store_with(&old);
    let report = apply_sheet_updates(&mut store, PROJECT, &SheetLayout::default(), &old, &old.clone()).unwrap();

    assert_eq!((report.writes, report.rows_written), (0, 0));
    assert!(store.calls.borrow().is_empty());

    let empty = QuotationTable::new();
    let report = apply_sheet_updates(&mut store, PROJECT, &SheetLayout::default(), &empty, &empty).unwrap();
    assert_eq!(report.writes, 0);
}

#[test]
fn transient_failures_are_retried() {
    let old = five_rows();
    let new = table(&[("A", 1.0), ("B", 2.0), ("C", 33.0), ("D", 4.0), ("E", 5.0)]);

    let mut recording = store_with(&old);
    recording.fail_writes = vec![Some(transient()), Some(transient())];
    let mut store = RetryingStore::new(recording, RetryPolicy::new(3, Backoff::None));

    let report = apply_sheet_updates(&mut store, PROJECT, &SheetLayout::default(), &old, &new).unwrap();
    assert_eq!(report.writes, 1);

    let mut recording = store.into_inner();
    assert!(recording.fail_writes.is_empty());
    assert_eq!(remote_table(&mut recording.book), new);
}

#[test]
fn exhausted_retries_abandon_remaining_writes() {
    let old = five_rows();
    let new = table(&[("A", 9.0), ("B", 2.0), ("C", 3.0), ("D", 4.0), ("E", 9.0)]);

    let mut recording = store_with(&old);
    recording.fail_writes = vec![None, Some(transient()), Some(transient()), Some(transient())];
    let mut store = RetryingStore::new(recording, RetryPolicy::new(3, Backoff::None));

    let err = apply_sheet_updates(&mut store, PROJECT, &SheetLayout::default(), &old, &new).unwrap_err();
    match err {
        ApplyError::Partial {
            applied,
            planned,
            cleared,
            source,
        } => {
            assert_eq!((applied, planned), (1, 2));
            assert_eq!(cleared, None);
            assert!(source.is_transient());
        }
        other => panic!("unexpected error: {}", other),
    }

    // the first block landed and was not rolled back
    let mut recording = store.into_inner();
    let remote = remote_table(&mut recording.book);
    assert_eq!(remote.rows()[0].quantity, 9.0);
    assert_eq!(remote.rows()[4].quantity, 5.0);
}

#[test]
fn permanent_errors_are_not_retried() {
    let old = five_rows();
    let new = table(&[("A", 9.0), ("B", 2.0), ("C", 3.0), ("D", 4.0), ("E", 5.0)]);

    let mut recording = store_with(&old);
    recording.fail_writes = vec![Some(StoreError::InvalidRange("A2:G2".into())), None];
    let mut store = RetryingStore::new(recording, RetryPolicy::new(3, Backoff::None));

    let err = apply_sheet_updates(&mut store, PROJECT, &SheetLayout::default(), &old, &new).unwrap_err();
    assert!(matches!(err, ApplyError::Partial { applied: 0, planned: 1, .. }));
    assert_eq!(store.inner().fail_writes.len(), 1);
}

#[test]
fn failed_rewrite_reports_the_cleared_window() {
    let old = five_rows();
    let new = table(&[("A", 1.0)]);

    let mut store = store_with(&old);
    store.fail_writes = vec![None, Some(StoreError::InvalidRange("A1:G2".into()))];

    let err = apply_sheet_updates(&mut store, PROJECT, &SheetLayout::default(), &old, &new).unwrap_err();
    assert!(err.to_string().contains("A1:G100 was cleared"));
    match err {
        ApplyError::Partial {
            applied, cleared, ..
        } => {
            assert_eq!(applied, 0);
            assert_eq!(cleared.map(|r| r.to_string()), Some("A1:G100".to_string()));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(remote_table(&mut store.book).is_empty());
}

#[test]
fn unreadable_worksheet_fails_before_writing() {
    let old = table(&[("A", 1.0)]);
    let new = table(&[("A", 1.0), ("B", 1.0)]);

    let mut store = RecordingStore::new(MemoryWorkbook::new());
    let err = apply_sheet_updates(&mut store, "Missing", &SheetLayout::default(), &old, &new).unwrap_err();
    assert!(matches!(
        err,
        ApplyError::Read {
            source: StoreError::WorksheetNotFound(_),
            ..
        }
    ));
    assert!(store.writes().is_empty());
}

#[test]
fn planned_writes_serialize_for_clients() {
    let write = SheetWrite::Update {
        range: quotesheet::CellRange::rows(4, 4, 7),
        values: vec![vec!["3".to_string()]],
    };
    let json = serde_json::to_value(&write).unwrap();
    assert_eq!(json["kind"], "update");
    assert_eq!(json["range"]["start_row"], 4);
}
