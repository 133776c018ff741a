use log::info;

use crate::quotation::{COLUMN_COUNT, HEADER_ROW, QuotationTable, SheetLayout, header_row};
use crate::range::CellRange;
use crate::reconcile::{ApplyError, ApplyReport, apply_sheet_updates};
use crate::store::{SheetStore, StoreError};
use crate::terms::{self, Terms};

#[derive(Debug, thiserror::Error)]
pub enum QuoteError {
    #[error("please enter a project name")]
    EmptyProjectName,
    #[error("project '{0}' already exists")]
    ProjectExists(String),
    #[error("project '{0}' not found")]
    ProjectNotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Apply(#[from] ApplyError),
}

/// Project names containing `filter`, ignoring case, in worksheet order.
pub fn list_projects<S: SheetStore + ?Sized>(store: &S, filter: &str) -> Result<Vec<String>, QuoteError> {
    let needle = filter.trim().to_lowercase();
    Ok(store
        .worksheet_titles()?
        .into_iter()
        .filter(|title| title.to_lowercase().contains(&needle))
        .collect())
}

/// Add a worksheet for `name` holding the header row and the terms labels.
pub fn create_project<S: SheetStore + ?Sized>(
    store: &mut S,
    layout: &SheetLayout,
    name: &str,
) -> Result<(), QuoteError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(QuoteError::EmptyProjectName);
    }
    if store.worksheet_titles()?.iter().any(|t| t == name) {
        return Err(QuoteError::ProjectExists(name.to_string()));
    }

    store.add_worksheet(name, layout.new_sheet_rows, layout.new_sheet_cols)?;
    store.write_range(
        name,
        &CellRange::rows(HEADER_ROW, HEADER_ROW, COLUMN_COUNT),
        &[header_row()],
    )?;
    store.batch_update(name, &terms::label_updates()?)?;
    info!("created project '{}'", name);
    Ok(())
}

/// One project's worksheet inside a store.
pub struct ProjectSheet<'a, S: SheetStore + ?Sized> {
    store: &'a mut S,
    layout: SheetLayout,
    title: String,
}

impl<'a, S: SheetStore + ?Sized> ProjectSheet<'a, S> {
    pub fn open(store: &'a mut S, layout: &SheetLayout, name: &str) -> Result<Self, QuoteError> {
        if !store.worksheet_titles()?.iter().any(|t| t == name) {
            return Err(QuoteError::ProjectNotFound(name.to_string()));
        }
        Ok(ProjectSheet {
            store,
            layout: *layout,
            title: name.to_string(),
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    fn window(&self) -> CellRange {
        CellRange::rows(HEADER_ROW, self.layout.max_rows, COLUMN_COUNT)
    }

    pub fn load_table(&self) -> Result<QuotationTable, QuoteError> {
        let values = self.store.read_range(&self.title, &self.window())?;
        Ok(QuotationTable::from_sheet_values(&values))
    }

    /// Replace the whole table window with `table`.
    pub fn save_table(&mut self, table: &QuotationTable) -> Result<(), QuoteError> {
        let values = table.to_sheet_values();
        let window = self.window();
        self.store.clear_range(&self.title, &window)?;
        self.store.write_range(
            &self.title,
            &CellRange::rows(HEADER_ROW, values.len() as u32, COLUMN_COUNT),
            &values,
        )?;
        Ok(())
    }

    pub fn apply_updates(
        &mut self,
        old: &QuotationTable,
        new: &QuotationTable,
    ) -> Result<ApplyReport, QuoteError> {
        Ok(apply_sheet_updates(&mut *self.store, &self.title, &self.layout, old, new)?)
    }

    /// Reload the remote table and reconcile `new` against it.
    pub fn save_changes(&mut self, new: &QuotationTable) -> Result<ApplyReport, QuoteError> {
        let old = self.load_table()?;
        self.apply_updates(&old, new)
    }

    pub fn read_terms(&self) -> Terms {
        terms::read_terms(&*self.store, &self.title)
    }

    pub fn save_terms(&mut self, terms: &Terms) -> Result<(), QuoteError> {
        Ok(terms::save_terms(&mut *self.store, &self.title, terms)?)
    }
}
