use log::debug;
use serde::{Deserialize, Serialize};

use crate::range::CellRange;
use crate::store::{RangeUpdate, SheetStore, StoreError};

/// Terms & conditions label, label cell and value cell.
pub const TERMS_LABELS: [(&str, &str, &str); 5] = [
    ("Terms of payment", "I2", "J2"),
    ("Delivery", "I3", "J3"),
    ("Warranty", "I4", "J4"),
    ("Price Validity", "I5", "J5"),
    ("Discount", "I8", "J8"),
];

/// Free-text terms stored beside the quotation table.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Terms {
    #[serde(default)]
    pub payment: String,
    #[serde(default)]
    pub delivery: String,
    #[serde(default)]
    pub warranty: String,
    #[serde(default)]
    pub price_validity: String,
    /// Kept as entered; nothing is computed from it here.
    #[serde(default)]
    pub discount: String,
}

impl Terms {
    /// Value for a label of [`TERMS_LABELS`].
    pub fn get(&self, label: &str) -> Option<&str> {
        let value = match label {
            "Terms of payment" => &self.payment,
            "Delivery" => &self.delivery,
            "Warranty" => &self.warranty,
            "Price Validity" => &self.price_validity,
            "Discount" => &self.discount,
            _ => return None,
        };
        Some(value.as_str())
    }

    fn slot(&mut self, label: &str) -> Option<&mut String> {
        match label {
            "Terms of payment" => Some(&mut self.payment),
            "Delivery" => Some(&mut self.delivery),
            "Warranty" => Some(&mut self.warranty),
            "Price Validity" => Some(&mut self.price_validity),
            "Discount" => Some(&mut self.discount),
            _ => None,
        }
    }

    /// `(label, value)` pairs in display order.
    pub fn entries(&self) -> Vec<(&'static str, &str)> {
        TERMS_LABELS
            .iter()
            .map(|(label, _, _)| (*label, self.get(label).unwrap_or_default()))
            .collect()
    }
}

/// Read every term; a cell that cannot be read counts as empty.
pub fn read_terms<S: SheetStore + ?Sized>(store: &S, title: &str) -> Terms {
    let mut terms = Terms::default();
    for (label, _, value_cell) in TERMS_LABELS {
        let value = CellRange::parse(value_cell)
            .and_then(|range| store.read_range(title, &range))
            .map(|values| {
                values
                    .into_iter()
                    .next()
                    .and_then(|row| row.into_iter().next())
                    .unwrap_or_default()
            });
        let value = match value {
            Ok(v) => v,
            Err(e) => {
                debug!("term '{}' of '{}' unreadable: {}", label, title, e);
                String::new()
            }
        };
        if let Some(slot) = terms.slot(label) {
            *slot = value;
        }
    }
    terms
}

/// Labels and values for a worksheet, in one batch.
pub fn terms_updates(terms: &Terms) -> Result<Vec<RangeUpdate>, StoreError> {
    let mut updates = Vec::with_capacity(TERMS_LABELS.len() * 2);
    for (label, label_cell, value_cell) in TERMS_LABELS {
        updates.push(RangeUpdate::single(CellRange::parse(label_cell)?, label));
        updates.push(RangeUpdate::single(
            CellRange::parse(value_cell)?,
            terms.get(label).unwrap_or_default(),
        ));
    }
    Ok(updates)
}

/// Only the label cells, written when a project worksheet is created.
pub fn label_updates() -> Result<Vec<RangeUpdate>, StoreError> {
    TERMS_LABELS
        .iter()
        .map(|(label, label_cell, _)| {
            Ok::<_, StoreError>(RangeUpdate::single(CellRange::parse(label_cell)?, *label))
        })
        .collect()
}

pub fn save_terms<S: SheetStore + ?Sized>(
    store: &mut S,
    title: &str,
    terms: &Terms,
) -> Result<(), StoreError> {
    store.batch_update(title, &terms_updates(terms)?)
}
