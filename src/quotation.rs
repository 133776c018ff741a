use serde::{Deserialize, Serialize};

/// Header row of every project worksheet, columns A..G.
pub const SHEET_HEADERS: [&str; 7] = [
    "Item",
    "Part Number",
    "Description",
    "Quantity",
    "Unit",
    "Unit Price",
    "Subtotal",
];

pub const COLUMN_COUNT: u32 = SHEET_HEADERS.len() as u32;

/// Sheet row holding the headers; data starts on the row below.
pub const HEADER_ROW: u32 = 1;
pub const FIRST_DATA_ROW: u32 = HEADER_ROW + 1;

/// Geometry of a project worksheet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetLayout {
    /// Last sheet row belonging to the table window `A1:G{max_rows}`.
    pub max_rows: u32,
    pub new_sheet_rows: u32,
    pub new_sheet_cols: u32,
}

impl Default for SheetLayout {
    fn default() -> Self {
        SheetLayout {
            max_rows: 100,
            new_sheet_rows: 100,
            new_sheet_cols: 20,
        }
    }
}

/// One line item. `Item` and `Subtotal` are derived and therefore not stored.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QuotationRow {
    pub part_number: String,
    pub description: String,
    pub quantity: f64,
    pub unit: String,
    pub unit_price: f64,
}

impl QuotationRow {
    pub fn new(
        part_number: impl Into<String>,
        description: impl Into<String>,
        quantity: f64,
        unit: impl Into<String>,
        unit_price: f64,
    ) -> Self {
        QuotationRow {
            part_number: part_number.into(),
            description: description.into(),
            quantity: round2(finite_or_zero(quantity)),
            unit: unit.into(),
            unit_price: round2(finite_or_zero(unit_price)),
        }
    }

    pub fn blank() -> Self {
        Self::default()
    }

    /// Computed from the two-decimal values the sheet stores, so a reloaded
    /// row always has the same subtotal as the local one.
    pub fn subtotal(&self) -> f64 {
        let quantity = round2(finite_or_zero(self.quantity));
        let unit_price = round2(finite_or_zero(self.unit_price));
        round2(quantity * unit_price)
    }

    /// Cell values in header order; `item` is the 1-based position.
    pub fn to_cells(&self, item: usize) -> Vec<String> {
        vec![
            item.to_string(),
            self.part_number.clone(),
            self.description.clone(),
            format_number(self.quantity),
            self.unit.clone(),
            format_number(self.unit_price),
            format_number(self.subtotal()),
        ]
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QuotationTable {
    rows: Vec<QuotationRow>,
}

impl QuotationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<QuotationRow>) -> Self {
        QuotationTable { rows }
    }

    pub fn rows(&self) -> &[QuotationRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push(&mut self, row: QuotationRow) {
        self.rows.push(row);
    }

    /// Remove the row at 0-based `index`; later items shift up by one.
    pub fn remove(&mut self, index: usize) -> Option<QuotationRow> {
        (index < self.rows.len()).then(|| self.rows.remove(index))
    }

    pub fn total(&self) -> f64 {
        round2(self.rows.iter().map(QuotationRow::subtotal).sum())
    }

    /// Data rows as sheet cells, without the header.
    pub fn to_sheet_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| row.to_cells(i + 1))
            .collect()
    }

    /// Header row followed by every data row.
    pub fn to_sheet_values(&self) -> Vec<Vec<String>> {
        let mut values = Vec::with_capacity(self.rows.len() + 1);
        values.push(header_row());
        values.extend(self.to_sheet_rows());
        values
    }

    /// Build a table from a raw cell block whose first row is the header.
    ///
    /// A header of the expected width is used to locate columns by name;
    /// anything else falls back to the canonical column order. Rows are padded
    /// or truncated to the schema width and trailing blank rows are dropped.
    pub fn from_sheet_values(values: &[Vec<String>]) -> Self {
        let Some((raw_headers, data)) = values.split_first() else {
            return Self::new();
        };

        let headers: Vec<String> = if raw_headers.len() == SHEET_HEADERS.len() {
            raw_headers.iter().map(|h| h.trim().to_string()).collect()
        } else {
            header_row()
        };
        let position = |name: &str| headers.iter().position(|h| h == name);
        let columns: Vec<Option<usize>> = SHEET_HEADERS.iter().map(|h| position(*h)).collect();

        let mut normalized: Vec<Vec<String>> = data
            .iter()
            .map(|row| {
                let mut row: Vec<String> = row.iter().take(headers.len()).cloned().collect();
                row.resize(headers.len(), String::new());
                row
            })
            .collect();
        while normalized
            .last()
            .is_some_and(|row| row.iter().all(|v| v.trim().is_empty()))
        {
            normalized.pop();
        }

        let cell = |row: &[String], column: usize| -> String {
            columns[column]
                .and_then(|i| row.get(i))
                .cloned()
                .unwrap_or_default()
        };

        let rows = normalized
            .iter()
            .map(|row| {
                let row = row.as_slice();
                QuotationRow::new(
                    cell(row, 1),
                    cell(row, 2),
                    coerce_number(&cell(row, 3)),
                    cell(row, 4),
                    coerce_number(&cell(row, 5)),
                )
            })
            .collect();

        QuotationTable { rows }
    }
}

pub fn header_row() -> Vec<String> {
    SHEET_HEADERS.iter().map(|h| h.to_string()).collect()
}

/// Parse a cell as a number, `0.0` when it is empty or not numeric.
pub fn coerce_number(text: &str) -> f64 {
    let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// `2.0 -> "2"`, `2.5 -> "2.5"`, `12.346 -> "12.35"` (at most two decimals).
pub fn format_number(value: f64) -> String {
    let value = round2(finite_or_zero(value));
    if value.fract() == 0.0 {
        format!("{}", value)
    } else {
        let text = format!("{:.2}", value);
        text.trim_end_matches('0').to_string()
    }
}

fn round2(value: f64) -> f64 {
    let rounded = (value * 100.0).round() / 100.0;
    // avoid "-0"
    if rounded == 0.0 { 0.0 } else { rounded }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(row: &[&str]) -> Vec<String> {
        row.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn numbers_are_coerced_and_formatted() {
        assert_eq!(coerce_number(" 12 "), 12.0);
        assert_eq!(coerce_number("1,250.5"), 1250.5);
        assert_eq!(coerce_number("abc"), 0.0);
        assert_eq!(coerce_number(""), 0.0);
        assert_eq!(coerce_number("NaN"), 0.0);

        assert_eq!(format_number(2.0), "2");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(12.346), "12.35");
        assert_eq!(format_number(-0.001), "0");
        assert_eq!(format_number(1e19), "10000000000000000000");
        assert_eq!(format_number(-3.0), "-3");
    }

    #[test]
    fn stored_values_are_canonical() {
        let row = QuotationRow::new("P-1", "Cable", 0.125, "m", 100.0);
        assert_eq!(row.quantity, 0.13);
        assert_eq!(row.subtotal(), 13.0);

        // rows built field by field still agree with what the sheet holds
        let raw = QuotationRow {
            quantity: 0.125,
            unit_price: 100.0,
            ..QuotationRow::blank()
        };
        let cells = raw.to_cells(1);
        assert_eq!((cells[3].as_str(), cells[6].as_str()), ("0.13", "13"));

        let table = QuotationTable::from_rows(vec![raw]);
        let reloaded = QuotationTable::from_sheet_values(&table.to_sheet_values());
        assert_eq!(reloaded.to_sheet_rows(), table.to_sheet_rows());
    }

    #[test]
    fn item_and_subtotal_are_derived() {
        let mut table = QuotationTable::new();
        table.push(QuotationRow::new("P-1", "Cable", 3.0, "m", 12.5));
        table.push(QuotationRow::new("P-2", "Switch", 2.0, "pc", 1999.99));

        let rows = table.to_sheet_rows();
        assert_eq!(rows[0], strings(&["1", "P-1", "Cable", "3", "m", "12.5", "37.5"]));
        assert_eq!(rows[1], strings(&["2", "P-2", "Switch", "2", "pc", "1999.99", "3999.98"]));
        assert_eq!(table.total(), 4037.48);

        table.remove(0);
        assert_eq!(table.to_sheet_rows()[0][0], "1");
        assert!(table.remove(5).is_none());
    }

    #[test]
    fn sheet_values_start_with_header() {
        let table = QuotationTable::from_rows(vec![QuotationRow::blank()]);
        let values = table.to_sheet_values();
        assert_eq!(values[0], header_row());
        assert_eq!(values[1], strings(&["1", "", "", "0", "", "0", "0"]));
    }

    #[test]
    fn from_sheet_values_normalizes() {
        let values = vec![
            header_row(),
            strings(&["1", "P-1", "Cable", "x", "m", "4"]),
            strings(&["2", "P-2", "Switch", "2", "pc", "10", "999", "extra"]),
            strings(&[]),
        ];
        let table = QuotationTable::from_sheet_values(&values);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0].quantity, 0.0);
        assert_eq!(table.rows()[0].unit_price, 4.0);
        // stored subtotal is ignored
        assert_eq!(table.rows()[1].subtotal(), 20.0);
    }

    #[test]
    fn from_sheet_values_uses_named_columns() {
        let values = vec![
            strings(&["Item", "Description", "Part Number", "Unit", "Quantity", "Unit Price", "Subtotal"]),
            strings(&["1", "Cable", "P-1", "m", "3", "2", "6"]),
        ];
        let table = QuotationTable::from_sheet_values(&values);
        assert_eq!(table.rows()[0], QuotationRow::new("P-1", "Cable", 3.0, "m", 2.0));
    }

    #[test]
    fn from_sheet_values_odd_header_is_positional() {
        let values = vec![strings(&["Item", "Part"]), strings(&["1", "P-1", "Cable", "3", "m", "2"])];
        let table = QuotationTable::from_sheet_values(&values);
        assert_eq!(table.rows()[0], QuotationRow::new("P-1", "Cable", 3.0, "m", 2.0));
        assert!(QuotationTable::from_sheet_values(&[]).is_empty());
    }
}
