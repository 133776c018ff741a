use crate::quotation::QuotationTable;
#[cfg(feature = "web")]
use crate::quotation::SHEET_HEADERS;
#[cfg(feature = "web")]
use std::error::Error;

/// Convert a quotation table to CSV format
///
/// The output starts with the header row and has one line per item, with
/// item numbers and subtotals filled in. Fields containing commas, quotes or
/// newlines are quoted and embedded quotes doubled.
///
/// # Examples
/// ```
/// use quotesheet::downloader::to_csv;
/// use quotesheet::quotation::{QuotationRow, QuotationTable};
///
/// let table = QuotationTable::from_rows(vec![QuotationRow::new("P-1", "Cable", 2.0, "m", 3.0)]);
/// let csv = to_csv(&table);
/// assert!(csv.ends_with("1,P-1,Cable,2,m,3,6\n"));
/// ```
pub fn to_csv(table: &QuotationTable) -> String {
    let mut csv_content = String::new();

    for row in table.to_sheet_values() {
        for (c, value) in row.iter().enumerate() {
            if c > 0 {
                csv_content.push(',');
            }
            if value.contains(',') || value.contains('"') || value.contains('\n') {
                let escaped = value.replace('"', "\"\"");
                csv_content.push_str(&format!("\"{}\"", escaped));
            } else {
                csv_content.push_str(value);
            }
        }
        csv_content.push('\n');
    }

    csv_content
}

/// Convert a quotation table to XLSX format
///
/// Writes one worksheet named after the project. Text columns are written as
/// strings and numeric columns as numbers so the spreadsheet can sum them.
#[cfg(feature = "web")]
pub fn to_xlsx(project: &str, table: &QuotationTable) -> Result<Vec<u8>, Box<dyn Error>> {
    use rust_xlsxwriter::{Format, Workbook};

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(xlsx_sheet_name(project))?;

    let bold = Format::new().set_bold();
    for (c, header) in SHEET_HEADERS.iter().enumerate() {
        worksheet.write_string_with_format(0, c as u16, *header, &bold)?;
    }

    for (i, row) in table.rows().iter().enumerate() {
        let r = (i + 1) as u32;
        worksheet.write_number(r, 0, (i + 1) as f64)?;
        worksheet.write_string(r, 1, &row.part_number)?;
        worksheet.write_string(r, 2, &row.description)?;
        worksheet.write_number(r, 3, row.quantity)?;
        worksheet.write_string(r, 4, &row.unit)?;
        worksheet.write_number(r, 5, row.unit_price)?;
        worksheet.write_number(r, 6, row.subtotal())?;
    }

    let total_row = (table.len() + 1) as u32;
    worksheet.write_string_with_format(total_row, 5, "Total", &bold)?;
    worksheet.write_number(total_row, 6, table.total())?;

    let buffer = workbook.save_to_buffer()?;
    Ok(buffer)
}

// Excel limits sheet names to 31 characters and forbids a few symbols.
#[cfg(feature = "web")]
fn xlsx_sheet_name(project: &str) -> String {
    let cleaned: String = project
        .chars()
        .map(|c| if "[]:*?/\\".contains(c) { '_' } else { c })
        .take(31)
        .collect();
    if cleaned.trim().is_empty() {
        "Quotation".to_string()
    } else {
        cleaned
    }
}
