use crate::quotation::QuotationTable;
use std::error::Error;
use std::fs;
use std::path::Path;

/// Load a quotation table from a CSV file
///
/// The first line is the header row. Columns are matched by header name when
/// the header has the seven quotation columns, otherwise by position. Quantity
/// and unit price that are not numbers load as zero; item numbers and
/// subtotals in the file are ignored and recomputed.
///
/// # Examples
/// ```no_run
/// use quotesheet::loader::from_csv;
///
/// match from_csv("quote.csv") {
///     Ok(table) => println!("Loaded {} line items", table.len()),
///     Err(e) => eprintln!("Error loading CSV: {}", e),
/// }
/// ```
pub fn from_csv(filepath: impl AsRef<Path>) -> Result<QuotationTable, Box<dyn Error>> {
    let text = fs::read_to_string(filepath)?;
    parse_csv(&text)
}

/// Parse CSV text into a quotation table. See [`from_csv`].
pub fn parse_csv(text: &str) -> Result<QuotationTable, Box<dyn Error>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    if text.trim().is_empty() {
        return Err("CSV file is empty".into());
    }

    let values = parse_csv_records(text)?;
    Ok(QuotationTable::from_sheet_values(&values))
}

// Split CSV text into records of fields. A newline inside a quoted field is
// part of the field; only a newline outside quotes ends the record.
fn parse_csv_records(text: &str) -> Result<Vec<Vec<String>>, Box<dyn Error>> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut current_field = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut record_line = 1;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if in_quotes && chars.peek() == Some(&'"') {
                    // Double quote inside quoted field - add a single quote
                    current_field.push('"');
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current_field));
            }
            '\r' if !in_quotes && chars.peek() == Some(&'\n') => {}
            '\n' if !in_quotes => {
                fields.push(std::mem::take(&mut current_field));
                records.push(std::mem::take(&mut fields));
                line += 1;
                record_line = line;
            }
            '\n' => {
                current_field.push(c);
                line += 1;
            }
            _ => {
                current_field.push(c);
            }
        }
    }

    if in_quotes {
        return Err(format!("line {}: unterminated quoted field", record_line).into());
    }

    // Last record when the text does not end with a newline
    if !current_field.is_empty() || !fields.is_empty() {
        fields.push(current_field);
        records.push(fields);
    }

    Ok(records)
}
