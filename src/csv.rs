//! CSV export escaping for lead lists.
//!
//! Lead exports are opened in spreadsheet software, so every cell is
//! neutralized against formula injection before standard CSV quoting.

/// Leading characters that make spreadsheets evaluate a cell as a formula.
const FORMULA_TRIGGERS: &[char] = &['=', '+', '-', '@', '\t', '\r'];

/// Escape a single CSV cell.
///
/// A cell starting with a formula trigger gets a leading `'`. The result is
/// then wrapped in double quotes, with internal quotes doubled, if it
/// contains a comma, quote, or line break. `None` becomes an empty cell.
#[must_use]
pub fn escape_csv_value(value: Option<&str>) -> String {
    let Some(value) = value else {
        return String::new();
    };

    let mut cell = String::with_capacity(value.len() + 3);
    if value.starts_with(FORMULA_TRIGGERS) {
        cell.push('\'');
    }
    cell.push_str(value);

    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell
    }
}

/// Escape and join one row of cells.
#[must_use]
pub fn csv_row(cells: &[Option<&str>]) -> String {
    cells
        .iter()
        .map(|cell| escape_csv_value(*cell))
        .collect::<Vec<_>>()
        .join(",")
}

/// Build a full CSV document from a header and rows, CRLF-terminated.
#[must_use]
pub fn csv_document(header: &[&str], rows: &[Vec<Option<&str>>]) -> String {
    let header: Vec<Option<&str>> = header.iter().map(|h| Some(*h)).collect();
    let mut out = csv_row(&header);
    out.push_str("\r\n");
    for row in rows {
        out.push_str(&csv_row(row));
        out.push_str("\r\n");
    }
    out
}
