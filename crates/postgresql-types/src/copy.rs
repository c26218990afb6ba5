//! Text-format encoding for `COPY ... FROM STDIN`.

use crate::literal::text_form;
use sync_core::Cell;

/// NULL marker of the COPY text format.
pub const COPY_NULL: &str = "\\N";

/// Escape backslash, tab, newline and carriage return.
pub fn escape_copy(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\t' => escaped.push_str("\\t"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Encode one cell. Deferred `now()` cells produce no field at all; the
/// column default supplies their value.
pub fn encode_field(cell: &Cell) -> Option<String> {
    match cell {
        Cell::Now => None,
        Cell::Null => Some(COPY_NULL.to_string()),
        other => Some(
            text_form(other)
                .map(|text| escape_copy(&text))
                .unwrap_or_else(|| COPY_NULL.to_string()),
        ),
    }
}

/// Encode a flat row as one newline-terminated COPY line.
pub fn encode_row(cells: &[Cell]) -> String {
    let fields: Vec<String> = cells.iter().filter_map(encode_field).collect();
    let mut line = fields.join("\t");
    line.push('\n');
    line
}
