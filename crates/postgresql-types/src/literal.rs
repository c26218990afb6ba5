//! Text forms of cells.
//!
//! [`text_form`] is the unescaped PostgreSQL input representation of a cell.
//! The COPY encoder escapes it for the text format; single-row statements
//! bind it as a text parameter that the server casts to the column type.

use chrono::{DateTime, Utc};
use sync_core::Cell;

/// Timestamp layout accepted by both COPY and text parameters.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f%:z";

/// Unescaped text form of a cell, or `None` for NULL and deferred cells.
pub fn text_form(cell: &Cell) -> Option<String> {
    match cell {
        Cell::Null | Cell::Now => None,
        Cell::Bool(b) => Some(if *b { "t" } else { "f" }.to_string()),
        Cell::Int32(i) => Some(i.to_string()),
        Cell::Int64(i) => Some(i.to_string()),
        Cell::Double(f) => Some(double_text(*f)),
        Cell::Decimal(s) | Cell::Text(s) => Some(s.clone()),
        Cell::Bytes(b) => Some(format!("\\x{}", hex::encode(b))),
        Cell::Timestamp(dt) => Some(timestamp_text(dt)),
        Cell::Json(v) => Some(v.to_string()),
        Cell::Array { elements, .. } => Some(array_literal(elements)),
    }
}

/// PostgreSQL array literal, e.g. `{"1","2",NULL}`.
pub fn array_literal(elements: &[Cell]) -> String {
    let items: Vec<String> = elements
        .iter()
        .map(|element| match element {
            // Nested arrays are written inline to form a multi-dimensional literal.
            Cell::Array { elements, .. } => array_literal(elements),
            other => match text_form(other) {
                Some(text) => format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\"")),
                None => "NULL".to_string(),
            },
        })
        .collect();
    format!("{{{}}}", items.join(","))
}

/// Parameter placeholder that reads a text value and casts it to `sql_type`.
pub fn placeholder(index: usize, sql_type: &str) -> String {
    format!("${index}::text::{sql_type}")
}

fn double_text(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        f.to_string()
    }
}

fn timestamp_text(dt: &DateTime<Utc>) -> String {
    dt.format(TIMESTAMP_FORMAT).to_string()
}
