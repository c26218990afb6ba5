//! Row and cell representations produced by the mapping engine.
//!
//! A [`Row`] is what the transformer emits for a single document: one
//! [`RowCell`] per declared column, plus the leftover cell when the schema
//! captures extra properties. Cells that came out of a fan-out path are
//! tagged as [`RowCell::Fanout`] so the unfolder can expand them; every
//! other cell is a plain [`Cell`].

use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value as JsonValue;

/// A SQL-ready value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// SQL NULL, also used for absent document fields
    Null,

    /// Boolean value
    Bool(bool),

    /// 32-bit signed integer
    Int32(i32),

    /// 64-bit signed integer
    Int64(i64),

    /// 64-bit floating point
    Double(f64),

    /// Decimal value kept in its textual form
    Decimal(String),

    /// Text value
    Text(String),

    /// Opaque binary payload
    Bytes(Vec<u8>),

    /// Timestamp with timezone
    Timestamp(DateTime<Utc>),

    /// Structured value serialized as JSON text on the wire
    Json(JsonValue),

    /// Typed SQL array
    Array {
        /// Declared element type, when known
        element_type: Option<String>,
        /// Array elements
        elements: Vec<Cell>,
    },

    /// Deferred store-side `now()`; the destination computes the value.
    Now,
}

impl Cell {
    /// Create a text cell.
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Check if this cell is the deferred `now()` marker.
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Now)
    }

    /// Try to get this cell as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Decimal(s) => Some(s),
            _ => None,
        }
    }

    /// Convert this cell into its JSON representation.
    ///
    /// Binary payloads become base64 strings and non-finite floats become
    /// `null`, since JSON has no literal for either.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null | Self::Now => JsonValue::Null,
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Int32(i) => JsonValue::from(*i),
            Self::Int64(i) => JsonValue::from(*i),
            Self::Double(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Self::Decimal(s) | Self::Text(s) => JsonValue::String(s.clone()),
            Self::Bytes(b) => {
                JsonValue::String(base64::engine::general_purpose::STANDARD.encode(b))
            }
            Self::Timestamp(dt) => {
                JsonValue::String(dt.to_rfc3339_opts(SecondsFormat::Micros, true))
            }
            Self::Json(v) => v.clone(),
            Self::Array { elements, .. } => {
                JsonValue::Array(elements.iter().map(Cell::to_json).collect())
            }
        }
    }
}

impl From<bool> for Cell {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for Cell {
    fn from(i: i32) -> Self {
        Self::Int32(i)
    }
}

impl From<i64> for Cell {
    fn from(i: i64) -> Self {
        Self::Int64(i)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// One cell of a transformed row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowCell {
    /// An ordinary value.
    Value(Cell),

    /// A sequence produced by a fan-out path; expanded by the unfolder.
    Fanout(Vec<Cell>),
}

impl RowCell {
    /// Length of the fan-out sequence, or `None` for ordinary values.
    pub fn fanout_len(&self) -> Option<usize> {
        match self {
            Self::Value(_) => None,
            Self::Fanout(items) => Some(items.len()),
        }
    }

    /// Get the ordinary value, if this is not a fan-out cell.
    pub fn as_value(&self) -> Option<&Cell> {
        match self {
            Self::Value(cell) => Some(cell),
            Self::Fanout(_) => None,
        }
    }
}

impl From<Cell> for RowCell {
    fn from(cell: Cell) -> Self {
        Self::Value(cell)
    }
}

/// A transformed document, aligned to the schema's column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    pub cells: Vec<RowCell>,
}

impl Row {
    pub fn new(cells: Vec<RowCell>) -> Self {
        Self { cells }
    }

    /// Number of cells, including the leftover cell if present.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&RowCell> {
        self.cells.get(index)
    }

    /// Whether any cell carries a fan-out sequence.
    pub fn has_fanout(&self) -> bool {
        self.cells.iter().any(|c| c.fanout_len().is_some())
    }
}

/// A fully expanded row ready for the loader.
pub type FlatRow = Vec<Cell>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_cell_to_json_scalars() {
        assert_eq!(Cell::Null.to_json(), JsonValue::Null);
        assert_eq!(Cell::Bool(true).to_json(), json!(true));
        assert_eq!(Cell::Int64(7).to_json(), json!(7));
        assert_eq!(Cell::text("x").to_json(), json!("x"));
        assert_eq!(Cell::Decimal("1.50".into()).to_json(), json!("1.50"));
    }

    #[test]
    fn test_cell_to_json_non_finite_is_null() {
        assert_eq!(Cell::Double(f64::NAN).to_json(), JsonValue::Null);
        assert_eq!(Cell::Double(f64::INFINITY).to_json(), JsonValue::Null);
        assert_eq!(Cell::Double(1.5).to_json(), json!(1.5));
    }

    #[test]
    fn test_cell_to_json_bytes_and_time() {
        assert_eq!(Cell::Bytes(b"hi".to_vec()).to_json(), json!("aGk="));
        let dt = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            Cell::Timestamp(dt).to_json(),
            json!("2024-01-02T03:04:05.000000Z")
        );
    }

    #[test]
    fn test_array_to_json() {
        let cell = Cell::Array {
            element_type: Some("INTEGER".into()),
            elements: vec![Cell::Int32(1), Cell::Null],
        };
        assert_eq!(cell.to_json(), json!([1, null]));
    }

    #[test]
    fn test_row_fanout_detection() {
        let row = Row::new(vec![
            RowCell::Value(Cell::text("a")),
            RowCell::Fanout(vec![Cell::Int32(1), Cell::Int32(2)]),
        ]);
        assert!(row.has_fanout());
        assert_eq!(row.get(1).and_then(RowCell::fanout_len), Some(2));
        assert_eq!(row.get(0).and_then(RowCell::as_value), Some(&Cell::text("a")));
    }
}
