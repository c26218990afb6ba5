//! BSON value coercion into SQL-ready cells.
//!
//! Two entry points:
//!
//! - [`coerce_primitive`] turns a single extracted value into a [`Cell`],
//!   taking the column's declared SQL type into account for binary UUIDs.
//! - [`sanitize_for_leftover`] prepares the unclaimed remainder of a document
//!   for JSON serialization.

use crate::values::Cell;
use base64::Engine;
use bson::{Bson, Document};
use serde_json::{Map, Value as JsonValue};

/// Convert an extracted BSON value into a cell.
pub fn coerce_primitive(value: Bson, declared_type: Option<&str>) -> Cell {
    match value {
        Bson::ObjectId(oid) => Cell::Text(oid.to_hex()),
        Bson::Symbol(s) => Cell::Text(s),
        Bson::Binary(bin) => {
            if declared_type.is_some_and(is_uuid_type) {
                Cell::Text(hex::encode(&bin.bytes))
            } else {
                Cell::Bytes(bin.bytes)
            }
        }
        Bson::Document(doc) if is_dbref(&doc) => dbref_id(&doc),
        pointer @ Bson::DbPointer(_) => {
            let json = pointer.into_relaxed_extjson();
            match json.pointer("/$dbPointer/$id/$oid") {
                Some(JsonValue::String(oid)) => Cell::Text(oid.clone()),
                _ => Cell::Json(json),
            }
        }
        Bson::Null | Bson::Undefined => Cell::Null,
        Bson::Boolean(b) => Cell::Bool(b),
        Bson::Int32(i) => Cell::Int32(i),
        Bson::Int64(i) => Cell::Int64(i),
        Bson::Double(f) => Cell::Double(f),
        Bson::Decimal128(d) => Cell::Decimal(d.to_string()),
        Bson::String(s) => Cell::Text(s),
        Bson::DateTime(dt) => Cell::Timestamp(dt.to_chrono()),
        Bson::Timestamp(ts) => match chrono::DateTime::from_timestamp(i64::from(ts.time), 0) {
            Some(dt) => Cell::Timestamp(dt),
            None => Cell::Null,
        },
        other => Cell::Json(other.into_relaxed_extjson()),
    }
}

/// Coerce every top-level value of a mapping and return it as a JSON object.
pub fn coerce_leaves(doc: Document) -> JsonValue {
    let map: Map<String, JsonValue> = doc
        .into_iter()
        .map(|(k, v)| (k, coerce_primitive(v, None).to_json()))
        .collect();
    JsonValue::Object(map)
}

/// Prepare a value for leftover capture.
///
/// Binary blobs are base64-encoded and non-finite doubles become `null`;
/// everything else is rendered as relaxed extended JSON.
pub fn sanitize_for_leftover(value: Bson) -> JsonValue {
    match value {
        Bson::Document(doc) => JsonValue::Object(
            doc.into_iter()
                .map(|(k, v)| (k, sanitize_for_leftover(v)))
                .collect(),
        ),
        Bson::Array(items) => {
            JsonValue::Array(items.into_iter().map(sanitize_for_leftover).collect())
        }
        Bson::Binary(bin) => {
            JsonValue::String(base64::engine::general_purpose::STANDARD.encode(bin.bytes))
        }
        Bson::Double(f) => serde_json::Number::from_f64(f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        other => other.into_relaxed_extjson(),
    }
}

/// Whether a declared SQL type denotes a 128-bit UUID column.
pub fn is_uuid_type(sql_type: &str) -> bool {
    sql_type.trim().eq_ignore_ascii_case("uuid")
}

/// Whether a document is a DBRef (`{"$ref": ..., "$id": ...}`).
pub fn is_dbref(doc: &Document) -> bool {
    matches!(doc.get("$ref"), Some(Bson::String(_))) && doc.contains_key("$id")
}

fn dbref_id(doc: &Document) -> Cell {
    match doc.get("$id") {
        Some(Bson::ObjectId(oid)) => Cell::Text(oid.to_hex()),
        Some(Bson::String(s)) => Cell::Text(s.clone()),
        Some(other) => coerce_primitive(other.clone(), None),
        None => Cell::Null,
    }
}
