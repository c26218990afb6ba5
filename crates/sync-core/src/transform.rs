//! Document to row transformation.
//!
//! [`transform_with`] walks a schema's columns in order against a private
//! copy of the document. Sourced columns consume their paths from that copy,
//! so whatever survives the walk is the leftover captured in
//! `_extra_props`. Pseudo-sources and `$exists` probes never touch the copy;
//! probes read the untouched original.

use crate::coerce::{coerce_leaves, coerce_primitive, is_dbref, sanitize_for_leftover};
use crate::path::{self, extract_and_consume, Extracted};
use crate::schema::{CollectionSchema, ColumnKind, ColumnSpec, SchemaError, SchemaMap, Source};
use crate::unfold::unfold;
use crate::values::{Cell, FlatRow, Row, RowCell};
use bson::{Bson, Document};
use serde_json::Value as JsonValue;
use tracing::trace;

/// Transform a document for a namespace that must be mapped.
pub fn transform(map: &SchemaMap, ns: &str, document: &Document) -> Result<Row, SchemaError> {
    let schema = map.resolve_strict(ns)?;
    Ok(transform_with(schema, document))
}

/// Transform a document for a relation namespace and expand it into child rows.
pub fn transform_related(
    map: &SchemaMap,
    ns: &str,
    document: &Document,
) -> Result<Vec<FlatRow>, SchemaError> {
    Ok(unfold(transform(map, ns, document)?))
}

/// Transform a document with an already resolved schema.
pub fn transform_with(schema: &CollectionSchema, document: &Document) -> Row {
    let mut working = document.clone();
    let mut cells = Vec::with_capacity(schema.columns.len() + 1);

    for column in &schema.columns {
        let cell = match &column.kind {
            ColumnKind::Literal(value) => RowCell::Value(value.clone()),
            ColumnKind::Sourced(Source::Now) => RowCell::Value(Cell::Now),
            ColumnKind::Sourced(Source::Exists(probe)) => {
                RowCell::Value(Cell::Bool(path::exists(document, probe)))
            }
            ColumnKind::Sourced(Source::Path(doc_path)) => {
                let (extracted, remaining) = extract_and_consume(working, doc_path);
                working = remaining;
                match extracted {
                    Extracted::Absent if doc_path.has_fanout() => RowCell::Fanout(Vec::new()),
                    Extracted::Absent => RowCell::Value(Cell::Null),
                    Extracted::Fanout(items) => RowCell::Fanout(
                        items
                            .into_iter()
                            .map(|item| shape_fanout_element(column, item))
                            .collect(),
                    ),
                    Extracted::Value(value) => RowCell::Value(shape_value(column, value)),
                }
            }
        };
        cells.push(cell);
    }

    if schema.extra_props.is_some() {
        let leftover = sanitize_for_leftover(Bson::Document(working));
        cells.push(RowCell::Value(Cell::Json(leftover)));
    }

    trace!("Transformed document into {} cells for {}", cells.len(), schema.table);
    Row::new(cells)
}

fn shape_value(column: &ColumnSpec, value: Bson) -> Cell {
    match value {
        Bson::Document(doc) if column.array_type.is_none() && !is_dbref(&doc) => {
            Cell::Json(coerce_leaves(doc))
        }
        Bson::Array(items) => typed_or_json_array(column, items),
        other => coerce_primitive(other, Some(&column.sql_type)),
    }
}

/// Elements of a fan-out sequence are shaped one by one and stay tagged.
fn shape_fanout_element(column: &ColumnSpec, item: Extracted) -> Cell {
    match item {
        Extracted::Absent => Cell::Null,
        Extracted::Value(Bson::Document(doc)) if !is_dbref(&doc) => Cell::Json(coerce_leaves(doc)),
        Extracted::Value(Bson::Array(items)) => Cell::Array {
            element_type: column.array_type.clone(),
            elements: coerce_elements(column, items),
        },
        Extracted::Value(other) => coerce_primitive(other, Some(&column.sql_type)),
        Extracted::Fanout(nested) => Cell::Json(JsonValue::Array(
            nested
                .into_iter()
                .map(|inner| shape_fanout_element(column, inner).to_json())
                .collect(),
        )),
    }
}

fn typed_or_json_array(column: &ColumnSpec, items: Vec<Bson>) -> Cell {
    let elements = coerce_elements(column, items);
    match &column.array_type {
        Some(element_type) => Cell::Array {
            element_type: Some(element_type.clone()),
            elements,
        },
        None => Cell::Json(JsonValue::Array(elements.iter().map(Cell::to_json).collect())),
    }
}

fn coerce_elements(column: &ColumnSpec, items: Vec<Bson>) -> Vec<Cell> {
    items
        .into_iter()
        .map(|item| coerce_primitive(item, column.array_type.as_deref()))
        .collect()
}
