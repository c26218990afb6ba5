//! Offline transformation of JSON documents into COPY lines.
//!
//! Input is one JSON document per line. MongoDB extended JSON
//! (`{"$oid": ...}`, `{"$date": ...}`) is understood. Output lines are in
//! the text format `COPY ... FROM STDIN` expects for the namespace's table.

use anyhow::Context;
use bson::Document;
use postgresql_types::{encode_row, PostgreSQLDdl};
use std::io::{BufRead, Write};
use sync_core::{transform_related, SchemaMap};

/// Transform every document read from `input` and write COPY lines to
/// `output`. Returns the number of rows written.
pub fn transform_lines<R: BufRead, W: Write>(
    map: &SchemaMap,
    ns: &str,
    input: R,
    mut output: W,
) -> anyhow::Result<usize> {
    let schema = map.resolve_strict(ns)?;
    tracing::debug!(
        "{}",
        PostgreSQLDdl.to_copy(&schema.table, &schema.copy_columns())
    );

    let mut rows = 0;
    for (index, line) in input.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let document: Document = serde_json::from_str(&line)
            .with_context(|| format!("Invalid JSON document on line {}", index + 1))?;

        for row in transform_related(map, ns, &document)? {
            output.write_all(encode_row(&row).as_bytes())?;
            rows += 1;
        }
    }
    output.flush()?;

    tracing::info!("Wrote {} rows for {}", rows, ns);
    Ok(rows)
}
