//! Expansion of fan-out rows into flat rows.
//!
//! Shorter fan-out sequences are cycled against the longest one, so a single
//! parent key pairs with every child and two lists of unequal length repeat
//! the shorter one from its start.

use crate::values::{Cell, FlatRow, Row, RowCell};

/// Expand a transformed row into flat rows.
///
/// A row without fan-out cells yields itself. Otherwise the row yields one
/// flat row per element of its longest fan-out cell. A depth of zero, where
/// every fan-out cell is empty, yields no rows rather than the unchanged row:
/// a parent whose array is missing or empty has no children to write.
pub fn unfold(row: Row) -> Vec<FlatRow> {
    let depth = row.cells.iter().filter_map(RowCell::fanout_len).max();

    let Some(depth) = depth else {
        return vec![row
            .cells
            .into_iter()
            .map(|cell| match cell {
                RowCell::Value(value) => value,
                RowCell::Fanout(_) => Cell::Null,
            })
            .collect()];
    };

    (0..depth)
        .map(|i| {
            row.cells
                .iter()
                .map(|cell| match cell {
                    RowCell::Value(value) => value.clone(),
                    RowCell::Fanout(items) if items.is_empty() => Cell::Null,
                    RowCell::Fanout(items) => items[i % items.len()].clone(),
                })
                .collect()
        })
        .collect()
}
