//! Single-row upsert and delete.

use crate::error::SqlError;
use postgresql_types::{Binding, PostgreSQLDdl, Statement};
use sync_core::Cell;
use tokio_postgres::types::ToSql;
use tokio_postgres::Client;
use tracing::debug;

/// Insert a row, or update its non-key columns when a row with the same
/// `conflict_keys` already exists.
///
/// `columns` pairs each column name with its declared SQL type. Only the
/// supplied columns are written. Deferred `now()` cells are skipped so an
/// existing row keeps its stored value and a new row gets the column default.
pub async fn upsert(
    client: &Client,
    table: &str,
    conflict_keys: &[&str],
    columns: &[(&str, &str)],
    values: &[Cell],
) -> Result<u64, SqlError> {
    if columns.len() != values.len() {
        return Err(SqlError::Row(format!(
            "{} columns but {} values for table {}",
            columns.len(),
            values.len(),
            table
        )));
    }
    if let Some(missing) = conflict_keys
        .iter()
        .find(|k| !columns.iter().any(|&(name, _)| name == **k))
    {
        return Err(SqlError::Row(format!(
            "conflict key '{missing}' is not among the supplied columns for table {table}"
        )));
    }

    let bindings: Vec<Binding<'_>> = columns
        .iter()
        .zip(values)
        .map(|(&(column, sql_type), value)| Binding {
            column,
            sql_type,
            value,
        })
        .collect();
    let statement = PostgreSQLDdl.to_upsert(table, &bindings, conflict_keys);
    debug!("Upsert: {}", statement.sql);
    execute(client, &statement).await
}

/// Delete the rows whose key columns equal the given values.
pub async fn delete(client: &Client, table: &str, keys: &[Binding<'_>]) -> Result<u64, SqlError> {
    if keys.is_empty() {
        return Err(SqlError::Row(format!(
            "refusing to delete from {table} without key columns"
        )));
    }

    let statement = PostgreSQLDdl.to_delete(table, keys);
    debug!("Delete: {}", statement.sql);
    execute(client, &statement).await
}

async fn execute(client: &Client, statement: &Statement) -> Result<u64, SqlError> {
    let params: Vec<&(dyn ToSql + Sync)> = statement
        .params
        .iter()
        .map(|p| p as &(dyn ToSql + Sync))
        .collect();
    Ok(client.execute(statement.sql.as_str(), &params).await?)
}
