//! Namespace-level writes against a shared PostgreSQL client.

use crate::connect::connect;
use crate::copy;
use crate::error::SqlError;
use crate::schema;
use crate::upsert;
use bson::Document;
use postgresql_types::Binding;
use std::sync::Arc;
use sync_core::{transform_with, unfold, Cell, CollectionSchema, FlatRow, SchemaMap};
use tokio::sync::Mutex;
use tokio_postgres::Client;
use tracing::{debug, info};

/// Writes transformed documents for mapped namespaces.
///
/// Each call holds the client lock for its whole duration, so calls made
/// through one adapter never interleave on the connection.
pub struct PostgreSQLAdapter {
    client: Arc<Mutex<Client>>,
    schema: Arc<SchemaMap>,
}

impl PostgreSQLAdapter {
    /// Connect to PostgreSQL and create an adapter for `schema`.
    pub async fn new(connection_string: &str, schema: Arc<SchemaMap>) -> Result<Self, SqlError> {
        let client = connect(connection_string).await?;
        Ok(Self::with_client(Arc::new(Mutex::new(client)), schema))
    }

    /// Create an adapter over an existing client.
    pub fn with_client(client: Arc<Mutex<Client>>, schema: Arc<SchemaMap>) -> Self {
        Self { client, schema }
    }

    /// Get a reference to the mapping.
    pub fn schema(&self) -> &SchemaMap {
        &self.schema
    }

    /// Get the shared client.
    pub fn client(&self) -> Arc<Mutex<Client>> {
        Arc::clone(&self.client)
    }

    /// Create the tables of every mapped collection and relation.
    pub async fn create_schema(&self, clobber: bool) -> Result<(), SqlError> {
        let client = self.client.lock().await;
        schema::create_schema(&client, &self.schema, clobber).await
    }

    /// Transform `documents` for `ns` and bulk load the resulting rows.
    ///
    /// Relation namespaces load one row per child.
    pub async fn copy_data(&self, ns: &str, documents: &[Document]) -> Result<u64, SqlError> {
        let schema = self.schema.resolve_strict(ns)?;
        let rows: Vec<FlatRow> = documents
            .iter()
            .flat_map(|document| unfold(transform_with(schema, document)))
            .collect();
        let columns = schema.copy_columns();

        let mut client = self.client.lock().await;
        let copied = copy::bulk_load(&mut client, &schema.table, &columns, &rows).await?;
        info!("Copied {} rows for {} into {}", copied, ns, schema.table);
        Ok(copied)
    }

    /// Upsert the row (or child rows) produced by `document` for `ns`.
    pub async fn upsert_ns(&self, ns: &str, document: &Document) -> Result<u64, SqlError> {
        let schema = self.schema.resolve_strict(ns)?;
        let columns = typed_columns(schema);
        let keys = key_columns(schema);
        let rows = unfold(transform_with(schema, document));

        let client = self.client.lock().await;
        let mut affected = 0;
        for row in &rows {
            affected += upsert::upsert(&client, &schema.table, &keys, &columns, row).await?;
        }
        debug!("Upserted {} rows for {}", affected, ns);
        Ok(affected)
    }

    /// Delete the row (or child rows) keyed by `document` for `ns`.
    pub async fn delete_ns(&self, ns: &str, document: &Document) -> Result<u64, SqlError> {
        let schema = self.schema.resolve_strict(ns)?;
        let columns = typed_columns(schema);
        let keys = key_columns(schema);
        let rows = unfold(transform_with(schema, document));

        let client = self.client.lock().await;
        let mut affected = 0;
        for row in &rows {
            let key_values = key_bindings(&columns, &keys, row, ns)?;
            affected += upsert::delete(&client, &schema.table, &key_values).await?;
        }
        debug!("Deleted {} rows for {}", affected, ns);
        Ok(affected)
    }

    /// Bulk load already transformed rows.
    pub async fn bulk_load(
        &self,
        table: &str,
        columns: &[&str],
        rows: &[FlatRow],
    ) -> Result<u64, SqlError> {
        let mut client = self.client.lock().await;
        copy::bulk_load(&mut client, table, columns, rows).await
    }

    /// Upsert one row of already transformed values. `columns` pairs each
    /// column name with its declared SQL type.
    pub async fn upsert(
        &self,
        table: &str,
        conflict_keys: &[&str],
        columns: &[(&str, &str)],
        values: &[Cell],
    ) -> Result<u64, SqlError> {
        let client = self.client.lock().await;
        upsert::upsert(&client, table, conflict_keys, columns, values).await
    }

    /// Get the row count for a table.
    pub async fn row_count(&self, table: &str) -> Result<u64, SqlError> {
        let client = self.client.lock().await;
        let sql = format!("SELECT COUNT(*) FROM {}", postgresql_types::quote_ident(table));
        let row = client.query_one(sql.as_str(), &[]).await?;
        let count: i64 = row.get(0);
        Ok(count as u64)
    }
}

fn key_columns(schema: &CollectionSchema) -> Vec<&str> {
    schema.primary_key().iter().map(String::as_str).collect()
}

fn typed_columns(schema: &CollectionSchema) -> Vec<(&str, &str)> {
    schema
        .all_columns()
        .into_iter()
        .zip(schema.column_types())
        .collect()
}

fn key_bindings<'a>(
    columns: &[(&'a str, &'a str)],
    keys: &[&'a str],
    row: &'a [Cell],
    ns: &str,
) -> Result<Vec<Binding<'a>>, SqlError> {
    keys.iter()
        .map(|key| {
            columns
                .iter()
                .position(|(name, _)| name == key)
                .and_then(|i| Some((columns[i].1, row.get(i)?)))
                .map(|(sql_type, value)| Binding {
                    column: *key,
                    sql_type,
                    value,
                })
                .ok_or_else(|| SqlError::Row(format!("key column '{key}' missing from row for {ns}")))
        })
        .collect()
}
