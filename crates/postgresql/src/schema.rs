//! Table creation from a compiled mapping.

use crate::error::SqlError;
use postgresql_types::{PostgreSQLDdl, ToDdl};
use sync_core::{CollectionSchema, SchemaMap};
use tokio_postgres::Client;
use tracing::{debug, info};

/// Create the table for a collection and, recursively, its relations.
pub async fn create_table(
    client: &Client,
    schema: &CollectionSchema,
    clobber: bool,
) -> Result<(), SqlError> {
    info!("Creating table: {}", schema.table);
    for statement in PostgreSQLDdl.to_create_table(schema, clobber) {
        debug!("DDL: {}", statement);
        client.execute(statement.as_str(), &[]).await?;
    }
    for relation in &schema.relations {
        Box::pin(create_table(client, relation, clobber)).await?;
    }
    Ok(())
}

/// Create tables for every collection in the mapping.
pub async fn create_schema(client: &Client, map: &SchemaMap, clobber: bool) -> Result<(), SqlError> {
    for db in map.databases() {
        for collection in db.collections() {
            create_table(client, collection, clobber).await?;
        }
    }
    Ok(())
}
