//! Error types for the PostgreSQL adapter.

use sync_core::SchemaError;
use thiserror::Error;

/// Errors that can occur while writing rows to PostgreSQL.
#[derive(Error, Debug)]
pub enum SqlError {
    /// PostgreSQL connection or query error.
    #[error("PostgreSQL error: {0}")]
    PostgreSQL(#[from] tokio_postgres::Error),

    /// A COPY batch was rejected; nothing from the batch was applied.
    #[error("Bulk load into '{table}' failed with status {status}: {message}")]
    BulkLoad {
        table: String,
        status: String,
        message: String,
    },

    /// Mapping lookup failed.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// A row does not line up with its column list.
    #[error("Row error: {0}")]
    Row(String),
}

impl SqlError {
    /// Build a bulk load error from the store's reply.
    pub fn bulk_load(table: &str, error: tokio_postgres::Error) -> Self {
        let status = error
            .code()
            .map(|code| code.code().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let message = error
            .as_db_error()
            .map(|db| db.message().to_string())
            .unwrap_or_else(|| error.to_string());
        SqlError::BulkLoad {
            table: table.to_string(),
            status,
            message,
        }
    }
}
