//! PostgreSQL destination for docsql-sync.
//!
//! Rows produced by `sync-core` are written either in bulk through
//! `COPY ... FROM STDIN` or one at a time through `INSERT ... ON CONFLICT`.
//! [`PostgreSQLAdapter`] ties both paths to a compiled mapping so callers can
//! work in terms of namespaces and documents.

mod adapter;
mod connect;
mod copy;
mod error;
mod schema;
mod upsert;

pub use adapter::PostgreSQLAdapter;
pub use connect::connect;
pub use copy::bulk_load;
pub use error::SqlError;
pub use schema::{create_schema, create_table};
pub use upsert::{delete, upsert};
pub use postgresql_types::Binding;
