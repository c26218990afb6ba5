//! PostgreSQL encodings for sync-core rows.
//!
//! This crate renders compiled schemas and transformed cells into the text
//! PostgreSQL consumes.
//!
//! # Modules
//!
//! - [`ddl`] - CREATE/DROP/COPY/INSERT/DELETE statements from a `CollectionSchema`
//! - [`copy`] - `COPY ... FROM STDIN` text-format field encoding
//! - [`literal`] - text forms, array literals and typed parameter placeholders
//!
//! # Example
//!
//! ```
//! use postgresql_types::{encode_row, PostgreSQLDdl, ToDdl};
//! use sync_core::{Cell, SchemaMap};
//!
//! let map = SchemaMap::from_yaml(r#"
//! db:
//!   users:
//!     meta:
//!       table: users
//!     columns:
//!       - _id: TEXT
//!       - age: INTEGER
//! "#).unwrap();
//! let schema = map.resolve("db.users").unwrap();
//!
//! let statements = PostgreSQLDdl.to_create_table(schema, false);
//! assert!(statements[0].starts_with("CREATE TABLE IF NOT EXISTS \"users\""));
//!
//! let line = encode_row(&[Cell::text("u1"), Cell::Null]);
//! assert_eq!(line, "u1\t\\N\n");
//! ```

pub mod copy;
pub mod ddl;
pub mod literal;

pub use copy::{encode_field, encode_row, escape_copy, COPY_NULL};
pub use ddl::{quote_ident, Binding, PostgreSQLDdl, Statement, ToDdl};
pub use literal::{array_literal, placeholder, text_form};
