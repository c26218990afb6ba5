//! Document-to-row mapping engine for docsql-sync.
//!
//! This crate turns schema-less documents into rows of a fixed relational
//! schema:
//!
//! - [`SchemaMap`] - Compiled YAML mapping (databases, collections, relations)
//! - [`namespace`] - Resolution of `db.collection[.related.relation]` names
//! - [`path`] - Destructive dotted-path extraction
//! - [`coerce`] - BSON to SQL value coercion
//! - [`transform`] - Document to [`Row`] transformation
//! - [`unfold`] - Fan-out expansion into [`FlatRow`]s
//!
//! # Architecture
//!
//! ```text
//! sync-core (this crate)
//!    │
//!    ├─── postgresql-types        (DDL, COPY and literal encoding of cells)
//!    └─── docsql-sync-postgresql  (bulk load and upsert over tokio-postgres)
//! ```
//!
//! # Example
//!
//! ```rust
//! use bson::doc;
//! use sync_core::{transform, Cell, RowCell, SchemaMap};
//!
//! let map = SchemaMap::from_yaml(r#"
//! blog:
//!   posts:
//!     meta:
//!       table: posts
//!     columns:
//!       - _id: TEXT
//!       - title: TEXT
//! "#).unwrap();
//!
//! let row = transform(&map, "blog.posts", &doc! {"_id": "p1", "title": "Hi"}).unwrap();
//! assert_eq!(row.get(1), Some(&RowCell::Value(Cell::text("Hi"))));
//! ```

pub mod coerce;
pub mod namespace;
pub mod path;
pub mod schema;
pub mod transform;
pub mod unfold;
pub mod values;

// Re-exports for convenience
pub use namespace::Namespace;
pub use path::{DocPath, Extracted};
pub use schema::{
    CollectionSchema, ColumnKind, ColumnSpec, DbSchema, ExtraProps, SchemaError, SchemaMap, Source,
    EXTRA_PROPS_COLUMN, TIMESTAMP_SOURCE,
};
pub use transform::{transform, transform_related, transform_with};
pub use unfold::unfold;
pub use values::{Cell, FlatRow, Row, RowCell};
