//! docsql-sync library
//!
//! Replicates MongoDB collections into PostgreSQL tables according to a YAML
//! mapping.
//!
//! # Features
//!
//! - Declarative mapping: dotted paths, literals, `$timestamp` and `$exists`
//!   pseudo-sources, leftover capture into `_extra_props`
//! - One-to-many relations: array fields fan out into child tables
//! - Bulk import through `COPY ... FROM STDIN`, single documents through upsert
//!
//! # CLI Usage
//!
//! ```bash
//! # Create the mapped tables
//! docsql-sync create-schema --collections collections.yml --sql "host=localhost user=postgres"
//!
//! # Full import from MongoDB
//! docsql-sync import --collections collections.yml --mongo mongodb://localhost:27017 --drop
//!
//! # Print COPY lines for JSON documents without touching any database
//! docsql-sync transform --collections collections.yml --ns blog.posts < posts.jsonl
//! ```

use clap::Parser;
use std::path::PathBuf;

pub mod import;
pub mod offline;

/// Mapping file options
#[derive(Parser, Clone, Debug)]
pub struct MappingOpts {
    /// YAML mapping of MongoDB collections to PostgreSQL tables
    #[arg(long, default_value = "collections.yml", env = "DOCSQL_COLLECTIONS")]
    pub collections: PathBuf,
}

/// PostgreSQL connection options
#[derive(Parser, Clone, Debug)]
pub struct SqlOpts {
    /// PostgreSQL connection string
    #[arg(
        long,
        default_value = "host=localhost user=postgres dbname=postgres",
        env = "DOCSQL_SQL"
    )]
    pub sql: String,
}

/// MongoDB connection options
#[derive(Parser, Clone, Debug)]
pub struct MongoOpts {
    /// MongoDB connection URI
    #[arg(long, default_value = "mongodb://localhost:27017", env = "DOCSQL_MONGO")]
    pub mongo: String,
}

/// Import options (non-connection related)
#[derive(Parser, Clone, Debug)]
pub struct ImportOpts {
    /// Number of documents per COPY batch
    #[arg(long, default_value = "1000")]
    pub batch_size: usize,

    /// Drop and recreate the mapped tables before importing
    #[arg(long)]
    pub drop: bool,

    /// Dry run mode - transform documents but don't write them
    #[arg(long)]
    pub dry_run: bool,
}
