//! Command-line interface for docsql-sync
//!
//! # Usage Examples
//!
//! ```bash
//! # Print the DDL for every mapped table
//! docsql-sync ddl --collections collections.yml
//!
//! # Create the mapped tables, dropping existing ones
//! docsql-sync create-schema --collections collections.yml \
//!   --sql "host=localhost user=postgres" --clobber
//!
//! # Full import from MongoDB
//! docsql-sync import --collections collections.yml \
//!   --mongo mongodb://localhost:27017 \
//!   --sql "host=localhost user=postgres" --batch-size 500
//!
//! # COPY lines for extended JSON documents
//! docsql-sync transform --collections collections.yml --ns blog.posts --input posts.jsonl
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use docsql_sync::{import, offline, ImportOpts, MappingOpts, MongoOpts, SqlOpts};
use docsql_sync_postgresql::PostgreSQLAdapter;
use postgresql_types::{PostgreSQLDdl, ToDdl};
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use sync_core::{CollectionSchema, SchemaMap};

#[derive(Parser)]
#[command(name = "docsql-sync")]
#[command(about = "A tool for replicating MongoDB collections into PostgreSQL tables")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the CREATE TABLE statements for the mapping
    Ddl {
        #[command(flatten)]
        mapping: MappingOpts,

        /// Drop existing tables first
        #[arg(long)]
        clobber: bool,
    },

    /// Create the tables of every mapped collection and relation
    CreateSchema {
        #[command(flatten)]
        mapping: MappingOpts,

        #[command(flatten)]
        sql: SqlOpts,

        /// Drop existing tables first
        #[arg(long)]
        clobber: bool,
    },

    /// Copy every mapped MongoDB collection into PostgreSQL
    Import {
        #[command(flatten)]
        mapping: MappingOpts,

        #[command(flatten)]
        mongo: MongoOpts,

        #[command(flatten)]
        sql: SqlOpts,

        #[command(flatten)]
        import: ImportOpts,
    },

    /// Transform JSON documents into COPY lines on stdout
    Transform {
        #[command(flatten)]
        mapping: MappingOpts,

        /// Namespace of the documents (`db.collection` or `db.collection.related.name`)
        #[arg(long)]
        ns: String,

        /// Input file with one JSON document per line (default: stdin)
        #[arg(long, value_name = "PATH")]
        input: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ddl { mapping, clobber } => {
            let map = load_mapping(&mapping)?;
            for db in map.databases() {
                for collection in db.collections() {
                    print_ddl(collection, clobber);
                }
            }
        }
        Commands::CreateSchema {
            mapping,
            sql,
            clobber,
        } => {
            let map = Arc::new(load_mapping(&mapping)?);
            let adapter = PostgreSQLAdapter::new(&sql.sql, map)
                .await
                .context("Failed to connect to PostgreSQL")?;
            adapter.create_schema(clobber).await?;
            tracing::info!("Schema created");
        }
        Commands::Import {
            mapping,
            mongo,
            sql,
            import,
        } => {
            let map = Arc::new(load_mapping(&mapping)?);
            let adapter = PostgreSQLAdapter::new(&sql.sql, map)
                .await
                .context("Failed to connect to PostgreSQL")?;
            let mongo_client = import::connect_mongo(&mongo.mongo)
                .await
                .with_context(|| format!("Failed to connect to MongoDB at {}", mongo.mongo))?;
            import::run_import(&mongo_client, &adapter, &import).await?;
        }
        Commands::Transform { mapping, ns, input } => {
            let map = load_mapping(&mapping)?;
            let stdout = io::stdout().lock();
            match input {
                Some(path) => {
                    let file = std::fs::File::open(&path)
                        .with_context(|| format!("Failed to open {}", path.display()))?;
                    offline::transform_lines(&map, &ns, BufReader::new(file), stdout)?;
                }
                None => {
                    offline::transform_lines(&map, &ns, io::stdin().lock(), stdout)?;
                }
            }
        }
    }

    Ok(())
}

fn load_mapping(opts: &MappingOpts) -> anyhow::Result<SchemaMap> {
    let map = SchemaMap::from_file(&opts.collections).with_context(|| {
        format!(
            "Failed to load collection map from {}",
            opts.collections.display()
        )
    })?;
    tracing::info!(
        "Loaded collection map for databases: {:?}",
        map.database_names()
    );
    Ok(map)
}

fn print_ddl(schema: &CollectionSchema, clobber: bool) {
    for statement in PostgreSQLDdl.to_create_table(schema, clobber) {
        println!("{statement};");
    }
    for relation in &schema.relations {
        print_ddl(relation, clobber);
    }
}
