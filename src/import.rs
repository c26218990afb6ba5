//! One-shot full import from MongoDB.
//!
//! Every database on the server is matched against the mapping by name or
//! alias. Each mapped collection is streamed in batches; every batch is
//! copied into the collection's table and into the tables of its relations.

use crate::ImportOpts;
use docsql_sync_postgresql::PostgreSQLAdapter;
use mongodb::{bson::doc, bson::Document, options::ClientOptions, Client as MongoClient};
use std::time::Duration;
use sync_core::{transform_with, unfold, SchemaMap};

/// Connect to MongoDB with the same timeouts for every command.
pub async fn connect_mongo(uri: &str) -> anyhow::Result<MongoClient> {
    tracing::debug!("Parsing MongoDB connection options from URI: {}", uri);
    let mut options = ClientOptions::parse(uri).await?;
    options.connect_timeout = Some(Duration::from_secs(10));
    options.server_selection_timeout = Some(Duration::from_secs(10));
    Ok(MongoClient::with_options(options)?)
}

/// Namespace of a collection plus the namespaces of all nested relations.
pub fn namespaces_for(map: &SchemaMap, ns: &str) -> anyhow::Result<Vec<String>> {
    let mut namespaces = vec![ns.to_string()];
    let mut next = 0;
    while next < namespaces.len() {
        let related = map.all_related_ns(&namespaces[next])?;
        namespaces.extend(related);
        next += 1;
    }
    Ok(namespaces)
}

/// Import every mapped collection. Returns the number of documents read.
pub async fn run_import(
    mongo: &MongoClient,
    adapter: &PostgreSQLAdapter,
    opts: &ImportOpts,
) -> anyhow::Result<usize> {
    tracing::info!("Starting MongoDB import");

    if opts.dry_run {
        tracing::info!("Dry-run mode: tables are left untouched");
    } else {
        adapter.create_schema(opts.drop).await?;
    }

    let database_names = mongo.list_database_names().await?;
    tracing::debug!("Databases: {:?}", database_names);

    let mut total_imported = 0;
    for db_name in database_names {
        let Some(db_schema) = adapter.schema().find_db(&db_name) else {
            tracing::debug!("Skipping unmapped database: {}", db_name);
            continue;
        };
        let collection_names: Vec<String> = db_schema
            .collections()
            .iter()
            .map(|c| c.name.clone())
            .collect();

        let mongo_db = mongo.database(&db_name);
        for collection_name in collection_names {
            let ns = format!("{db_name}.{collection_name}");
            let namespaces = namespaces_for(adapter.schema(), &ns)?;
            let collection = mongo_db.collection::<Document>(&collection_name);

            let total_docs = collection.count_documents(doc! {}).await?;
            tracing::info!("Collection '{}' contains {} documents", ns, total_docs);
            if total_docs == 0 {
                continue;
            }

            let mut cursor = collection.find(doc! {}).await?;
            let mut batch: Vec<Document> = Vec::with_capacity(opts.batch_size);
            let mut processed = 0;

            while cursor.advance().await? {
                let document: Document = cursor.current().try_into()?;
                batch.push(document);

                if batch.len() >= opts.batch_size {
                    write_batch(adapter, &namespaces, &batch, opts.dry_run).await?;
                    processed += batch.len();
                    tracing::info!("Processed {}/{} documents from '{}'", processed, total_docs, ns);
                    batch.clear();
                }
            }

            if !batch.is_empty() {
                write_batch(adapter, &namespaces, &batch, opts.dry_run).await?;
                processed += batch.len();
            }

            tracing::info!("Completed import of '{}': {} documents", ns, processed);
            total_imported += processed;
        }
    }

    tracing::info!("MongoDB import completed: {} documents", total_imported);
    Ok(total_imported)
}

async fn write_batch(
    adapter: &PostgreSQLAdapter,
    namespaces: &[String],
    batch: &[Document],
    dry_run: bool,
) -> anyhow::Result<()> {
    for ns in namespaces {
        if dry_run {
            let schema = adapter.schema().resolve_strict(ns)?;
            let rows: usize = batch
                .iter()
                .map(|document| unfold(transform_with(schema, document)).len())
                .sum();
            tracing::debug!("Dry-run mode: skipping {} rows for {}", rows, ns);
        } else {
            adapter.copy_data(ns, batch).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAP: &str = r#"
blog:
  meta:
    alias: "^blog_\\d+$"
  posts:
    meta:
      table: posts
    columns:
      - _id: TEXT
      - title: TEXT
    related:
      comments:
        - post_id:
          source: _id
          type: TEXT
        - id:
          source: comments[].id
          type: TEXT
          primary_key: true
"#;

    #[test]
    fn test_namespaces_for_includes_relations() {
        let map = SchemaMap::from_yaml(MAP).unwrap();
        assert_eq!(
            namespaces_for(&map, "blog.posts").unwrap(),
            vec!["blog.posts", "blog.posts.related.comments"]
        );
    }

    #[test]
    fn test_namespaces_for_alias() {
        let map = SchemaMap::from_yaml(MAP).unwrap();
        assert_eq!(
            namespaces_for(&map, "blog_7.posts").unwrap(),
            vec!["blog_7.posts", "blog_7.posts.related.comments"]
        );
    }

    #[test]
    fn test_namespaces_for_unmapped() {
        let map = SchemaMap::from_yaml(MAP).unwrap();
        assert!(namespaces_for(&map, "shop.orders").is_err());
    }
}
