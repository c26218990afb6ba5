//! End-to-end import from MongoDB into PostgreSQL.
//!
//! Runs only when both `DOCSQL_TEST_MONGO` and `DOCSQL_TEST_SQL` are set.

use docsql_sync::{import, ImportOpts};
use docsql_sync_postgresql::PostgreSQLAdapter;
use mongodb::bson::{doc, Document};
use std::sync::Arc;
use sync_core::SchemaMap;

const MAP: &str = r#"
docsql_e2e_import:
  posts:
    meta:
      table: e2e_posts
      extra_props: JSONB
    columns:
      - _id: TEXT
      - title: TEXT
      - author:
        source: author.name
        type: TEXT
    related:
      tags:
        meta:
          table: e2e_post_tags
        columns:
          - post_id:
            source: _id
            type: TEXT
          - tag:
            source: tags[]
            type: TEXT
            primary_key: true
"#;

fn connection_strings() -> Option<(String, String)> {
    let mongo = std::env::var("DOCSQL_TEST_MONGO").ok()?;
    let sql = std::env::var("DOCSQL_TEST_SQL").ok()?;
    Some((mongo, sql))
}

#[tokio::test]
async fn test_mongodb_import_e2e() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("docsql_sync=debug,docsql_sync_postgresql=debug")
        .try_init()
        .ok();

    let Some((mongo_uri, sql)) = connection_strings() else {
        return Ok(());
    };

    let mongo = import::connect_mongo(&mongo_uri).await?;
    let db = mongo.database("docsql_e2e_import");
    db.drop().await?;

    let posts = db.collection::<Document>("posts");
    posts
        .insert_many(vec![
            doc! { "_id": "p1", "title": "First", "author": { "name": "ann" }, "tags": ["a", "b"] },
            doc! { "_id": "p2", "title": "Second", "draft": true },
            doc! { "_id": "p3", "title": "Third", "tags": ["c"] },
        ])
        .await?;

    let map = Arc::new(SchemaMap::from_yaml(MAP)?);
    let adapter = PostgreSQLAdapter::new(&sql, map).await?;
    let opts = ImportOpts {
        batch_size: 2,
        drop: true,
        dry_run: false,
    };

    let imported = import::run_import(&mongo, &adapter, &opts).await?;
    assert_eq!(imported, 3);
    assert_eq!(adapter.row_count("e2e_posts").await?, 3);

    let client = adapter.client();
    let client = client.lock().await;
    let row = client
        .query_one(
            "SELECT author, _extra_props FROM e2e_posts WHERE _id = 'p2'",
            &[],
        )
        .await?;
    let author: Option<String> = row.get(0);
    let extras: serde_json::Value = row.get(1);
    assert_eq!(author, None);
    assert_eq!(extras, serde_json::json!({ "draft": true }));

    let tags = client
        .query("SELECT post_id, tag FROM e2e_post_tags ORDER BY tag", &[])
        .await?;
    let tags: Vec<(String, String)> = tags.iter().map(|r| (r.get(0), r.get(1))).collect();
    assert_eq!(
        tags,
        vec![
            ("p1".to_string(), "a".to_string()),
            ("p1".to_string(), "b".to_string()),
            ("p3".to_string(), "c".to_string()),
        ]
    );
    drop(client);

    db.drop().await?;
    Ok(())
}
