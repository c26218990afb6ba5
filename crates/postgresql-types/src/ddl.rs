//! PostgreSQL statement generation from compiled collection schemas.
//!
//! Column types are taken verbatim from the mapping. Columns fed by the
//! `$timestamp` pseudo-source default to `now()` so bulk loads can omit them.

use crate::literal::{placeholder, text_form};
use sync_core::{Cell, CollectionSchema, ColumnSpec, EXTRA_PROPS_COLUMN};

/// A cell bound to a column of a single-row statement.
#[derive(Debug, Clone, Copy)]
pub struct Binding<'a> {
    pub column: &'a str,
    /// Declared SQL type the text parameter is cast to
    pub sql_type: &'a str,
    pub value: &'a Cell,
}

/// SQL text plus its positional parameters in text form.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Option<String>>,
}

/// Trait for generating DDL from a compiled schema.
pub trait ToDdl {
    /// Column type clause for a column, including any default.
    fn to_ddl(&self, column: &ColumnSpec) -> String;

    /// Statements creating the table for `schema`.
    ///
    /// With `clobber` the table is dropped first; otherwise creation is a
    /// no-op when the table already exists.
    fn to_create_table(&self, schema: &CollectionSchema, clobber: bool) -> Vec<String>;
}

/// PostgreSQL DDL generator.
pub struct PostgreSQLDdl;

impl ToDdl for PostgreSQLDdl {
    fn to_ddl(&self, column: &ColumnSpec) -> String {
        if column.is_store_timestamp() {
            format!("{} DEFAULT now()", column.sql_type)
        } else {
            column.sql_type.clone()
        }
    }

    fn to_create_table(&self, schema: &CollectionSchema, clobber: bool) -> Vec<String> {
        let mut column_defs: Vec<String> = schema
            .columns
            .iter()
            .map(|column| format!("  {} {}", quote_ident(&column.name), self.to_ddl(column)))
            .collect();

        if let Some(extra_props) = schema.extra_props {
            column_defs.push(format!(
                "  {} {}",
                quote_ident(EXTRA_PROPS_COLUMN),
                extra_props.sql_type()
            ));
        }

        let keys: Vec<&str> = schema.primary_key().iter().map(String::as_str).collect();
        column_defs.push(format!("  PRIMARY KEY ({})", quote_idents(&keys)));

        let mut statements = Vec::with_capacity(2);
        let create = if clobber {
            statements.push(self.to_drop_table(&schema.table));
            "CREATE TABLE"
        } else {
            "CREATE TABLE IF NOT EXISTS"
        };
        statements.push(format!(
            "{create} {} (\n{}\n)",
            quote_ident(&schema.table),
            column_defs.join(",\n")
        ));
        statements
    }
}

impl PostgreSQLDdl {
    /// Generate a DROP TABLE statement.
    pub fn to_drop_table(&self, table_name: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", quote_ident(table_name))
    }

    /// Generate the COPY statement for a bulk load.
    pub fn to_copy(&self, table_name: &str, columns: &[&str]) -> String {
        format!(
            "COPY {} ({}) FROM STDIN",
            quote_ident(table_name),
            quote_idents(columns)
        )
    }

    /// Generate an INSERT that updates the non-key columns on a key conflict.
    ///
    /// Deferred `now()` cells are left out so the column default applies on
    /// insert and an update leaves the stored value alone. Values travel as
    /// text parameters; NULL cells bind as SQL NULL.
    pub fn to_upsert(
        &self,
        table_name: &str,
        bindings: &[Binding<'_>],
        conflict_keys: &[&str],
    ) -> Statement {
        let bound: Vec<&Binding<'_>> = bindings.iter().filter(|b| !b.value.is_deferred()).collect();
        let columns: Vec<&str> = bound.iter().map(|b| b.column).collect();
        let placeholders: Vec<String> = bound
            .iter()
            .enumerate()
            .map(|(i, b)| placeholder(i + 1, b.sql_type))
            .collect();

        let updates: Vec<String> = columns
            .iter()
            .filter(|column| !conflict_keys.contains(column))
            .map(|column| {
                let column = quote_ident(column);
                format!("{column} = EXCLUDED.{column}")
            })
            .collect();

        let action = if updates.is_empty() {
            "DO NOTHING".to_string()
        } else {
            format!("DO UPDATE SET {}", updates.join(", "))
        };

        Statement {
            sql: format!(
                "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) {}",
                quote_ident(table_name),
                quote_idents(&columns),
                placeholders.join(", "),
                quote_idents(conflict_keys),
                action
            ),
            params: bound.iter().map(|b| text_form(b.value)).collect(),
        }
    }

    /// Generate a DELETE matching every given key column.
    pub fn to_delete(&self, table_name: &str, keys: &[Binding<'_>]) -> Statement {
        let mut params = Vec::with_capacity(keys.len());
        let conditions: Vec<String> = keys
            .iter()
            .map(|key| match text_form(key.value) {
                None => format!("{} IS NULL", quote_ident(key.column)),
                Some(text) => {
                    params.push(Some(text));
                    format!(
                        "{} = {}",
                        quote_ident(key.column),
                        placeholder(params.len(), key.sql_type)
                    )
                }
            })
            .collect();
        Statement {
            sql: format!(
                "DELETE FROM {} WHERE {}",
                quote_ident(table_name),
                conditions.join(" AND ")
            ),
            params,
        }
    }
}

/// Quote an identifier, doubling embedded double quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_idents(names: &[&str]) -> String {
    names
        .iter()
        .map(|name| quote_ident(name))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_core::SchemaMap;

    const MAP: &str = r#"
db:
  collection:
    meta:
      table: sqltable
    columns:
      - _id: TEXT
      - var: INTEGER
      - arry: INTEGER ARRAY
  stamped:
    meta:
      table: stamped
      extra_props: JSONB
      composite_key: [a, b]
    columns:
      - a: TEXT
      - b: TEXT
      - synced_at:
        source: $timestamp
        type: TIMESTAMP
"#;

    fn map() -> SchemaMap {
        SchemaMap::from_yaml(MAP).unwrap()
    }

    #[test]
    fn test_create_table() {
        let map = map();
        let schema = map.resolve("db.collection").unwrap();
        let statements = PostgreSQLDdl.to_create_table(schema, false);
        assert_eq!(
            statements,
            vec![concat!(
                "CREATE TABLE IF NOT EXISTS \"sqltable\" (\n",
                "  \"_id\" TEXT,\n",
                "  \"var\" INTEGER,\n",
                "  \"arry\" INTEGER ARRAY,\n",
                "  PRIMARY KEY (\"_id\")\n",
                ")"
            )
            .to_string()]
        );
    }

    #[test]
    fn test_create_table_with_clobber_and_extras() {
        let map = map();
        let schema = map.resolve("db.stamped").unwrap();
        let statements = PostgreSQLDdl.to_create_table(schema, true);

        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0], "DROP TABLE IF EXISTS \"stamped\"");
        assert!(statements[1].starts_with("CREATE TABLE \"stamped\" ("));
        assert!(statements[1].contains("\"synced_at\" TIMESTAMP DEFAULT now()"));
        assert!(statements[1].contains("\"_extra_props\" JSONB"));
        assert!(statements[1].contains("PRIMARY KEY (\"a\", \"b\")"));
    }

    #[test]
    fn test_copy_statement() {
        assert_eq!(
            PostgreSQLDdl.to_copy("sqltable", &["_id", "var"]),
            "COPY \"sqltable\" (\"_id\", \"var\") FROM STDIN"
        );
    }

    fn bind<'a>(column: &'a str, sql_type: &'a str, value: &'a Cell) -> Binding<'a> {
        Binding {
            column,
            sql_type,
            value,
        }
    }

    #[test]
    fn test_upsert_statement() {
        let (id, var, ts) = (Cell::text("a"), Cell::Int32(1), Cell::Now);
        let statement = PostgreSQLDdl.to_upsert(
            "sqltable",
            &[
                bind("_id", "TEXT", &id),
                bind("var", "INTEGER", &var),
                bind("synced_at", "TIMESTAMP", &ts),
            ],
            &["_id"],
        );
        assert_eq!(
            statement.sql,
            "INSERT INTO \"sqltable\" (\"_id\", \"var\") VALUES ($1::text::TEXT, $2::text::INTEGER) \
             ON CONFLICT (\"_id\") DO UPDATE SET \"var\" = EXCLUDED.\"var\""
        );
        assert_eq!(
            statement.params,
            vec![Some("a".to_string()), Some("1".to_string())]
        );
    }

    #[test]
    fn test_upsert_binds_values_outside_the_sql_text() {
        let (id, data, note) = (
            Cell::text("it's"),
            Cell::Bytes(vec![1, 255]),
            Cell::text("back\\slash"),
        );
        let statement = PostgreSQLDdl.to_upsert(
            "t",
            &[
                bind("_id", "TEXT", &id),
                bind("data", "BYTEA", &data),
                bind("note", "TEXT", &note),
            ],
            &["_id"],
        );
        assert!(!statement.sql.contains('\''));
        assert!(!statement.sql.contains('\\'));
        assert!(statement.sql.contains("$2::text::BYTEA"));
        assert_eq!(
            statement.params,
            vec![
                Some("it's".to_string()),
                Some("\\x01ff".to_string()),
                Some("back\\slash".to_string()),
            ]
        );
    }

    #[test]
    fn test_upsert_binds_null_as_parameter() {
        let (id, var) = (Cell::text("a"), Cell::Null);
        let statement = PostgreSQLDdl.to_upsert(
            "t",
            &[bind("_id", "TEXT", &id), bind("var", "INTEGER", &var)],
            &["_id"],
        );
        assert!(statement.sql.contains("VALUES ($1::text::TEXT, $2::text::INTEGER)"));
        assert_eq!(statement.params, vec![Some("a".to_string()), None]);
    }

    #[test]
    fn test_upsert_with_only_keys_does_nothing_on_conflict() {
        let id = Cell::text("a");
        let statement = PostgreSQLDdl.to_upsert("t", &[bind("_id", "TEXT", &id)], &["_id"]);
        assert_eq!(
            statement.sql,
            "INSERT INTO \"t\" (\"_id\") VALUES ($1::text::TEXT) ON CONFLICT (\"_id\") DO NOTHING"
        );
    }

    #[test]
    fn test_delete_statement() {
        let (a, b, c) = (Cell::text("x"), Cell::Null, Cell::Int64(7));
        let statement = PostgreSQLDdl.to_delete(
            "t",
            &[
                bind("a", "TEXT", &a),
                bind("b", "TEXT", &b),
                bind("c", "BIGINT", &c),
            ],
        );
        assert_eq!(
            statement.sql,
            "DELETE FROM \"t\" WHERE \"a\" = $1::text::TEXT AND \"b\" IS NULL AND \"c\" = $2::text::BIGINT"
        );
        assert_eq!(
            statement.params,
            vec![Some("x".to_string()), Some("7".to_string())]
        );
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("plain"), "\"plain\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
