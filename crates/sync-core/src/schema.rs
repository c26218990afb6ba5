//! Mapping schema definitions and compilation.
//!
//! The mapping is written in YAML and compiled once at startup into an
//! immutable [`SchemaMap`]:
//!
//! ```yaml
//! blog:
//!   meta:
//!     alias: ["^blog_\\d+$"]
//!   posts:
//!     meta:
//!       table: posts
//!       extra_props: JSONB
//!     columns:
//!       - _id: TEXT
//!       - author_name:
//!         source: author.name
//!         type: TEXT
//!       - tags: TEXT ARRAY
//!       - synced_at:
//!         source: $timestamp
//!         type: TIMESTAMP
//!     related:
//!       comments:
//!         - _id:
//!           source: comments[]._id
//!           type: TEXT
//!           primary_key: true
//!         - post_id:
//!           source: _id
//!           type: TEXT
//! ```
//!
//! Column entries come in three shapes (shorthand `name: type`, sourced
//! `source` + `type`, literal `value` + `type`). They are resolved into a
//! [`ColumnKind`] here and never re-inspected while transforming documents.

use crate::path::DocPath;
use crate::values::Cell;
use regex::Regex;
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::RwLock;

/// Name of the trailing column that captures unclaimed document fields.
pub const EXTRA_PROPS_COLUMN: &str = "_extra_props";

/// Pseudo-source asking the destination store for the current time.
pub const TIMESTAMP_SOURCE: &str = "$timestamp";

const EXISTS_PREFIX: &str = "$exists ";
const IDENTIFIER_FIELD: &str = "_id";
const META_KEY: &str = "meta";

/// Keys of a column entry that never name the column.
const RESERVED_COLUMN_KEYS: &[&str] = &[
    "name",
    "source",
    "type",
    "value",
    "primary_key",
    "reused",
    "array_type",
];

// ============================================================================
// Error Types
// ============================================================================

/// Error type for schema compilation and namespace lookup.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Error reading schema file
    #[error("Failed to read schema file: {0}")]
    IoError(#[from] std::io::Error),

    /// Error parsing YAML
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Column entry matches none of the recognised shapes
    #[error("Invalid column entry {entry} in {ns}")]
    InvalidColumn { ns: String, entry: String },

    /// Two columns read the same source without both being marked reused
    #[error("Duplicate source {path} in column definition {column} for {ns}")]
    DuplicateSource {
        ns: String,
        path: String,
        column: String,
    },

    /// Source starts with `$` but is not a known pseudo-source
    #[error("Unknown source {name} in {ns}")]
    UnknownSource { ns: String, name: String },

    /// Structural problem in a collection spec
    #[error("In spec for {ns}: {reason}")]
    InvalidSpec { ns: String, reason: String },

    /// No column qualifies as primary key
    #[error("No primary key column for {0}")]
    MissingPrimaryKey(String),

    /// Alias pattern failed to compile
    #[error("Invalid alias pattern '{pattern}' for {db}: {error}")]
    InvalidAlias {
        db: String,
        pattern: String,
        #[source]
        error: regex::Error,
    },

    /// Strict lookup found no mapping
    #[error("No mapping for namespace: {0}")]
    NoMapping(String),
}

// ============================================================================
// Column Types
// ============================================================================

/// Where a sourced column reads its value from.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// Dotted document path
    Path(DocPath),
    /// Store-side current time
    Now,
    /// Boolean existence probe against the original document
    Exists(DocPath),
}

impl Source {
    /// Parse a `source` string, recognising pseudo-sources.
    pub fn parse(ns: &str, raw: &str) -> Result<Self, SchemaError> {
        if !raw.starts_with('$') {
            return Ok(Source::Path(DocPath::parse(raw)));
        }
        if raw == TIMESTAMP_SOURCE {
            return Ok(Source::Now);
        }
        match raw.strip_prefix(EXISTS_PREFIX).map(str::trim) {
            Some(path) if !path.is_empty() => Ok(Source::Exists(DocPath::parse_plain(path))),
            _ => Err(SchemaError::UnknownSource {
                ns: ns.to_string(),
                name: raw.to_string(),
            }),
        }
    }

    /// Whether this source reads the document's native identifier.
    pub fn is_identifier(&self) -> bool {
        matches!(self, Source::Path(p) if p.as_str() == IDENTIFIER_FIELD)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Path(path) => write!(f, "{path}"),
            Source::Now => f.write_str(TIMESTAMP_SOURCE),
            Source::Exists(path) => write!(f, "{EXISTS_PREFIX}{path}"),
        }
    }
}

/// The compiled shape of a column entry.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnKind {
    /// Constant value, the document is ignored
    Literal(Cell),
    /// Value read from the document or computed from a pseudo-source
    Sourced(Source),
}

/// A single destination column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    /// Destination column name
    pub name: String,

    /// SQL type, used verbatim in DDL
    pub sql_type: String,

    /// Element type when `sql_type` is `<base> ARRAY`
    pub array_type: Option<String>,

    /// Explicit primary key flag
    pub primary_key: bool,

    /// Whether other columns may read the same source
    pub reused: bool,

    pub kind: ColumnKind,
}

impl ColumnSpec {
    pub fn source(&self) -> Option<&Source> {
        match &self.kind {
            ColumnKind::Sourced(source) => Some(source),
            ColumnKind::Literal(_) => None,
        }
    }

    /// Whether the store fills this column with `now()`.
    pub fn is_store_timestamp(&self) -> bool {
        matches!(self.kind, ColumnKind::Sourced(Source::Now))
    }
}

/// Type of the leftover-capture column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtraProps {
    Text,
    Json,
    Jsonb,
}

impl ExtraProps {
    pub fn sql_type(&self) -> &'static str {
        match self {
            ExtraProps::Text => "TEXT",
            ExtraProps::Json => "JSON",
            ExtraProps::Jsonb => "JSONB",
        }
    }
}

// ============================================================================
// Schema Types
// ============================================================================

/// Compiled mapping for one collection, or for one of its relations.
#[derive(Debug, Clone)]
pub struct CollectionSchema {
    /// Collection or relation name
    pub name: String,

    /// Destination table
    pub table: String,

    /// Columns in SQL order
    pub columns: Vec<ColumnSpec>,

    /// Explicit multi-column key
    pub composite_key: Option<Vec<String>>,

    /// Leftover capture, if enabled
    pub extra_props: Option<ExtraProps>,

    /// One-to-many child tables
    pub relations: Vec<CollectionSchema>,

    primary_key: Vec<String>,
}

impl CollectionSchema {
    /// Primary key column names; never empty.
    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn relation(&self, name: &str) -> Option<&CollectionSchema> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// All destination columns, including the leftover column.
    pub fn all_columns(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
        if self.extra_props.is_some() {
            names.push(EXTRA_PROPS_COLUMN);
        }
        names
    }

    /// Declared SQL types, aligned with [`all_columns`](Self::all_columns).
    pub fn column_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.columns.iter().map(|c| c.sql_type.as_str()).collect();
        if let Some(extra_props) = self.extra_props {
            types.push(extra_props.sql_type());
        }
        types
    }

    /// Destination columns for a bulk load: store-timestamp columns are left
    /// to their column default.
    pub fn copy_columns(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .columns
            .iter()
            .filter(|c| !c.is_store_timestamp())
            .map(|c| c.name.as_str())
            .collect();
        if self.extra_props.is_some() {
            names.push(EXTRA_PROPS_COLUMN);
        }
        names
    }
}

/// Compiled mapping for one source database.
#[derive(Debug, Clone)]
pub struct DbSchema {
    pub name: String,
    aliases: Vec<Regex>,
    collections: Vec<CollectionSchema>,
}

impl DbSchema {
    pub fn collection(&self, name: &str) -> Option<&CollectionSchema> {
        self.collections.iter().find(|c| c.name == name)
    }

    pub fn collections(&self) -> &[CollectionSchema] {
        &self.collections
    }

    pub fn aliases(&self) -> &[Regex] {
        &self.aliases
    }

    /// Whether any alias pattern matches `db`.
    pub fn matches_alias(&self, db: &str) -> bool {
        self.aliases.iter().any(|re| re.is_match(db))
    }
}

/// Root of the compiled mapping.
///
/// Immutable after compilation except for the alias resolution cache, which
/// is guarded by a lock so lookups stay safe from any number of threads.
/// Only successful alias matches are cached, so the cache is bounded by the
/// number of distinct mapped database names seen.
#[derive(Debug, Default)]
pub struct SchemaMap {
    databases: Vec<DbSchema>,
    pub(crate) alias_cache: RwLock<HashMap<String, usize>>,
}

impl SchemaMap {
    /// Load and compile a mapping from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Compile a mapping from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self, SchemaError> {
        let raw: Value = serde_yaml::from_str(yaml)?;
        Self::compile(&raw)
    }

    /// Compile a parsed mapping tree.
    pub fn compile(raw: &Value) -> Result<Self, SchemaError> {
        let root = match raw {
            Value::Mapping(map) => map.clone(),
            Value::Null => Mapping::new(),
            other => {
                return Err(SchemaError::InvalidSpec {
                    ns: String::new(),
                    reason: format!("expected a mapping of databases, got {}", describe(other)),
                })
            }
        };

        let mut databases = Vec::with_capacity(root.len());
        for (db_name, db_spec) in &root {
            let Some(db_name) = db_name.as_str() else {
                continue;
            };
            databases.push(compile_db(db_name, db_spec)?);
        }

        tracing::debug!("Compiled schema for {} databases", databases.len());
        Ok(Self {
            databases,
            alias_cache: RwLock::new(HashMap::new()),
        })
    }

    /// All databases, in declaration order.
    pub fn databases(&self) -> &[DbSchema] {
        &self.databases
    }

    /// Declared database names.
    pub fn database_names(&self) -> Vec<&str> {
        self.databases.iter().map(|d| d.name.as_str()).collect()
    }

    /// Look up a database by its exact declared name.
    pub fn database(&self, name: &str) -> Option<&DbSchema> {
        self.databases.iter().find(|d| d.name == name)
    }

    pub(crate) fn database_at(&self, index: usize) -> Option<&DbSchema> {
        self.databases.get(index)
    }

    /// Collection names mapped for an exactly named database.
    pub fn collections_for_db(&self, db: &str) -> Vec<&str> {
        self.database(db)
            .map(|d| d.collections.iter().map(|c| c.name.as_str()).collect())
            .unwrap_or_default()
    }
}

// ============================================================================
// Compilation
// ============================================================================

fn compile_db(db_name: &str, spec: &Value) -> Result<DbSchema, SchemaError> {
    let empty = Mapping::new();
    let spec = match spec {
        Value::Mapping(map) => map,
        Value::Null => &empty,
        other => {
            return Err(SchemaError::InvalidSpec {
                ns: db_name.to_string(),
                reason: format!("expected a mapping of collections, got {}", describe(other)),
            })
        }
    };

    let aliases = compile_aliases(db_name, spec.get(META_KEY))?;

    let mut collections = Vec::new();
    for (name, collection_spec) in spec {
        let Some(name) = name.as_str() else {
            continue;
        };
        if name == META_KEY {
            continue;
        }
        let ns = format!("{db_name}.{name}");
        collections.push(compile_collection(&ns, name, collection_spec, None)?);
    }

    Ok(DbSchema {
        name: db_name.to_string(),
        aliases,
        collections,
    })
}

fn compile_aliases(db_name: &str, meta: Option<&Value>) -> Result<Vec<Regex>, SchemaError> {
    let patterns: Vec<&str> = match meta.and_then(|m| m.get("alias")) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(pattern)) => vec![pattern.as_str()],
        Some(Value::Sequence(items)) => items
            .iter()
            .map(|item| {
                item.as_str().ok_or_else(|| SchemaError::InvalidSpec {
                    ns: db_name.to_string(),
                    reason: format!("alias entries must be strings, got {}", describe(item)),
                })
            })
            .collect::<Result<_, _>>()?,
        Some(other) => {
            return Err(SchemaError::InvalidSpec {
                ns: db_name.to_string(),
                reason: format!("alias must be a string or a list, got {}", describe(other)),
            })
        }
    };

    patterns
        .into_iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|error| SchemaError::InvalidAlias {
                db: db_name.to_string(),
                pattern: pattern.to_string(),
                error,
            })
        })
        .collect()
}

/// Compile a collection spec. `default_table` is set for relations, whose
/// table defaults to the relation name.
fn compile_collection(
    ns: &str,
    name: &str,
    spec: &Value,
    default_table: Option<&str>,
) -> Result<CollectionSchema, SchemaError> {
    // A relation may be declared as a bare column list.
    if let (Value::Sequence(entries), Some(table)) = (spec, default_table) {
        let columns = compile_columns(ns, entries)?;
        let primary_key = derive_primary_key(ns, &columns, None)?;
        return Ok(CollectionSchema {
            name: name.to_string(),
            table: table.to_string(),
            columns,
            composite_key: None,
            extra_props: None,
            relations: Vec::new(),
            primary_key,
        });
    }

    let Some(spec) = spec.as_mapping() else {
        return Err(invalid_spec(ns, format!("expected a mapping, got {}", describe(spec))));
    };
    let meta = spec.get(META_KEY);

    let table = match meta.and_then(|m| m.get("table")).and_then(Value::as_str) {
        Some(table) => table.to_string(),
        None => match default_table {
            Some(table) => table.to_string(),
            None => return Err(invalid_spec(ns, "missing meta.table")),
        },
    };

    let entries = match spec.get("columns") {
        Some(Value::Sequence(entries)) => entries,
        Some(other) => {
            return Err(invalid_spec(
                ns,
                format!("columns must be a list, got {}", describe(other)),
            ))
        }
        None => return Err(invalid_spec(ns, "missing columns")),
    };
    let columns = compile_columns(ns, entries)?;

    let composite_key = match meta.and_then(|m| m.get("composite_key")) {
        None | Some(Value::Null) => None,
        Some(Value::Sequence(keys)) => Some(
            keys.iter()
                .map(|k| {
                    k.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| invalid_spec(ns, "composite_key entries must be strings"))
                })
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Some(other) => {
            return Err(invalid_spec(
                ns,
                format!("composite_key must be a list, got {}", describe(other)),
            ))
        }
    };

    let extra_props = match meta.and_then(|m| m.get("extra_props")) {
        None | Some(Value::Null) | Some(Value::Bool(false)) => None,
        Some(Value::String(s)) if s.eq_ignore_ascii_case("json") => Some(ExtraProps::Json),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("jsonb") => Some(ExtraProps::Jsonb),
        Some(_) => Some(ExtraProps::Text),
    };

    let mut relations = Vec::new();
    match spec.get("related") {
        None | Some(Value::Null) => {}
        Some(Value::Mapping(related)) => {
            for (relation, relation_spec) in related {
                let Some(relation) = relation.as_str() else {
                    continue;
                };
                let relation_ns = format!("{ns}.related.{relation}");
                relations.push(compile_collection(
                    &relation_ns,
                    relation,
                    relation_spec,
                    Some(relation),
                )?);
            }
        }
        Some(other) => {
            return Err(invalid_spec(
                ns,
                format!("related must be a mapping, got {}", describe(other)),
            ))
        }
    }

    let primary_key = derive_primary_key(ns, &columns, composite_key.as_deref())?;

    Ok(CollectionSchema {
        name: name.to_string(),
        table,
        columns,
        composite_key,
        extra_props,
        relations,
        primary_key,
    })
}

fn compile_columns(ns: &str, entries: &[Value]) -> Result<Vec<ColumnSpec>, SchemaError> {
    let columns = entries
        .iter()
        .map(|entry| compile_column(ns, entry))
        .collect::<Result<Vec<_>, _>>()?;
    check_columns(ns, &columns)?;
    Ok(columns)
}

fn compile_column(ns: &str, entry: &Value) -> Result<ColumnSpec, SchemaError> {
    let invalid = || SchemaError::InvalidColumn {
        ns: ns.to_string(),
        entry: describe(entry),
    };
    let map = entry.as_mapping().ok_or_else(invalid)?;

    let (name, sql_type, kind) = if let (Some(value), Some(sql_type)) =
        (map.get("value"), str_key(map, "type"))
    {
        let name = column_name(map).ok_or_else(invalid)?;
        let cell = literal_cell(value).ok_or_else(invalid)?;
        (name, sql_type, ColumnKind::Literal(cell))
    } else if let (Some(source), Some(sql_type)) = (str_key(map, "source"), str_key(map, "type"))
    {
        if source.is_empty() {
            return Err(invalid());
        }
        let name = column_name(map).ok_or_else(invalid)?;
        (name, sql_type, ColumnKind::Sourced(Source::parse(ns, source)?))
    } else if map.len() == 1 {
        let (key, value) = map.iter().next().ok_or_else(invalid)?;
        match (key.as_str(), value.as_str()) {
            (Some(name), Some(sql_type)) if !name.is_empty() => (
                name.to_string(),
                sql_type,
                ColumnKind::Sourced(Source::parse(ns, name)?),
            ),
            _ => return Err(invalid()),
        }
    } else {
        return Err(invalid());
    };

    let array_type = str_key(map, "array_type")
        .map(str::to_string)
        .or_else(|| derive_array_type(sql_type));

    Ok(ColumnSpec {
        name,
        sql_type: sql_type.to_string(),
        array_type,
        primary_key: flag(map, "primary_key"),
        reused: flag(map, "reused"),
        kind,
    })
}

fn str_key<'a>(map: &'a Mapping, key: &str) -> Option<&'a str> {
    map.get(key).and_then(Value::as_str)
}

fn flag(map: &Mapping, key: &str) -> bool {
    map.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Explicit `name`, otherwise the first key that is not a column option.
fn column_name(map: &Mapping) -> Option<String> {
    if let Some(name) = map.get("name").and_then(Value::as_str) {
        return Some(name.to_string());
    }
    map.keys()
        .filter_map(Value::as_str)
        .find(|k| !RESERVED_COLUMN_KEYS.contains(k))
        .map(str::to_string)
}

fn literal_cell(value: &Value) -> Option<Cell> {
    match value {
        Value::Null => Some(Cell::Null),
        Value::Bool(b) => Some(Cell::Bool(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(Cell::Int64)
            .or_else(|| n.as_f64().map(Cell::Double)),
        Value::String(s) => Some(Cell::Text(s.clone())),
        _ => None,
    }
}

/// `"INTEGER ARRAY"` → `"INTEGER"`, case-insensitive on the suffix.
fn derive_array_type(sql_type: &str) -> Option<String> {
    const SUFFIX: &str = "array";
    let trimmed = sql_type.trim_end();
    let split = trimmed.len().checked_sub(SUFFIX.len())?;
    let (head, tail) = (trimmed.get(..split)?, trimmed.get(split..)?);
    if !tail.eq_ignore_ascii_case(SUFFIX) || !head.ends_with(char::is_whitespace) {
        return None;
    }
    let base = head.trim();
    (!base.is_empty()).then(|| base.to_string())
}

fn check_columns(ns: &str, columns: &[ColumnSpec]) -> Result<(), SchemaError> {
    let mut seen: HashMap<String, bool> = HashMap::new();
    for column in columns {
        let Some(source) = column.source() else {
            continue;
        };
        let key = source.to_string();
        if let Some(previous_reused) = seen.get(&key).copied() {
            if !(previous_reused && column.reused) {
                return Err(SchemaError::DuplicateSource {
                    ns: ns.to_string(),
                    path: key,
                    column: column.name.clone(),
                });
            }
        }
        seen.insert(key, column.reused);
    }
    Ok(())
}

fn derive_primary_key(
    ns: &str,
    columns: &[ColumnSpec],
    composite_key: Option<&[String]>,
) -> Result<Vec<String>, SchemaError> {
    if let Some(keys) = composite_key {
        if keys.is_empty() {
            return Err(SchemaError::MissingPrimaryKey(ns.to_string()));
        }
        if let Some(missing) = keys.iter().find(|k| !columns.iter().any(|c| &c.name == *k)) {
            return Err(invalid_spec(
                ns,
                format!("composite_key column '{missing}' is not declared"),
            ));
        }
        return Ok(keys.to_vec());
    }

    columns
        .iter()
        .find(|c| c.primary_key)
        .or_else(|| {
            columns
                .iter()
                .find(|c| c.source().is_some_and(Source::is_identifier))
        })
        .map(|c| vec![c.name.clone()])
        .ok_or_else(|| SchemaError::MissingPrimaryKey(ns.to_string()))
}

fn invalid_spec(ns: &str, reason: impl Into<String>) -> SchemaError {
    SchemaError::InvalidSpec {
        ns: ns.to_string(),
        reason: reason.into(),
    }
}

/// Render a YAML node compactly for error messages.
fn describe(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("{value:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_MAP: &str = r#"
db:
  collection:
    meta:
      table: sqltable
    columns:
      - _id: TEXT
      - var: INTEGER
      - arry: INTEGER ARRAY
  with_extra_props:
    meta:
      table: sqltable2
      extra_props: true
    columns:
      - _id: TEXT
  with_dotted:
    meta:
      table: sqltable3
      extra_props: JSONB
    columns:
      - _id: TEXT
      - var_a:
        source: vars.a
        type: TEXT
      - var_b:
        source: vars.b
        type: TEXT
"#;

    #[test]
    fn test_compile_shorthand_columns() {
        let map = SchemaMap::from_yaml(TEST_MAP).unwrap();
        let db = map.database("db").unwrap();
        let collection = db.collection("collection").unwrap();

        assert_eq!(collection.table, "sqltable");
        assert_eq!(collection.all_columns(), vec!["_id", "var", "arry"]);
        assert_eq!(collection.primary_key(), &["_id".to_string()]);

        let arry = collection.column("arry").unwrap();
        assert_eq!(arry.sql_type, "INTEGER ARRAY");
        assert_eq!(arry.array_type.as_deref(), Some("INTEGER"));
        assert_eq!(
            arry.kind,
            ColumnKind::Sourced(Source::Path(DocPath::parse("arry")))
        );
    }

    #[test]
    fn test_compile_sourced_columns_and_extra_props() {
        let map = SchemaMap::from_yaml(TEST_MAP).unwrap();
        let db = map.database("db").unwrap();

        let with_extra = db.collection("with_extra_props").unwrap();
        assert_eq!(with_extra.extra_props, Some(ExtraProps::Text));
        assert_eq!(with_extra.all_columns(), vec!["_id", EXTRA_PROPS_COLUMN]);

        let dotted = db.collection("with_dotted").unwrap();
        assert_eq!(dotted.extra_props, Some(ExtraProps::Jsonb));
        let var_a = dotted.column("var_a").unwrap();
        assert_eq!(var_a.source().unwrap().to_string(), "vars.a");
        assert_eq!(var_a.sql_type, "TEXT");
        assert!(var_a.array_type.is_none());
    }

    #[test]
    fn test_collections_keep_declaration_order() {
        let map = SchemaMap::from_yaml(TEST_MAP).unwrap();
        assert_eq!(map.database_names(), vec!["db"]);
        assert_eq!(
            map.collections_for_db("db"),
            vec!["collection", "with_extra_props", "with_dotted"]
        );
        assert!(map.collections_for_db("nope").is_empty());
    }

    #[test]
    fn test_literal_and_pseudo_sources() {
        let yaml = r#"
db:
  events:
    meta:
      table: events
    columns:
      - _id: TEXT
      - origin:
        value: mongo
        type: TEXT
      - version:
        value: 3
        type: INTEGER
      - synced_at:
        source: $timestamp
        type: TIMESTAMP
      - has_owner:
        source: $exists owner.id
        type: BOOLEAN
"#;
        let map = SchemaMap::from_yaml(yaml).unwrap();
        let events = map.database("db").unwrap().collection("events").unwrap();

        assert_eq!(
            events.column("origin").unwrap().kind,
            ColumnKind::Literal(Cell::text("mongo"))
        );
        assert_eq!(
            events.column("version").unwrap().kind,
            ColumnKind::Literal(Cell::Int64(3))
        );
        assert!(events.column("synced_at").unwrap().is_store_timestamp());
        assert_eq!(
            events.column("has_owner").unwrap().kind,
            ColumnKind::Sourced(Source::Exists(DocPath::parse_plain("owner.id")))
        );
        assert_eq!(
            events.copy_columns(),
            vec!["_id", "origin", "version", "has_owner"]
        );
    }

    #[test]
    fn test_unknown_pseudo_source_fails() {
        let yaml = r#"
db:
  c:
    meta:
      table: t
    columns:
      - _id: TEXT
      - x:
        source: $bogus
        type: TEXT
"#;
        let err = SchemaMap::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownSource { ref name, .. } if name == "$bogus"));
    }

    #[test]
    fn test_invalid_column_entry_fails() {
        let yaml = r#"
db:
  c:
    meta:
      table: t
    columns:
      - _id: TEXT
      - a: TEXT
        b: TEXT
"#;
        let err = SchemaMap::from_yaml(yaml).unwrap_err();
        match err {
            SchemaError::InvalidColumn { ns, entry } => {
                assert_eq!(ns, "db.c");
                assert!(entry.contains("\"a\""));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_source_fails() {
        let yaml = r#"
db:
  c:
    meta:
      table: t
    columns:
      - _id: TEXT
      - a:
        source: _id
        type: TEXT
"#;
        let err = SchemaMap::from_yaml(yaml).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::DuplicateSource { ref path, ref column, .. } if path == "_id" && column == "a"
        ));
    }

    #[test]
    fn test_duplicate_source_in_relation_fails() {
        let yaml = r#"
db:
  parents:
    meta:
      table: parents
    columns:
      - _id: TEXT
    related:
      children:
        - _id:
          source: children[]._id
          type: TEXT
          primary_key: true
        - again:
          source: children[]._id
          type: TEXT
"#;
        let err = SchemaMap::from_yaml(yaml).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::DuplicateSource { ref ns, .. } if ns == "db.parents.related.children"
        ));
    }

    #[test]
    fn test_reused_sources_and_explicit_name() {
        let yaml = r#"
db:
  c:
    meta:
      table: t
    columns:
      - _id: TEXT
      - reused_a:
        source: reused
        reused: true
        type: TEXT
      - reused_b:
        source: reused
        reused: true
        type: TEXT
      - name: explicit_name
        source: not_exist
        type: TEXT
"#;
        let map = SchemaMap::from_yaml(yaml).unwrap();
        let c = map.database("db").unwrap().collection("c").unwrap();
        assert_eq!(
            c.all_columns(),
            vec!["_id", "reused_a", "reused_b", "explicit_name"]
        );
        assert!(c.column("reused_a").unwrap().reused);
    }

    #[test]
    fn test_reuse_requires_both_columns_marked() {
        let yaml = r#"
db:
  c:
    meta:
      table: t
    columns:
      - _id: TEXT
      - a:
        source: x
        type: TEXT
      - b:
        source: x
        reused: true
        type: TEXT
"#;
        assert!(matches!(
            SchemaMap::from_yaml(yaml),
            Err(SchemaError::DuplicateSource { .. })
        ));
    }

    #[test]
    fn test_relations_compile_with_own_key() {
        let yaml = r#"
db:
  parents:
    meta:
      table: related_main
    columns:
      - _id: TEXT
      - uuid:
        source: uuid
        type: uuid
    related:
      children:
        - parent_id:
          source: _id
          type: TEXT
        - _id:
          source: children[]._id
          type: TEXT
          primary_key: true
"#;
        let map = SchemaMap::from_yaml(yaml).unwrap();
        let parents = map.database("db").unwrap().collection("parents").unwrap();
        let children = parents.relation("children").unwrap();

        assert_eq!(children.table, "children");
        assert_eq!(children.all_columns(), vec!["parent_id", "_id"]);
        assert_eq!(children.primary_key(), &["_id".to_string()]);
        assert!(children.extra_props.is_none());
    }

    #[test]
    fn test_composite_key() {
        let yaml = r#"
db:
  c:
    meta:
      table: t
      composite_key: [a, b]
    columns:
      - a: TEXT
      - b: INTEGER
"#;
        let map = SchemaMap::from_yaml(yaml).unwrap();
        let c = map.database("db").unwrap().collection("c").unwrap();
        assert_eq!(c.primary_key(), &["a".to_string(), "b".to_string()]);

        let bad = yaml.replace("[a, b]", "[a, z]");
        assert!(matches!(
            SchemaMap::from_yaml(&bad),
            Err(SchemaError::InvalidSpec { .. })
        ));
    }

    #[test]
    fn test_missing_primary_key_fails() {
        let yaml = r#"
db:
  c:
    meta:
      table: t
    columns:
      - a: TEXT
"#;
        assert!(matches!(
            SchemaMap::from_yaml(yaml),
            Err(SchemaError::MissingPrimaryKey(ref ns)) if ns == "db.c"
        ));
    }

    #[test]
    fn test_missing_table_fails() {
        let yaml = r#"
db:
  c:
    columns:
      - _id: TEXT
"#;
        assert!(matches!(
            SchemaMap::from_yaml(yaml),
            Err(SchemaError::InvalidSpec { .. })
        ));
    }

    #[test]
    fn test_alias_normalization() {
        let yaml = r#"
db:
  meta:
    alias: "^db_\\d+$"
  c:
    meta:
      table: t
    columns:
      - _id: TEXT
other:
  meta:
    alias: ["^x", "^y"]
"#;
        let map = SchemaMap::from_yaml(yaml).unwrap();
        assert_eq!(map.database("db").unwrap().aliases().len(), 1);
        assert_eq!(map.database("other").unwrap().aliases().len(), 2);
        assert!(map.database("db").unwrap().matches_alias("db_12"));
        assert!(!map.database("db").unwrap().matches_alias("db_x"));
        assert_eq!(map.collections_for_db("db"), vec!["c"]);
    }

    #[test]
    fn test_invalid_alias_fails() {
        let yaml = r#"
db:
  meta:
    alias: "(unclosed"
"#;
        assert!(matches!(
            SchemaMap::from_yaml(yaml),
            Err(SchemaError::InvalidAlias { .. })
        ));
    }

    #[test]
    fn test_non_string_alias_entry_fails() {
        let yaml = r#"
db:
  meta:
    alias: ["^db_", 1]
"#;
        assert!(matches!(
            SchemaMap::from_yaml(yaml),
            Err(SchemaError::InvalidSpec { ref ns, ref reason }) if ns == "db" && reason.contains("alias entries")
        ));
    }

    #[test]
    fn test_repeated_pseudo_source_fails() {
        let yaml = r#"
db:
  c:
    meta:
      table: t
    columns:
      - _id: TEXT
      - created:
        source: $timestamp
        type: TIMESTAMP
      - updated:
        source: $timestamp
        type: TIMESTAMP
"#;
        assert!(matches!(
            SchemaMap::from_yaml(yaml),
            Err(SchemaError::DuplicateSource { ref path, ref column, .. })
                if path == "$timestamp" && column == "updated"
        ));

        let reused = yaml.replace("type: TIMESTAMP", "type: TIMESTAMP\n        reused: true");
        assert!(SchemaMap::from_yaml(&reused).is_ok());
    }

    #[test]
    fn test_column_types_follow_all_columns() {
        let yaml = r#"
db:
  c:
    meta:
      table: t
      extra_props: JSON
    columns:
      - _id: TEXT
      - n: INTEGER ARRAY
"#;
        let map = SchemaMap::from_yaml(yaml).unwrap();
        let c = map.database("db").unwrap().collection("c").unwrap();
        assert_eq!(c.all_columns(), vec!["_id", "n", "_extra_props"]);
        assert_eq!(c.column_types(), vec!["TEXT", "INTEGER ARRAY", "JSON"]);
    }

    #[test]
    fn test_derive_array_type() {
        assert_eq!(derive_array_type("INTEGER ARRAY").as_deref(), Some("INTEGER"));
        assert_eq!(derive_array_type("text array").as_deref(), Some("text"));
        assert_eq!(
            derive_array_type("DOUBLE PRECISION Array").as_deref(),
            Some("DOUBLE PRECISION")
        );
        assert_eq!(derive_array_type("ARRAY"), None);
        assert_eq!(derive_array_type("TEXTARRAY"), None);
        assert_eq!(derive_array_type("TEXT"), None);
    }
}
