//! Namespace resolution against a compiled [`SchemaMap`].
//!
//! A namespace is `db.collection` or `db.collection.related.relation`. Unknown
//! database names fall back to alias matching; the outcome of each alias scan
//! is cached against the literal database string.

use crate::schema::{CollectionSchema, DbSchema, SchemaError, SchemaMap};
use std::fmt;
use std::sync::PoisonError;
use tracing::debug;

const RELATED_SEPARATOR: &str = ".related.";

/// A parsed namespace string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Namespace<'a> {
    pub db: &'a str,
    pub collection: &'a str,
    pub relation: Option<&'a str>,
}

impl<'a> Namespace<'a> {
    /// Split a namespace into its parts. Returns `None` when there is no
    /// collection part.
    pub fn parse(ns: &'a str) -> Option<Self> {
        let (db, rest) = ns.split_once('.')?;
        if db.is_empty() || rest.is_empty() {
            return None;
        }
        let (collection, relation) = match rest.rfind(RELATED_SEPARATOR) {
            Some(idx) if idx > 0 && idx + RELATED_SEPARATOR.len() < rest.len() => {
                (&rest[..idx], Some(&rest[idx + RELATED_SEPARATOR.len()..]))
            }
            _ => (rest, None),
        };
        Some(Self {
            db,
            collection,
            relation,
        })
    }
}

impl fmt::Display for Namespace<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.db, self.collection)?;
        if let Some(relation) = self.relation {
            write!(f, "{RELATED_SEPARATOR}{relation}")?;
        }
        Ok(())
    }
}

impl SchemaMap {
    /// Find the database schema for `db`, by exact name or by alias.
    pub fn find_db(&self, db: &str) -> Option<&DbSchema> {
        if let Some(found) = self.database(db) {
            return Some(found);
        }

        let cached = self
            .alias_cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(db)
            .copied();
        if let Some(index) = cached {
            return self.database_at(index);
        }

        let Some(index) = self.databases().iter().position(|d| d.matches_alias(db)) else {
            debug!("Database {db} matches no alias");
            return None;
        };
        debug!("Database {db} matched alias of {}", self.databases()[index].name);
        self.alias_cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(db.to_string(), index);
        self.database_at(index)
    }

    /// Resolve a namespace to its schema. Unmapped namespaces are `None`.
    pub fn resolve(&self, ns: &str) -> Option<&CollectionSchema> {
        let parsed = Namespace::parse(ns)?;
        let db = self.find_db(parsed.db)?;
        let Some(schema) = db.collection(parsed.collection) else {
            debug!("No mapping for ns: {ns}");
            return None;
        };
        match parsed.relation {
            None => Some(schema),
            Some(relation) => {
                let related = schema.relation(relation);
                if related.is_none() {
                    debug!("No relation {relation} for ns: {ns}");
                }
                related
            }
        }
    }

    /// Like [`resolve`](Self::resolve), but an unmapped namespace is an error.
    pub fn resolve_strict(&self, ns: &str) -> Result<&CollectionSchema, SchemaError> {
        self.resolve(ns)
            .ok_or_else(|| SchemaError::NoMapping(ns.to_string()))
    }

    /// Destination table for a namespace.
    pub fn table_for_ns(&self, ns: &str) -> Result<&str, SchemaError> {
        Ok(&self.resolve_strict(ns)?.table)
    }

    /// Primary key columns for a namespace.
    pub fn primary_key_for_ns(&self, ns: &str) -> Result<&[String], SchemaError> {
        Ok(self.resolve_strict(ns)?.primary_key())
    }

    /// Namespaces of every relation declared under `ns`.
    pub fn all_related_ns(&self, ns: &str) -> Result<Vec<String>, SchemaError> {
        let schema = self.resolve_strict(ns)?;
        Ok(schema
            .relations
            .iter()
            .map(|r| format!("{ns}{RELATED_SEPARATOR}{}", r.name))
            .collect())
    }
}
