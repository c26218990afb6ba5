//! Dotted document paths and destructive extraction.
//!
//! A [`DocPath`] is compiled once from a column's `source` string such as
//! `vars.a` or `children[]._id`. Extraction works on a privately owned copy
//! of the document: every consumed leaf is removed from the copy, and a
//! parent document emptied by that removal is pruned as well, so whatever is
//! left afterwards is exactly the set of unclaimed fields.

use bson::{Bson, Document};
use std::fmt;

/// Suffix marking a fan-out segment.
const FANOUT_MARKER: &str = "[]";

/// One segment of a dotted path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    /// Document key
    pub key: String,
    /// Whether the remaining path applies to every element of an array
    pub fanout: bool,
}

/// A compiled dotted path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocPath {
    raw: String,
    segments: Vec<PathSegment>,
}

impl DocPath {
    /// Parse a path, recognising `key[]` as a fan-out segment.
    pub fn parse(raw: &str) -> Self {
        let segments = raw
            .split('.')
            .map(|piece| match piece.strip_suffix(FANOUT_MARKER) {
                Some(key) => PathSegment {
                    key: key.to_string(),
                    fanout: true,
                },
                None => PathSegment {
                    key: piece.to_string(),
                    fanout: false,
                },
            })
            .collect();
        Self {
            raw: raw.to_string(),
            segments,
        }
    }

    /// Parse a path without fan-out recognition; every piece is a plain key.
    pub fn parse_plain(raw: &str) -> Self {
        let segments = raw
            .split('.')
            .map(|piece| PathSegment {
                key: piece.to_string(),
                fanout: false,
            })
            .collect();
        Self {
            raw: raw.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn has_fanout(&self) -> bool {
        self.segments.iter().any(|s| s.fanout)
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Result of extracting a path from a document.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    /// The path is not present in the document.
    Absent,
    /// A single value.
    Value(Bson),
    /// One result per element of a fan-out array.
    Fanout(Vec<Extracted>),
}

impl Extracted {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

/// Extract `path` from `working`, returning the value and what remains.
pub fn extract_and_consume(mut working: Document, path: &DocPath) -> (Extracted, Document) {
    let value = take(&mut working, path.segments());
    (value, working)
}

/// Check whether `path` exists in the untouched original document.
pub fn exists(original: &Document, path: &DocPath) -> bool {
    let Some((last, parents)) = path.segments().split_last() else {
        return false;
    };
    let mut current = original;
    for segment in parents {
        match current.get(&segment.key) {
            Some(Bson::Document(child)) => current = child,
            _ => return false,
        }
    }
    current.contains_key(&last.key)
}

fn take(doc: &mut Document, segments: &[PathSegment]) -> Extracted {
    let Some((segment, rest)) = segments.split_first() else {
        return Extracted::Absent;
    };

    if segment.fanout {
        return take_fanout(doc, &segment.key, rest);
    }

    if rest.is_empty() {
        return doc
            .remove(&segment.key)
            .map(Extracted::Value)
            .unwrap_or(Extracted::Absent);
    }

    let extracted = match doc.get_mut(&segment.key) {
        Some(Bson::Document(child)) => take(child, rest),
        // An identifier leaf stands in for whatever path continues below it.
        Some(Bson::ObjectId(oid)) => Extracted::Value(Bson::String(oid.to_hex())),
        _ => return Extracted::Absent,
    };

    let consumed = match doc.get(&segment.key) {
        Some(Bson::Document(child)) => child.is_empty(),
        Some(Bson::ObjectId(_)) => true,
        _ => false,
    };
    if consumed {
        doc.remove(&segment.key);
    }
    extracted
}

fn take_fanout(doc: &mut Document, key: &str, rest: &[PathSegment]) -> Extracted {
    let Some(Bson::Array(items)) = doc.get_mut(key) else {
        return Extracted::Absent;
    };

    let values = items
        .iter_mut()
        .map(|item| take_element(item, rest))
        .collect();

    let exhausted = rest.is_empty()
        || items
            .iter()
            .all(|item| matches!(item, Bson::Document(d) if d.is_empty()));
    if exhausted {
        doc.remove(key);
    }
    Extracted::Fanout(values)
}

fn take_element(item: &mut Bson, rest: &[PathSegment]) -> Extracted {
    if rest.is_empty() {
        return Extracted::Value(item.clone());
    }
    match item {
        Bson::Document(child) => take(child, rest),
        Bson::ObjectId(oid) => Extracted::Value(Bson::String(oid.to_hex())),
        _ => Extracted::Absent,
    }
}
