//! Text matching and unique-key evaluation for in-memory collections.
//!
//! This module mirrors the parts of a document database's index behaviour the
//! in-memory backend needs: word-based text matching over the fields of a text index,
//! and value comparison for unique indexes.

use std::collections::HashMap;
use bson::{Bson, Document as BsonDocument, datetime::DateTime, oid::ObjectId};

use docbind_core::index::{IndexKind, IndexSpec};


/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to f64 so that `1_i32` and `1_i64` collide in a
/// unique index, as they would in a real store.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    /// Null or missing value
    Null,
    /// Boolean value
    Bool(bool),
    /// Numeric value (all integers and floats normalized to f64)
    Number(f64),
    /// DateTime value
    DateTime(DateTime),
    /// ObjectId value
    ObjectId(ObjectId),
    /// String value
    String(&'a str),
    /// Array of comparable values
    Array(Vec<Comparable<'a>>),
    /// Map/Object of comparable values
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            _ => Comparable::Null,
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

/// Resolves a possibly dotted field path (`"address.city"`) inside a document.
pub(crate) fn lookup<'a>(document: &'a BsonDocument, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }

    Some(current)
}

/// Value a unique index sees for `field`; missing fields count as null.
fn unique_key<'a>(document: &'a BsonDocument, field: &str) -> Comparable<'a> {
    lookup(document, field)
        .map(Comparable::from)
        .unwrap_or(Comparable::Null)
}

/// Splits text into lowercase words.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn collect_words(value: &Bson, words: &mut Vec<String>) {
    match value {
        Bson::String(text) => words.extend(tokenize(text)),
        Bson::Array(items) => items
            .iter()
            .for_each(|item| collect_words(item, words)),
        _ => {}
    }
}

/// Matches documents against the search terms of a text query.
///
/// A document matches when any search term equals any word of any field covered by the
/// text index.
pub(crate) struct TextEvaluator<'a> {
    fields: Vec<&'a str>,
    terms: Vec<String>,
}

impl<'a> TextEvaluator<'a> {
    /// Builds an evaluator for `index`; returns `None` if it is not a text index.
    pub fn new(index: &'a IndexSpec, text: &str) -> Option<Self> {
        match &index.kind {
            IndexKind::Text { fields } => Some(Self {
                fields: fields
                    .iter()
                    .map(|(field, _)| field.as_str())
                    .collect(),
                terms: tokenize(text),
            }),
            IndexKind::Field { .. } => None,
        }
    }

    pub fn matches(&self, document: &BsonDocument) -> bool {
        let mut words = Vec::new();

        for field in &self.fields {
            if let Some(value) = lookup(document, field) {
                collect_words(value, &mut words);
            }
        }

        self.terms
            .iter()
            .any(|term| words.contains(term))
    }
}

/// Finds the first unique index `candidate` would violate.
///
/// `others` are the documents already stored, excluding the one being replaced.
pub(crate) fn unique_violation<'a, 'b>(
    indexes: &'a [IndexSpec],
    others: impl IntoIterator<Item = &'b BsonDocument> + Clone,
    candidate: &BsonDocument,
) -> Option<(&'a str, String)> {
    indexes
        .iter()
        .filter_map(|index| match &index.kind {
            IndexKind::Field { field, unique: true } => Some((index.name.as_str(), field.as_str())),
            _ => None,
        })
        .find_map(|(name, field)| {
            let key = unique_key(candidate, field);

            others
                .clone()
                .into_iter()
                .any(|other| unique_key(other, field) == key)
                .then(|| (name, format!("{key:?}")))
        })
}

/// Returns `true` when two of `documents` share a value for `field`.
pub(crate) fn has_duplicates<'b>(
    documents: impl IntoIterator<Item = &'b BsonDocument>,
    field: &str,
) -> bool {
    let keys = documents
        .into_iter()
        .map(|document| unique_key(document, field))
        .collect::<Vec<_>>();

    keys.iter()
        .enumerate()
        .any(|(i, key)| keys[i + 1..].contains(key))
}
