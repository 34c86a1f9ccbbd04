//! Text search queries and the cursor type they produce.
//!
//! A [`SearchQuery`] is an optional full-text filter plus a projection. When the text is
//! absent or empty the filter stage is left out and every document in the collection is a
//! candidate.
//!
//! # Example
//!
//! ```ignore
//! use docbind::query::SearchQuery;
//!
//! let query = SearchQuery::builder()
//!     .text("smith")
//!     .project("email")
//!     .build();
//! ```

use bson::Document as BsonDocument;
use futures::stream::BoxStream;

use crate::error::DocumentStoreResult;

/// Lazy, single-pass stream of raw records.
///
/// Records are fetched from the store as the stream is polled. Dropping the stream
/// early stops the fetch; a consumed stream cannot be restarted.
pub type DocumentCursor = BoxStream<'static, DocumentStoreResult<BsonDocument>>;

/// A full-text search with a minimal projection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    /// Text matched against the collection's text index. `None` disables the filter.
    pub text: Option<String>,
    /// Fields returned besides `_id`.
    pub projection: Vec<String>,
}

impl SearchQuery {
    /// Creates an unfiltered query returning only `_id`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new query builder for fluent construction.
    pub fn builder() -> SearchQueryBuilder {
        SearchQueryBuilder::new()
    }

    /// The search text, if the text stage applies.
    pub fn text_filter(&self) -> Option<&str> {
        self.text.as_deref().filter(|text| !text.is_empty())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchQueryBuilder {
    query: SearchQuery,
}

impl SearchQueryBuilder {
    /// Creates a new query builder.
    pub fn new() -> Self {
        SearchQueryBuilder { query: SearchQuery::default() }
    }

    /// Sets the search text. An empty string behaves like no text at all.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.query.text = Some(text.into());
        self
    }

    /// Sets the search text from an optional value.
    pub fn maybe_text(mut self, text: Option<&str>) -> Self {
        self.query.text = text.map(str::to_string);
        self
    }

    /// Adds a field to the projection.
    pub fn project(mut self, field: impl Into<String>) -> Self {
        self.query.projection.push(field.into());
        self
    }

    /// Adds several fields to the projection.
    pub fn project_all<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query
            .projection
            .extend(fields.into_iter().map(Into::into));
        self
    }

    /// Builds and returns the final query.
    pub fn build(self) -> SearchQuery {
        self.query
    }
}
