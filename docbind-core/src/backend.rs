//! Storage backend abstraction.
//!
//! This module defines the two traits a database driver has to implement to be used by
//! this crate:
//!
//! - [`StoreConnector`]: opens a connection and hands back a backend handle. It is called
//!   once per attempt by the [`ConnectionManager`](crate::connection::ConnectionManager).
//! - [`StoreBackend`]: the live database handle. It writes and reads raw BSON records,
//!   declares indexes, runs text searches and reports its connectivity.
//!
//! Backends never see typed documents; conversion happens in
//! [`document`](crate::document) and [`collection`](crate::collection).

use async_trait::async_trait;
use bson::{Document as BsonDocument, oid::ObjectId};
use std::fmt::Debug;

use crate::{
    config::TransportOptions,
    error::DocumentStoreResult,
    index::IndexSpec,
    query::{DocumentCursor, SearchQuery},
};

/// Abstract interface for a connected document database.
///
/// # Thread Safety
///
/// Handles are shared behind an `Arc` by the connection manager and every collection
/// handle, so implementations must support concurrent access. No locking is done on top
/// of the backend; it relies on the driver's own connection pool.
///
/// # Error Handling
///
/// Write rejections are reported as
/// [`Persistence`](crate::error::DocumentStoreError::Persistence), index declaration
/// failures as [`Index`](crate::error::DocumentStoreError::Index), everything else as
/// [`Backend`](crate::error::DocumentStoreError::Backend).
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug + 'static {
    /// Inserts a record without an `_id` and returns the id assigned by the store.
    ///
    /// # Arguments
    ///
    /// * `collection` - The collection to insert into. Created on first use.
    /// * `document` - The storage form of the document
    async fn insert_document(
        &self,
        collection: &str,
        document: BsonDocument,
    ) -> DocumentStoreResult<ObjectId>;

    /// Replaces the record with the given id, inserting it when it does not exist.
    ///
    /// # Arguments
    ///
    /// * `collection` - The collection holding the record
    /// * `id` - The record id
    /// * `document` - The full storage form of the document
    async fn upsert_document(
        &self,
        collection: &str,
        id: &ObjectId,
        document: BsonDocument,
    ) -> DocumentStoreResult<()>;

    /// Fetches a single record by id.
    ///
    /// # Returns
    ///
    /// `Ok(None)` when the record does not exist.
    async fn get_document(
        &self,
        collection: &str,
        id: &ObjectId,
    ) -> DocumentStoreResult<Option<BsonDocument>>;

    /// Declares indexes on a collection.
    ///
    /// Declaring an index that already exists with the same definition must succeed
    /// without changes.
    async fn create_indexes(
        &self,
        collection: &str,
        indexes: Vec<IndexSpec>,
    ) -> DocumentStoreResult<()>;

    /// Runs a text search and returns a lazy cursor over the projected records.
    ///
    /// When [`SearchQuery::text_filter`] is `None` every record is returned.
    async fn search(&self, collection: &str, query: SearchQuery) -> DocumentStoreResult<DocumentCursor>;

    /// Whether the handle can still reach the store.
    fn is_connected(&self) -> bool;

    /// Closes the handle. With `force` set, in-flight operations are abandoned.
    ///
    /// Closing an already closed handle is a no-op.
    async fn close(&self, force: bool) -> DocumentStoreResult<()>;
}

/// Factory for backend handles, invoked once per connection attempt.
///
/// # Example
///
/// ```ignore
/// use docbind::{backend::StoreConnector, memory::InMemoryConnector};
///
/// let connector = InMemoryConnector::new();
/// let backend = connector.connect("memory://app", &TransportOptions::default()).await?;
/// ```
#[async_trait]
pub trait StoreConnector: Send + Sync {
    /// The backend type produced by this connector.
    type Backend: StoreBackend;

    /// Opens a connection.
    ///
    /// # Arguments
    ///
    /// * `uri` - The connection string
    /// * `options` - Transport options resolved from the connection config
    ///
    /// # Errors
    ///
    /// Returns [`Initialization`](crate::error::DocumentStoreError::Initialization) when
    /// the attempt fails; the connection manager decides whether to retry.
    async fn connect(
        &self,
        uri: &str,
        options: &TransportOptions,
    ) -> DocumentStoreResult<Self::Backend>;
}
