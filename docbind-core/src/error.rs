//! Error types and result types for connection and document operations.
//!
//! Every fallible operation in this crate returns [`DocumentStoreResult<T>`].
//! The variants separate connection lifecycle failures from write, index and
//! conversion failures so callers can react to each kind on its own.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when talking to a document store.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Connecting gave up without any attempt reporting a failure.
    ///
    /// This usually means the connection parameters never allowed an attempt to run.
    #[error("Unable to connect to the database, please verify that your configuration is correct")]
    ConnectionUnavailable,
    /// Connecting gave up after every attempt failed.
    /// `source` holds the failure reported by the final attempt.
    #[error("Unable to connect to the database after {attempts} attempt(s): {source}")]
    Connection {
        attempts: u32,
        #[source]
        source: Box<DocumentStoreError>,
    },
    /// A single connection attempt failed (bad URI, unreachable server, unreadable certificate).
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// An operation needed the database handle before a connection was established.
    #[error("Database is not yet instantiated")]
    NotInitialized,
    /// The store rejected a write, e.g. because of a unique index violation.
    #[error("Persistence error: {0}")]
    Persistence(String),
    /// An index declaration was rejected by the store.
    #[error("Index error: {0}")]
    Index(String),
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl DocumentStoreError {
    /// Returns `true` for errors raised by the connection lifecycle.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            DocumentStoreError::ConnectionUnavailable
                | DocumentStoreError::Connection { .. }
                | DocumentStoreError::Initialization(_)
        )
    }
}

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}
