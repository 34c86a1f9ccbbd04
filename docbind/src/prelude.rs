//! Convenient re-exports of commonly used types from docbind.
//!
//! ```ignore
//! use docbind::prelude::*;
//! ```
//!
//! This provides access to:
//! - Document traits and the `lenient` / `lenient_items` hydration helpers
//! - The connection manager and its configuration
//! - Collection factories, index declarations and search queries
//! - Error types

pub use docbind_core::{
    backend::{StoreBackend, StoreConnector},
    collection::{CollectionFactory, CollectionHandle},
    config::{ConnectionConfig, ConnectionConfigBuilder, TransportOptions},
    connection::{ConnectionManager, ConnectionState},
    document::{Document, DocumentExt, lenient, lenient_items},
    error::{DocumentStoreError, DocumentStoreResult},
    index::{IndexKind, IndexSpec},
    query::{DocumentCursor, SearchQuery},
};

pub use futures::TryStreamExt;
