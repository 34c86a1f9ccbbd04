//! Collection handles and per-entity collection factories.
//!
//! - [`CollectionHandle`] - a named collection on a live backend, working with raw BSON
//! - [`CollectionFactory`] - the typed accessor for one [`Document`] type: builds
//!   instances from raw records, saves them, declares indexes and runs searches
//!
//! # Example
//!
//! ```ignore
//! use docbind::prelude::*;
//!
//! let users = CollectionFactory::<_, User>::new(&manager);
//! users.create_indexes().await?;
//!
//! let mut user = User::default();
//! user.create("Ada", "Lovelace", "ada@example.com", "admin", None, vec![], &users).await?;
//!
//! let mut cursor = users.search(Some("lovelace")).await?;
//! while let Some(hit) = cursor.try_next().await? {
//!     println!("{hit}");
//! }
//! ```

use bson::{Document as BsonDocument, oid::ObjectId};
use parking_lot::Mutex;
use std::{marker::PhantomData, sync::Arc};
use tracing::{debug, info};

use crate::{
    backend::{StoreBackend, StoreConnector},
    connection::ConnectionManager,
    document::{Document, DocumentExt},
    error::DocumentStoreResult,
    index::IndexSpec,
    query::{DocumentCursor, SearchQuery},
};

/// A named collection on a live backend.
///
/// Cheap to clone; clones share the backend handle.
#[derive(Debug)]
pub struct CollectionHandle<B: StoreBackend> {
    name: String,
    backend: Arc<B>,
}

impl<B: StoreBackend> Clone for CollectionHandle<B> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            backend: self.backend.clone(),
        }
    }
}

impl<B: StoreBackend> CollectionHandle<B> {
    /// Creates a new collection handle (internal use).
    pub(crate) fn new(name: String, backend: Arc<B>) -> Self {
        Self { name, backend }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the backend this collection lives on.
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Inserts a raw record and returns the id assigned by the store.
    pub async fn insert(&self, document: BsonDocument) -> DocumentStoreResult<ObjectId> {
        self.backend
            .insert_document(self.name(), document)
            .await
    }

    /// Replaces the raw record with the given id, inserting it if missing.
    pub async fn upsert(&self, id: &ObjectId, document: BsonDocument) -> DocumentStoreResult<()> {
        self.backend
            .upsert_document(self.name(), id, document)
            .await
    }

    /// Fetches a raw record by id.
    pub async fn get(&self, id: &ObjectId) -> DocumentStoreResult<Option<BsonDocument>> {
        self.backend
            .get_document(self.name(), id)
            .await
    }

    /// Declares indexes on this collection.
    pub async fn create_indexes(&self, indexes: Vec<IndexSpec>) -> DocumentStoreResult<()> {
        self.backend
            .create_indexes(self.name(), indexes)
            .await
    }

    /// Runs a text search on this collection.
    pub async fn search(&self, query: SearchQuery) -> DocumentStoreResult<DocumentCursor> {
        self.backend
            .search(self.name(), query)
            .await
    }
}

/// Typed accessor for the collection of one document type.
///
/// The factory is bound to `D::collection_name()` and `D::searchable_fields()`. Its only
/// state is the collection handle, resolved from the connection manager on first use and
/// resolved again when the manager's handle changes (after a close and reconnect).
///
/// # Type Parameters
///
/// * `'a` - Lifetime of the borrowed connection manager
/// * `C` - The connector used by the manager
/// * `D` - The document type
pub struct CollectionFactory<'a, C: StoreConnector, D: Document> {
    manager: &'a ConnectionManager<C>,
    cached: Mutex<Option<CollectionHandle<C::Backend>>>,
    _marker: PhantomData<D>,
}

impl<'a, C: StoreConnector, D: Document> CollectionFactory<'a, C, D> {
    /// Creates a factory for `D` using the connection owned by `manager`.
    pub fn new(manager: &'a ConnectionManager<C>) -> Self {
        Self {
            manager,
            cached: Mutex::new(None),
            _marker: PhantomData,
        }
    }

    /// Returns the name of the bound collection.
    pub fn name(&self) -> &'static str {
        D::collection_name()
    }

    /// Returns the fields eligible for text search.
    pub fn searchable_fields(&self) -> &'static [&'static str] {
        D::searchable_fields()
    }

    /// Returns the collection handle, resolving it from the current connection if needed.
    ///
    /// # Errors
    ///
    /// [`DocumentStoreError::NotInitialized`](crate::error::DocumentStoreError::NotInitialized)
    /// when the manager is not connected.
    pub fn collection(&self) -> DocumentStoreResult<CollectionHandle<C::Backend>> {
        let backend = self.manager.handle()?;
        let mut cached = self.cached.lock();

        match cached.as_ref() {
            Some(handle) if Arc::ptr_eq(handle.backend(), &backend) => Ok(handle.clone()),
            _ => {
                debug!(collection = self.name(), "resolving collection handle");
                let handle = CollectionHandle::new(self.name().to_string(), backend);
                *cached = Some(handle.clone());
                Ok(handle)
            }
        }
    }

    /// Builds a document from a raw record.
    pub fn build(&self, raw: BsonDocument) -> DocumentStoreResult<D> {
        D::from_storage_form(raw)
    }

    /// Saves `document`: inserts it and records the assigned id when it has none,
    /// replaces the stored record by id otherwise.
    pub async fn save(&self, document: &mut D) -> DocumentStoreResult<()> {
        let collection = self.collection()?;
        let storage = document.to_storage_form()?;

        match document.id().copied() {
            Some(id) => {
                collection.upsert(&id, storage).await?;
                debug!(collection = self.name(), %id, "document updated");
            }
            None => {
                let id = collection.insert(storage).await?;
                document.set_id(id);
                debug!(collection = self.name(), %id, "document inserted");
            }
        }

        Ok(())
    }

    /// Fetches and builds the document with the given id.
    pub async fn find_by_id(&self, id: &ObjectId) -> DocumentStoreResult<Option<D>> {
        self.collection()?
            .get(id)
            .await?
            .map(|raw| self.build(raw))
            .transpose()
    }

    /// Declares the indexes returned by `D::indexes()`.
    ///
    /// Safe to call repeatedly.
    pub async fn create_indexes(&self) -> DocumentStoreResult<()> {
        let indexes = D::indexes();
        if indexes.is_empty() {
            return Ok(());
        }

        let names = indexes
            .iter()
            .map(|index| index.name.clone())
            .collect::<Vec<_>>();

        self.collection()?
            .create_indexes(indexes)
            .await?;

        info!(collection = self.name(), indexes = ?names, "indexes declared");

        Ok(())
    }

    /// Runs a text search and returns a lazy cursor over `_id` plus `D::search_projection()`.
    ///
    /// Empty or absent text returns every document of the collection.
    pub async fn search(&self, text: Option<&str>) -> DocumentStoreResult<DocumentCursor> {
        let query = SearchQuery::builder()
            .maybe_text(text)
            .project_all(D::search_projection().iter().copied())
            .build();

        self.collection()?
            .search(query)
            .await
    }
}
