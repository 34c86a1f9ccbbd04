//! In-memory storage implementation.
//!
//! Records are kept as BSON documents in ordered maps behind an async-aware read-write
//! lock. The store emulates the database behaviours the mapping layer depends on:
//! store-assigned ids, unique indexes, text indexes and closed handles.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use async_trait::async_trait;
use futures::{StreamExt, stream::iter};
use mea::rwlock::RwLock;
use bson::{Bson, Document as BsonDocument, oid::ObjectId};
use tracing::debug;

use docbind_core::{
    backend::{StoreBackend, StoreConnector},
    config::TransportOptions,
    document::ID_FIELD,
    error::{DocumentStoreError, DocumentStoreResult},
    index::{IndexKind, IndexSpec},
    query::{DocumentCursor, SearchQuery},
};

use crate::evaluator::{TextEvaluator, has_duplicates, unique_violation};

/// URI scheme accepted by [`InMemoryConnector`].
pub const MEMORY_SCHEME: &str = "memory://";

/// Records keyed by the hex form of their id, so iteration follows insertion order.
type CollectionMap = BTreeMap<String, BsonDocument>;

#[derive(Debug, Default)]
struct CollectionState {
    documents: CollectionMap,
    indexes: Vec<IndexSpec>,
}

type StoreMap = HashMap<String, CollectionState>;


/// Thread-safe in-memory document storage backend.
///
/// Each value is one connection handle. Handles created by [`InMemoryStore::reopen`]
/// (which is what [`InMemoryConnector`] does on every connect) share the same data but
/// have their own connected flag, so closing one handle leaves the data in place for
/// the next connection.
///
/// # Example
///
/// ```ignore
/// use docbind_memory::InMemoryStore;
/// use docbind::backend::StoreBackend;
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// let id = store.insert_document("users", doc! { "name": "Alice" }).await?;
/// assert!(store.get_document("users", &id).await?.is_some());
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryStore {
    /// collection_name -> documents and declared indexes
    store: Arc<RwLock<StoreMap>>,
    connected: Arc<AtomicBool>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates a new, empty and connected store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
            connected: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Opens a new handle on the same data.
    pub fn reopen(&self) -> Self {
        Self {
            store: self.store.clone(),
            connected: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Names of the indexes declared on `collection`, in declaration order.
    pub async fn index_names(&self, collection: &str) -> Vec<String> {
        self.store
            .read()
            .await
            .get(collection)
            .map(|state| {
                state
                    .indexes
                    .iter()
                    .map(|index| index.name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of records in `collection`.
    pub async fn count(&self, collection: &str) -> usize {
        self.store
            .read()
            .await
            .get(collection)
            .map_or(0, |state| state.documents.len())
    }

    fn ensure_open(&self) -> DocumentStoreResult<()> {
        match self.connected.load(Ordering::SeqCst) {
            true => Ok(()),
            false => Err(DocumentStoreError::Backend("store handle is closed".to_string())),
        }
    }

    fn check_unique(
        state: &CollectionState,
        collection: &str,
        key: &str,
        candidate: &BsonDocument,
    ) -> DocumentStoreResult<()> {
        let others = state
            .documents
            .iter()
            .filter(|(other, _)| other.as_str() != key)
            .map(|(_, document)| document);

        match unique_violation(&state.indexes, others, candidate) {
            Some((index, value)) => Err(DocumentStoreError::Persistence(format!(
                "duplicate key in collection {collection}, index {index}: {value}"
            ))),
            None => Ok(()),
        }
    }

    fn declare_index(state: &mut CollectionState, collection: &str, index: IndexSpec) -> DocumentStoreResult<()> {
        if let Some(existing) = state.indexes.iter().find(|existing| existing.name == index.name) {
            return match existing == &index {
                true => Ok(()),
                false => Err(DocumentStoreError::Index(format!(
                    "index {} already exists on {collection} with different options",
                    index.name
                ))),
            };
        }

        if index.is_text() && state.indexes.iter().any(IndexSpec::is_text) {
            return Err(DocumentStoreError::Index(format!(
                "collection {collection} already has a text index"
            )));
        }

        if let IndexKind::Field { field, unique: true } = &index.kind {
            if has_duplicates(state.documents.values(), field) {
                return Err(DocumentStoreError::Index(format!(
                    "cannot create unique index {} on {collection}: duplicate values for {field}",
                    index.name
                )));
            }
        }

        state.indexes.push(index);

        Ok(())
    }
}


#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn insert_document(&self, collection: &str, mut document: BsonDocument) -> DocumentStoreResult<ObjectId> {
        self.ensure_open()?;

        let id = match document.get(ID_FIELD) {
            Some(Bson::ObjectId(id)) => *id,
            _ => ObjectId::new(),
        };
        let key = id.to_hex();
        document.insert(ID_FIELD, id);

        let mut store = self.store.write().await;
        let state = store
            .entry(collection.to_string())
            .or_default();

        if state.documents.contains_key(&key) {
            return Err(DocumentStoreError::Persistence(format!(
                "document {key} already exists in collection {collection}"
            )));
        }
        Self::check_unique(state, collection, &key, &document)?;

        state.documents.insert(key, document);

        Ok(id)
    }

    async fn upsert_document(&self, collection: &str, id: &ObjectId, mut document: BsonDocument) -> DocumentStoreResult<()> {
        self.ensure_open()?;

        let key = id.to_hex();
        document.insert(ID_FIELD, *id);

        let mut store = self.store.write().await;
        let state = store
            .entry(collection.to_string())
            .or_default();

        Self::check_unique(state, collection, &key, &document)?;

        state.documents.insert(key, document);

        Ok(())
    }

    async fn get_document(&self, collection: &str, id: &ObjectId) -> DocumentStoreResult<Option<BsonDocument>> {
        self.ensure_open()?;

        Ok(
            self.store
                .read()
                .await
                .get(collection)
                .and_then(|state| state.documents.get(&id.to_hex()))
                .cloned()
        )
    }

    async fn create_indexes(&self, collection: &str, indexes: Vec<IndexSpec>) -> DocumentStoreResult<()> {
        self.ensure_open()?;

        let mut store = self.store.write().await;
        let state = store
            .entry(collection.to_string())
            .or_default();

        for index in indexes {
            Self::declare_index(state, collection, index)?;
        }

        Ok(())
    }

    async fn search(&self, collection: &str, query: SearchQuery) -> DocumentStoreResult<DocumentCursor> {
        self.ensure_open()?;

        let store = self.store.read().await;
        let Some(state) = store.get(collection) else {
            return Ok(iter(Vec::new()).boxed());
        };

        let evaluator = match query.text_filter() {
            Some(text) => Some(
                state
                    .indexes
                    .iter()
                    .find_map(|index| TextEvaluator::new(index, text))
                    .ok_or_else(|| DocumentStoreError::Backend(format!(
                        "text index required for text search on {collection}"
                    )))?,
            ),
            None => None,
        };

        let hits = state
            .documents
            .values()
            .filter(|document| {
                evaluator
                    .as_ref()
                    .is_none_or(|evaluator| evaluator.matches(document))
            })
            .map(|document| project(document, &query.projection))
            .map(Ok)
            .collect::<Vec<_>>();

        debug!(collection, hits = hits.len(), "in-memory search");

        Ok(iter(hits).boxed())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self, force: bool) -> DocumentStoreResult<()> {
        // No in-flight work to abandon, so `force` only shows up in the log.
        if self.connected.swap(false, Ordering::SeqCst) {
            debug!(force, "in-memory store handle closed");
        }

        Ok(())
    }
}

fn project(document: &BsonDocument, fields: &[String]) -> BsonDocument {
    std::iter::once(ID_FIELD)
        .chain(fields.iter().map(String::as_str))
        .filter_map(|field| {
            document
                .get(field)
                .map(|value| (field.to_string(), value.clone()))
        })
        .collect()
}


/// Connector producing [`InMemoryStore`] handles that share one data set.
///
/// Accepts URIs of the form `memory://<anything>`; transport options are ignored.
///
/// # Example
///
/// ```ignore
/// use docbind::{connection::ConnectionManager, config::ConnectionConfig, memory::InMemoryConnector};
///
/// let manager = ConnectionManager::new(InMemoryConnector::new());
/// manager.connect(&ConnectionConfig::new("memory://app")).await?;
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryConnector {
    store: InMemoryStore,
}

impl InMemoryConnector {
    /// Creates a connector over a fresh, empty data set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a connector over the data of an existing store.
    pub fn with_store(store: &InMemoryStore) -> Self {
        Self { store: store.reopen() }
    }
}

#[async_trait]
impl StoreConnector for InMemoryConnector {
    type Backend = InMemoryStore;

    async fn connect(&self, uri: &str, options: &TransportOptions) -> DocumentStoreResult<Self::Backend> {
        if !uri.starts_with(MEMORY_SCHEME) {
            return Err(DocumentStoreError::Initialization(format!(
                "unsupported connection string for the in-memory store: {uri}"
            )));
        }

        if !options.is_default() {
            debug!(?options, "in-memory store ignores transport options");
        }

        Ok(self.store.reopen())
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use futures::TryStreamExt;

    use super::*;

    async fn collect(cursor: DocumentCursor) -> Vec<BsonDocument> {
        cursor.try_collect().await.unwrap()
    }

    #[tokio::test]
    async fn insert_assigns_an_id() {
        let store = InMemoryStore::new();

        let id = store.insert_document("users", doc! { "name": "Ada" }).await.unwrap();
        let stored = store.get_document("users", &id).await.unwrap().unwrap();

        assert_eq!(stored.get_object_id(ID_FIELD).ok(), Some(id));
        assert_eq!(stored.get_str("name").ok(), Some("Ada"));
    }

    #[tokio::test]
    async fn upsert_inserts_then_replaces() {
        let store = InMemoryStore::new();
        let id = ObjectId::new();

        store.upsert_document("users", &id, doc! { "name": "Ada" }).await.unwrap();
        store.upsert_document("users", &id, doc! { "name": "Grace" }).await.unwrap();

        let stored = store.get_document("users", &id).await.unwrap().unwrap();
        assert_eq!(stored.get_str("name").ok(), Some("Grace"));
        assert_eq!(store.count("users").await, 1);
    }

    #[tokio::test]
    async fn unique_index_rejects_duplicates() {
        let store = InMemoryStore::new();
        store.create_indexes("users", vec![IndexSpec::unique("email")]).await.unwrap();

        let id = store.insert_document("users", doc! { "email": "a@x.io" }).await.unwrap();
        let err = store
            .insert_document("users", doc! { "email": "a@x.io" })
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentStoreError::Persistence(_)));

        // Replacing a record with its own value is not a conflict.
        store.upsert_document("users", &id, doc! { "email": "a@x.io", "n": 2 }).await.unwrap();
    }

    #[tokio::test]
    async fn index_declaration_is_idempotent() {
        let store = InMemoryStore::new();
        let indexes = vec![IndexSpec::unique("email"), IndexSpec::text_over("TextIndex", ["name"])];

        store.create_indexes("users", indexes.clone()).await.unwrap();
        store.create_indexes("users", indexes).await.unwrap();

        assert_eq!(store.index_names("users").await, vec!["email_1", "TextIndex"]);
    }

    #[tokio::test]
    async fn conflicting_index_declarations_fail() {
        let store = InMemoryStore::new();
        store.create_indexes("users", vec![IndexSpec::text_over("TextIndex", ["name"])]).await.unwrap();

        let err = store
            .create_indexes("users", vec![IndexSpec::text_over("TextIndex", ["email"])])
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentStoreError::Index(_)));

        let err = store
            .create_indexes("users", vec![IndexSpec::text_over("OtherText", ["email"])])
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentStoreError::Index(_)));
    }

    #[tokio::test]
    async fn unique_index_over_duplicates_fails() {
        let store = InMemoryStore::new();
        store.insert_document("users", doc! { "email": "a@x.io" }).await.unwrap();
        store.insert_document("users", doc! { "email": "a@x.io" }).await.unwrap();

        let err = store
            .create_indexes("users", vec![IndexSpec::unique("email")])
            .await
            .unwrap_err();

        assert!(matches!(err, DocumentStoreError::Index(_)));
        assert!(store.index_names("users").await.is_empty());
    }

    #[tokio::test]
    async fn search_filters_and_projects() {
        let store = InMemoryStore::new();
        store.create_indexes("users", vec![IndexSpec::text_over("TextIndex", ["name"])]).await.unwrap();
        store.insert_document("users", doc! { "name": "Ada Lovelace", "email": "ada@x.io", "secret": 1 }).await.unwrap();
        store.insert_document("users", doc! { "name": "Grace Hopper", "email": "grace@x.io", "secret": 2 }).await.unwrap();

        let query = SearchQuery::builder().text("hopper").project("email").build();
        let hits = collect(store.search("users", query).await.unwrap()).await;

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].get_str("email").ok(), Some("grace@x.io"));
        assert!(hits[0].contains_key(ID_FIELD));
        assert!(!hits[0].contains_key("name"));
        assert!(!hits[0].contains_key("secret"));

        let everything = collect(store.search("users", SearchQuery::new()).await.unwrap()).await;
        assert_eq!(everything.len(), 2);
    }

    #[tokio::test]
    async fn text_search_requires_a_text_index() {
        let store = InMemoryStore::new();
        store.insert_document("users", doc! { "name": "Ada" }).await.unwrap();

        let query = SearchQuery::builder().text("ada").build();
        assert!(matches!(store.search("users", query).await, Err(DocumentStoreError::Backend(_))));

        let hits = collect(store.search("missing", SearchQuery::new()).await.unwrap()).await;
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn closed_handle_rejects_operations_but_keeps_data() {
        let connector = InMemoryConnector::new();
        let first = connector.connect("memory://test", &TransportOptions::default()).await.unwrap();
        let id = first.insert_document("users", doc! { "name": "Ada" }).await.unwrap();

        first.close(true).await.unwrap();
        first.close(true).await.unwrap();
        assert!(!first.is_connected());
        assert!(matches!(
            first.get_document("users", &id).await,
            Err(DocumentStoreError::Backend(_))
        ));

        let second = connector.connect("memory://test", &TransportOptions::default()).await.unwrap();
        assert!(second.is_connected());
        assert!(second.get_document("users", &id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn connector_rejects_foreign_schemes() {
        let err = InMemoryConnector::new()
            .connect("mongodb://localhost:27017", &TransportOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, DocumentStoreError::Initialization(_)));
    }
}
