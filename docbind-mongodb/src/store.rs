use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use bson::{Bson, Document as BsonDocument, doc, oid::ObjectId};
use mongodb::{
    Client, Collection as MongoCollection, Database, IndexModel,
    event::{EventHandler, sdam::SdamEvent},
    options::{ClientOptions, IndexOptions, Tls, TlsOptions},
};
use parking_lot::Mutex;
use tracing::{debug, info};

use docbind_core::{
    backend::{StoreBackend, StoreConnector},
    config::TransportOptions,
    document::ID_FIELD,
    error::{DocumentStoreError, DocumentStoreResult},
    index::{IndexKind, IndexSpec},
    query::{DocumentCursor, SearchQuery},
};


/// Last heartbeat outcome per server, fed by the driver's SDAM events.
#[derive(Debug, Default)]
struct Reachability {
    servers: Mutex<HashMap<String, bool>>,
}

impl Reachability {
    fn record(&self, server: String, reachable: bool) {
        self.servers.lock().insert(server, reachable);
    }

    /// `true` until a heartbeat has failed, then while any server answers its heartbeats.
    fn is_reachable(&self) -> bool {
        let servers = self.servers.lock();
        servers.is_empty() || servers.values().any(|reachable| *reachable)
    }

    fn observe(self: &Arc<Self>, options: &mut ClientOptions) {
        let reachability = self.clone();

        options.sdam_event_handler = Some(EventHandler::callback(move |event: SdamEvent| match event {
            SdamEvent::ServerHeartbeatSucceeded(event) => {
                reachability.record(event.server_address.to_string(), true)
            }
            SdamEvent::ServerHeartbeatFailed(event) => {
                reachability.record(event.server_address.to_string(), false)
            }
            _ => {}
        }));
    }
}

/// A live connection to one MongoDB database.
///
/// [`StoreBackend::is_connected`] is `false` once the store is closed, and while every
/// known server fails its heartbeats.
#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: Database,
    connected: AtomicBool,
    reachability: Arc<Reachability>,
}

impl MongoDbStore {
    /// Wraps an existing client. Server heartbeats are not observed, so only `close`
    /// affects [`StoreBackend::is_connected`].
    pub fn new(client: Client, database: Database) -> Self {
        Self::observed(client, database, Arc::default())
    }

    fn observed(client: Client, database: Database, reachability: Arc<Reachability>) -> Self {
        Self {
            client,
            database,
            connected: AtomicBool::new(true),
            reachability,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<BsonDocument> {
        self.database.collection(collection_name)
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn insert_document(&self, collection: &str, document: BsonDocument) -> DocumentStoreResult<ObjectId> {
        let result = self.get_collection(collection)
            .insert_one(document)
            .await
            .map_err(|e| DocumentStoreError::Persistence(e.to_string()))?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| DocumentStoreError::Persistence(format!(
                "expected an ObjectId for the record inserted into {collection}, got {}",
                result.inserted_id
            )))
    }

    async fn upsert_document(&self, collection: &str, id: &ObjectId, mut document: BsonDocument) -> DocumentStoreResult<()> {
        document.insert(ID_FIELD, *id);

        self.get_collection(collection)
            .replace_one(doc! { ID_FIELD: *id }, document)
            .upsert(true)
            .await
            .map_err(|e| DocumentStoreError::Persistence(e.to_string()))?;

        Ok(())
    }

    async fn get_document(&self, collection: &str, id: &ObjectId) -> DocumentStoreResult<Option<BsonDocument>> {
        self.get_collection(collection)
            .find_one(doc! { ID_FIELD: *id })
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))
    }

    async fn create_indexes(&self, collection: &str, indexes: Vec<IndexSpec>) -> DocumentStoreResult<()> {
        let result = self.get_collection(collection)
            .create_indexes(indexes.iter().map(index_model))
            .await
            .map_err(|e| DocumentStoreError::Index(e.to_string()))?;

        debug!(collection, indexes = ?result.index_names, "mongodb indexes created");

        Ok(())
    }

    async fn search(&self, collection: &str, query: SearchQuery) -> DocumentStoreResult<DocumentCursor> {
        Ok(
            self.get_collection(collection)
                .aggregate(search_pipeline(&query))
                .await
                .map_err(|e| DocumentStoreError::Backend(e.to_string()))?
                .map_err(|e| DocumentStoreError::Backend(e.to_string()))
                .boxed()
        )
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.reachability.is_reachable()
    }

    async fn close(&self, force: bool) -> DocumentStoreResult<()> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        self.client
            .clone()
            .shutdown()
            .immediate(force)
            .await;

        info!(force, "mongodb client shut down");

        Ok(())
    }
}

/// Translates an index declaration into a driver index model.
fn index_model(index: &IndexSpec) -> IndexModel {
    let (keys, options) = match &index.kind {
        IndexKind::Field { field, unique } => (
            doc! { field.clone(): 1 },
            IndexOptions::builder()
                .name(index.name.clone())
                .unique(*unique)
                .build(),
        ),
        IndexKind::Text { fields } => (
            fields
                .iter()
                .map(|(field, _)| (field.clone(), Bson::from("text")))
                .collect::<BsonDocument>(),
            IndexOptions::builder()
                .name(index.name.clone())
                .weights(
                    fields
                        .iter()
                        .map(|(field, weight)| (field.clone(), Bson::from(*weight)))
                        .collect::<BsonDocument>()
                )
                .build(),
        ),
    };

    IndexModel::builder()
        .keys(keys)
        .options(options)
        .build()
}

/// Builds the aggregation pipeline for a text search: an optional `$text` match followed
/// by a projection of `_id` and the requested fields.
fn search_pipeline(query: &SearchQuery) -> Vec<BsonDocument> {
    let filter = match query.text_filter() {
        Some(text) => doc! { "$text": { "$search": text } },
        None => doc! {},
    };

    let projection = std::iter::once(ID_FIELD)
        .chain(query.projection.iter().map(String::as_str))
        .map(|field| (field.to_string(), Bson::from(1)))
        .collect::<BsonDocument>();

    vec![
        doc! { "$match": filter },
        doc! { "$project": projection },
    ]
}

/// Applies resolved transport options on top of the options parsed from the URI.
fn apply_transport(options: &mut ClientOptions, transport: &TransportOptions) {
    if let Some(tls) = &transport.tls {
        options.tls = Some(Tls::Enabled(
            TlsOptions::builder()
                .ca_file_path(tls.ca_file.clone())
                .allow_invalid_certificates(!tls.validate_certificates)
                .build()
        ));
    }

    if let Some(max_pool_size) = transport.max_pool_size {
        options.max_pool_size = Some(max_pool_size);
    }
}


/// Opens [`MongoDbStore`] connections.
///
/// The database is the default database of the connection string unless one is set with
/// [`MongoDbConnector::with_database`].
#[derive(Debug, Clone, Default)]
pub struct MongoDbConnector {
    database: Option<String>,
}

impl MongoDbConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `database` instead of the default database of the connection string.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }
}

#[async_trait]
impl StoreConnector for MongoDbConnector {
    type Backend = MongoDbStore;

    async fn connect(&self, uri: &str, transport: &TransportOptions) -> DocumentStoreResult<Self::Backend> {
        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;
        apply_transport(&mut options, transport);

        let reachability = Arc::new(Reachability::default());
        reachability.observe(&mut options);

        let client = Client::with_options(options)
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        // The driver connects lazily; a ping surfaces unreachable servers now.
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        let database = match &self.database {
            Some(name) => client.database(name),
            None => client
                .default_database()
                .ok_or_else(|| DocumentStoreError::Initialization(
                    "connection string does not name a database".to_string()
                ))?,
        };

        debug!(database = database.name(), "mongodb connection verified");

        Ok(MongoDbStore::observed(client, database, reachability))
    }
}
