//! Main docbind crate: a thin mapping layer between application types and a document
//! database, with a managed connection.
//!
//! This crate is the primary entry point. It re-exports the core types from
//! `docbind-core` and gives access to the available backends.
//!
//! # Features
//!
//! - **Managed connection** - One live handle per manager, bounded retries, idempotent close
//! - **Document mapping** - Storage and display forms, hidden and computed fields, lenient nested data
//! - **Collection factories** - Typed save, lookup, index declaration and text search per entity
//! - **Multiple backends** - In-memory for development and tests, MongoDB behind a feature
//!
//! # Quick Start
//!
//! ```ignore
//! use docbind::{prelude::*, memory::InMemoryConnector};
//! use bson::oid::ObjectId;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! pub struct Team {
//!     #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
//!     pub id: Option<ObjectId>,
//!     pub name: String,
//! }
//!
//! impl Document for Team {
//!     fn id(&self) -> Option<&ObjectId> { self.id.as_ref() }
//!     fn set_id(&mut self, id: ObjectId) { self.id = Some(id) }
//!     fn collection_name() -> &'static str { "teams" }
//!     fn searchable_fields() -> &'static [&'static str] { &["name"] }
//!     fn search_projection() -> &'static [&'static str] { &["name"] }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = ConnectionManager::new(InMemoryConnector::new());
//!     manager.connect(&ConnectionConfig::new("memory://app")).await?;
//!
//!     let teams = CollectionFactory::<_, Team>::new(&manager);
//!     teams.create_indexes().await?;
//!
//!     let mut team = Team { name: "core".into(), ..Default::default() };
//!     team.save(&teams).await?;
//!
//!     let hits = teams.search(Some("core")).await?.try_collect::<Vec<_>>().await?;
//!     println!("{hits:?}");
//!
//!     manager.close(false).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - [`mongodb`] - MongoDB backend (requires the `mongodb` feature)

pub mod prelude;

pub use docbind_core::{backend, collection, config, connection, document, error, index, query};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend.
pub mod memory {
    pub use docbind_memory::{InMemoryConnector, InMemoryStore, MEMORY_SCHEME};
}

/// MongoDB storage backend.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docbind_mongodb::{MongoDbConnector, MongoDbStore};
}
