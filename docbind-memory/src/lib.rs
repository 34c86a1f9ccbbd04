//! In-memory store backend for docbind.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` and
//! `StoreConnector` traits. It is meant for development and tests: it behaves like the
//! document database the layer targets where the layer can observe it.
//!
//! # Features
//!
//! - **Store-assigned ids** - Records without an `_id` receive a fresh `ObjectId`
//! - **Unique indexes** - Duplicate values are rejected as persistence errors
//! - **Text indexes** - Word-based matching over the indexed fields
//! - **Reconnects** - Handles from one connector share their data across close and connect
//!
//! # Quick Start
//!
//! ```ignore
//! use docbind::prelude::*;
//! use docbind::memory::InMemoryConnector;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = ConnectionManager::new(InMemoryConnector::new());
//!     manager.connect(&ConnectionConfig::new("memory://app")).await?;
//!
//!     let users = CollectionFactory::<_, User>::new(&manager);
//!     users.create_indexes().await?;
//!
//!     manager.close(false).await?;
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docbind_memory;

mod evaluator;
pub mod store;

pub use store::{InMemoryConnector, InMemoryStore, MEMORY_SCHEME};
