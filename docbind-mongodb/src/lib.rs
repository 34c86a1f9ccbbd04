//! MongoDB backend implementation for docbind.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` and
//! `StoreConnector` traits.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docbind = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Features
//!
//! - **Managed transport** - TLS with a CA file and a single pooled connection in production
//! - **Store-assigned ids** - Inserts return the `ObjectId` generated for the record
//! - **Indexing** - Unique field indexes and weighted text indexes
//! - **Text search** - Aggregation pipelines with `$text` and a projection, returned as a stream
//!
//! # Example
//!
//! ```ignore
//! use docbind::{config::ConnectionConfig, connection::ConnectionManager, mongodb::MongoDbConnector};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConnectionConfig::builder("mongodb://localhost:27017/app")
//!         .retry_wait_seconds(2)
//!         .build();
//!
//!     let manager = ConnectionManager::new(MongoDbConnector::new());
//!     manager.connect(&config).await?;
//!     manager.close(false).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docbind_mongodb;

pub mod store;

pub use store::{MongoDbConnector, MongoDbStore};
