//! A thin mapping layer between application types and a document database.
//!
//! This crate is the core of the docbind project and provides:
//!
//! - **Connection management** ([`connection`]) - One live handle per manager, bounded retry, idempotent close
//! - **Configuration** ([`config`]) - Connection parameters and the transport options derived from them
//! - **Store backend abstraction** ([`backend`]) - Traits implemented by database drivers
//! - **Document traits** ([`document`]) - Exclusion rules, computed fields, storage and display forms
//! - **Collection factories** ([`collection`]) - Typed per-entity access: build, save, index, search
//! - **Indexes and searches** ([`index`], [`query`]) - Declarative index specs and text search queries
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use docbind::prelude::*;
//! use docbind::memory::InMemoryConnector;
//!
//! let manager = ConnectionManager::new(InMemoryConnector::new());
//! manager.connect(&ConnectionConfig::new("memory://app")).await?;
//!
//! let teams = CollectionFactory::<_, Team>::new(&manager);
//! teams.create_indexes().await?;
//!
//! let mut team = Team { name: "core".into(), ..Default::default() };
//! team.save(&teams).await?;
//! println!("{}", team.to_display_form()?);
//!
//! manager.close(false).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docbind_core;

pub mod backend;
pub mod collection;
pub mod config;
pub mod connection;
pub mod document;
pub mod error;
pub mod index;
pub mod query;
