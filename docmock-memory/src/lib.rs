//! In-memory document store simulator for docmock.
//!
//! This crate provides a synchronous, thread-safe implementation of the Store traits in
//! `docmock-core`. It keeps every database and collection in process memory and is meant
//! for tests that need deterministic document-database behaviour without a server.
//!
//! # Features
//!
//! - **Thread-safe access** - Handles are `Send + Sync`, backed by `parking_lot` locks
//! - **Driver-style filters** - Comparison, logical, array and existence operators
//! - **Updates** - `$set`, `$unset`, `$inc`, `$push`, `$addToSet`, `$rename`, `$setOnInsert`
//! - **Indexes** - Unique and sparse indexes with duplicate-key detection
//! - **Aggregation** - `$match`, `$sort`, `$skip`, `$limit`, `$project`, `$count`, `$lookup`
//! - **Hooks** - Collection handles run installed [`CollectionHooks`](docmock_core::hooks::CollectionHooks)
//!
//! # Quick Start
//!
//! ```ignore
//! use docmock_memory::MemoryClient;
//! use docmock_core::store::StoreClient;
//! use bson::doc;
//!
//! let client = MemoryClient::new();
//! let users = client.get_database("app", None)?.get_collection("users", None)?;
//!
//! users.insert_one(doc! { "name": "Alice" })?;
//! assert_eq!(users.count_documents(doc! { "name": "Alice" })?, 1);
//! ```
//!
//! Commands that are not simulated, such as `buildinfo`, fail with
//! [`StoreError::NotImplemented`](docmock_core::error::StoreError::NotImplemented).

#[allow(unused_extern_crates)]
extern crate self as docmock_memory;

pub mod aggregate;
pub mod client;
pub mod collection;
pub mod cursor;
pub mod database;
pub mod evaluator;
pub mod filter;
pub mod store;
pub mod update;

pub use client::{MemoryClient, MemoryClientBuilder};
pub use collection::MemoryCollection;
pub use database::MemoryDatabase;
pub use store::MemoryStore;
