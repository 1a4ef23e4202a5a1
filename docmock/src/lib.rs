//! Main docmock crate: an async document-driver facade over an in-memory Store.
//!
//! This crate is the primary entry point. It re-exports the Store contract, the in-memory
//! Store and the async facades from their sub-crates.
//!
//! # Features
//!
//! - **Async driver shape** - Clients, databases, collections and cursors that are awaited
//! - **Deterministic storage** - Everything lives in process memory, nothing is persisted
//! - **Driver identity** - Facades report the driver types they stand in for
//! - **GridFS** - Buckets over the facades, enabled for a scope on demand
//!
//! # Quick Start
//!
//! ```ignore
//! use docmock::prelude::*;
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = AsyncMockClient::new();
//!     let users = client.database("app")?.collection("users")?;
//!
//!     users
//!         .create_index(IndexModel::with_options(
//!             doc! { "email": 1 },
//!             IndexOptions { unique: Some(true), ..Default::default() },
//!         ))
//!         .await?;
//!
//!     users.insert_one(doc! { "email": "alice@example.com" }).await?;
//!
//!     let err = users
//!         .insert_one(doc! { "email": "alice@example.com" })
//!         .await
//!         .unwrap_err();
//!     assert!(err.is_duplicate_key());
//!
//!     let everyone = users.find(doc! {}, None).to_list(None).await?;
//!     println!("{everyone:?}");
//!
//!     Ok(())
//! }
//! ```
//!
//! # Sharing a Store
//!
//! Facades over the same [`memory::MemoryClient`] see the same data:
//!
//! ```ignore
//! use std::sync::Arc;
//! use docmock::{prelude::*, memory::MemoryClient};
//!
//! let store: Arc<dyn StoreClient> = Arc::new(MemoryClient::new());
//! let first = AsyncMockClient::builder().store_client(store.clone()).build();
//! let second = AsyncMockClient::builder().store_client(store).build();
//! ```
//!
//! # GridFS
//!
//! ```ignore
//! use docmock::{prelude::*, gridfs::{GridFsBucket, enabled_gridfs_integration}};
//!
//! let _integration = enabled_gridfs_integration();
//! let bucket = GridFsBucket::new(&AsyncMockClient::new().database("files")?)?;
//! ```

pub mod prelude;

pub use docmock_core::{command, cursor as store_cursor, document, error, hooks, options, query, results, store};
pub use docmock_async::{bridge, build_info, client, collection, cursor, database, enrich, gridfs, masquerade, normalize, patches};

// Re-export BSON types for convenience
pub use bson;

/// In-memory Store implementation.
pub mod memory {
    pub use docmock_memory::{MemoryClient, MemoryClientBuilder, MemoryCollection, MemoryDatabase, MemoryStore};
}
