//! Async driver facade for docmock.
//!
//! This crate wraps the synchronous Store handles from `docmock-core` in facades shaped like
//! an async document-database driver: clients, databases, collections and cursors whose
//! operations are awaited, cursor configuration that chains, and cursors that are
//! [`Stream`](futures::Stream)s.
//!
//! # Features
//!
//! - **Async-shaped API** - Store calls run to completion behind `async fn`s
//! - **Chaining cursors** - `cursor.skip(2).limit(2).sort(..)` configures before iteration
//! - **Driver identity** - Facades report the driver type they stand in for
//! - **Duplicate-key detail** - Failures carry `keyValue`/`keyPattern` like a real server
//! - **GridFS** - A bucket implementation that accepts the facades when integration is enabled
//!
//! Enable the `mongodb` feature to register the async driver's own types as masquerade
//! targets:
//!
//! ```toml
//! [dependencies]
//! docmock = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use docmock_async::{AsyncMockClient, CursorFacade};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = AsyncMockClient::new();
//!     let users = client.database("app")?.collection("users")?;
//!
//!     users.insert_many(vec![doc! { "name": "Alice" }, doc! { "name": "Bob" }]).await?;
//!
//!     let names = users
//!         .find(doc! {}, None)
//!         .sort(doc! { "name": -1 })
//!         .limit(1)
//!         .to_list(None)
//!         .await?;
//!
//!     println!("{names:?}");
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmock_async;

pub mod bridge;
pub mod build_info;
pub mod client;
pub mod collection;
pub mod cursor;
pub mod database;
pub mod enrich;
pub mod error;
pub mod gridfs;
pub mod masquerade;
pub mod node;
pub mod normalize;
pub mod patches;

pub use build_info::BuildInfo;
pub use client::{AsyncMockClient, AsyncMockClientBuilder};
pub use collection::AsyncMockCollection;
pub use cursor::{AsyncCommandCursor, AsyncCursor, AsyncLatentCommandCursor, CursorFacade, CursorState};
pub use database::AsyncMockDatabase;
pub use error::{FacadeError, FacadeResult};
pub use masquerade::Masquerade;
pub use node::{LoopBinding, Member};
