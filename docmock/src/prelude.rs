//! Convenient re-exports of commonly used types from docmock.
//!
//! ```ignore
//! use docmock::prelude::*;
//! ```

pub use docmock_async::{
    AsyncCommandCursor, AsyncCursor, AsyncLatentCommandCursor, AsyncMockClient, AsyncMockClientBuilder,
    AsyncMockCollection, AsyncMockDatabase, BuildInfo, CursorFacade, CursorState, FacadeError, FacadeResult,
    Masquerade, Member,
};
pub use docmock_core::{
    command::Command,
    error::{DuplicateKeyDetail, StoreError, StoreResult},
    options::{
        CollectionOptions, DatabaseOptions, FindOptions, FindOneOptions, FindOneAndModifyOptions, IndexModel,
        IndexOptions, ReturnDocument, UpdateOptions, WriteModel,
    },
    store::{StoreClient, StoreCollection, StoreDatabase},
};
