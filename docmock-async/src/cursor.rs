//! Async cursor facades.
//!
//! Three facades wrap Store cursors:
//!
//! - [`AsyncCursor`] wraps a `find` cursor and supports configuration chaining, cloning
//!   and distinct.
//! - [`AsyncCommandCursor`] wraps a cursor whose documents were materialized up front
//!   (`list_indexes`).
//! - [`AsyncLatentCommandCursor`] wraps a cursor that computes its documents on the first
//!   pull (`aggregate`).
//!
//! All three are lazy, single-pass [`Stream`]s that end once the Store cursor runs dry.
//! The manual pull [`CursorFacade::next_document`] reports the end as
//! [`FacadeError::EndOfSequence`] instead.

use std::{
    pin::Pin,
    task::{Context, Poll},
};

use async_trait::async_trait;
use bson::{Bson, Document};
use futures::Stream;

use docmock_core::cursor::{MaterializedCursor, StoreCursor, StoreQueryCursor};

use crate::{
    bridge::{bridge_async, chaining_bridged},
    error::{FacadeError, FacadeResult},
    masquerade::{Masquerade, targets},
};

/// Lifecycle of a cursor facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// No document pulled yet; configuration calls shape the result set.
    Configuring,
    /// At least one document was pulled.
    Iterating,
    /// The sequence ended, failed or the cursor was closed.
    Exhausted,
}

/// State shared by every cursor facade.
#[derive(Debug)]
struct CursorCore<C: StoreCursor + ?Sized> {
    cursor: Box<C>,
    state: CursorState,
}

impl<C: StoreCursor + ?Sized> CursorCore<C> {
    fn new(cursor: Box<C>) -> Self {
        Self {
            cursor,
            state: CursorState::Configuring,
        }
    }

    fn pull(&mut self) -> FacadeResult<Document> {
        if self.state == CursorState::Exhausted {
            return Err(FacadeError::EndOfSequence);
        }

        match self.cursor.next_document() {
            Some(Ok(document)) => {
                self.state = CursorState::Iterating;
                Ok(document)
            }
            Some(Err(err)) => {
                self.state = CursorState::Exhausted;
                Err(err.into())
            }
            None => {
                self.state = CursorState::Exhausted;
                Err(FacadeError::EndOfSequence)
            }
        }
    }

    fn drain(&mut self, length: Option<usize>) -> FacadeResult<Vec<Document>> {
        let mut documents = Vec::new();

        while length.is_none_or(|length| documents.len() < length) {
            match self.pull() {
                Ok(document) => documents.push(document),
                Err(FacadeError::EndOfSequence) => break,
                Err(err) => return Err(err),
            }
        }

        Ok(documents)
    }

    fn close(&mut self) {
        self.cursor.close();
        self.state = CursorState::Exhausted;
    }

    fn poll_pull(&mut self) -> Poll<Option<FacadeResult<Document>>> {
        match self.pull() {
            Ok(document) => Poll::Ready(Some(Ok(document))),
            Err(FacadeError::EndOfSequence) => Poll::Ready(None),
            Err(err) => Poll::Ready(Some(Err(err))),
        }
    }
}

/// Operations shared by every cursor facade.
#[async_trait]
pub trait CursorFacade: Send {
    /// Pulls the next document, failing with [`FacadeError::EndOfSequence`] at the end.
    async fn next_document(&mut self) -> FacadeResult<Document>;

    /// Drains the remaining documents from the current position, at most `length` of them.
    async fn to_list(&mut self, length: Option<usize>) -> FacadeResult<Vec<Document>>;

    /// Releases the Store cursor. Closing twice is a no-op.
    fn close(&mut self);

    fn state(&self) -> CursorState;

    /// Whether the Store cursor may still yield documents.
    fn alive(&self) -> bool;
}

macro_rules! cursor_facade {
    ($facade:ident, $target:expr) => {
        #[async_trait]
        impl CursorFacade for $facade {
            async fn next_document(&mut self) -> FacadeResult<Document> {
                self.core.pull()
            }

            async fn to_list(&mut self, length: Option<usize>) -> FacadeResult<Vec<Document>> {
                self.core.drain(length)
            }

            fn close(&mut self) {
                self.core.close();
            }

            fn state(&self) -> CursorState {
                self.core.state
            }

            fn alive(&self) -> bool {
                self.core.state != CursorState::Exhausted && self.core.cursor.alive()
            }
        }

        impl Stream for $facade {
            type Item = FacadeResult<Document>;

            fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
                self.get_mut().core.poll_pull()
            }
        }

        impl Masquerade for $facade {
            const TARGET: &'static str = $target;
        }
    };
}

/// Facade over a `find` cursor.
#[derive(Debug)]
pub struct AsyncCursor {
    core: CursorCore<dyn StoreQueryCursor>,
}

impl AsyncCursor {
    pub fn new(cursor: Box<dyn StoreQueryCursor>) -> Self {
        Self {
            core: CursorCore::new(cursor),
        }
    }

    /// The wrapped Store cursor.
    pub fn delegate(&self) -> &dyn StoreQueryCursor {
        self.core.cursor.as_ref()
    }

    fn delegate_mut(&mut self) -> &mut dyn StoreQueryCursor {
        self.core.cursor.as_mut()
    }

    /// Distinct values of `key` over the cursor's query.
    pub async fn distinct(&self, key: &str) -> FacadeResult<Vec<Bson>> {
        let delegate = self.delegate();
        bridge_async(|| delegate.distinct(key)).await
    }

    /// Restarts the cursor from the beginning with the same configuration.
    pub fn rewind(&mut self) -> &mut Self {
        self.core.cursor.rewind();
        self.core.state = CursorState::Configuring;
        self
    }
}

chaining_bridged! {
    AsyncCursor => delegate_mut as StoreQueryCursor, table CHAINING_METHODS;
    "add_option" => fn add_option(mask: i32);
    "allow_disk_use" => fn allow_disk_use(allow: bool);
    "batch_size" => fn batch_size(size: u32);
    "collation" => fn collation(collation: Document);
    "comment" => fn comment(comment: Bson);
    "hint" => fn hint(hint: Bson);
    /// Caps the number of returned documents; `0` means no limit.
    "limit" => fn limit(limit: i64);
    "max_await_time_ms" => fn max_await_time_ms(millis: u64);
    "max_scan" => fn max_scan(count: u64);
    "max_time_ms" => fn max_time_ms(millis: u64);
    "max" => fn max(spec: Document);
    "min" => fn min(spec: Document);
    "remove_option" => fn remove_option(mask: i32);
    "skip" => fn skip(skip: u64);
    /// Adds sort keys after any already set.
    "sort" => fn sort(spec: Document);
    "where" => fn where_clause(code: String);
}

impl Clone for AsyncCursor {
    /// An independent cursor with the same query parameters, positioned at the start.
    fn clone(&self) -> Self {
        Self::new(self.core.cursor.clone_cursor())
    }
}

cursor_facade!(AsyncCursor, targets::CURSOR);

/// Facade over a cursor of pre-materialized command results.
#[derive(Debug)]
pub struct AsyncCommandCursor {
    core: CursorCore<dyn StoreCursor>,
}

impl AsyncCommandCursor {
    pub fn new(documents: Vec<Document>) -> Self {
        let cursor: Box<dyn StoreCursor> = Box::new(MaterializedCursor::new(documents));
        Self {
            core: CursorCore::new(cursor),
        }
    }

    pub fn delegate(&self) -> &dyn StoreCursor {
        self.core.cursor.as_ref()
    }
}

cursor_facade!(AsyncCommandCursor, targets::COMMAND_CURSOR);

/// Facade over a cursor that evaluates its command on the first pull.
#[derive(Debug)]
pub struct AsyncLatentCommandCursor {
    core: CursorCore<dyn StoreCursor>,
}

impl AsyncLatentCommandCursor {
    pub fn new(cursor: Box<dyn StoreCursor>) -> Self {
        Self {
            core: CursorCore::new(cursor),
        }
    }

    pub fn delegate(&self) -> &dyn StoreCursor {
        self.core.cursor.as_ref()
    }
}

cursor_facade!(AsyncLatentCommandCursor, targets::LATENT_COMMAND_CURSOR);
