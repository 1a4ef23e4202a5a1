//! Synchronous Store cursors.

use std::{collections::VecDeque, fmt::Debug};

use bson::{Bson, Document};

use crate::error::StoreResult;

/// A synchronous, single-pass sequence of documents.
pub trait StoreCursor: Send + Debug {
    /// Pulls the next document; `None` once the sequence is exhausted or the cursor is closed.
    fn next_document(&mut self) -> Option<StoreResult<Document>>;

    /// Releases the cursor. Closing an already closed cursor is a no-op.
    fn close(&mut self);

    /// Whether more documents may still be pulled.
    fn alive(&self) -> bool;
}

/// A query cursor whose configuration can be changed until iteration starts.
///
/// Configuration calls made after the first pull follow the cursor's own rules; the
/// in-memory cursor keeps honouring `limit` but ignores options that would reshape an
/// already computed result set.
pub trait StoreQueryCursor: StoreCursor {
    fn add_option(&mut self, mask: i32);
    fn remove_option(&mut self, mask: i32);
    fn allow_disk_use(&mut self, allow: bool);
    fn batch_size(&mut self, size: u32);
    fn collation(&mut self, collation: Document);
    fn comment(&mut self, comment: Bson);
    fn hint(&mut self, hint: Bson);
    fn limit(&mut self, limit: i64);
    fn max_await_time_ms(&mut self, millis: u64);
    fn max_scan(&mut self, count: u64);
    fn max_time_ms(&mut self, millis: u64);
    fn max(&mut self, spec: Document);
    fn min(&mut self, spec: Document);
    fn skip(&mut self, skip: u64);
    fn sort(&mut self, spec: Document);
    fn where_clause(&mut self, code: String);

    /// Distinct values of `key` across the cursor's query, regardless of position.
    fn distinct(&self, key: &str) -> StoreResult<Vec<Bson>>;

    /// Rewinds to the start, keeping the configuration.
    fn rewind(&mut self);

    /// An independent cursor with the same configuration, positioned at the start.
    fn clone_cursor(&self) -> Box<dyn StoreQueryCursor>;
}

/// A finite cursor over documents that were materialized up front.
#[derive(Debug, Default)]
pub struct MaterializedCursor {
    documents: VecDeque<Document>,
    closed: bool,
}

impl MaterializedCursor {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents: documents.into(),
            closed: false,
        }
    }

    /// Number of documents not yet pulled.
    pub fn remaining(&self) -> usize {
        self.documents.len()
    }
}

impl StoreCursor for MaterializedCursor {
    fn next_document(&mut self) -> Option<StoreResult<Document>> {
        if self.closed {
            return None;
        }

        self.documents.pop_front().map(Ok)
    }

    fn close(&mut self) {
        self.closed = true;
        self.documents.clear();
    }

    fn alive(&self) -> bool {
        !self.closed && !self.documents.is_empty()
    }
}
