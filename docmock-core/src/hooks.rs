//! Interception seam on Store collection handles.
//!
//! A collection handle runs every installed [`CollectionHooks`] at three internal points:
//! before evaluating a filter, before sorting a dataset, and after a uniqueness check has
//! rejected a write. Hooks run in installation order. Installing the same hook twice runs
//! it twice, so callers that adapt handles are responsible for installing at most once.

use std::fmt::Debug;

use bson::Document;

use crate::{error::StoreError, store::StoreCollection};

pub trait CollectionHooks: Send + Sync + Debug {
    /// Rewrites a filter before the Store evaluates it.
    fn prepare_filter(&self, filter: Document) -> Document {
        filter
    }

    /// Rewrites a sort specification before the Store applies it.
    fn prepare_sort(&self, sort: Document) -> Document {
        sort
    }

    /// Replaces the duplicate-key failure raised for `document`.
    ///
    /// Called without any collection lock held, so implementations may query `collection`.
    fn on_duplicate_key(
        &self,
        _collection: &dyn StoreCollection,
        _document: &Document,
        error: StoreError,
    ) -> StoreError {
        error
    }
}
