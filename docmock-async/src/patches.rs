//! One-time adaptation of Store collection handles.
//!
//! Every collection handle a facade wraps gets a [`FacadePatch`] installed on its hook
//! seam: filters and sorts are string-normalized before the Store evaluates them, and
//! duplicate-key failures are enriched. Cached handles are shared between facades, so
//! adapted handles are tracked in a registry keyed by handle identity. Entries hold weak
//! references and die with their handle.

use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

use bson::Document;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::debug;

use docmock_core::{error::StoreError, hooks::CollectionHooks, store::StoreCollection};

use crate::{enrich::enrich_duplicate_key, normalize::StringNormalizer};

/// The hooks installed on every adapted collection handle.
#[derive(Debug, Default)]
pub struct FacadePatch;

impl CollectionHooks for FacadePatch {
    fn prepare_filter(&self, filter: Document) -> Document {
        StringNormalizer::normalize_document(&filter)
    }

    fn prepare_sort(&self, sort: Document) -> Document {
        StringNormalizer::normalize_document(&sort)
    }

    fn on_duplicate_key(&self, collection: &dyn StoreCollection, document: &Document, error: StoreError) -> StoreError {
        enrich_duplicate_key(collection, document, error)
    }
}

static ADAPTED: Lazy<Mutex<HashMap<usize, Weak<dyn StoreCollection>>>> = Lazy::new(|| Mutex::new(HashMap::new()));

fn identity(handle: &Arc<dyn StoreCollection>) -> usize {
    Arc::as_ptr(handle) as *const () as usize
}

/// Installs [`FacadePatch`] on `handle` unless it was adapted before.
///
/// Returns `true` when the patch was installed by this call.
pub fn adapt_collection(handle: &Arc<dyn StoreCollection>) -> bool {
    let mut adapted = ADAPTED.lock();

    let key = identity(handle);
    let known = adapted
        .get(&key)
        .and_then(Weak::upgrade)
        .is_some_and(|existing| Arc::ptr_eq(&existing, handle));

    if known {
        return false;
    }

    adapted.retain(|_, entry| entry.strong_count() > 0);
    adapted.insert(key, Arc::downgrade(handle));
    handle.install_hooks(Arc::new(FacadePatch));

    debug!(collection = %handle.full_name(), "adapted collection handle");
    true
}

/// Whether `handle` has been adapted.
pub fn is_adapted(handle: &Arc<dyn StoreCollection>) -> bool {
    ADAPTED
        .lock()
        .get(&identity(handle))
        .and_then(Weak::upgrade)
        .is_some_and(|existing| Arc::ptr_eq(&existing, handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmock_core::store::StoreClient;
    use docmock_memory::MemoryClient;

    fn handle(name: &str) -> Arc<dyn StoreCollection> {
        MemoryClient::new()
            .get_database("patches", None)
            .unwrap()
            .get_collection(name, None)
            .unwrap()
    }

    #[test]
    fn test_adapts_once() {
        let handle = handle("once");

        assert!(!is_adapted(&handle));
        assert!(adapt_collection(&handle));
        assert!(!adapt_collection(&handle));
        assert!(is_adapted(&handle));
        assert_eq!(handle.installed_hooks(), 1);
    }
}
