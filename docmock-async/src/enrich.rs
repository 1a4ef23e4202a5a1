//! Duplicate-key failure enrichment.
//!
//! The Store rejects duplicate keys without saying which index caused the rejection.
//! Drivers report `keyValue` and `keyPattern` for the violated unique index, and ODM
//! libraries rely on them, so the detail is reconstructed here by looking for an existing
//! document that collides with the rejected one on some unique index.

use bson::{Bson, Document};
use tracing::debug;

use docmock_core::{
    document::get_path,
    error::{DuplicateKeyDetail, StoreError},
    store::StoreCollection,
};

/// Message of an enriched duplicate-key failure.
pub const ENRICHED_MESSAGE: &str = "E11000 Duplicate Key Error";

/// Attaches `keyValue`/`keyPattern` detail to a duplicate-key failure raised for `document`.
///
/// Unique indexes are examined in declaration order. For each, the values of the key
/// pattern's fields are taken from `document` (missing fields read as `null`); a sparse
/// index whose values are all `null` is skipped. The first index for which the Store holds
/// a matching document explains the failure. Other failures, and duplicate-key failures no
/// declared index explains, are returned unchanged.
pub fn enrich_duplicate_key(collection: &dyn StoreCollection, document: &Document, error: StoreError) -> StoreError {
    if !error.is_duplicate_key() {
        return error;
    }

    let Ok(indexes) = collection.indexes() else {
        return error;
    };

    for index in indexes.iter().filter(|index| index.unique) {
        let key_value = index
            .keys
            .keys()
            .map(|field| (field.clone(), get_path(document, field).cloned().unwrap_or(Bson::Null)))
            .collect::<Document>();

        if index.sparse && key_value.values().all(|value| matches!(value, Bson::Null)) {
            continue;
        }

        let found = match collection.iter_documents(&key_value) {
            Ok(found) => found,
            Err(_) => continue,
        };

        if !found.is_empty() {
            debug!(collection = %collection.full_name(), index = %index.name, "enriched duplicate key error");

            return StoreError::DuplicateKey {
                message: ENRICHED_MESSAGE.to_string(),
                detail: Some(DuplicateKeyDetail::new(key_value, index.keys.clone())),
            };
        }
    }

    error
}
