//! Shared in-memory storage state.
//!
//! A [`MemoryStore`] holds every database and collection of one simulated server.
//! Handles (clients, databases, collections) never own data themselves; they look up
//! their [`CollectionData`] here on every operation, so a collection dropped through one
//! handle is gone for all of them.
//!
//! # Thread Safety
//!
//! `MemoryStore` is cloneable and uses `Arc`-wrapped state guarded by synchronous
//! `parking_lot` locks. Clones share the same underlying data.

use std::{collections::BTreeMap, sync::Arc};

use bson::{Bson, Document};
use parking_lot::RwLock;

use docmock_core::{
    document::get_path,
    error::{StoreError, StoreResult},
    store::IndexSpec,
};

use crate::evaluator::values_equal;

#[derive(Default, Clone, Debug)]
pub struct MemoryStore {
    /// database name -> collection name -> collection data
    databases: Arc<RwLock<BTreeMap<String, BTreeMap<String, Arc<CollectionData>>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of databases holding at least one collection, sorted.
    pub fn database_names(&self) -> Vec<String> {
        self.databases
            .read()
            .iter()
            .filter(|(_, collections)| !collections.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn drop_database(&self, name: &str) {
        self.databases.write().remove(name);
    }

    pub fn collection_names(&self, database: &str) -> Vec<String> {
        self.databases
            .read()
            .get(database)
            .map(|collections| collections.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// The data of an existing collection.
    pub fn collection(&self, database: &str, name: &str) -> Option<Arc<CollectionData>> {
        self.databases.read().get(database)?.get(name).cloned()
    }

    /// The data of a collection, creating the collection when it does not exist yet.
    pub fn collection_or_create(&self, database: &str, name: &str) -> Arc<CollectionData> {
        if let Some(data) = self.collection(database, name) {
            return data;
        }

        self.databases
            .write()
            .entry(database.to_string())
            .or_default()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CollectionData::new(format!("{database}.{name}"))))
            .clone()
    }

    /// Creates a collection; fails when it already exists.
    pub fn create_collection(&self, database: &str, name: &str) -> StoreResult<()> {
        let mut databases = self.databases.write();
        let collections = databases.entry(database.to_string()).or_default();

        if collections.contains_key(name) {
            return Err(StoreError::OperationFailure(format!(
                "collection {database}.{name} already exists"
            )));
        }

        collections.insert(
            name.to_string(),
            Arc::new(CollectionData::new(format!("{database}.{name}"))),
        );
        Ok(())
    }

    pub fn drop_collection(&self, database: &str, name: &str) {
        if let Some(collections) = self.databases.write().get_mut(database) {
            collections.remove(name);
        }
    }
}

/// Documents and declared indexes of one collection.
#[derive(Debug)]
pub struct CollectionData {
    namespace: String,
    state: RwLock<CollectionState>,
}

#[derive(Debug, Default)]
struct CollectionState {
    documents: Vec<Document>,
    indexes: Vec<IndexSpec>,
}

impl CollectionData {
    fn new(namespace: String) -> Self {
        Self {
            namespace,
            state: RwLock::new(CollectionState::default()),
        }
    }

    /// A snapshot of all documents, in storage order.
    pub fn documents(&self) -> Vec<Document> {
        self.state.read().documents.clone()
    }

    pub fn len(&self) -> usize {
        self.state.read().documents.len()
    }

    pub fn indexes(&self) -> Vec<IndexSpec> {
        self.state.read().indexes.clone()
    }

    /// Appends a document after checking `_id` and every unique index.
    pub fn insert(&self, document: Document) -> StoreResult<()> {
        let mut state = self.state.write();
        state.check_unique(&self.namespace, &document, None)?;
        state.documents.push(document);
        Ok(())
    }

    /// Replaces the document whose `_id` is `id`. Returns `false` when no such document exists.
    pub fn replace(&self, id: &Bson, document: Document) -> StoreResult<bool> {
        let mut state = self.state.write();
        let Some(position) = state.position(id) else {
            return Ok(false);
        };

        state.check_unique(&self.namespace, &document, Some(position))?;
        state.documents[position] = document;
        Ok(true)
    }

    /// Removes the document whose `_id` is `id`, returning it.
    pub fn remove(&self, id: &Bson) -> Option<Document> {
        let mut state = self.state.write();
        let position = state.position(id)?;
        Some(state.documents.remove(position))
    }

    pub fn get(&self, id: &Bson) -> Option<Document> {
        let state = self.state.read();
        state.position(id).map(|position| state.documents[position].clone())
    }

    /// Declares an index. Existing documents are checked first when the index is unique;
    /// on conflict the offending document is returned alongside the failure.
    pub fn add_index(&self, spec: IndexSpec) -> Result<(), (StoreError, Option<Document>)> {
        let mut state = self.state.write();

        if let Some(existing) = state.indexes.iter().find(|index| index.name == spec.name) {
            if existing.keys == spec.keys {
                return Ok(());
            }
            return Err((
                StoreError::OperationFailure(format!(
                    "an index named {} already exists with a different key pattern",
                    spec.name
                )),
                None,
            ));
        }

        if spec.unique {
            for (position, document) in state.documents.iter().enumerate() {
                let Some(values) = index_values(&spec, document) else {
                    continue;
                };

                let conflict = state.documents[..position].iter().any(|other| {
                    index_values(&spec, other).is_some_and(|other_values| same_values(&values, &other_values))
                });

                if conflict {
                    return Err((duplicate_key_error(&self.namespace, &spec.name, &spec.keys, &values), Some(document.clone())));
                }
            }
        }

        state.indexes.push(spec);
        Ok(())
    }

    /// Removes a declared index by name.
    pub fn remove_index(&self, name: &str) -> StoreResult<()> {
        if name == "_id_" {
            return Err(StoreError::operation_failure("cannot drop _id index"));
        }

        let mut state = self.state.write();
        let before = state.indexes.len();
        state.indexes.retain(|index| index.name != name);

        if state.indexes.len() == before {
            return Err(StoreError::OperationFailure(format!(
                "index not found with name [{name}]"
            )));
        }
        Ok(())
    }

    pub fn clear_indexes(&self) {
        self.state.write().indexes.clear();
    }
}

impl CollectionState {
    fn position(&self, id: &Bson) -> Option<usize> {
        self.documents
            .iter()
            .position(|document| document.get("_id").is_some_and(|own| values_equal(own, id)))
    }

    fn check_unique(&self, namespace: &str, document: &Document, skip: Option<usize>) -> StoreResult<()> {
        let others = || {
            self.documents
                .iter()
                .enumerate()
                .filter(move |(position, _)| Some(*position) != skip)
                .map(|(_, other)| other)
        };

        if let Some(id) = document.get("_id") {
            let taken = others().any(|other| other.get("_id").is_some_and(|own| values_equal(own, id)));
            if taken {
                let mut key = Document::new();
                key.insert("_id", 1);
                return Err(duplicate_key_error(namespace, "_id_", &key, &[id.clone()]));
            }
        }

        for index in self.indexes.iter().filter(|index| index.unique) {
            let Some(values) = index_values(index, document) else {
                continue;
            };

            let taken = others().any(|other| {
                index_values(index, other).is_some_and(|other_values| same_values(&values, &other_values))
            });

            if taken {
                return Err(duplicate_key_error(namespace, &index.name, &index.keys, &values));
            }
        }

        Ok(())
    }
}

/// The values `document` holds for each field of `index`, with missing fields as `null`.
///
/// Returns `None` for a sparse index when every field is missing.
fn index_values(index: &IndexSpec, document: &Document) -> Option<Vec<Bson>> {
    let mut missing = 0;
    let values = index
        .keys
        .keys()
        .map(|field| match get_path(document, field) {
            Some(value) => value.clone(),
            None => {
                missing += 1;
                Bson::Null
            }
        })
        .collect::<Vec<_>>();

    if index.sparse && missing == values.len() {
        return None;
    }

    Some(values)
}

fn same_values(left: &[Bson], right: &[Bson]) -> bool {
    left.len() == right.len() && left.iter().zip(right).all(|(a, b)| values_equal(a, b))
}

fn duplicate_key_error(namespace: &str, index: &str, keys: &Document, values: &[Bson]) -> StoreError {
    let dup_key = keys
        .keys()
        .zip(values)
        .map(|(field, value)| format!("{field}: {value}"))
        .collect::<Vec<_>>()
        .join(", ");

    StoreError::duplicate_key(format!(
        "E11000 duplicate key error collection: {namespace} index: {index} dup key: {{ {dup_key} }}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn unique_index(field: &str, sparse: bool) -> IndexSpec {
        let mut keys = Document::new();
        keys.insert(field, 1);
        IndexSpec {
            name: IndexSpec::default_name(&keys),
            keys,
            unique: true,
            sparse,
        }
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let store = MemoryStore::new();
        let data = store.collection_or_create("db", "coll");

        data.insert(doc! { "_id": 1 }).unwrap();
        let err = data.insert(doc! { "_id": 1 }).unwrap_err();

        assert!(err.is_duplicate_key());
        assert!(err.to_string().starts_with("E11000 duplicate key error collection: db.coll index: _id_"));
    }

    #[test]
    fn test_sparse_unique_index_ignores_missing_fields() {
        let store = MemoryStore::new();
        let data = store.collection_or_create("db", "coll");
        data.add_index(unique_index("a", true)).unwrap();

        data.insert(doc! { "_id": 1 }).unwrap();
        data.insert(doc! { "_id": 2 }).unwrap();
        assert!(data.insert(doc! { "_id": 3, "a": 1 }).is_ok());
        assert!(data.insert(doc! { "_id": 4, "a": 1 }).is_err());
    }

    #[test]
    fn test_unique_index_over_existing_duplicates_fails() {
        let store = MemoryStore::new();
        let data = store.collection_or_create("db", "coll");
        data.insert(doc! { "_id": 1, "a": 1 }).unwrap();
        data.insert(doc! { "_id": 2, "a": 1 }).unwrap();

        let (err, document) = data.add_index(unique_index("a", false)).unwrap_err();
        assert!(err.is_duplicate_key());
        assert_eq!(document, Some(doc! { "_id": 2, "a": 1 }));
        assert!(data.indexes().is_empty());
    }

    #[test]
    fn test_database_names_skip_empty_databases() {
        let store = MemoryStore::new();
        store.collection_or_create("b", "x");
        store.collection_or_create("a", "x");
        store.drop_collection("b", "x");

        assert_eq!(store.database_names(), vec!["a".to_string()]);
    }
}
