//! The synchronous Store contract.
//!
//! The async facade never talks to a concrete store; it holds trait objects for the four
//! handle kinds defined here. Every method runs to completion before returning.
//!
//! # Handle identity
//!
//! Handles compare through [`HandleKey`]: two handles with equal keys address the same
//! server, database or collection, even when they are distinct objects (for example two
//! collection handles obtained with different options).

use std::{fmt::Debug, sync::Arc};

use bson::{Bson, Document};

use crate::{
    command::Command,
    cursor::{StoreCursor, StoreQueryCursor},
    error::StoreResult,
    hooks::CollectionHooks,
    options::{
        CollectionOptions, DatabaseOptions, FindAndModifyOptions, FindOneAndDeleteOptions,
        FindOneAndModifyOptions, FindOneOptions, FindOptions, IndexModel, UpdateOptions,
        WriteModel,
    },
    results::{BulkWriteResult, DeleteResult, InsertManyResult, InsertOneResult, UpdateResult},
};

/// Equality and hash identity of a Store handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleKey {
    /// `host:port` of the server the handle belongs to.
    pub address: String,
    pub database: Option<String>,
    pub collection: Option<String>,
}

impl HandleKey {
    pub fn client(address: impl Into<String>) -> Self {
        HandleKey {
            address: address.into(),
            database: None,
            collection: None,
        }
    }

    pub fn database(&self, name: impl Into<String>) -> Self {
        HandleKey {
            address: self.address.clone(),
            database: Some(name.into()),
            collection: None,
        }
    }

    pub fn collection(&self, name: impl Into<String>) -> Self {
        HandleKey {
            address: self.address.clone(),
            database: self.database.clone(),
            collection: Some(name.into()),
        }
    }
}

/// A declared index, as tracked by the collection that owns it.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec {
    pub name: String,
    /// Ordered key pattern, e.g. `{ "a": 1, "b": -1 }`.
    pub keys: Document,
    pub unique: bool,
    pub sparse: bool,
}

impl IndexSpec {
    /// The default index name derived from a key pattern (`a_1_b_-1`).
    pub fn default_name(keys: &Document) -> String {
        keys.iter()
            .map(|(field, direction)| match direction {
                Bson::Int32(v) => format!("{field}_{v}"),
                Bson::Int64(v) => format!("{field}_{v}"),
                Bson::Double(v) => format!("{field}_{}", *v as i64),
                Bson::String(v) => format!("{field}_{v}"),
                other => format!("{field}_{other}"),
            })
            .collect::<Vec<_>>()
            .join("_")
    }

    /// The index as reported by `list_indexes`.
    pub fn to_document(&self) -> Document {
        let mut document = Document::new();
        document.insert("v", 2);
        document.insert("key", self.keys.clone());
        document.insert("name", self.name.clone());
        if self.unique {
            document.insert("unique", true);
        }
        if self.sparse {
            document.insert("sparse", true);
        }
        document
    }
}

/// A Store server connection.
pub trait StoreClient: Send + Sync + Debug {
    fn key(&self) -> HandleKey;

    /// Returns a database handle. Handles requested with default options may be cached.
    fn get_database(
        &self,
        name: &str,
        options: Option<DatabaseOptions>,
    ) -> StoreResult<Arc<dyn StoreDatabase>>;

    fn list_database_names(&self) -> StoreResult<Vec<String>>;
    fn drop_database(&self, name: &str) -> StoreResult<()>;

    /// Looks up a named attribute of the handle itself (`"address"`, `"host"`, ...).
    fn attribute(&self, name: &str) -> Option<Bson>;

    fn close(&self) {}
}

/// A Store database handle.
pub trait StoreDatabase: Send + Sync + Debug {
    fn key(&self) -> HandleKey;
    fn name(&self) -> &str;

    /// Returns a collection handle. Handles requested with default options are cached by
    /// name; any other options produce a new handle on every call.
    fn get_collection(
        &self,
        name: &str,
        options: Option<CollectionOptions>,
    ) -> StoreResult<Arc<dyn StoreCollection>>;

    fn list_collection_names(&self) -> StoreResult<Vec<String>>;
    fn create_collection(&self, name: &str) -> StoreResult<Arc<dyn StoreCollection>>;
    fn drop_collection(&self, name: &str) -> StoreResult<()>;

    /// Runs an admin command. Unsimulated commands fail with `NotImplemented`.
    fn command(&self, command: &Command) -> StoreResult<Document>;

    /// Looks up a named attribute of the handle itself (`"name"`, `"read_preference"`, ...).
    fn attribute(&self, name: &str) -> Option<Bson>;
}

/// A Store collection handle.
pub trait StoreCollection: Send + Sync + Debug {
    fn key(&self) -> HandleKey;
    fn name(&self) -> &str;
    fn full_name(&self) -> String;

    fn insert_one(&self, document: Document) -> StoreResult<InsertOneResult>;
    fn insert_many(&self, documents: Vec<Document>) -> StoreResult<InsertManyResult>;

    fn find(&self, filter: Document, options: Option<FindOptions>) -> Box<dyn StoreQueryCursor>;
    fn find_one(
        &self,
        filter: Document,
        options: Option<FindOneOptions>,
    ) -> StoreResult<Option<Document>>;
    fn count_documents(&self, filter: Document) -> StoreResult<u64>;
    /// Legacy count; same result as `count_documents`.
    fn count(&self, filter: Document) -> StoreResult<u64>;
    fn estimated_document_count(&self) -> StoreResult<u64>;
    fn distinct(&self, key: &str, filter: Document) -> StoreResult<Vec<Bson>>;
    fn aggregate(&self, pipeline: Vec<Document>) -> Box<dyn StoreCursor>;

    fn update_one(
        &self,
        filter: Document,
        update: Document,
        options: Option<UpdateOptions>,
    ) -> StoreResult<UpdateResult>;
    fn update_many(
        &self,
        filter: Document,
        update: Document,
        options: Option<UpdateOptions>,
    ) -> StoreResult<UpdateResult>;
    fn replace_one(
        &self,
        filter: Document,
        replacement: Document,
        options: Option<UpdateOptions>,
    ) -> StoreResult<UpdateResult>;
    fn delete_one(&self, filter: Document) -> StoreResult<DeleteResult>;
    fn delete_many(&self, filter: Document) -> StoreResult<DeleteResult>;
    fn bulk_write(&self, requests: Vec<WriteModel>) -> StoreResult<BulkWriteResult>;

    fn find_one_and_delete(
        &self,
        filter: Document,
        options: Option<FindOneAndDeleteOptions>,
    ) -> StoreResult<Option<Document>>;
    fn find_one_and_replace(
        &self,
        filter: Document,
        replacement: Document,
        options: Option<FindOneAndModifyOptions>,
    ) -> StoreResult<Option<Document>>;
    fn find_one_and_update(
        &self,
        filter: Document,
        update: Document,
        options: Option<FindOneAndModifyOptions>,
    ) -> StoreResult<Option<Document>>;
    /// Legacy combined find-and-modify.
    fn find_and_modify(
        &self,
        filter: Document,
        options: FindAndModifyOptions,
    ) -> StoreResult<Option<Document>>;
    /// Legacy upsert-by-`_id`; returns the document id.
    fn save(&self, document: Document) -> StoreResult<Bson>;
    fn map_reduce(&self, map: String, reduce: String, out: Bson) -> StoreResult<Document>;

    /// Creates an index and returns its name.
    fn create_index(&self, model: IndexModel) -> StoreResult<String>;
    fn create_indexes(&self, models: Vec<IndexModel>) -> StoreResult<Vec<String>>;
    /// Legacy alias of `create_index`.
    fn ensure_index(&self, model: IndexModel) -> StoreResult<String>;
    fn drop_index(&self, name: &str) -> StoreResult<()>;
    fn drop_indexes(&self) -> StoreResult<()>;
    /// Index descriptions keyed by index name.
    fn index_information(&self) -> StoreResult<Document>;
    /// All indexes including `_id_`; empty when the collection does not exist yet.
    fn list_indexes(&self) -> StoreResult<Vec<Document>>;
    /// Declared secondary indexes, in declaration order.
    fn indexes(&self) -> StoreResult<Vec<IndexSpec>>;

    /// Documents matching `filter`, in storage order, after filter hooks have run.
    fn iter_documents(&self, filter: &Document) -> StoreResult<Vec<Document>>;

    fn drop(&self) -> StoreResult<()>;

    /// Appends `hooks` to the handle's hook chain.
    fn install_hooks(&self, hooks: Arc<dyn CollectionHooks>);
    /// Number of hooks installed on this handle.
    fn installed_hooks(&self) -> usize;

    /// Looks up a named attribute of the handle itself (`"name"`, `"full_name"`, ...).
    fn attribute(&self, name: &str) -> Option<Bson>;
}
