//! Async collection facade.

use std::{
    hash::{Hash, Hasher},
    sync::Arc,
};

use bson::{Bson, Document};
use tokio::runtime::Handle;

use docmock_core::{
    options::{
        CollectionOptions, FindAndModifyOptions, FindOneAndDeleteOptions, FindOneAndModifyOptions,
        FindOneOptions, FindOptions, IndexModel, UpdateOptions, WriteModel,
    },
    results::{BulkWriteResult, DeleteResult, InsertManyResult, InsertOneResult, UpdateResult},
    store::{HandleKey, StoreCollection, StoreDatabase},
};

use crate::{
    bridge::async_bridged,
    cursor::{AsyncCommandCursor, AsyncCursor, AsyncLatentCommandCursor},
    error::FacadeResult,
    masquerade::{Masquerade, targets},
    node::{ClientContext, Member},
    patches::adapt_collection,
};

/// Async facade over a Store collection handle.
///
/// Obtained from [`AsyncMockDatabase::collection`](crate::AsyncMockDatabase::collection).
/// The Store handle is adapted once (see [`patches`](crate::patches)) before the facade is
/// handed out. Facades compare and hash like their Store handle.
#[derive(Debug, Clone)]
pub struct AsyncMockCollection {
    delegate: Arc<dyn StoreCollection>,
    database: Arc<dyn StoreDatabase>,
    context: Arc<ClientContext>,
}

impl AsyncMockCollection {
    pub(crate) fn open(
        database: &Arc<dyn StoreDatabase>,
        name: &str,
        options: Option<CollectionOptions>,
        context: &Arc<ClientContext>,
    ) -> FacadeResult<Self> {
        let delegate = database.get_collection(name, options)?;
        adapt_collection(&delegate);

        Ok(Self {
            delegate,
            database: database.clone(),
            context: context.clone(),
        })
    }

    /// The wrapped Store handle.
    pub fn delegate(&self) -> &Arc<dyn StoreCollection> {
        &self.delegate
    }

    pub fn name(&self) -> &str {
        self.delegate.name()
    }

    pub fn full_name(&self) -> String {
        self.delegate.full_name()
    }

    pub fn database_name(&self) -> &str {
        self.database.name()
    }

    /// The sub-collection `<name>.<child>`.
    pub fn collection(&self, child: &str) -> FacadeResult<AsyncMockCollection> {
        Self::open(&self.database, &format!("{}.{child}", self.name()), None, &self.context)
    }

    /// Resolves `name` to a handle attribute or, failing that, a sub-collection.
    pub fn resolve(&self, name: &str) -> FacadeResult<Member<AsyncMockCollection>> {
        match self.delegate.attribute(name) {
            Some(value) => Ok(Member::Attribute(value)),
            None => Ok(Member::Child(self.collection(name)?)),
        }
    }

    pub fn find(&self, filter: Document, options: Option<FindOptions>) -> AsyncCursor {
        AsyncCursor::new(self.delegate.find(filter, options))
    }

    pub fn aggregate(&self, pipeline: Vec<Document>) -> AsyncLatentCommandCursor {
        AsyncLatentCommandCursor::new(self.delegate.aggregate(pipeline))
    }

    pub fn list_indexes(&self) -> FacadeResult<AsyncCommandCursor> {
        Ok(AsyncCommandCursor::new(self.delegate.list_indexes()?))
    }

    /// The runtime this collection's client is bound to.
    pub fn io_loop(&self) -> FacadeResult<Handle> {
        self.context.loop_binding.resolve()
    }

    pub(crate) fn key(&self) -> HandleKey {
        self.delegate.key()
    }
}

async_bridged! {
    AsyncMockCollection => delegate as StoreCollection, table ASYNC_METHODS;
    "count_documents" => fn count_documents(filter: Document) -> u64;
    /// Legacy count; same result as `count_documents`.
    "count" => fn count(filter: Document) -> u64;
    "create_index" => fn create_index(model: IndexModel) -> String;
    "create_indexes" => fn create_indexes(models: Vec<IndexModel>) -> Vec<String>;
    "delete_many" => fn delete_many(filter: Document) -> DeleteResult;
    "delete_one" => fn delete_one(filter: Document) -> DeleteResult;
    "drop" => fn drop() -> ();
    "ensure_index" => fn ensure_index(model: IndexModel) -> String;
    "estimated_document_count" => fn estimated_document_count() -> u64;
    "find_and_modify" => fn find_and_modify(filter: Document, options: FindAndModifyOptions) -> Option<Document>;
    "find_one_and_delete" => fn find_one_and_delete(filter: Document, options: Option<FindOneAndDeleteOptions>) -> Option<Document>;
    "find_one_and_replace" => fn find_one_and_replace(filter: Document, replacement: Document, options: Option<FindOneAndModifyOptions>) -> Option<Document>;
    "find_one_and_update" => fn find_one_and_update(filter: Document, update: Document, options: Option<FindOneAndModifyOptions>) -> Option<Document>;
    "find_one" => fn find_one(filter: Document, options: Option<FindOneOptions>) -> Option<Document>;
    "index_information" => fn index_information() -> Document;
    "insert_many" => fn insert_many(documents: Vec<Document>) -> InsertManyResult;
    "insert_one" => fn insert_one(document: Document) -> InsertOneResult;
    "map_reduce" => fn map_reduce(map: String, reduce: String, out: Bson) -> Document;
    "replace_one" => fn replace_one(filter: Document, replacement: Document, options: Option<UpdateOptions>) -> UpdateResult;
    /// Legacy upsert by `_id`; resolves to the document id.
    "save" => fn save(document: Document) -> Bson;
    "update_many" => fn update_many(filter: Document, update: Document, options: Option<UpdateOptions>) -> UpdateResult;
    "update_one" => fn update_one(filter: Document, update: Document, options: Option<UpdateOptions>) -> UpdateResult;
}

async_bridged! {
    AsyncMockCollection => delegate as StoreCollection, table EXTENDED_ASYNC_METHODS;
    "bulk_write" => fn bulk_write(requests: Vec<WriteModel>) -> BulkWriteResult;
    "distinct" => fn distinct(key: &str, filter: Document) -> Vec<Bson>;
    "drop_index" => fn drop_index(name: &str) -> ();
    "drop_indexes" => fn drop_indexes() -> ();
}

impl Masquerade for AsyncMockCollection {
    const TARGET: &'static str = targets::COLLECTION;
}

impl PartialEq for AsyncMockCollection {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for AsyncMockCollection {}

impl Hash for AsyncMockCollection {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}
