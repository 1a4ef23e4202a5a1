//! In-memory collection handles.

use std::sync::Arc;

use bson::{Bson, Document, doc};
use parking_lot::RwLock;
use tracing::debug;

use docmock_core::{
    cursor::{StoreCursor, StoreQueryCursor},
    document::collect_path,
    error::{StoreError, StoreResult},
    hooks::CollectionHooks,
    options::{
        CollectionOptions, FindAndModifyOptions, FindOneAndDeleteOptions, FindOneAndModifyOptions,
        FindOneOptions, FindOptions, IndexModel, ReturnDocument, UpdateOptions, WriteModel,
    },
    results::{BulkWriteResult, DeleteResult, InsertManyResult, InsertOneResult, UpdateResult},
    store::{HandleKey, IndexSpec, StoreCollection},
};

use crate::{
    aggregate::{project, sort_documents},
    cursor::{PipelineCursor, QueryCursor},
    evaluator::{DocumentEvaluator, values_equal},
    filter::parse_filter,
    store::{CollectionData, MemoryStore},
    update::{apply_replacement, apply_update, is_operator_update, upsert_seed, with_leading_id},
};

/// A handle on one collection of a [`MemoryStore`].
///
/// Cloning the handle is cheap and keeps the hook chain shared; the database hands out
/// distinct handles for non-default options, each with its own chain.
#[derive(Clone, Debug)]
pub struct MemoryCollection {
    inner: Arc<CollectionInner>,
}

#[derive(Debug)]
struct CollectionInner {
    key: HandleKey,
    database: String,
    name: String,
    store: MemoryStore,
    options: CollectionOptions,
    hooks: RwLock<Vec<Arc<dyn CollectionHooks>>>,
}

/// How a matched document is rewritten by an update-style operation.
enum Change<'a> {
    Update(&'a Document),
    Replace(&'a Document),
}

impl<'a> Change<'a> {
    fn new(update: &'a Document, replace: bool) -> StoreResult<Self> {
        match (replace, is_operator_update(update)) {
            (false, true) => Ok(Change::Update(update)),
            (true, false) => Ok(Change::Replace(update)),
            (false, false) => Err(StoreError::operation_failure(
                "update document requires atomic operators",
            )),
            (true, true) => Err(StoreError::operation_failure(
                "replacement document must not contain update operators",
            )),
        }
    }

    fn apply(&self, existing: &Document) -> StoreResult<(Document, bool)> {
        match self {
            Change::Update(update) => {
                let mut document = existing.clone();
                let modified = apply_update(&mut document, update, false)?;
                Ok((document, modified))
            }
            Change::Replace(replacement) => {
                let document = apply_replacement(existing, (*replacement).clone())?;
                let modified = &document != existing;
                Ok((document, modified))
            }
        }
    }

    fn seed(&self, filter: &Document) -> StoreResult<Document> {
        let seed = upsert_seed(filter)?;

        match self {
            Change::Update(update) => {
                let mut document = seed;
                apply_update(&mut document, update, true)?;
                Ok(document)
            }
            Change::Replace(replacement) => {
                let mut document = (*replacement).clone();
                if let (None, Some(id)) = (document.get("_id"), seed.get("_id")) {
                    document.insert("_id", id.clone());
                }
                Ok(document)
            }
        }
    }
}

impl MemoryCollection {
    pub(crate) fn new(store: MemoryStore, database_key: &HandleKey, name: &str, options: CollectionOptions) -> Self {
        let database = database_key.database.clone().unwrap_or_default();

        Self {
            inner: Arc::new(CollectionInner {
                key: database_key.collection(name),
                database,
                name: name.to_string(),
                store,
                options,
                hooks: RwLock::new(Vec::new()),
            }),
        }
    }

    pub fn options(&self) -> &CollectionOptions {
        &self.inner.options
    }

    fn data(&self) -> Option<Arc<CollectionData>> {
        self.inner.store.collection(&self.inner.database, &self.inner.name)
    }

    fn data_or_create(&self) -> Arc<CollectionData> {
        self.inner.store.collection_or_create(&self.inner.database, &self.inner.name)
    }

    fn hooks(&self) -> Vec<Arc<dyn CollectionHooks>> {
        self.inner.hooks.read().clone()
    }

    /// Hands a duplicate-key failure for `document` to every installed hook.
    fn on_duplicate_key(&self, document: &Document, error: StoreError) -> StoreError {
        if !error.is_duplicate_key() {
            return error;
        }

        self.hooks()
            .iter()
            .fold(error, |error, hooks| hooks.on_duplicate_key(self, document, error))
    }

    fn insert_document(&self, document: Document) -> StoreResult<Bson> {
        let (id, document) = with_leading_id(document);

        match self.data_or_create().insert(document.clone()) {
            Ok(()) => Ok(id),
            Err(err) => Err(self.on_duplicate_key(&document, err)),
        }
    }

    fn store_document(&self, data: &CollectionData, id: &Bson, document: Document) -> StoreResult<()> {
        match data.replace(id, document.clone()) {
            Ok(_) => Ok(()),
            Err(err) => Err(self.on_duplicate_key(&document, err)),
        }
    }

    /// Filtered, sorted, skipped, limited and projected documents.
    pub(crate) fn get_dataset(
        &self,
        filter: &Document,
        sort: Option<&Document>,
        skip: u64,
        limit: Option<u64>,
        projection: Option<&Document>,
    ) -> StoreResult<Vec<Document>> {
        let mut documents = self.iter_documents(filter)?;

        if let Some(sort) = sort {
            let sort = self
                .hooks()
                .iter()
                .fold(sort.clone(), |sort, hooks| hooks.prepare_sort(sort));
            sort_documents(&mut documents, &sort)?;
        }

        let documents = documents
            .into_iter()
            .skip(skip as usize)
            .take(limit.map(|limit| limit as usize).unwrap_or(usize::MAX));

        match projection {
            Some(projection) => documents.map(|document| project(&document, projection)).collect(),
            None => Ok(documents.collect()),
        }
    }

    fn first_match(&self, filter: &Document, sort: Option<&Document>) -> StoreResult<Option<Document>> {
        Ok(self.get_dataset(filter, sort, 0, Some(1), None)?.into_iter().next())
    }

    fn update_documents(
        &self,
        filter: Document,
        change: Change<'_>,
        upsert: bool,
        multi: bool,
    ) -> StoreResult<UpdateResult> {
        let matches = self.iter_documents(&filter)?;
        let mut result = UpdateResult::default();

        if matches.is_empty() {
            if upsert {
                let seed = change.seed(&filter)?;
                result.upserted_id = Some(self.insert_document(seed)?);
            }
            return Ok(result);
        }

        let data = self.data_or_create();
        let targets = if multi { matches.len() } else { 1 };

        for existing in matches.into_iter().take(targets) {
            let id = existing.get("_id").cloned().unwrap_or(Bson::Null);
            let (document, modified) = change.apply(&existing)?;

            result.matched_count += 1;
            if modified {
                self.store_document(&data, &id, document)?;
                result.modified_count += 1;
            }
        }

        Ok(result)
    }

    fn find_and_change(
        &self,
        filter: Document,
        change: Change<'_>,
        sort: Option<&Document>,
        upsert: bool,
        return_document: ReturnDocument,
        projection: Option<&Document>,
    ) -> StoreResult<Option<Document>> {
        let found = match self.first_match(&filter, sort)? {
            Some(existing) => {
                let id = existing.get("_id").cloned().unwrap_or(Bson::Null);
                let (document, modified) = change.apply(&existing)?;
                if modified {
                    self.store_document(&self.data_or_create(), &id, document.clone())?;
                }
                match return_document {
                    ReturnDocument::Before => Some(existing),
                    ReturnDocument::After => Some(document),
                }
            }
            None if upsert => {
                let seed = change.seed(&filter)?;
                let id = self.insert_document(seed)?;
                match return_document {
                    ReturnDocument::Before => None,
                    ReturnDocument::After => self.data().and_then(|data| data.get(&id)),
                }
            }
            None => None,
        };

        found
            .map(|document| match projection {
                Some(projection) => project(&document, projection),
                None => Ok(document),
            })
            .transpose()
    }

    fn delete_documents(&self, filter: Document, multi: bool) -> StoreResult<DeleteResult> {
        let Some(data) = self.data() else {
            return Ok(DeleteResult::default());
        };

        let matches = self.iter_documents(&filter)?;
        let targets = if multi { matches.len() } else { 1 };
        let mut result = DeleteResult::default();

        for existing in matches.into_iter().take(targets) {
            let id = existing.get("_id").cloned().unwrap_or(Bson::Null);
            if data.remove(&id).is_some() {
                result.deleted_count += 1;
            }
        }

        Ok(result)
    }

    fn index_spec(model: IndexModel) -> StoreResult<IndexSpec> {
        if model.keys.is_empty() {
            return Err(StoreError::operation_failure("index key pattern must not be empty"));
        }

        let options = model.options.unwrap_or_default();

        Ok(IndexSpec {
            name: options
                .name
                .unwrap_or_else(|| IndexSpec::default_name(&model.keys)),
            keys: model.keys,
            unique: options.unique.unwrap_or(false),
            sparse: options.sparse.unwrap_or(false),
        })
    }
}

impl StoreCollection for MemoryCollection {
    fn key(&self) -> HandleKey {
        self.inner.key.clone()
    }

    fn name(&self) -> &str {
        &self.inner.name
    }

    fn full_name(&self) -> String {
        format!("{}.{}", self.inner.database, self.inner.name)
    }

    fn insert_one(&self, document: Document) -> StoreResult<InsertOneResult> {
        let inserted_id = self.insert_document(document)?;
        Ok(InsertOneResult { inserted_id })
    }

    fn insert_many(&self, documents: Vec<Document>) -> StoreResult<InsertManyResult> {
        let inserted_ids = documents
            .into_iter()
            .map(|document| self.insert_document(document))
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(InsertManyResult { inserted_ids })
    }

    fn find(&self, filter: Document, options: Option<FindOptions>) -> Box<dyn StoreQueryCursor> {
        Box::new(QueryCursor::new(self.clone(), filter, options.unwrap_or_default()))
    }

    fn find_one(&self, filter: Document, options: Option<FindOneOptions>) -> StoreResult<Option<Document>> {
        let options = options.unwrap_or_default();

        Ok(self
            .get_dataset(
                &filter,
                options.sort.as_ref(),
                options.skip.unwrap_or(0),
                Some(1),
                options.projection.as_ref(),
            )?
            .into_iter()
            .next())
    }

    fn count_documents(&self, filter: Document) -> StoreResult<u64> {
        Ok(self.iter_documents(&filter)?.len() as u64)
    }

    fn count(&self, filter: Document) -> StoreResult<u64> {
        self.count_documents(filter)
    }

    fn estimated_document_count(&self) -> StoreResult<u64> {
        Ok(self.data().map(|data| data.len() as u64).unwrap_or(0))
    }

    fn distinct(&self, key: &str, filter: Document) -> StoreResult<Vec<Bson>> {
        let mut values: Vec<Bson> = Vec::new();

        for document in self.iter_documents(&filter)? {
            for found in collect_path(&document, key) {
                let candidates = match found {
                    Bson::Array(items) => items.clone(),
                    other => vec![other.clone()],
                };

                for candidate in candidates {
                    if !values.iter().any(|value| values_equal(value, &candidate)) {
                        values.push(candidate);
                    }
                }
            }
        }

        Ok(values)
    }

    fn aggregate(&self, pipeline: Vec<Document>) -> Box<dyn StoreCursor> {
        Box::new(PipelineCursor::new(self.clone(), pipeline))
    }

    fn update_one(&self, filter: Document, update: Document, options: Option<UpdateOptions>) -> StoreResult<UpdateResult> {
        let upsert = options.and_then(|options| options.upsert).unwrap_or(false);
        self.update_documents(filter, Change::new(&update, false)?, upsert, false)
    }

    fn update_many(&self, filter: Document, update: Document, options: Option<UpdateOptions>) -> StoreResult<UpdateResult> {
        let upsert = options.and_then(|options| options.upsert).unwrap_or(false);
        self.update_documents(filter, Change::new(&update, false)?, upsert, true)
    }

    fn replace_one(&self, filter: Document, replacement: Document, options: Option<UpdateOptions>) -> StoreResult<UpdateResult> {
        let upsert = options.and_then(|options| options.upsert).unwrap_or(false);
        self.update_documents(filter, Change::new(&replacement, true)?, upsert, false)
    }

    fn delete_one(&self, filter: Document) -> StoreResult<DeleteResult> {
        self.delete_documents(filter, false)
    }

    fn delete_many(&self, filter: Document) -> StoreResult<DeleteResult> {
        self.delete_documents(filter, true)
    }

    fn bulk_write(&self, requests: Vec<WriteModel>) -> StoreResult<BulkWriteResult> {
        let mut result = BulkWriteResult::default();

        for (index, request) in requests.into_iter().enumerate() {
            let outcome = match request {
                WriteModel::InsertOne { document } => {
                    self.insert_document(document)?;
                    result.inserted_count += 1;
                    continue;
                }
                WriteModel::DeleteOne { filter } => {
                    result.deleted_count += self.delete_documents(filter, false)?.deleted_count;
                    continue;
                }
                WriteModel::DeleteMany { filter } => {
                    result.deleted_count += self.delete_documents(filter, true)?.deleted_count;
                    continue;
                }
                WriteModel::UpdateOne { filter, update, upsert } => {
                    self.update_documents(filter, Change::new(&update, false)?, upsert, false)?
                }
                WriteModel::UpdateMany { filter, update, upsert } => {
                    self.update_documents(filter, Change::new(&update, false)?, upsert, true)?
                }
                WriteModel::ReplaceOne { filter, replacement, upsert } => {
                    self.update_documents(filter, Change::new(&replacement, true)?, upsert, false)?
                }
            };

            result.matched_count += outcome.matched_count;
            result.modified_count += outcome.modified_count;
            if let Some(id) = outcome.upserted_id {
                result.upserted_count += 1;
                result.upserted_ids.push((index, id));
            }
        }

        Ok(result)
    }

    fn find_one_and_delete(&self, filter: Document, options: Option<FindOneAndDeleteOptions>) -> StoreResult<Option<Document>> {
        let options = options.unwrap_or_default();

        let Some(existing) = self.first_match(&filter, options.sort.as_ref())? else {
            return Ok(None);
        };

        if let (Some(data), Some(id)) = (self.data(), existing.get("_id")) {
            data.remove(id);
        }

        match options.projection {
            Some(projection) => project(&existing, &projection).map(Some),
            None => Ok(Some(existing)),
        }
    }

    fn find_one_and_replace(
        &self,
        filter: Document,
        replacement: Document,
        options: Option<FindOneAndModifyOptions>,
    ) -> StoreResult<Option<Document>> {
        let options = options.unwrap_or_default();

        self.find_and_change(
            filter,
            Change::new(&replacement, true)?,
            options.sort.as_ref(),
            options.upsert.unwrap_or(false),
            options.return_document.unwrap_or_default(),
            options.projection.as_ref(),
        )
    }

    fn find_one_and_update(
        &self,
        filter: Document,
        update: Document,
        options: Option<FindOneAndModifyOptions>,
    ) -> StoreResult<Option<Document>> {
        let options = options.unwrap_or_default();

        self.find_and_change(
            filter,
            Change::new(&update, false)?,
            options.sort.as_ref(),
            options.upsert.unwrap_or(false),
            options.return_document.unwrap_or_default(),
            options.projection.as_ref(),
        )
    }

    fn find_and_modify(&self, filter: Document, options: FindAndModifyOptions) -> StoreResult<Option<Document>> {
        if options.remove {
            return self.find_one_and_delete(
                filter,
                Some(FindOneAndDeleteOptions {
                    projection: options.fields,
                    sort: options.sort,
                }),
            );
        }

        let Some(update) = options.update else {
            return Err(StoreError::operation_failure(
                "find_and_modify needs either an update or remove",
            ));
        };

        let replace = !is_operator_update(&update);
        let return_document = if options.new {
            ReturnDocument::After
        } else {
            ReturnDocument::Before
        };

        self.find_and_change(
            filter,
            Change::new(&update, replace)?,
            options.sort.as_ref(),
            options.upsert,
            return_document,
            options.fields.as_ref(),
        )
    }

    fn save(&self, document: Document) -> StoreResult<Bson> {
        let Some(id) = document.get("_id").cloned() else {
            return self.insert_document(document);
        };

        let data = self.data_or_create();
        if data.get(&id).is_some() {
            self.store_document(&data, &id, document)?;
            return Ok(id);
        }

        self.insert_document(document)
    }

    fn map_reduce(&self, _map: String, _reduce: String, _out: Bson) -> StoreResult<Document> {
        Err(StoreError::not_implemented("map_reduce"))
    }

    fn create_index(&self, model: IndexModel) -> StoreResult<String> {
        let spec = Self::index_spec(model)?;
        let name = spec.name.clone();

        match self.data_or_create().add_index(spec) {
            Ok(()) => {
                debug!(collection = %self.full_name(), index = %name, "created index");
                Ok(name)
            }
            Err((err, Some(document))) => Err(self.on_duplicate_key(&document, err)),
            Err((err, None)) => Err(err),
        }
    }

    fn create_indexes(&self, models: Vec<IndexModel>) -> StoreResult<Vec<String>> {
        models.into_iter().map(|model| self.create_index(model)).collect()
    }

    fn ensure_index(&self, model: IndexModel) -> StoreResult<String> {
        self.create_index(model)
    }

    fn drop_index(&self, name: &str) -> StoreResult<()> {
        match self.data() {
            Some(data) => data.remove_index(name),
            None => Err(StoreError::OperationFailure(format!(
                "ns not found {}",
                self.full_name()
            ))),
        }
    }

    fn drop_indexes(&self) -> StoreResult<()> {
        if let Some(data) = self.data() {
            data.clear_indexes();
        }
        Ok(())
    }

    fn index_information(&self) -> StoreResult<Document> {
        let mut information = Document::new();

        for index in self.list_indexes()? {
            let Ok(name) = index.get_str("name") else {
                continue;
            };
            let name = name.to_string();
            let mut detail = index;
            detail.remove("name");
            information.insert(name, detail);
        }

        Ok(information)
    }

    fn list_indexes(&self) -> StoreResult<Vec<Document>> {
        let Some(data) = self.data() else {
            return Ok(Vec::new());
        };

        let mut indexes = vec![doc! { "v": 2, "key": { "_id": 1 }, "name": "_id_" }];
        indexes.extend(data.indexes().iter().map(IndexSpec::to_document));
        Ok(indexes)
    }

    fn indexes(&self) -> StoreResult<Vec<IndexSpec>> {
        Ok(self.data().map(|data| data.indexes()).unwrap_or_default())
    }

    fn iter_documents(&self, filter: &Document) -> StoreResult<Vec<Document>> {
        let filter = self
            .hooks()
            .iter()
            .fold(filter.clone(), |filter, hooks| hooks.prepare_filter(filter));
        let expr = parse_filter(&filter)?;

        let Some(data) = self.data() else {
            return Ok(Vec::new());
        };

        let mut matched = Vec::new();
        for document in data.documents() {
            if DocumentEvaluator::matches(&document, &expr)? {
                matched.push(document);
            }
        }

        Ok(matched)
    }

    fn drop(&self) -> StoreResult<()> {
        self.inner.store.drop_collection(&self.inner.database, &self.inner.name);
        Ok(())
    }

    fn install_hooks(&self, hooks: Arc<dyn CollectionHooks>) {
        self.inner.hooks.write().push(hooks);
    }

    fn installed_hooks(&self) -> usize {
        self.inner.hooks.read().len()
    }

    fn attribute(&self, name: &str) -> Option<Bson> {
        match name {
            "name" => Some(Bson::String(self.inner.name.clone())),
            "full_name" => Some(Bson::String(self.full_name())),
            "database" => Some(Bson::String(self.inner.database.clone())),
            "read_preference" => Some(Bson::String(
                self.inner
                    .options
                    .read_preference
                    .map(|preference| preference.as_str())
                    .unwrap_or("primary")
                    .to_string(),
            )),
            _ => None,
        }
    }
}
