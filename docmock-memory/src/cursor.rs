//! Lazy cursors over in-memory collections.

use std::collections::VecDeque;

use bson::{Bson, Document};

use docmock_core::{
    cursor::{StoreCursor, StoreQueryCursor},
    error::{StoreError, StoreResult},
    options::FindOptions,
    store::StoreCollection,
};

use crate::{aggregate::run_pipeline, collection::MemoryCollection};

/// Query modifiers that are accepted and recorded but do not change results.
#[derive(Debug, Clone, Default)]
struct RecordedModifiers {
    flags: i32,
    allow_disk_use: Option<bool>,
    batch_size: Option<u32>,
    collation: Option<Document>,
    comment: Option<Bson>,
    hint: Option<Bson>,
    max_await_time_ms: Option<u64>,
    max_scan: Option<u64>,
    max_time_ms: Option<u64>,
    max: Option<Document>,
    min: Option<Document>,
}

/// A `find` cursor.
///
/// The result set is computed on the first pull. From then on `skip` and `sort` no longer
/// have an effect, while `limit` is checked on every pull.
#[derive(Debug)]
pub struct QueryCursor {
    collection: MemoryCollection,
    filter: Document,
    projection: Option<Document>,
    sort: Option<Document>,
    skip: u64,
    limit: i64,
    where_clause: Option<String>,
    modifiers: RecordedModifiers,
    buffer: Option<VecDeque<Document>>,
    emitted: u64,
    closed: bool,
}

impl QueryCursor {
    pub(crate) fn new(collection: MemoryCollection, filter: Document, options: FindOptions) -> Self {
        Self {
            collection,
            filter,
            projection: options.projection,
            sort: options.sort,
            skip: options.skip.unwrap_or(0),
            limit: options.limit.unwrap_or(0),
            where_clause: None,
            modifiers: RecordedModifiers {
                allow_disk_use: options.allow_disk_use,
                batch_size: options.batch_size,
                collation: options.collation,
                comment: options.comment,
                hint: options.hint,
                max_time_ms: options.max_time_ms,
                ..Default::default()
            },
            buffer: None,
            emitted: 0,
            closed: false,
        }
    }

    /// The recorded query modifiers, in the shape of a find command's optional fields.
    pub fn modifiers(&self) -> Document {
        let modifiers = &self.modifiers;
        let mut document = Document::new();

        if modifiers.flags != 0 {
            document.insert("flags", modifiers.flags);
        }
        let optional = [
            ("allowDiskUse", modifiers.allow_disk_use.map(Bson::Boolean)),
            ("batchSize", modifiers.batch_size.map(|size| Bson::Int64(size as i64))),
            ("collation", modifiers.collation.clone().map(Bson::Document)),
            ("comment", modifiers.comment.clone()),
            ("hint", modifiers.hint.clone()),
            ("maxAwaitTimeMS", modifiers.max_await_time_ms.map(|ms| Bson::Int64(ms as i64))),
            ("maxScan", modifiers.max_scan.map(|count| Bson::Int64(count as i64))),
            ("maxTimeMS", modifiers.max_time_ms.map(|ms| Bson::Int64(ms as i64))),
            ("max", modifiers.max.clone().map(Bson::Document)),
            ("min", modifiers.min.clone().map(Bson::Document)),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                document.insert(name, value);
            }
        }

        document
    }

    fn started(&self) -> bool {
        self.buffer.is_some()
    }

    fn limit_reached(&self) -> bool {
        self.limit != 0 && self.emitted >= self.limit.unsigned_abs()
    }

    fn load(&mut self) -> StoreResult<()> {
        if self.where_clause.is_some() {
            return Err(StoreError::not_implemented("$where clauses"));
        }

        let documents = self.collection.get_dataset(
            &self.filter,
            self.sort.as_ref(),
            self.skip,
            None,
            self.projection.as_ref(),
        )?;

        self.buffer = Some(documents.into());
        Ok(())
    }
}

impl StoreCursor for QueryCursor {
    fn next_document(&mut self) -> Option<StoreResult<Document>> {
        if self.closed || self.limit_reached() {
            return None;
        }

        if !self.started() {
            if let Err(err) = self.load() {
                self.buffer = Some(VecDeque::new());
                return Some(Err(err));
            }
        }

        let document = self.buffer.as_mut()?.pop_front()?;
        self.emitted += 1;
        Some(Ok(document))
    }

    fn close(&mut self) {
        self.closed = true;
        self.buffer = Some(VecDeque::new());
    }

    fn alive(&self) -> bool {
        if self.closed || self.limit_reached() {
            return false;
        }

        self.buffer.as_ref().is_none_or(|buffer| !buffer.is_empty())
    }
}

impl StoreQueryCursor for QueryCursor {
    fn add_option(&mut self, mask: i32) {
        self.modifiers.flags |= mask;
    }

    fn remove_option(&mut self, mask: i32) {
        self.modifiers.flags &= !mask;
    }

    fn allow_disk_use(&mut self, allow: bool) {
        self.modifiers.allow_disk_use = Some(allow);
    }

    fn batch_size(&mut self, size: u32) {
        self.modifiers.batch_size = Some(size);
    }

    fn collation(&mut self, collation: Document) {
        self.modifiers.collation = Some(collation);
    }

    fn comment(&mut self, comment: Bson) {
        self.modifiers.comment = Some(comment);
    }

    fn hint(&mut self, hint: Bson) {
        self.modifiers.hint = Some(hint);
    }

    fn limit(&mut self, limit: i64) {
        self.limit = limit;
    }

    fn max_await_time_ms(&mut self, millis: u64) {
        self.modifiers.max_await_time_ms = Some(millis);
    }

    fn max_scan(&mut self, count: u64) {
        self.modifiers.max_scan = Some(count);
    }

    fn max_time_ms(&mut self, millis: u64) {
        self.modifiers.max_time_ms = Some(millis);
    }

    fn max(&mut self, spec: Document) {
        self.modifiers.max = Some(spec);
    }

    fn min(&mut self, spec: Document) {
        self.modifiers.min = Some(spec);
    }

    fn skip(&mut self, skip: u64) {
        if !self.started() {
            self.skip = skip;
        }
    }

    fn sort(&mut self, spec: Document) {
        if !self.started() {
            let sort = self.sort.get_or_insert_with(Document::new);
            for (field, direction) in spec {
                sort.insert(field, direction);
            }
        }
    }

    fn where_clause(&mut self, code: String) {
        self.where_clause = Some(code);
    }

    fn distinct(&self, key: &str) -> StoreResult<Vec<Bson>> {
        self.collection.distinct(key, self.filter.clone())
    }

    fn rewind(&mut self) {
        self.buffer = None;
        self.emitted = 0;
        self.closed = false;
    }

    fn clone_cursor(&self) -> Box<dyn StoreQueryCursor> {
        Box::new(QueryCursor {
            collection: self.collection.clone(),
            filter: self.filter.clone(),
            projection: self.projection.clone(),
            sort: self.sort.clone(),
            skip: self.skip,
            limit: self.limit,
            where_clause: self.where_clause.clone(),
            modifiers: self.modifiers.clone(),
            buffer: None,
            emitted: 0,
            closed: false,
        })
    }
}

/// An `aggregate` cursor; the pipeline runs on the first pull.
#[derive(Debug)]
pub struct PipelineCursor {
    collection: MemoryCollection,
    pipeline: Vec<Document>,
    buffer: Option<VecDeque<Document>>,
    closed: bool,
}

impl PipelineCursor {
    pub(crate) fn new(collection: MemoryCollection, pipeline: Vec<Document>) -> Self {
        Self {
            collection,
            pipeline,
            buffer: None,
            closed: false,
        }
    }

    fn load(&self) -> StoreResult<Vec<Document>> {
        let documents = self.collection.iter_documents(&Document::new())?;
        run_pipeline(documents, &self.pipeline)
    }
}

impl StoreCursor for PipelineCursor {
    fn next_document(&mut self) -> Option<StoreResult<Document>> {
        if self.closed {
            return None;
        }

        if self.buffer.is_none() {
            match self.load() {
                Ok(documents) => self.buffer = Some(documents.into()),
                Err(err) => {
                    self.buffer = Some(VecDeque::new());
                    return Some(Err(err));
                }
            }
        }

        self.buffer.as_mut()?.pop_front().map(Ok)
    }

    fn close(&mut self) {
        self.closed = true;
        self.buffer = Some(VecDeque::new());
    }

    fn alive(&self) -> bool {
        !self.closed && self.buffer.as_ref().is_none_or(|buffer| !buffer.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docmock_core::{options::CollectionOptions, store::HandleKey};
    use pretty_assertions::assert_eq;

    use crate::store::MemoryStore;

    fn collection_with(count: i32) -> MemoryCollection {
        let key = HandleKey::client("localhost:27017").database("tests");
        let collection = MemoryCollection::new(MemoryStore::new(), &key, "test", CollectionOptions::default());
        collection
            .insert_many((0..count).map(|i| doc! { "i": i }).collect())
            .unwrap();
        collection
    }

    fn drain(cursor: &mut dyn StoreQueryCursor) -> Vec<Document> {
        std::iter::from_fn(|| cursor.next_document()).map(Result::unwrap).collect()
    }

    #[test]
    fn test_skip_limit_sort_projection() {
        let collection = collection_with(10);
        let mut cursor = collection.find(
            doc! {},
            Some(FindOptions {
                projection: Some(doc! { "_id": 0 }),
                ..Default::default()
            }),
        );
        cursor.skip(2);
        cursor.limit(2);
        cursor.sort(doc! { "i": -1 });

        assert_eq!(drain(cursor.as_mut()), vec![doc! { "i": 7 }, doc! { "i": 6 }]);
        assert!(!cursor.alive());
    }

    #[test]
    fn test_limit_is_checked_per_pull() {
        let collection = collection_with(5);
        let mut cursor = collection.find(doc! {}, None);

        assert!(cursor.next_document().is_some());
        cursor.skip(3);
        cursor.limit(2);

        assert!(cursor.next_document().is_some());
        assert!(cursor.next_document().is_none());
    }

    #[test]
    fn test_clone_starts_over() {
        let collection = collection_with(3);
        let mut cursor = collection.find(doc! {}, None);
        cursor.next_document();

        let mut clone = cursor.clone_cursor();
        assert_eq!(drain(clone.as_mut()).len(), 3);
        assert_eq!(drain(cursor.as_mut()).len(), 2);
    }

    #[test]
    fn test_modifiers_are_recorded() {
        let collection = collection_with(1);
        let mut cursor = QueryCursor::new(collection, doc! {}, FindOptions::default());
        cursor.add_option(2);
        cursor.add_option(4);
        cursor.remove_option(2);
        cursor.max_time_ms(10);
        cursor.hint(Bson::from("i_1"));

        assert_eq!(cursor.modifiers(), doc! { "flags": 4, "hint": "i_1", "maxTimeMS": 10_i64 });
    }

    #[test]
    fn test_close_is_idempotent() {
        let collection = collection_with(3);
        let mut cursor = collection.find(doc! {}, None);
        cursor.close();
        cursor.close();
        assert!(cursor.next_document().is_none());
    }

    #[test]
    fn test_pipeline_cursor_is_lazy() {
        let collection = collection_with(3);
        let mut cursor = collection.aggregate(vec![doc! { "$match": { "i": { "$gte": 1 } } }]);

        collection.insert_one(doc! { "i": 5 }).unwrap();

        let count = std::iter::from_fn(|| cursor.next_document()).count();
        assert_eq!(count, 3);
    }
}
