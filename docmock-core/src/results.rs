//! Result types returned by Store write operations.

use bson::{Bson, Document, doc};

#[derive(Debug, Clone, PartialEq)]
pub struct InsertOneResult {
    pub inserted_id: Bson,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertManyResult {
    /// Inserted ids, in input order.
    pub inserted_ids: Vec<Bson>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<Bson>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteResult {
    pub deleted_count: u64,
}

/// Aggregated outcome of a `bulk_write` batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkWriteResult {
    pub inserted_count: u64,
    pub matched_count: u64,
    pub modified_count: u64,
    pub deleted_count: u64,
    pub upserted_count: u64,
    /// Upserted ids keyed by the position of the operation in the batch.
    pub upserted_ids: Vec<(usize, Bson)>,
}

impl BulkWriteResult {
    /// Renders the batch outcome in the server's bulk API reply shape.
    pub fn bulk_api_result(&self) -> Document {
        doc! {
            "writeErrors": [],
            "writeConcernErrors": [],
            "nInserted": self.inserted_count as i64,
            "nUpserted": self.upserted_count as i64,
            "nMatched": self.matched_count as i64,
            "nModified": self.modified_count as i64,
            "nRemoved": self.deleted_count as i64,
            "upserted": self
                .upserted_ids
                .iter()
                .map(|(index, id)| Bson::Document(doc! { "index": *index as i64, "_id": id.clone() }))
                .collect::<Vec<_>>(),
        }
    }
}
