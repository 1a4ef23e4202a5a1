//! Per-call option structs for Store operations.
//!
//! Options follow the async driver's shape: plain structs with public fields and
//! `Default`, passed as `Option<...>` to the operation they configure.

use bson::{Bson, Document};

/// Options for `find`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub skip: Option<u64>,
    /// Limit on returned documents; `0` means unbounded, negative values are read as absolute.
    pub limit: Option<i64>,
    pub batch_size: Option<u32>,
    pub hint: Option<Bson>,
    pub comment: Option<Bson>,
    pub collation: Option<Document>,
    pub max_time_ms: Option<u64>,
    pub allow_disk_use: Option<bool>,
}

/// Options for `find_one`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOneOptions {
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub skip: Option<u64>,
}

impl From<FindOneOptions> for FindOptions {
    fn from(options: FindOneOptions) -> Self {
        FindOptions {
            projection: options.projection,
            sort: options.sort,
            skip: options.skip,
            limit: Some(1),
            ..Default::default()
        }
    }
}

/// Options for `update_one` / `update_many` / `replace_one`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOptions {
    pub upsert: Option<bool>,
}

/// Which version of a document `find_one_and_*` returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReturnDocument {
    #[default]
    Before,
    After,
}

/// Options for `find_one_and_update` / `find_one_and_replace`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOneAndModifyOptions {
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub upsert: Option<bool>,
    pub return_document: Option<ReturnDocument>,
}

/// Options for `find_one_and_delete`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOneAndDeleteOptions {
    pub projection: Option<Document>,
    pub sort: Option<Document>,
}

/// Arguments of the legacy `find_and_modify` operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindAndModifyOptions {
    pub update: Option<Document>,
    pub remove: bool,
    /// Return the modified document instead of the original.
    pub new: bool,
    pub upsert: bool,
    pub sort: Option<Document>,
    pub fields: Option<Document>,
}

/// Options attached to an index definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexOptions {
    pub name: Option<String>,
    pub unique: Option<bool>,
    pub sparse: Option<bool>,
}

/// An index definition: an ordered key pattern plus options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexModel {
    pub keys: Document,
    pub options: Option<IndexOptions>,
}

impl IndexModel {
    pub fn new(keys: Document) -> Self {
        IndexModel { keys, options: None }
    }

    pub fn with_options(keys: Document, options: IndexOptions) -> Self {
        IndexModel {
            keys,
            options: Some(options),
        }
    }
}

/// Read preference requested for a database or collection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadPreference {
    Primary,
    PrimaryPreferred,
    Secondary,
    SecondaryPreferred,
    Nearest,
}

impl ReadPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadPreference::Primary => "primary",
            ReadPreference::PrimaryPreferred => "primaryPreferred",
            ReadPreference::Secondary => "secondary",
            ReadPreference::SecondaryPreferred => "secondaryPreferred",
            ReadPreference::Nearest => "nearest",
        }
    }
}

/// Options for obtaining a collection handle.
///
/// Any non-default options make the Store hand out a new, uncached handle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionOptions {
    pub read_preference: Option<ReadPreference>,
    pub write_concern: Option<Document>,
    pub read_concern: Option<Document>,
}

impl CollectionOptions {
    pub fn is_default(&self) -> bool {
        self == &CollectionOptions::default()
    }
}

/// Options for obtaining a database handle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatabaseOptions {
    pub read_preference: Option<ReadPreference>,
    pub write_concern: Option<Document>,
    pub read_concern: Option<Document>,
}

impl DatabaseOptions {
    pub fn is_default(&self) -> bool {
        self == &DatabaseOptions::default()
    }
}

/// A single operation of a `bulk_write` batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteModel {
    InsertOne {
        document: Document,
    },
    UpdateOne {
        filter: Document,
        update: Document,
        upsert: bool,
    },
    UpdateMany {
        filter: Document,
        update: Document,
        upsert: bool,
    },
    ReplaceOne {
        filter: Document,
        replacement: Document,
        upsert: bool,
    },
    DeleteOne {
        filter: Document,
    },
    DeleteMany {
        filter: Document,
    },
}
