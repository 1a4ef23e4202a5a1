//! Error types and result types for Store operations.
//!
//! Every synchronous Store operation returns [`StoreResult<T>`]. The variants mirror the
//! failure classes a document driver reports, so the async facade can surface them unchanged.

use bson::{Document, doc, error::Error as BsonError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Server error code reported for duplicate-key violations.
pub const DUPLICATE_KEY_CODE: i32 = 11000;

/// Structured detail attached to an enriched duplicate-key failure.
///
/// `key_value` holds the values extracted from the rejected document for every field of
/// `key_pattern`, with missing fields reported as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateKeyDetail {
    /// The conflicting values, keyed by index field.
    pub key_value: Document,
    /// The key pattern of the unique index that explains the conflict.
    pub key_pattern: Document,
}

impl DuplicateKeyDetail {
    pub fn new(key_value: Document, key_pattern: Document) -> Self {
        Self { key_value, key_pattern }
    }

    /// Renders the detail the way a server reply carries it.
    pub fn to_document(&self) -> Document {
        doc! {
            "keyValue": self.key_value.clone(),
            "keyPattern": self.key_pattern.clone(),
        }
    }
}

/// Represents all failures the Store can report.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// A write would violate a unique index.
    ///
    /// The Store itself only ever raises this without `detail`; the facade layer attaches
    /// the detail once it has found the unique index that explains the conflict.
    #[error("{message}")]
    DuplicateKey {
        message: String,
        detail: Option<DuplicateKeyDetail>,
    },
    /// The command or operation is not simulated by the Store.
    #[error("Not implemented: {0}")]
    NotImplemented(String),
    /// A database or collection name was rejected.
    #[error("Invalid name: {0}")]
    InvalidName(String),
    /// The operation is not valid in the handle's current state.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
    /// The Store could not evaluate the request (bad filter, bad update, ...).
    #[error("Operation failure: {0}")]
    OperationFailure(String),
    /// Serialization/deserialization error when converting to or from BSON.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// A specialized `Result` type for Store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Creates a bare duplicate-key failure, as raised by the Store's uniqueness checks.
    pub fn duplicate_key(message: impl Into<String>) -> Self {
        StoreError::DuplicateKey {
            message: message.into(),
            detail: None,
        }
    }

    pub fn not_implemented(what: impl Into<String>) -> Self {
        StoreError::NotImplemented(what.into())
    }

    pub fn operation_failure(message: impl Into<String>) -> Self {
        StoreError::OperationFailure(message.into())
    }

    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, StoreError::DuplicateKey { .. })
    }

    pub fn is_not_implemented(&self) -> bool {
        matches!(self, StoreError::NotImplemented(_))
    }

    /// Server error code, where the failure class has one.
    pub fn code(&self) -> Option<i32> {
        match self {
            StoreError::DuplicateKey { .. } => Some(DUPLICATE_KEY_CODE),
            StoreError::NotImplemented(_) => Some(115),
            StoreError::InvalidName(_) => Some(73),
            _ => None,
        }
    }

    /// Returns the enriched duplicate-key detail, if any.
    pub fn duplicate_key_detail(&self) -> Option<&DuplicateKeyDetail> {
        match self {
            StoreError::DuplicateKey { detail, .. } => detail.as_ref(),
            _ => None,
        }
    }
}

impl From<BsonError> for StoreError {
    fn from(err: BsonError) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
