//! Error types for the async facade.

use bson::Bson;
use thiserror::Error;

use docmock_core::error::StoreError;

/// Represents all failures a facade operation can report.
#[derive(Error, Debug)]
pub enum FacadeError {
    /// A Store failure, surfaced unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A cursor has no more documents.
    #[error("cursor exhausted")]
    EndOfSequence,
    /// The GridFS bucket rejected the request.
    #[error("GridFS error: {0}")]
    GridFs(String),
    /// No GridFS file exists with the given id.
    #[error("no file found with id {0}")]
    FileNotFound(Bson),
    /// No runtime handle was bound and none is running.
    #[error("no async runtime available: {0}")]
    NoRuntime(String),
}

/// A specialized `Result` type for facade operations.
pub type FacadeResult<T> = Result<T, FacadeError>;

impl FacadeError {
    pub fn is_end_of_sequence(&self) -> bool {
        matches!(self, FacadeError::EndOfSequence)
    }

    /// The underlying Store failure, if this is one.
    pub fn as_store_error(&self) -> Option<&StoreError> {
        match self {
            FacadeError::Store(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_duplicate_key(&self) -> bool {
        self.as_store_error().is_some_and(StoreError::is_duplicate_key)
    }

    pub fn is_not_implemented(&self) -> bool {
        self.as_store_error().is_some_and(StoreError::is_not_implemented)
    }
}

impl From<std::io::Error> for FacadeError {
    fn from(err: std::io::Error) -> Self {
        FacadeError::GridFs(err.to_string())
    }
}
