//! Error types for the document layer.

use outpost_model::{ModelError, SchemaError};
use outpost_types::DocumentId;
use thiserror::Error;

/// Document-layer errors.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// A proxy operation or schema compilation failed.
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// The `validate` hook rejected the document.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The store holds a different etag than the one this document was
    /// loaded with.
    #[error("document {id} was modified concurrently")]
    Conflict { id: DocumentId },

    /// No document with this id exists in the collection.
    #[error("document {0} not found")]
    NotFound(DocumentId),

    /// `remove` was called on a document that was never saved.
    #[error("document has no identifier")]
    Unsaved,

    /// The backing store failed.
    #[error("store error: {0}")]
    Store(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<SchemaError> for DocumentError {
    fn from(err: SchemaError) -> Self {
        DocumentError::Model(ModelError::Schema(err))
    }
}

/// Result type for document operations.
pub type DocumentResult<T> = Result<T, DocumentError>;
