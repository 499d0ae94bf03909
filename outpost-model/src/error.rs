//! Error types for the model layer.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Schema compilation failures. Always raised while building a schema,
/// never deferred to the first instance.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A field's `type` token is not one of the known kinds.
    #[error("invalid type ({token}) for property {field}")]
    UnknownType { field: String, token: String },

    /// A virtual field was declared without a getter.
    #[error("virtual property {0} has no getter")]
    MissingGetter(String),

    /// Array elements cannot be virtual.
    #[error("array property {0} declares virtual elements")]
    VirtualItems(String),

    /// A top-level definition without a name.
    #[error("a model name is required")]
    MissingName,
}

/// Errors raised by proxy operations.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Schema compilation failed.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// `set` was called with an empty path.
    #[error("invalid path value")]
    InvalidPath,

    /// A value could not be coerced to the field's declared type.
    #[error("cannot cast {found} to {expected} for property {field}")]
    Cast {
        field: String,
        expected: &'static str,
        found: String,
    },

    /// Write to a virtual field or date component that has no setter.
    #[error("property {0} is read-only")]
    ReadOnly(String),

    /// A definition could not be parsed.
    #[error("definition parse error: {0}")]
    Definition(#[from] serde_json::Error),
}

impl ModelError {
    pub(crate) fn cast(field: &str, expected: &'static str, found: impl Into<String>) -> Self {
        ModelError::Cast {
            field: field.to_owned(),
            expected,
            found: found.into(),
        }
    }
}
