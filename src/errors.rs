//! Error taxonomy for tree operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TreeError {
    /// A path segment could not be resolved against the current structure.
    /// `path` is the dotted path up to and including the failing segment.
    #[error("key not found: {path}")]
    KeyNotFound { path: String },

    /// An empty path was supplied to a mutating operation.
    #[error("empty key")]
    EmptyPath,

    /// Traversal reached a value that is neither a collection nor an
    /// opted-in external object, or an expansion descriptor is malformed.
    #[error("unsupported shape at: {path}")]
    UnsupportedShape { path: String },

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type TreeResult<T> = Result<T, TreeError>;
