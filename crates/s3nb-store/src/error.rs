use std::fmt::Display;

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An operation that needs an existing object found none.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The storage service rejected or failed the request.
    #[error("{operation} failed for {key}: {message}")]
    Backend {
        operation: &'static str,
        key: String,
        message: String,
    },

    /// Local I/O failed while staging a payload.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn backend(operation: &'static str, key: impl Into<String>, cause: impl Display) -> Self {
        Self::Backend {
            operation,
            key: key.into(),
            message: cause.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
