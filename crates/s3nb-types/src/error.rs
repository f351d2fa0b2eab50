use thiserror::Error;

/// Errors produced while decoding or validating document models.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("No file type provided")]
    MissingType,

    #[error("No file content provided")]
    MissingContent,

    #[error("Unhandled contents type: {0}")]
    UnhandledType(String),

    #[error("Must specify format of file contents as 'text' or 'base64'")]
    InvalidFormat(Option<String>),

    #[error("file content must be a string")]
    ContentNotString,

    #[error("unsupported nbformat version {0}, expected 4")]
    UnsupportedVersion(u64),

    #[error("invalid notebook: {0}")]
    InvalidNotebook(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result alias for type operations.
pub type TypeResult<T> = Result<T, TypeError>;
