use s3nb_types::TypeError;

/// Errors from signing and trust checks.
#[derive(Debug, thiserror::Error)]
pub enum TrustError {
    /// The notebook could not be encoded for hashing.
    #[error("notebook encoding failed: {0}")]
    Encoding(#[from] TypeError),

    /// A configured signing key is not 32 bytes of hex.
    #[error("invalid signing key: {0}")]
    InvalidKey(String),

    /// The signature store failed.
    #[error("signature store error: {0}")]
    Store(String),
}

/// Result alias for trust operations.
pub type TrustResult<T> = Result<T, TrustError>;
