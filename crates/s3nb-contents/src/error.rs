use s3nb_store::StoreError;
use s3nb_trust::TrustError;
use s3nb_types::TypeError;
use thiserror::Error;

/// Errors surfaced to the host by the contents manager.
#[derive(Debug, Error)]
pub enum ContentsError {
    /// The request or the stored data is unusable. Status 400.
    #[error("{0}")]
    BadRequest(String),

    /// The addressed item does not exist. Status 404.
    #[error("{0}")]
    NotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("trust error: {0}")]
    Trust(#[from] TrustError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ContentsError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// HTTP-style status class a host should report.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::NotFound(_) => 404,
            Self::Config(_) | Self::Store(_) | Self::Trust(_) | Self::Internal(_) => 500,
        }
    }
}

impl From<TypeError> for ContentsError {
    fn from(err: TypeError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

pub type ContentsResult<T> = Result<T, ContentsError>;
