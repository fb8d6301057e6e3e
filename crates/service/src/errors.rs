use thiserror::Error;

use crate::storage::StoreError;

/// Failures surfaced by the review pipeline.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("validation failed: {0}")]
    ValidationFailed(String),
    #[error("too many files: at most {max} images allowed, got {got}")]
    TooManyFiles { max: usize, got: usize },
    #[error("file too large: {name} exceeds {max_bytes} bytes")]
    FileTooLarge { name: String, max_bytes: usize },
    #[error("forbidden")]
    Forbidden,
    #[error("review not found")]
    NotFound,
    #[error("upload failed: {0}")]
    UploadFailed(String),
    #[error("object store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("persistence failed: {0}")]
    PersistenceFailed(String),
}

impl ReviewError {
    pub fn validation(msg: impl Into<String>) -> Self { Self::ValidationFailed(msg.into()) }

    /// Stable numeric code for external mapping/logging
    pub fn code(&self) -> u16 {
        match self {
            ReviewError::ValidationFailed(_) => 2001,
            ReviewError::TooManyFiles { .. } => 2002,
            ReviewError::FileTooLarge { .. } => 2003,
            ReviewError::Forbidden => 2004,
            ReviewError::NotFound => 2005,
            ReviewError::UploadFailed(_) => 2101,
            ReviewError::StoreUnavailable(_) => 2102,
            ReviewError::PersistenceFailed(_) => 2201,
        }
    }

    /// HTTP status this error maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            ReviewError::ValidationFailed(_)
            | ReviewError::TooManyFiles { .. }
            | ReviewError::FileTooLarge { .. } => 400,
            ReviewError::Forbidden => 403,
            ReviewError::NotFound => 404,
            ReviewError::UploadFailed(_)
            | ReviewError::StoreUnavailable(_)
            | ReviewError::PersistenceFailed(_) => 500,
        }
    }
}

impl From<models::errors::ModelError> for ReviewError {
    fn from(e: models::errors::ModelError) -> Self {
        match e {
            models::errors::ModelError::Validation(msg) => ReviewError::ValidationFailed(msg),
            models::errors::ModelError::Db(msg) => ReviewError::PersistenceFailed(msg),
        }
    }
}

impl From<StoreError> for ReviewError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(_) | StoreError::Timeout(_) => ReviewError::StoreUnavailable(e.to_string()),
            StoreError::Rejected(_) | StoreError::InvalidReference(_) => ReviewError::UploadFailed(e.to_string()),
        }
    }
}
