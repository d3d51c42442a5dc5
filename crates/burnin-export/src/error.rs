//! Export error types.

use thiserror::Error;

use burnin_media::MediaError;
use burnin_models::SegmentError;
use burnin_store::StoreError;

pub type ExportResult<T> = Result<T, ExportError>;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Invalid segments: {0}")]
    InvalidSegments(#[from] SegmentError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Upload not found: {0}")]
    UploadNotFound(String),

    #[error("Export not found or expired")]
    NotFound,

    #[error("invalid or expired")]
    InvalidOrExpired,

    #[error("Encode failed: {0}")]
    EncodeFailed(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExportError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn upload_not_found(upload_id: impl Into<String>) -> Self {
        Self::UploadNotFound(upload_id.into())
    }

    pub fn encode_failed(msg: impl Into<String>) -> Self {
        Self::EncodeFailed(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Errors caused by the caller's input rather than the system.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ExportError::InvalidSegments(_) | ExportError::InvalidRequest(_)
        )
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ExportError::InvalidSegments(_) => "invalid_segments",
            ExportError::InvalidRequest(_) => "invalid_request",
            ExportError::UploadNotFound(_) => "upload_not_found",
            ExportError::NotFound => "not_found",
            ExportError::InvalidOrExpired => "invalid_or_expired",
            ExportError::EncodeFailed(_) => "encode_failed",
            ExportError::Store(_) => "store",
            ExportError::Media(MediaError::Timeout(_)) => "timeout",
            ExportError::Media(_) => "media",
            ExportError::Io(_) => "io",
            ExportError::Internal(_) => "internal",
        }
    }
}
