//! API error types.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use burnin_export::ExportError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Gone(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    /// Requested byte range starts past the end of a file of this size.
    #[error("Range not satisfiable")]
    RangeNotSatisfiable(u64),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Export(#[from] ExportError),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Gone(_) => StatusCode::GONE,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::RangeNotSatisfiable(_) => StatusCode::RANGE_NOT_SATISFIABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Export(e) => match e {
                ExportError::InvalidSegments(_) | ExportError::InvalidRequest(_) => {
                    StatusCode::BAD_REQUEST
                }
                ExportError::UploadNotFound(_) | ExportError::NotFound => StatusCode::NOT_FOUND,
                ExportError::InvalidOrExpired => StatusCode::GONE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't expose internal error details in production
        let detail = if status == StatusCode::INTERNAL_SERVER_ERROR
            && std::env::var("ENVIRONMENT").unwrap_or_default() == "production"
        {
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = Json(ErrorResponse { detail });
        match self {
            ApiError::RangeNotSatisfiable(size) => (
                status,
                [(header::CONTENT_RANGE, format!("bytes */{}", size))],
                body,
            )
                .into_response(),
            _ => (status, body).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burnin_models::SegmentError;

    #[test]
    fn test_export_error_status() {
        let cases = [
            (
                ApiError::from(ExportError::InvalidSegments(SegmentError::NoValidSegments)),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(ExportError::upload_not_found("u1")),
                StatusCode::NOT_FOUND,
            ),
            (ApiError::from(ExportError::InvalidOrExpired), StatusCode::GONE),
            (
                ApiError::from(ExportError::encode_failed("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(error.status_code(), status, "{}", error);
        }
    }

    #[test]
    fn test_range_error_carries_size() {
        let response = ApiError::RangeNotSatisfiable(1234).into_response();
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */1234");
    }

    #[test]
    fn test_handoff_message() {
        assert_eq!(
            ApiError::from(ExportError::InvalidOrExpired).to_string(),
            "invalid or expired"
        );
    }
}
