//! Maps `IngestError`'s category (spec.md §7) onto HTTP status codes, plus
//! the handful of request-shape errors the HTTP layer itself can raise
//! before a request ever reaches the pipeline.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use monitor_core::error::{ErrorCategory, ErrorExt};
use monitor_ingest::error::IngestError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Ingest(#[from] IngestError),

    /// Request body failed shape validation before it reached a worker
    /// (spec.md §4.5, "`400` on malformed body").
    #[error("{0}")]
    BadRequest(String),

    #[error("unknown project")]
    UnknownProject,

    #[error("invalid API key")]
    Unauthorized,

    #[error("rate limit exceeded")]
    TooManyRequests,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Ingest(e) => match e.category() {
                ErrorCategory::Payload => StatusCode::BAD_REQUEST,
                ErrorCategory::Backpressure => StatusCode::TOO_MANY_REQUESTS,
                ErrorCategory::Resource => StatusCode::OK,
                ErrorCategory::Transient | ErrorCategory::Internal => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::UnknownProject => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let code = match self {
            ApiError::Ingest(e) => e.error_code(),
            ApiError::BadRequest(_) => "bad_request",
            ApiError::UnknownProject => "unknown_project",
            ApiError::Unauthorized => "unauthorized",
            ApiError::TooManyRequests => "rate_limited",
        };
        HttpResponse::build(self.status_code()).json(json!({
            "ok": false,
            "error": code,
            "message": self.to_string(),
        }))
    }
}
