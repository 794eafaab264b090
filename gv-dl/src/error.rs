//! Error types for gv-dl
//!
//! `PipelineError` covers the failures a download request can report back to
//! its caller. `ApiError` is the HTTP-facing error for everything else.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::metadata_extractor::ExtractionError;
use crate::services::process_runner::SpawnError;

/// Caller-visible download failure
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Downloader could not run or exited non-zero
    #[error(transparent)]
    Spawn(#[from] SpawnError),

    /// Required marker missing from downloader output
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// Song record could not be stored
    #[error("Failed to store song record: {0}")]
    Persistence(#[source] gv_common::Error),

    /// Job task stopped before it could answer
    #[error("Download job interrupted: {0}")]
    Interrupted(String),
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// gv-common error
    #[error("Common error: {0}")]
    Common(#[from] gv_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
