//! API Error Types
//!
//! Defines error types for the API layer and implements conversion
//! to HTTP responses with appropriate status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::telemetry::ingest::MSG_MALFORMED;
use crate::telemetry::{IngestError, PublishReply};

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request body is not valid JSON
    #[error("{}", MSG_MALFORMED)]
    MalformedJson,

    /// Payload parsed but could not be applied
    #[error("{0}")]
    Ingest(IngestError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::MalformedJson => ApiError::MalformedJson,
            other => ApiError::Ingest(other),
        }
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MalformedJson => StatusCode::BAD_REQUEST,
            ApiError::Ingest(_) | ApiError::Internal(_) | ApiError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let request_id = uuid::Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(
                request_id = %request_id,
                status = %status,
                error = %self,
                "API error occurred"
            );
        } else {
            tracing::warn!(
                request_id = %request_id,
                status = %status,
                error = %self,
                "Rejected request"
            );
        }

        (status, Json(PublishReply::error(self.to_string()))).into_response()
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;
