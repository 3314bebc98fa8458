//! API Error Types
//!
//! Defines error types for the API layer and implements conversion
//! to HTTP responses with appropriate status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::builder::{BuilderError, ValidationErrors};
use crate::ranking::RankingError;
use crate::store::StoreError;

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Campaign draft validation failed
    #[error("Invalid campaign: {0}")]
    Draft(ValidationErrors),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Write conflicts with existing data
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Campaign store error
    #[error("Store error: {0}")]
    Store(StoreError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => ApiError::NotFound(what),
            StoreError::Conflict(what) => ApiError::Conflict(what),
            other => ApiError::Store(other),
        }
    }
}

impl From<RankingError> for ApiError {
    fn from(e: RankingError) -> Self {
        match e {
            RankingError::NotFound(id) => ApiError::NotFound(format!("campaign {}", id)),
            RankingError::Store(e) => e.into(),
        }
    }
}

impl From<BuilderError> for ApiError {
    fn from(e: BuilderError) -> Self {
        match e {
            BuilderError::Validation(errors) => ApiError::Draft(errors),
            BuilderError::Store(e) => e.into(),
        }
    }
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
    pub request_id: String,
}

/// Error details
#[derive(Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<ErrorDetail>,
}

/// One field-level problem
#[derive(Serialize)]
pub struct ErrorDetail {
    pub field: String,
    pub message: String,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::Draft(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Store(StoreError::Upstream(_) | StoreError::UpstreamStatus { .. }) => {
                (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR")
            }
            ApiError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
        }
    }

    fn details(&self) -> Vec<ErrorDetail> {
        match self {
            ApiError::Draft(errors) => errors
                .iter()
                .map(|e| ErrorDetail {
                    field: e.field().to_string(),
                    message: e.to_string(),
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let request_id = uuid::Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(
                request_id = %request_id,
                error_code = %code,
                error_message = %self,
                "API error occurred"
            );
        } else {
            tracing::warn!(
                request_id = %request_id,
                error_code = %code,
                error_message = %self,
                "API request rejected"
            );
        }

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: self.to_string(),
                details: self.details(),
            },
            request_id,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;
