//! # Web API Error Types
//!
//! Errors returned by HTTP handlers and their response conversions.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::error::ListenerError;

/// Web API specific errors with HTTP status code mappings
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Resource not found")]
    NotFound,

    #[error("Invalid request: {message}")]
    BadRequest { message: String },

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Service temporarily unavailable")]
    ServiceUnavailable,

    #[error("Request timeout")]
    Timeout,

    #[error("Database operation failed: {operation}")]
    DatabaseError { operation: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn database_error(operation: impl Into<String>) -> Self {
        Self::DatabaseError {
            operation: operation.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Timeout => StatusCode::REQUEST_TIMEOUT,
            ApiError::DatabaseError { .. } | ApiError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<ListenerError> for ApiError {
    fn from(err: ListenerError) -> Self {
        match err {
            ListenerError::Validation(message) => ApiError::BadRequest { message },
            ListenerError::Database(operation) => ApiError::DatabaseError { operation },
            other => ApiError::internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        let (error_code, message) = match &self {
            ApiError::NotFound => ("NOT_FOUND", "Resource not found"),
            ApiError::BadRequest { message } => ("BAD_REQUEST", message.as_str()),
            ApiError::PayloadTooLarge => ("PAYLOAD_TOO_LARGE", "Request body too large"),
            ApiError::ServiceUnavailable => {
                ("SERVICE_UNAVAILABLE", "Service temporarily unavailable")
            }
            ApiError::Timeout => ("TIMEOUT", "Request timeout"),
            ApiError::DatabaseError { operation } => ("DATABASE_ERROR", operation.as_str()),
            ApiError::Internal { message } => ("INTERNAL_ERROR", message.as_str()),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status_code, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
