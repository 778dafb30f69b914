//! Unified error handling with consistent API response envelope.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Error detail in the API response envelope.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

/// Consistent JSON envelope for all API responses.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Wrap a successful result in the envelope.
    pub fn success(data: T) -> Json<Self> {
        Json(Self {
            data: Some(data),
            error: None,
        })
    }

    /// Wrap an error in the envelope.
    pub fn error(code: &str, message: &str) -> Json<Self> {
        Json(Self {
            data: None,
            error: Some(ApiError {
                code: code.to_string(),
                message: message.to_string(),
            }),
        })
    }
}

/// Error returned by a Scan Service call.
///
/// The variant decides retry behavior: `Transient` and `Timeout` are retried
/// up to the configured budget, `Validation` and `Parse` are surfaced
/// immediately, `Unreachable` aborts the whole operation at call setup.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    /// Network hiccup or 5xx from the Scan Service.
    #[error("transient gateway error: {0}")]
    Transient(String),

    /// Rejected input (4xx). Never retried.
    #[error("validation error: {0}")]
    Validation(String),

    /// Request exceeded the configured timeout.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// Malformed response body. Never retried.
    #[error("malformed gateway response: {0}")]
    Parse(String),

    /// Scan Service could not be reached at all.
    #[error("gateway unreachable: {0}")]
    Unreachable(String),
}

impl GatewayError {
    /// Whether a retry within the attempt budget makes sense.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout(_))
    }
}

/// Application error type mapping to HTTP status codes.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Scan service error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Check if this error represents a not-found condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Gateway(e) => {
                tracing::error!(error = %e, "Scan service error");
                match e {
                    GatewayError::Validation(msg) => {
                        (StatusCode::BAD_REQUEST, "GATEWAY_VALIDATION", msg.clone())
                    }
                    GatewayError::Unreachable(_) => (
                        StatusCode::BAD_GATEWAY,
                        "GATEWAY_UNREACHABLE",
                        e.to_string(),
                    ),
                    _ => (StatusCode::BAD_GATEWAY, "GATEWAY_ERROR", e.to_string()),
                }
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ApiResponse::<()> {
            data: None,
            error: Some(ApiError {
                code: code.to_string(),
                message,
            }),
        };

        (status, Json(body)).into_response()
    }
}
