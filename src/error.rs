//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for the gateway. Each variant
//! maps to a specific HTTP status code and a JSON body carrying a single
//! `error` message field.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// { "error": "Access denied to this domain" }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
}

/// Server-side error enum with HTTP status code mapping.
///
/// | Variant           | HTTP Status               |
/// |-------------------|---------------------------|
/// | `InvalidInput`    | 400 Bad Request           |
/// | `Unauthorized`    | 401 Unauthorized          |
/// | `AccessDenied`    | 403 Forbidden             |
/// | `NotFound`        | 404 Not Found             |
/// | `UpstreamFailure` | 502 Bad Gateway           |
/// | `StorageFailure`  | 500 Internal Server Error |
/// | `Internal`        | 500 Internal Server Error |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// A required field is missing or malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Bearer token missing, malformed, badly signed or expired.
    #[error("Unauthorized")]
    Unauthorized,

    /// Caller is authenticated but does not own the domain.
    #[error("Access denied to this domain")]
    AccessDenied,

    /// Unknown resource or path.
    #[error("not found: {0}")]
    NotFound(String),

    /// Third-party API returned a non-2xx status, timed out, or sent an
    /// unreadable body.
    #[error("upstream failure ({source_name}): {message}")]
    UpstreamFailure {
        /// Upstream that failed (e.g. `"woocommerce"`).
        source_name: String,
        /// Failure description.
        message: String,
    },

    /// Persistence layer failure.
    #[error("storage failure: {0}")]
    StorageFailure(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Builds an [`GatewayError::UpstreamFailure`] for the named upstream.
    #[must_use]
    pub fn upstream(source_name: &str, message: impl Into<String>) -> Self {
        Self::UpstreamFailure {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::UpstreamFailure { .. } => StatusCode::BAD_GATEWAY,
            Self::StorageFailure(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        Self::StorageFailure(err.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: self.to_string(),
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
