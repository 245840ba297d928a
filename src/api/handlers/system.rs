//! System endpoints: health check and API info.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::dto::ApiInfoResponse;
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::error::ErrorResponse;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /health`: Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp. No authentication.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// `GET /`: API banner and the authenticated caller.
#[utoipa::path(
    get,
    path = "/",
    tag = "System",
    summary = "API info",
    description = "Returns the API name, version, and the user id carried by the bearer token.",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "API info", body = ApiInfoResponse),
        (status = 401, description = "Missing, invalid or expired token", body = ErrorResponse),
    )
)]
pub async fn info_handler(AuthUser(user): AuthUser) -> impl IntoResponse {
    Json(ApiInfoResponse {
        message: "Dashora Analytics API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        user_id: user.into(),
    })
}

/// System routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/", get(info_handler))
}
