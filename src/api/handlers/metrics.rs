//! Metrics handlers: ranged reads, latest view, on-demand combine.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;

use crate::api::dto::{MetricsParams, MetricsResponse, RecordResponse, WindowParams};
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::DomainId;
use crate::error::{ErrorResponse, GatewayError};

/// `GET /metrics/{domain}`: Stored records of a domain inside a window.
///
/// # Errors
///
/// Returns [`GatewayError::AccessDenied`] unless the caller owns the
/// domain, or [`GatewayError::InvalidInput`] for a bad window or source.
#[utoipa::path(
    get,
    path = "/metrics/{domain}",
    tag = "Metrics",
    summary = "Read metrics",
    description = "Returns source and combined records of the domain recorded inside the window, newest first. `period` takes precedence over `days`; the default window is 30 days.",
    security(("bearer" = [])),
    params(
        ("domain" = String, Path, description = "Domain identifier"),
        ("period" = Option<String>, Query, description = "7d, 14d, 30d or 90d"),
        ("days" = Option<u32>, Query, description = "Window in days, 1 to 365"),
        ("source" = Option<String>, Query, description = "woocommerce, google_analytics or combined"),
    ),
    responses(
        (status = 200, description = "Records in the window", body = MetricsResponse),
        (status = 400, description = "Invalid window or source", body = ErrorResponse),
        (status = 401, description = "Missing, invalid or expired token", body = ErrorResponse),
        (status = 403, description = "Access denied to this domain", body = ErrorResponse),
    )
)]
pub async fn get_metrics(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(domain): Path<String>,
    Query(params): Query<MetricsParams>,
) -> Result<impl IntoResponse, GatewayError> {
    let domain = DomainId::parse(&domain)?;
    let window = params.window.window()?;
    let source = params.source()?;

    let metrics = state
        .metrics_service
        .metrics_for(&user, &domain, window, source, Utc::now())
        .await?;

    Ok(Json(MetricsResponse {
        domain: domain.into(),
        days: window.days(),
        metrics,
    }))
}

/// `GET /metrics/{domain}/latest`: Most recent combined view.
///
/// # Errors
///
/// Returns [`GatewayError::AccessDenied`] unless the caller owns the
/// domain and [`GatewayError::NotFound`] when the window is empty.
#[utoipa::path(
    get,
    path = "/metrics/{domain}/latest",
    tag = "Metrics",
    summary = "Latest combined metrics",
    description = "Returns the newest combined record in the window. Without one, the latest source records are merged on the fly.",
    security(("bearer" = [])),
    params(
        ("domain" = String, Path, description = "Domain identifier"),
        ("period" = Option<String>, Query, description = "7d, 14d, 30d or 90d"),
        ("days" = Option<u32>, Query, description = "Window in days, 1 to 365"),
    ),
    responses(
        (status = 200, description = "Latest combined record", body = RecordResponse),
        (status = 401, description = "Missing, invalid or expired token", body = ErrorResponse),
        (status = 403, description = "Access denied to this domain", body = ErrorResponse),
        (status = 404, description = "No metrics in the window", body = ErrorResponse),
    )
)]
pub async fn get_latest(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(domain): Path<String>,
    Query(params): Query<WindowParams>,
) -> Result<impl IntoResponse, GatewayError> {
    let domain = DomainId::parse(&domain)?;
    let window = params.window()?;
    let record = state
        .metrics_service
        .latest_for(&user, &domain, window, Utc::now())
        .await?;

    Ok(Json(RecordResponse {
        domain: domain.into(),
        days: window.days(),
        metrics: record,
    }))
}

/// `POST /metrics/{domain}/combine`: Recompute the combined record now.
///
/// # Errors
///
/// Returns [`GatewayError::AccessDenied`] unless the caller owns the
/// domain and [`GatewayError::NotFound`] when there is nothing to combine.
#[utoipa::path(
    post,
    path = "/metrics/{domain}/combine",
    tag = "Metrics",
    summary = "Recompute combined metrics",
    description = "Merges the latest source records in the window and stores the combined record. Safe to repeat.",
    security(("bearer" = [])),
    params(
        ("domain" = String, Path, description = "Domain identifier"),
        ("period" = Option<String>, Query, description = "7d, 14d, 30d or 90d"),
        ("days" = Option<u32>, Query, description = "Window in days, 1 to 365"),
    ),
    responses(
        (status = 200, description = "Stored combined record", body = RecordResponse),
        (status = 401, description = "Missing, invalid or expired token", body = ErrorResponse),
        (status = 403, description = "Access denied to this domain", body = ErrorResponse),
        (status = 404, description = "No source records in the window", body = ErrorResponse),
    )
)]
pub async fn combine(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(domain): Path<String>,
    Query(params): Query<WindowParams>,
) -> Result<impl IntoResponse, GatewayError> {
    let domain = DomainId::parse(&domain)?;
    let window = params.window()?;
    let record = state
        .metrics_service
        .combine_for(&user, &domain, window, Utc::now())
        .await?;

    Ok(Json(RecordResponse {
        domain: domain.into(),
        days: window.days(),
        metrics: record,
    }))
}

/// Metrics routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/metrics/{domain}", get(get_metrics))
        .route("/metrics/{domain}/latest", get(get_latest))
        .route("/metrics/{domain}/combine", post(combine))
}
