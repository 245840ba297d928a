//! Domain registry handlers: list, register/update, remove.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{DomainDto, DomainListResponse, RemoveDomainResponse, UpsertDomainRequest};
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::DomainId;
use crate::error::{ErrorResponse, GatewayError};

/// `GET /domains`: Domains owned by the caller.
///
/// # Errors
///
/// Returns [`GatewayError`] on storage failure.
#[utoipa::path(
    get,
    path = "/domains",
    tag = "Domains",
    summary = "List domains",
    description = "Returns every domain owned by the authenticated user with its source flags.",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Owned domains", body = DomainListResponse),
        (status = 401, description = "Missing, invalid or expired token", body = ErrorResponse),
    )
)]
pub async fn list_domains(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, GatewayError> {
    let domains = state.metrics_service.list_domains(&user).await?;
    Ok(Json(DomainListResponse {
        domains: domains.into_iter().map(DomainDto::from).collect(),
    }))
}

/// `PUT /domains/{domain}`: Register a domain or update one the caller
/// owns.
///
/// # Errors
///
/// Returns [`GatewayError::AccessDenied`] if another user owns the domain.
#[utoipa::path(
    put,
    path = "/domains/{domain}",
    tag = "Domains",
    summary = "Register or update a domain",
    description = "Creates the domain for the caller, or updates its name and source flags if the caller already owns it.",
    security(("bearer" = [])),
    params(("domain" = String, Path, description = "Domain identifier, e.g. `shop.example.com`")),
    request_body = UpsertDomainRequest,
    responses(
        (status = 200, description = "Stored domain", body = DomainDto),
        (status = 400, description = "Invalid domain", body = ErrorResponse),
        (status = 401, description = "Missing, invalid or expired token", body = ErrorResponse),
        (status = 403, description = "Domain owned by another user", body = ErrorResponse),
    )
)]
pub async fn upsert_domain(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(domain): Path<String>,
    Json(req): Json<UpsertDomainRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let domain = DomainId::parse(&domain)?;
    let stored = state
        .metrics_service
        .upsert_domain(
            &user,
            domain,
            req.name.as_deref().unwrap_or_default(),
            req.woocommerce_enabled,
            req.ga_enabled,
        )
        .await?;
    Ok(Json(DomainDto::from(stored)))
}

/// `DELETE /domains/{domain}`: Remove a domain and all of its metrics.
///
/// # Errors
///
/// Returns [`GatewayError::AccessDenied`] unless the caller owns the
/// domain.
#[utoipa::path(
    delete,
    path = "/domains/{domain}",
    tag = "Domains",
    summary = "Remove a domain",
    description = "Deletes the domain and every stored record that belongs to it.",
    security(("bearer" = [])),
    params(("domain" = String, Path, description = "Domain identifier")),
    responses(
        (status = 200, description = "Domain removed", body = RemoveDomainResponse),
        (status = 401, description = "Missing, invalid or expired token", body = ErrorResponse),
        (status = 403, description = "Access denied to this domain", body = ErrorResponse),
    )
)]
pub async fn remove_domain(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(domain): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let domain = DomainId::parse(&domain)?;
    let removed_records = state.metrics_service.remove_domain(&user, &domain).await?;
    Ok(Json(RemoveDomainResponse {
        domain: domain.into(),
        removed_records,
    }))
}

/// Domain routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/domains", get(list_domains))
        .route(
            "/domains/{domain}",
            axum::routing::put(upsert_domain).delete(remove_domain),
        )
}
