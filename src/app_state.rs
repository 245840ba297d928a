//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::auth::TokenAuthority;
use crate::service::MetricsService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Metrics service for all business logic.
    pub metrics_service: Arc<MetricsService>,
    /// Bearer token verification.
    pub token_authority: Arc<TokenAuthority>,
}
