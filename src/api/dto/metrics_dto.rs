//! DTOs for the metrics endpoints.
//!
//! Records are returned in their stored shape:
//! `{domain, timestamp, expires_at, source, metrics}`. Monetary amounts
//! inside `metrics` are JSON strings.

use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::MetricsRecord;

/// `GET /metrics/{domain}` response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MetricsResponse {
    /// Requested domain.
    pub domain: String,
    /// Window length in days.
    pub days: u32,
    /// Records in the window, newest first.
    #[schema(value_type = Vec<Object>)]
    pub metrics: Vec<MetricsRecord>,
}

/// `GET /metrics/{domain}/latest` and `POST /metrics/{domain}/combine`
/// response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RecordResponse {
    /// Requested domain.
    pub domain: String,
    /// Window length in days.
    pub days: u32,
    /// The combined record.
    #[schema(value_type = Object)]
    pub metrics: MetricsRecord,
}
