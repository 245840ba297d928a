//! DTOs for the domain registry endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::TrackedDomain;

/// A tracked domain as returned to its owner.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DomainDto {
    /// Domain identifier.
    pub domain_id: String,
    /// Display name.
    pub name: String,
    /// Whether WooCommerce metrics are collected.
    pub woocommerce_enabled: bool,
    /// Whether Analytics metrics are collected.
    pub ga_enabled: bool,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Last change.
    pub updated_at: DateTime<Utc>,
}

impl From<TrackedDomain> for DomainDto {
    fn from(domain: TrackedDomain) -> Self {
        Self {
            domain_id: domain.domain_id.into(),
            name: domain.name,
            woocommerce_enabled: domain.woocommerce_enabled,
            ga_enabled: domain.ga_enabled,
            created_at: domain.created_at,
            updated_at: domain.updated_at,
        }
    }
}

/// `GET /domains` response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DomainListResponse {
    /// Domains owned by the caller.
    pub domains: Vec<DomainDto>,
}

/// `PUT /domains/{domain}` request body.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpsertDomainRequest {
    /// Display name; defaults to the domain identifier.
    #[serde(default)]
    pub name: Option<String>,
    /// Collect WooCommerce metrics.
    #[serde(default)]
    pub woocommerce_enabled: bool,
    /// Collect Analytics metrics.
    #[serde(default)]
    pub ga_enabled: bool,
}

/// `DELETE /domains/{domain}` response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RemoveDomainResponse {
    /// Removed domain.
    pub domain: String,
    /// Number of metrics records deleted with it.
    pub removed_records: u64,
}
