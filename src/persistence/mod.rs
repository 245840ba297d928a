//! Persistence layer: tenant registry and the metrics time series.
//!
//! Two async traits describe what the services need. [`MetricsStore`]
//! keeps source and combined records keyed by
//! `(domain, source, timestamp)` with a TTL; [`TenantStore`] keeps users
//! and the domains they own. Both have an in-process implementation in
//! [`memory`] and a PostgreSQL implementation in [`postgres`].

pub mod memory;
pub mod models;
pub mod postgres;
pub mod seed;

use std::fmt::Debug;

use async_trait::async_trait;

pub use memory::{InMemoryMetricsStore, InMemoryTenantStore};
pub use postgres::PostgresPersistence;
pub use seed::TenantSeed;

use crate::domain::{DomainId, MetricsRecord, RecordSource, SourceTag, TrackedDomain, UserId};
use crate::error::GatewayError;

/// Time-series store of [`MetricsRecord`]s.
///
/// Writes overwrite: the last `put` for a given
/// `(domain, source, timestamp)` key wins.
#[async_trait]
pub trait MetricsStore: Send + Sync + Debug {
    /// Writes `record`, replacing any record with the same key.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::StorageFailure`] on backend failure.
    async fn put(&self, record: &MetricsRecord) -> Result<(), GatewayError>;

    /// Newest record of `source` for `domain` with
    /// `from <= timestamp <= to` that has not expired at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::StorageFailure`] on backend failure.
    async fn latest(
        &self,
        domain: &DomainId,
        source: RecordSource,
        from: i64,
        to: i64,
        now: i64,
    ) -> Result<Option<MetricsRecord>, GatewayError>;

    /// Records of `domain` with `from <= timestamp <= to`, newest first,
    /// optionally restricted to one source. Records expired at `now` are
    /// left out even before [`MetricsStore::delete_expired`] removes them.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::StorageFailure`] on backend failure.
    async fn range(
        &self,
        domain: &DomainId,
        from: i64,
        to: i64,
        source: Option<RecordSource>,
        now: i64,
    ) -> Result<Vec<MetricsRecord>, GatewayError>;

    /// Deletes every record of `domain`, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::StorageFailure`] on backend failure.
    async fn delete_domain(&self, domain: &DomainId) -> Result<u64, GatewayError>;

    /// Deletes records whose `expires_at <= now`, returning how many were
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::StorageFailure`] on backend failure.
    async fn delete_expired(&self, now: i64) -> Result<u64, GatewayError>;
}

/// Registry of users and the domains they own.
#[async_trait]
pub trait TenantStore: Send + Sync + Debug {
    /// Creates `user` if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::StorageFailure`] on backend failure.
    async fn ensure_user(&self, user: &UserId) -> Result<(), GatewayError>;

    /// Domains owned by `user`, ordered by domain id. Unknown users own
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::StorageFailure`] on backend failure.
    async fn user_domains(&self, user: &UserId) -> Result<Vec<TrackedDomain>, GatewayError>;

    /// Looks up one domain.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::StorageFailure`] on backend failure.
    async fn domain(&self, id: &DomainId) -> Result<Option<TrackedDomain>, GatewayError>;

    /// Every domain with the given upstream enabled.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::StorageFailure`] on backend failure.
    async fn domains_with_source(&self, tag: SourceTag)
    -> Result<Vec<TrackedDomain>, GatewayError>;

    /// Registers or updates a domain and returns the stored row. An update
    /// keeps the original `created_at`. The owner is created on demand.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::AccessDenied`] if the domain is owned by a
    /// different user, or [`GatewayError::StorageFailure`] on backend
    /// failure.
    async fn upsert_domain(&self, domain: TrackedDomain) -> Result<TrackedDomain, GatewayError>;

    /// Removes a domain. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::StorageFailure`] on backend failure.
    async fn remove_domain(&self, id: &DomainId) -> Result<bool, GatewayError>;
}
