//! Metrics service: tenant-scoped reads, domain administration and
//! combined-record recomputation.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::domain::{
    DomainId, EventBus, MetricsEvent, MetricsRecord, MetricsWindow, RecordSource, TrackedDomain,
    UserId,
};
use crate::error::GatewayError;
use crate::metrics::combine_records;
use crate::persistence::{MetricsStore, TenantStore};

/// Orchestration layer for everything the API reads or changes.
///
/// Every per-domain operation that takes a caller checks ownership first
/// and fails with [`GatewayError::AccessDenied`] whether or not the
/// domain exists, so callers cannot discover other tenants' domains.
#[derive(Debug, Clone)]
pub struct MetricsService {
    tenants: Arc<dyn TenantStore>,
    metrics: Arc<dyn MetricsStore>,
    event_bus: EventBus,
    record_ttl: Duration,
}

impl MetricsService {
    /// Creates a new `MetricsService`.
    #[must_use]
    pub fn new(
        tenants: Arc<dyn TenantStore>,
        metrics: Arc<dyn MetricsStore>,
        event_bus: EventBus,
        record_ttl_days: u32,
    ) -> Self {
        Self {
            tenants,
            metrics,
            event_bus,
            record_ttl: Duration::days(i64::from(record_ttl_days)),
        }
    }

    /// Returns a reference to the inner [`EventBus`].
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Returns the tenant store.
    #[must_use]
    pub fn tenants(&self) -> &Arc<dyn TenantStore> {
        &self.tenants
    }

    /// Returns the metrics store.
    #[must_use]
    pub fn metrics(&self) -> &Arc<dyn MetricsStore> {
        &self.metrics
    }

    /// Lifetime of stored records, in seconds.
    #[must_use]
    pub fn record_ttl_secs(&self) -> i64 {
        self.record_ttl.num_seconds()
    }

    /// Resolves `domain` for `user`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::AccessDenied`] unless `user` owns `domain`.
    pub async fn authorize(
        &self,
        user: &UserId,
        domain: &DomainId,
    ) -> Result<TrackedDomain, GatewayError> {
        match self.tenants.domain(domain).await? {
            Some(tracked) if &tracked.owner == user => Ok(tracked),
            _ => {
                tracing::warn!(%user, %domain, "cross-tenant access rejected");
                Err(GatewayError::AccessDenied)
            }
        }
    }

    /// Domains owned by `user`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::StorageFailure`] on backend failure.
    pub async fn list_domains(&self, user: &UserId) -> Result<Vec<TrackedDomain>, GatewayError> {
        self.tenants.user_domains(user).await
    }

    /// Records of `domain` inside `window`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::AccessDenied`] if `user` does not own
    /// `domain`, or [`GatewayError::StorageFailure`] on backend failure.
    #[tracing::instrument(skip_all, fields(%user, %domain))]
    pub async fn metrics_for(
        &self,
        user: &UserId,
        domain: &DomainId,
        window: MetricsWindow,
        source: Option<RecordSource>,
        now: DateTime<Utc>,
    ) -> Result<Vec<MetricsRecord>, GatewayError> {
        self.authorize(user, domain).await?;
        let (from, to) = window.bounds(now);
        self.metrics
            .range(domain, from, to, source, now.timestamp())
            .await
    }

    /// The most recent view of `domain` inside `window`.
    ///
    /// Prefers the stored combined record. Without one, merges the latest
    /// source records on the fly (without storing the result).
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::AccessDenied`] if `user` does not own
    /// `domain` and [`GatewayError::NotFound`] if the window holds no
    /// record at all.
    #[tracing::instrument(skip_all, fields(%user, %domain))]
    pub async fn latest_for(
        &self,
        user: &UserId,
        domain: &DomainId,
        window: MetricsWindow,
        now: DateTime<Utc>,
    ) -> Result<MetricsRecord, GatewayError> {
        self.authorize(user, domain).await?;
        let (from, to) = window.bounds(now);

        if let Some(combined) = self
            .metrics
            .latest(domain, RecordSource::Combined, from, to, now.timestamp())
            .await?
        {
            return Ok(combined);
        }

        self.merge_latest(domain, window, now)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("no metrics for {domain} in window")))
    }

    /// Recomputes and stores the combined record of `domain` from its
    /// latest source records inside `window`.
    ///
    /// Repeating the call with unchanged source records rewrites the same
    /// key with identical content. Returns `None` when the window holds no
    /// source record.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::StorageFailure`] on backend failure.
    #[tracing::instrument(skip_all, fields(%domain))]
    pub async fn recompute_combined(
        &self,
        domain: &DomainId,
        window: MetricsWindow,
        now: DateTime<Utc>,
    ) -> Result<Option<MetricsRecord>, GatewayError> {
        let Some(combined) = self.merge_latest(domain, window, now).await? else {
            tracing::debug!(%domain, "nothing to combine");
            return Ok(None);
        };

        self.metrics.put(&combined).await?;
        let _ = self.event_bus.publish(MetricsEvent::CombinedRecordStored {
            domain: domain.clone(),
            record_timestamp: combined.timestamp,
            timestamp: Utc::now(),
        });

        tracing::info!(%domain, record_timestamp = combined.timestamp, "combined record stored");
        Ok(Some(combined))
    }

    /// Caller-scoped [`MetricsService::recompute_combined`].
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::AccessDenied`] if `user` does not own
    /// `domain` and [`GatewayError::NotFound`] if there is nothing to
    /// combine.
    #[tracing::instrument(skip_all, fields(%user, %domain))]
    pub async fn combine_for(
        &self,
        user: &UserId,
        domain: &DomainId,
        window: MetricsWindow,
        now: DateTime<Utc>,
    ) -> Result<MetricsRecord, GatewayError> {
        self.authorize(user, domain).await?;
        self.recompute_combined(domain, window, now)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("no source records for {domain}")))
    }

    /// Registers a new domain for `user` or updates one it already owns.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::AccessDenied`] if another user owns
    /// `domain`.
    pub async fn upsert_domain(
        &self,
        user: &UserId,
        domain: DomainId,
        name: &str,
        woocommerce_enabled: bool,
        ga_enabled: bool,
    ) -> Result<TrackedDomain, GatewayError> {
        let tracked = TrackedDomain::new(domain, name, user.clone())
            .with_sources(woocommerce_enabled, ga_enabled);
        let stored = self.tenants.upsert_domain(tracked).await?;
        tracing::info!(
            %user,
            domain = %stored.domain_id,
            woocommerce = stored.woocommerce_enabled,
            ga = stored.ga_enabled,
            "domain registered"
        );
        Ok(stored)
    }

    /// Removes a domain owned by `user` together with all its records.
    /// Returns the number of records deleted.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::AccessDenied`] if `user` does not own
    /// `domain`.
    #[tracing::instrument(skip_all, fields(%user, %domain))]
    pub async fn remove_domain(
        &self,
        user: &UserId,
        domain: &DomainId,
    ) -> Result<u64, GatewayError> {
        self.authorize(user, domain).await?;
        let removed_records = self.metrics.delete_domain(domain).await?;
        self.tenants.remove_domain(domain).await?;
        tracing::info!(%user, %domain, removed_records, "domain removed");
        Ok(removed_records)
    }

    async fn merge_latest(
        &self,
        domain: &DomainId,
        window: MetricsWindow,
        now: DateTime<Utc>,
    ) -> Result<Option<MetricsRecord>, GatewayError> {
        let (from, to) = window.bounds(now);
        let woocommerce = self
            .metrics
            .latest(domain, RecordSource::WooCommerce, from, to, now.timestamp())
            .await?;
        let analytics = self
            .metrics
            .latest(domain, RecordSource::GoogleAnalytics, from, to, now.timestamp())
            .await?;
        combine_records(
            domain,
            woocommerce.as_ref(),
            analytics.as_ref(),
            self.record_ttl_secs(),
        )
    }
}
