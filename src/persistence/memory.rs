//! In-process stores backed by `tokio::sync::RwLock` maps.
//!
//! Used when `PERSISTENCE_ENABLED=false` and throughout the test suite.
//! Contents are lost on restart.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{MetricsStore, TenantStore};
use crate::domain::{DomainId, MetricsRecord, RecordSource, SourceTag, TrackedDomain, UserId};
use crate::error::GatewayError;

type RecordKey = (DomainId, RecordSource, i64);

/// In-memory [`MetricsStore`].
///
/// Keys are ordered `(domain, source, timestamp)` so that all records of
/// one domain form a contiguous range.
#[derive(Debug, Default)]
pub struct InMemoryMetricsStore {
    records: RwLock<BTreeMap<RecordKey, MetricsRecord>>,
}

impl InMemoryMetricsStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns `true` if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn domain_range(domain: &DomainId) -> std::ops::RangeInclusive<RecordKey> {
        (domain.clone(), RecordSource::WooCommerce, i64::MIN)
            ..=(domain.clone(), RecordSource::Combined, i64::MAX)
    }
}

#[async_trait]
impl MetricsStore for InMemoryMetricsStore {
    async fn put(&self, record: &MetricsRecord) -> Result<(), GatewayError> {
        let key = (record.domain.clone(), record.source(), record.timestamp);
        self.records.write().await.insert(key, record.clone());
        Ok(())
    }

    async fn latest(
        &self,
        domain: &DomainId,
        source: RecordSource,
        from: i64,
        to: i64,
        now: i64,
    ) -> Result<Option<MetricsRecord>, GatewayError> {
        if from > to {
            return Ok(None);
        }
        let map = self.records.read().await;
        Ok(map
            .range((domain.clone(), source, from)..=(domain.clone(), source, to))
            .rev()
            .find(|(_, record)| !record.is_expired(now))
            .map(|(_, record)| record.clone()))
    }

    async fn range(
        &self,
        domain: &DomainId,
        from: i64,
        to: i64,
        source: Option<RecordSource>,
        now: i64,
    ) -> Result<Vec<MetricsRecord>, GatewayError> {
        let map = self.records.read().await;
        let mut records: Vec<MetricsRecord> = map
            .range(Self::domain_range(domain))
            .filter(|((_, s, ts), record)| {
                (from..=to).contains(ts)
                    && source.is_none_or(|wanted| wanted == *s)
                    && !record.is_expired(now)
            })
            .map(|(_, record)| record.clone())
            .collect();
        records.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| a.source().cmp(&b.source()))
        });
        Ok(records)
    }

    async fn delete_domain(&self, domain: &DomainId) -> Result<u64, GatewayError> {
        let mut map = self.records.write().await;
        let before = map.len();
        map.retain(|(d, _, _), _| d != domain);
        Ok((before - map.len()) as u64)
    }

    async fn delete_expired(&self, now: i64) -> Result<u64, GatewayError> {
        let mut map = self.records.write().await;
        let before = map.len();
        map.retain(|_, record| !record.is_expired(now));
        Ok((before - map.len()) as u64)
    }
}

#[derive(Debug, Default)]
struct Tenants {
    users: BTreeSet<UserId>,
    domains: BTreeMap<DomainId, TrackedDomain>,
}

/// In-memory [`TenantStore`].
#[derive(Debug, Default)]
pub struct InMemoryTenantStore {
    inner: RwLock<Tenants>,
}

impl InMemoryTenantStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TenantStore for InMemoryTenantStore {
    async fn ensure_user(&self, user: &UserId) -> Result<(), GatewayError> {
        self.inner.write().await.users.insert(user.clone());
        Ok(())
    }

    async fn user_domains(&self, user: &UserId) -> Result<Vec<TrackedDomain>, GatewayError> {
        let tenants = self.inner.read().await;
        Ok(tenants
            .domains
            .values()
            .filter(|d| &d.owner == user)
            .cloned()
            .collect())
    }

    async fn domain(&self, id: &DomainId) -> Result<Option<TrackedDomain>, GatewayError> {
        Ok(self.inner.read().await.domains.get(id).cloned())
    }

    async fn domains_with_source(
        &self,
        tag: SourceTag,
    ) -> Result<Vec<TrackedDomain>, GatewayError> {
        let tenants = self.inner.read().await;
        Ok(tenants
            .domains
            .values()
            .filter(|d| d.source_enabled(tag))
            .cloned()
            .collect())
    }

    async fn upsert_domain(&self, domain: TrackedDomain) -> Result<TrackedDomain, GatewayError> {
        let mut tenants = self.inner.write().await;
        let mut stored = domain;
        if let Some(existing) = tenants.domains.get(&stored.domain_id) {
            if existing.owner != stored.owner {
                return Err(GatewayError::AccessDenied);
            }
            stored.created_at = existing.created_at;
        }
        stored.updated_at = Utc::now();
        tenants.users.insert(stored.owner.clone());
        tenants
            .domains
            .insert(stored.domain_id.clone(), stored.clone());
        Ok(stored)
    }

    async fn remove_domain(&self, id: &DomainId) -> Result<bool, GatewayError> {
        Ok(self.inner.write().await.domains.remove(id).is_some())
    }
}
