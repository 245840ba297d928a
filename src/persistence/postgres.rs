//! PostgreSQL implementation of the persistence layer.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::models::{DomainRow, MetricsRow};
use super::{MetricsStore, TenantStore};
use crate::config::GatewayConfig;
use crate::domain::{DomainId, MetricsRecord, RecordSource, SourceTag, TrackedDomain, UserId};
use crate::error::GatewayError;

type MetricsTuple = (String, String, i64, i64, serde_json::Value);
type DomainTuple = (String, String, String, bool, bool, DateTime<Utc>, DateTime<Utc>);

const DOMAIN_COLUMNS: &str =
    "domain_id, name, user_id, woocommerce_enabled, ga_enabled, created_at, updated_at";

/// PostgreSQL-backed [`MetricsStore`] and [`TenantStore`] using
/// `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Creates a new persistence layer with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool sized from the configuration and applies the embedded
    /// migrations.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::StorageFailure`] if the database is
    /// unreachable or a migration fails.
    pub async fn connect(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| GatewayError::StorageFailure(format!("migration failed: {e}")))?;

        tracing::info!(
            max_connections = config.database_max_connections,
            "database pool ready"
        );
        Ok(Self::new(pool))
    }

    fn to_records(rows: Vec<MetricsTuple>) -> Result<Vec<MetricsRecord>, GatewayError> {
        rows.into_iter().map(Self::to_record).collect()
    }

    fn to_record(
        (domain_id, source, recorded_at, expires_at, payload): MetricsTuple,
    ) -> Result<MetricsRecord, GatewayError> {
        MetricsRecord::try_from(MetricsRow {
            domain_id,
            source,
            recorded_at,
            expires_at,
            payload,
        })
    }

    fn to_domain(
        (domain_id, name, user_id, woocommerce_enabled, ga_enabled, created_at, updated_at): DomainTuple,
    ) -> Result<TrackedDomain, GatewayError> {
        TrackedDomain::try_from(DomainRow {
            domain_id,
            name,
            user_id,
            woocommerce_enabled,
            ga_enabled,
            created_at,
            updated_at,
        })
    }
}

#[async_trait]
impl MetricsStore for PostgresPersistence {
    async fn put(&self, record: &MetricsRecord) -> Result<(), GatewayError> {
        let row = MetricsRow::from_record(record)?;
        sqlx::query(
            "INSERT INTO metrics (domain_id, source, recorded_at, expires_at, payload) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (domain_id, source, recorded_at) \
             DO UPDATE SET expires_at = EXCLUDED.expires_at, payload = EXCLUDED.payload",
        )
        .bind(&row.domain_id)
        .bind(&row.source)
        .bind(row.recorded_at)
        .bind(row.expires_at)
        .bind(&row.payload)
        .execute(&self.pool)
        .await?;
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
        let row = sqlx::query_as::<_, MetricsTuple>(
            "SELECT domain_id, source, recorded_at, expires_at, payload FROM metrics \
             WHERE domain_id = $1 AND source = $2 AND recorded_at BETWEEN $3 AND $4 \
             AND expires_at > $5 \
             ORDER BY recorded_at DESC LIMIT 1",
        )
        .bind(domain.as_str())
        .bind(source.as_str())
        .bind(from)
        .bind(to)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::to_record).transpose()
    }

    async fn range(
        &self,
        domain: &DomainId,
        from: i64,
        to: i64,
        source: Option<RecordSource>,
        now: i64,
    ) -> Result<Vec<MetricsRecord>, GatewayError> {
        let rows = sqlx::query_as::<_, MetricsTuple>(
            "SELECT domain_id, source, recorded_at, expires_at, payload FROM metrics \
             WHERE domain_id = $1 AND recorded_at BETWEEN $2 AND $3 \
             AND ($4::text IS NULL OR source = $4) \
             AND expires_at > $5 \
             ORDER BY recorded_at DESC, source ASC",
        )
        .bind(domain.as_str())
        .bind(from)
        .bind(to)
        .bind(source.map(RecordSource::as_str))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Self::to_records(rows)
    }

    async fn delete_domain(&self, domain: &DomainId) -> Result<u64, GatewayError> {
        let result = sqlx::query("DELETE FROM metrics WHERE domain_id = $1")
            .bind(domain.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: i64) -> Result<u64, GatewayError> {
        let result = sqlx::query("DELETE FROM metrics WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl TenantStore for PostgresPersistence {
    async fn ensure_user(&self, user: &UserId) -> Result<(), GatewayError> {
        sqlx::query("INSERT INTO users (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn user_domains(&self, user: &UserId) -> Result<Vec<TrackedDomain>, GatewayError> {
        let rows = sqlx::query_as::<_, DomainTuple>(&format!(
            "SELECT {DOMAIN_COLUMNS} FROM domains WHERE user_id = $1 ORDER BY domain_id"
        ))
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::to_domain).collect()
    }

    async fn domain(&self, id: &DomainId) -> Result<Option<TrackedDomain>, GatewayError> {
        let row = sqlx::query_as::<_, DomainTuple>(&format!(
            "SELECT {DOMAIN_COLUMNS} FROM domains WHERE domain_id = $1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::to_domain).transpose()
    }

    async fn domains_with_source(
        &self,
        tag: SourceTag,
    ) -> Result<Vec<TrackedDomain>, GatewayError> {
        let flag = match tag {
            SourceTag::WooCommerce => "woocommerce_enabled",
            SourceTag::GoogleAnalytics => "ga_enabled",
        };
        let rows = sqlx::query_as::<_, DomainTuple>(&format!(
            "SELECT {DOMAIN_COLUMNS} FROM domains WHERE {flag} ORDER BY domain_id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::to_domain).collect()
    }

    async fn upsert_domain(&self, domain: TrackedDomain) -> Result<TrackedDomain, GatewayError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO users (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(domain.owner.as_str())
            .execute(&mut *tx)
            .await?;

        // The conditional update leaves a foreign-owned row untouched and
        // returns nothing.
        let row = sqlx::query_as::<_, DomainTuple>(&format!(
            "INSERT INTO domains ({DOMAIN_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $6) \
             ON CONFLICT (domain_id) DO UPDATE SET \
                 name = EXCLUDED.name, \
                 woocommerce_enabled = EXCLUDED.woocommerce_enabled, \
                 ga_enabled = EXCLUDED.ga_enabled, \
                 updated_at = EXCLUDED.updated_at \
             WHERE domains.user_id = EXCLUDED.user_id \
             RETURNING {DOMAIN_COLUMNS}"
        ))
        .bind(domain.domain_id.as_str())
        .bind(&domain.name)
        .bind(domain.owner.as_str())
        .bind(domain.woocommerce_enabled)
        .bind(domain.ga_enabled)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Err(GatewayError::AccessDenied);
        };
        tx.commit().await?;
        Self::to_domain(row)
    }

    async fn remove_domain(&self, id: &DomainId) -> Result<bool, GatewayError> {
        let result = sqlx::query("DELETE FROM domains WHERE domain_id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
