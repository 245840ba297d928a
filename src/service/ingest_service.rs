//! Ingest service: one fetch cycle across all enabled domains.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures_util::future::join_all;
use serde::Serialize;

use crate::domain::{
    DomainId, EventBus, FetchWindow, MetricsEvent, MetricsRecord, RecordBody, SourceTag,
};
use crate::error::GatewayError;
use crate::persistence::{MetricsStore, TenantStore};
use crate::sources::{MetricsSource, SourceSet};

/// A domain whose fetch or write failed during a batch.
#[derive(Debug, Clone, Serialize)]
pub struct DomainFailure {
    /// Failed domain.
    pub domain: DomainId,
    /// Failure description.
    pub message: String,
}

/// Outcome of one source's batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// Upstream the batch fetched from.
    pub source: SourceTag,
    /// Domains whose record was stored.
    pub stored: usize,
    /// Domains without credentials for this upstream.
    pub skipped: usize,
    /// Domains that failed.
    pub failed: Vec<DomainFailure>,
}

enum Outcome {
    Stored,
    Skipped,
}

/// Pulls every enabled domain from each source and stores the results.
///
/// Domains are fetched concurrently. A failing domain is logged, published
/// as [`MetricsEvent::FetchFailed`] and reported; it never stops the rest
/// of the batch.
#[derive(Debug, Clone)]
pub struct IngestService {
    tenants: Arc<dyn TenantStore>,
    metrics: Arc<dyn MetricsStore>,
    sources: SourceSet,
    event_bus: EventBus,
    window_days: u32,
    record_ttl: Duration,
}

impl IngestService {
    /// Creates a new `IngestService`.
    #[must_use]
    pub fn new(
        tenants: Arc<dyn TenantStore>,
        metrics: Arc<dyn MetricsStore>,
        sources: SourceSet,
        event_bus: EventBus,
        window_days: u32,
        record_ttl_days: u32,
    ) -> Self {
        Self {
            tenants,
            metrics,
            sources,
            event_bus,
            window_days,
            record_ttl: Duration::days(i64::from(record_ttl_days)),
        }
    }

    /// Runs both sources, WooCommerce first. Every record of the cycle is
    /// stamped with `now`.
    ///
    /// A source whose domain listing fails is logged and left out of the
    /// returned reports.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Vec<BatchReport> {
        let mut reports = Vec::with_capacity(SourceTag::ALL.len());
        for tag in SourceTag::ALL {
            match self.run_source(tag, now).await {
                Ok(report) => reports.push(report),
                Err(err) => {
                    tracing::error!(source = %tag, error = %err, alert = true, "batch aborted");
                }
            }
        }
        reports
    }

    /// Fetches and stores one source for every domain that enables it.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::StorageFailure`] only if the list of
    /// domains cannot be read. Per-domain failures land in the report.
    #[tracing::instrument(skip_all, fields(source = %tag))]
    pub async fn run_source(
        &self,
        tag: SourceTag,
        now: DateTime<Utc>,
    ) -> Result<BatchReport, GatewayError> {
        let domains = self.tenants.domains_with_source(tag).await?;
        let source = self.sources.get(tag);
        let window = FetchWindow::trailing(self.window_days, now);

        let outcomes = join_all(domains.iter().map(|tracked| {
            let domain = &tracked.domain_id;
            async move { (domain, self.ingest_domain(source.as_ref(), domain, &window).await) }
        }))
        .await;

        let mut report = BatchReport {
            source: tag,
            stored: 0,
            skipped: 0,
            failed: Vec::new(),
        };
        for (domain, outcome) in outcomes {
            match outcome {
                Ok(Outcome::Stored) => report.stored += 1,
                Ok(Outcome::Skipped) => report.skipped += 1,
                Err(err) => {
                    tracing::error!(
                        %domain,
                        source = %tag,
                        error = %err,
                        alert = true,
                        "domain ingest failed"
                    );
                    let _ = self.event_bus.publish(MetricsEvent::FetchFailed {
                        domain: domain.clone(),
                        source: tag,
                        message: err.to_string(),
                        timestamp: Utc::now(),
                    });
                    report.failed.push(DomainFailure {
                        domain: domain.clone(),
                        message: err.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            source = %tag,
            stored = report.stored,
            skipped = report.skipped,
            failed = report.failed.len(),
            "batch complete"
        );
        Ok(report)
    }

    /// Deletes expired records.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::StorageFailure`] on backend failure.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, GatewayError> {
        let removed = self.metrics.delete_expired(now.timestamp()).await?;
        if removed > 0 {
            tracing::info!(removed, "expired records purged");
        }
        Ok(removed)
    }

    async fn ingest_domain(
        &self,
        source: &dyn MetricsSource,
        domain: &DomainId,
        window: &FetchWindow,
    ) -> Result<Outcome, GatewayError> {
        let Some(payload) = source.fetch(domain, window).await? else {
            return Ok(Outcome::Skipped);
        };

        let timestamp = window.end.timestamp();
        let record = MetricsRecord {
            domain: domain.clone(),
            timestamp,
            expires_at: timestamp.saturating_add(self.record_ttl.num_seconds()),
            body: RecordBody::from(payload),
        };
        self.metrics.put(&record).await?;

        let _ = self.event_bus.publish(MetricsEvent::SourceRecordStored {
            domain: domain.clone(),
            source: source.tag(),
            record_timestamp: timestamp,
            timestamp: Utc::now(),
        });
        Ok(Outcome::Stored)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use async_trait::async_trait;
    use axum::Router;
    use axum::routing::get;
    use secrecy::SecretString;
    use serde_json::json;

    use super::*;
    use crate::domain::{RecordSource, SourcePayload, TrackedDomain, UserId, WooCommerceMetrics};
    use crate::persistence::{InMemoryMetricsStore, InMemoryTenantStore};
    use crate::sources::{
        DomainCredentials, StaticCredentialStore, SyntheticSource, WooCommerceCredentials,
        WooCommerceSource,
    };

    /// Fails for one domain, has no credentials for another, and succeeds
    /// for the rest.
    #[derive(Debug)]
    struct FlakySource;

    #[async_trait]
    impl MetricsSource for FlakySource {
        fn tag(&self) -> SourceTag {
            SourceTag::WooCommerce
        }

        async fn fetch(
            &self,
            domain: &DomainId,
            _window: &FetchWindow,
        ) -> Result<Option<SourcePayload>, GatewayError> {
            match domain.as_str() {
                "down.com" => Err(GatewayError::upstream("woocommerce", "HTTP 503")),
                "nokeys.com" => Ok(None),
                _ => Ok(Some(SourcePayload::WooCommerce(WooCommerceMetrics::default()))),
            }
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap_or_default()
    }

    async fn tenants(domains: &[&str]) -> Arc<InMemoryTenantStore> {
        let store = Arc::new(InMemoryTenantStore::new());
        let Ok(owner) = UserId::parse("alice") else {
            panic!("valid user");
        };
        for d in domains {
            let Ok(id) = DomainId::parse(d) else {
                panic!("valid domain");
            };
            let domain = TrackedDomain::new(id, "", owner.clone()).with_sources(true, true);
            let Ok(_) = store.upsert_domain(domain).await else {
                panic!("upsert failed");
            };
        }
        store
    }

    #[tokio::test]
    async fn one_failure_does_not_block_the_batch() {
        let metrics = Arc::new(InMemoryMetricsStore::new());
        let bus = EventBus::new(64);
        let mut rx = bus.subscribe();
        let sources = SourceSet {
            woocommerce: Arc::new(FlakySource),
            analytics: Arc::new(SyntheticSource::new(SourceTag::GoogleAnalytics)),
        };
        let service = IngestService::new(
            tenants(&["a.com", "down.com", "nokeys.com", "b.com"]).await,
            Arc::clone(&metrics) as Arc<dyn MetricsStore>,
            sources,
            bus,
            7,
            90,
        );

        let Ok(report) = service.run_source(SourceTag::WooCommerce, now()).await else {
            panic!("batch should complete");
        };
        assert_eq!(report.stored, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(
            report.failed.first().map(|f| f.domain.as_str()),
            Some("down.com")
        );
        assert_eq!(metrics.len().await, 2);

        let mut failures = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, MetricsEvent::FetchFailed { .. }) {
                failures += 1;
            }
        }
        assert_eq!(failures, 1);
    }

    /// One store answers at once, the other stalls past the client timeout.
    async fn spawn_stores() -> String {
        let app = Router::new()
            .route("/fast/wp-json/wc/v3/orders", get(|| async { axum::Json(json!([])) }))
            .route("/fast/wp-json/wc/v3/products", get(|| async { axum::Json(json!([])) }))
            .route(
                "/slow/wp-json/wc/v3/orders",
                get(|| async {
                    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
                    axum::Json(json!([]))
                }),
            );
        let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
            panic!("bind failed");
        };
        let Ok(addr) = listener.local_addr() else {
            panic!("no local addr");
        };
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}")
    }

    fn store_credentials(api_url: String) -> DomainCredentials {
        DomainCredentials {
            woocommerce: Some(WooCommerceCredentials {
                api_url: Some(api_url),
                consumer_key: SecretString::from("ck_test"),
                consumer_secret: SecretString::from("cs_test"),
            }),
            google_analytics: None,
        }
    }

    #[tokio::test]
    async fn timed_out_domain_does_not_block_the_batch() {
        let base = spawn_stores().await;
        let (Ok(fast), Ok(slow)) = (DomainId::parse("fast.com"), DomainId::parse("slow.com")) else {
            panic!("valid domains");
        };
        let credentials = StaticCredentialStore::new()
            .with_domain(&fast, store_credentials(format!("{base}/fast")))
            .with_domain(&slow, store_credentials(format!("{base}/slow")));
        let Ok(client) = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(100))
            .build()
        else {
            panic!("client build failed");
        };

        let metrics = Arc::new(InMemoryMetricsStore::new());
        let sources = SourceSet {
            woocommerce: Arc::new(WooCommerceSource::new(client, Arc::new(credentials), 10)),
            analytics: Arc::new(SyntheticSource::new(SourceTag::GoogleAnalytics)),
        };
        let service = IngestService::new(
            tenants(&["fast.com", "slow.com"]).await,
            Arc::clone(&metrics) as Arc<dyn MetricsStore>,
            sources,
            EventBus::new(64),
            7,
            90,
        );

        let Ok(report) = service.run_source(SourceTag::WooCommerce, now()).await else {
            panic!("batch should complete");
        };
        assert_eq!(report.stored, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(
            report.failed.first().map(|f| f.domain.as_str()),
            Some("slow.com")
        );

        let Ok(Some(record)) = metrics
            .latest(&fast, RecordSource::WooCommerce, 0, i64::MAX, 1_700_000_000)
            .await
        else {
            panic!("fast domain record expected");
        };
        assert_eq!(record.timestamp, 1_700_000_000);
    }

    #[tokio::test]
    async fn cycle_stamps_records_and_sets_ttl() {
        let metrics = Arc::new(InMemoryMetricsStore::new());
        let service = IngestService::new(
            tenants(&["a.com"]).await,
            Arc::clone(&metrics) as Arc<dyn MetricsStore>,
            SourceSet::synthetic(),
            EventBus::new(64),
            7,
            90,
        );

        let reports = service.run_cycle(now()).await;
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.stored == 1));

        let Ok(domain) = DomainId::parse("a.com") else {
            panic!("valid domain");
        };
        let Ok(Some(record)) = metrics
            .latest(&domain, RecordSource::GoogleAnalytics, 0, i64::MAX, 1_700_000_000)
            .await
        else {
            panic!("analytics record expected");
        };
        assert_eq!(record.timestamp, 1_700_000_000);
        assert_eq!(record.expires_at, 1_700_000_000 + 90 * 86_400);

        let Ok(purged) = service
            .purge_expired(now() + Duration::days(91))
            .await
        else {
            panic!("purge failed");
        };
        assert_eq!(purged, 2);
    }
}
