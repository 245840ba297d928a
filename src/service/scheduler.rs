//! Background tasks: the periodic fetch loop and the event-driven
//! combiner.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{IngestService, MetricsService};
use crate::domain::{MetricsEvent, MetricsWindow};

const MIN_FETCH_INTERVAL: Duration = Duration::from_secs(1);

/// Spawns the fetch loop: every `interval` run one ingest cycle, then
/// purge expired records. The first cycle starts immediately.
///
/// Intervals below one second are raised to one second.
pub fn spawn_fetch_loop(ingest: Arc<IngestService>, interval: Duration) -> JoinHandle<()> {
    let interval = interval.max(MIN_FETCH_INTERVAL);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let now = Utc::now();
            let reports = ingest.run_cycle(now).await;
            tracing::debug!(batches = reports.len(), "fetch cycle finished");
            if let Err(err) = ingest.purge_expired(now).await {
                tracing::error!(error = %err, alert = true, "expired record purge failed");
            }
        }
    })
}

/// Spawns the combiner: recomputes a domain's combined record every time
/// one of its source records is stored.
///
/// Exits when the event bus closes.
pub fn spawn_combiner(service: Arc<MetricsService>, window: MetricsWindow) -> JoinHandle<()> {
    let mut rx = service.event_bus().subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(MetricsEvent::SourceRecordStored { domain, source, .. }) => {
                    tracing::debug!(%domain, %source, "recomputing combined record");
                    if let Err(err) = service.recompute_combined(&domain, window, Utc::now()).await {
                        tracing::error!(%domain, error = %err, alert = true, "combine failed");
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "combiner lagged behind the event bus");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{DomainId, EventBus, RecordBody, RecordSource, UserId};
    use crate::persistence::{InMemoryMetricsStore, InMemoryTenantStore, MetricsStore, TenantStore};
    use crate::sources::SourceSet;

    #[tokio::test]
    async fn combiner_follows_ingest() {
        let tenants = Arc::new(InMemoryTenantStore::new());
        let metrics = Arc::new(InMemoryMetricsStore::new());
        let bus = EventBus::new(64);

        let service = Arc::new(MetricsService::new(
            Arc::clone(&tenants) as Arc<dyn TenantStore>,
            Arc::clone(&metrics) as Arc<dyn MetricsStore>,
            bus.clone(),
            90,
        ));
        let (Ok(alice), Ok(shop)) = (UserId::parse("alice"), DomainId::parse("shop.com")) else {
            panic!("valid ids");
        };
        let Ok(_) = service
            .upsert_domain(&alice, shop.clone(), "Shop", true, true)
            .await
        else {
            panic!("upsert failed");
        };

        let mut rx = bus.subscribe();
        let combiner = spawn_combiner(Arc::clone(&service), MetricsWindow::default());

        let ingest = IngestService::new(
            tenants,
            Arc::clone(&metrics) as Arc<dyn MetricsStore>,
            SourceSet::synthetic(),
            bus,
            7,
            90,
        );
        let now = Utc::now();
        let reports = ingest.run_cycle(now).await;
        assert!(reports.iter().all(|r| r.stored == 1));

        let mut combined_events = 0;
        while combined_events < 2 {
            let Ok(event) = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await else {
                panic!("timed out waiting for combiner");
            };
            if matches!(event, Ok(MetricsEvent::CombinedRecordStored { .. })) {
                combined_events += 1;
            }
        }
        combiner.abort();

        let Ok(Some(combined)) = metrics
            .latest(&shop, RecordSource::Combined, 0, i64::MAX, now.timestamp())
            .await
        else {
            panic!("combined record expected");
        };
        assert_eq!(combined.timestamp, now.timestamp());
        let RecordBody::Combined(snapshot) = &combined.body else {
            panic!("combined body expected");
        };
        assert!(snapshot.woocommerce.is_some());
        assert!(snapshot.google_analytics.is_some());
    }

    #[tokio::test]
    async fn zero_interval_keeps_the_loop_alive() {
        let ingest = Arc::new(IngestService::new(
            Arc::new(InMemoryTenantStore::new()),
            Arc::new(InMemoryMetricsStore::new()),
            SourceSet::synthetic(),
            EventBus::new(8),
            7,
            90,
        ));
        let fetcher = spawn_fetch_loop(ingest, Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!fetcher.is_finished());
        fetcher.abort();
    }
}
