//! Deterministic synthetic source for local development and demos.
//!
//! Generates raw order, product and report rows from a seed derived from
//! the domain id and the fetch window, then runs them through the same
//! aggregation code as the live fetchers. Equal inputs always produce
//! equal payloads.

use async_trait::async_trait;
use chrono::Duration;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use super::MetricsSource;
use crate::domain::{DomainId, FetchWindow, SourcePayload, SourceTag, TrafficTotals};
use crate::metrics::{AnalyticsRow, aggregate_traffic, summarize_orders};

const PRODUCTS: [(i64, &str, &str, u64); 5] = [
    (101, "Premium T-Shirt", "29.99", 156),
    (102, "Slim Fit Jeans", "49.99", 132),
    (103, "Winter Jacket", "89.99", 89),
    (104, "Running Shoes", "79.99", 76),
    (105, "Smartwatch", "199.99", 65),
];

const DEVICES: [&str; 3] = ["desktop", "mobile", "tablet"];
const COUNTRIES: [&str; 4] = ["United States", "Germany", "United Kingdom", "France"];

/// Synthetic stand-in for one upstream.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticSource {
    tag: SourceTag,
}

impl SyntheticSource {
    /// Synthetic source producing payloads for `tag`.
    #[must_use]
    pub const fn new(tag: SourceTag) -> Self {
        Self { tag }
    }

    fn rng(&self, domain: &DomainId, window: &FetchWindow) -> StdRng {
        let mut hasher = Sha256::new();
        hasher.update(self.tag.as_str().as_bytes());
        hasher.update(domain.as_str().as_bytes());
        hasher.update(window.start.timestamp().to_be_bytes());
        hasher.update(window.end.timestamp().to_be_bytes());
        let digest = hasher.finalize();

        let mut seed = [0u8; 32];
        seed.copy_from_slice(&digest);
        StdRng::from_seed(seed)
    }

    fn orders(rng: &mut StdRng, window: &FetchWindow) -> Vec<Value> {
        let days = window.days().max(1);
        let mut orders = Vec::new();
        for _ in 0..days {
            for _ in 0..rng.random_range(3..15) {
                let cents: i64 = rng.random_range(1_500..30_000);
                orders.push(json!({ "total": Decimal::new(cents, 2).to_string() }));
            }
        }
        orders
    }

    fn products() -> Vec<Value> {
        PRODUCTS
            .iter()
            .map(|(id, name, price, sales)| {
                json!({ "id": id, "name": name, "price": price, "total_sales": sales })
            })
            .collect()
    }

    fn report_rows(rng: &mut StdRng, window: &FetchWindow) -> Vec<AnalyticsRow> {
        let days = window.days().max(1);
        let mut rows = Vec::new();
        for offset in 0..days {
            let date = (window.start + Duration::days(offset))
                .format("%Y%m%d")
                .to_string();
            for device in DEVICES {
                for country in COUNTRIES {
                    let users: u64 = rng.random_range(5..120);
                    let sessions = users + rng.random_range(0..users);
                    rows.push(AnalyticsRow {
                        date: date.clone(),
                        device: device.to_string(),
                        country: country.to_string(),
                        totals: TrafficTotals {
                            users,
                            sessions,
                            page_views: sessions * rng.random_range(1..6),
                            conversions: rng.random_range(0..=sessions / 10),
                            revenue: Decimal::new(rng.random_range(0..50_000), 2),
                        },
                    });
                }
            }
        }
        rows
    }
}

#[async_trait]
impl MetricsSource for SyntheticSource {
    fn tag(&self) -> SourceTag {
        self.tag
    }

    async fn fetch(
        &self,
        domain: &DomainId,
        window: &FetchWindow,
    ) -> Result<Option<SourcePayload>, crate::error::GatewayError> {
        let mut rng = self.rng(domain, window);
        let payload = match self.tag {
            SourceTag::WooCommerce => {
                let orders = Self::orders(&mut rng, window);
                SourcePayload::WooCommerce(summarize_orders(&orders, &Self::products()))
            }
            SourceTag::GoogleAnalytics => {
                SourcePayload::GoogleAnalytics(aggregate_traffic(Self::report_rows(&mut rng, window)))
            }
        };
        tracing::debug!(%domain, source = %self.tag, "synthetic payload generated");
        Ok(Some(payload))
    }
}
