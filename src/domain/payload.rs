//! Per-source metrics payloads and the merged cross-source snapshot.
//!
//! Monetary amounts are [`Decimal`] end to end and serialize as JSON
//! strings. Breakdown maps are [`BTreeMap`]s so that two equal payloads
//! always serialize to identical bytes.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One entry of the WooCommerce "top products by popularity" list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopProduct {
    /// WooCommerce product id.
    pub id: i64,
    /// Product display name.
    pub name: String,
    /// Current unit price.
    pub price: Decimal,
    /// Lifetime units sold as reported by the store.
    pub sales_count: u64,
}

/// E-commerce metrics for one domain over one fetch window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WooCommerceMetrics {
    /// Sum of order totals.
    pub total_sales: Decimal,
    /// Number of orders that contributed to `total_sales`.
    pub total_orders: u64,
    /// `total_sales / total_orders`, 2 dp, zero without orders.
    pub avg_order_value: Decimal,
    /// Best sellers, most popular first.
    #[serde(default)]
    pub top_products: Vec<TopProduct>,
}

/// The five traffic figures tracked per breakdown bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficTotals {
    /// Active users.
    pub users: u64,
    /// Sessions.
    pub sessions: u64,
    /// Screen and page views.
    pub page_views: u64,
    /// Conversion events.
    pub conversions: u64,
    /// Revenue attributed by Analytics.
    pub revenue: Decimal,
}

impl TrafficTotals {
    /// Adds every field of `other` into `self`.
    pub fn absorb(&mut self, other: &Self) {
        self.users = self.users.saturating_add(other.users);
        self.sessions = self.sessions.saturating_add(other.sessions);
        self.page_views = self.page_views.saturating_add(other.page_views);
        self.conversions = self.conversions.saturating_add(other.conversions);
        self.revenue = self.revenue.saturating_add(other.revenue);
    }
}

/// Traffic metrics for one domain over one fetch window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsMetrics {
    /// Domain-wide active users.
    pub total_users: u64,
    /// Domain-wide sessions.
    pub total_sessions: u64,
    /// Domain-wide page views.
    pub total_page_views: u64,
    /// Domain-wide conversions.
    pub total_conversions: u64,
    /// Domain-wide revenue.
    pub total_revenue: Decimal,
    /// Totals per `YYYYMMDD` date string.
    #[serde(default)]
    pub by_date: BTreeMap<String, TrafficTotals>,
    /// Totals per device category (`desktop`, `mobile`, ...).
    #[serde(default)]
    pub by_device: BTreeMap<String, TrafficTotals>,
    /// Totals per country name.
    #[serde(default)]
    pub by_country: BTreeMap<String, TrafficTotals>,
}

impl AnalyticsMetrics {
    /// Domain-wide totals as a single [`TrafficTotals`].
    #[must_use]
    pub fn totals(&self) -> TrafficTotals {
        TrafficTotals {
            users: self.total_users,
            sessions: self.total_sessions,
            page_views: self.total_page_views,
            conversions: self.total_conversions,
            revenue: self.total_revenue,
        }
    }
}

/// Cross-source metrics derived from the two raw payloads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinedMetrics {
    /// WooCommerce `total_sales`.
    pub total_revenue: Decimal,
    /// WooCommerce `total_orders`.
    pub total_orders: u64,
    /// WooCommerce `avg_order_value`.
    pub avg_order_value: Decimal,
    /// Analytics `total_users`.
    pub total_users: u64,
    /// Analytics `total_sessions`.
    pub total_sessions: u64,
    /// Analytics `total_page_views`.
    pub total_page_views: u64,
    /// Orders per 100 sessions, 2 dp.
    pub conversion_rate: Decimal,
    /// Store revenue per session, 2 dp.
    pub revenue_per_session: Decimal,
    /// Store revenue per user, 2 dp.
    pub revenue_per_user: Decimal,
    /// WooCommerce best sellers.
    #[serde(default)]
    pub top_products: Vec<TopProduct>,
    /// Analytics `by_device`.
    #[serde(default)]
    pub traffic_by_device: BTreeMap<String, TrafficTotals>,
    /// Analytics `by_country`.
    #[serde(default)]
    pub traffic_by_country: BTreeMap<String, TrafficTotals>,
    /// Analytics `by_date`.
    #[serde(default)]
    pub trend_data: BTreeMap<String, TrafficTotals>,
}

/// Both raw inputs plus the derived cross-metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinedSnapshot {
    /// Raw WooCommerce payload, when one was available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub woocommerce: Option<WooCommerceMetrics>,
    /// Raw Analytics payload, when one was available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_analytics: Option<AnalyticsMetrics>,
    /// Derived cross-metrics.
    pub combined: CombinedMetrics,
}

/// A freshly fetched payload from one upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourcePayload {
    /// From the WooCommerce REST API.
    WooCommerce(WooCommerceMetrics),
    /// From the Analytics Data API.
    GoogleAnalytics(AnalyticsMetrics),
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn absorb_sums_every_field() {
        let mut acc = TrafficTotals::default();
        let row = TrafficTotals {
            users: 3,
            sessions: 4,
            page_views: 10,
            conversions: 1,
            revenue: Decimal::new(1250, 2),
        };
        acc.absorb(&row);
        acc.absorb(&row);
        assert_eq!(acc.users, 6);
        assert_eq!(acc.sessions, 8);
        assert_eq!(acc.page_views, 20);
        assert_eq!(acc.conversions, 2);
        assert_eq!(acc.revenue, Decimal::new(2500, 2));
    }

    #[test]
    fn money_serializes_as_string() {
        let metrics = WooCommerceMetrics {
            total_sales: Decimal::new(15000, 2),
            total_orders: 2,
            avg_order_value: Decimal::new(7500, 2),
            top_products: Vec::new(),
        };
        let Ok(json) = serde_json::to_value(&metrics) else {
            panic!("serialization failed");
        };
        assert_eq!(json["total_sales"], serde_json::json!("150.00"));
        assert_eq!(json["total_orders"], serde_json::json!(2));
    }

    #[test]
    fn snapshot_omits_missing_sources() {
        let snapshot = CombinedSnapshot::default();
        let Ok(json) = serde_json::to_value(&snapshot) else {
            panic!("serialization failed");
        };
        assert!(json.get("woocommerce").is_none());
        assert!(json.get("google_analytics").is_none());
        assert!(json.get("combined").is_some());
    }
}
