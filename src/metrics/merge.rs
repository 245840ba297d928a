//! Cross-source merge of WooCommerce and Analytics payloads.

use rust_decimal::Decimal;

use super::aggregate::round_2dp;
use crate::domain::{
    AnalyticsMetrics, CombinedMetrics, CombinedSnapshot, DomainId, MetricsRecord, RecordBody,
    WooCommerceMetrics,
};
use crate::error::GatewayError;

/// `numerator / denominator` rounded to 2 dp, zero when the denominator
/// is zero or the division overflows.
fn ratio(numerator: Decimal, denominator: u64) -> Decimal {
    if denominator == 0 {
        return Decimal::ZERO;
    }
    numerator
        .checked_div(Decimal::from(denominator))
        .map_or(Decimal::ZERO, round_2dp)
}

/// Orders per 100 sessions, rounded to 2 dp. Zero without sessions.
///
/// This is the orders-to-sessions ratio, not conversions-to-sessions.
#[must_use]
pub fn conversion_rate(total_orders: u64, total_sessions: u64) -> Decimal {
    Decimal::from(total_orders)
        .checked_mul(Decimal::ONE_HUNDRED)
        .map_or(Decimal::ZERO, |scaled| ratio(scaled, total_sessions))
}

/// Merges the two optional payloads of one domain.
///
/// Returns `Ok(None)` when both payloads are absent. When only one is
/// present, the fields native to it are copied and every cross-metric
/// that depends on the other source is zero.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidInput`] if `domain` is blank.
pub fn merge_metrics(
    domain: &str,
    woocommerce: Option<&WooCommerceMetrics>,
    analytics: Option<&AnalyticsMetrics>,
) -> Result<Option<CombinedSnapshot>, GatewayError> {
    if domain.trim().is_empty() {
        return Err(GatewayError::InvalidInput("domain is required".to_string()));
    }
    if woocommerce.is_none() && analytics.is_none() {
        return Ok(None);
    }

    let mut combined = CombinedMetrics::default();

    if let Some(woo) = woocommerce {
        combined.total_revenue = woo.total_sales;
        combined.total_orders = woo.total_orders;
        combined.avg_order_value = woo.avg_order_value;
        combined.top_products.clone_from(&woo.top_products);
    }

    if let Some(ga) = analytics {
        combined.total_users = ga.total_users;
        combined.total_sessions = ga.total_sessions;
        combined.total_page_views = ga.total_page_views;
        combined.traffic_by_device.clone_from(&ga.by_device);
        combined.traffic_by_country.clone_from(&ga.by_country);
        combined.trend_data.clone_from(&ga.by_date);
    }

    if woocommerce.is_some() && analytics.is_some() {
        combined.conversion_rate = conversion_rate(combined.total_orders, combined.total_sessions);
        combined.revenue_per_session = ratio(combined.total_revenue, combined.total_sessions);
        combined.revenue_per_user = ratio(combined.total_revenue, combined.total_users);
    }

    Ok(Some(CombinedSnapshot {
        woocommerce: woocommerce.cloned(),
        google_analytics: analytics.cloned(),
        combined,
    }))
}

/// Builds the combined record of a domain from its latest source records.
///
/// The record takes the newest input timestamp, so recomputing from the
/// same inputs targets the same key and overwrites it.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidInput`] when an input record belongs to
/// another domain or carries the wrong source.
pub fn combine_records(
    domain: &DomainId,
    woocommerce: Option<&MetricsRecord>,
    analytics: Option<&MetricsRecord>,
    ttl_secs: i64,
) -> Result<Option<MetricsRecord>, GatewayError> {
    for record in woocommerce.iter().chain(analytics.iter()) {
        if &record.domain != domain {
            return Err(GatewayError::InvalidInput(format!(
                "record of `{}` cannot be combined into `{domain}`",
                record.domain
            )));
        }
    }

    let woo = match woocommerce {
        Some(record) => Some(record.woocommerce().ok_or_else(|| {
            GatewayError::InvalidInput(format!("expected a woocommerce record, got {}", record.source()))
        })?),
        None => None,
    };
    let ga = match analytics {
        Some(record) => Some(record.analytics().ok_or_else(|| {
            GatewayError::InvalidInput(format!(
                "expected a google_analytics record, got {}",
                record.source()
            ))
        })?),
        None => None,
    };

    let Some(snapshot) = merge_metrics(domain.as_str(), woo, ga)? else {
        return Ok(None);
    };

    let timestamp = woocommerce
        .iter()
        .chain(analytics.iter())
        .map(|r| r.timestamp)
        .max()
        .unwrap_or_default();

    Ok(Some(MetricsRecord {
        domain: domain.clone(),
        timestamp,
        expires_at: timestamp.saturating_add(ttl_secs),
        body: RecordBody::Combined(snapshot),
    }))
}
