//! Per-source aggregation of raw upstream rows.
//!
//! Raw rows come from third-party JSON and are coerced field by field. A
//! row whose numeric field cannot be coerced is skipped and logged; the
//! rest of the batch still aggregates.

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::Value;

use crate::domain::{AnalyticsMetrics, TopProduct, TrafficTotals, WooCommerceMetrics};

/// A field of a raw upstream row could not be read as a number.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("field `{field}` is not a valid number: {value}")]
pub struct CoercionError {
    /// Field name.
    pub field: &'static str,
    /// Offending raw value.
    pub value: String,
}

impl CoercionError {
    fn new(field: &'static str, value: &Value) -> Self {
        Self {
            field,
            value: value.to_string(),
        }
    }
}

/// Reads a non-negative decimal from a JSON string or number.
///
/// `null` and blank strings read as zero.
///
/// # Errors
///
/// Returns [`CoercionError`] for non-numeric strings, negative values,
/// booleans, arrays and objects.
pub fn coerce_decimal(field: &'static str, value: &Value) -> Result<Decimal, CoercionError> {
    let parsed = match value {
        Value::Null => Some(Decimal::ZERO),
        Value::String(s) if s.trim().is_empty() => Some(Decimal::ZERO),
        Value::String(s) => parse_decimal(s.trim()),
        Value::Number(n) => parse_decimal(&n.to_string()),
        _ => None,
    };
    match parsed {
        Some(d) if !d.is_sign_negative() || d.is_zero() => Ok(d),
        _ => Err(CoercionError::new(field, value)),
    }
}

/// Reads a non-negative whole count from a JSON string or number.
///
/// `null` and blank strings read as zero. `"12.0"` is accepted.
///
/// # Errors
///
/// Returns [`CoercionError`] for fractional, negative or non-numeric
/// values.
pub fn coerce_count(field: &'static str, value: &Value) -> Result<u64, CoercionError> {
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    let decimal = coerce_decimal(field, value)?;
    if decimal.fract().is_zero() {
        decimal.to_u64().ok_or_else(|| CoercionError::new(field, value))
    } else {
        Err(CoercionError::new(field, value))
    }
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

/// Rounds a monetary or percentage value to 2 dp with banker's rounding.
#[must_use]
pub fn round_2dp(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

/// Builds WooCommerce metrics from raw `/orders` and `/products` rows.
///
/// Each order contributes its `total` (a missing `total` counts as zero).
/// Orders with a non-numeric `total` are skipped and do not count toward
/// `total_orders`. Products failing coercion are left out of
/// `top_products`; the input order is kept.
#[must_use]
pub fn summarize_orders(orders: &[Value], products: &[Value]) -> WooCommerceMetrics {
    let mut total_sales = Decimal::ZERO;
    let mut total_orders: u64 = 0;
    let mut skipped = 0usize;

    for order in orders {
        let total = match order {
            Value::Object(map) => map
                .get("total")
                .map_or(Ok(Decimal::ZERO), |v| coerce_decimal("total", v)),
            other => Err(CoercionError::new("order", other)),
        };
        match total {
            Ok(amount) => {
                total_sales = total_sales.saturating_add(amount);
                total_orders = total_orders.saturating_add(1);
            }
            Err(err) => {
                skipped += 1;
                tracing::warn!(error = %err, "skipping order row");
            }
        }
    }

    let avg_order_value = if total_orders == 0 {
        Decimal::ZERO
    } else {
        total_sales
            .checked_div(Decimal::from(total_orders))
            .map_or(Decimal::ZERO, round_2dp)
    };

    let top_products = products
        .iter()
        .filter_map(|row| match top_product(row) {
            Ok(product) => Some(product),
            Err(err) => {
                tracing::warn!(error = %err, "skipping product row");
                None
            }
        })
        .collect();

    if skipped > 0 {
        tracing::debug!(skipped, total_orders, "orders summarized with skipped rows");
    }

    WooCommerceMetrics {
        total_sales,
        total_orders,
        avg_order_value,
        top_products,
    }
}

fn top_product(row: &Value) -> Result<TopProduct, CoercionError> {
    let Value::Object(map) = row else {
        return Err(CoercionError::new("product", row));
    };
    let id_value = map.get("id").unwrap_or(&Value::Null);
    let id = match id_value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| CoercionError::new("id", id_value))?;

    let name = map
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let price = coerce_decimal("price", map.get("price").unwrap_or(&Value::Null))?;
    let sales_count = coerce_count("total_sales", map.get("total_sales").unwrap_or(&Value::Null))?;

    Ok(TopProduct {
        id,
        name,
        price,
        sales_count,
    })
}

/// One raw Analytics report row: three dimensions, five metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsRow {
    /// `YYYYMMDD` date dimension.
    pub date: String,
    /// Device category dimension.
    pub device: String,
    /// Country dimension.
    pub country: String,
    /// Metric values of the row.
    pub totals: TrafficTotals,
}

impl AnalyticsRow {
    /// Builds a row from the string cells of a report row, in the order
    /// `date, deviceCategory, country` and
    /// `activeUsers, sessions, screenPageViews, conversions, totalRevenue`.
    ///
    /// # Errors
    ///
    /// Returns [`CoercionError`] when a cell is missing or a metric is not
    /// numeric.
    pub fn from_cells(dimensions: &[String], metrics: &[String]) -> Result<Self, CoercionError> {
        let dim = |i: usize, field: &'static str| {
            dimensions
                .get(i)
                .cloned()
                .ok_or_else(|| CoercionError::new(field, &Value::Null))
        };
        let metric = |i: usize, field: &'static str| {
            metrics
                .get(i)
                .map(|s| Value::String(s.clone()))
                .ok_or_else(|| CoercionError::new(field, &Value::Null))
        };

        Ok(Self {
            date: dim(0, "date")?,
            device: dim(1, "deviceCategory")?,
            country: dim(2, "country")?,
            totals: TrafficTotals {
                users: coerce_count("activeUsers", &metric(0, "activeUsers")?)?,
                sessions: coerce_count("sessions", &metric(1, "sessions")?)?,
                page_views: coerce_count("screenPageViews", &metric(2, "screenPageViews")?)?,
                conversions: coerce_count("conversions", &metric(3, "conversions")?)?,
                revenue: coerce_decimal("totalRevenue", &metric(4, "totalRevenue")?)?,
            },
        })
    }
}

/// Groups rows by date, device and country, summing the five metrics
/// within each group and into the domain-wide totals.
///
/// For every field, the sum over any one breakdown equals the
/// domain-wide total.
#[must_use]
pub fn aggregate_traffic<I>(rows: I) -> AnalyticsMetrics
where
    I: IntoIterator<Item = AnalyticsRow>,
{
    let mut totals = TrafficTotals::default();
    let mut metrics = AnalyticsMetrics::default();

    for row in rows {
        totals.absorb(&row.totals);
        metrics
            .by_date
            .entry(row.date)
            .or_default()
            .absorb(&row.totals);
        metrics
            .by_device
            .entry(row.device)
            .or_default()
            .absorb(&row.totals);
        metrics
            .by_country
            .entry(row.country)
            .or_default()
            .absorb(&row.totals);
    }

    metrics.total_users = totals.users;
    metrics.total_sessions = totals.sessions;
    metrics.total_page_views = totals.page_views;
    metrics.total_conversions = totals.conversions;
    metrics.total_revenue = totals.revenue;
    metrics
}
