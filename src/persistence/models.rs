//! Database row models and their mapping to domain types.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::domain::{DomainId, MetricsRecord, RecordBody, TrackedDomain, UserId};
use crate::error::GatewayError;

/// A row of the `metrics` table.
#[derive(Debug, Clone)]
pub struct MetricsRow {
    /// Owning domain.
    pub domain_id: String,
    /// `woocommerce`, `google_analytics` or `combined`.
    pub source: String,
    /// Record timestamp, epoch seconds.
    pub recorded_at: i64,
    /// Expiry, epoch seconds.
    pub expires_at: i64,
    /// JSONB payload (the record's `metrics` object).
    pub payload: Value,
}

impl MetricsRow {
    /// Splits a record into its row columns.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if the body cannot be serialized.
    pub fn from_record(record: &MetricsRecord) -> Result<Self, GatewayError> {
        let payload = match &record.body {
            RecordBody::WooCommerce(m) => serde_json::to_value(m),
            RecordBody::GoogleAnalytics(m) => serde_json::to_value(m),
            RecordBody::Combined(m) => serde_json::to_value(m),
        }
        .map_err(|e| GatewayError::Internal(format!("encoding metrics payload: {e}")))?;

        Ok(Self {
            domain_id: record.domain.as_str().to_string(),
            source: record.source().as_str().to_string(),
            recorded_at: record.timestamp,
            expires_at: record.expires_at,
            payload,
        })
    }
}

impl TryFrom<MetricsRow> for MetricsRecord {
    type Error = GatewayError;

    fn try_from(row: MetricsRow) -> Result<Self, Self::Error> {
        let domain = DomainId::parse(&row.domain_id)?;
        let tagged = serde_json::json!({ "source": row.source, "metrics": row.payload });
        let body: RecordBody = serde_json::from_value(tagged).map_err(|e| {
            GatewayError::StorageFailure(format!(
                "corrupt {} record for {domain} at {}: {e}",
                row.source, row.recorded_at
            ))
        })?;
        Ok(Self {
            domain,
            timestamp: row.recorded_at,
            expires_at: row.expires_at,
            body,
        })
    }
}

/// A row of the `domains` table.
#[derive(Debug, Clone)]
pub struct DomainRow {
    /// Domain identifier.
    pub domain_id: String,
    /// Display name.
    pub name: String,
    /// Owning user.
    pub user_id: String,
    /// WooCommerce flag.
    pub woocommerce_enabled: bool,
    /// Analytics flag.
    pub ga_enabled: bool,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Last change.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DomainRow> for TrackedDomain {
    type Error = GatewayError;

    fn try_from(row: DomainRow) -> Result<Self, Self::Error> {
        Ok(Self {
            domain_id: DomainId::parse(&row.domain_id)?,
            name: row.name,
            owner: UserId::parse(&row.user_id)?,
            woocommerce_enabled: row.woocommerce_enabled,
            ga_enabled: row.ga_enabled,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{AnalyticsMetrics, CombinedSnapshot, RecordSource};

    fn record(body: RecordBody) -> MetricsRecord {
        let Ok(domain) = DomainId::parse("a.com") else {
            panic!("valid domain");
        };
        MetricsRecord {
            domain,
            timestamp: 1_700_000_000,
            expires_at: 1_707_776_000,
            body,
        }
    }

    #[test]
    fn row_columns_follow_record() {
        let rec = record(RecordBody::GoogleAnalytics(AnalyticsMetrics::default()));
        let Ok(row) = MetricsRow::from_record(&rec) else {
            panic!("encoding failed");
        };
        assert_eq!(row.source, "google_analytics");
        assert_eq!(row.recorded_at, 1_700_000_000);
        assert!(row.payload.get("by_device").is_some());

        let Ok(back) = MetricsRecord::try_from(row) else {
            panic!("decoding failed");
        };
        assert_eq!(back, rec);
    }

    #[test]
    fn combined_row_decodes() {
        let rec = record(RecordBody::Combined(CombinedSnapshot::default()));
        let Ok(row) = MetricsRow::from_record(&rec) else {
            panic!("encoding failed");
        };
        let Ok(back) = MetricsRecord::try_from(row) else {
            panic!("decoding failed");
        };
        assert_eq!(back.source(), RecordSource::Combined);
    }

    #[test]
    fn unknown_source_is_storage_failure() {
        let row = MetricsRow {
            domain_id: "a.com".to_string(),
            source: "facebook".to_string(),
            recorded_at: 1,
            expires_at: 2,
            payload: serde_json::json!({}),
        };
        assert!(matches!(
            MetricsRecord::try_from(row),
            Err(GatewayError::StorageFailure(_))
        ));
    }
}
