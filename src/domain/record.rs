//! Stored metrics records and their source tags.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::DomainId;
use super::payload::{AnalyticsMetrics, CombinedSnapshot, SourcePayload, WooCommerceMetrics};
use crate::error::GatewayError;

/// Upstream a source record was fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceTag {
    /// WooCommerce REST API.
    #[serde(rename = "woocommerce")]
    WooCommerce,
    /// Google Analytics Data API.
    #[serde(rename = "google_analytics")]
    GoogleAnalytics,
}

impl SourceTag {
    /// Both upstreams, in fetch order.
    pub const ALL: [Self; 2] = [Self::WooCommerce, Self::GoogleAnalytics];

    /// Wire name of the tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WooCommerce => "woocommerce",
            Self::GoogleAnalytics => "google_analytics",
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discriminator of a stored record: one of the two sources, or the
/// merged record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordSource {
    /// WooCommerce source record.
    WooCommerce,
    /// Analytics source record.
    GoogleAnalytics,
    /// Merged record.
    Combined,
}

impl RecordSource {
    /// Wire name of the record source.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WooCommerce => "woocommerce",
            Self::GoogleAnalytics => "google_analytics",
            Self::Combined => "combined",
        }
    }
}

impl From<SourceTag> for RecordSource {
    fn from(tag: SourceTag) -> Self {
        match tag {
            SourceTag::WooCommerce => Self::WooCommerce,
            SourceTag::GoogleAnalytics => Self::GoogleAnalytics,
        }
    }
}

impl FromStr for RecordSource {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "woocommerce" => Ok(Self::WooCommerce),
            "google_analytics" => Ok(Self::GoogleAnalytics),
            "combined" => Ok(Self::Combined),
            other => Err(GatewayError::InvalidInput(format!(
                "unknown source `{other}`"
            ))),
        }
    }
}

impl fmt::Display for RecordSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source-specific body of a stored record.
///
/// Serialized adjacently tagged as `{"source": ..., "metrics": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "metrics")]
pub enum RecordBody {
    /// WooCommerce source payload.
    #[serde(rename = "woocommerce")]
    WooCommerce(WooCommerceMetrics),
    /// Analytics source payload.
    #[serde(rename = "google_analytics")]
    GoogleAnalytics(AnalyticsMetrics),
    /// Merged payload.
    #[serde(rename = "combined")]
    Combined(CombinedSnapshot),
}

impl RecordBody {
    /// Discriminator of this body.
    #[must_use]
    pub const fn source(&self) -> RecordSource {
        match self {
            Self::WooCommerce(_) => RecordSource::WooCommerce,
            Self::GoogleAnalytics(_) => RecordSource::GoogleAnalytics,
            Self::Combined(_) => RecordSource::Combined,
        }
    }
}

impl From<SourcePayload> for RecordBody {
    fn from(payload: SourcePayload) -> Self {
        match payload {
            SourcePayload::WooCommerce(m) => Self::WooCommerce(m),
            SourcePayload::GoogleAnalytics(m) => Self::GoogleAnalytics(m),
        }
    }
}

/// A record in the metrics store, keyed by `(domain, source, timestamp)`.
///
/// Source records are immutable once written; a later fetch writes a new
/// record. A combined record for the same key is overwritten on
/// recomputation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsRecord {
    /// Owning domain.
    pub domain: DomainId,
    /// Fetch (or newest input) time, epoch seconds.
    pub timestamp: i64,
    /// Epoch seconds after which the record may be deleted.
    pub expires_at: i64,
    /// Tagged payload.
    #[serde(flatten)]
    pub body: RecordBody,
}

impl MetricsRecord {
    /// Discriminator of this record.
    #[must_use]
    pub const fn source(&self) -> RecordSource {
        self.body.source()
    }

    /// WooCommerce payload of a WooCommerce source record.
    #[must_use]
    pub const fn woocommerce(&self) -> Option<&WooCommerceMetrics> {
        match &self.body {
            RecordBody::WooCommerce(m) => Some(m),
            _ => None,
        }
    }

    /// Analytics payload of an Analytics source record.
    #[must_use]
    pub const fn analytics(&self) -> Option<&AnalyticsMetrics> {
        match &self.body {
            RecordBody::GoogleAnalytics(m) => Some(m),
            _ => None,
        }
    }

    /// Returns `true` once `now` has passed `expires_at`.
    #[must_use]
    pub const fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn record(body: RecordBody) -> MetricsRecord {
        let Ok(domain) = DomainId::parse("example.com") else {
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
    fn record_serializes_flat_with_source_tag() {
        let rec = record(RecordBody::WooCommerce(WooCommerceMetrics::default()));
        let Ok(json) = serde_json::to_value(&rec) else {
            panic!("serialization failed");
        };
        assert_eq!(json["domain"], serde_json::json!("example.com"));
        assert_eq!(json["source"], serde_json::json!("woocommerce"));
        assert_eq!(json["timestamp"], serde_json::json!(1_700_000_000));
        assert!(json["metrics"].is_object());
    }

    #[test]
    fn body_round_trips_through_json() {
        let body = RecordBody::GoogleAnalytics(AnalyticsMetrics::default());
        let Ok(json) = serde_json::to_value(&body) else {
            panic!("serialization failed");
        };
        let Ok(back) = serde_json::from_value::<RecordBody>(json) else {
            panic!("deserialization failed");
        };
        assert_eq!(back, body);
    }

    #[test]
    fn source_names_parse() {
        assert!(matches!(
            "combined".parse::<RecordSource>(),
            Ok(RecordSource::Combined)
        ));
        assert!(matches!(
            "google_analytics".parse::<RecordSource>(),
            Ok(RecordSource::GoogleAnalytics)
        ));
        assert!("ga".parse::<RecordSource>().is_err());
    }

    #[test]
    fn accessors_match_body() {
        let rec = record(RecordBody::WooCommerce(WooCommerceMetrics::default()));
        assert!(rec.woocommerce().is_some());
        assert!(rec.analytics().is_none());
        assert_eq!(rec.source(), RecordSource::WooCommerce);
        assert!(!rec.is_expired(1_700_000_001));
        assert!(rec.is_expired(1_707_776_000));
    }
}
