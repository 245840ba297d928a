//! Domain events emitted by the ingest and merge pipeline.
//!
//! Every stored record and every per-domain fetch failure emits a
//! [`MetricsEvent`] through the [`super::EventBus`]. The combiner task
//! listens for [`MetricsEvent::SourceRecordStored`] to recompute the
//! combined record of that domain.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{DomainId, SourceTag};

/// Domain event emitted after every write or failed fetch.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum MetricsEvent {
    /// A fresh source record was persisted.
    SourceRecordStored {
        /// Domain the record belongs to.
        domain: DomainId,
        /// Upstream the record came from.
        source: SourceTag,
        /// Record timestamp, epoch seconds.
        record_timestamp: i64,
        /// Emission time.
        timestamp: DateTime<Utc>,
    },

    /// The combined record of a domain was (re)written.
    CombinedRecordStored {
        /// Domain the record belongs to.
        domain: DomainId,
        /// Record timestamp, epoch seconds.
        record_timestamp: i64,
        /// Emission time.
        timestamp: DateTime<Utc>,
    },

    /// Fetching one domain from one upstream failed.
    FetchFailed {
        /// Domain that failed.
        domain: DomainId,
        /// Upstream that failed.
        source: SourceTag,
        /// Failure description.
        message: String,
        /// Emission time.
        timestamp: DateTime<Utc>,
    },
}

impl MetricsEvent {
    /// Returns the domain associated with this event.
    #[must_use]
    pub const fn domain(&self) -> &DomainId {
        match self {
            Self::SourceRecordStored { domain, .. }
            | Self::CombinedRecordStored { domain, .. }
            | Self::FetchFailed { domain, .. } => domain,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::SourceRecordStored { .. } => "source_record_stored",
            Self::CombinedRecordStored { .. } => "combined_record_stored",
            Self::FetchFailed { .. } => "fetch_failed",
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn domain() -> DomainId {
        let Ok(d) = DomainId::parse("example.com") else {
            panic!("valid domain");
        };
        d
    }

    #[test]
    fn source_record_stored_serializes() {
        let event = MetricsEvent::SourceRecordStored {
            domain: domain(),
            source: SourceTag::GoogleAnalytics,
            record_timestamp: 1_700_000_000,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap_or_default();
        assert!(json.contains("source_record_stored"));
        assert!(json.contains("google_analytics"));
        assert_eq!(event.event_type_str(), "source_record_stored");
    }

    #[test]
    fn domain_accessor() {
        let event = MetricsEvent::FetchFailed {
            domain: domain(),
            source: SourceTag::WooCommerce,
            message: "timeout".to_string(),
            timestamp: Utc::now(),
        };
        assert_eq!(event.domain().as_str(), "example.com");
    }
}
