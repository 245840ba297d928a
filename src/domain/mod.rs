//! Domain layer: tenant identity, metrics payloads, stored records,
//! lookback windows and the event system.

pub mod event_bus;
pub mod ids;
pub mod metrics_event;
pub mod payload;
pub mod record;
pub mod tenant;
pub mod window;

pub use event_bus::EventBus;
pub use ids::{DomainId, UserId};
pub use metrics_event::MetricsEvent;
pub use payload::{
    AnalyticsMetrics, CombinedMetrics, CombinedSnapshot, SourcePayload, TopProduct,
    TrafficTotals, WooCommerceMetrics,
};
pub use record::{MetricsRecord, RecordBody, RecordSource, SourceTag};
pub use tenant::TrackedDomain;
pub use window::{FetchWindow, MetricsWindow};
