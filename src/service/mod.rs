//! Service layer: business logic orchestration.
//!
//! [`MetricsService`] serves tenant-scoped reads and domain changes,
//! [`IngestService`] runs fetch cycles, and [`scheduler`] drives both in
//! the background. Every write emits events through the
//! [`super::domain::EventBus`].

pub mod ingest_service;
pub mod metrics_service;
pub mod scheduler;

pub use ingest_service::{BatchReport, DomainFailure, IngestService};
pub use metrics_service::MetricsService;
pub use scheduler::{spawn_combiner, spawn_fetch_loop};
