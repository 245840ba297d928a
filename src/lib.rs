//! # dashora-gateway
//!
//! Multi-tenant analytics gateway. For every tracked domain it pulls store
//! metrics from WooCommerce and traffic metrics from Google Analytics,
//! stores both as TTL'd records, merges them into a combined view with
//! cross-metrics such as conversion rate, and serves the results to the
//! owning user over an authenticated REST API.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, bearer token)
//!     │
//!     ├── REST Handlers (api/) ── AuthUser (auth)
//!     │
//!     ├── MetricsService / IngestService (service/)
//!     ├── Scheduler: fetch loop + combiner (service/)
//!     ├── EventBus (domain/)
//!     │
//!     ├── Sources: WooCommerce, Analytics, synthetic (sources/)
//!     ├── Aggregation + merge (metrics/)
//!     │
//!     └── Persistence: in-memory or PostgreSQL (persistence/)
//! ```

pub mod api;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod persistence;
pub mod service;
pub mod sources;
