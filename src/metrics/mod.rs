//! Metrics computation: per-source aggregation of raw upstream rows and
//! the cross-source merge.
//!
//! Everything in this module is pure. Fetching lives in
//! [`crate::sources`] and persistence in [`crate::persistence`].

pub mod aggregate;
pub mod merge;

pub use aggregate::{
    AnalyticsRow, CoercionError, aggregate_traffic, coerce_count, coerce_decimal, round_2dp,
    summarize_orders,
};
pub use merge::{combine_records, conversion_rate, merge_metrics};
