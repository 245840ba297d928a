//! Data Transfer Objects for REST request/response serialization.
//!
//! Monetary amounts are serialized as JSON strings to keep decimal
//! precision.

pub mod common_dto;
pub mod domain_dto;
pub mod metrics_dto;

pub use common_dto::*;
pub use domain_dto::*;
pub use metrics_dto::*;
