//! Shared DTO types used across multiple endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{MetricsWindow, RecordSource};
use crate::error::GatewayError;

/// Lookback query parameters: `?period=7d` or `?days=14`.
///
/// Values arrive as raw strings so that bad input is reported through the
/// regular JSON error body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WindowParams {
    /// Named period: `7d`, `14d`, `30d` or `90d`. Wins over `days`.
    #[serde(default)]
    pub period: Option<String>,
    /// Day count between 1 and 365.
    #[serde(default)]
    pub days: Option<String>,
}

impl WindowParams {
    /// Resolves the requested window, defaulting to 30 days.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidInput`] for unknown periods and
    /// out-of-range or non-numeric day counts.
    pub fn window(&self) -> Result<MetricsWindow, GatewayError> {
        let days = self
            .days
            .as_deref()
            .map(|raw| {
                raw.trim().parse::<u32>().map_err(|_| {
                    GatewayError::InvalidInput(format!("days must be a whole number, got `{raw}`"))
                })
            })
            .transpose()?;
        MetricsWindow::resolve(self.period.as_deref(), days)
    }
}

/// Query parameters of `GET /metrics/{domain}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsParams {
    /// Lookback window.
    #[serde(flatten)]
    pub window: WindowParams,
    /// Optional record source filter.
    #[serde(default)]
    pub source: Option<String>,
}

impl MetricsParams {
    /// Parses the source filter.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidInput`] for an unknown source name.
    pub fn source(&self) -> Result<Option<RecordSource>, GatewayError> {
        self.source
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.trim().parse::<RecordSource>())
            .transpose()
    }
}

/// `GET /` response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiInfoResponse {
    /// Service banner.
    pub message: String,
    /// Crate version.
    pub version: String,
    /// Authenticated caller.
    pub user_id: String,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn params(period: Option<&str>, days: Option<&str>) -> WindowParams {
        WindowParams {
            period: period.map(String::from),
            days: days.map(String::from),
        }
    }

    #[test]
    fn window_resolution() {
        assert_eq!(params(None, None).window().ok().map(MetricsWindow::days), Some(30));
        assert_eq!(params(None, Some("14")).window().ok().map(MetricsWindow::days), Some(14));
        assert_eq!(
            params(Some("90d"), Some("14")).window().ok().map(MetricsWindow::days),
            Some(90)
        );
        assert!(params(None, Some("ten")).window().is_err());
        assert!(params(None, Some("0")).window().is_err());
    }

    #[test]
    fn source_filter() {
        let mut p = MetricsParams::default();
        assert!(matches!(p.source(), Ok(None)));
        p.source = Some("combined".to_string());
        assert!(matches!(p.source(), Ok(Some(RecordSource::Combined))));
        p.source = Some("twitter".to_string());
        assert!(p.source().is_err());
    }
}
