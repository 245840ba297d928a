//! Lookback windows for metrics reads and source fetches.

use chrono::{DateTime, Duration, Utc};

use crate::error::GatewayError;

/// Lookback in whole days used by metrics reads.
///
/// Clients pass either a named period (`7d`, `14d`, `30d`, `90d`) or a raw
/// day count between 1 and 365. The default is 30 days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsWindow {
    days: u32,
}

impl MetricsWindow {
    /// Window used when the client passes nothing.
    pub const DEFAULT_DAYS: u32 = 30;
    /// Largest accepted day count.
    pub const MAX_DAYS: u32 = 365;

    /// Builds a window of `days` days.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidInput`] unless `1 <= days <= 365`.
    pub fn from_days(days: u32) -> Result<Self, GatewayError> {
        if days == 0 || days > Self::MAX_DAYS {
            return Err(GatewayError::InvalidInput(format!(
                "days must be between 1 and {}",
                Self::MAX_DAYS
            )));
        }
        Ok(Self { days })
    }

    /// Parses a named period.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidInput`] for anything other than
    /// `7d`, `14d`, `30d` or `90d`.
    pub fn from_period(period: &str) -> Result<Self, GatewayError> {
        let days = match period.trim() {
            "7d" => 7,
            "14d" => 14,
            "30d" => 30,
            "90d" => 90,
            other => {
                return Err(GatewayError::InvalidInput(format!(
                    "unknown period `{other}` (expected 7d, 14d, 30d or 90d)"
                )));
            }
        };
        Ok(Self { days })
    }

    /// Resolves the query parameters of a metrics request. `period` wins
    /// over `days` when both are present.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidInput`] when the given value is out
    /// of range or unknown.
    pub fn resolve(period: Option<&str>, days: Option<u32>) -> Result<Self, GatewayError> {
        match (period, days) {
            (Some(p), _) => Self::from_period(p),
            (None, Some(d)) => Self::from_days(d),
            (None, None) => Ok(Self::default()),
        }
    }

    /// Length of the window in days.
    #[must_use]
    pub const fn days(self) -> u32 {
        self.days
    }

    /// Inclusive `[start, end]` epoch-second bounds ending at `now`.
    #[must_use]
    pub fn bounds(self, now: DateTime<Utc>) -> (i64, i64) {
        let start = now - Duration::days(i64::from(self.days));
        (start.timestamp(), now.timestamp())
    }
}

impl Default for MetricsWindow {
    fn default() -> Self {
        Self {
            days: Self::DEFAULT_DAYS,
        }
    }
}

/// Trailing time range pulled from an upstream in one fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    /// Range start.
    pub start: DateTime<Utc>,
    /// Range end (the fetch time).
    pub end: DateTime<Utc>,
}

impl FetchWindow {
    /// Window of `days` days ending at `now`.
    #[must_use]
    pub fn trailing(days: u32, now: DateTime<Utc>) -> Self {
        Self {
            start: now - Duration::days(i64::from(days)),
            end: now,
        }
    }

    /// Number of whole days covered.
    #[must_use]
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}
