//! Live Google Analytics Data API fetcher.
//!
//! Runs one `runReport` per domain over the fetch window, broken down by
//! date, device category and country, and aggregates the rows with
//! [`aggregate_traffic`]. Requests carry either a fixed access token or
//! one minted from the property's service account.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::MetricsSource;
use super::credentials::{AnalyticsAuth, CredentialStore};
use super::google_auth::ServiceAccountTokens;
use crate::domain::{DomainId, FetchWindow, SourcePayload, SourceTag};
use crate::error::GatewayError;
use crate::metrics::{AnalyticsRow, aggregate_traffic};

const DIMENSIONS: [&str; 3] = ["date", "deviceCategory", "country"];
const METRICS: [&str; 5] = [
    "activeUsers",
    "sessions",
    "screenPageViews",
    "conversions",
    "totalRevenue",
];
const ROW_LIMIT: u64 = 100_000;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunReportRequest {
    date_ranges: Vec<DateRange>,
    dimensions: Vec<Named>,
    metrics: Vec<Named>,
    limit: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DateRange {
    start_date: String,
    end_date: String,
}

#[derive(Debug, Serialize)]
struct Named {
    name: &'static str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunReportResponse {
    #[serde(default)]
    rows: Vec<ReportRow>,
    #[serde(default)]
    row_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportRow {
    #[serde(default)]
    dimension_values: Vec<Cell>,
    #[serde(default)]
    metric_values: Vec<Cell>,
}

#[derive(Debug, Deserialize)]
struct Cell {
    #[serde(default)]
    value: String,
}

/// Fetches traffic metrics from the Analytics Data API.
#[derive(Debug, Clone)]
pub struct AnalyticsSource {
    client: reqwest::Client,
    credentials: Arc<dyn CredentialStore>,
    tokens: Arc<ServiceAccountTokens>,
    api_base: String,
}

impl AnalyticsSource {
    /// Creates a fetcher sharing `client` for both report and token
    /// requests. `api_base` is normally
    /// `https://analyticsdata.googleapis.com`.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        credentials: Arc<dyn CredentialStore>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            tokens: Arc::new(ServiceAccountTokens::new(client.clone())),
            client,
            credentials,
            api_base: api_base.into(),
        }
    }

    async fn bearer(&self, auth: &AnalyticsAuth) -> Result<SecretString, GatewayError> {
        match auth {
            AnalyticsAuth::ServiceAccount {
                service_account_info,
            } => {
                self.tokens
                    .access_token(service_account_info, Utc::now())
                    .await
            }
            AnalyticsAuth::AccessToken { access_token } => Ok(access_token.clone()),
        }
    }

    fn upstream(message: impl Into<String>) -> GatewayError {
        GatewayError::upstream(SourceTag::GoogleAnalytics.as_str(), message)
    }

    fn report_request(window: &FetchWindow) -> RunReportRequest {
        RunReportRequest {
            date_ranges: vec![DateRange {
                start_date: window.start.format("%Y-%m-%d").to_string(),
                end_date: window.end.format("%Y-%m-%d").to_string(),
            }],
            dimensions: DIMENSIONS.into_iter().map(|name| Named { name }).collect(),
            metrics: METRICS.into_iter().map(|name| Named { name }).collect(),
            limit: ROW_LIMIT,
        }
    }
}

#[async_trait]
impl MetricsSource for AnalyticsSource {
    fn tag(&self) -> SourceTag {
        SourceTag::GoogleAnalytics
    }

    async fn fetch(
        &self,
        domain: &DomainId,
        window: &FetchWindow,
    ) -> Result<Option<SourcePayload>, GatewayError> {
        let Some(creds) = self.credentials.analytics(domain).await? else {
            tracing::debug!(%domain, "no analytics credentials configured");
            return Ok(None);
        };

        let url = format!(
            "{}/v1beta/properties/{}:runReport",
            self.api_base.trim_end_matches('/'),
            creds.property_id
        );

        let token = self.bearer(&creds.auth).await?;
        let response = self
            .client
            .post(&url)
            .bearer_auth(token.expose_secret())
            .json(&Self::report_request(window))
            .send()
            .await
            .map_err(|e| Self::upstream(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::upstream(format!("HTTP {}: {body}", status.as_u16())));
        }

        let report: RunReportResponse = response
            .json()
            .await
            .map_err(|e| Self::upstream(format!("unreadable body: {e}")))?;

        let received = report.rows.len() as u64;
        if let Some(row_count) = report.row_count.filter(|&n| n > received) {
            tracing::warn!(%domain, row_count, received, "report truncated");
        }

        let rows = report.rows.into_iter().filter_map(|row| {
            let dims: Vec<String> = row.dimension_values.into_iter().map(|c| c.value).collect();
            let metrics: Vec<String> = row.metric_values.into_iter().map(|c| c.value).collect();
            match AnalyticsRow::from_cells(&dims, &metrics) {
                Ok(row) => Some(row),
                Err(err) => {
                    tracing::warn!(%domain, error = %err, "skipping report row");
                    None
                }
            }
        });
        let metrics = aggregate_traffic(rows);

        tracing::info!(
            %domain,
            sessions = metrics.total_sessions,
            users = metrics.total_users,
            "analytics metrics fetched"
        );
        Ok(Some(SourcePayload::GoogleAnalytics(metrics)))
    }
}
