//! Upstream metrics sources.
//!
//! Every upstream implements [`MetricsSource`]. Which implementations run
//! is decided once at startup by building a [`SourceSet`]; the ingest
//! pipeline only ever sees the trait objects.

pub mod analytics;
pub mod credentials;
pub mod google_auth;
pub mod synthetic;
pub mod woocommerce;

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

pub use analytics::AnalyticsSource;
pub use credentials::{
    AnalyticsAuth, AnalyticsCredentials, CredentialStore, DomainCredentials, ServiceAccountKey,
    StaticCredentialStore, WooCommerceCredentials,
};
pub use google_auth::ServiceAccountTokens;
pub use synthetic::SyntheticSource;
pub use woocommerce::WooCommerceSource;

use crate::config::{GatewayConfig, SourceMode};
use crate::domain::{DomainId, FetchWindow, SourcePayload, SourceTag};
use crate::error::GatewayError;

/// One upstream that can produce a payload for a domain.
#[async_trait]
pub trait MetricsSource: Send + Sync + Debug {
    /// Upstream this source fetches from.
    fn tag(&self) -> SourceTag;

    /// Fetches and aggregates the metrics of `domain` over `window`.
    ///
    /// Returns `Ok(None)` when the domain has no credentials for this
    /// upstream.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UpstreamFailure`] on transport errors,
    /// timeouts and non-2xx responses.
    async fn fetch(
        &self,
        domain: &DomainId,
        window: &FetchWindow,
    ) -> Result<Option<SourcePayload>, GatewayError>;
}

/// The pair of sources the gateway fetches from.
#[derive(Debug, Clone)]
pub struct SourceSet {
    /// WooCommerce source.
    pub woocommerce: Arc<dyn MetricsSource>,
    /// Analytics source.
    pub analytics: Arc<dyn MetricsSource>,
}

impl SourceSet {
    /// Live sources sharing one HTTP client bounded by
    /// `HTTP_TIMEOUT_SECS`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if the HTTP client cannot be
    /// built.
    pub fn live(
        config: &GatewayConfig,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .user_agent(concat!("dashora-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GatewayError::Internal(format!("http client: {e}")))?;

        Ok(Self {
            woocommerce: Arc::new(WooCommerceSource::new(
                client.clone(),
                Arc::clone(&credentials),
                config.woocommerce_max_pages,
            )),
            analytics: Arc::new(AnalyticsSource::new(
                client,
                credentials,
                config.analytics_api_base.clone(),
            )),
        })
    }

    /// Synthetic sources for both upstreams.
    #[must_use]
    pub fn synthetic() -> Self {
        Self {
            woocommerce: Arc::new(SyntheticSource::new(SourceTag::WooCommerce)),
            analytics: Arc::new(SyntheticSource::new(SourceTag::GoogleAnalytics)),
        }
    }

    /// Resolves the configured [`SourceMode`].
    ///
    /// # Errors
    ///
    /// See [`SourceSet::live`].
    pub fn from_config(
        config: &GatewayConfig,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, GatewayError> {
        match config.source_mode {
            SourceMode::Live => {
                tracing::info!("using live WooCommerce and Analytics sources");
                Self::live(config, credentials)
            }
            SourceMode::Synthetic => {
                tracing::warn!(
                    "SOURCE_MODE=synthetic: all stored metrics are generated, not fetched"
                );
                Ok(Self::synthetic())
            }
        }
    }

    /// The source for `tag`.
    #[must_use]
    pub fn get(&self, tag: SourceTag) -> &Arc<dyn MetricsSource> {
        match tag {
            SourceTag::WooCommerce => &self.woocommerce,
            SourceTag::GoogleAnalytics => &self.analytics,
        }
    }
}
