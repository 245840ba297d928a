//! Per-domain upstream credentials.
//!
//! The gateway only reads credentials; provisioning happens out of band.
//! Secrets stay wrapped in [`SecretString`] until the moment a request is
//! signed.

use std::collections::HashMap;
use std::fmt::Debug;
use std::path::Path;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::Deserialize;

use crate::domain::DomainId;
use crate::error::GatewayError;

/// WooCommerce REST API key pair for one store.
#[derive(Debug, Clone, Deserialize)]
pub struct WooCommerceCredentials {
    /// Store base URL. Defaults to `https://{domain}` when absent.
    #[serde(default)]
    pub api_url: Option<String>,
    /// Consumer key (`ck_...`).
    pub consumer_key: SecretString,
    /// Consumer secret (`cs_...`).
    pub consumer_secret: SecretString,
}

/// Google service-account key, as downloaded from the Cloud console.
///
/// Fields of the key file that are not listed here are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    /// Service account address, the `iss` of the token assertion.
    pub client_email: String,
    /// PKCS#8 PEM private key.
    pub private_key: SecretString,
    /// Key id, sent as the assertion's `kid` header.
    #[serde(default)]
    pub private_key_id: Option<String>,
    /// OAuth token endpoint.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// How requests to the Analytics Data API are authorized.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AnalyticsAuth {
    /// Access tokens are minted from the key and refreshed before expiry.
    ServiceAccount {
        /// The service-account key file contents.
        service_account_info: ServiceAccountKey,
    },
    /// A fixed OAuth access token, used as is.
    AccessToken {
        /// Bearer token.
        access_token: SecretString,
    },
}

/// Analytics Data API access for one property.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsCredentials {
    /// GA4 property id (digits only, without the `properties/` prefix).
    pub property_id: String,
    /// Service account or fixed token.
    #[serde(flatten)]
    pub auth: AnalyticsAuth,
}

/// Read-only lookup of per-domain credentials.
///
/// `Ok(None)` means the domain has no credentials for that upstream; the
/// fetcher treats it as "not configured" rather than as a failure.
#[async_trait]
pub trait CredentialStore: Send + Sync + Debug {
    /// WooCommerce credentials of `domain`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::StorageFailure`] when the backing secret
    /// store cannot be read.
    async fn woocommerce(
        &self,
        domain: &DomainId,
    ) -> Result<Option<WooCommerceCredentials>, GatewayError>;

    /// Analytics credentials of `domain`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::StorageFailure`] when the backing secret
    /// store cannot be read.
    async fn analytics(
        &self,
        domain: &DomainId,
    ) -> Result<Option<AnalyticsCredentials>, GatewayError>;
}

/// Credentials of one domain as laid out in the credentials file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DomainCredentials {
    /// WooCommerce key pair.
    #[serde(default)]
    pub woocommerce: Option<WooCommerceCredentials>,
    /// Analytics property access.
    #[serde(default)]
    pub google_analytics: Option<AnalyticsCredentials>,
}

/// In-memory [`CredentialStore`], usually loaded from a JSON file shaped
/// as `{ "<domain>": { "woocommerce": {...}, "google_analytics": {...} } }`.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialStore {
    entries: HashMap<String, DomainCredentials>,
}

impl StaticCredentialStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the credentials of `domain`.
    #[must_use]
    pub fn with_domain(mut self, domain: &DomainId, credentials: DomainCredentials) -> Self {
        self.entries.insert(domain.as_str().to_string(), credentials);
        self
    }

    /// Parses a store from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidInput`] when the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self, GatewayError> {
        let entries: HashMap<String, DomainCredentials> = serde_json::from_str(json)
            .map_err(|e| GatewayError::InvalidInput(format!("credentials file: {e}")))?;
        Ok(Self { entries })
    }

    /// Reads and parses a credentials file.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::StorageFailure`] if the file cannot be read
    /// and [`GatewayError::InvalidInput`] if it is not valid JSON.
    pub async fn load(path: &Path) -> Result<Self, GatewayError> {
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            GatewayError::StorageFailure(format!("reading {}: {e}", path.display()))
        })?;
        let store = Self::from_json(&json)?;
        tracing::info!(
            path = %path.display(),
            domains = store.entries.len(),
            "credentials loaded"
        );
        Ok(store)
    }

    /// Number of domains with at least one credential entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CredentialStore for StaticCredentialStore {
    async fn woocommerce(
        &self,
        domain: &DomainId,
    ) -> Result<Option<WooCommerceCredentials>, GatewayError> {
        Ok(self
            .entries
            .get(domain.as_str())
            .and_then(|c| c.woocommerce.clone()))
    }

    async fn analytics(
        &self,
        domain: &DomainId,
    ) -> Result<Option<AnalyticsCredentials>, GatewayError> {
        Ok(self
            .entries
            .get(domain.as_str())
            .and_then(|c| c.google_analytics.clone()))
    }
}
