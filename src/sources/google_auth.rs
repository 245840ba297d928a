//! OAuth access tokens for Google service accounts.
//!
//! Implements the two-legged JWT bearer flow: an RS256 assertion signed
//! with the service account's private key is exchanged at `token_uri` for
//! a short-lived access token. Tokens are cached per service account and
//! re-minted shortly before they expire.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::credentials::ServiceAccountKey;
use crate::domain::SourceTag;
use crate::error::GatewayError;

const ANALYTICS_SCOPE: &str = "https://www.googleapis.com/auth/analytics.readonly";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: SecretString,
    expires_at: i64,
}

/// Access-token cache keyed by service account address.
#[derive(Debug)]
pub struct ServiceAccountTokens {
    client: reqwest::Client,
    cache: RwLock<HashMap<String, CachedToken>>,
}

impl ServiceAccountTokens {
    /// Creates an empty cache that exchanges assertions over `client`.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn upstream(message: impl Into<String>) -> GatewayError {
        GatewayError::upstream(SourceTag::GoogleAnalytics.as_str(), message)
    }

    /// Returns a token for `key` valid for at least another minute at
    /// `now`, minting a new one when the cached token is missing or about
    /// to expire.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UpstreamFailure`] if the key cannot sign
    /// or the token endpoint rejects the assertion.
    pub async fn access_token(
        &self,
        key: &ServiceAccountKey,
        now: DateTime<Utc>,
    ) -> Result<SecretString, GatewayError> {
        let now = now.timestamp();
        if let Some(cached) = self.cache.read().await.get(&key.client_email)
            && cached.expires_at.saturating_sub(REFRESH_MARGIN_SECS) > now
        {
            return Ok(cached.token.clone());
        }

        let minted = self.exchange(key, now).await?;
        let token = minted.token.clone();
        self.cache
            .write()
            .await
            .insert(key.client_email.clone(), minted);
        Ok(token)
    }

    fn assertion(key: &ServiceAccountKey, now: i64) -> Result<String, GatewayError> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid.clone_from(&key.private_key_id);
        let claims = AssertionClaims {
            iss: &key.client_email,
            scope: ANALYTICS_SCOPE,
            aud: &key.token_uri,
            iat: now,
            exp: now.saturating_add(ASSERTION_LIFETIME_SECS),
        };
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.expose_secret().as_bytes())
            .map_err(|e| Self::upstream(format!("private key of {}: {e}", key.client_email)))?;
        jsonwebtoken::encode(&header, &claims, &signing_key)
            .map_err(|e| Self::upstream(format!("signing assertion: {e}")))
    }

    async fn exchange(&self, key: &ServiceAccountKey, now: i64) -> Result<CachedToken, GatewayError> {
        let assertion = Self::assertion(key, now)?;
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", JWT_BEARER_GRANT)
            .append_pair("assertion", &assertion)
            .finish();

        let response = self
            .client
            .post(&key.token_uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| Self::upstream(format!("token exchange: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::upstream(format!(
                "token exchange HTTP {}: {body}",
                status.as_u16()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| Self::upstream(format!("unreadable token response: {e}")))?;
        let expires_in = token.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS);
        tracing::debug!(client_email = %key.client_email, expires_in, "access token minted");

        Ok(CachedToken {
            token: SecretString::from(token.access_token),
            expires_at: now.saturating_add(expires_in),
        })
    }
}
