//! Bearer token authentication.
//!
//! Tokens are compact HS256 JWTs, `header.claims.signature`, each segment
//! base64url-encoded without padding and the signature computed by
//! HMAC-SHA256 over `header.claims`. Every failure (missing header,
//! malformed token, foreign algorithm, bad signature, missing subject,
//! expired) maps to the same [`GatewayError::Unauthorized`].

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::app_state::AppState;
use crate::domain::UserId;
use crate::error::GatewayError;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "HS256";

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

/// Token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id. `user_id` is accepted as an alias.
    #[serde(alias = "user_id")]
    pub sub: String,
    /// Expiry, epoch seconds.
    pub exp: i64,
    /// Issue time, epoch seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

/// Signs and verifies bearer tokens with a shared secret.
#[derive(Debug, Clone)]
pub struct TokenAuthority {
    secret: SecretString,
}

impl TokenAuthority {
    /// Creates an authority keyed with `secret`.
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    fn mac(&self, signing_input: &str) -> Result<HmacSha256, GatewayError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|e| GatewayError::Internal(format!("hmac key: {e}")))?;
        mac.update(signing_input.as_bytes());
        Ok(mac)
    }

    /// Mints a token for `user` valid for `ttl` from `now`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if the claims cannot be encoded.
    pub fn issue(
        &self,
        user: &UserId,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, GatewayError> {
        let header = Header {
            alg: ALGORITHM.to_string(),
            typ: Some("JWT".to_string()),
        };
        let claims = Claims {
            sub: user.as_str().to_string(),
            exp: (now + ttl).timestamp(),
            iat: Some(now.timestamp()),
        };
        let signing_input = format!("{}.{}", encode_segment(&header)?, encode_segment(&claims)?);
        let signature = URL_SAFE_NO_PAD.encode(self.mac(&signing_input)?.finalize().into_bytes());
        Ok(format!("{signing_input}.{signature}"))
    }

    /// Verifies `token` and returns its subject.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unauthorized`] for any invalid or expired
    /// token.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<UserId, GatewayError> {
        let claims = self.decode(token).map_err(|reason| {
            tracing::debug!(reason, "bearer token rejected");
            GatewayError::Unauthorized
        })?;
        if claims.exp <= now.timestamp() {
            tracing::debug!(exp = claims.exp, "bearer token expired");
            return Err(GatewayError::Unauthorized);
        }
        UserId::parse(&claims.sub).map_err(|_| GatewayError::Unauthorized)
    }

    fn decode(&self, token: &str) -> Result<Claims, &'static str> {
        let Some((signing_input, signature)) = token.rsplit_once('.') else {
            return Err("malformed");
        };
        let Some((header, payload)) = signing_input.split_once('.') else {
            return Err("malformed");
        };
        if payload.contains('.') {
            return Err("malformed");
        }

        let header: Header = decode_segment(header).ok_or("bad header")?;
        if header.alg != ALGORITHM {
            return Err("unsupported algorithm");
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| "bad signature encoding")?;
        self.mac(signing_input)
            .map_err(|_| "bad key")?
            .verify_slice(&signature)
            .map_err(|_| "signature mismatch")?;

        decode_segment(payload).ok_or("bad claims")
    }
}

fn encode_segment<T: Serialize>(value: &T) -> Result<String, GatewayError> {
    serde_json::to_vec(value)
        .map(|bytes| URL_SAFE_NO_PAD.encode(bytes))
        .map_err(|e| GatewayError::Internal(format!("token encoding: {e}")))
}

fn decode_segment<T: DeserializeOwned>(segment: &str) -> Option<T> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Extractor yielding the authenticated caller.
///
/// Reads `Authorization: Bearer <token>` and verifies it against the
/// [`TokenAuthority`] in [`AppState`].
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserId);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = GatewayError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token)
            .ok_or(GatewayError::Unauthorized)?;

        state.token_authority.verify(token, Utc::now()).map(Self)
    }
}

fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
