//! Destination credential broker
//!
//! Access to the destination takes two exchanges:
//!
//! 1. client-credentials grant against the identity endpoint, yielding a
//!    platform token and the platform instance URL;
//! 2. subject-token exchange of that platform token for a destination token
//!    and the destination instance host.
//!
//! The destination token is cached until `expires_in - 300s`. The cache sits
//! behind an async mutex held across the exchange, so concurrent callers wait
//! for the one refresh in flight instead of starting their own.

use crate::config::AuthConfig;
use crate::http::{build_client, ensure_success, normalize_base_url};
use chrono::{DateTime, Duration, Utc};
use ldc_common::{Result, SyncError};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Grant type for the destination token exchange.
pub const TOKEN_EXCHANGE_GRANT: &str = "urn:salesforce:grant-type:external:cdp";

/// Subject token type presented in the exchange.
pub const SUBJECT_TOKEN_TYPE: &str = "urn:ietf:params:oauth:token-type:access_token";

/// Lifetime assumed when the exchange omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 7200;

/// Safety margin subtracted from the reported lifetime.
pub const EXPIRY_MARGIN_SECS: i64 = 300;

/// Cached destination credential
#[derive(Clone)]
pub struct Credential {
    access_token: String,
    base_url: String,
    expires_at: DateTime<Utc>,
}

impl Credential {
    fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("base_url", &self.base_url)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Token and base URL taken from the same exchange
#[derive(Clone)]
pub struct AuthorizedSession {
    pub token: String,
    pub base_url: String,
}

impl AuthorizedSession {
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Result of the client-credentials step alone
#[derive(Clone)]
pub struct PlatformSession {
    pub access_token: String,
    pub instance_url: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    instance_url: Option<String>,
    expires_in: Option<i64>,
}

/// Owns the destination credential and refreshes it on demand
pub struct TokenBroker {
    client: Client,
    config: AuthConfig,
    cache: Mutex<Option<Credential>>,
}

impl TokenBroker {
    pub fn new(config: AuthConfig) -> Result<Self> {
        let client = build_client(config.timeout_secs)?;

        Ok(Self {
            client,
            config,
            cache: Mutex::new(None),
        })
    }

    /// Valid destination access token, exchanging a new one if needed
    pub async fn get_token(&self) -> Result<String> {
        Ok(self.authorized().await?.token)
    }

    /// Destination base URL (scheme included)
    pub async fn instance_url(&self) -> Result<String> {
        Ok(self.authorized().await?.base_url)
    }

    /// Token and base URL from one credential
    #[instrument(skip(self))]
    pub async fn authorized(&self) -> Result<AuthorizedSession> {
        let mut cache = self.cache.lock().await;

        if let Some(credential) = cache.as_ref() {
            if credential.is_valid_at(Utc::now()) {
                debug!("Using cached destination access token");
                return Ok(session_from(credential));
            }
            info!("Destination access token expired, refreshing");
        }

        let credential = self.exchange().await?;
        let session = session_from(&credential);
        *cache = Some(credential);

        Ok(session)
    }

    /// Drop the cached credential so the next call exchanges again
    pub async fn invalidate(&self) {
        *self.cache.lock().await = None;
    }

    /// Step 1 only: client-credentials grant against the identity endpoint.
    /// Not cached.
    #[instrument(skip(self))]
    pub async fn platform_session(&self) -> Result<PlatformSession> {
        let url = format!(
            "{}/services/oauth2/token",
            self.config.auth_url.trim_end_matches('/')
        );

        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];

        info!("Acquiring platform access token");
        let body = self.post_form(&url, &form, "client credentials").await?;

        let access_token = body
            .access_token
            .ok_or_else(|| SyncError::auth("identity response carried no access_token"))?;
        let instance_url = normalize_base_url(
            body.instance_url
                .as_deref()
                .unwrap_or(self.config.auth_url.as_str()),
        );

        info!(instance_url = %instance_url, "Platform access token acquired");

        Ok(PlatformSession {
            access_token,
            instance_url,
        })
    }

    async fn exchange(&self) -> Result<Credential> {
        let platform = self.platform_session().await?;

        let url = format!("{}/services/a360/token", platform.instance_url);
        let form = [
            ("grant_type", TOKEN_EXCHANGE_GRANT),
            ("subject_token", platform.access_token.as_str()),
            ("subject_token_type", SUBJECT_TOKEN_TYPE),
        ];

        info!("Exchanging platform token for destination access token");
        let body = self.post_form(&url, &form, "token exchange").await?;

        let access_token = body
            .access_token
            .ok_or_else(|| SyncError::auth("token exchange response carried no access_token"))?;

        let base_url = match body.instance_url.as_deref() {
            Some(host) if !host.trim().is_empty() => normalize_base_url(host),
            _ => {
                warn!("Token exchange returned no instance host, using configured ingestion URL");
                normalize_base_url(&self.config.fallback_instance_url)
            },
        };

        let expires_in = body.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        let expires_at = Utc::now() + Duration::seconds(expires_in - EXPIRY_MARGIN_SECS);

        info!(
            base_url = %base_url,
            expires_at = %expires_at,
            "Destination access token acquired"
        );

        Ok(Credential {
            access_token,
            base_url,
            expires_at,
        })
    }

    async fn post_form(&self, url: &str, form: &[(&str, &str)], step: &str) -> Result<TokenResponse> {
        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|e| SyncError::auth(format!("{} request failed: {}", step, e)))?;

        let response = ensure_success(response)
            .await
            .map_err(|e| SyncError::auth(format!("{} rejected: {}", step, e)))?;

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| SyncError::auth(format!("{} returned an unreadable body: {}", step, e)))
    }
}

fn session_from(credential: &Credential) -> AuthorizedSession {
    AuthorizedSession {
        token: credential.access_token.clone(),
        base_url: credential.base_url.clone(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn credential(expires_at: DateTime<Utc>) -> Credential {
        Credential {
            access_token: "secret-token".to_string(),
            base_url: "https://dc.example.com".to_string(),
            expires_at,
        }
    }

    #[test]
    fn test_credential_validity_boundary() {
        let now = Utc::now();
        assert!(credential(now + Duration::seconds(1)).is_valid_at(now));
        assert!(!credential(now).is_valid_at(now));
        assert!(!credential(now - Duration::seconds(1)).is_valid_at(now));
    }

    #[test]
    fn test_credential_debug_hides_token() {
        let rendered = format!("{:?}", credential(Utc::now()));
        assert!(!rendered.contains("secret-token"));
    }

    #[test]
    fn test_bearer_header() {
        let session = AuthorizedSession {
            token: "abc".to_string(),
            base_url: "https://dc".to_string(),
        };
        assert_eq!(session.bearer(), "Bearer abc");
    }
}
