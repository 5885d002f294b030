//! Bearer token management for the TDX API.
//!
//! TDX issues tokens through an OAuth client-credentials grant. Tokens are
//! valid for a day; we treat them as expired a little earlier and otherwise
//! only renew when the API rejects one.

use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::error::AuthError;

/// Default token endpoint.
pub const DEFAULT_AUTH_URL: &str =
    "https://tdx.transportdata.tw/auth/realms/TDXConnect/protocol/openid-connect/token";

/// How long a fetched token is reused before a fresh one is requested.
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(23 * 60 * 60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    fetched_at: Instant,
}

/// Hands out bearer tokens, fetching at most one at a time.
///
/// All operations hold one async mutex while talking to the token endpoint,
/// so concurrent callers that find no usable token wait for the single
/// in-flight request instead of issuing their own.
#[derive(Debug)]
pub struct TokenManager {
    http: reqwest::Client,
    auth_url: String,
    client_id: String,
    client_secret: String,
    lifetime: Duration,
    current: Mutex<Option<CachedToken>>,
}

impl TokenManager {
    pub fn new(
        http: reqwest::Client,
        auth_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        lifetime: Duration,
    ) -> Self {
        Self {
            http,
            auth_url: auth_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            lifetime,
            current: Mutex::new(None),
        }
    }

    /// Return the current token, fetching one if none is held or it is stale.
    pub async fn get(&self) -> Result<String, AuthError> {
        let mut current = self.current.lock().await;
        if let Some(token) = current.as_ref()
            && token.fetched_at.elapsed() < self.lifetime
        {
            return Ok(token.value.clone());
        }

        let token = self.fetch().await?;
        *current = Some(token.clone());
        Ok(token.value)
    }

    /// Unconditionally fetch and store a new token.
    pub async fn refresh(&self) -> Result<String, AuthError> {
        let mut current = self.current.lock().await;
        let token = self.fetch().await?;
        *current = Some(token.clone());
        Ok(token.value)
    }

    /// Replace a token the API rejected.
    ///
    /// If another caller already replaced `rejected` while we waited for the
    /// lock, the newer token is returned without another request.
    pub async fn renew(&self, rejected: &str) -> Result<String, AuthError> {
        let mut current = self.current.lock().await;
        if let Some(token) = current.as_ref()
            && token.value != rejected
            && token.fetched_at.elapsed() < self.lifetime
        {
            debug!("token already renewed by another request");
            return Ok(token.value.clone());
        }

        let token = self.fetch().await?;
        *current = Some(token.clone());
        Ok(token.value)
    }

    async fn fetch(&self) -> Result<CachedToken, AuthError> {
        info!(url = %self.auth_url, "requesting TDX access token");

        let response = self
            .http
            .post(&self.auth_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: TokenResponse = response.json().await?;
        let value = body
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        Ok(CachedToken {
            value,
            fetched_at: Instant::now(),
        })
    }
}
