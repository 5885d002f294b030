//! TDX HTTP client.
//!
//! Issues authenticated GET requests against the TDX API or one of its relay
//! mirrors. Handles token renewal on 401, backs off on 429, and falls back to
//! the origin when a relay cannot be reached.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use rand::seq::SliceRandom;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::auth::{DEFAULT_AUTH_URL, DEFAULT_TOKEN_LIFETIME, TokenManager};
use super::error::TdxError;

/// Default base URL for the TDX API.
pub const DEFAULT_API_ROOT: &str = "https://tdx.transportdata.tw/api/basic";

/// Default maximum concurrent requests.
const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Default wait after a 429 before trying again.
const DEFAULT_RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(5);

/// Default number of 429 retries before giving up.
const DEFAULT_MAX_RATE_LIMIT_RETRIES: u32 = 12;

/// Configuration for the TDX client.
#[derive(Debug, Clone)]
pub struct TdxConfig {
    /// OAuth client id
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// Token endpoint
    pub auth_url: String,
    /// Origin API root
    pub api_root: String,
    /// Relay mirrors of the API root, chosen at random per request
    pub relays: Vec<String>,
    /// Maximum concurrent requests
    pub max_concurrent: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// How long a token is reused
    pub token_lifetime: Duration,
    /// Wait after a 429
    pub rate_limit_backoff: Duration,
    /// 429 retries before [`TdxError::RateLimited`]
    pub max_rate_limit_retries: u32,
}

impl TdxConfig {
    /// Create a new config with the given client credentials.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            api_root: DEFAULT_API_ROOT.to_string(),
            relays: Vec::new(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            timeout_secs: 30,
            token_lifetime: DEFAULT_TOKEN_LIFETIME,
            rate_limit_backoff: DEFAULT_RATE_LIMIT_BACKOFF,
            max_rate_limit_retries: DEFAULT_MAX_RATE_LIMIT_RETRIES,
        }
    }

    /// Set a custom token endpoint (for testing).
    pub fn with_auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = url.into();
        self
    }

    /// Set a custom API root (for testing).
    pub fn with_api_root(mut self, url: impl Into<String>) -> Self {
        self.api_root = url.into();
        self
    }

    /// Route requests through relay mirrors.
    pub fn with_relays(mut self, relays: Vec<String>) -> Self {
        self.relays = relays;
        self
    }

    /// Set maximum concurrent requests.
    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set how long tokens are reused.
    pub fn with_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.token_lifetime = lifetime;
        self
    }

    /// Set the 429 backoff and retry budget.
    pub fn with_rate_limit(mut self, backoff: Duration, max_retries: u32) -> Self {
        self.rate_limit_backoff = backoff;
        self.max_rate_limit_retries = max_retries;
        self
    }
}

/// Outcome of a single request attempt.
enum Attempt {
    Body(Bytes),
    Unauthorized,
    RateLimited,
}

/// TDX API client.
///
/// Cheap to clone; clones share the token manager and the concurrency limit.
#[derive(Debug, Clone)]
pub struct TdxClient {
    http: reqwest::Client,
    api_root: String,
    relays: Arc<[String]>,
    tokens: Arc<TokenManager>,
    semaphore: Arc<Semaphore>,
    rate_limit_backoff: Duration,
    max_rate_limit_retries: u32,
}

impl TdxClient {
    /// Create a new TDX client with the given configuration.
    pub fn new(config: TdxConfig) -> Result<Self, TdxError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let tokens = TokenManager::new(
            http.clone(),
            config.auth_url,
            config.client_id,
            config.client_secret,
            config.token_lifetime,
        );

        Ok(Self {
            http,
            api_root: trim_root(config.api_root),
            relays: config.relays.into_iter().map(trim_root).collect(),
            tokens: Arc::new(tokens),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
            rate_limit_backoff: config.rate_limit_backoff,
            max_rate_limit_retries: config.max_rate_limit_retries,
        })
    }

    /// The token manager backing this client.
    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Fetch a path (with query) and return the raw body.
    ///
    /// When relays are configured one is picked at random; if it cannot be
    /// reached the request is retried once against the origin.
    pub async fn get_bytes(&self, path_and_query: &str) -> Result<Bytes, TdxError> {
        let Some(relay) = self.pick_relay() else {
            return self.get_from(&self.api_root, path_and_query).await;
        };

        match self.get_from(&relay, path_and_query).await {
            Err(e) if e.is_network() => {
                warn!(relay = %relay, error = %e, "relay unreachable, retrying on origin");
                self.get_from(&self.api_root, path_and_query).await
            }
            other => other,
        }
    }

    /// Fetch a path (with query) from the origin, ignoring relays.
    pub async fn get_direct(&self, path_and_query: &str) -> Result<Bytes, TdxError> {
        self.get_from(&self.api_root, path_and_query).await
    }

    /// Fetch a path (with query) and deserialize the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path_and_query: &str) -> Result<T, TdxError> {
        let body = self.get_bytes(path_and_query).await?;
        serde_json::from_slice(&body).map_err(|e| TdxError::Json {
            message: e.to_string(),
            body: Some(String::from_utf8_lossy(&body).chars().take(500).collect()),
        })
    }

    fn pick_relay(&self) -> Option<String> {
        self.relays.choose(&mut rand::thread_rng()).cloned()
    }

    /// Run the request loop against one root: renew the token once on 401,
    /// sleep and retry on 429 up to the retry budget.
    async fn get_from(&self, root: &str, path_and_query: &str) -> Result<Bytes, TdxError> {
        let url = format!("{root}{path_and_query}");
        let mut token = self.tokens.get().await?;
        let mut renewed = false;
        let mut rate_limited = 0u32;

        loop {
            match self.send_once(&url, &token).await? {
                Attempt::Body(body) => return Ok(body),
                Attempt::Unauthorized if !renewed => {
                    debug!(url = %url, "token rejected, renewing");
                    token = self.tokens.renew(&token).await?;
                    renewed = true;
                }
                Attempt::Unauthorized => {
                    return Err(TdxError::Fetch {
                        status: StatusCode::UNAUTHORIZED.as_u16(),
                        body: "token rejected after renewal".to_string(),
                    });
                }
                Attempt::RateLimited => {
                    rate_limited += 1;
                    if rate_limited > self.max_rate_limit_retries {
                        return Err(TdxError::RateLimited {
                            attempts: rate_limited,
                        });
                    }
                    warn!(url = %url, attempt = rate_limited, "rate limited, backing off");
                    tokio::time::sleep(self.rate_limit_backoff).await;
                }
            }
        }
    }

    async fn send_once(&self, url: &str, token: &str) -> Result<Attempt, TdxError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| TdxError::Fetch {
                status: 0,
                body: "Semaphore closed".to_string(),
            })?;

        let response = self.http.get(url).bearer_auth(token).send().await?;

        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            return Ok(Attempt::Unauthorized);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Ok(Attempt::RateLimited);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TdxError::Fetch {
                status: status.as_u16(),
                body,
            });
        }

        Ok(Attempt::Body(response.bytes().await?))
    }
}

fn trim_root(root: String) -> String {
    root.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};

    use super::*;
    use crate::tdx::testing::{dead_root, spawn_server};

    #[test]
    fn config_builder() {
        let config = TdxConfig::new("id", "secret")
            .with_api_root("http://localhost:8080")
            .with_auth_url("http://localhost:8081/token")
            .with_relays(vec!["http://relay:50232".into()])
            .with_max_concurrent(10)
            .with_timeout(60)
            .with_rate_limit(Duration::from_millis(10), 3);

        assert_eq!(config.client_id, "id");
        assert_eq!(config.api_root, "http://localhost:8080");
        assert_eq!(config.auth_url, "http://localhost:8081/token");
        assert_eq!(config.relays, vec!["http://relay:50232".to_string()]);
        assert_eq!(config.max_concurrent, 10);
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.rate_limit_backoff, Duration::from_millis(10));
        assert_eq!(config.max_rate_limit_retries, 3);
    }

    #[test]
    fn config_defaults() {
        let config = TdxConfig::new("id", "secret");

        assert_eq!(config.api_root, DEFAULT_API_ROOT);
        assert_eq!(config.auth_url, DEFAULT_AUTH_URL);
        assert!(config.relays.is_empty());
        assert_eq!(config.max_concurrent, DEFAULT_MAX_CONCURRENT);
        assert_eq!(config.rate_limit_backoff, DEFAULT_RATE_LIMIT_BACKOFF);
        assert_eq!(config.token_lifetime, DEFAULT_TOKEN_LIFETIME);
    }

    /// Fake TDX: a token endpoint issuing "token-N" and a data endpoint whose
    /// behaviour is decided by `respond(call_index, bearer)`.
    async fn fake_tdx<F>(respond: F) -> (String, Arc<AtomicUsize>, Arc<AtomicUsize>)
    where
        F: Fn(usize, &str) -> (StatusCode, &'static str) + Clone + Send + Sync + 'static,
    {
        let token_calls = Arc::new(AtomicUsize::new(0));
        let data_calls = Arc::new(AtomicUsize::new(0));

        let tc = token_calls.clone();
        let dc = data_calls.clone();
        let router = Router::new()
            .route(
                "/token",
                post(move || {
                    let tc = tc.clone();
                    async move {
                        let n = tc.fetch_add(1, Ordering::SeqCst) + 1;
                        axum::Json(serde_json::json!({ "access_token": format!("token-{n}") }))
                    }
                }),
            )
            .route(
                "/v3/Rail/TRA/TrainLiveBoard",
                get(move |headers: HeaderMap| {
                    let dc = dc.clone();
                    let respond = respond.clone();
                    async move {
                        let call = dc.fetch_add(1, Ordering::SeqCst);
                        let bearer = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default()
                            .to_string();
                        respond(call, &bearer)
                    }
                }),
            );

        let base = spawn_server(router).await;
        (base, token_calls, data_calls)
    }

    fn client_for(base: &str) -> TdxClient {
        let config = TdxConfig::new("id", "secret")
            .with_auth_url(format!("{base}/token"))
            .with_api_root(base)
            .with_rate_limit(Duration::from_millis(5), 3);
        TdxClient::new(config).unwrap()
    }

    const PATH: &str = "/v3/Rail/TRA/TrainLiveBoard";

    #[tokio::test]
    async fn sends_bearer_token() {
        let (base, _, _) = fake_tdx(|_, bearer| {
            if bearer == "Bearer token-1" {
                (StatusCode::OK, r#"{"ok":true}"#)
            } else {
                (StatusCode::UNAUTHORIZED, "")
            }
        })
        .await;

        let body = client_for(&base).get_bytes(PATH).await.unwrap();
        assert_eq!(&body[..], br#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn unauthorized_renews_token_once() {
        // Only the second token is accepted.
        let (base, token_calls, _) = fake_tdx(|_, bearer| {
            if bearer == "Bearer token-2" {
                (StatusCode::OK, "{}")
            } else {
                (StatusCode::UNAUTHORIZED, "")
            }
        })
        .await;

        let client = client_for(&base);
        assert!(client.get_bytes(PATH).await.is_ok());
        assert_eq!(token_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn repeated_unauthorized_fails() {
        let (base, token_calls, data_calls) =
            fake_tdx(|_, _| (StatusCode::UNAUTHORIZED, "")).await;

        match client_for(&base).get_bytes(PATH).await {
            Err(TdxError::Fetch { status, .. }) => assert_eq!(status, 401),
            other => panic!("expected 401 fetch error, got {other:?}"),
        }
        assert_eq!(token_calls.load(Ordering::SeqCst), 2);
        assert_eq!(data_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn rate_limit_is_retried() {
        let (base, _, data_calls) = fake_tdx(|call, _| {
            if call < 2 {
                (StatusCode::TOO_MANY_REQUESTS, "")
            } else {
                (StatusCode::OK, "{}")
            }
        })
        .await;

        assert!(client_for(&base).get_bytes(PATH).await.is_ok());
        assert_eq!(data_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rate_limit_gives_up_after_budget() {
        let (base, _, data_calls) =
            fake_tdx(|_, _| (StatusCode::TOO_MANY_REQUESTS, "")).await;

        match client_for(&base).get_bytes(PATH).await {
            Err(TdxError::RateLimited { attempts }) => assert_eq!(attempts, 4),
            other => panic!("expected rate limit error, got {other:?}"),
        }
        assert_eq!(data_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn server_error_is_surfaced() {
        let (base, _, _) =
            fake_tdx(|_, _| (StatusCode::INTERNAL_SERVER_ERROR, "boom")).await;

        match client_for(&base).get_bytes(PATH).await {
            Err(TdxError::Fetch { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected fetch error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_relay_falls_back_to_origin() {
        let (base, _, data_calls) = fake_tdx(|_, _| (StatusCode::OK, "{}")).await;

        let config = TdxConfig::new("id", "secret")
            .with_auth_url(format!("{base}/token"))
            .with_api_root(&base)
            .with_relays(vec![dead_root().await]);
        let client = TdxClient::new(config).unwrap();

        assert!(client.get_bytes(PATH).await.is_ok());
        assert_eq!(data_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn get_direct_ignores_relays() {
        let (base, _, _) = fake_tdx(|_, _| (StatusCode::OK, "{}")).await;

        let config = TdxConfig::new("id", "secret")
            .with_auth_url(format!("{base}/token"))
            .with_api_root(&base)
            .with_relays(vec![dead_root().await]);
        let client = TdxClient::new(config).unwrap();

        assert!(client.get_direct(PATH).await.is_ok());
    }

    #[tokio::test]
    async fn get_json_reports_bad_body() {
        let (base, _, _) = fake_tdx(|_, _| (StatusCode::OK, "not json")).await;

        let result: Result<serde_json::Value, _> = client_for(&base).get_json(PATH).await;
        match result {
            Err(TdxError::Json { body, .. }) => assert_eq!(body.as_deref(), Some("not json")),
            other => panic!("expected JSON error, got {other:?}"),
        }
    }
}
