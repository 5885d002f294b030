//! Process configuration, read from the environment.

use std::time::Duration;

use crate::cache::CacheConfig;
use crate::tdx::{DEFAULT_API_ROOT, DEFAULT_AUTH_URL, TdxConfig};

/// Default port of the relay server.
pub const DEFAULT_RELAY_PORT: u16 = 50232;

/// Default live board refresh interval.
pub const DEFAULT_LIVE_INTERVAL: Duration = Duration::from_secs(20);

/// Errors reading configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("invalid {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Everything the binary needs to start.
#[derive(Debug, Clone)]
pub struct Config {
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub api_root: String,
    /// Relays tried before the origin, in no particular order
    pub relays: Vec<String>,
    pub relay_port: u16,
    pub live_interval: Duration,
}

impl Config {
    /// Read from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read through `lookup`, which returns a variable's value if set.
    ///
    /// Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |name: &'static str| var(name).ok_or(ConfigError::Missing(name));

        let relay_port = match var("TDX_RELAY_PORT") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: "TDX_RELAY_PORT",
                value,
            })?,
            None => DEFAULT_RELAY_PORT,
        };

        let live_interval = match var("TDX_LIVE_INTERVAL_SECS") {
            Some(value) => match value.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "TDX_LIVE_INTERVAL_SECS",
                        value,
                    });
                }
            },
            None => DEFAULT_LIVE_INTERVAL,
        };

        let relays = var("TDX_API_RELAYS")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            client_id: required("TDX_CLIENT_ID")?,
            client_secret: required("TDX_CLIENT_SECRET")?,
            auth_url: var("TDX_AUTH_ROOT").unwrap_or_else(|| DEFAULT_AUTH_URL.to_string()),
            api_root: var("TDX_API_ROOT").unwrap_or_else(|| DEFAULT_API_ROOT.to_string()),
            relays,
            relay_port,
            live_interval,
        })
    }

    /// Client configuration for the TDX API.
    pub fn tdx(&self) -> TdxConfig {
        TdxConfig::new(&self.client_id, &self.client_secret)
            .with_auth_url(&self.auth_url)
            .with_api_root(&self.api_root)
            .with_relays(self.relays.clone())
    }

    /// Cache configuration, with the live board expiring on the refresh
    /// interval.
    pub fn cache(&self) -> CacheConfig {
        CacheConfig {
            live_ttl: self.live_interval,
            ..CacheConfig::default()
        }
    }
}
