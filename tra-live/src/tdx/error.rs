//! TDX client error types.

use std::fmt;
use std::sync::Arc;

/// Errors from the token endpoint.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    /// Token request failed at the network level
    #[error("token request failed: {0}")]
    Http(Arc<reqwest::Error>),

    /// Token endpoint answered with a non-200 status
    #[error("token endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response carried no usable `access_token`
    #[error("access token missing from token response")]
    MissingToken,
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Http(Arc::new(err))
    }
}

/// Errors from the TDX HTTP client.
///
/// Cloneable so that one failed fetch can be handed to every caller that was
/// waiting on the same cache entry.
#[derive(Debug, Clone)]
pub enum TdxError {
    /// Request failed at the network level (connect, timeout, body read)
    Http(Arc<reqwest::Error>),

    /// Could not obtain a bearer token
    Auth(AuthError),

    /// Upstream answered with an unexpected status
    Fetch { status: u16, body: String },

    /// Still rate limited after the configured number of retries
    RateLimited { attempts: u32 },

    /// JSON deserialization failed
    Json {
        message: String,
        body: Option<String>,
    },
}

impl TdxError {
    /// Whether the failure happened below HTTP (no status was received).
    pub fn is_network(&self) -> bool {
        matches!(self, TdxError::Http(_))
    }
}

impl fmt::Display for TdxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TdxError::Http(e) => write!(f, "HTTP error: {e}"),
            TdxError::Auth(e) => write!(f, "authentication failed: {e}"),
            TdxError::Fetch { status, body } => write!(f, "API error {status}: {body}"),
            TdxError::RateLimited { attempts } => {
                write!(f, "rate limited by TDX API after {attempts} attempts")
            }
            TdxError::Json { message, body } => {
                write!(f, "JSON parse error: {message}")?;
                if let Some(body) = body {
                    write!(f, " (body: {body})")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for TdxError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TdxError::Http(e) => Some(e.as_ref()),
            TdxError::Auth(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TdxError {
    fn from(err: reqwest::Error) -> Self {
        TdxError::Http(Arc::new(err))
    }
}

impl From<AuthError> for TdxError {
    fn from(err: AuthError) -> Self {
        TdxError::Auth(err)
    }
}
