//! Shared state for the relay server.

use std::sync::Arc;

use crate::cache::CachedTdxClient;
use crate::tdx::TdxClient;

/// State shared by every relay handler.
pub struct RelayState<U = TdxClient> {
    /// Cached upstream; the same instance the provider refreshes through
    pub cache: Arc<CachedTdxClient<U>>,

    /// API root that uncacheable requests are redirected to
    pub origin: Arc<str>,
}

impl<U> RelayState<U> {
    pub fn new(cache: Arc<CachedTdxClient<U>>, origin: &str) -> Self {
        Self {
            cache,
            origin: Arc::from(origin.trim_end_matches('/')),
        }
    }
}

impl<U> Clone for RelayState<U> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            origin: Arc::clone(&self.origin),
        }
    }
}
