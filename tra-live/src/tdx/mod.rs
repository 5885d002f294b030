//! TDX (Transport Data eXchange) client.
//!
//! TDX publishes Taiwan Railway timetables and the live board over an
//! authenticated JSON API.
//!
//! Key characteristics of TDX:
//! - Every request needs a bearer token from a client-credentials grant
//! - Rate limiting is reported as 429 with no retry hint
//! - Times are "HH:MM" strings in Taiwan local time, without a date

mod auth;
mod client;
mod error;
mod resource;
mod types;

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;

pub use auth::{DEFAULT_AUTH_URL, DEFAULT_TOKEN_LIFETIME, TokenManager};
pub use client::{DEFAULT_API_ROOT, TdxClient, TdxConfig};
pub use error::{AuthError, TdxError};
pub use resource::{Resource, TRA_PREFIX, TrainDate};
pub use types::{
    LiveBoardDto, LiveBoardResponse, NameDto, StationDto, StationMapResponse,
    StationTimetableDto, StationTimetableEntryDto, StationTimetableResponse, StopTimeDto,
    TrainInfoDto, TrainTimetableDto, TrainTimetableResponse, TrainTypeDto, TrainTypeResponse,
};

/// Source of raw upstream bodies.
///
/// This abstraction allows the cache and the refresh orchestrator to be
/// tested without a network.
pub trait Upstream: Send + Sync {
    /// Fetch the body of a resource.
    fn fetch(&self, resource: &Resource) -> impl Future<Output = Result<Bytes, TdxError>> + Send;

    /// Fetch the current body, never answering from a cache.
    fn refresh(&self, resource: &Resource) -> impl Future<Output = Result<Bytes, TdxError>> + Send {
        self.fetch(resource)
    }
}

impl<U: Upstream> Upstream for Arc<U> {
    fn fetch(&self, resource: &Resource) -> impl Future<Output = Result<Bytes, TdxError>> + Send {
        (**self).fetch(resource)
    }

    fn refresh(&self, resource: &Resource) -> impl Future<Output = Result<Bytes, TdxError>> + Send {
        (**self).refresh(resource)
    }
}

impl Upstream for TdxClient {
    async fn fetch(&self, resource: &Resource) -> Result<Bytes, TdxError> {
        self.get_bytes(&resource.path_and_query()).await
    }
}
