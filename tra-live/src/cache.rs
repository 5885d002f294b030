//! Caching layer for TDX responses.
//!
//! Timetables and the station map change once a day, so they are kept until
//! the next local midnight. The live board is kept for a short fixed window
//! matching the live refresh cadence. Entries hold the upstream body
//! unmodified so the relay can serve them verbatim.

use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::{Local, NaiveDate, NaiveDateTime};
use moka::Expiry;
use moka::future::Cache as MokaCache;
use tracing::debug;

use crate::domain::next_midnight;
use crate::tdx::{Resource, TdxClient, TdxError, TrainDate, Upstream};

/// How long a cached resource stays valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryPolicy {
    /// Kept until evicted for capacity.
    Never,
    /// Valid until the next local 00:00 after the fetch.
    NextMidnight,
    /// Valid for a fixed window after the fetch.
    After(Duration),
}

/// Configuration for the cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for live board entries.
    pub live_ttl: Duration,

    /// Maximum number of cached entries.
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            live_ttl: Duration::from_secs(20),
            max_capacity: 64,
        }
    }
}

/// One cached upstream body.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    body: Bytes,
    fetched_at: NaiveDateTime,
    expires_at: Option<NaiveDateTime>,
}

impl CacheEntry {
    /// Build an entry fetched at `fetched_at` under `policy`.
    pub fn new(body: Bytes, fetched_at: NaiveDateTime, policy: ExpiryPolicy) -> Self {
        let expires_at = match policy {
            ExpiryPolicy::Never => None,
            ExpiryPolicy::NextMidnight => Some(next_midnight(fetched_at)),
            ExpiryPolicy::After(ttl) => chrono::Duration::from_std(ttl)
                .ok()
                .and_then(|ttl| fetched_at.checked_add_signed(ttl)),
        };
        Self {
            body,
            fetched_at,
            expires_at,
        }
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn fetched_at(&self) -> NaiveDateTime {
        self.fetched_at
    }

    /// `None` means the entry never expires.
    pub fn expires_at(&self) -> Option<NaiveDateTime> {
        self.expires_at
    }

    /// Remaining lifetime as seen from the fetch instant.
    fn time_to_live(&self) -> Option<Duration> {
        let expires_at = self.expires_at?;
        // An expiry in the past maps to zero: evict immediately.
        Some((expires_at - self.fetched_at).to_std().unwrap_or(Duration::ZERO))
    }
}

/// Per-entry expiry for moka, read off the entry itself.
struct EntryExpiry;

impl Expiry<Resource, CacheEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &Resource,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.time_to_live()
    }

    /// A replaced entry gets the lifetime of its new value.
    fn expire_after_update(
        &self,
        _key: &Resource,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.time_to_live()
    }
}

/// Cache of upstream bodies keyed by resource.
pub struct EndpointCache {
    entries: MokaCache<Resource, CacheEntry>,
    live_ttl: Duration,
}

impl EndpointCache {
    /// Create a new cache with the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        let entries = MokaCache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(EntryExpiry)
            .build();

        Self {
            entries,
            live_ttl: config.live_ttl,
        }
    }

    /// Expiry policy for a resource requested on `today`, or `None` if the
    /// resource must not be cached at all.
    ///
    /// Dated timetables are only cached for tomorrow's date.
    pub fn policy(&self, resource: &Resource, today: NaiveDate) -> Option<ExpiryPolicy> {
        match resource {
            Resource::LiveBoard => Some(ExpiryPolicy::After(self.live_ttl)),
            Resource::StationMap
            | Resource::TrainTypes
            | Resource::StationTimetable(TrainDate::Today)
            | Resource::TrainTimetable(TrainDate::Today) => Some(ExpiryPolicy::NextMidnight),
            Resource::StationTimetable(TrainDate::On(date))
            | Resource::TrainTimetable(TrainDate::On(date)) => {
                (today.succ_opt() == Some(*date)).then_some(ExpiryPolicy::NextMidnight)
            }
        }
    }

    /// Return the cached entry for `resource`, fetching it on a miss.
    ///
    /// Concurrent misses for the same resource share one call to `fetch`.
    /// Failed fetches are not cached. Uncacheable resources always call
    /// `fetch` and are returned without being stored.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        resource: &Resource,
        now: NaiveDateTime,
        fetch: F,
    ) -> Result<CacheEntry, TdxError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Bytes, TdxError>>,
    {
        let Some(policy) = self.policy(resource, now.date()) else {
            debug!(%resource, "uncacheable, fetching directly");
            let body = fetch().await?;
            return Ok(CacheEntry::new(body, now, ExpiryPolicy::After(Duration::ZERO)));
        };

        let entry = self
            .entries
            .entry(*resource)
            .or_try_insert_with(async move {
                let body = fetch().await?;
                Ok::<_, TdxError>(CacheEntry::new(body, now, policy))
            })
            .await
            .map_err(|e| (*e).clone())?;

        if entry.is_fresh() {
            debug!(%resource, "cache miss");
        } else {
            debug!(%resource, "cache hit");
        }
        Ok(entry.into_value())
    }

    /// Get a cached entry without fetching.
    pub async fn peek(&self, resource: &Resource) -> Option<CacheEntry> {
        self.entries.get(resource).await
    }

    /// Store a freshly fetched body, replacing any cached entry.
    ///
    /// Uncacheable resources are returned without being stored.
    pub async fn store(&self, resource: &Resource, body: Bytes, now: NaiveDateTime) -> CacheEntry {
        let Some(policy) = self.policy(resource, now.date()) else {
            return CacheEntry::new(body, now, ExpiryPolicy::After(Duration::ZERO));
        };
        let entry = CacheEntry::new(body, now, policy);
        self.entries.insert(*resource, entry.clone()).await;
        debug!(%resource, "cache replaced");
        entry
    }
}

/// TDX client with caching.
///
/// Wraps an [`Upstream`] and caches its bodies per resource.
pub struct CachedTdxClient<U = TdxClient> {
    upstream: U,
    cache: EndpointCache,
}

impl<U: Upstream> CachedTdxClient<U> {
    /// Create a new cached client.
    pub fn new(upstream: U, cache_config: &CacheConfig) -> Self {
        Self {
            upstream,
            cache: EndpointCache::new(cache_config),
        }
    }

    /// Get a resource, using the cache if a valid entry exists.
    pub async fn get(&self, resource: &Resource) -> Result<CacheEntry, TdxError> {
        let now = Local::now().naive_local();
        self.cache
            .get_or_fetch(resource, now, || self.upstream.fetch(resource))
            .await
    }

    /// Fetch a resource from upstream even if a valid entry exists, and
    /// cache the result for later readers.
    pub async fn refetch(&self, resource: &Resource) -> Result<CacheEntry, TdxError> {
        let body = self.upstream.fetch(resource).await?;
        let now = Local::now().naive_local();
        Ok(self.cache.store(resource, body, now).await)
    }

    /// Access the underlying upstream for operations that bypass cache.
    pub fn upstream(&self) -> &U {
        &self.upstream
    }

    /// Access the cache itself.
    pub fn cache(&self) -> &EndpointCache {
        &self.cache
    }
}

impl<U: Upstream> Upstream for CachedTdxClient<U> {
    async fn fetch(&self, resource: &Resource) -> Result<Bytes, TdxError> {
        Ok(self.get(resource).await?.body().clone())
    }

    async fn refresh(&self, resource: &Resource) -> Result<Bytes, TdxError> {
        Ok(self.refetch(resource).await?.body().clone())
    }
}
