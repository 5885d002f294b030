//! Refresh orchestration and the query surface.
//!
//! The provider owns the latest snapshot of every data set, refreshes them on
//! demand, and re-derives the live departure boards after each refresh.
//! Data sets are independent: one failing to refresh keeps its previous
//! snapshot and does not stop the others from being published.

use std::fmt;
use std::sync::Arc;

use chrono::{Local, NaiveDate, NaiveDateTime};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::catalog::{StationDirectory, StationInfo, TrainType, TrainTypeCatalog};
use crate::domain::{Direction, ParseError, StationId};
use crate::live::{LiveBoard, LiveStop, StationLive, StationLiveTable};
use crate::tdx::{Resource, TdxError, TrainDate, Upstream};
use crate::timetable::{StationTimetable, Train, TrainTimetable};

/// A value replaced wholesale by each refresh.
///
/// The new value is built outside the lock and swapped in with one write,
/// so readers see either the old or the new snapshot.
#[derive(Debug)]
pub struct Snapshot<T> {
    inner: RwLock<Option<Arc<T>>>,
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }
}

impl<T> Snapshot<T> {
    /// The current value, if one was ever published.
    pub async fn load(&self) -> Option<Arc<T>> {
        self.inner.read().await.clone()
    }

    /// Replace the current value.
    pub async fn publish(&self, value: T) {
        let value = Arc::new(value);
        *self.inner.write().await = Some(value);
    }
}

/// The data sets kept by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    StationTimetable,
    StationTimetableTomorrow,
    TrainTimetable,
    TrainTimetableTomorrow,
    LiveBoard,
    StationDirectory,
    TrainTypes,
}

impl Dataset {
    /// Whether the service cannot answer queries without this data set.
    pub fn is_required(self) -> bool {
        matches!(
            self,
            Dataset::StationTimetable
                | Dataset::TrainTimetable
                | Dataset::LiveBoard
                | Dataset::StationDirectory
        )
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Dataset::StationTimetable => "station timetable",
            Dataset::StationTimetableTomorrow => "tomorrow's station timetable",
            Dataset::TrainTimetable => "train timetable",
            Dataset::TrainTimetableTomorrow => "tomorrow's train timetable",
            Dataset::LiveBoard => "live board",
            Dataset::StationDirectory => "station directory",
            Dataset::TrainTypes => "train types",
        })
    }
}

/// Why one data set failed to refresh.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DatasetError {
    #[error(transparent)]
    Fetch(#[from] TdxError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// One data set that failed during a refresh.
#[derive(Debug, Clone)]
pub struct DatasetFailure {
    pub dataset: Dataset,
    pub error: DatasetError,
}

/// Failures of one refresh cycle.
#[derive(Debug, Clone)]
pub struct RefreshError {
    pub failures: Vec<DatasetFailure>,
}

impl RefreshError {
    /// Whether `dataset` is among the failures.
    pub fn failed(&self, dataset: Dataset) -> bool {
        self.failures.iter().any(|f| f.dataset == dataset)
    }
}

impl fmt::Display for RefreshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "refresh failed for ")?;
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", failure.dataset, failure.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for RefreshError {}

/// Errors from the query surface.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// No successful fetch of this data set yet
    #[error("{0} not loaded yet")]
    NotInitialized(Dataset),

    #[error("unknown station: {0}")]
    UnknownStation(String),

    #[error("unknown train: {0}")]
    UnknownTrain(String),

    #[error("unknown destination: {0}")]
    UnknownDestination(String),

    #[error("unknown train type: {0}")]
    UnknownTrainType(String),

    /// The train is not on this station's live board
    #[error("train {train} does not call at {station}")]
    NotServed { station: String, train: String },
}

type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// Keeps every data set fresh and answers queries against the latest
/// snapshots.
pub struct ResourceProvider<U> {
    upstream: U,
    clock: Clock,
    station_today: Snapshot<StationTimetable>,
    station_tomorrow: Snapshot<StationTimetable>,
    train_today: Snapshot<TrainTimetable>,
    train_tomorrow: Snapshot<TrainTimetable>,
    live: Snapshot<LiveBoard>,
    directory: Snapshot<StationDirectory>,
    train_types: Snapshot<TrainTypeCatalog>,
    live_table: Snapshot<StationLiveTable>,
    derive_lock: Mutex<()>,
}

impl<U: Upstream> ResourceProvider<U> {
    pub fn new(upstream: U) -> Self {
        Self {
            upstream,
            clock: Arc::new(|| Local::now().naive_local()),
            station_today: Snapshot::default(),
            station_tomorrow: Snapshot::default(),
            train_today: Snapshot::default(),
            train_tomorrow: Snapshot::default(),
            live: Snapshot::default(),
            directory: Snapshot::default(),
            train_types: Snapshot::default(),
            live_table: Snapshot::default(),
            derive_lock: Mutex::new(()),
        }
    }

    /// Use a custom clock (for testing).
    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDateTime + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }

    /// Load everything for first use.
    ///
    /// Fails only if a required data set is still unavailable afterwards.
    /// Failures of optional data sets are logged.
    pub async fn fetch_init(&self) -> Result<(), RefreshError> {
        let (mut failures, live_failures) =
            futures::future::join(self.refresh_daily(), self.refresh_live()).await;
        failures.extend(live_failures);
        self.rederive().await;

        for failure in &failures {
            warn!(dataset = %failure.dataset, error = %failure.error, "initial fetch failed");
        }

        if failures.iter().any(|f| f.dataset.is_required()) {
            return Err(RefreshError { failures });
        }
        info!("initial fetch complete");
        Ok(())
    }

    /// Refetch the timetables (today and tomorrow) and reference data.
    pub async fn fetch_daily(&self) -> Result<(), RefreshError> {
        let failures = self.refresh_daily().await;
        self.rederive().await;
        Self::report("daily", failures)
    }

    /// Refetch the live board from upstream, never from a cache.
    pub async fn fetch_live(&self) -> Result<(), RefreshError> {
        let failures = self.refresh_live().await;
        self.rederive().await;
        Self::report("live", failures)
    }

    fn report(cycle: &'static str, failures: Vec<DatasetFailure>) -> Result<(), RefreshError> {
        if failures.is_empty() {
            return Ok(());
        }
        for failure in &failures {
            warn!(cycle, dataset = %failure.dataset, error = %failure.error, "refresh failed, keeping previous data");
        }
        Err(RefreshError { failures })
    }

    async fn load<T>(
        &self,
        resource: Resource,
        parse: fn(&[u8]) -> Result<T, ParseError>,
    ) -> Result<T, DatasetError> {
        let body = self.upstream.fetch(&resource).await?;
        Ok(parse(&body)?)
    }

    async fn refresh_daily(&self) -> Vec<DatasetFailure> {
        let today = self.now().date();
        let tomorrow = TrainDate::On(today.succ_opt().unwrap_or(NaiveDate::MAX));

        let (station_today, station_tomorrow, train_today, train_tomorrow, directory, train_types) = tokio::join!(
            self.load(Resource::StationTimetable(TrainDate::Today), StationTimetable::parse),
            self.load(Resource::StationTimetable(tomorrow), StationTimetable::parse),
            self.load(Resource::TrainTimetable(TrainDate::Today), TrainTimetable::parse),
            self.load(Resource::TrainTimetable(tomorrow), TrainTimetable::parse),
            self.load(Resource::StationMap, StationDirectory::parse),
            self.load(Resource::TrainTypes, TrainTypeCatalog::parse),
        );

        let mut failures = Vec::new();
        settle(&self.station_today, Dataset::StationTimetable, station_today, &mut failures).await;
        settle(&self.station_tomorrow, Dataset::StationTimetableTomorrow, station_tomorrow, &mut failures).await;
        settle(&self.train_today, Dataset::TrainTimetable, train_today, &mut failures).await;
        settle(&self.train_tomorrow, Dataset::TrainTimetableTomorrow, train_tomorrow, &mut failures).await;
        settle(&self.directory, Dataset::StationDirectory, directory, &mut failures).await;
        settle(&self.train_types, Dataset::TrainTypes, train_types, &mut failures).await;
        failures
    }

    async fn refresh_live(&self) -> Vec<DatasetFailure> {
        let live = async {
            let body = self.upstream.refresh(&Resource::LiveBoard).await?;
            Ok::<_, DatasetError>(LiveBoard::parse(&body)?)
        }
        .await;
        let mut failures = Vec::new();
        settle(&self.live, Dataset::LiveBoard, live, &mut failures).await;
        failures
    }

    async fn rederive(&self) {
        if let Err(e) = self.derive().await {
            warn!(error = %e, "skipping live board derivation");
        }
    }

    /// Rebuild the live departure boards from the latest snapshots.
    ///
    /// Returns the number of stations derived.
    pub async fn derive(&self) -> Result<usize, QueryError> {
        let _guard = self.derive_lock.lock().await;

        let today = self
            .station_today
            .load()
            .await
            .ok_or(QueryError::NotInitialized(Dataset::StationTimetable))?;
        let live = self
            .live
            .load()
            .await
            .ok_or(QueryError::NotInitialized(Dataset::LiveBoard))?;
        let tomorrow = self.station_tomorrow.load().await;

        let table = StationLiveTable::derive(&today, tomorrow.as_deref(), &live, self.now());
        let count = table.len();
        self.live_table.publish(table).await;
        info!(stations = count, trains = live.len(), "derived live departures");
        Ok(count)
    }

    async fn require<T>(snapshot: &Snapshot<T>, dataset: Dataset) -> Result<Arc<T>, QueryError> {
        snapshot
            .load()
            .await
            .ok_or(QueryError::NotInitialized(dataset))
    }

    /// Find a station by id or name.
    pub async fn resolve_station(&self, query: &str) -> Result<StationInfo, QueryError> {
        let directory = Self::require(&self.directory, Dataset::StationDirectory).await?;
        directory
            .resolve(query)
            .cloned()
            .ok_or_else(|| QueryError::UnknownStation(query.to_string()))
    }

    /// The live departure board of a station, looked up by id or name.
    pub async fn station_view(&self, query: &str) -> Result<StationView, QueryError> {
        let station = self.resolve_station(query).await?;
        let live_table = Self::require(&self.live_table, Dataset::LiveBoard).await?;
        let trains_today = Self::require(&self.train_today, Dataset::TrainTimetable).await?;
        let directory = Self::require(&self.directory, Dataset::StationDirectory).await?;

        let live = live_table
            .station(station.id.as_str())
            .cloned()
            .unwrap_or_else(|| Arc::new(StationLive::empty(station.id.clone())));

        Ok(StationView {
            station,
            live,
            trains_today,
            trains_tomorrow: self.train_tomorrow.load().await,
            directory,
        })
    }

    /// A train's static timetable, from today's or else tomorrow's table.
    pub async fn train(&self, train_no: &str) -> Result<Train, QueryError> {
        let today = Self::require(&self.train_today, Dataset::TrainTimetable).await?;
        if let Some(train) = today.train(train_no) {
            return Ok(train.clone());
        }
        self.train_tomorrow
            .load()
            .await
            .and_then(|t| t.train(train_no).cloned())
            .ok_or_else(|| QueryError::UnknownTrain(train_no.to_string()))
    }

    /// One train's live stop at one station.
    pub async fn stop(&self, station: &str, train_no: &str) -> Result<LiveStop, QueryError> {
        let view = self.station_view(station).await?;
        view.live
            .get(train_no)
            .cloned()
            .ok_or_else(|| QueryError::NotServed {
                station: view.station.id.to_string(),
                train: train_no.to_string(),
            })
    }

    pub async fn train_type(&self, id: &str) -> Result<TrainType, QueryError> {
        let catalog = Self::require(&self.train_types, Dataset::TrainTypes).await?;
        catalog
            .get(id)
            .cloned()
            .ok_or_else(|| QueryError::UnknownTrainType(id.to_string()))
    }

    /// The latest live board, for its timestamps.
    pub async fn live_board(&self) -> Result<Arc<LiveBoard>, QueryError> {
        Self::require(&self.live, Dataset::LiveBoard).await
    }

    pub async fn station_directory(&self) -> Result<Arc<StationDirectory>, QueryError> {
        Self::require(&self.directory, Dataset::StationDirectory).await
    }
}

/// Store a successfully loaded data set, or record why it failed.
async fn settle<T>(
    snapshot: &Snapshot<T>,
    dataset: Dataset,
    result: Result<T, DatasetError>,
    failures: &mut Vec<DatasetFailure>,
) {
    match result {
        Ok(value) => snapshot.publish(value).await,
        Err(error) => failures.push(DatasetFailure { dataset, error }),
    }
}

/// The live board of one station, with what is needed to filter it.
#[derive(Debug, Clone)]
pub struct StationView {
    station: StationInfo,
    live: Arc<StationLive>,
    trains_today: Arc<TrainTimetable>,
    trains_tomorrow: Option<Arc<TrainTimetable>>,
    directory: Arc<StationDirectory>,
}

impl StationView {
    pub fn station(&self) -> &StationInfo {
        &self.station
    }

    pub fn id(&self) -> &StationId {
        &self.station.id
    }

    /// Upcoming departures, optionally in one direction.
    pub fn departures(&self, direction: Option<Direction>) -> Vec<&LiveStop> {
        self.live.departures(direction)
    }

    /// Upcoming departures that reach `destination` (id or name) later on
    /// their route.
    pub fn filter_by_destination(
        &self,
        destination: &str,
        direction: Option<Direction>,
    ) -> Result<Vec<&LiveStop>, QueryError> {
        let destination = self
            .directory
            .resolve(destination)
            .ok_or_else(|| QueryError::UnknownDestination(destination.to_string()))?;

        Ok(self.live.filter_by_destination(
            destination.id.as_str(),
            direction,
            &self.trains_today,
            self.trains_tomorrow.as_deref(),
        ))
    }

    pub fn get(&self, train_no: &str) -> Option<&LiveStop> {
        self.live.get(train_no)
    }

    pub fn directions(&self) -> impl Iterator<Item = Direction> + '_ {
        self.live.directions()
    }
}
