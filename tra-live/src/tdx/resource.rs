//! Upstream resources and their canonical requests.
//!
//! Each resource is one TDX endpoint. The canonical query is the exact
//! parameter set this crate asks for; only requests carrying that set are
//! eligible for caching. In particular the live board select includes
//! `UpdateTime`, so clients asking for the narrower
//! `TrainNo,TrainTypeID,StationId,DelayTime` are redirected to the origin
//! rather than served from cache.

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;

/// Path prefix shared by all Taiwan Railway endpoints.
pub const TRA_PREFIX: &str = "/v3/Rail/TRA";

const STATION_SELECT: &str = "StationID,StationName,StationClass";
const STATION_TIMETABLE_SELECT: &str = "StationID,Direction,TimeTables";
const LIVE_BOARD_SELECT: &str = "TrainNo,TrainTypeID,StationID,DelayTime,UpdateTime";

/// Which day's timetable to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrainDate {
    /// The upstream's notion of today.
    Today,
    /// An explicit date.
    On(NaiveDate),
}

/// A cacheable TDX endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    StationMap,
    StationTimetable(TrainDate),
    TrainTimetable(TrainDate),
    LiveBoard,
    TrainTypes,
}

impl Resource {
    /// Request path, without query.
    pub fn path(&self) -> String {
        match self {
            Resource::StationMap => format!("{TRA_PREFIX}/Station"),
            Resource::StationTimetable(TrainDate::Today) => {
                format!("{TRA_PREFIX}/DailyStationTimetable/Today")
            }
            Resource::StationTimetable(TrainDate::On(date)) => {
                format!("{TRA_PREFIX}/DailyStationTimetable/TrainDate/{date}")
            }
            Resource::TrainTimetable(TrainDate::Today) => {
                format!("{TRA_PREFIX}/DailyTrainTimetable/Today")
            }
            Resource::TrainTimetable(TrainDate::On(date)) => {
                format!("{TRA_PREFIX}/DailyTrainTimetable/TrainDate/{date}")
            }
            Resource::LiveBoard => format!("{TRA_PREFIX}/TrainLiveBoard"),
            Resource::TrainTypes => format!("{TRA_PREFIX}/TrainType"),
        }
    }

    /// The `$select` value this crate requests, if the endpoint takes one.
    pub fn canonical_select(&self) -> Option<&'static str> {
        match self {
            Resource::StationMap => Some(STATION_SELECT),
            Resource::StationTimetable(_) => Some(STATION_TIMETABLE_SELECT),
            Resource::LiveBoard => Some(LIVE_BOARD_SELECT),
            Resource::TrainTimetable(_) | Resource::TrainTypes => None,
        }
    }

    /// Path plus canonical query, ready to append to an API root.
    ///
    /// ```
    /// use tra_live::tdx::Resource;
    ///
    /// assert_eq!(
    ///     Resource::StationMap.path_and_query(),
    ///     "/v3/Rail/TRA/Station?$select=StationID,StationName,StationClass"
    /// );
    /// ```
    pub fn path_and_query(&self) -> String {
        match self.canonical_select() {
            Some(select) => format!("{}?$select={}", self.path(), select),
            None => self.path(),
        }
    }

    /// Whether a request's query parameters are exactly the canonical set.
    pub fn matches_query(&self, params: &HashMap<String, String>) -> bool {
        match self.canonical_select() {
            Some(select) => {
                params.len() == 1 && params.get("$select").map(String::as_str) == Some(select)
            }
            None => params.is_empty(),
        }
    }

    /// Short name for logs and error reports.
    pub fn name(&self) -> &'static str {
        match self {
            Resource::StationMap => "station map",
            Resource::StationTimetable(_) => "station timetable",
            Resource::TrainTimetable(_) => "train timetable",
            Resource::LiveBoard => "live board",
            Resource::TrainTypes => "train types",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::StationTimetable(TrainDate::On(date))
            | Resource::TrainTimetable(TrainDate::On(date)) => {
                write!(f, "{} ({date})", self.name())
            }
            _ => f.write_str(self.name()),
        }
    }
}
