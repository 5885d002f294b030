//! TDX API response DTOs.
//!
//! These types map directly to the TDX JSON responses. Fields the rest of the
//! crate relies on are non-optional, so a payload missing them fails to
//! deserialize instead of surfacing later as a lookup miss. Fields the feed
//! legitimately omits or nulls are `Option`.

use serde::Deserialize;

/// Bilingual name as used throughout TDX.
#[derive(Debug, Clone, Deserialize)]
pub struct NameDto {
    /// Traditional Chinese name.
    #[serde(rename = "Zh_tw")]
    pub zh_tw: String,

    /// English name.
    #[serde(rename = "En")]
    pub en: Option<String>,
}

/// Response from `/Station`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StationMapResponse {
    pub stations: Vec<StationDto>,
}

/// One station of the station map.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StationDto {
    #[serde(rename = "StationID")]
    pub station_id: String,

    pub station_name: NameDto,

    /// Station grade ("0" special class through "4"; "5" unstaffed).
    pub station_class: Option<String>,
}

/// Response from `/DailyStationTimetable/...`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StationTimetableResponse {
    /// Service date of the timetable (YYYY-MM-DD).
    pub train_date: String,

    pub station_timetables: Vec<StationTimetableDto>,
}

/// All trains calling at one station in one direction.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StationTimetableDto {
    #[serde(rename = "StationID")]
    pub station_id: String,

    /// 0 = clockwise, 1 = counterclockwise. Absent on some feeds.
    pub direction: Option<i64>,

    pub time_tables: Vec<StationTimetableEntryDto>,
}

/// One train calling at the station.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StationTimetableEntryDto {
    pub train_no: String,

    #[serde(rename = "DestinationStationID")]
    pub destination_station_id: String,

    #[serde(rename = "TrainTypeID")]
    pub train_type_id: String,

    /// Coarse train class ("1" Taroko ... "6" local).
    pub train_type_code: Option<String>,

    /// Scheduled arrival, "HH:MM".
    pub arrival_time: String,

    /// Scheduled departure, "HH:MM".
    pub departure_time: String,
}

/// Response from `/DailyTrainTimetable/...`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrainTimetableResponse {
    /// Service date of the timetable (YYYY-MM-DD).
    pub train_date: String,

    pub train_timetables: Vec<TrainTimetableDto>,
}

/// One train with its full route.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrainTimetableDto {
    pub train_info: TrainInfoDto,
    pub stop_times: Vec<StopTimeDto>,
}

/// Static information about a train.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrainInfoDto {
    pub train_no: String,

    pub direction: i64,

    #[serde(rename = "TrainTypeID")]
    pub train_type_id: String,

    pub train_type_code: Option<String>,

    #[serde(rename = "StartingStationID")]
    pub starting_station_id: String,

    #[serde(rename = "EndingStationID")]
    pub ending_station_id: String,

    /// 0 = not via a mountain/coast line, 1 = mountain line, 2 = coast line.
    pub trip_line: i64,

    /// 1 if the train is suspended for the day.
    pub suspended_flag: i64,

    /// Station after which the train runs past midnight.
    #[serde(rename = "OverNightStationID")]
    pub over_night_station_id: Option<String>,
}

/// One stop on a train's route.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StopTimeDto {
    pub stop_sequence: u32,

    #[serde(rename = "StationID")]
    pub station_id: String,

    pub arrival_time: String,

    pub departure_time: String,
}

/// Response from `/TrainLiveBoard`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LiveBoardResponse {
    /// When TDX produced this response (RFC 3339).
    pub update_time: String,

    /// When the railway's source system last updated (RFC 3339).
    pub src_update_time: Option<String>,

    pub train_live_boards: Vec<LiveBoardDto>,
}

/// Last known position of one running train.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LiveBoardDto {
    pub train_no: String,

    #[serde(rename = "TrainTypeID")]
    pub train_type_id: Option<String>,

    #[serde(rename = "StationID", alias = "StationId")]
    pub station_id: String,

    /// Minutes late; null when not yet reported.
    pub delay_time: Option<i64>,

    /// When this train's position was reported (RFC 3339).
    pub update_time: Option<String>,
}

/// Response from `/TrainType`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrainTypeResponse {
    pub train_types: Vec<TrainTypeDto>,
}

/// One train type.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrainTypeDto {
    #[serde(rename = "TrainTypeID")]
    pub train_type_id: String,

    pub train_type_code: String,

    pub train_type_name: NameDto,
}
