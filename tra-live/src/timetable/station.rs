//! Per-station daily timetables.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use chrono::NaiveTime;

use crate::domain::{
    Direction, ParseError, StationId, TrainNo, TrainTypeId, parse_field, parse_hhmm,
};
use crate::tdx::{StationTimetableEntryDto, StationTimetableResponse};

use super::parse_train_date;

const PAYLOAD: &str = "station timetable";

/// One train calling at one station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationStop {
    pub train_no: TrainNo,
    pub train_type: TrainTypeId,
    /// Coarse train class as given by the feed.
    pub train_type_code: Option<String>,
    pub destination: StationId,
    pub arrival: NaiveTime,
    pub departure: NaiveTime,
    /// `None` when the feed gave no direction for this stop.
    pub direction: Option<Direction>,
}

impl StationStop {
    fn from_dto(dto: &StationTimetableEntryDto, direction: Option<Direction>) -> Result<Self, ParseError> {
        Ok(Self {
            train_no: parse_field(PAYLOAD, "TrainNo", &dto.train_no, TrainNo::parse)?,
            train_type: parse_field(PAYLOAD, "TrainTypeID", &dto.train_type_id, TrainTypeId::parse)?,
            train_type_code: dto.train_type_code.clone(),
            destination: parse_field(
                PAYLOAD,
                "DestinationStationID",
                &dto.destination_station_id,
                StationId::parse,
            )?,
            arrival: parse_field(PAYLOAD, "ArrivalTime", &dto.arrival_time, parse_hhmm)?,
            departure: parse_field(PAYLOAD, "DepartureTime", &dto.departure_time, parse_hhmm)?,
            direction,
        })
    }
}

/// All stops at one station on one service date.
#[derive(Debug, Clone)]
pub struct Station {
    id: StationId,
    date: NaiveDate,
    by_direction: BTreeMap<Direction, HashMap<TrainNo, StationStop>>,
    all: HashMap<TrainNo, StationStop>,
}

impl Station {
    fn new(id: StationId, date: NaiveDate) -> Self {
        Self {
            id,
            date,
            by_direction: BTreeMap::new(),
            all: HashMap::new(),
        }
    }

    fn insert(&mut self, stop: StationStop) {
        if let Some(direction) = stop.direction {
            self.by_direction
                .entry(direction)
                .or_default()
                .insert(stop.train_no.clone(), stop.clone());
        }
        self.all.insert(stop.train_no.clone(), stop);
    }

    pub fn id(&self) -> &StationId {
        &self.id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Every stop, regardless of direction.
    pub fn stops(&self) -> impl Iterator<Item = &StationStop> {
        self.all.values()
    }

    /// Stops in one direction.
    pub fn stops_in(&self, direction: Direction) -> impl Iterator<Item = &StationStop> {
        self.by_direction
            .get(&direction)
            .into_iter()
            .flat_map(|stops| stops.values())
    }

    /// Directions that have at least one stop.
    pub fn directions(&self) -> impl Iterator<Item = Direction> + '_ {
        self.by_direction.keys().copied()
    }

    pub fn stop(&self, train_no: &str) -> Option<&StationStop> {
        self.all.get(train_no)
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

/// Every station's timetable for one service date.
#[derive(Debug, Clone)]
pub struct StationTimetable {
    date: NaiveDate,
    stations: HashMap<StationId, Station>,
}

impl StationTimetable {
    /// Parse a `DailyStationTimetable` body.
    ///
    /// A station usually appears once per direction; its entries are merged.
    pub fn parse(body: &[u8]) -> Result<Self, ParseError> {
        let response: StationTimetableResponse =
            serde_json::from_slice(body).map_err(|e| ParseError::json(PAYLOAD, e))?;
        Self::from_response(&response)
    }

    pub fn from_response(response: &StationTimetableResponse) -> Result<Self, ParseError> {
        let date = parse_train_date(PAYLOAD, &response.train_date)?;
        let mut stations: HashMap<StationId, Station> = HashMap::new();

        for table in &response.station_timetables {
            let id = parse_field(PAYLOAD, "StationID", &table.station_id, StationId::parse)?;
            let direction = table
                .direction
                .map(|code| {
                    Direction::from_code(code)
                        .map_err(|_| ParseError::field(PAYLOAD, "Direction", code.to_string()))
                })
                .transpose()?;

            let station = stations
                .entry(id.clone())
                .or_insert_with(|| Station::new(id, date));
            for entry in &table.time_tables {
                station.insert(StationStop::from_dto(entry, direction)?);
            }
        }

        Ok(Self { date, stations })
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn station(&self, id: &str) -> Option<&Station> {
        self.stations.get(id)
    }

    pub fn stations(&self) -> impl Iterator<Item = &Station> {
        self.stations.values()
    }

    /// Whether `train_no` is scheduled to call at `station`.
    pub fn calls_at(&self, station: &str, train_no: &str) -> bool {
        self.station(station)
            .is_some_and(|s| s.stop(train_no).is_some())
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}
