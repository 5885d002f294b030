//! Per-train daily timetables with full routes.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};

use crate::domain::{
    Direction, ParseError, StationId, TrainNo, TrainTypeId, parse_field, parse_hhmm,
};
use crate::tdx::{StopTimeDto, TrainTimetableDto, TrainTimetableResponse};

use super::parse_train_date;

const PAYLOAD: &str = "train timetable";

/// One stop on a train's route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteStop {
    pub sequence: u32,
    pub station: StationId,
    pub arrival: NaiveTime,
    pub departure: NaiveTime,
}

impl RouteStop {
    fn from_dto(dto: &StopTimeDto) -> Result<Self, ParseError> {
        Ok(Self {
            sequence: dto.stop_sequence,
            station: parse_field(PAYLOAD, "StationID", &dto.station_id, StationId::parse)?,
            arrival: parse_field(PAYLOAD, "ArrivalTime", &dto.arrival_time, parse_hhmm)?,
            departure: parse_field(PAYLOAD, "DepartureTime", &dto.departure_time, parse_hhmm)?,
        })
    }
}

/// A train and its route for one service date.
///
/// The route is ordered by stop sequence, and sequence numbers strictly
/// increase along it. A station may appear more than once on loop routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Train {
    pub train_no: TrainNo,
    pub direction: Direction,
    pub train_type: TrainTypeId,
    pub train_type_code: Option<String>,
    pub origin: StationId,
    pub destination: StationId,
    /// 0 = neither, 1 = mountain line, 2 = coast line.
    pub trip_line: i64,
    pub suspended: bool,
    /// Station after which the train crosses midnight.
    pub overnight_station: Option<StationId>,
    route: Vec<RouteStop>,
}

impl Train {
    fn from_dto(dto: &TrainTimetableDto) -> Result<Self, ParseError> {
        let info = &dto.train_info;
        let train_no = parse_field(PAYLOAD, "TrainNo", &info.train_no, TrainNo::parse)?;

        let mut route = dto
            .stop_times
            .iter()
            .map(RouteStop::from_dto)
            .collect::<Result<Vec<_>, _>>()?;
        route.sort_by_key(|stop| stop.sequence);
        if let Some(pair) = route.windows(2).find(|w| w[0].sequence == w[1].sequence) {
            return Err(ParseError::SequenceOrder {
                train: train_no.to_string(),
                sequence: pair[1].sequence,
            });
        }

        let overnight_station = info
            .over_night_station_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|s| parse_field(PAYLOAD, "OverNightStationID", s, StationId::parse))
            .transpose()?;

        Ok(Self {
            direction: Direction::from_code(info.direction)
                .map_err(|_| ParseError::field(PAYLOAD, "Direction", info.direction.to_string()))?,
            train_type: parse_field(PAYLOAD, "TrainTypeID", &info.train_type_id, TrainTypeId::parse)?,
            train_type_code: info.train_type_code.clone(),
            origin: parse_field(
                PAYLOAD,
                "StartingStationID",
                &info.starting_station_id,
                StationId::parse,
            )?,
            destination: parse_field(
                PAYLOAD,
                "EndingStationID",
                &info.ending_station_id,
                StationId::parse,
            )?,
            trip_line: info.trip_line,
            suspended: info.suspended_flag != 0,
            overnight_station,
            route,
            train_no,
        })
    }

    /// Stops in sequence order.
    pub fn route(&self) -> &[RouteStop] {
        &self.route
    }

    /// The first stop at `station`, if the train calls there.
    pub fn stop_at(&self, station: &str) -> Option<&RouteStop> {
        self.route.iter().find(|s| s.station.as_str() == station)
    }

    /// Sequence number of the first call at `station`.
    pub fn first_sequence(&self, station: &str) -> Option<u32> {
        self.stop_at(station).map(|s| s.sequence)
    }

    /// Sequence number of the last call at `station`.
    pub fn last_sequence(&self, station: &str) -> Option<u32> {
        self.route
            .iter()
            .rev()
            .find(|s| s.station.as_str() == station)
            .map(|s| s.sequence)
    }

    /// Whether the train reaches `to` after leaving `from`.
    ///
    /// ```
    /// # use tra_live::timetable::TrainTimetable;
    /// let body = r#"{"TrainDate": "2024-03-15", "TrainTimetables": [{
    ///     "TrainInfo": {"TrainNo": "1", "Direction": 0, "TrainTypeID": "1131",
    ///         "StartingStationID": "A", "EndingStationID": "C",
    ///         "TripLine": 0, "SuspendedFlag": 0},
    ///     "StopTimes": [
    ///         {"StopSequence": 1, "StationID": "A", "ArrivalTime": "08:00", "DepartureTime": "08:00"},
    ///         {"StopSequence": 2, "StationID": "B", "ArrivalTime": "08:10", "DepartureTime": "08:11"},
    ///         {"StopSequence": 3, "StationID": "C", "ArrivalTime": "08:20", "DepartureTime": "08:20"}
    ///     ]}]}"#;
    /// let table = TrainTimetable::parse(body.as_bytes()).unwrap();
    /// let train = table.train("1").unwrap();
    ///
    /// assert!(train.reaches("A", "C"));
    /// assert!(!train.reaches("C", "A"));
    /// assert!(!train.reaches("A", "Z"));
    /// ```
    pub fn reaches(&self, from: &str, to: &str) -> bool {
        match (self.first_sequence(from), self.last_sequence(to)) {
            (Some(origin), Some(destination)) => destination > origin,
            _ => false,
        }
    }
}

/// Every train's timetable for one service date.
#[derive(Debug, Clone)]
pub struct TrainTimetable {
    date: NaiveDate,
    trains: HashMap<TrainNo, Train>,
}

impl TrainTimetable {
    /// Parse a `DailyTrainTimetable` body.
    pub fn parse(body: &[u8]) -> Result<Self, ParseError> {
        let response: TrainTimetableResponse =
            serde_json::from_slice(body).map_err(|e| ParseError::json(PAYLOAD, e))?;
        Self::from_response(&response)
    }

    pub fn from_response(response: &TrainTimetableResponse) -> Result<Self, ParseError> {
        let date = parse_train_date(PAYLOAD, &response.train_date)?;
        let trains = response
            .train_timetables
            .iter()
            .map(|dto| Train::from_dto(dto).map(|train| (train.train_no.clone(), train)))
            .collect::<Result<HashMap<_, _>, _>>()?;

        Ok(Self { date, trains })
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn train(&self, train_no: &str) -> Option<&Train> {
        self.trains.get(train_no)
    }

    pub fn trains(&self) -> impl Iterator<Item = &Train> {
        self.trains.values()
    }

    pub fn len(&self) -> usize {
        self.trains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trains.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop(seq: u32, station: &str, time: &str) -> String {
        format!(
            r#"{{"StopSequence": {seq}, "StationID": "{station}",
                "ArrivalTime": "{time}", "DepartureTime": "{time}"}}"#
        )
    }

    fn body(train_no: &str, stops: &[String], extra_info: &str) -> String {
        format!(
            r#"{{"TrainDate": "2024-03-15", "TrainTimetables": [{{
                "TrainInfo": {{"TrainNo": "{train_no}", "Direction": 1,
                    "TrainTypeID": "1100", "TrainTypeCode": "3",
                    "StartingStationID": "1000", "EndingStationID": "4400",
                    "TripLine": 1, "SuspendedFlag": 0 {extra_info}}},
                "StopTimes": [{}]
            }}]}}"#,
            stops.join(",")
        )
    }

    #[test]
    fn parses_train_info() {
        let json = body(
            "123",
            &[stop(1, "1000", "08:00"), stop(2, "3300", "09:00")],
            r#", "OverNightStationID": "3300""#,
        );
        let table = TrainTimetable::parse(json.as_bytes()).unwrap();
        assert_eq!(table.len(), 1);

        let train = table.train("123").unwrap();
        assert_eq!(train.direction, Direction::Counterclockwise);
        assert_eq!(train.origin.as_str(), "1000");
        assert_eq!(train.destination.as_str(), "4400");
        assert_eq!(train.trip_line, 1);
        assert!(!train.suspended);
        assert_eq!(train.overnight_station.as_ref().unwrap().as_str(), "3300");
        assert_eq!(train.route().len(), 2);
    }

    #[test]
    fn route_is_sorted_by_sequence() {
        let json = body(
            "1",
            &[stop(3, "C", "08:20"), stop(1, "A", "08:00"), stop(2, "B", "08:10")],
            "",
        );
        let table = TrainTimetable::parse(json.as_bytes()).unwrap();
        let stations: Vec<_> = table
            .train("1")
            .unwrap()
            .route()
            .iter()
            .map(|s| s.station.as_str())
            .collect();
        assert_eq!(stations, vec!["A", "B", "C"]);
    }

    #[test]
    fn duplicate_sequence_rejected() {
        let json = body("9", &[stop(1, "A", "08:00"), stop(1, "B", "08:10")], "");
        let err = TrainTimetable::parse(json.as_bytes()).unwrap_err();
        assert_eq!(
            err,
            ParseError::SequenceOrder {
                train: "9".into(),
                sequence: 1
            }
        );
    }

    #[test]
    fn loop_route_uses_first_departure_and_last_arrival() {
        // A -> B -> C -> A: from B the train reaches A (again) later.
        let json = body(
            "7",
            &[
                stop(1, "A", "08:00"),
                stop(2, "B", "08:10"),
                stop(3, "C", "08:20"),
                stop(4, "A", "08:30"),
            ],
            "",
        );
        let table = TrainTimetable::parse(json.as_bytes()).unwrap();
        let train = table.train("7").unwrap();

        assert!(train.reaches("B", "A"));
        assert!(train.reaches("A", "C"));
        assert!(!train.reaches("C", "B"));
        assert!(!train.reaches("B", "B"));
        assert_eq!(train.first_sequence("A"), Some(1));
        assert_eq!(train.last_sequence("A"), Some(4));
    }

    #[test]
    fn suspended_and_empty_overnight() {
        let json = body("5", &[stop(1, "A", "08:00")], r#", "OverNightStationID": """#)
            .replace("\"SuspendedFlag\": 0", "\"SuspendedFlag\": 1");
        let table = TrainTimetable::parse(json.as_bytes()).unwrap();
        let train = table.train("5").unwrap();

        assert!(train.suspended);
        assert!(train.overnight_station.is_none());
    }

    #[test]
    fn bad_direction_rejected() {
        let json = body("5", &[stop(1, "A", "08:00")], "").replace("\"Direction\": 1", "\"Direction\": 3");
        let err = TrainTimetable::parse(json.as_bytes()).unwrap_err();
        assert_eq!(err, ParseError::field(PAYLOAD, "Direction", "3"));
    }
}
