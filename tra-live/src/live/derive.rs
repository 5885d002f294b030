//! Live departure boards.
//!
//! Merges the static station timetables with the live board into one
//! rolling view per station. The view spans midnight: stops from today's
//! timetable are shown until their scheduled departure, and from then on
//! the same slot is filled from tomorrow's timetable.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDateTime, NaiveTime};

use crate::domain::{
    ADMISSION_BOUNDARY, DEPARTED_BOUNDARY, Direction, StationId, TrainNo, TrainTypeId,
    add_minutes, next_occurrence,
};
use crate::timetable::{Station, StationStop, StationTimetable, TrainTimetable};

use super::board::LiveBoard;

/// Which day's timetable a live stop was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceDay {
    Today,
    Tomorrow,
}

/// Delay as shown to a passenger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayStatus {
    /// No live report yet, or the train has already left this station.
    NotDeparted,
    OnTime,
    /// Minutes late, always at least 1.
    Late(u32),
}

impl fmt::Display for DelayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DelayStatus::NotDeparted => f.write_str("not departed"),
            DelayStatus::OnTime => f.write_str("on time"),
            DelayStatus::Late(mins) => write!(f, "{mins} min late"),
        }
    }
}

/// One train at one station, reconciled with the live board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveStop {
    pub train_no: TrainNo,
    pub train_type: TrainTypeId,
    pub destination: StationId,
    pub direction: Option<Direction>,
    pub scheduled_arrival: NaiveTime,
    pub scheduled_departure: NaiveTime,
    /// Minutes late; `None` when the train has no live report.
    pub delay: Option<i64>,
    /// Scheduled arrival shifted by the delay.
    pub arrival: NaiveTime,
    /// Scheduled departure shifted by the delay.
    pub departure: NaiveTime,
    /// Whether the train has left. Never true without a live report.
    pub departed: bool,
    pub service_day: ServiceDay,
}

impl LiveStop {
    /// Reconcile a scheduled stop with its reported delay at time-of-day `now`.
    pub fn new(
        stop: &StationStop,
        delay: Option<i64>,
        service_day: ServiceDay,
        now: NaiveTime,
    ) -> Self {
        let shift = delay.unwrap_or(0);
        let arrival = add_minutes(stop.arrival, shift);
        let departure = add_minutes(stop.departure, shift);
        let departed = delay.is_some() && DEPARTED_BOUNDARY.has_passed(departure, now);

        Self {
            train_no: stop.train_no.clone(),
            train_type: stop.train_type.clone(),
            destination: stop.destination.clone(),
            direction: stop.direction,
            scheduled_arrival: stop.arrival,
            scheduled_departure: stop.departure,
            delay,
            arrival,
            departure,
            departed,
            service_day,
        }
    }

    pub fn status(&self) -> DelayStatus {
        match self.delay {
            None => DelayStatus::NotDeparted,
            Some(_) if self.departed => DelayStatus::NotDeparted,
            Some(mins) if mins <= 0 => DelayStatus::OnTime,
            Some(mins) => DelayStatus::Late(u32::try_from(mins).unwrap_or(u32::MAX)),
        }
    }

    /// Sort key: the next instant the (delayed) departure happens.
    pub fn sort_key(&self, now: NaiveDateTime) -> NaiveDateTime {
        next_occurrence(self.departure, now)
    }
}

/// Live departures at one station, sorted by upcoming departure.
#[derive(Debug, Clone)]
pub struct StationLive {
    station: StationId,
    stops: Vec<LiveStop>,
    by_train: HashMap<TrainNo, usize>,
    by_direction: BTreeMap<Direction, Vec<usize>>,
}

impl StationLive {
    fn build(station: StationId, mut stops: Vec<LiveStop>, now: NaiveDateTime) -> Self {
        stops.sort_by(|a, b| {
            a.sort_key(now)
                .cmp(&b.sort_key(now))
                .then_with(|| a.train_no.cmp(&b.train_no))
        });

        let mut by_train = HashMap::with_capacity(stops.len());
        let mut by_direction: BTreeMap<Direction, Vec<usize>> = BTreeMap::new();
        for (i, stop) in stops.iter().enumerate() {
            by_train.insert(stop.train_no.clone(), i);
            if let Some(direction) = stop.direction {
                by_direction.entry(direction).or_default().push(i);
            }
        }

        Self {
            station,
            stops,
            by_train,
            by_direction,
        }
    }

    /// A station with nothing to show.
    pub fn empty(station: StationId) -> Self {
        Self::build(station, Vec::new(), NaiveDateTime::MIN)
    }

    pub fn station(&self) -> &StationId {
        &self.station
    }

    /// Departures in order, optionally restricted to one direction.
    ///
    /// Stops without a direction only appear when `direction` is `None`.
    pub fn departures(&self, direction: Option<Direction>) -> Vec<&LiveStop> {
        match direction {
            None => self.stops.iter().collect(),
            Some(d) => self
                .by_direction
                .get(&d)
                .map(|indices| indices.iter().map(|&i| &self.stops[i]).collect())
                .unwrap_or_default(),
        }
    }

    pub fn get(&self, train_no: &str) -> Option<&LiveStop> {
        self.by_train.get(train_no).map(|&i| &self.stops[i])
    }

    /// Directions served by at least one listed stop.
    pub fn directions(&self) -> impl Iterator<Item = Direction> + '_ {
        self.by_direction.keys().copied()
    }

    /// Departures whose train reaches `destination` after this station.
    pub fn filter_by_destination(
        &self,
        destination: &str,
        direction: Option<Direction>,
        today: &TrainTimetable,
        tomorrow: Option<&TrainTimetable>,
    ) -> Vec<&LiveStop> {
        self.departures(direction)
            .into_iter()
            .filter(|stop| {
                reaches_destination(stop, self.station.as_str(), destination, today, tomorrow)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }
}

/// Whether the train behind `stop` reaches `destination` after `origin`.
///
/// The route is looked up in the timetable of the stop's own service day
/// first, then the other one. A train in neither timetable never matches.
pub fn reaches_destination(
    stop: &LiveStop,
    origin: &str,
    destination: &str,
    today: &TrainTimetable,
    tomorrow: Option<&TrainTimetable>,
) -> bool {
    let (preferred, fallback) = match stop.service_day {
        ServiceDay::Today => (Some(today), tomorrow),
        ServiceDay::Tomorrow => (tomorrow, Some(today)),
    };
    let train_no = stop.train_no.as_str();
    preferred
        .and_then(|t| t.train(train_no))
        .or_else(|| fallback.and_then(|t| t.train(train_no)))
        .is_some_and(|train| train.reaches(origin, destination))
}

/// Build the live view of one station.
///
/// Today's stops are admitted while `now` is before their scheduled
/// departure; tomorrow's once `now` is at or past it. A train already
/// admitted from today is not admitted again from tomorrow.
pub fn derive_station(
    id: &StationId,
    today: Option<&Station>,
    tomorrow: Option<&Station>,
    live: &LiveBoard,
    now: NaiveDateTime,
) -> StationLive {
    let time = now.time();
    let mut admitted: HashMap<TrainNo, LiveStop> = HashMap::new();

    for stop in today.into_iter().flat_map(|s| s.stops()) {
        if !ADMISSION_BOUNDARY.has_passed(stop.departure, time) {
            let live_stop =
                LiveStop::new(stop, live.delay(stop.train_no.as_str()), ServiceDay::Today, time);
            admitted.insert(stop.train_no.clone(), live_stop);
        }
    }

    for stop in tomorrow.into_iter().flat_map(|s| s.stops()) {
        if ADMISSION_BOUNDARY.has_passed(stop.departure, time)
            && !admitted.contains_key(&stop.train_no)
        {
            let live_stop =
                LiveStop::new(stop, live.delay(stop.train_no.as_str()), ServiceDay::Tomorrow, time);
            admitted.insert(stop.train_no.clone(), live_stop);
        }
    }

    StationLive::build(id.clone(), admitted.into_values().collect(), now)
}

/// Live views for every station in either timetable.
#[derive(Debug, Clone)]
pub struct StationLiveTable {
    derived_at: NaiveDateTime,
    stations: HashMap<StationId, Arc<StationLive>>,
}

impl StationLiveTable {
    pub fn derive(
        today: &StationTimetable,
        tomorrow: Option<&StationTimetable>,
        live: &LiveBoard,
        now: NaiveDateTime,
    ) -> Self {
        let mut ids: Vec<&StationId> = today.stations().map(|s| s.id()).collect();
        ids.extend(tomorrow.into_iter().flat_map(|t| t.stations().map(|s| s.id())));
        ids.sort();
        ids.dedup();

        let stations = ids
            .into_iter()
            .map(|id| {
                let view = derive_station(
                    id,
                    today.station(id.as_str()),
                    tomorrow.and_then(|t| t.station(id.as_str())),
                    live,
                    now,
                );
                (id.clone(), Arc::new(view))
            })
            .collect();

        Self {
            derived_at: now,
            stations,
        }
    }

    pub fn station(&self, id: &str) -> Option<&Arc<StationLive>> {
        self.stations.get(id)
    }

    pub fn stations(&self) -> impl Iterator<Item = &StationLive> {
        self.stations.values().map(|s| s.as_ref())
    }

    pub fn derived_at(&self) -> NaiveDateTime {
        self.derived_at
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::{Value, json};

    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn on(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap().and_time(t(h, m))
    }

    /// (train, departure, direction code or None)
    type Entry<'a> = (&'a str, &'a str, Option<i64>);

    fn station_table(date: &str, station: &str, entries: &[Entry]) -> StationTimetable {
        let tables: Vec<Value> = entries
            .iter()
            .map(|(train, dep, dir)| {
                json!({
                    "StationID": station,
                    "Direction": dir,
                    "TimeTables": [{
                        "TrainNo": train, "ArrivalTime": dep, "DepartureTime": dep,
                        "DestinationStationID": "4400", "TrainTypeID": "1131"
                    }]
                })
            })
            .collect();
        let body = json!({ "TrainDate": date, "StationTimetables": tables });
        StationTimetable::parse(body.to_string().as_bytes()).unwrap()
    }

    fn board(delays: &[(&str, Option<i64>)]) -> LiveBoard {
        let rows: Vec<Value> = delays
            .iter()
            .map(|(train, delay)| json!({"TrainNo": train, "StationID": "1000", "DelayTime": delay}))
            .collect();
        let body = json!({ "UpdateTime": "2024-03-15T10:00:00+08:00", "TrainLiveBoards": rows });
        LiveBoard::parse(body.to_string().as_bytes()).unwrap()
    }

    fn stop(dep: NaiveTime, delay: Option<i64>, now: NaiveTime) -> LiveStop {
        let dep = crate::domain::format_hhmm(dep);
        let table = station_table("2024-03-15", "1000", &[("1", dep.as_str(), Some(0))]);
        let scheduled = table.station("1000").unwrap().stop("1").unwrap().clone();
        LiveStop::new(&scheduled, delay, ServiceDay::Today, now)
    }

    #[test]
    fn unknown_delay_is_never_departed() {
        let s = stop(t(8, 0), None, t(23, 0));
        assert!(!s.departed);
        assert_eq!(s.status(), DelayStatus::NotDeparted);
        assert_eq!(s.departure, t(8, 0));
    }

    #[test]
    fn delay_shifts_times_across_midnight() {
        let s = stop(t(23, 59), Some(5), t(23, 50));
        assert_eq!(s.departure, t(0, 4));
        assert_eq!(s.arrival, t(0, 4));
        assert_eq!(s.scheduled_departure, t(23, 59));
    }

    #[test]
    fn delay_status_rules() {
        assert_eq!(stop(t(12, 0), Some(0), t(11, 0)).status(), DelayStatus::OnTime);
        assert_eq!(stop(t(12, 0), Some(-2), t(11, 0)).status(), DelayStatus::OnTime);
        assert_eq!(stop(t(12, 0), Some(1), t(11, 0)).status(), DelayStatus::Late(1));
        assert_eq!(stop(t(12, 0), Some(7), t(11, 0)).status(), DelayStatus::Late(7));
        // Departed trains are shown as not departed (from this station's view)
        assert_eq!(stop(t(12, 0), Some(7), t(12, 30)).status(), DelayStatus::NotDeparted);
        assert_eq!(DelayStatus::Late(7).to_string(), "7 min late");
    }

    #[test]
    fn departed_uses_three_am_service_day() {
        // 00:30 departure, checked at 23:50: later in the service day, not gone.
        assert!(!stop(t(0, 25), Some(5), t(23, 50)).departed);
        // 23:50 departure, checked at 01:00: gone.
        assert!(stop(t(23, 45), Some(5), t(1, 0)).departed);
        // 02:00 departure, checked at 03:30: new service day started, the
        // 02:00 slot is at the end of it.
        assert!(!stop(t(2, 0), Some(0), t(3, 30)).departed);
    }

    #[test]
    fn today_until_departure_then_tomorrow() {
        let today = station_table("2024-03-15", "1000", &[("A", "08:00", Some(0)), ("B", "20:00", Some(0))]);
        let tomorrow = station_table("2024-03-16", "1000", &[("A", "08:00", Some(0)), ("B", "20:00", Some(0))]);
        let live = board(&[]);

        let table = StationLiveTable::derive(&today, Some(&tomorrow), &live, on(15, 12, 0));
        let view = table.station("1000").unwrap();

        assert_eq!(view.len(), 2);
        assert_eq!(view.get("A").unwrap().service_day, ServiceDay::Tomorrow);
        assert_eq!(view.get("B").unwrap().service_day, ServiceDay::Today);

        // B (20:00 today) comes before A (08:00 tomorrow).
        let order: Vec<_> = view.departures(None).iter().map(|s| s.train_no.as_str()).collect();
        assert_eq!(order, vec!["B", "A"]);
    }

    #[test]
    fn missing_tomorrow_only_shows_today() {
        let today = station_table("2024-03-15", "1000", &[("A", "08:00", Some(0)), ("B", "20:00", Some(0))]);
        let table = StationLiveTable::derive(&today, None, &board(&[]), on(15, 12, 0));
        let view = table.station("1000").unwrap();

        assert_eq!(view.len(), 1);
        assert!(view.get("B").is_some());
    }

    #[test]
    fn direction_views_and_flat_view() {
        let today = station_table(
            "2024-03-15",
            "1000",
            &[("A", "13:00", Some(0)), ("B", "14:00", Some(1)), ("C", "15:00", None)],
        );
        let table = StationLiveTable::derive(&today, None, &board(&[]), on(15, 12, 0));
        let view = table.station("1000").unwrap();

        assert_eq!(view.departures(None).len(), 3);
        let cw: Vec<_> = view
            .departures(Some(Direction::Clockwise))
            .iter()
            .map(|s| s.train_no.as_str())
            .collect();
        assert_eq!(cw, vec!["A"]);
        assert_eq!(view.departures(Some(Direction::Counterclockwise)).len(), 1);
        assert_eq!(view.directions().count(), 2);
    }

    #[test]
    fn sorting_uses_delayed_departure() {
        let today = station_table("2024-03-15", "1000", &[("A", "13:00", Some(0)), ("B", "13:05", Some(0))]);
        let live = board(&[("A", Some(10))]);
        let table = StationLiveTable::derive(&today, None, &live, on(15, 12, 0));

        let order: Vec<_> = table
            .station("1000")
            .unwrap()
            .departures(None)
            .iter()
            .map(|s| s.train_no.as_str())
            .collect();
        assert_eq!(order, vec!["B", "A"]);
    }

    #[test]
    fn midnight_scenario() {
        let today = station_table("2024-03-15", "1000", &[("99", "23:59", Some(0))]);
        let tomorrow = station_table("2024-03-16", "1000", &[("99", "23:59", Some(0))]);

        // 23:58, no live report: listed, not departed.
        let table = StationLiveTable::derive(&today, Some(&tomorrow), &board(&[]), on(15, 23, 58));
        let view = table.station("1000").unwrap();
        let train = view.get("99").unwrap();
        assert_eq!(view.len(), 1);
        assert_eq!(train.service_day, ServiceDay::Today);
        assert!(!train.departed);
        assert_eq!(train.status(), DelayStatus::NotDeparted);

        // 00:02, now 5 minutes late: effective departure 00:04, listed once,
        // not departed just because midnight passed.
        let live = board(&[("99", Some(5))]);
        let table = StationLiveTable::derive(&today, Some(&tomorrow), &live, on(16, 0, 2));
        let view = table.station("1000").unwrap();
        assert_eq!(view.len(), 1);
        let train = view.get("99").unwrap();
        assert_eq!(train.departure, t(0, 4));
        // Admission compares 00:02 with the scheduled 23:59, so the train
        // stays in today's bucket and tomorrow's copy is not admitted.
        assert_eq!(train.service_day, ServiceDay::Today);
        assert_eq!(train.scheduled_departure, t(23, 59));
        assert!(!train.departed);
        assert_eq!(train.status(), DelayStatus::Late(5));
        assert_eq!(train.sort_key(on(16, 0, 2)), on(16, 0, 4));

        // 00:05: the delayed departure has passed.
        let table = StationLiveTable::derive(&today, Some(&tomorrow), &live, on(16, 0, 5));
        let train = table.station("1000").unwrap().get("99").unwrap().clone();
        assert!(train.departed);
    }

    #[test]
    fn stations_from_either_day_are_listed() {
        let today = station_table("2024-03-15", "1000", &[("A", "23:00", Some(0))]);
        let tomorrow = station_table("2024-03-16", "1010", &[("B", "06:00", Some(0))]);
        let table = StationLiveTable::derive(&today, Some(&tomorrow), &board(&[]), on(15, 22, 0));

        assert_eq!(table.len(), 2);
        assert_eq!(table.station("1000").unwrap().len(), 1);
        // 06:00 tomorrow is not yet admitted at 22:00.
        assert!(table.station("1010").unwrap().is_empty());
        assert_eq!(table.derived_at(), on(15, 22, 0));
    }

    #[test]
    fn live_only_trains_are_ignored() {
        let today = station_table("2024-03-15", "1000", &[("A", "13:00", Some(0))]);
        let live = board(&[("ZZZ", Some(3))]);
        let table = StationLiveTable::derive(&today, None, &live, on(15, 12, 0));

        let view = table.station("1000").unwrap();
        assert_eq!(view.len(), 1);
        assert!(view.get("ZZZ").is_none());
    }

    fn train_table(date: &str, train: &str, route: &[&str]) -> TrainTimetable {
        let stops: Vec<Value> = route
            .iter()
            .enumerate()
            .map(|(i, station)| {
                json!({"StopSequence": i + 1, "StationID": station,
                       "ArrivalTime": "08:00", "DepartureTime": "08:00"})
            })
            .collect();
        let body = json!({
            "TrainDate": date,
            "TrainTimetables": [{
                "TrainInfo": {
                    "TrainNo": train, "Direction": 0, "TrainTypeID": "1131",
                    "StartingStationID": route[0], "EndingStationID": route[route.len() - 1],
                    "TripLine": 0, "SuspendedFlag": 0
                },
                "StopTimes": stops
            }]
        });
        TrainTimetable::parse(body.to_string().as_bytes()).unwrap()
    }

    #[test]
    fn destination_filter_follows_route_order() {
        let today = station_table("2024-03-15", "1000", &[("A", "13:00", Some(0))]);
        let routes = train_table("2024-03-15", "A", &["0900", "1000", "1100"]);
        let table = StationLiveTable::derive(&today, None, &board(&[]), on(15, 12, 0));
        let view = table.station("1000").unwrap();

        assert_eq!(view.filter_by_destination("1100", None, &routes, None).len(), 1);
        assert!(view.filter_by_destination("0900", None, &routes, None).is_empty());
        assert!(view.filter_by_destination("9999", None, &routes, None).is_empty());
    }

    #[test]
    fn destination_filter_falls_back_to_other_day() {
        // Admitted from tomorrow, but only today's train table knows it.
        let today_stations = station_table("2024-03-15", "1000", &[]);
        let tomorrow_stations = station_table("2024-03-16", "1000", &[("A", "08:00", Some(0))]);
        let routes = train_table("2024-03-15", "A", &["1000", "1100"]);

        let table = StationLiveTable::derive(&today_stations, Some(&tomorrow_stations), &board(&[]), on(15, 12, 0));
        let view = table.station("1000").unwrap();
        assert_eq!(view.get("A").unwrap().service_day, ServiceDay::Tomorrow);
        assert_eq!(view.filter_by_destination("1100", None, &routes, None).len(), 1);
    }
}
