//! Static timetables.
//!
//! Two views of the same day's schedule: per station ([`StationTimetable`])
//! for building departure boards, and per train ([`TrainTimetable`]) for
//! route questions such as "does this train reach that station".

mod station;
mod train;

use chrono::NaiveDate;

use crate::domain::{ParseError, parse_field};

pub use station::{Station, StationStop, StationTimetable};
pub use train::{RouteStop, Train, TrainTimetable};

/// Parse a feed `TrainDate` (YYYY-MM-DD).
fn parse_train_date(payload: &'static str, value: &str) -> Result<NaiveDate, ParseError> {
    parse_field(payload, "TrainDate", value, |s| {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
    })
}
