//! Domain types for timetable and live data.
//!
//! All types enforce their invariants at construction time, so code that
//! receives these types can trust their validity.

mod direction;
mod error;
mod ids;
mod time;

pub use direction::{Direction, InvalidDirection};
pub use error::ParseError;
pub(crate) use error::parse_field;
pub use ids::{InvalidId, StationId, TrainNo, TrainTypeId};
pub use time::{
    ADMISSION_BOUNDARY, DEPARTED_BOUNDARY, DayBoundary, TimeError, add_minutes, format_hhmm,
    next_midnight, next_occurrence, parse_hhmm,
};
