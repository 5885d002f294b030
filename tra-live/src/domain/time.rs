//! Time-of-day handling for timetable data.
//!
//! The feed gives scheduled times as "HH:MM" strings without a date. Whether
//! a time belongs to "today" or "tomorrow" depends on where the service day
//! is cut, so comparisons against the wall clock go through a [`DayBoundary`].

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// Error returned when parsing an invalid time string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time: {reason}")]
pub struct TimeError {
    reason: &'static str,
}

impl TimeError {
    fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

const SECS_PER_DAY: u32 = 24 * 60 * 60;

/// Parse a time of day from "HH:MM" format.
///
/// # Examples
///
/// ```
/// use tra_live::domain::parse_hhmm;
///
/// assert!(parse_hhmm("00:00").is_ok());
/// assert!(parse_hhmm("23:59").is_ok());
///
/// assert!(parse_hhmm("1430").is_err());
/// assert!(parse_hhmm("14:3").is_err());
/// assert!(parse_hhmm("24:00").is_err());
/// ```
pub fn parse_hhmm(s: &str) -> Result<NaiveTime, TimeError> {
    if s.len() != 5 {
        return Err(TimeError::new("expected HH:MM format"));
    }

    let bytes = s.as_bytes();

    if bytes[2] != b':' {
        return Err(TimeError::new("expected colon at position 2"));
    }

    let hour =
        parse_two_digits(&bytes[0..2]).ok_or_else(|| TimeError::new("invalid hour digits"))?;
    if hour > 23 {
        return Err(TimeError::new("hour must be 0-23"));
    }

    let minute =
        parse_two_digits(&bytes[3..5]).ok_or_else(|| TimeError::new("invalid minute digits"))?;
    if minute > 59 {
        return Err(TimeError::new("minute must be 0-59"));
    }

    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| TimeError::new("invalid time"))
}

/// Parse two ASCII digit bytes into a u32.
fn parse_two_digits(bytes: &[u8]) -> Option<u32> {
    if bytes.len() != 2 {
        return None;
    }
    let d1 = (bytes[0] as char).to_digit(10)?;
    let d2 = (bytes[1] as char).to_digit(10)?;
    Some(d1 * 10 + d2)
}

/// Format a time of day as "HH:MM".
pub fn format_hhmm(time: NaiveTime) -> String {
    format!("{:02}:{:02}", time.hour(), time.minute())
}

/// Shift a time of day by a number of minutes, wrapping at 24:00.
///
/// ```
/// use chrono::NaiveTime;
/// use tra_live::domain::add_minutes;
///
/// let t = NaiveTime::from_hms_opt(23, 59, 0).unwrap();
/// assert_eq!(add_minutes(t, 5), NaiveTime::from_hms_opt(0, 4, 0).unwrap());
/// ```
pub fn add_minutes(time: NaiveTime, minutes: i64) -> NaiveTime {
    time.overflowing_add_signed(Duration::minutes(minutes)).0
}

/// The hour at which one service day ends and the next begins.
///
/// Two boundaries are in use and they are deliberately different:
/// [`ADMISSION_BOUNDARY`] decides which calendar day's timetable a stop is
/// taken from, [`DEPARTED_BOUNDARY`] decides whether a running train has
/// left. Trains between midnight and 03:00 still belong to the previous
/// service day for the latter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBoundary {
    hour: u32,
}

/// Boundary used to admit stops from today's or tomorrow's timetable.
pub const ADMISSION_BOUNDARY: DayBoundary = DayBoundary::at_hour(0);

/// Boundary used to decide whether a train with a live report has departed.
pub const DEPARTED_BOUNDARY: DayBoundary = DayBoundary::at_hour(3);

impl DayBoundary {
    /// A boundary at the given hour (0-23).
    pub const fn at_hour(hour: u32) -> Self {
        Self { hour: hour % 24 }
    }

    /// The boundary hour.
    pub fn hour(&self) -> u32 {
        self.hour
    }

    /// Seconds elapsed since the start of the service day containing `time`.
    fn offset(&self, time: NaiveTime) -> u32 {
        let secs = time.num_seconds_from_midnight();
        (secs + SECS_PER_DAY - self.hour * 3600) % SECS_PER_DAY
    }

    /// Whether `now` is at or past `time`, both placed on the same service day.
    ///
    /// ```
    /// use chrono::NaiveTime;
    /// use tra_live::domain::DEPARTED_BOUNDARY;
    ///
    /// let t = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
    ///
    /// // 00:04 is later in the service day than 23:58
    /// assert!(!DEPARTED_BOUNDARY.has_passed(t(0, 4), t(23, 58)));
    /// // and 23:58 is earlier than 01:00
    /// assert!(DEPARTED_BOUNDARY.has_passed(t(23, 58), t(1, 0)));
    /// ```
    pub fn has_passed(&self, time: NaiveTime, now: NaiveTime) -> bool {
        self.offset(now) >= self.offset(time)
    }
}

/// The next instant at which `time` occurs, relative to `now`.
///
/// The time is placed on `now`'s date unless that would be earlier than the
/// current minute, in which case it rolls over to the following day. Used as
/// the sort key for live departures so that 00:10 sorts after 23:50 when the
/// clock reads 23:45.
pub fn next_occurrence(time: NaiveTime, now: NaiveDateTime) -> NaiveDateTime {
    let current_minute = truncate_to_minute(now);
    let candidate = now.date().and_time(time);
    if candidate < current_minute {
        candidate + Duration::days(1)
    } else {
        candidate
    }
}

/// The first instant of the day after `now`.
pub fn next_midnight(now: NaiveDateTime) -> NaiveDateTime {
    let tomorrow = now.date().succ_opt().unwrap_or(NaiveDate::MAX);
    tomorrow.and_time(NaiveTime::MIN)
}

fn truncate_to_minute(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_second(0)
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(dt)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn parse_valid_times() {
        assert_eq!(parse_hhmm("00:00").unwrap(), t(0, 0));
        assert_eq!(parse_hhmm("23:59").unwrap(), t(23, 59));
        assert_eq!(parse_hhmm("06:02").unwrap(), t(6, 2));
    }

    #[test]
    fn parse_invalid_format() {
        assert!(parse_hhmm("1430").is_err());
        assert!(parse_hhmm("14:300").is_err());
        assert!(parse_hhmm("14-30").is_err());
        assert!(parse_hhmm("ab:cd").is_err());
        assert!(parse_hhmm("1a:30").is_err());
    }

    #[test]
    fn parse_invalid_values() {
        assert!(parse_hhmm("24:00").is_err());
        assert!(parse_hhmm("12:60").is_err());
    }

    #[test]
    fn format_pads() {
        assert_eq!(format_hhmm(t(9, 5)), "09:05");
        assert_eq!(format_hhmm(t(0, 0)), "00:00");
    }

    #[test]
    fn add_minutes_wraps_both_ways() {
        assert_eq!(add_minutes(t(10, 0), 30), t(10, 30));
        assert_eq!(add_minutes(t(23, 59), 5), t(0, 4));
        assert_eq!(add_minutes(t(0, 2), -5), t(23, 57));
        assert_eq!(add_minutes(t(12, 0), 0), t(12, 0));
    }

    #[test]
    fn admission_boundary_is_plain_time_of_day() {
        let b = ADMISSION_BOUNDARY;
        assert!(b.has_passed(t(10, 0), t(10, 0)));
        assert!(b.has_passed(t(10, 0), t(10, 1)));
        assert!(!b.has_passed(t(10, 0), t(9, 59)));
        // 23:59 has not passed at 00:02 on a midnight-cut day
        assert!(!b.has_passed(t(23, 59), t(0, 2)));
    }

    #[test]
    fn departed_boundary_keeps_small_hours_in_previous_day() {
        let b = DEPARTED_BOUNDARY;
        assert!(!b.has_passed(t(0, 4), t(23, 58)));
        assert!(!b.has_passed(t(0, 4), t(0, 2)));
        assert!(b.has_passed(t(0, 4), t(0, 4)));
        assert!(b.has_passed(t(23, 58), t(0, 2)));
        assert!(!b.has_passed(t(2, 59), t(3, 0)));
        assert!(b.has_passed(t(3, 0), t(3, 0)));
    }

    #[test]
    fn has_passed_counts_seconds() {
        let now = NaiveTime::from_hms_opt(10, 0, 30).unwrap();
        assert!(ADMISSION_BOUNDARY.has_passed(t(10, 0), now));
        assert!(!ADMISSION_BOUNDARY.has_passed(t(10, 1), now));
    }

    #[test]
    fn next_occurrence_same_day() {
        assert_eq!(next_occurrence(t(12, 0), at(10, 0)), at(12, 0));
        // The current minute still counts as today
        assert_eq!(next_occurrence(t(10, 0), at(10, 0)), at(10, 0));
    }

    #[test]
    fn next_occurrence_rolls_over() {
        let next = next_occurrence(t(0, 10), at(23, 45));
        assert_eq!(next, at(0, 10) + Duration::days(1));
        assert!(next > next_occurrence(t(23, 50), at(23, 45)));
    }

    #[test]
    fn next_occurrence_ignores_seconds_of_now() {
        let now = at(10, 0) + Duration::seconds(40);
        assert_eq!(next_occurrence(t(10, 0), now), at(10, 0));
    }

    #[test]
    fn next_midnight_is_start_of_next_day() {
        assert_eq!(next_midnight(at(0, 0)), at(0, 0) + Duration::days(1));
        assert_eq!(next_midnight(at(23, 59)), at(0, 0) + Duration::days(1));
    }
}
