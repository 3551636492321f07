// libs/booking-cell/src/services/timeslot.rs
use chrono::{Datelike, NaiveDate, NaiveTime, Timelike, Weekday};

use crate::models::AppointmentError;

/// Day of week as stored in availability_slots (0 = Sunday .. 6 = Saturday)
pub fn day_of_week(date: NaiveDate) -> i32 {
    match date.weekday() {
        Weekday::Sun => 0,
        Weekday::Mon => 1,
        Weekday::Tue => 2,
        Weekday::Wed => 3,
        Weekday::Thu => 4,
        Weekday::Fri => 5,
        Weekday::Sat => 6,
    }
}

pub fn minutes_since_midnight(time: NaiveTime) -> i32 {
    (time.hour() * 60 + time.minute()) as i32
}

/// Half-open interval overlap: back-to-back ranges do not overlap
pub fn ranges_overlap(start_a: i32, end_a: i32, start_b: i32, end_b: i32) -> bool {
    start_a < end_b && end_a > start_b
}

/// Parse a time-of-day query value at HH:MM granularity (seconds tolerated)
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime, AppointmentError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| AppointmentError::ValidationError(
            format!("Invalid time of day: {}", value)
        ))
}
