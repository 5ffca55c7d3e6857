// src/attendance.rs

use chrono::{NaiveTime, Timelike};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{HrError, Result};
use crate::models::AttendanceStatus;

/// Check-ins strictly after 09:00 count as late.
pub const LATE_CUTOFF_SECS: u32 = 9 * 60 * 60;

const SECS_PER_HOUR: i64 = 60 * 60;

/// Parses an "HH:MM" (or "HH:MM:SS") clock time.
pub fn parse_clock_time(value: &str) -> Result<NaiveTime> {
    let trimmed = value.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|_| HrError::InvalidTime(value.to_string()))
}

/// Checks an optional clock time and returns it trimmed. Blank values count as absent.
pub fn validate_clock_time(value: Option<&str>) -> Result<Option<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => {
            parse_clock_time(v)?;
            Ok(Some(v.to_string()))
        }
    }
}

/// Derives the attendance status from a check-in time.
///
/// No check-in is `Absent`, a check-in strictly after 09:00 is `Late`, anything else is
/// `Present`. Unparsable times are rejected instead of being compared.
pub fn calculate_status(check_in: Option<&str>) -> Result<AttendanceStatus> {
    let Some(check_in) = check_in.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(AttendanceStatus::Absent);
    };
    let time = parse_clock_time(check_in)?;
    if time.num_seconds_from_midnight() > LATE_CUTOFF_SECS {
        Ok(AttendanceStatus::Late)
    } else {
        Ok(AttendanceStatus::Present)
    }
}

/// Hours between check-in and check-out, rounded to one decimal.
/// Returns `None` when either side is missing.
pub fn worked_hours(check_in: Option<&str>, check_out: Option<&str>) -> Result<Option<Decimal>> {
    let (Some(check_in), Some(check_out)) = (
        validate_clock_time(check_in)?,
        validate_clock_time(check_out)?,
    ) else {
        return Ok(None);
    };
    let start = parse_clock_time(&check_in)?;
    let end = parse_clock_time(&check_out)?;
    let seconds = (end - start).num_seconds();
    let hours = Decimal::from(seconds) / Decimal::from(SECS_PER_HOUR);
    Ok(Some(hours.round_dp_with_strategy(
        1,
        RoundingStrategy::MidpointAwayFromZero,
    )))
}
