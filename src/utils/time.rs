use chrono::{Duration, NaiveDate};

use crate::error::DurationParseError;

/// This is the standard way of converting a date to a string in apptally. Used both for
/// `session_date` and for naming local record files.
pub fn date_to_record_name(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Formats a duration as `HH:MM:SS`. Hours are not capped at 24, so `100:00:00` is a valid
/// result. Negative durations are clamped to zero and sub-second parts are dropped.
pub fn format_hms(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Reads back a duration written by [format_hms]. The shorter `MM:SS` and `SS` forms are
/// accepted as well, since older records were written that way.
pub fn parse_hms(value: &str) -> Result<Duration, DurationParseError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DurationParseError::Empty);
    }

    let parts = value.split(':').collect::<Vec<_>>();
    if parts.len() > 3 {
        return Err(DurationParseError::TooManyComponents(value.to_string()));
    }

    let mut total = 0i64;
    for (position, part) in parts.iter().enumerate() {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DurationParseError::InvalidComponent(value.to_string()));
        }
        let number = part
            .parse::<i64>()
            .map_err(|_| DurationParseError::InvalidComponent(value.to_string()))?;

        // Only the leading component may exceed its unit.
        if position > 0 && number >= 60 {
            return Err(DurationParseError::OutOfRange(value.to_string()));
        }
        total = total
            .checked_mul(60)
            .and_then(|v| v.checked_add(number))
            .ok_or_else(|| DurationParseError::InvalidComponent(value.to_string()))?;
    }

    Duration::try_seconds(total).ok_or_else(|| DurationParseError::InvalidComponent(value.to_string()))
}

/// Hours with two decimals, the unit used by every report.
pub fn format_hours(duration: Duration) -> String {
    format!("{:.2}", duration.num_seconds() as f64 / 3600.)
}
