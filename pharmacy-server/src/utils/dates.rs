//! Calendar date helpers
//!
//! Dates travel as `YYYY-MM-DD` strings and are stored as SQL `DATE`.
//! Timestamps travel as RFC 3339.

use chrono::{DateTime, Months, NaiveDate, Utc};

use crate::error::ApiError;
use crate::utils::validation::is_iso_date;

/// Parse a strict `YYYY-MM-DD` date. Well formed but impossible dates
/// (`2024-02-30`) are rejected too.
pub fn parse_iso_date(raw: &str) -> Result<NaiveDate, ApiError> {
    let raw = raw.trim();
    if !is_iso_date(raw) {
        return Err(ApiError::validation(format!("invalid date '{}', expected YYYY-MM-DD", raw)));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ApiError::validation(format!("invalid date '{}'", raw)))
}

/// Optional query parameter; blank counts as absent.
pub fn parse_optional_date(raw: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_iso_date(value).map(Some),
    }
}

/// `YYYY-MM` to the half-open range `[first day, first day of next month)`.
pub fn month_range(raw: &str) -> Option<(NaiveDate, NaiveDate)> {
    let raw = raw.trim();
    let (year, month) = raw.split_once('-')?;
    let ascii_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if year.len() != 4 || month.len() != 2 || !ascii_digits(year) || !ascii_digits(month) {
        return None;
    }
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let end = start.checked_add_months(Months::new(1))?;
    Some((start, end))
}

pub fn parse_rfc3339(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ApiError::validation("Invalid RFC3339 timestamp format. Expected format: YYYY-MM-DDTHH:MM:SSZ"))
}

pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

/// Whole days from `from` to `to`; negative when `to` is earlier.
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}
