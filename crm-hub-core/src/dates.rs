//! Date parsing shared by rule thresholds and request payloads
//!
//! The dashboard sends calendar dates (`2024-05-01`) from date inputs and
//! full timestamps (`2024-05-01T10:30:00.000Z`) from `new Date()`. Both are
//! accepted wherever a date is expected.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{de::Error as _, Deserialize, Deserializer};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a calendar date, truncating timestamps to their UTC date
pub fn parse_calendar_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(input, DATE_FORMAT) {
        return Some(date);
    }
    DateTime::parse_from_rfc3339(input)
        .ok()
        .map(|ts| ts.with_timezone(&Utc).date_naive())
}

/// Parse a timestamp; a bare date means midnight UTC
pub fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(input, DATE_FORMAT)
        .ok()
        .map(|date| Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
}

fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.trim().is_empty()))
}

/// `deserialize_with` helper for optional calendar dates
pub fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    match optional_text(deserializer)? {
        None => Ok(None),
        Some(text) => parse_calendar_date(&text)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid date '{}'", text))),
    }
}

/// `deserialize_with` helper for optional timestamps
pub fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match optional_text(deserializer)? {
        None => Ok(None),
        Some(text) => parse_timestamp(&text)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid timestamp '{}'", text))),
    }
}
