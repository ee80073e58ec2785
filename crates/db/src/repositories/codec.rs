use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::RepositoryError;

/// Fixed-width RFC 3339 so stored timestamps sort lexicographically.
pub(crate) fn encode_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

pub(crate) fn encode_date(value: NaiveDate) -> String {
    value.format("%Y-%m-%d").to_string()
}

pub(crate) fn parse_date(column: &str, value: &str) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|error| {
        RepositoryError::Decode(format!("invalid date in `{column}`: `{value}` ({error})"))
    })
}

pub(crate) fn encode_time(value: NaiveTime) -> String {
    value.format("%H:%M:%S").to_string()
}

pub(crate) fn parse_time(column: &str, value: &str) -> Result<NaiveTime, RepositoryError> {
    NaiveTime::parse_from_str(value, "%H:%M:%S").map_err(|error| {
        RepositoryError::Decode(format!("invalid time in `{column}`: `{value}` ({error})"))
    })
}

pub(crate) fn parse_u8(column: &str, value: i64) -> Result<u8, RepositoryError> {
    u8::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!("invalid value for `{column}` (expected u8): {value}"))
    })
}

pub(crate) fn parse_u32(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!(
            "invalid value for `{column}` (expected non-negative u32): {value}"
        ))
    })
}

pub(crate) fn encode_json<T: Serialize>(column: &str, value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value)
        .map_err(|error| RepositoryError::Decode(format!("cannot encode `{column}`: {error}")))
}

pub(crate) fn parse_json<T: DeserializeOwned>(column: &str, value: &str) -> Result<T, RepositoryError> {
    serde_json::from_str(value)
        .map_err(|error| RepositoryError::Decode(format!("invalid json in `{column}`: {error}")))
}

pub(crate) fn parse_enum<T>(
    column: &str,
    value: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T, RepositoryError> {
    parse(value).ok_or_else(|| RepositoryError::Decode(format!("unknown {column} `{value}`")))
}

/// Maps unique-constraint failures to `Conflict`; everything else stays a database error.
pub(crate) fn map_write_error(error: sqlx::Error, what: &str) -> RepositoryError {
    match &error {
        sqlx::Error::Database(database) if database.is_unique_violation() => {
            RepositoryError::Conflict(format!("{what}: {}", database.message()))
        }
        _ => RepositoryError::Database(error),
    }
}
