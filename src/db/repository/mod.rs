//! Repository layer — table-scoped database operations.
//!
//! Functions take a borrowed `Connection`; the caller decides how
//! connections are opened and shared.

mod appointment;
mod bill;
mod doctor;
mod patient;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;

use super::DatabaseError;

pub use appointment::*;
pub use bill::*;
pub use doctor::*;
pub use patient::*;

pub(crate) fn parse_uuid(field: &str, value: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(value).map_err(|_| invalid_value(field, value))
}

pub(crate) fn parse_date(field: &str, value: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| invalid_value(field, value))
}

/// Accepts `HH:MM:SS` (optionally fractional) and `HH:MM`.
pub(crate) fn parse_time(field: &str, value: &str) -> Result<NaiveTime, DatabaseError> {
    NaiveTime::parse_from_str(value, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|_| invalid_value(field, value))
}

/// Timestamps are written by SQLite as `YYYY-MM-DD HH:MM:SS.SSS`.
pub(crate) fn parse_timestamp(field: &str, value: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f"))
        .map_err(|_| invalid_value(field, value))
}

fn invalid_value(field: &str, value: &str) -> DatabaseError {
    DatabaseError::InvalidValue {
        field: field.into(),
        value: value.into(),
    }
}

/// Constraint failures on writes are reported as `ConstraintViolation`.
pub(crate) fn map_write_error(e: rusqlite::Error) -> DatabaseError {
    match &e {
        rusqlite::Error::SqliteFailure(err, msg)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            DatabaseError::ConstraintViolation(msg.clone().unwrap_or_else(|| e.to_string()))
        }
        _ => DatabaseError::Sqlite(e),
    }
}
