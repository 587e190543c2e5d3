// ⚠️ Error Taxonomy - every failure the engine can report to its caller
//
// All variants are recoverable at the call boundary: the caller surfaces the
// message and lets the operator correct the input or retry.

use crate::entities::{EntityKind, FiscalPeriod};
use chrono::NaiveDate;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MasterDataError>;

#[derive(Debug, Error)]
pub enum MasterDataError {
    /// Missing or malformed required field
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Code already taken in `table`.
    ///
    /// `retryable` is set when the collision surfaced as an insert-time
    /// constraint violation, i.e. another writer won the race.
    #[error("code {code} already exists in {table}")]
    Conflict {
        table: &'static str,
        code: String,
        retryable: bool,
    },

    #[error(
        "date range overlaps fiscal period {} ({}, {} to {})",
        .conflicting.code, .conflicting.label, .conflicting.start_date, .conflicting.end_date
    )]
    Overlap { conflicting: Box<FiscalPeriod> },

    #[error("start date {start} must be before end date {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("no serials left for prefix {prefix} (limit {limit})")]
    Capacity { prefix: String, limit: u32 },

    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: i64 },

    /// Delete refused because other rows still point at the entity
    #[error("{kind} {id} is still referenced by {count} {referenced_by}")]
    Referenced {
        kind: EntityKind,
        id: i64,
        referenced_by: EntityKind,
        count: i64,
    },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl MasterDataError {
    /// Shorthand for field validation failures
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        MasterDataError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True when repeating the same operation may succeed without any
    /// change to the input (lost allocation race, busy database).
    pub fn is_retryable(&self) -> bool {
        match self {
            MasterDataError::Conflict { retryable, .. } => *retryable,
            MasterDataError::Database(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }

    /// Short machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            MasterDataError::Validation { .. } => "validation",
            MasterDataError::Conflict { .. } => "conflict",
            MasterDataError::Overlap { .. } => "overlap",
            MasterDataError::InvalidRange { .. } => "range",
            MasterDataError::Capacity { .. } => "capacity",
            MasterDataError::NotFound { .. } => "not_found",
            MasterDataError::Referenced { .. } => "referenced",
            MasterDataError::Database(_) => "database",
        }
    }
}
