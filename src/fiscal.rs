// ⏰ Fiscal Period Validator - start < end, and no two periods share a day
//
// Periods are closed intervals. [s1, e1] and [s2, e2] overlap iff
//     s1 <= e2 AND s2 <= e1
// Adjacent periods (e1 + 1 day == s2) do not overlap.

use crate::entities::{EntityKind, FiscalPeriod, MasterEntity};
use crate::error::{MasterDataError, Result};
use crate::guard::UniquenessGuard;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

/// Canonical closed-interval overlap predicate
pub fn overlaps(
    a_start: NaiveDate,
    a_end: NaiveDate,
    b_start: NaiveDate,
    b_end: NaiveDate,
) -> bool {
    a_start <= b_end && b_start <= a_end
}

/// Rejects iff `start >= end`
pub fn validate_range(start: NaiveDate, end: NaiveDate) -> Result<()> {
    if start >= end {
        return Err(MasterDataError::InvalidRange { start, end });
    }
    Ok(())
}

pub struct FiscalPeriodValidator;

impl FiscalPeriodValidator {
    /// Full write-time check, in order: range, overlap, code uniqueness.
    ///
    /// `exclude_id` is the period being edited, if any. Run inside the
    /// write transaction that persists the period.
    pub fn validate(
        conn: &Connection,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
        exclude_id: Option<i64>,
    ) -> Result<()> {
        Self::validate_dates(conn, start, end, exclude_id)?;
        UniquenessGuard::reserve(conn, EntityKind::FiscalPeriod, code, exclude_id)
    }

    /// Range and overlap only. Edits use this directly since the stored
    /// code cannot change.
    pub fn validate_dates(
        conn: &Connection,
        start: NaiveDate,
        end: NaiveDate,
        exclude_id: Option<i64>,
    ) -> Result<()> {
        validate_range(start, end)?;

        if let Some(conflicting) = Self::find_overlap(conn, start, end, exclude_id)? {
            tracing::warn!(
                start = %start,
                end = %end,
                conflicting = %conflicting.code,
                "fiscal period overlap"
            );
            return Err(MasterDataError::Overlap {
                conflicting: Box::new(conflicting),
            });
        }

        Ok(())
    }

    /// First period (by start date) sharing at least one day with
    /// [start, end]. Inactive periods count too.
    pub fn find_overlap(
        conn: &Connection,
        start: NaiveDate,
        end: NaiveDate,
        exclude_id: Option<i64>,
    ) -> Result<Option<FiscalPeriod>> {
        // ISO dates stored as text: text order is date order
        let sql = format!(
            "SELECT {} FROM fiscal_periods
             WHERE start_date <= ?2 AND ?1 <= end_date AND (?3 IS NULL OR id <> ?3)
             ORDER BY start_date, id
             LIMIT 1",
            FiscalPeriod::COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![start, end, exclude_id], FiscalPeriod::from_row)
            .optional()?)
    }

    /// Period whose closed interval contains `date`
    pub fn containing(conn: &Connection, date: NaiveDate) -> Result<Option<FiscalPeriod>> {
        Self::find_overlap(conn, date, date, None)
    }
}
