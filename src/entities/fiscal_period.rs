// 📅 Fiscal Period - a named, closed date range [start_date, end_date]
//
// Invariants (enforced by `FiscalPeriodValidator` on every write):
// - start_date < end_date
// - no two periods share a single day

use super::{validate_name, EntityKind, MasterEntity, Status};
use crate::error::{MasterDataError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

pub const MAX_PERIOD_CODE_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiscalPeriod {
    pub id: i64,
    /// Operator-supplied, e.g. "FY2324"
    pub code: String,
    pub label: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FiscalPeriod {
    /// Closed-interval membership
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    /// Number of calendar days covered, both ends included
    pub fn length_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }
}

impl MasterEntity for FiscalPeriod {
    const KIND: EntityKind = EntityKind::FiscalPeriod;
    const COLUMNS: &'static str =
        "id, code, label, start_date, end_date, status, created_at, updated_at";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(FiscalPeriod {
            id: row.get(0)?,
            code: row.get(1)?,
            label: row.get(2)?,
            start_date: row.get(3)?,
            end_date: row.get(4)?,
            status: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn code(&self) -> &str {
        &self.code
    }

    fn status(&self) -> Status {
        self.status
    }
}

/// Editable fields; the period code stays fixed after creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiscalPeriodUpdate {
    pub label: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub status: Status,
}

impl From<&FiscalPeriod> for FiscalPeriodUpdate {
    fn from(period: &FiscalPeriod) -> Self {
        FiscalPeriodUpdate {
            label: period.label.clone(),
            start_date: period.start_date,
            end_date: period.end_date,
            status: period.status,
        }
    }
}

/// Trimmed, 1 to 6 characters, case preserved
pub fn normalize_period_code(raw: &str) -> Result<String> {
    let code = raw.trim();
    if code.is_empty() {
        return Err(MasterDataError::validation("code", "required field is empty"));
    }
    if code.chars().count() > MAX_PERIOD_CODE_LEN {
        return Err(MasterDataError::validation(
            "code",
            format!(
                "'{}' is longer than {} characters",
                code, MAX_PERIOD_CODE_LEN
            ),
        ));
    }
    if code.chars().any(char::is_whitespace) {
        return Err(MasterDataError::validation(
            "code",
            format!("'{}' must not contain spaces", code),
        ));
    }
    Ok(code.to_string())
}

pub fn validate_label(raw: &str) -> Result<String> {
    validate_name("label", raw)
}
