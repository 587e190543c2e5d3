// 📁 Ledger Group - classification bucket that accounts and partners hang off
//
// The group code is typed in by the operator (exactly 2 alphanumerics,
// stored uppercase). Its two characters become the "type" segment of every
// code derived for accounts and partners under this group.

use super::{EntityKind, MasterEntity, Status};
use crate::error::{MasterDataError, Result};
use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

pub const GROUP_CODE_LEN: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerGroup {
    pub id: i64,
    pub name: String,
    /// Two-letter classification code (see `ClassificationRegistry`)
    pub classification: String,
    /// Operator-supplied, uppercase, immutable
    pub code: String,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LedgerGroup {
    /// Segment borrowed by derived account/partner codes
    pub fn type_segment(&self) -> &str {
        self.code.get(..GROUP_CODE_LEN).unwrap_or(&self.code)
    }
}

impl MasterEntity for LedgerGroup {
    const KIND: EntityKind = EntityKind::Group;
    const COLUMNS: &'static str =
        "id, name, classification_code, code, status, created_at, updated_at";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(LedgerGroup {
            id: row.get(0)?,
            name: row.get(1)?,
            classification: row.get(2)?,
            code: row.get(3)?,
            status: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
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

/// Editable fields. The group code is deliberately absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupUpdate {
    pub name: String,
    /// Classification label or code
    pub classification: String,
    #[serde(default)]
    pub status: Status,
}

/// Check format (exactly 2 ASCII alphanumerics) and normalize to uppercase
pub fn normalize_group_code(raw: &str) -> Result<String> {
    let code = raw.trim();
    if code.is_empty() {
        return Err(MasterDataError::validation("group_code", "required field is empty"));
    }
    if code.chars().count() != GROUP_CODE_LEN {
        return Err(MasterDataError::validation(
            "group_code",
            format!("must be exactly {} characters, got '{}'", GROUP_CODE_LEN, code),
        ));
    }
    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(MasterDataError::validation(
            "group_code",
            format!("'{}' must contain only letters and digits", code),
        ));
    }
    Ok(code.to_ascii_uppercase())
}
