// 🔢 Code Allocator - short, human-readable, collision-free codes
//
// code = first letter of name + 2-char type code + 3-digit serial
//        "Sales" + "TA" → "STA001", "STA002", ...
//
// Serials are scoped to (table, prefix). Two strategies:
// - Sequence: explicit last_serial row per prefix, advanced in the caller's
//   transaction. Deleted codes are never handed out again.
// - ScanMax: next = highest stored serial + 1. Deleting the highest row and
//   allocating again reissues the deleted code.

use crate::entities::EntityKind;
use crate::error::{MasterDataError, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const SERIAL_DIGITS: usize = 3;
pub const MAX_SERIAL: u32 = 999;
pub const TYPE_CODE_LEN: usize = 2;

/// Stands in for names that do not start with an ASCII letter or digit
pub const FALLBACK_LETTER: char = 'X';

// ============================================================================
// STRATEGY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStrategy {
    #[default]
    Sequence,
    ScanMax,
}

impl fmt::Display for AllocationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocationStrategy::Sequence => f.write_str("sequence"),
            AllocationStrategy::ScanMax => f.write_str("scan_max"),
        }
    }
}

impl FromStr for AllocationStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "sequence" => Ok(AllocationStrategy::Sequence),
            "scan_max" | "scan" => Ok(AllocationStrategy::ScanMax),
            other => Err(format!(
                "unknown allocation strategy '{}' (expected sequence or scan_max)",
                other
            )),
        }
    }
}

// ============================================================================
// CODE DERIVATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocatedCode {
    pub prefix: String,
    pub serial: u32,
    pub code: String,
}

/// Exactly 2 ASCII alphanumerics, uppercased
pub fn normalize_type_code(raw: &str) -> Result<String> {
    let code = raw.trim();
    if code.chars().count() != TYPE_CODE_LEN || !code.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(MasterDataError::validation(
            "type_code",
            format!(
                "must be exactly {} letters or digits, got '{}'",
                TYPE_CODE_LEN, code
            ),
        ));
    }
    Ok(code.to_ascii_uppercase())
}

/// `upper(name[0]) + type_code`, always 3 characters from [A-Z0-9]
pub fn derive_prefix(name: &str, type_code: &str) -> Result<String> {
    let type_code = normalize_type_code(type_code)?;
    let first = name
        .trim()
        .chars()
        .next()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .unwrap_or(FALLBACK_LETTER);

    Ok(format!("{}{}", first, type_code))
}

pub fn format_code(prefix: &str, serial: u32) -> String {
    format!("{}{:0width$}", prefix, serial, width = SERIAL_DIGITS)
}

// ============================================================================
// ALLOCATOR
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct CodeAllocator {
    strategy: AllocationStrategy,
}

impl CodeAllocator {
    pub fn new(strategy: AllocationStrategy) -> Self {
        CodeAllocator { strategy }
    }

    pub fn strategy(&self) -> AllocationStrategy {
        self.strategy
    }

    /// Hand out the next code under `name`/`type_code` for `kind`.
    ///
    /// Must run inside the same write transaction as the insert that uses
    /// the code; with `Sequence` the counter row is advanced here.
    pub fn allocate(
        &self,
        conn: &Connection,
        kind: EntityKind,
        name: &str,
        type_code: &str,
    ) -> Result<AllocatedCode> {
        let allocated = self.next_code(conn, kind, name, type_code)?;

        if self.strategy == AllocationStrategy::Sequence {
            conn.execute(
                "INSERT INTO code_sequences (scope, prefix, last_serial, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (scope, prefix)
                 DO UPDATE SET last_serial = excluded.last_serial, updated_at = excluded.updated_at",
                params![kind.table(), allocated.prefix, allocated.serial, Utc::now()],
            )?;
        }

        tracing::debug!(
            kind = %kind,
            code = %allocated.code,
            strategy = %self.strategy,
            "allocated code"
        );

        Ok(allocated)
    }

    /// The code `allocate` would return right now, without consuming it
    pub fn preview(
        &self,
        conn: &Connection,
        kind: EntityKind,
        name: &str,
        type_code: &str,
    ) -> Result<AllocatedCode> {
        self.next_code(conn, kind, name, type_code)
    }

    fn next_code(
        &self,
        conn: &Connection,
        kind: EntityKind,
        name: &str,
        type_code: &str,
    ) -> Result<AllocatedCode> {
        if !kind.has_derived_code() {
            return Err(MasterDataError::validation(
                "kind",
                format!("{} codes are supplied by the operator", kind),
            ));
        }

        let prefix = derive_prefix(name, type_code)?;
        let highest = highest_serial(conn, kind, &prefix)?;

        let last = match self.strategy {
            AllocationStrategy::ScanMax => highest,
            AllocationStrategy::Sequence => highest.max(sequence_value(conn, kind, &prefix)?),
        };

        let serial = last + 1;
        if serial > MAX_SERIAL {
            return Err(MasterDataError::Capacity {
                prefix,
                limit: MAX_SERIAL,
            });
        }

        Ok(AllocatedCode {
            code: format_code(&prefix, serial),
            prefix,
            serial,
        })
    }
}

/// Highest serial currently stored under `prefix` (0 when none).
///
/// Same answer as `code LIKE prefix || '%' ORDER BY code DESC LIMIT 1`
/// because serials are fixed-width, but read from the integer column.
pub fn highest_serial(conn: &Connection, kind: EntityKind, prefix: &str) -> Result<u32> {
    let sql = format!(
        "SELECT COALESCE(MAX(code_serial), 0) FROM {} WHERE code_prefix = ?1",
        kind.table()
    );
    let highest: u32 = conn.query_row(&sql, [prefix], |row| row.get(0))?;
    Ok(highest)
}

/// Last serial recorded in `code_sequences` (0 when the prefix is new)
pub fn sequence_value(conn: &Connection, kind: EntityKind, prefix: &str) -> Result<u32> {
    let last: Option<u32> = conn
        .query_row(
            "SELECT last_serial FROM code_sequences WHERE scope = ?1 AND prefix = ?2",
            params![kind.table(), prefix],
            |row| row.get(0),
        )
        .optional()?;
    Ok(last.unwrap_or(0))
}

// ============================================================================
// TESTS
// ============================================================================
