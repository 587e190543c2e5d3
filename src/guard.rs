// 🛡️ Uniqueness Guard - exact-match check on a code before it is written
//
// For operator-supplied codes (group codes, fiscal period codes) this is the
// only check. For derived codes it runs again after allocation. Collisions
// that slip past both and surface as UNIQUE violations at insert time are
// reported as retryable conflicts.

use crate::entities::EntityKind;
use crate::error::{MasterDataError, Result};
use rusqlite::{ffi, params, Connection};

pub struct UniquenessGuard;

impl UniquenessGuard {
    /// True when no row of `kind` other than `exclude_id` holds `code`
    pub fn is_available(
        conn: &Connection,
        kind: EntityKind,
        code: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool> {
        let sql = format!(
            "SELECT EXISTS (
                SELECT 1 FROM {} WHERE code = ?1 AND (?2 IS NULL OR id <> ?2)
             )",
            kind.table()
        );
        let taken: bool = conn.query_row(&sql, params![code, exclude_id], |row| row.get(0))?;
        Ok(!taken)
    }

    /// Fail with a (non-retryable) conflict if `code` is taken
    pub fn reserve(
        conn: &Connection,
        kind: EntityKind,
        code: &str,
        exclude_id: Option<i64>,
    ) -> Result<()> {
        if Self::is_available(conn, kind, code, exclude_id)? {
            Ok(())
        } else {
            tracing::warn!(kind = %kind, code, "code already in use");
            Err(MasterDataError::Conflict {
                table: kind.table(),
                code: code.to_string(),
                retryable: false,
            })
        }
    }
}

/// Translate a failed INSERT/UPDATE on `kind` into the error taxonomy.
///
/// - UNIQUE violation → retryable `Conflict` on `code`
/// - FOREIGN KEY violation → `Validation` on `parent_field`
/// - anything else → `Database`
pub fn classify_write_error(
    err: rusqlite::Error,
    kind: EntityKind,
    code: &str,
    parent_field: &str,
) -> MasterDataError {
    if let rusqlite::Error::SqliteFailure(ref failure, _) = err {
        match failure.extended_code {
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                return MasterDataError::Conflict {
                    table: kind.table(),
                    code: code.to_string(),
                    retryable: true,
                };
            }
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                return MasterDataError::validation(parent_field, "referenced record does not exist");
            }
            _ => {}
        }
    }
    MasterDataError::Database(err)
}
