// 📚 Generic Repository - reads, listings, status changes and deletes
//
// Written once over `MasterEntity`; works for all four entity kinds.
// Creates and updates differ per kind and live in `store`.

use crate::entities::{EntityKind, MasterEntity, Status};
use crate::error::{MasterDataError, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

pub fn find_by_id<E: MasterEntity>(conn: &Connection, id: i64) -> Result<Option<E>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE id = ?1",
        E::COLUMNS,
        E::KIND.table()
    );
    Ok(conn.query_row(&sql, [id], E::from_row).optional()?)
}

pub fn get_by_id<E: MasterEntity>(conn: &Connection, id: i64) -> Result<E> {
    find_by_id(conn, id)?.ok_or(MasterDataError::NotFound { kind: E::KIND, id })
}

pub fn find_by_code<E: MasterEntity>(conn: &Connection, code: &str) -> Result<Option<E>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE code = ?1",
        E::COLUMNS,
        E::KIND.table()
    );
    Ok(conn.query_row(&sql, [code], E::from_row).optional()?)
}

/// Every row, ordered by code
pub fn list_all<E: MasterEntity>(conn: &Connection) -> Result<Vec<E>> {
    list(conn, None)
}

/// Active rows only (what dependent dropdowns show), ordered by code
pub fn list_active<E: MasterEntity>(conn: &Connection) -> Result<Vec<E>> {
    list(conn, Some(Status::Active))
}

fn list<E: MasterEntity>(conn: &Connection, status: Option<Status>) -> Result<Vec<E>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE (?1 IS NULL OR status = ?1) ORDER BY code",
        E::COLUMNS,
        E::KIND.table()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([status], E::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Flip Active/Inactive. Codes and allocation state are untouched.
pub fn set_status(conn: &Connection, kind: EntityKind, id: i64, status: Status) -> Result<()> {
    let sql = format!(
        "UPDATE {} SET status = ?1, updated_at = ?2 WHERE id = ?3",
        kind.table()
    );
    let changed = conn.execute(&sql, params![status, Utc::now(), id])?;
    if changed == 0 {
        return Err(MasterDataError::NotFound { kind, id });
    }
    Ok(())
}

/// Remove the row. No reference checks here; see `MasterStore::delete_entity`.
pub fn delete(conn: &Connection, kind: EntityKind, id: i64) -> Result<()> {
    let sql = format!("DELETE FROM {} WHERE id = ?1", kind.table());
    let changed = conn.execute(&sql, [id])?;
    if changed == 0 {
        return Err(MasterDataError::NotFound { kind, id });
    }
    Ok(())
}

/// Code of any entity by id, without loading the whole row
pub fn code_of(conn: &Connection, kind: EntityKind, id: i64) -> Result<String> {
    let sql = format!("SELECT code FROM {} WHERE id = ?1", kind.table());
    conn.query_row(&sql, [id], |row| row.get(0))
        .optional()?
        .ok_or(MasterDataError::NotFound { kind, id })
}

/// How many `referencing` rows point at group `group_id`
pub fn count_group_references(
    conn: &Connection,
    referencing: EntityKind,
    group_id: i64,
) -> Result<i64> {
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE group_id = ?1",
        referencing.table()
    );
    Ok(conn.query_row(&sql, [group_id], |row| row.get(0))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::setup_database;
    use crate::entities::{FiscalPeriod, LedgerGroup};

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn, false).unwrap();
        for (id, name, code, status) in [
            (1, "Sales", "SA", "Active"),
            (2, "Purchases", "PU", "Inactive"),
            (3, "Bank Accounts", "BA", "Active"),
        ] {
            conn.execute(
                "INSERT INTO ledger_groups (id, name, classification_code, code, status, created_at, updated_at)
                 VALUES (?1, ?2, 'TR', ?3, ?4, '2024-01-01 00:00:00', '2024-01-01 00:00:00')",
                params![id, name, code, status],
            )
            .unwrap();
        }
        conn
    }

    #[test]
    fn test_get_by_id() {
        let conn = test_conn();
        let group: LedgerGroup = get_by_id(&conn, 1).unwrap();
        assert_eq!(group.code, "SA");
        assert_eq!(group.status, Status::Active);

        match get_by_id::<LedgerGroup>(&conn, 99) {
            Err(MasterDataError::NotFound { kind, id }) => {
                assert_eq!(kind, EntityKind::Group);
                assert_eq!(id, 99);
            }
            other => panic!("expected not found, got {:?}", other),
        }
    }

    #[test]
    fn test_find_by_code() {
        let conn = test_conn();
        let group: Option<LedgerGroup> = find_by_code(&conn, "PU").unwrap();
        assert_eq!(group.map(|g| g.id), Some(2));
        assert!(find_by_code::<LedgerGroup>(&conn, "ZZ").unwrap().is_none());
    }

    #[test]
    fn test_list_all_vs_active() {
        let conn = test_conn();

        let all: Vec<LedgerGroup> = list_all(&conn).unwrap();
        let codes: Vec<&str> = all.iter().map(|g| g.code.as_str()).collect();
        assert_eq!(codes, vec!["BA", "PU", "SA"]);

        let active: Vec<LedgerGroup> = list_active(&conn).unwrap();
        assert_eq!(active.len(), 2);
        assert!(active.iter().all(|g| g.status.is_active()));
    }

    #[test]
    fn test_set_status_round_trip() {
        let conn = test_conn();

        set_status(&conn, EntityKind::Group, 2, Status::Active).unwrap();
        assert_eq!(list_active::<LedgerGroup>(&conn).unwrap().len(), 3);

        set_status(&conn, EntityKind::Group, 2, Status::Inactive).unwrap();
        assert_eq!(list_active::<LedgerGroup>(&conn).unwrap().len(), 2);

        assert!(set_status(&conn, EntityKind::Group, 42, Status::Active).is_err());
    }

    #[test]
    fn test_delete() {
        let conn = test_conn();
        delete(&conn, EntityKind::Group, 3).unwrap();
        assert!(find_by_id::<LedgerGroup>(&conn, 3).unwrap().is_none());

        match delete(&conn, EntityKind::Group, 3) {
            Err(MasterDataError::NotFound { .. }) => {}
            other => panic!("expected not found, got {:?}", other),
        }
    }

    #[test]
    fn test_code_of() {
        let conn = test_conn();
        assert_eq!(code_of(&conn, EntityKind::Group, 3).unwrap(), "BA");
        assert!(code_of(&conn, EntityKind::Account, 3).is_err());
    }

    #[test]
    fn test_empty_listing() {
        let conn = test_conn();
        let periods: Vec<FiscalPeriod> = list_all(&conn).unwrap();
        assert!(periods.is_empty());
    }
}
