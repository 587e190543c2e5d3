// 🗄️ Schema & Audit Trail
//
// Four master tables keyed by surrogate id, a per-prefix serial sequence
// table, the seeded classification table, and an append-only event log.

use crate::classification::CLASSIFICATION_TYPES;
use crate::entities::EntityKind;
use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

/// Event for audit trail: one row per create/update/status change/delete
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: i64,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        kind: EntityKind,
        entity_id: i64,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: kind.as_str().to_string(),
            entity_id,
            data,
            actor: actor.to_string(),
        }
    }
}

/// Connection-level settings plus every table and index. Idempotent.
pub fn setup_database(conn: &Connection, wal: bool) -> Result<()> {
    if wal {
        // In-memory databases answer "memory" and stay that way
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!(journal_mode = %mode, "journal mode set");
    }
    conn.pragma_update(None, "foreign_keys", true)?;

    // ==========================================================================
    // Classification types (seeded, read-only)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS classification_types (
            code TEXT PRIMARY KEY CHECK (length(code) = 2),
            label TEXT NOT NULL UNIQUE
        )",
        [],
    )?;

    for ty in CLASSIFICATION_TYPES {
        conn.execute(
            "INSERT OR IGNORE INTO classification_types (code, label) VALUES (?1, ?2)",
            params![ty.code, ty.label],
        )?;
    }

    // ==========================================================================
    // Ledger groups
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS ledger_groups (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            classification_code TEXT NOT NULL
                REFERENCES classification_types(code) ON DELETE RESTRICT,
            code TEXT NOT NULL UNIQUE CHECK (length(code) = 2),
            status TEXT NOT NULL DEFAULT 'Active' CHECK (status IN ('Active', 'Inactive')),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Ledger accounts
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS ledger_accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            group_id INTEGER NOT NULL REFERENCES ledger_groups(id) ON DELETE RESTRICT,
            code TEXT NOT NULL UNIQUE,
            code_prefix TEXT NOT NULL,
            code_serial INTEGER NOT NULL CHECK (code_serial BETWEEN 1 AND 999),
            opening_balance TEXT NOT NULL DEFAULT '0',
            balance_side TEXT NOT NULL CHECK (balance_side IN ('Debit', 'Credit')),
            status TEXT NOT NULL DEFAULT 'Active' CHECK (status IN ('Active', 'Inactive')),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (code_prefix, code_serial)
        )",
        [],
    )?;

    // ==========================================================================
    // Trading partners (same code scheme, own namespace, contact block)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS trading_partners (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            group_id INTEGER NOT NULL REFERENCES ledger_groups(id) ON DELETE RESTRICT,
            code TEXT NOT NULL UNIQUE,
            code_prefix TEXT NOT NULL,
            code_serial INTEGER NOT NULL CHECK (code_serial BETWEEN 1 AND 999),
            opening_balance TEXT NOT NULL DEFAULT '0',
            balance_side TEXT NOT NULL CHECK (balance_side IN ('Debit', 'Credit')),
            status TEXT NOT NULL DEFAULT 'Active' CHECK (status IN ('Active', 'Inactive')),
            address TEXT,
            city TEXT,
            phone TEXT,
            email TEXT,
            tax_id TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (code_prefix, code_serial)
        )",
        [],
    )?;

    // ==========================================================================
    // Fiscal periods (ISO dates: text order == date order)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS fiscal_periods (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE CHECK (length(code) BETWEEN 1 AND 6),
            label TEXT NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'Active' CHECK (status IN ('Active', 'Inactive')),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            CHECK (start_date < end_date)
        )",
        [],
    )?;

    // ==========================================================================
    // Code sequences: last serial handed out per (table, prefix)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS code_sequences (
            scope TEXT NOT NULL,
            prefix TEXT NOT NULL,
            last_serial INTEGER NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (scope, prefix)
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id INTEGER NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_accounts_group ON ledger_accounts(group_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_partners_group ON trading_partners(group_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_periods_start ON fiscal_periods(start_date)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp,
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Events for one entity, oldest first
pub fn get_events_for_entity(
    conn: &Connection,
    kind: EntityKind,
    entity_id: i64,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY id ASC",
    )?;

    let events = stmt
        .query_map(params![kind.as_str(), entity_id], |row| {
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: row.get(1)?,
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        5,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?,
                actor: row.get(6)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(events)
}

/// Row count of one master table
pub fn count_rows(conn: &Connection, kind: EntityKind) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", kind.table());
    let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;

    Ok(count)
}
