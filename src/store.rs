// 🏪 Master Entity Store - validated create/update/delete over the four kinds
//
// Write path for every kind:
//   validate fields → BEGIN IMMEDIATE → (allocate) → guard → write → audit → COMMIT
//
// BEGIN IMMEDIATE takes the write lock before the first read, so the
// allocate-then-insert and overlap-check-then-insert sequences cannot
// interleave with another writer.

use crate::allocator::{AllocatedCode, AllocationStrategy, CodeAllocator};
use crate::classification::ClassificationRegistry;
use crate::config::StoreConfig;
use crate::db::{get_events_for_entity, insert_event, setup_database, Event};
use crate::entities::fiscal_period::{normalize_period_code, validate_label};
use crate::entities::group::normalize_group_code;
use crate::entities::{
    validate_name, AccountUpdate, EntityKind, FiscalPeriod, FiscalPeriodUpdate, GroupUpdate,
    LedgerAccount, LedgerGroup, MasterEntity, NewAccount, NewPartner, PartnerUpdate, Status,
    TradingPartner,
};
use crate::error::{MasterDataError, Result};
use crate::fiscal::FiscalPeriodValidator;
use crate::guard::{classify_write_error, UniquenessGuard};
use crate::repository;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Field set for `update_entity`, one variant per kind
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityUpdate {
    Group(GroupUpdate),
    Account(AccountUpdate),
    Partner(PartnerUpdate),
    FiscalPeriod(FiscalPeriodUpdate),
}

impl EntityUpdate {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityUpdate::Group(_) => EntityKind::Group,
            EntityUpdate::Account(_) => EntityKind::Account,
            EntityUpdate::Partner(_) => EntityKind::Partner,
            EntityUpdate::FiscalPeriod(_) => EntityKind::FiscalPeriod,
        }
    }
}

pub struct MasterStore {
    conn: Connection,
    allocator: CodeAllocator,
    registry: ClassificationRegistry,
    max_retries: u32,
    actor: String,
}

impl MasterStore {
    /// Open (creating if needed) the database named in `config`
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let conn = Connection::open(&config.database_path)?;
        Self::with_connection(conn, config)
    }

    pub fn open_in_memory(config: &StoreConfig) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, config)
    }

    pub fn with_connection(conn: Connection, config: &StoreConfig) -> Result<Self> {
        conn.busy_timeout(config.busy_timeout())?;
        setup_database(&conn, config.wal)?;

        tracing::debug!(
            strategy = %config.allocation_strategy,
            actor = %config.actor,
            "master store ready"
        );

        Ok(MasterStore {
            conn,
            allocator: CodeAllocator::new(config.allocation_strategy),
            registry: ClassificationRegistry::new(),
            max_retries: config.max_allocation_retries,
            actor: config.actor.clone(),
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn registry(&self) -> &ClassificationRegistry {
        &self.registry
    }

    pub fn allocation_strategy(&self) -> AllocationStrategy {
        self.allocator.strategy()
    }

    // ========================================================================
    // LEDGER GROUPS
    // ========================================================================

    /// Group code is operator-supplied: format check, uppercase, guard
    pub fn create_group(
        &mut self,
        name: &str,
        classification: &str,
        group_code: &str,
    ) -> Result<i64> {
        let name = validate_name("name", name)?;
        let classification = self.registry.resolve(classification)?;
        let code = normalize_group_code(group_code)?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        UniquenessGuard::reserve(&tx, EntityKind::Group, &code, None)?;

        let now = Utc::now();
        tx.execute(
            "INSERT INTO ledger_groups (name, classification_code, code, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![name, classification, code, Status::Active, now],
        )
        .map_err(|e| classify_write_error(e, EntityKind::Group, &code, "classification"))?;
        let id = tx.last_insert_rowid();

        record(
            &tx,
            &self.actor,
            "created",
            EntityKind::Group,
            id,
            json!({ "code": code, "name": name, "classification": classification }),
        )?;
        tx.commit()?;

        tracing::info!(id, code = %code, "ledger group created");
        Ok(id)
    }

    pub fn update_group(&mut self, id: i64, update: &GroupUpdate) -> Result<()> {
        let name = validate_name("name", &update.name)?;
        let classification = self.registry.resolve(&update.classification)?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current: LedgerGroup = repository::get_by_id(&tx, id)?;

        tx.execute(
            "UPDATE ledger_groups
             SET name = ?1, classification_code = ?2, status = ?3, updated_at = ?4
             WHERE id = ?5",
            params![name, classification, update.status, Utc::now(), id],
        )
        .map_err(|e| classify_write_error(e, EntityKind::Group, &current.code, "classification"))?;

        record(
            &tx,
            &self.actor,
            "updated",
            EntityKind::Group,
            id,
            json!({ "name": name, "classification": classification, "status": update.status }),
        )?;
        tx.commit()?;

        tracing::info!(id, code = %current.code, "ledger group updated");
        Ok(())
    }

    pub fn find_group_by_code(&self, code: &str) -> Result<Option<LedgerGroup>> {
        repository::find_by_code(&self.conn, &code.trim().to_ascii_uppercase())
    }

    // ========================================================================
    // LEDGER ACCOUNTS & TRADING PARTNERS (derived codes)
    // ========================================================================

    /// Returns `(code, id)`
    pub fn allocate_and_create_account(&mut self, input: &NewAccount) -> Result<(String, i64)> {
        let name = input.validate()?;

        self.create_coded(EntityKind::Account, &name, input.group_id, |conn, code, now| {
            conn.execute(
                "INSERT INTO ledger_accounts
                    (name, group_id, code, code_prefix, code_serial,
                     opening_balance, balance_side, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
                params![
                    name,
                    input.group_id,
                    code.code,
                    code.prefix,
                    code.serial,
                    input.opening_balance.to_string(),
                    input.balance_side,
                    Status::Active,
                    now,
                ],
            )
            .map(|_| ())
        })
    }

    /// Returns `(code, id)`
    pub fn allocate_and_create_partner(&mut self, input: &NewPartner) -> Result<(String, i64)> {
        let (name, contact) = input.validate()?;

        self.create_coded(EntityKind::Partner, &name, input.group_id, |conn, code, now| {
            conn.execute(
                "INSERT INTO trading_partners
                    (name, group_id, code, code_prefix, code_serial,
                     opening_balance, balance_side, status,
                     address, city, phone, email, tax_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)",
                params![
                    name,
                    input.group_id,
                    code.code,
                    code.prefix,
                    code.serial,
                    input.opening_balance.to_string(),
                    input.balance_side,
                    Status::Active,
                    contact.address,
                    contact.city,
                    contact.phone,
                    contact.email,
                    contact.tax_id,
                    now,
                ],
            )
            .map(|_| ())
        })
    }

    /// Next code a new `kind` row named `name` under `group_id` would get
    pub fn preview_code(&self, kind: EntityKind, name: &str, group_id: i64) -> Result<AllocatedCode> {
        let group = parent_group(&self.conn, group_id)?;
        self.allocator
            .preview(&self.conn, kind, name, group.type_segment())
    }

    pub fn update_account(&mut self, id: i64, update: &AccountUpdate) -> Result<()> {
        let name = update.validate()?;
        let kind = EntityKind::Account;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current: LedgerAccount = repository::get_by_id(&tx, id)?;
        parent_group(&tx, update.group_id)?;

        tx.execute(
            "UPDATE ledger_accounts
             SET name = ?1, group_id = ?2, opening_balance = ?3, balance_side = ?4,
                 status = ?5, updated_at = ?6
             WHERE id = ?7",
            params![
                name,
                update.group_id,
                update.opening_balance.to_string(),
                update.balance_side,
                update.status,
                Utc::now(),
                id,
            ],
        )
        .map_err(|e| classify_write_error(e, kind, &current.code, "group_id"))?;

        record(
            &tx,
            &self.actor,
            "updated",
            kind,
            id,
            json!({
                "name": name,
                "group_id": update.group_id,
                "opening_balance": update.opening_balance,
                "balance_side": update.balance_side,
                "status": update.status,
            }),
        )?;
        tx.commit()?;

        tracing::info!(id, code = %current.code, "ledger account updated");
        Ok(())
    }

    pub fn update_partner(&mut self, id: i64, update: &PartnerUpdate) -> Result<()> {
        let (name, contact) = update.validate()?;
        let kind = EntityKind::Partner;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current: TradingPartner = repository::get_by_id(&tx, id)?;
        parent_group(&tx, update.group_id)?;

        tx.execute(
            "UPDATE trading_partners
             SET name = ?1, group_id = ?2, opening_balance = ?3, balance_side = ?4,
                 status = ?5, address = ?6, city = ?7, phone = ?8, email = ?9, tax_id = ?10,
                 updated_at = ?11
             WHERE id = ?12",
            params![
                name,
                update.group_id,
                update.opening_balance.to_string(),
                update.balance_side,
                update.status,
                contact.address,
                contact.city,
                contact.phone,
                contact.email,
                contact.tax_id,
                Utc::now(),
                id,
            ],
        )
        .map_err(|e| classify_write_error(e, kind, &current.code, "group_id"))?;

        record(
            &tx,
            &self.actor,
            "updated",
            kind,
            id,
            json!({
                "name": name,
                "group_id": update.group_id,
                "opening_balance": update.opening_balance,
                "balance_side": update.balance_side,
                "status": update.status,
                "contact": contact,
            }),
        )?;
        tx.commit()?;

        tracing::info!(id, code = %current.code, "trading partner updated");
        Ok(())
    }

    /// Allocation + insert with bounded retries on retryable conflicts
    fn create_coded<F>(
        &mut self,
        kind: EntityKind,
        name: &str,
        group_id: i64,
        insert: F,
    ) -> Result<(String, i64)>
    where
        F: Fn(&Connection, &AllocatedCode, DateTime<Utc>) -> rusqlite::Result<()>,
    {
        let mut attempt = 0;
        loop {
            match self.try_create_coded(kind, name, group_id, &insert) {
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(kind = %kind, attempt, error = %err, "retrying code allocation");
                }
                result => return result,
            }
        }
    }

    fn try_create_coded<F>(
        &mut self,
        kind: EntityKind,
        name: &str,
        group_id: i64,
        insert: &F,
    ) -> Result<(String, i64)>
    where
        F: Fn(&Connection, &AllocatedCode, DateTime<Utc>) -> rusqlite::Result<()>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let group = parent_group(&tx, group_id)?;
        let allocated = self
            .allocator
            .allocate(&tx, kind, name, group.type_segment())?;
        UniquenessGuard::reserve(&tx, kind, &allocated.code, None)?;

        insert(&tx, &allocated, Utc::now())
            .map_err(|e| classify_write_error(e, kind, &allocated.code, "group_id"))?;
        let id = tx.last_insert_rowid();

        record(
            &tx,
            &self.actor,
            "created",
            kind,
            id,
            json!({ "code": allocated.code, "name": name, "group_id": group_id }),
        )?;
        tx.commit()?;

        tracing::info!(id, code = %allocated.code, kind = %kind, "coded entity created");
        Ok((allocated.code, id))
    }

    // ========================================================================
    // FISCAL PERIODS
    // ========================================================================

    pub fn create_fiscal_period(
        &mut self,
        code: &str,
        label: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<i64> {
        let code = normalize_period_code(code)?;
        let label = validate_label(label)?;
        let kind = EntityKind::FiscalPeriod;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        FiscalPeriodValidator::validate(&tx, &code, start_date, end_date, None)?;

        let now = Utc::now();
        tx.execute(
            "INSERT INTO fiscal_periods (code, label, start_date, end_date, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![code, label, start_date, end_date, Status::Active, now],
        )
        .map_err(|e| classify_write_error(e, kind, &code, "code"))?;
        let id = tx.last_insert_rowid();

        record(
            &tx,
            &self.actor,
            "created",
            kind,
            id,
            json!({ "code": code, "label": label, "start_date": start_date, "end_date": end_date }),
        )?;
        tx.commit()?;

        tracing::info!(id, code = %code, %start_date, %end_date, "fiscal period created");
        Ok(id)
    }

    /// Range re-validated against every other period; the code never changes
    pub fn update_fiscal_period(&mut self, id: i64, update: &FiscalPeriodUpdate) -> Result<()> {
        let label = validate_label(&update.label)?;
        let kind = EntityKind::FiscalPeriod;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current: FiscalPeriod = repository::get_by_id(&tx, id)?;
        FiscalPeriodValidator::validate_dates(&tx, update.start_date, update.end_date, Some(id))?;

        tx.execute(
            "UPDATE fiscal_periods
             SET label = ?1, start_date = ?2, end_date = ?3, status = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                label,
                update.start_date,
                update.end_date,
                update.status,
                Utc::now(),
                id
            ],
        )
        .map_err(|e| classify_write_error(e, kind, &current.code, "code"))?;

        record(
            &tx,
            &self.actor,
            "updated",
            kind,
            id,
            json!({
                "label": label,
                "start_date": update.start_date,
                "end_date": update.end_date,
                "status": update.status,
            }),
        )?;
        tx.commit()?;

        tracing::info!(id, code = %current.code, "fiscal period updated");
        Ok(())
    }

    pub fn period_containing(&self, date: NaiveDate) -> Result<Option<FiscalPeriod>> {
        FiscalPeriodValidator::containing(&self.conn, date)
    }

    // ========================================================================
    // GENERIC OPERATIONS
    // ========================================================================

    pub fn get<E: MasterEntity>(&self, id: i64) -> Result<E> {
        repository::get_by_id(&self.conn, id)
    }

    pub fn list_all<E: MasterEntity>(&self) -> Result<Vec<E>> {
        repository::list_all(&self.conn)
    }

    pub fn list_active<E: MasterEntity>(&self) -> Result<Vec<E>> {
        repository::list_active(&self.conn)
    }

    /// Dispatch to the per-kind update; `fields` must match `kind`
    pub fn update_entity(&mut self, kind: EntityKind, id: i64, fields: &EntityUpdate) -> Result<()> {
        if fields.kind() != kind {
            return Err(MasterDataError::validation(
                "kind",
                format!("{} fields supplied for a {}", fields.kind(), kind),
            ));
        }

        match fields {
            EntityUpdate::Group(update) => self.update_group(id, update),
            EntityUpdate::Account(update) => self.update_account(id, update),
            EntityUpdate::Partner(update) => self.update_partner(id, update),
            EntityUpdate::FiscalPeriod(update) => self.update_fiscal_period(id, update),
        }
    }

    /// Active ⇄ Inactive
    pub fn set_status(&mut self, kind: EntityKind, id: i64, status: Status) -> Result<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        repository::set_status(&tx, kind, id, status)?;
        record(
            &tx,
            &self.actor,
            "status_changed",
            kind,
            id,
            json!({ "status": status }),
        )?;
        tx.commit()?;

        tracing::info!(kind = %kind, id, %status, "status changed");
        Ok(())
    }

    /// Hard delete. Groups still referenced by accounts or partners are
    /// refused with `Referenced`.
    pub fn delete_entity(&mut self, kind: EntityKind, id: i64) -> Result<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let code = repository::code_of(&tx, kind, id)?;

        if kind == EntityKind::Group {
            for referencing in [EntityKind::Account, EntityKind::Partner] {
                let count = repository::count_group_references(&tx, referencing, id)?;
                if count > 0 {
                    tracing::warn!(id, code = %code, count, "refusing to delete referenced group");
                    return Err(MasterDataError::Referenced {
                        kind,
                        id,
                        referenced_by: referencing,
                        count,
                    });
                }
            }
        }

        repository::delete(&tx, kind, id)?;
        record(&tx, &self.actor, "deleted", kind, id, json!({ "code": code }))?;
        tx.commit()?;

        tracing::info!(kind = %kind, id, code = %code, "entity deleted");
        Ok(())
    }

    /// Audit trail of one entity, oldest first
    pub fn history(&self, kind: EntityKind, id: i64) -> Result<Vec<Event>> {
        get_events_for_entity(&self.conn, kind, id)
    }
}

/// Parent group for a new/updated account or partner; a missing group is a
/// field error, not a lookup error
fn parent_group(conn: &Connection, group_id: i64) -> Result<LedgerGroup> {
    repository::find_by_id(conn, group_id)?.ok_or_else(|| {
        MasterDataError::validation(
            "group_id",
            format!("ledger group {} does not exist", group_id),
        )
    })
}

fn record(
    conn: &Connection,
    actor: &str,
    event_type: &str,
    kind: EntityKind,
    id: i64,
    data: serde_json::Value,
) -> Result<()> {
    insert_event(conn, &Event::new(event_type, kind, id, data, actor))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{BalanceSide, PartnerContact};
    use rust_decimal::Decimal;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn store_with(strategy: AllocationStrategy) -> MasterStore {
        let config = StoreConfig {
            allocation_strategy: strategy,
            wal: false,
            actor: "tester".to_string(),
            ..Default::default()
        };
        MasterStore::open_in_memory(&config).unwrap()
    }

    fn store() -> MasterStore {
        store_with(AllocationStrategy::Sequence)
    }

    fn account(name: &str, group_id: i64) -> NewAccount {
        NewAccount::new(name, group_id, Decimal::new(1000, 0), BalanceSide::Debit)
    }

    fn partner(name: &str, group_id: i64) -> NewPartner {
        NewPartner {
            name: name.to_string(),
            group_id,
            opening_balance: Decimal::ZERO,
            balance_side: BalanceSide::Credit,
            contact: PartnerContact {
                city: Some("Pune".to_string()),
                email: Some("accounts@example.in".to_string()),
                ..Default::default()
            },
        }
    }

    // ------------------------------------------------------------------------
    // Groups
    // ------------------------------------------------------------------------

    #[test]
    fn test_create_group_normalizes_code_and_rejects_duplicate() {
        let mut store = store();

        let id = store.create_group("Sales", "Trading", "sa").unwrap();
        let group: LedgerGroup = store.get(id).unwrap();
        assert_eq!(group.code, "SA");
        assert_eq!(group.classification, "TR");

        match store.create_group("Sales Returns", "Trading", "SA") {
            Err(MasterDataError::Conflict { code, table, .. }) => {
                assert_eq!(code, "SA");
                assert_eq!(table, "ledger_groups");
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_create_group_validation() {
        let mut store = store();

        let err = store.create_group("Sales", "Trading", "SAL").unwrap_err();
        assert_eq!(err.kind(), "validation");

        let err = store.create_group("Sales", "Suspense", "SA").unwrap_err();
        assert_eq!(err.kind(), "validation");

        let err = store.create_group("  ", "Trading", "SA").unwrap_err();
        assert_eq!(err.kind(), "validation");

        assert!(store.list_all::<LedgerGroup>().unwrap().is_empty());
    }

    #[test]
    fn test_update_group_keeps_code() {
        let mut store = store();
        let id = store.create_group("Sales", "Trading", "SA").unwrap();

        store
            .update_group(
                id,
                &GroupUpdate {
                    name: "Sales Accounts".to_string(),
                    classification: "Income".to_string(),
                    status: Status::Active,
                },
            )
            .unwrap();

        let group: LedgerGroup = store.get(id).unwrap();
        assert_eq!(group.name, "Sales Accounts");
        assert_eq!(group.classification, "IN");
        assert_eq!(group.code, "SA");
    }

    #[test]
    fn test_find_group_by_code_is_case_insensitive() {
        let mut store = store();
        let id = store.create_group("Sales", "Trading", "SA").unwrap();
        assert_eq!(store.find_group_by_code("sa").unwrap().map(|g| g.id), Some(id));
    }

    // ------------------------------------------------------------------------
    // Accounts & partners
    // ------------------------------------------------------------------------

    #[test]
    fn test_account_codes_follow_group_segment() {
        let mut store = store();
        let group = store.create_group("Trade Accounts", "Trading", "TA").unwrap();

        let (first, first_id) = store
            .allocate_and_create_account(&account("Sales", group))
            .unwrap();
        let (second, _) = store
            .allocate_and_create_account(&account("Service Income", group))
            .unwrap();
        let (other, _) = store
            .allocate_and_create_account(&account("Purchases", group))
            .unwrap();

        assert_eq!(first, "STA001");
        assert_eq!(second, "STA002");
        assert_eq!(other, "PTA001");

        let stored: LedgerAccount = store.get(first_id).unwrap();
        assert_eq!(stored.code, "STA001");
        assert_eq!(stored.code_prefix, "STA");
        assert_eq!(stored.code_serial, 1);
        assert_eq!(stored.opening_balance, Decimal::new(1000, 0));
        assert_eq!(stored.balance_side, BalanceSide::Debit);
    }

    #[test]
    fn test_account_requires_existing_group() {
        let mut store = store();
        match store.allocate_and_create_account(&account("Cash", 77)) {
            Err(MasterDataError::Validation { field, .. }) => assert_eq!(field, "group_id"),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_account_requires_name() {
        let mut store = store();
        let group = store.create_group("Cash", "Assets", "CA").unwrap();
        let err = store.allocate_and_create_account(&account("   ", group)).unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn test_update_account_never_changes_code() {
        let mut store = store();
        let sales = store.create_group("Sales", "Trading", "SA").unwrap();
        let income = store.create_group("Other Income", "Income", "OI").unwrap();
        let (code, id) = store
            .allocate_and_create_account(&account("Scrap Sales", sales))
            .unwrap();

        let mut update = AccountUpdate::from(&store.get::<LedgerAccount>(id).unwrap());
        update.name = "Scrap Income".to_string();
        update.group_id = income;
        update.balance_side = BalanceSide::Credit;
        store.update_account(id, &update).unwrap();

        let stored: LedgerAccount = store.get(id).unwrap();
        assert_eq!(stored.code, code);
        assert_eq!(stored.name, "Scrap Income");
        assert_eq!(stored.group_id, income);
        assert_eq!(stored.balance_side, BalanceSide::Credit);
    }

    #[test]
    fn test_update_missing_account_is_not_found() {
        let mut store = store();
        let group = store.create_group("Sales", "Trading", "SA").unwrap();
        let update = AccountUpdate {
            name: "Ghost".to_string(),
            group_id: group,
            opening_balance: Decimal::ZERO,
            balance_side: BalanceSide::Debit,
            status: Status::Active,
        };
        match store.update_account(404, &update) {
            Err(MasterDataError::NotFound { kind, id }) => {
                assert_eq!(kind, EntityKind::Account);
                assert_eq!(id, 404);
            }
            other => panic!("expected not found, got {:?}", other),
        }
    }

    #[test]
    fn test_partner_codes_and_contact() {
        let mut store = store();
        let debtors = store.create_group("Sundry Debtors", "Assets", "SD").unwrap();

        let (account_code, _) = store
            .allocate_and_create_account(&account("Sales", debtors))
            .unwrap();
        let (partner_code, partner_id) = store
            .allocate_and_create_partner(&partner("Sharma Traders", debtors))
            .unwrap();

        assert_eq!(account_code, "SSD001");
        assert_eq!(partner_code, "SSD001");

        let stored: TradingPartner = store.get(partner_id).unwrap();
        assert_eq!(stored.contact.city.as_deref(), Some("Pune"));
        assert_eq!(stored.balance_side, BalanceSide::Credit);

        let mut update = PartnerUpdate::from(&stored);
        update.contact.phone = Some(" 020-1234567 ".to_string());
        store.update_partner(partner_id, &update).unwrap();

        let updated: TradingPartner = store.get(partner_id).unwrap();
        assert_eq!(updated.contact.phone.as_deref(), Some("020-1234567"));
        assert_eq!(updated.code, "SSD001");
    }

    #[test]
    fn test_preview_matches_next_allocation() {
        let mut store = store();
        let group = store.create_group("Sales", "Trading", "TA").unwrap();
        store.allocate_and_create_account(&account("Sales", group)).unwrap();

        let preview = store.preview_code(EntityKind::Account, "Sundry", group).unwrap();
        assert_eq!(preview.code, "STA002");

        let (code, _) = store.allocate_and_create_account(&account("Sundry", group)).unwrap();
        assert_eq!(code, preview.code);
    }

    #[test]
    fn test_inactive_rows_still_hold_their_serial() {
        let mut store = store();
        let group = store.create_group("Sales", "Trading", "TA").unwrap();
        let (_, id) = store.allocate_and_create_account(&account("Sales", group)).unwrap();

        store.set_status(EntityKind::Account, id, Status::Inactive).unwrap();
        assert!(store.list_active::<LedgerAccount>().unwrap().is_empty());
        assert_eq!(store.list_all::<LedgerAccount>().unwrap().len(), 1);

        let (code, _) = store.allocate_and_create_account(&account("Sales B", group)).unwrap();
        assert_eq!(code, "STA002");

        store.set_status(EntityKind::Account, id, Status::Active).unwrap();
        assert_eq!(store.list_active::<LedgerAccount>().unwrap().len(), 2);
    }

    #[test]
    fn test_scan_max_reissues_deleted_code_through_store() {
        let mut store = store_with(AllocationStrategy::ScanMax);
        let group = store.create_group("Sales", "Trading", "TA").unwrap();
        store.allocate_and_create_account(&account("Sales", group)).unwrap();
        let (deleted, id) = store.allocate_and_create_account(&account("Sales 2", group)).unwrap();

        store.delete_entity(EntityKind::Account, id).unwrap();
        let (again, _) = store.allocate_and_create_account(&account("Sales 3", group)).unwrap();

        assert_eq!(deleted, "STA002");
        assert_eq!(again, "STA002");
    }

    #[test]
    fn test_sequence_skips_deleted_code_through_store() {
        let mut store = store();
        let group = store.create_group("Sales", "Trading", "TA").unwrap();
        store.allocate_and_create_account(&account("Sales", group)).unwrap();
        let (_, id) = store.allocate_and_create_account(&account("Sales 2", group)).unwrap();

        store.delete_entity(EntityKind::Account, id).unwrap();
        let (again, _) = store.allocate_and_create_account(&account("Sales 3", group)).unwrap();

        assert_eq!(again, "STA003");
    }

    #[test]
    fn test_rejected_partner_consumes_no_serial() {
        let mut store = store();
        let group = store.create_group("Sales", "Trading", "TA").unwrap();

        let mut bad = partner("Sharma", group);
        bad.contact.email = Some("nope".to_string());
        assert!(store.allocate_and_create_partner(&bad).is_err());

        let (code, _) = store.allocate_and_create_partner(&partner("Sharma", group)).unwrap();
        assert_eq!(code, "STA001");
    }

    // ------------------------------------------------------------------------
    // Fiscal periods
    // ------------------------------------------------------------------------

    #[test]
    fn test_fiscal_year_scenario() {
        let mut store = store();

        store
            .create_fiscal_period("FY2324", "Financial Year 2023-24", d(2023, 4, 1), d(2024, 3, 31))
            .unwrap();
        store
            .create_fiscal_period("FY2425", "Financial Year 2024-25", d(2024, 4, 1), d(2025, 3, 31))
            .unwrap();

        match store.create_fiscal_period("FYX", "Odd Year", d(2023, 12, 1), d(2024, 6, 1)) {
            Err(MasterDataError::Overlap { conflicting }) => {
                assert_eq!(conflicting.code, "FY2324");
                assert_eq!(conflicting.label, "Financial Year 2023-24");
            }
            other => panic!("expected overlap, got {:?}", other),
        }

        assert_eq!(store.list_all::<FiscalPeriod>().unwrap().len(), 2);
    }

    #[test]
    fn test_fiscal_period_range_and_code_checks() {
        let mut store = store();

        let err = store
            .create_fiscal_period("FY", "Empty", d(2024, 4, 1), d(2024, 4, 1))
            .unwrap_err();
        assert_eq!(err.kind(), "range");

        store
            .create_fiscal_period("FY2324", "2023-24", d(2023, 4, 1), d(2024, 3, 31))
            .unwrap();
        let err = store
            .create_fiscal_period("FY2324", "Again", d(2030, 4, 1), d(2031, 3, 31))
            .unwrap_err();
        assert_eq!(err.kind(), "conflict");

        let err = store
            .create_fiscal_period("FY20230", "Too long", d(2040, 4, 1), d(2041, 3, 31))
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn test_update_fiscal_period_excludes_itself() {
        let mut store = store();
        let fy23 = store
            .create_fiscal_period("FY2324", "2023-24", d(2023, 4, 1), d(2024, 3, 31))
            .unwrap();
        store
            .create_fiscal_period("FY2425", "2024-25", d(2024, 4, 1), d(2025, 3, 31))
            .unwrap();

        // Shift its own end date: only overlaps itself
        store
            .update_fiscal_period(
                fy23,
                &FiscalPeriodUpdate {
                    label: "2023-24 (short)".to_string(),
                    start_date: d(2023, 4, 1),
                    end_date: d(2024, 3, 30),
                    status: Status::Active,
                },
            )
            .unwrap();

        // Stretch into the next year: refused
        let err = store
            .update_fiscal_period(
                fy23,
                &FiscalPeriodUpdate {
                    label: "2023-24 (long)".to_string(),
                    start_date: d(2023, 4, 1),
                    end_date: d(2024, 4, 15),
                    status: Status::Active,
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), "overlap");

        let stored: FiscalPeriod = store.get(fy23).unwrap();
        assert_eq!(stored.end_date, d(2024, 3, 30));
        assert_eq!(stored.code, "FY2324");
    }

    #[test]
    fn test_inactive_period_still_blocks_overlap() {
        let mut store = store();
        let id = store
            .create_fiscal_period("FY2324", "2023-24", d(2023, 4, 1), d(2024, 3, 31))
            .unwrap();
        store
            .set_status(EntityKind::FiscalPeriod, id, Status::Inactive)
            .unwrap();

        let err = store
            .create_fiscal_period("FYX", "Overlap", d(2024, 1, 1), d(2024, 12, 31))
            .unwrap_err();
        assert_eq!(err.kind(), "overlap");
    }

    #[test]
    fn test_period_containing() {
        let mut store = store();
        store
            .create_fiscal_period("FY2324", "2023-24", d(2023, 4, 1), d(2024, 3, 31))
            .unwrap();

        let period = store.period_containing(d(2023, 10, 2)).unwrap().unwrap();
        assert_eq!(period.code, "FY2324");
        assert!(store.period_containing(d(2025, 1, 1)).unwrap().is_none());
    }

    // ------------------------------------------------------------------------
    // Generic operations
    // ------------------------------------------------------------------------

    #[test]
    fn test_update_entity_dispatch_and_kind_mismatch() {
        let mut store = store();
        let id = store.create_group("Sales", "Trading", "SA").unwrap();

        let fields = EntityUpdate::Group(GroupUpdate {
            name: "Sales (Domestic)".to_string(),
            classification: "TR".to_string(),
            status: Status::Inactive,
        });
        store.update_entity(EntityKind::Group, id, &fields).unwrap();

        let group: LedgerGroup = store.get(id).unwrap();
        assert_eq!(group.name, "Sales (Domestic)");
        assert_eq!(group.status, Status::Inactive);

        let err = store
            .update_entity(EntityKind::Account, id, &fields)
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn test_entity_update_json_tagging() {
        let fields: EntityUpdate = serde_json::from_str(
            r#"{"kind":"fiscal_period","label":"FY","start_date":"2024-04-01","end_date":"2025-03-31"}"#,
        )
        .unwrap();
        assert_eq!(fields.kind(), EntityKind::FiscalPeriod);
    }

    #[test]
    fn test_delete_referenced_group_is_refused() {
        let mut store = store();
        let group = store.create_group("Sales", "Trading", "SA").unwrap();
        let (_, account_id) = store
            .allocate_and_create_account(&account("Sales", group))
            .unwrap();

        match store.delete_entity(EntityKind::Group, group) {
            Err(MasterDataError::Referenced {
                referenced_by,
                count,
                ..
            }) => {
                assert_eq!(referenced_by, EntityKind::Account);
                assert_eq!(count, 1);
            }
            other => panic!("expected referenced error, got {:?}", other),
        }

        store.delete_entity(EntityKind::Account, account_id).unwrap();
        store.delete_entity(EntityKind::Group, group).unwrap();
        assert!(store.list_all::<LedgerGroup>().unwrap().is_empty());
    }

    #[test]
    fn test_delete_group_referenced_by_partner_only() {
        let mut store = store();
        let group = store.create_group("Sundry Creditors", "Liabilities", "SC").unwrap();
        store
            .allocate_and_create_partner(&partner("Mehta & Sons", group))
            .unwrap();

        match store.delete_entity(EntityKind::Group, group) {
            Err(MasterDataError::Referenced { referenced_by, .. }) => {
                assert_eq!(referenced_by, EntityKind::Partner)
            }
            other => panic!("expected referenced error, got {:?}", other),
        }
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let mut store = store();
        for kind in EntityKind::ALL {
            match store.delete_entity(kind, 12345) {
                Err(MasterDataError::NotFound { kind: k, id }) => {
                    assert_eq!(k, kind);
                    assert_eq!(id, 12345);
                }
                other => panic!("expected not found for {}, got {:?}", kind, other),
            }
        }
    }

    #[test]
    fn test_history_records_lifecycle() {
        let mut store = store();
        let group = store.create_group("Sales", "Trading", "TA").unwrap();
        let (_, id) = store.allocate_and_create_account(&account("Sales", group)).unwrap();
        store.set_status(EntityKind::Account, id, Status::Inactive).unwrap();
        store.delete_entity(EntityKind::Account, id).unwrap();

        let events = store.history(EntityKind::Account, id).unwrap();
        let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(types, vec!["created", "status_changed", "deleted"]);
        assert_eq!(events[0].data["code"], "STA001");
        assert!(events.iter().all(|e| e.actor == "tester"));
    }

    #[test]
    fn test_create_retries_while_database_is_locked() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            database_path: dir.path().join("books.db"),
            busy_timeout_ms: 50,
            max_allocation_retries: 5,
            ..Default::default()
        };
        let mut store = MasterStore::open(&config).unwrap();
        let group = store.create_group("Trade", "Trading", "TA").unwrap();

        // Lock released part-way through the retries: the create lands
        let blocker = Connection::open(&config.database_path).unwrap();
        blocker.execute_batch("BEGIN IMMEDIATE").unwrap();
        let release = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(120));
            blocker.execute_batch("COMMIT").unwrap();
        });
        let (code, _) = store
            .allocate_and_create_account(&account("Sales", group))
            .unwrap();
        release.join().unwrap();
        assert_eq!(code, "STA001");

        // Lock held past every retry: a retryable database error comes back
        let blocker = Connection::open(&config.database_path).unwrap();
        blocker.execute_batch("BEGIN IMMEDIATE").unwrap();
        let err = store
            .allocate_and_create_account(&account("Service", group))
            .unwrap_err();
        assert_eq!(err.kind(), "database");
        assert!(err.is_retryable());
        blocker.execute_batch("ROLLBACK").unwrap();

        // The failed attempt consumed nothing
        let (code, _) = store
            .allocate_and_create_account(&account("Service", group))
            .unwrap();
        assert_eq!(code, "STA002");
    }

    #[test]
    fn test_concurrent_writers_get_distinct_serials() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            database_path: dir.path().join("books.db"),
            ..Default::default()
        };

        let group = {
            let mut store = MasterStore::open(&config).unwrap();
            store.create_group("Trade", "Trading", "TA").unwrap()
        };

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let config = config.clone();
                scope.spawn(move || {
                    let mut store = MasterStore::open(&config).unwrap();
                    for i in 0..10 {
                        let name = format!("Supplier {}-{}", worker, i);
                        store.allocate_and_create_account(&account(&name, group)).unwrap();
                    }
                });
            }
        });

        let store = MasterStore::open(&config).unwrap();
        let mut serials: Vec<u32> = store
            .list_all::<LedgerAccount>()
            .unwrap()
            .iter()
            .map(|a| a.code_serial)
            .collect();
        serials.sort_unstable();
        assert_eq!(serials, (1..=40).collect::<Vec<u32>>());
    }
}
