// 🗂️ Master Entities - ledger groups, ledger accounts, trading partners, fiscal periods
//
// Each entity has:
// - Surrogate identity (SQLite rowid) that NEVER changes
// - A code (derived or operator-supplied) that NEVER changes after creation
// - A two-state status (Active/Inactive) that only affects "active" listings

pub mod account;
pub mod fiscal_period;
pub mod group;
pub mod partner;

pub use account::{AccountUpdate, LedgerAccount, NewAccount};
pub use fiscal_period::{FiscalPeriod, FiscalPeriodUpdate};
pub use group::{GroupUpdate, LedgerGroup};
pub use partner::{NewPartner, PartnerContact, PartnerUpdate, TradingPartner};

use crate::error::{MasterDataError, Result};
use rust_decimal::Decimal;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Type, ValueRef};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Longest accepted entity name
pub const MAX_NAME_LEN: usize = 100;

// ============================================================================
// ENTITY KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Group,
    Account,
    Partner,
    FiscalPeriod,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Group,
        EntityKind::Account,
        EntityKind::Partner,
        EntityKind::FiscalPeriod,
    ];

    /// Stable name used in the audit trail
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Group => "ledger_group",
            EntityKind::Account => "ledger_account",
            EntityKind::Partner => "trading_partner",
            EntityKind::FiscalPeriod => "fiscal_period",
        }
    }

    /// Backing table. Every table keeps its code in a `code` column.
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Group => "ledger_groups",
            EntityKind::Account => "ledger_accounts",
            EntityKind::Partner => "trading_partners",
            EntityKind::FiscalPeriod => "fiscal_periods",
        }
    }

    /// Whether the code is produced by the allocator rather than typed in
    pub fn has_derived_code(&self) -> bool {
        matches!(self, EntityKind::Account | EntityKind::Partner)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntityKind::Group => "ledger group",
            EntityKind::Account => "ledger account",
            EntityKind::Partner => "trading partner",
            EntityKind::FiscalPeriod => "fiscal period",
        };
        f.write_str(label)
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "group" | "ledger_group" => Ok(EntityKind::Group),
            "account" | "ledger_account" => Ok(EntityKind::Account),
            "partner" | "trading_partner" => Ok(EntityKind::Partner),
            "period" | "fiscal_period" => Ok(EntityKind::FiscalPeriod),
            other => Err(format!(
                "unknown entity kind '{}' (expected group, account, partner or period)",
                other
            )),
        }
    }
}

// ============================================================================
// STATUS
// ============================================================================

/// Two-state lifecycle, freely reversible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Status {
    #[default]
    Active,
    Inactive,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Active => "Active",
            Status::Inactive => "Inactive",
        }
    }

    pub fn is_active(&self) -> bool {
        *self == Status::Active
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(Status::Active),
            "inactive" => Ok(Status::Inactive),
            other => Err(format!("unknown status '{}'", other)),
        }
    }
}

impl ToSql for Status {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Status {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

// ============================================================================
// BALANCE SIDE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceSide {
    Debit,
    Credit,
}

impl BalanceSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            BalanceSide::Debit => "Debit",
            BalanceSide::Credit => "Credit",
        }
    }

    /// Parse operator input, reporting failures against the `balance_side` field
    pub fn parse_field(raw: &str) -> Result<Self> {
        raw.parse()
            .map_err(|e: String| MasterDataError::validation("balance_side", e))
    }
}

impl fmt::Display for BalanceSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BalanceSide {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "debit" | "dr" => Ok(BalanceSide::Debit),
            "credit" | "cr" => Ok(BalanceSide::Credit),
            "" => Err("balance side is required (Debit or Credit)".to_string()),
            other => Err(format!("'{}' is not Debit or Credit", other)),
        }
    }
}

impl ToSql for BalanceSide {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for BalanceSide {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

// ============================================================================
// GENERIC ENTITY CONTRACT
// ============================================================================

/// What the generic repository needs to read, list, re-status and delete
/// any master entity.
pub trait MasterEntity: Sized {
    const KIND: EntityKind;

    /// Column list in the order `from_row` reads them
    const COLUMNS: &'static str;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    fn id(&self) -> i64;

    fn code(&self) -> &str;

    fn status(&self) -> Status;
}

// ============================================================================
// FIELD HELPERS
// ============================================================================

/// Trim and check a required name field
pub fn validate_name(field: &str, raw: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(MasterDataError::validation(field, "required field is empty"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(MasterDataError::validation(
            field,
            format!("longer than {} characters", MAX_NAME_LEN),
        ));
    }
    Ok(name.to_string())
}

/// Opening balances are magnitudes; the balance side carries the sign
pub fn validate_opening_balance(amount: Decimal) -> Result<()> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(MasterDataError::validation(
            "opening_balance",
            format!("{} is negative; use the balance side instead", amount),
        ));
    }
    Ok(())
}

/// Decimals are stored as canonical text so no precision is lost
pub(crate) fn decimal_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let text: String = row.get(idx)?;
    Decimal::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
