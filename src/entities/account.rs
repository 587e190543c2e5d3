// 💳 Ledger Account - derived code, parent group, opening balance
//
// "STA001" = first letter of the name + group type segment + serial.
// The display code is denormalized; `code_prefix` and `code_serial` are the
// authoritative allocator state and are never re-parsed from the string.

use super::{
    decimal_column, validate_name, validate_opening_balance, BalanceSide, EntityKind,
    MasterEntity, Status,
};
use crate::error::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerAccount {
    pub id: i64,
    pub name: String,
    pub group_id: i64,
    pub code: String,
    pub code_prefix: String,
    pub code_serial: u32,
    pub opening_balance: Decimal,
    pub balance_side: BalanceSide,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LedgerAccount {
    /// Opening balance with debit positive, credit negative
    pub fn signed_opening_balance(&self) -> Decimal {
        match self.balance_side {
            BalanceSide::Debit => self.opening_balance,
            BalanceSide::Credit => -self.opening_balance,
        }
    }
}

impl MasterEntity for LedgerAccount {
    const KIND: EntityKind = EntityKind::Account;
    const COLUMNS: &'static str = "id, name, group_id, code, code_prefix, code_serial, \
         opening_balance, balance_side, status, created_at, updated_at";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(LedgerAccount {
            id: row.get(0)?,
            name: row.get(1)?,
            group_id: row.get(2)?,
            code: row.get(3)?,
            code_prefix: row.get(4)?,
            code_serial: row.get(5)?,
            opening_balance: decimal_column(row, 6)?,
            balance_side: row.get(7)?,
            status: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
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

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    pub name: String,
    pub group_id: i64,
    #[serde(default)]
    pub opening_balance: Decimal,
    pub balance_side: BalanceSide,
}

impl NewAccount {
    pub fn new(
        name: impl Into<String>,
        group_id: i64,
        opening_balance: Decimal,
        balance_side: BalanceSide,
    ) -> Self {
        NewAccount {
            name: name.into(),
            group_id,
            opening_balance,
            balance_side,
        }
    }

    /// Returns the trimmed name on success
    pub fn validate(&self) -> Result<String> {
        let name = validate_name("name", &self.name)?;
        validate_opening_balance(self.opening_balance)?;
        Ok(name)
    }
}

/// Editable fields; the code is not among them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountUpdate {
    pub name: String,
    pub group_id: i64,
    pub opening_balance: Decimal,
    pub balance_side: BalanceSide,
    #[serde(default)]
    pub status: Status,
}

impl AccountUpdate {
    pub fn validate(&self) -> Result<String> {
        let name = validate_name("name", &self.name)?;
        validate_opening_balance(self.opening_balance)?;
        Ok(name)
    }
}

impl From<&LedgerAccount> for AccountUpdate {
    fn from(account: &LedgerAccount) -> Self {
        AccountUpdate {
            name: account.name.clone(),
            group_id: account.group_id,
            opening_balance: account.opening_balance,
            balance_side: account.balance_side,
            status: account.status,
        }
    }
}
