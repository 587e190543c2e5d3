// 🤝 Trading Partner - customer/supplier ledger with contact details
//
// Coded exactly like a ledger account (same prefix + serial scheme) but in
// its own namespace: partner codes only collide with other partner codes.

use super::{
    decimal_column, validate_name, validate_opening_balance, BalanceSide, EntityKind,
    MasterEntity, Status,
};
use crate::error::{MasterDataError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// Address and contact block. Nothing here takes part in code allocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartnerContact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// GSTIN / VAT number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,
}

impl PartnerContact {
    /// Blank strings become `None`; an email must contain `@`
    pub fn normalized(&self) -> Result<PartnerContact> {
        fn clean(value: &Option<String>) -> Option<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        }

        let contact = PartnerContact {
            address: clean(&self.address),
            city: clean(&self.city),
            phone: clean(&self.phone),
            email: clean(&self.email),
            tax_id: clean(&self.tax_id).map(|t| t.to_ascii_uppercase()),
        };

        if let Some(email) = &contact.email {
            if !email.contains('@') {
                return Err(MasterDataError::validation(
                    "email",
                    format!("'{}' is not an email address", email),
                ));
            }
        }

        Ok(contact)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingPartner {
    pub id: i64,
    pub name: String,
    pub group_id: i64,
    pub code: String,
    pub code_prefix: String,
    pub code_serial: u32,
    pub opening_balance: Decimal,
    pub balance_side: BalanceSide,
    pub status: Status,
    #[serde(flatten)]
    pub contact: PartnerContact,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MasterEntity for TradingPartner {
    const KIND: EntityKind = EntityKind::Partner;
    const COLUMNS: &'static str = "id, name, group_id, code, code_prefix, code_serial, \
         opening_balance, balance_side, status, address, city, phone, email, tax_id, \
         created_at, updated_at";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(TradingPartner {
            id: row.get(0)?,
            name: row.get(1)?,
            group_id: row.get(2)?,
            code: row.get(3)?,
            code_prefix: row.get(4)?,
            code_serial: row.get(5)?,
            opening_balance: decimal_column(row, 6)?,
            balance_side: row.get(7)?,
            status: row.get(8)?,
            contact: PartnerContact {
                address: row.get(9)?,
                city: row.get(10)?,
                phone: row.get(11)?,
                email: row.get(12)?,
                tax_id: row.get(13)?,
            },
            created_at: row.get(14)?,
            updated_at: row.get(15)?,
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
pub struct NewPartner {
    pub name: String,
    pub group_id: i64,
    #[serde(default)]
    pub opening_balance: Decimal,
    pub balance_side: BalanceSide,
    #[serde(flatten)]
    pub contact: PartnerContact,
}

impl NewPartner {
    /// Returns the trimmed name and cleaned contact block
    pub fn validate(&self) -> Result<(String, PartnerContact)> {
        let name = validate_name("name", &self.name)?;
        validate_opening_balance(self.opening_balance)?;
        Ok((name, self.contact.normalized()?))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerUpdate {
    pub name: String,
    pub group_id: i64,
    pub opening_balance: Decimal,
    pub balance_side: BalanceSide,
    #[serde(default)]
    pub status: Status,
    #[serde(flatten)]
    pub contact: PartnerContact,
}

impl PartnerUpdate {
    pub fn validate(&self) -> Result<(String, PartnerContact)> {
        let name = validate_name("name", &self.name)?;
        validate_opening_balance(self.opening_balance)?;
        Ok((name, self.contact.normalized()?))
    }
}

impl From<&TradingPartner> for PartnerUpdate {
    fn from(partner: &TradingPartner) -> Self {
        PartnerUpdate {
            name: partner.name.clone(),
            group_id: partner.group_id,
            opening_balance: partner.opening_balance,
            balance_side: partner.balance_side,
            status: partner.status,
            contact: partner.contact.clone(),
        }
    }
}
