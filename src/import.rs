// 📥 Bulk Import - CSV → ledger accounts / trading partners
//
// Each row goes through the normal create path (allocation + guard), so an
// imported row gets exactly the code a manual create would. Bad rows are
// reported and skipped; the rest still land.

use crate::entities::{BalanceSide, NewAccount, NewPartner, PartnerContact};
use crate::error::MasterDataError;
use crate::store::MasterStore;
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportTarget {
    Accounts,
    Partners,
}

impl fmt::Display for ImportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportTarget::Accounts => write!(f, "accounts"),
            ImportTarget::Partners => write!(f, "partners"),
        }
    }
}

impl FromStr for ImportTarget {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "accounts" | "account" => Ok(ImportTarget::Accounts),
            "partners" | "partner" => Ok(ImportTarget::Partners),
            other => Err(format!("unknown import target '{}'", other)),
        }
    }
}

/// One CSV line. Contact columns are read for partners, ignored for accounts.
#[derive(Debug, Deserialize)]
struct ImportRow {
    name: String,
    group_code: String,
    #[serde(default)]
    opening_balance: String,
    balance_side: String,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    tax_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportedRow {
    pub line: u64,
    pub id: i64,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRow {
    pub line: u64,
    pub reason: String,
}

#[derive(Debug, Default, Serialize)]
pub struct ImportReport {
    pub created: Vec<ImportedRow>,
    pub failed: Vec<RejectedRow>,
}

impl ImportReport {
    pub fn total(&self) -> usize {
        self.created.len() + self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Import every row of `csv_path` as `target`.
///
/// Row-level problems (bad balance, unknown group, duplicate...) go into
/// `failed`; I/O and database failures abort the import.
pub fn import_csv(store: &mut MasterStore, target: ImportTarget, csv_path: &Path) -> Result<ImportReport> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(csv_path)
        .with_context(|| format!("Failed to open CSV file: {:?}", csv_path))?;
    let headers = rdr.headers().context("Failed to read CSV header")?.clone();

    let mut report = ImportReport::default();

    for result in rdr.records() {
        let record = result.context("Failed to read CSV record")?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();

        let row: ImportRow = match record.deserialize(Some(&headers)) {
            Ok(row) => row,
            Err(e) => {
                report.failed.push(RejectedRow {
                    line,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        match import_row(store, target, &row) {
            Ok((code, id)) => report.created.push(ImportedRow { line, id, code }),
            Err(e @ MasterDataError::Database(_)) => {
                return Err(e).with_context(|| format!("Import aborted at line {}", line));
            }
            Err(e) => {
                tracing::warn!(line, error = %e, "import row rejected");
                report.failed.push(RejectedRow {
                    line,
                    reason: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        import_target = %target,
        created = report.created.len(),
        failed = report.failed.len(),
        "import finished"
    );

    Ok(report)
}

fn import_row(
    store: &mut MasterStore,
    target: ImportTarget,
    row: &ImportRow,
) -> std::result::Result<(String, i64), MasterDataError> {
    let group = store.find_group_by_code(&row.group_code)?.ok_or_else(|| {
        MasterDataError::validation(
            "group_code",
            format!("no ledger group with code '{}'", row.group_code),
        )
    })?;
    let opening_balance = parse_balance(&row.opening_balance)?;
    let balance_side = BalanceSide::parse_field(&row.balance_side)?;

    match target {
        ImportTarget::Accounts => store.allocate_and_create_account(&NewAccount::new(
            row.name.as_str(),
            group.id,
            opening_balance,
            balance_side,
        )),
        ImportTarget::Partners => store.allocate_and_create_partner(&NewPartner {
            name: row.name.clone(),
            group_id: group.id,
            opening_balance,
            balance_side,
            contact: PartnerContact {
                address: row.address.clone(),
                city: row.city.clone(),
                phone: row.phone.clone(),
                email: row.email.clone(),
                tax_id: row.tax_id.clone(),
            },
        }),
    }
}

/// Blank means zero; thousands separators are tolerated
fn parse_balance(raw: &str) -> std::result::Result<Decimal, MasterDataError> {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Ok(Decimal::ZERO);
    }
    Decimal::from_str(cleaned).map_err(|_| {
        MasterDataError::validation("opening_balance", format!("'{}' is not a number", raw))
    })
}
