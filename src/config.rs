// ⚙️ Store Configuration - JSON file + environment overrides
//
// Every field has a default, so an empty `{}` file (or no file at all) is a
// valid configuration.

use crate::allocator::AllocationStrategy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_DATABASE: &str = "LEDGER_MASTER_DB";
pub const ENV_ALLOCATION: &str = "LEDGER_MASTER_ALLOCATION";
pub const ENV_ACTOR: &str = "LEDGER_MASTER_ACTOR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database file
    pub database_path: PathBuf,

    /// How the next serial under a prefix is found
    pub allocation_strategy: AllocationStrategy,

    /// How long a writer waits for the database lock
    pub busy_timeout_ms: u64,

    /// Extra attempts after a retryable conflict while creating coded rows
    pub max_allocation_retries: u32,

    /// Write-ahead logging
    pub wal: bool,

    /// Recorded as the actor of every audit event
    pub actor: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            database_path: PathBuf::from("ledger_master.db"),
            allocation_strategy: AllocationStrategy::Sequence,
            busy_timeout_ms: 5_000,
            max_allocation_retries: 3,
            wal: true,
            actor: "ledger-master".to_string(),
        }
    }
}

impl StoreConfig {
    /// Load configuration from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        serde_json::from_str(&content).context("Failed to parse config JSON")
    }

    /// File (if given) or defaults, then environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// `load`, a map in tests)
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db) = lookup(ENV_DATABASE) {
            self.database_path = PathBuf::from(db);
        }
        if let Some(strategy) = lookup(ENV_ALLOCATION) {
            self.allocation_strategy = strategy
                .parse()
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("Invalid {}", ENV_ALLOCATION))?;
        }
        if let Some(actor) = lookup(ENV_ACTOR) {
            self.actor = actor;
        }
        Ok(self)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}
