// Ledger Master - Core Library
// Master data for the books: ledger groups, ledger accounts, trading partners
// and fiscal periods, with derived-code allocation and overlap-free periods.

pub mod allocator;
pub mod classification;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod fiscal;
pub mod guard;
pub mod import;
pub mod repository;
pub mod store;

// Re-export commonly used types
pub use allocator::{AllocatedCode, AllocationStrategy, CodeAllocator};
pub use classification::{ClassificationRegistry, ClassificationType, CLASSIFICATION_TYPES};
pub use config::StoreConfig;
pub use db::{get_events_for_entity, insert_event, setup_database, Event};
pub use entities::{
    AccountUpdate, BalanceSide, EntityKind, FiscalPeriod, FiscalPeriodUpdate, GroupUpdate,
    LedgerAccount, LedgerGroup, MasterEntity, NewAccount, NewPartner, PartnerContact,
    PartnerUpdate, Status, TradingPartner,
};
pub use error::{MasterDataError, Result};
pub use fiscal::FiscalPeriodValidator;
pub use guard::UniquenessGuard;
pub use import::{import_csv, ImportReport, ImportTarget};
pub use store::{EntityUpdate, MasterStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
