// Ledger Master CLI - thin command-line caller over `MasterStore`

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;

use ledger_master::{
    import_csv, AccountUpdate, BalanceSide, EntityKind, EntityUpdate, FiscalPeriod,
    FiscalPeriodUpdate, GroupUpdate, ImportTarget, LedgerAccount, LedgerGroup, MasterStore,
    NewAccount, NewPartner, PartnerContact, PartnerUpdate, Status, StoreConfig, TradingPartner,
};

/// Ledger master data: groups, accounts, trading partners and fiscal periods.
#[derive(Parser, Debug)]
#[command(name = "ledger-master", version, about)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file (overrides config and environment)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the database schema
    Init,
    /// List the seeded classification types
    Classifications,
    /// Ledger groups
    Group {
        #[command(subcommand)]
        action: GroupCommand,
    },
    /// Ledger accounts
    Account {
        #[command(subcommand)]
        action: AccountCommand,
    },
    /// Trading partners
    Partner {
        #[command(subcommand)]
        action: PartnerCommand,
    },
    /// Fiscal periods
    Period {
        #[command(subcommand)]
        action: PeriodCommand,
    },
    /// Set Active/Inactive on any entity
    Status {
        kind: EntityKind,
        id: i64,
        status: Status,
    },
    /// Delete any entity
    Delete { kind: EntityKind, id: i64 },
    /// Bulk-create accounts or partners from CSV
    Import { target: ImportTarget, csv: PathBuf },
    /// Audit trail of one entity
    History { kind: EntityKind, id: i64 },
}

#[derive(Subcommand, Debug)]
enum GroupCommand {
    Add {
        name: String,
        /// Classification label or code (e.g. "Trading" or "TR")
        #[arg(long)]
        classification: String,
        /// Two-character group code
        #[arg(long)]
        code: String,
    },
    List {
        #[arg(long)]
        active: bool,
    },
    Show {
        id: i64,
    },
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        classification: Option<String>,
        #[arg(long)]
        status: Option<Status>,
    },
}

#[derive(Subcommand, Debug)]
enum AccountCommand {
    Add {
        name: String,
        /// Parent group code
        #[arg(long)]
        group: String,
        #[arg(long, default_value = "0")]
        opening: Decimal,
        #[arg(long)]
        side: BalanceSide,
    },
    List {
        #[arg(long)]
        active: bool,
    },
    Show {
        id: i64,
    },
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        group: Option<String>,
        #[arg(long)]
        opening: Option<Decimal>,
        #[arg(long)]
        side: Option<BalanceSide>,
        #[arg(long)]
        status: Option<Status>,
    },
    /// Show the code the next account with this name would get
    Preview {
        name: String,
        #[arg(long)]
        group: String,
    },
}

#[derive(Args, Debug, Default)]
struct ContactArgs {
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    city: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    tax_id: Option<String>,
}

impl ContactArgs {
    /// Overlay the supplied flags on an existing contact block
    fn apply(self, mut contact: PartnerContact) -> PartnerContact {
        if self.address.is_some() {
            contact.address = self.address;
        }
        if self.city.is_some() {
            contact.city = self.city;
        }
        if self.phone.is_some() {
            contact.phone = self.phone;
        }
        if self.email.is_some() {
            contact.email = self.email;
        }
        if self.tax_id.is_some() {
            contact.tax_id = self.tax_id;
        }
        contact
    }
}

#[derive(Subcommand, Debug)]
enum PartnerCommand {
    Add {
        name: String,
        #[arg(long)]
        group: String,
        #[arg(long, default_value = "0")]
        opening: Decimal,
        #[arg(long)]
        side: BalanceSide,
        #[command(flatten)]
        contact: ContactArgs,
    },
    List {
        #[arg(long)]
        active: bool,
    },
    Show {
        id: i64,
    },
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        group: Option<String>,
        #[arg(long)]
        opening: Option<Decimal>,
        #[arg(long)]
        side: Option<BalanceSide>,
        #[arg(long)]
        status: Option<Status>,
        #[command(flatten)]
        contact: ContactArgs,
    },
}

#[derive(Subcommand, Debug)]
enum PeriodCommand {
    Add {
        code: String,
        label: String,
        /// First day (YYYY-MM-DD)
        start: NaiveDate,
        /// Last day, inclusive (YYYY-MM-DD)
        end: NaiveDate,
    },
    List {
        #[arg(long)]
        active: bool,
    },
    Show {
        id: i64,
    },
    Update {
        id: i64,
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long)]
        status: Option<Status>,
    },
    /// Which period a date falls in
    Containing { date: NaiveDate },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config = StoreConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.database_path = db;
    }

    let mut store = MasterStore::open(&config)
        .with_context(|| format!("Failed to open database: {:?}", config.database_path))?;

    match cli.command {
        Commands::Init => {
            println!("✓ Database ready: {}", config.database_path.display());
            println!("  Allocation strategy: {}", store.allocation_strategy());
        }
        Commands::Classifications => {
            for ty in store.registry().all() {
                println!("{}  {}", ty.code, ty.label);
            }
        }
        Commands::Group { action } => run_group(&mut store, action)?,
        Commands::Account { action } => run_account(&mut store, action)?,
        Commands::Partner { action } => run_partner(&mut store, action)?,
        Commands::Period { action } => run_period(&mut store, action)?,
        Commands::Status { kind, id, status } => {
            store.set_status(kind, id, status)?;
            println!("✓ {} {} is now {}", kind, id, status);
        }
        Commands::Delete { kind, id } => {
            store.delete_entity(kind, id)?;
            println!("✓ Deleted {} {}", kind, id);
        }
        Commands::Import { target, csv } => {
            let report = import_csv(&mut store, target, &csv)?;
            for row in &report.created {
                println!("  line {:>4}  ✓ {}", row.line, row.code);
            }
            for row in &report.failed {
                println!("  line {:>4}  ✗ {}", row.line, row.reason);
            }
            println!(
                "\nImported {} of {} {}",
                report.created.len(),
                report.total(),
                target
            );
        }
        Commands::History { kind, id } => {
            for event in store.history(kind, id)? {
                println!(
                    "{}  {:<15} {:<14} {}",
                    event.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    event.event_type,
                    event.actor,
                    event.data
                );
            }
        }
    }

    Ok(())
}

// ============================================================================
// HANDLERS
// ============================================================================

fn run_group(store: &mut MasterStore, action: GroupCommand) -> Result<()> {
    match action {
        GroupCommand::Add {
            name,
            classification,
            code,
        } => {
            let id = store.create_group(&name, &classification, &code)?;
            let group: LedgerGroup = store.get(id)?;
            println!("✓ Created group {} (id {})", group.code, id);
        }
        GroupCommand::List { active } => {
            let groups: Vec<LedgerGroup> = if active {
                store.list_active()?
            } else {
                store.list_all()?
            };
            for group in &groups {
                print_group(store, group);
            }
        }
        GroupCommand::Show { id } => {
            let group: LedgerGroup = store.get(id)?;
            print_group(store, &group);
        }
        GroupCommand::Update {
            id,
            name,
            classification,
            status,
        } => {
            let current: LedgerGroup = store.get(id)?;
            let fields = EntityUpdate::Group(GroupUpdate {
                name: name.unwrap_or(current.name),
                classification: classification.unwrap_or(current.classification),
                status: status.unwrap_or(current.status),
            });
            store.update_entity(EntityKind::Group, id, &fields)?;
            println!("✓ Updated group {}", current.code);
        }
    }
    Ok(())
}

fn run_account(store: &mut MasterStore, action: AccountCommand) -> Result<()> {
    match action {
        AccountCommand::Add {
            name,
            group,
            opening,
            side,
        } => {
            let group = group_by_code(store, &group)?;
            let (code, id) =
                store.allocate_and_create_account(&NewAccount::new(name, group.id, opening, side))?;
            println!("✓ Created account {} (id {})", code, id);
        }
        AccountCommand::List { active } => {
            let accounts: Vec<LedgerAccount> = if active {
                store.list_active()?
            } else {
                store.list_all()?
            };
            for account in &accounts {
                print_account(account);
            }
        }
        AccountCommand::Show { id } => {
            let account: LedgerAccount = store.get(id)?;
            print_account(&account);
        }
        AccountCommand::Update {
            id,
            name,
            group,
            opening,
            side,
            status,
        } => {
            let current: LedgerAccount = store.get(id)?;
            let mut update = AccountUpdate::from(&current);
            if let Some(name) = name {
                update.name = name;
            }
            if let Some(code) = group {
                update.group_id = group_by_code(store, &code)?.id;
            }
            update.opening_balance = opening.unwrap_or(update.opening_balance);
            update.balance_side = side.unwrap_or(update.balance_side);
            update.status = status.unwrap_or(update.status);

            store.update_entity(EntityKind::Account, id, &EntityUpdate::Account(update))?;
            println!("✓ Updated account {}", current.code);
        }
        AccountCommand::Preview { name, group } => {
            let group = group_by_code(store, &group)?;
            let next = store.preview_code(EntityKind::Account, &name, group.id)?;
            println!("{}", next.code);
        }
    }
    Ok(())
}

fn run_partner(store: &mut MasterStore, action: PartnerCommand) -> Result<()> {
    match action {
        PartnerCommand::Add {
            name,
            group,
            opening,
            side,
            contact,
        } => {
            let group = group_by_code(store, &group)?;
            let input = NewPartner {
                name,
                group_id: group.id,
                opening_balance: opening,
                balance_side: side,
                contact: contact.apply(PartnerContact::default()),
            };
            let (code, id) = store.allocate_and_create_partner(&input)?;
            println!("✓ Created partner {} (id {})", code, id);
        }
        PartnerCommand::List { active } => {
            let partners: Vec<TradingPartner> = if active {
                store.list_active()?
            } else {
                store.list_all()?
            };
            for partner in &partners {
                print_partner(partner);
            }
        }
        PartnerCommand::Show { id } => {
            let partner: TradingPartner = store.get(id)?;
            print_partner(&partner);
            let contact = &partner.contact;
            for (label, value) in [
                ("address", &contact.address),
                ("city", &contact.city),
                ("phone", &contact.phone),
                ("email", &contact.email),
                ("tax id", &contact.tax_id),
            ] {
                if let Some(value) = value {
                    println!("    {:<8} {}", label, value);
                }
            }
        }
        PartnerCommand::Update {
            id,
            name,
            group,
            opening,
            side,
            status,
            contact,
        } => {
            let current: TradingPartner = store.get(id)?;
            let mut update = PartnerUpdate::from(&current);
            if let Some(name) = name {
                update.name = name;
            }
            if let Some(code) = group {
                update.group_id = group_by_code(store, &code)?.id;
            }
            update.opening_balance = opening.unwrap_or(update.opening_balance);
            update.balance_side = side.unwrap_or(update.balance_side);
            update.status = status.unwrap_or(update.status);
            update.contact = contact.apply(update.contact);

            store.update_entity(EntityKind::Partner, id, &EntityUpdate::Partner(update))?;
            println!("✓ Updated partner {}", current.code);
        }
    }
    Ok(())
}

fn run_period(store: &mut MasterStore, action: PeriodCommand) -> Result<()> {
    match action {
        PeriodCommand::Add {
            code,
            label,
            start,
            end,
        } => {
            let id = store.create_fiscal_period(&code, &label, start, end)?;
            println!("✓ Created fiscal period {} (id {})", code.trim(), id);
        }
        PeriodCommand::List { active } => {
            let periods: Vec<FiscalPeriod> = if active {
                store.list_active()?
            } else {
                store.list_all()?
            };
            for period in &periods {
                print_period(period);
            }
        }
        PeriodCommand::Show { id } => {
            let period: FiscalPeriod = store.get(id)?;
            print_period(&period);
        }
        PeriodCommand::Update {
            id,
            label,
            start,
            end,
            status,
        } => {
            let current: FiscalPeriod = store.get(id)?;
            let mut update = FiscalPeriodUpdate::from(&current);
            if let Some(label) = label {
                update.label = label;
            }
            update.start_date = start.unwrap_or(update.start_date);
            update.end_date = end.unwrap_or(update.end_date);
            update.status = status.unwrap_or(update.status);

            store.update_entity(
                EntityKind::FiscalPeriod,
                id,
                &EntityUpdate::FiscalPeriod(update),
            )?;
            println!("✓ Updated fiscal period {}", current.code);
        }
        PeriodCommand::Containing { date } => match store.period_containing(date)? {
            Some(period) => print_period(&period),
            None => println!("No fiscal period contains {}", date),
        },
    }
    Ok(())
}

fn group_by_code(store: &MasterStore, code: &str) -> Result<LedgerGroup> {
    store
        .find_group_by_code(code)?
        .with_context(|| format!("No ledger group with code '{}'", code))
}

// ============================================================================
// OUTPUT
// ============================================================================

fn print_group(store: &MasterStore, group: &LedgerGroup) {
    let label = store
        .registry()
        .label_for(&group.classification)
        .unwrap_or("?");
    println!(
        "{:>4}  {}  {:<30} {:<14} {}",
        group.id, group.code, group.name, label, group.status
    );
}

fn print_account(account: &LedgerAccount) {
    println!(
        "{:>4}  {}  {:<30} {:>14} {:<6} {}",
        account.id,
        account.code,
        account.name,
        account.opening_balance,
        account.balance_side.as_str(),
        account.status
    );
}

fn print_partner(partner: &TradingPartner) {
    println!(
        "{:>4}  {}  {:<30} {:>14} {:<6} {}",
        partner.id,
        partner.code,
        partner.name,
        partner.opening_balance,
        partner.balance_side.as_str(),
        partner.status
    );
}

fn print_period(period: &FiscalPeriod) {
    println!(
        "{:>4}  {:<6}  {} → {}  {:<30} {}",
        period.id, period.code, period.start_date, period.end_date, period.label, period.status
    );
}
