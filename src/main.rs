use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use bank_of_bit::{
    format_currency, format_percent, format_short_date, import_clients, init_tracing,
    load_clients_csv, AccountKind, AccountType, AttributeRegistry, BankAccount, BankService,
    Client, Config, SqliteStore, StatusKind,
};

#[derive(Parser)]
#[command(name = "bank-of-bit")]
#[command(about = "Manage Bank of BIT clients and accounts.", version)]
struct CommandLine {
    /// SQLite database file (overrides BANK_DATABASE)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// tracing filter, e.g. "bank_of_bit=debug" (overrides BANK_LOG)
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and seed account statuses
    Init,
    /// Import clients from a CSV file
    Import { csv: PathBuf },
    /// List all clients
    Clients,
    /// Register one client
    AddClient {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        address: String,
        #[arg(long)]
        city: String,
        #[arg(long)]
        province: String,
        #[arg(long)]
        postal_code: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List the accounts of a client
    Accounts { client_number: i64 },
    /// List account statuses
    Statuses,
    /// Open an account for a client
    OpenAccount {
        #[arg(long)]
        client_number: i64,
        /// savings, mortgage, investment or chequing
        #[arg(long = "type")]
        account_type: AccountType,
        #[arg(long, default_value_t = 0.0)]
        opening_balance: f64,
        /// Monthly service charge (savings, chequing)
        #[arg(long)]
        charges: Option<f64>,
        /// Rate as a fraction, e.g. 0.0525 (mortgage, investment)
        #[arg(long)]
        rate: Option<f64>,
        /// Amortization in months (mortgage)
        #[arg(long)]
        amortization: Option<i32>,
        #[arg(long, default_value = "Active")]
        status: StatusKind,
        #[arg(long)]
        notes: Option<String>,
    },
}

fn main() -> Result<()> {
    let args = CommandLine::parse();

    let mut config = Config::from_env();
    if let Some(path) = args.database {
        config.database_path = path;
    }
    if let Some(filter) = args.log {
        config.log_filter = filter;
    }
    init_tracing(&config.log_filter);

    let store = SqliteStore::open(&config.database_path)
        .with_context(|| format!("Failed to open database {}", config.database_path.display()))?;
    let service = BankService::new(store)?.with_actor("cli");

    match args.command {
        Commands::Init => run_init(&service, &config),
        Commands::Import { csv } => run_import(&service, &csv),
        Commands::Clients => run_clients(&service),
        Commands::AddClient {
            first_name,
            last_name,
            address,
            city,
            province,
            postal_code,
            notes,
        } => {
            let mut client = Client::new(first_name, last_name, address, city, province, postal_code);
            client.notes = notes;
            let client = service.register_client(client)?;
            println!(
                "✓ Registered client {} ({})",
                client.client_number,
                client.full_name()
            );
            Ok(())
        }
        Commands::Accounts { client_number } => run_accounts(&service, client_number),
        Commands::Statuses => run_statuses(&service),
        Commands::OpenAccount {
            client_number,
            account_type,
            opening_balance,
            charges,
            rate,
            amortization,
            status,
            notes,
        } => {
            let kind = match account_type {
                AccountType::Savings => AccountKind::Savings {
                    savings_service_charges: required(charges, "--charges")?,
                },
                AccountType::Chequing => AccountKind::Chequing {
                    chequing_service_charges: required(charges, "--charges")?,
                },
                AccountType::Mortgage => AccountKind::Mortgage {
                    mortgage_rate: required(rate, "--rate")?,
                    amortization,
                },
                AccountType::Investment => AccountKind::Investment {
                    interest_rate: required(rate, "--rate")?,
                },
            };
            run_open_account(&service, client_number, status, opening_balance, kind, notes)
        }
    }
}

fn required<T>(value: Option<T>, flag: &str) -> Result<T> {
    match value {
        Some(v) => Ok(v),
        None => bail!("{} is required for this account type", flag),
    }
}

fn run_init(service: &BankService<SqliteStore>, config: &Config) -> Result<()> {
    println!("🏦 Bank of BIT {}", bank_of_bit::VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    let statuses = service.statuses()?;
    println!("✓ Database ready: {}", config.database_path.display());
    println!("✓ Account statuses: {}", statuses.len());
    Ok(())
}

fn run_import(service: &BankService<SqliteStore>, csv: &Path) -> Result<()> {
    println!("📂 Loading {}...", csv.display());
    let records = load_clients_csv(csv).context("Failed to read client CSV")?;
    println!("✓ Loaded {} rows", records.len());

    let summary = import_clients(service, records)?;
    println!("✓ Inserted: {} clients", summary.inserted);
    println!("✓ Skipped duplicates: {}", summary.duplicates);
    for (line, reason) in &summary.rejected {
        println!("✗ Line {}: {}", line, reason);
    }
    Ok(())
}

fn run_clients(service: &BankService<SqliteStore>) -> Result<()> {
    let registry = AttributeRegistry::new();
    let label = |id: &str| registry.display_label(id).unwrap_or_default();

    println!(
        "{:<10} {:<30} {:<50} {}",
        label("client.client_number"),
        label("client.full_name"),
        label("client.full_address"),
        label("client.date_created"),
    );
    for client in service.clients()? {
        println!(
            "{:<10} {:<30} {:<50} {}",
            client.client_number,
            client.full_name(),
            client.full_address(),
            format_short_date(client.date_created),
        );
    }
    Ok(())
}

fn run_accounts(service: &BankService<SqliteStore>, client_number: i64) -> Result<()> {
    let client = service.client_by_number(client_number)?;
    let client_id = client.client_id.context("stored client without identity")?;
    let statuses = service.statuses()?;

    println!("👤 {} - {}", client.client_number, client.full_name());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for account in service.client_accounts(client_id)? {
        let status = statuses
            .iter()
            .find(|s| s.account_status_id == Some(account.account_status_id));
        let detail = match &account.kind {
            AccountKind::Savings { savings_service_charges: c }
            | AccountKind::Chequing { chequing_service_charges: c } => {
                format!("charges {}", format_currency(*c))
            }
            AccountKind::Mortgage { mortgage_rate, amortization } => match amortization {
                Some(months) => format!("rate {} over {} months", format_percent(*mortgage_rate), months),
                None => format!("rate {}", format_percent(*mortgage_rate)),
            },
            AccountKind::Investment { interest_rate } => {
                format!("rate {}", format_percent(*interest_rate))
            }
        };
        println!(
            "{:>8}  {:<10} {:>14}  {:<10} {}",
            account.account_number,
            account.account_type().as_str(),
            format_currency(account.balance),
            status.map(|s| s.description.as_str()).unwrap_or("?"),
            detail,
        );
    }
    Ok(())
}

fn run_statuses(service: &BankService<SqliteStore>) -> Result<()> {
    for status in service.statuses()? {
        println!(
            "{:>3}  {:<12} rate adjustment {}",
            status.account_status_id.unwrap_or_default(),
            status.description,
            format_percent(status.rate_adjustment()),
        );
    }
    Ok(())
}

fn run_open_account(
    service: &BankService<SqliteStore>,
    client_number: i64,
    status: StatusKind,
    opening_balance: f64,
    kind: AccountKind,
    notes: Option<String>,
) -> Result<()> {
    let client = service.client_by_number(client_number)?;
    let client_id = client.client_id.context("stored client without identity")?;
    let status_id = service
        .statuses()?
        .into_iter()
        .find(|s| s.kind == status)
        .and_then(|s| s.account_status_id)
        .with_context(|| format!("status {} is not in the database", status))?;

    let mut account = BankAccount::new(client_id, status_id, opening_balance, kind);
    account.notes = notes;
    let account = service.open_account(account)?;

    println!(
        "✓ Opened {} account {} for {} with {}",
        account.account_type().as_str(),
        account.account_number,
        client.full_name(),
        format_currency(account.opening_balance),
    );
    Ok(())
}
