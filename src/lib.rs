// Bank of BIT - Core Library
// Entity layer for clients, bank accounts and account statuses, with
// validation, persistence and the service used by the CLI and API server.

pub mod attributes;
pub mod config;
pub mod entities;
pub mod error;
pub mod format;
pub mod import;
pub mod service;
pub mod store;
pub mod validation;

use std::sync::Once;

// Re-export commonly used types
pub use attributes::{AttributeDefinition, AttributeRegistry, AttributeType, EntityKind, ValidationRule};
pub use config::Config;
pub use entities::{
    AccountKind, AccountStatus, AccountType, BankAccount, Client, StatusKind,
};
pub use error::{BankError, BankResult};
pub use format::{format_currency, format_percent, format_short_date, DisplayFormat};
pub use import::{
    import_clients, load_clients_csv, read_clients_csv, ClientRecord, CsvRow, ImportSummary,
};
pub use service::{AccountDetails, BankService};
pub use store::{setup_database, BankStore, Event, MemoryStore, SqliteStore};
pub use validation::{ValidationError, ValidationResult, Validator};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

static TRACING_INIT: Once = Once::new();

/// Install the global tracing subscriber. `RUST_LOG` directives win over
/// `default_filter`; later calls are ignored.
pub fn init_tracing(default_filter: &str) {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter));

        // Another subscriber may already be installed (e.g. by a test harness)
        let _ = fmt().with_env_filter(filter).with_target(false).try_init();
    });
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_tracing_is_repeatable() {
        super::init_tracing("bank_of_bit=debug");
        super::init_tracing("bank_of_bit=info");
    }
}
