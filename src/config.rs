use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const ENV_DATABASE: &str = "BANK_DATABASE";
pub const ENV_BIND_ADDRESS: &str = "BANK_BIND_ADDRESS";
pub const ENV_LOG: &str = "BANK_LOG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database file
    pub database_path: PathBuf,
    /// Address the API server listens on
    pub bind_address: String,
    /// tracing-subscriber filter directive
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("bank_of_bit.db"),
            bind_address: "127.0.0.1:3000".into(),
            log_filter: "bank_of_bit=info".into(),
        }
    }
}

impl Config {
    /// Defaults overridden by `BANK_DATABASE`, `BANK_BIND_ADDRESS` and `BANK_LOG`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Config::default();
        let set = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(path) = set(ENV_DATABASE) {
            config.database_path = PathBuf::from(path);
        }
        if let Some(addr) = set(ENV_BIND_ADDRESS) {
            config.bind_address = addr;
        }
        if let Some(filter) = set(ENV_LOG) {
            config.log_filter = filter;
        }
        config
    }
}
