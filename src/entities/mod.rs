// Entity Models
//
// Each entity has:
// - Store-assigned identity (integer id, None until persisted)
// - A business number handed out from a sequence (clients and accounts)
// - Field rules described in the attribute registry

pub mod account_status;
pub mod bank_account;
pub mod client;

pub use account_status::{AccountStatus, StatusKind, BASE_RATE_ADJUSTMENT};
pub use bank_account::{
    next_account_number, AccountKind, AccountType, BankAccount, ACCOUNT_NUMBER_START,
};
pub use client::{next_client_number, Client, CLIENT_NUMBER_MAX, CLIENT_NUMBER_MIN};
