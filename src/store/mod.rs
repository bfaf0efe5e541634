// Persistence for clients, account statuses and bank accounts.
//
// `SqliteStore` maps the entities to relational tables; `MemoryStore` keeps
// them in process. Both honour the same contract, so services and tests can
// run against either.

pub mod memory;
pub mod sqlite;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{AccountStatus, BankAccount, Client};
use crate::error::BankResult;

pub use memory::MemoryStore;
pub use sqlite::{setup_database, SqliteStore};

/// Event for the audit trail
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

/// Storage contract for the entity layer.
///
/// Inserts return the store-assigned identity. Uniqueness of client numbers,
/// account numbers and client idempotency hashes is enforced by the store
/// and reported as `BankError::Duplicate`. Missing rows on update or delete
/// are `BankError::NotFound`.
pub trait BankStore {
    // Clients
    fn insert_client(&self, client: &Client) -> BankResult<i64>;
    fn get_client(&self, client_id: i64) -> BankResult<Option<Client>>;
    fn find_client_by_number(&self, client_number: i64) -> BankResult<Option<Client>>;
    /// All clients ordered by client number
    fn all_clients(&self) -> BankResult<Vec<Client>>;
    fn update_client(&self, client: &Client) -> BankResult<()>;
    fn delete_client(&self, client_id: i64) -> BankResult<()>;
    fn highest_client_number(&self) -> BankResult<Option<i64>>;

    // Account statuses
    /// All statuses ordered by identity
    fn all_account_statuses(&self) -> BankResult<Vec<AccountStatus>>;
    fn get_account_status(&self, account_status_id: i64) -> BankResult<Option<AccountStatus>>;

    // Bank accounts
    fn insert_bank_account(&self, account: &BankAccount) -> BankResult<i64>;
    fn get_bank_account(&self, bank_account_id: i64) -> BankResult<Option<BankAccount>>;
    /// Accounts of one client ordered by account number
    fn accounts_for_client(&self, client_id: i64) -> BankResult<Vec<BankAccount>>;
    fn update_account_status(&self, bank_account_id: i64, account_status_id: i64) -> BankResult<()>;
    fn highest_account_number(&self) -> BankResult<Option<i64>>;

    // Audit trail
    fn insert_event(&self, event: &Event) -> BankResult<()>;
    /// Events of one entity, newest first
    fn events_for_entity(&self, entity_type: &str, entity_id: &str) -> BankResult<Vec<Event>>;

    // Units of work. A store whose writes cannot fail halfway may keep the
    // no-op defaults.
    fn begin(&self) -> BankResult<()> {
        Ok(())
    }
    fn commit(&self) -> BankResult<()> {
        Ok(())
    }
    fn rollback(&self) -> BankResult<()> {
        Ok(())
    }
}

/// Lets callers pick the store at runtime (`Box<dyn BankStore + Send>`).
impl<T: BankStore + ?Sized> BankStore for Box<T> {
    fn insert_client(&self, client: &Client) -> BankResult<i64> {
        (**self).insert_client(client)
    }
    fn get_client(&self, client_id: i64) -> BankResult<Option<Client>> {
        (**self).get_client(client_id)
    }
    fn find_client_by_number(&self, client_number: i64) -> BankResult<Option<Client>> {
        (**self).find_client_by_number(client_number)
    }
    fn all_clients(&self) -> BankResult<Vec<Client>> {
        (**self).all_clients()
    }
    fn update_client(&self, client: &Client) -> BankResult<()> {
        (**self).update_client(client)
    }
    fn delete_client(&self, client_id: i64) -> BankResult<()> {
        (**self).delete_client(client_id)
    }
    fn highest_client_number(&self) -> BankResult<Option<i64>> {
        (**self).highest_client_number()
    }
    fn all_account_statuses(&self) -> BankResult<Vec<AccountStatus>> {
        (**self).all_account_statuses()
    }
    fn get_account_status(&self, account_status_id: i64) -> BankResult<Option<AccountStatus>> {
        (**self).get_account_status(account_status_id)
    }
    fn insert_bank_account(&self, account: &BankAccount) -> BankResult<i64> {
        (**self).insert_bank_account(account)
    }
    fn get_bank_account(&self, bank_account_id: i64) -> BankResult<Option<BankAccount>> {
        (**self).get_bank_account(bank_account_id)
    }
    fn accounts_for_client(&self, client_id: i64) -> BankResult<Vec<BankAccount>> {
        (**self).accounts_for_client(client_id)
    }
    fn update_account_status(&self, bank_account_id: i64, account_status_id: i64) -> BankResult<()> {
        (**self).update_account_status(bank_account_id, account_status_id)
    }
    fn highest_account_number(&self) -> BankResult<Option<i64>> {
        (**self).highest_account_number()
    }
    fn insert_event(&self, event: &Event) -> BankResult<()> {
        (**self).insert_event(event)
    }
    fn events_for_entity(&self, entity_type: &str, entity_id: &str) -> BankResult<Vec<Event>> {
        (**self).events_for_entity(entity_type, entity_id)
    }
    fn begin(&self) -> BankResult<()> {
        (**self).begin()
    }
    fn commit(&self) -> BankResult<()> {
        (**self).commit()
    }
    fn rollback(&self) -> BankResult<()> {
        (**self).rollback()
    }
}
