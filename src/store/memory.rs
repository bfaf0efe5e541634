// In-process store
//
// Holds every entity behind one lock and mirrors the SQLite store's rules:
// identities are handed out in insertion order, numbers and client hashes are
// unique, and foreign keys must point at existing rows.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{BankStore, Event};
use crate::entities::{AccountStatus, BankAccount, Client};
use crate::error::{BankError, BankResult};

#[derive(Default)]
struct Tables {
    clients: Vec<Client>,
    statuses: Vec<AccountStatus>,
    accounts: Vec<BankAccount>,
    events: Vec<Event>,
    next_client_id: i64,
    next_account_id: i64,
}

/// Cloning shares the underlying tables.
#[derive(Clone)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    /// Create an empty store with the default statuses seeded
    pub fn new() -> Self {
        let statuses = AccountStatus::defaults()
            .into_iter()
            .zip(1..)
            .map(|(mut status, id)| {
                status.account_status_id = Some(id);
                status
            })
            .collect();

        MemoryStore {
            tables: Arc::new(RwLock::new(Tables {
                statuses,
                next_client_id: 1,
                next_account_id: 1,
                ..Tables::default()
            })),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn client_count(&self) -> usize {
        self.read().clients.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Uniqueness checks shared by insert and update; `skip` excludes the row
/// being updated.
fn check_client_unique(tables: &Tables, client: &Client, skip: Option<i64>) -> BankResult<()> {
    let hash = client.compute_idempotency_hash();
    for existing in tables
        .clients
        .iter()
        .filter(|c| skip.is_none() || c.client_id != skip)
    {
        if existing.client_number == client.client_number {
            return Err(BankError::Duplicate {
                entity: "client",
                key: format!("{} (client_number)", client.client_number),
            });
        }
        if existing.compute_idempotency_hash() == hash {
            return Err(BankError::Duplicate {
                entity: "client",
                key: format!("{} (idempotency_hash)", client.client_number),
            });
        }
    }
    Ok(())
}

impl BankStore for MemoryStore {
    fn insert_client(&self, client: &Client) -> BankResult<i64> {
        let mut tables = self.write();
        check_client_unique(&tables, client, None)?;

        let id = tables.next_client_id;
        tables.next_client_id += 1;

        let mut stored = client.clone();
        stored.client_id = Some(id);
        tables.clients.push(stored);
        Ok(id)
    }

    fn get_client(&self, client_id: i64) -> BankResult<Option<Client>> {
        Ok(self
            .read()
            .clients
            .iter()
            .find(|c| c.client_id == Some(client_id))
            .cloned())
    }

    fn find_client_by_number(&self, client_number: i64) -> BankResult<Option<Client>> {
        Ok(self
            .read()
            .clients
            .iter()
            .find(|c| c.client_number == client_number)
            .cloned())
    }

    fn all_clients(&self) -> BankResult<Vec<Client>> {
        let mut clients = self.read().clients.clone();
        clients.sort_by_key(|c| c.client_number);
        Ok(clients)
    }

    fn update_client(&self, client: &Client) -> BankResult<()> {
        let client_id = client
            .client_id
            .ok_or_else(|| BankError::not_found("client", "unsaved"))?;

        let mut tables = self.write();
        let position = tables
            .clients
            .iter()
            .position(|c| c.client_id == Some(client_id))
            .ok_or_else(|| BankError::not_found("client", client_id))?;

        check_client_unique(&tables, client, Some(client_id))?;
        tables.clients[position] = client.clone();
        Ok(())
    }

    fn delete_client(&self, client_id: i64) -> BankResult<()> {
        let mut tables = self.write();
        if tables.accounts.iter().any(|a| a.client_id == client_id) {
            return Err(BankError::Conflict(format!(
                "client {} is still referenced or references a missing row",
                client_id
            )));
        }

        let before = tables.clients.len();
        tables.clients.retain(|c| c.client_id != Some(client_id));
        if tables.clients.len() == before {
            return Err(BankError::not_found("client", client_id));
        }
        Ok(())
    }

    fn highest_client_number(&self) -> BankResult<Option<i64>> {
        Ok(self.read().clients.iter().map(|c| c.client_number).max())
    }

    fn all_account_statuses(&self) -> BankResult<Vec<AccountStatus>> {
        Ok(self.read().statuses.clone())
    }

    fn get_account_status(&self, account_status_id: i64) -> BankResult<Option<AccountStatus>> {
        Ok(self
            .read()
            .statuses
            .iter()
            .find(|s| s.account_status_id == Some(account_status_id))
            .cloned())
    }

    fn insert_bank_account(&self, account: &BankAccount) -> BankResult<i64> {
        let mut tables = self.write();

        if tables
            .accounts
            .iter()
            .any(|a| a.account_number == account.account_number)
        {
            return Err(BankError::Duplicate {
                entity: "bank account",
                key: format!("{} (account_number)", account.account_number),
            });
        }

        let client_exists = tables
            .clients
            .iter()
            .any(|c| c.client_id == Some(account.client_id));
        let status_exists = tables
            .statuses
            .iter()
            .any(|s| s.account_status_id == Some(account.account_status_id));
        if !client_exists || !status_exists {
            return Err(BankError::Conflict(format!(
                "bank account {} is still referenced or references a missing row",
                account.account_number
            )));
        }

        let id = tables.next_account_id;
        tables.next_account_id += 1;

        let mut stored = account.clone();
        stored.bank_account_id = Some(id);
        tables.accounts.push(stored);
        Ok(id)
    }

    fn get_bank_account(&self, bank_account_id: i64) -> BankResult<Option<BankAccount>> {
        Ok(self
            .read()
            .accounts
            .iter()
            .find(|a| a.bank_account_id == Some(bank_account_id))
            .cloned())
    }

    fn accounts_for_client(&self, client_id: i64) -> BankResult<Vec<BankAccount>> {
        let mut accounts: Vec<BankAccount> = self
            .read()
            .accounts
            .iter()
            .filter(|a| a.client_id == client_id)
            .cloned()
            .collect();
        accounts.sort_by_key(|a| a.account_number);
        Ok(accounts)
    }

    fn update_account_status(&self, bank_account_id: i64, account_status_id: i64) -> BankResult<()> {
        let mut tables = self.write();

        let position = tables
            .accounts
            .iter()
            .position(|a| a.bank_account_id == Some(bank_account_id))
            .ok_or_else(|| BankError::not_found("bank account", bank_account_id))?;

        if !tables
            .statuses
            .iter()
            .any(|s| s.account_status_id == Some(account_status_id))
        {
            return Err(BankError::Conflict(format!(
                "bank account {} is still referenced or references a missing row",
                bank_account_id
            )));
        }

        tables.accounts[position].account_status_id = account_status_id;
        Ok(())
    }

    fn highest_account_number(&self) -> BankResult<Option<i64>> {
        Ok(self.read().accounts.iter().map(|a| a.account_number).max())
    }

    fn insert_event(&self, event: &Event) -> BankResult<()> {
        self.write().events.push(event.clone());
        Ok(())
    }

    fn events_for_entity(&self, entity_type: &str, entity_id: &str) -> BankResult<Vec<Event>> {
        let mut events: Vec<Event> = self
            .read()
            .events
            .iter()
            .filter(|e| e.entity_type == entity_type && e.entity_id == entity_id)
            .cloned()
            .collect();
        events.reverse();
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::StatusKind;

    fn sample_client(first: &str, number: i64) -> Client {
        let mut client = Client::new(first, "Turing", "2 Bletchley Ln", "Ottawa", "ON", "K1A 0B1");
        client.client_number = number;
        client
    }

    #[test]
    fn test_statuses_seeded_with_ids() {
        let store = MemoryStore::new();
        let statuses = store.all_account_statuses().unwrap();
        assert_eq!(statuses.len(), 5);
        assert_eq!(statuses[2].account_status_id, Some(3));
        assert_eq!(statuses[2].kind, StatusKind::Delinquent);
        assert_eq!(
            store.get_account_status(5).unwrap().unwrap().kind,
            StatusKind::Closed
        );
        assert!(store.get_account_status(6).unwrap().is_none());
    }

    #[test]
    fn test_identities_are_sequential() {
        let store = MemoryStore::new();
        let a = store.insert_client(&sample_client("Alan", 10_000_000)).unwrap();
        let b = store.insert_client(&sample_client("Joan", 10_000_001)).unwrap();
        assert_eq!((a, b), (1, 2));
        assert_eq!(store.client_count(), 2);
    }

    #[test]
    fn test_clients_sorted_by_number() {
        let store = MemoryStore::new();
        store.insert_client(&sample_client("Late", 10_000_009)).unwrap();
        store.insert_client(&sample_client("Early", 10_000_001)).unwrap();

        let names: Vec<String> = store
            .all_clients()
            .unwrap()
            .into_iter()
            .map(|c| c.first_name)
            .collect();
        assert_eq!(names, vec!["Early", "Late"]);
    }

    #[test]
    fn test_update_rejects_collision_with_other_client() {
        let store = MemoryStore::new();
        store.insert_client(&sample_client("Alan", 10_000_000)).unwrap();
        let id = store.insert_client(&sample_client("Joan", 10_000_001)).unwrap();

        let mut joan = store.get_client(id).unwrap().unwrap();
        joan.city = "Kingston".to_string();
        store.update_client(&joan).unwrap();

        joan.client_number = 10_000_000;
        assert!(matches!(
            store.update_client(&joan).unwrap_err(),
            BankError::Duplicate { .. }
        ));
    }

    #[test]
    fn test_account_foreign_keys() {
        let store = MemoryStore::new();
        let mut account = BankAccount::savings(1, 1, 0.0, 0.0);
        account.account_number = 1;
        assert!(matches!(
            store.insert_bank_account(&account).unwrap_err(),
            BankError::Conflict(_)
        ));

        let client_id = store.insert_client(&sample_client("Alan", 10_000_000)).unwrap();
        account.client_id = client_id;
        let id = store.insert_bank_account(&account).unwrap();

        assert!(matches!(
            store.update_account_status(id, 42).unwrap_err(),
            BankError::Conflict(_)
        ));
        assert!(matches!(
            store.delete_client(client_id).unwrap_err(),
            BankError::Conflict(_)
        ));
    }

    #[test]
    fn test_clones_share_tables() {
        let store = MemoryStore::new();
        let other = store.clone();
        store.insert_client(&sample_client("Alan", 10_000_000)).unwrap();
        assert_eq!(other.client_count(), 1);
    }

    #[test]
    fn test_events_newest_first() {
        let store = MemoryStore::new();
        for kind in ["first", "second"] {
            store
                .insert_event(&Event::new(kind, "client", "1", serde_json::json!({}), "test"))
                .unwrap();
        }
        let events = store.events_for_entity("client", "1").unwrap();
        assert_eq!(events[0].event_type, "second");
        assert_eq!(events[1].event_type, "first");
    }
}
