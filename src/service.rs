// Bank service - the operations callers use on top of a store
//
// Every write goes through here: numbers are assigned, entities validated,
// references checked, and an audit event recorded.

use serde::Serialize;

use crate::entities::{AccountStatus, BankAccount, Client};
use crate::error::{BankError, BankResult};
use crate::store::{BankStore, Event};
use crate::validation::Validator;

/// A bank account with its client and status resolved.
#[derive(Debug, Clone, Serialize)]
pub struct AccountDetails {
    pub account: BankAccount,
    pub client: Client,
    pub status: AccountStatus,
    /// Base rate plus the status adjustment, for rate-bearing accounts
    pub effective_rate: Option<f64>,
}

pub struct BankService<S> {
    store: S,
    validator: Validator,
    actor: String,
}

impl<S: BankStore> BankService<S> {
    pub fn new(store: S) -> BankResult<Self> {
        Ok(BankService {
            store,
            validator: Validator::new()?,
            actor: "system".to_string(),
        })
    }

    /// Name recorded on audit events
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    // ========================================================================
    // CLIENTS
    // ========================================================================

    /// Number, validate and store a new client.
    pub fn register_client(&self, mut client: Client) -> BankResult<Client> {
        if !client.has_number() {
            client.set_next_client_number(self.store.highest_client_number()?)?;
        }
        self.validator
            .validate_client(&client)
            .map_err(BankError::Validation)?;

        let client_id = self.atomically(|| {
            let client_id = self.store.insert_client(&client)?;
            self.record(
                "client_registered",
                "client",
                client_id,
                serde_json::json!({
                    "client_number": client.client_number,
                    "name": client.full_name(),
                }),
            )?;
            Ok(client_id)
        })?;
        client.client_id = Some(client_id);
        tracing::info!(client_id, client_number = client.client_number, "client registered");

        Ok(client)
    }

    pub fn client(&self, client_id: i64) -> BankResult<Client> {
        self.store
            .get_client(client_id)?
            .ok_or_else(|| BankError::not_found("client", client_id))
    }

    pub fn client_by_number(&self, client_number: i64) -> BankResult<Client> {
        self.store
            .find_client_by_number(client_number)?
            .ok_or_else(|| BankError::not_found("client", client_number))
    }

    pub fn clients(&self) -> BankResult<Vec<Client>> {
        self.store.all_clients()
    }

    /// Replace a stored client's values. An unassigned number keeps the
    /// stored one.
    pub fn update_client(&self, mut client: Client) -> BankResult<Client> {
        let client_id = client
            .client_id
            .ok_or_else(|| BankError::not_found("client", "unsaved"))?;
        let existing = self.client(client_id)?;

        if !client.has_number() {
            client.client_number = existing.client_number;
        }
        self.validator
            .validate_client(&client)
            .map_err(BankError::Validation)?;

        self.atomically(|| {
            self.store.update_client(&client)?;
            self.record(
                "client_updated",
                "client",
                client_id,
                serde_json::json!({
                    "before": existing,
                    "after": client,
                }),
            )
        })?;
        tracing::info!(client_id, "client updated");

        Ok(client)
    }

    /// Delete a client that holds no accounts.
    pub fn remove_client(&self, client_id: i64) -> BankResult<()> {
        let client = self.client(client_id)?;
        let accounts = self.store.accounts_for_client(client_id)?;
        if !accounts.is_empty() {
            return Err(BankError::Conflict(format!(
                "client {} still holds {} account(s)",
                client.client_number,
                accounts.len()
            )));
        }

        self.atomically(|| {
            self.store.delete_client(client_id)?;
            self.record(
                "client_removed",
                "client",
                client_id,
                serde_json::json!({ "client_number": client.client_number }),
            )
        })?;
        tracing::info!(client_id, "client removed");
        Ok(())
    }

    /// Accounts held by a client
    pub fn client_accounts(&self, client_id: i64) -> BankResult<Vec<BankAccount>> {
        self.client(client_id)?;
        self.store.accounts_for_client(client_id)
    }

    // ========================================================================
    // STATUSES
    // ========================================================================

    pub fn statuses(&self) -> BankResult<Vec<AccountStatus>> {
        self.store.all_account_statuses()
    }

    pub fn status(&self, account_status_id: i64) -> BankResult<AccountStatus> {
        self.store
            .get_account_status(account_status_id)?
            .ok_or_else(|| BankError::not_found("account status", account_status_id))
    }

    // ========================================================================
    // ACCOUNTS
    // ========================================================================

    /// Number, validate and store a new account for an existing client.
    /// The account opens with its balance equal to the opening balance.
    pub fn open_account(&self, mut account: BankAccount) -> BankResult<BankAccount> {
        let client = self.client(account.client_id)?;
        let status = self.status(account.account_status_id)?;

        account.balance = account.opening_balance;

        if !account.has_number() {
            account.set_next_account_number(self.store.highest_account_number()?)?;
        }
        self.validator
            .validate_bank_account(&account)
            .map_err(BankError::Validation)?;

        let account_id = self.atomically(|| {
            let account_id = self.store.insert_bank_account(&account)?;
            self.record(
                "account_opened",
                "bank_account",
                account_id,
                serde_json::json!({
                    "account_number": account.account_number,
                    "account_type": account.account_type().as_str(),
                    "client_number": client.client_number,
                    "status": status.description,
                    "opening_balance": account.opening_balance,
                }),
            )?;
            Ok(account_id)
        })?;
        account.bank_account_id = Some(account_id);
        tracing::info!(
            account_id,
            account_number = account.account_number,
            account_type = account.account_type().as_str(),
            client_number = client.client_number,
            "account opened"
        );

        Ok(account)
    }

    pub fn account(&self, bank_account_id: i64) -> BankResult<BankAccount> {
        self.store
            .get_bank_account(bank_account_id)?
            .ok_or_else(|| BankError::not_found("bank account", bank_account_id))
    }

    pub fn account_details(&self, bank_account_id: i64) -> BankResult<AccountDetails> {
        let account = self.account(bank_account_id)?;
        let client = self.client(account.client_id)?;
        let status = self.status(account.account_status_id)?;
        let effective_rate = account.effective_rate(&status);

        Ok(AccountDetails {
            account,
            client,
            status,
            effective_rate,
        })
    }

    pub fn change_account_status(
        &self,
        bank_account_id: i64,
        account_status_id: i64,
    ) -> BankResult<BankAccount> {
        let mut account = self.account(bank_account_id)?;
        let status = self.status(account_status_id)?;
        let previous = account.account_status_id;

        if previous == account_status_id {
            return Ok(account);
        }

        self.atomically(|| {
            self.store
                .update_account_status(bank_account_id, account_status_id)?;
            self.record(
                "account_status_changed",
                "bank_account",
                bank_account_id,
                serde_json::json!({
                    "from": previous,
                    "to": account_status_id,
                    "status": status.description,
                }),
            )
        })?;
        account.account_status_id = account_status_id;
        tracing::info!(bank_account_id, status = %status.kind, "account status changed");

        Ok(account)
    }

    /// Audit events for one entity, newest first
    pub fn history(&self, entity_type: &str, entity_id: i64) -> BankResult<Vec<Event>> {
        self.store
            .events_for_entity(entity_type, &entity_id.to_string())
    }

    /// Run `work` as one unit: the entity write and its audit event land
    /// together or not at all.
    fn atomically<T>(&self, work: impl FnOnce() -> BankResult<T>) -> BankResult<T> {
        self.store.begin()?;
        match work() {
            Ok(value) => {
                self.store.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.store.rollback() {
                    tracing::error!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }

    fn record(
        &self,
        event_type: &str,
        entity_type: &str,
        entity_id: i64,
        data: serde_json::Value,
    ) -> BankResult<()> {
        let event = Event::new(
            event_type,
            entity_type,
            &entity_id.to_string(),
            data,
            &self.actor,
        );
        self.store.insert_event(&event)
    }
}
