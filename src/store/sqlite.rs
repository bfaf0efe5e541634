use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

use super::{BankStore, Event};
use crate::entities::{AccountKind, AccountStatus, AccountType, BankAccount, Client, StatusKind};
use crate::error::{BankError, BankResult};

const DATE_FORMAT: &str = "%Y-%m-%d";

const CLIENT_COLUMNS: &str = "client_id, client_number, first_name, last_name, address, city,
     province, postal_code, date_created, notes";

const ACCOUNT_COLUMNS: &str = "bank_account_id, account_number, client_id, account_status_id,
     balance, opening_balance, date_created, notes, account_type,
     savings_service_charges, mortgage_rate, amortization, interest_rate,
     chequing_service_charges";

/// Create tables, indexes and seed statuses. Safe to run on every open.
pub fn setup_database(conn: &Connection) -> BankResult<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Clients
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS clients (
            client_id INTEGER PRIMARY KEY AUTOINCREMENT,
            client_number INTEGER UNIQUE NOT NULL,
            idempotency_hash TEXT UNIQUE NOT NULL,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            address TEXT NOT NULL,
            city TEXT NOT NULL,
            province TEXT NOT NULL,
            postal_code TEXT NOT NULL,
            date_created TEXT NOT NULL,
            notes TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Account statuses
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS account_statuses (
            account_status_id INTEGER PRIMARY KEY AUTOINCREMENT,
            description TEXT NOT NULL,
            kind TEXT UNIQUE NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Bank accounts (one table for all kinds, `account_type` discriminates)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS bank_accounts (
            bank_account_id INTEGER PRIMARY KEY AUTOINCREMENT,
            account_number INTEGER UNIQUE NOT NULL,
            client_id INTEGER NOT NULL REFERENCES clients(client_id),
            account_status_id INTEGER NOT NULL REFERENCES account_statuses(account_status_id),
            balance REAL NOT NULL,
            opening_balance REAL NOT NULL,
            date_created TEXT NOT NULL,
            notes TEXT,
            account_type TEXT NOT NULL,
            savings_service_charges REAL,
            mortgage_rate REAL,
            amortization INTEGER,
            interest_rate REAL,
            chequing_service_charges REAL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_accounts_client ON bank_accounts(client_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp)",
        [],
    )?;

    seed_account_statuses(conn)?;

    Ok(())
}

fn seed_account_statuses(conn: &Connection) -> BankResult<()> {
    let mut seeded = 0;
    for status in AccountStatus::defaults() {
        seeded += conn.execute(
            "INSERT OR IGNORE INTO account_statuses (description, kind) VALUES (?1, ?2)",
            params![status.description, status.kind.as_str()],
        )?;
    }
    if seeded > 0 {
        tracing::debug!(seeded, "seeded account statuses");
    }
    Ok(())
}

// ============================================================================
// SQLITE STORE
// ============================================================================

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a database file; enables WAL for crash recovery
    pub fn open(path: &Path) -> BankResult<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        tracing::info!(path = %path.display(), "opened database");
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> BankResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> BankResult<Self> {
        setup_database(&conn)?;
        Ok(SqliteStore { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn count_clients(&self) -> BankResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM clients", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl BankStore for SqliteStore {
    fn insert_client(&self, client: &Client) -> BankResult<i64> {
        let result = self.conn.execute(
            "INSERT INTO clients (
                client_number, idempotency_hash, first_name, last_name, address,
                city, province, postal_code, date_created, notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                client.client_number,
                client.compute_idempotency_hash(),
                client.first_name,
                client.last_name,
                client.address,
                client.city,
                client.province,
                client.postal_code,
                client.date_created.format(DATE_FORMAT).to_string(),
                client.notes,
            ],
        );

        match result {
            Ok(_) => Ok(self.conn.last_insert_rowid()),
            Err(e) => Err(constraint_error(e, "client", client.client_number)),
        }
    }

    fn get_client(&self, client_id: i64) -> BankResult<Option<Client>> {
        let sql = format!("SELECT {} FROM clients WHERE client_id = ?1", CLIENT_COLUMNS);
        let client = self
            .conn
            .query_row(&sql, [client_id], row_to_client)
            .optional()?;
        Ok(client)
    }

    fn find_client_by_number(&self, client_number: i64) -> BankResult<Option<Client>> {
        let sql = format!("SELECT {} FROM clients WHERE client_number = ?1", CLIENT_COLUMNS);
        let client = self
            .conn
            .query_row(&sql, [client_number], row_to_client)
            .optional()?;
        Ok(client)
    }

    fn all_clients(&self) -> BankResult<Vec<Client>> {
        let sql = format!("SELECT {} FROM clients ORDER BY client_number", CLIENT_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let clients = stmt
            .query_map([], row_to_client)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(clients)
    }

    fn update_client(&self, client: &Client) -> BankResult<()> {
        let client_id = client
            .client_id
            .ok_or_else(|| BankError::not_found("client", "unsaved"))?;

        let result = self.conn.execute(
            "UPDATE clients
             SET client_number = ?1, idempotency_hash = ?2, first_name = ?3,
                 last_name = ?4, address = ?5, city = ?6, province = ?7,
                 postal_code = ?8, date_created = ?9, notes = ?10
             WHERE client_id = ?11",
            params![
                client.client_number,
                client.compute_idempotency_hash(),
                client.first_name,
                client.last_name,
                client.address,
                client.city,
                client.province,
                client.postal_code,
                client.date_created.format(DATE_FORMAT).to_string(),
                client.notes,
                client_id,
            ],
        );

        match result {
            Ok(0) => Err(BankError::not_found("client", client_id)),
            Ok(_) => Ok(()),
            Err(e) => Err(constraint_error(e, "client", client.client_number)),
        }
    }

    fn delete_client(&self, client_id: i64) -> BankResult<()> {
        match self
            .conn
            .execute("DELETE FROM clients WHERE client_id = ?1", [client_id])
        {
            Ok(0) => Err(BankError::not_found("client", client_id)),
            Ok(_) => Ok(()),
            Err(e) => Err(constraint_error(e, "client", client_id)),
        }
    }

    fn highest_client_number(&self) -> BankResult<Option<i64>> {
        let highest = self
            .conn
            .query_row("SELECT MAX(client_number) FROM clients", [], |row| row.get(0))?;
        Ok(highest)
    }

    fn all_account_statuses(&self) -> BankResult<Vec<AccountStatus>> {
        let mut stmt = self.conn.prepare(
            "SELECT account_status_id, description, kind
             FROM account_statuses
             ORDER BY account_status_id",
        )?;
        let statuses = stmt
            .query_map([], row_to_status)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(statuses)
    }

    fn get_account_status(&self, account_status_id: i64) -> BankResult<Option<AccountStatus>> {
        let status = self
            .conn
            .query_row(
                "SELECT account_status_id, description, kind
                 FROM account_statuses
                 WHERE account_status_id = ?1",
                [account_status_id],
                row_to_status,
            )
            .optional()?;
        Ok(status)
    }

    fn insert_bank_account(&self, account: &BankAccount) -> BankResult<i64> {
        let (savings, mortgage_rate, amortization, interest, chequing) = match &account.kind {
            AccountKind::Savings { savings_service_charges } => {
                (Some(*savings_service_charges), None, None, None, None)
            }
            AccountKind::Mortgage { mortgage_rate, amortization } => {
                (None, Some(*mortgage_rate), *amortization, None, None)
            }
            AccountKind::Investment { interest_rate } => {
                (None, None, None, Some(*interest_rate), None)
            }
            AccountKind::Chequing { chequing_service_charges } => {
                (None, None, None, None, Some(*chequing_service_charges))
            }
        };

        let result = self.conn.execute(
            "INSERT INTO bank_accounts (
                account_number, client_id, account_status_id, balance, opening_balance,
                date_created, notes, account_type,
                savings_service_charges, mortgage_rate, amortization, interest_rate,
                chequing_service_charges
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                account.account_number,
                account.client_id,
                account.account_status_id,
                account.balance,
                account.opening_balance,
                account.date_created.format(DATE_FORMAT).to_string(),
                account.notes,
                account.account_type().discriminator(),
                savings,
                mortgage_rate,
                amortization,
                interest,
                chequing,
            ],
        );

        match result {
            Ok(_) => Ok(self.conn.last_insert_rowid()),
            Err(e) => Err(constraint_error(e, "bank account", account.account_number)),
        }
    }

    fn get_bank_account(&self, bank_account_id: i64) -> BankResult<Option<BankAccount>> {
        let sql = format!(
            "SELECT {} FROM bank_accounts WHERE bank_account_id = ?1",
            ACCOUNT_COLUMNS
        );
        let account = self
            .conn
            .query_row(&sql, [bank_account_id], row_to_account)
            .optional()?;
        Ok(account)
    }

    fn accounts_for_client(&self, client_id: i64) -> BankResult<Vec<BankAccount>> {
        let sql = format!(
            "SELECT {} FROM bank_accounts WHERE client_id = ?1 ORDER BY account_number",
            ACCOUNT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let accounts = stmt
            .query_map([client_id], row_to_account)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    fn update_account_status(&self, bank_account_id: i64, account_status_id: i64) -> BankResult<()> {
        match self.conn.execute(
            "UPDATE bank_accounts SET account_status_id = ?1 WHERE bank_account_id = ?2",
            params![account_status_id, bank_account_id],
        ) {
            Ok(0) => Err(BankError::not_found("bank account", bank_account_id)),
            Ok(_) => Ok(()),
            Err(e) => Err(constraint_error(e, "bank account", bank_account_id)),
        }
    }

    fn highest_account_number(&self) -> BankResult<Option<i64>> {
        let highest = self.conn.query_row(
            "SELECT MAX(account_number) FROM bank_accounts",
            [],
            |row| row.get(0),
        )?;
        Ok(highest)
    }

    fn insert_event(&self, event: &Event) -> BankResult<()> {
        let data_json = serde_json::to_string(&event.data)?;

        self.conn.execute(
            "INSERT INTO events (
                event_id, timestamp, event_type, entity_type, entity_id, data, actor
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event.event_id,
                event.timestamp.to_rfc3339(),
                event.event_type,
                event.entity_type,
                event.entity_id,
                data_json,
                event.actor,
            ],
        )?;

        Ok(())
    }

    fn events_for_entity(&self, entity_type: &str, entity_id: &str) -> BankResult<Vec<Event>> {
        let mut stmt = self.conn.prepare(
            "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
             FROM events
             WHERE entity_type = ?1 AND entity_id = ?2
             ORDER BY timestamp DESC, id DESC",
        )?;

        let events = stmt
            .query_map(params![entity_type, entity_id], |row| {
                let timestamp_str: String = row.get(1)?;
                let data_json: String = row.get(5)?;

                Ok(Event {
                    event_id: row.get(0)?,
                    timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                        .map_err(|e| conversion_error(1, e))?
                        .with_timezone(&Utc),
                    event_type: row.get(2)?,
                    entity_type: row.get(3)?,
                    entity_id: row.get(4)?,
                    data: serde_json::from_str(&data_json).map_err(|e| conversion_error(5, e))?,
                    actor: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(events)
    }

    fn begin(&self) -> BankResult<()> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn commit(&self) -> BankResult<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&self) -> BankResult<()> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }
}

// ============================================================================
// ROW MAPPING
// ============================================================================

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn parse_date(row: &Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|e| conversion_error(idx, e))
}

fn row_to_client(row: &Row) -> rusqlite::Result<Client> {
    Ok(Client {
        client_id: Some(row.get(0)?),
        client_number: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        address: row.get(4)?,
        city: row.get(5)?,
        province: row.get(6)?,
        postal_code: row.get(7)?,
        date_created: parse_date(row, 8)?,
        notes: row.get(9)?,
    })
}

fn row_to_status(row: &Row) -> rusqlite::Result<AccountStatus> {
    let kind: String = row.get(2)?;
    Ok(AccountStatus {
        account_status_id: Some(row.get(0)?),
        description: row.get(1)?,
        kind: kind.parse::<StatusKind>().map_err(|e| conversion_error(2, e))?,
    })
}

fn row_to_account(row: &Row) -> rusqlite::Result<BankAccount> {
    let discriminator: String = row.get(8)?;
    let account_type = AccountType::from_discriminator(&discriminator).ok_or_else(|| {
        conversion_error(
            8,
            BankError::UnknownVariant {
                what: "account type",
                value: discriminator.clone(),
            },
        )
    })?;

    let kind = match account_type {
        AccountType::Savings => AccountKind::Savings {
            savings_service_charges: row.get(9)?,
        },
        AccountType::Mortgage => AccountKind::Mortgage {
            mortgage_rate: row.get(10)?,
            amortization: row.get(11)?,
        },
        AccountType::Investment => AccountKind::Investment {
            interest_rate: row.get(12)?,
        },
        AccountType::Chequing => AccountKind::Chequing {
            chequing_service_charges: row.get(13)?,
        },
    };

    Ok(BankAccount {
        bank_account_id: Some(row.get(0)?),
        account_number: row.get(1)?,
        client_id: row.get(2)?,
        account_status_id: row.get(3)?,
        balance: row.get(4)?,
        opening_balance: row.get(5)?,
        date_created: parse_date(row, 6)?,
        notes: row.get(7)?,
        kind,
    })
}

/// Constraint violations become domain errors; anything else stays a
/// database error.
fn constraint_error(err: rusqlite::Error, entity: &'static str, key: impl ToString) -> BankError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, message)
            if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            let detail = message.clone().unwrap_or_default();
            if detail.contains("FOREIGN KEY") {
                BankError::Conflict(format!(
                    "{} {} is still referenced or references a missing row",
                    entity,
                    key.to_string()
                ))
            } else {
                BankError::Duplicate {
                    entity,
                    key: format!("{} ({})", key.to_string(), detail),
                }
            }
        }
        _ => BankError::Database(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_client(first: &str, number: i64) -> Client {
        let mut client = Client::new(first, "Babbage", "5 Engine St", "Guelph", "ON", "N1H 2B3");
        client.client_number = number;
        client
    }

    #[test]
    fn test_setup_is_idempotent_and_seeds_statuses() {
        let store = SqliteStore::open_in_memory().unwrap();
        setup_database(store.connection()).unwrap();

        let statuses = store.all_account_statuses().unwrap();
        assert_eq!(statuses.len(), 5);
        assert_eq!(statuses[0].kind, StatusKind::Active);
        assert_eq!(statuses[4].kind, StatusKind::Closed);
        assert!(statuses.iter().all(|s| s.account_status_id.is_some()));
    }

    #[test]
    fn test_client_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let client = sample_client("Charles", 10_000_000).with_notes("VIP");

        let id = store.insert_client(&client).unwrap();
        let loaded = store.get_client(id).unwrap().unwrap();

        assert_eq!(loaded.client_id, Some(id));
        assert_eq!(loaded.full_name(), "Charles Babbage");
        assert_eq!(loaded.date_created, client.date_created);
        assert_eq!(loaded.notes.as_deref(), Some("VIP"));

        let by_number = store.find_client_by_number(10_000_000).unwrap().unwrap();
        assert_eq!(by_number.client_id, Some(id));
        assert!(store.find_client_by_number(10_000_001).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_import_is_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_client(&sample_client("Charles", 10_000_000)).unwrap();

        // Same person, different number
        let err = store
            .insert_client(&sample_client("Charles", 10_000_001))
            .unwrap_err();
        assert!(matches!(err, BankError::Duplicate { .. }));

        // Same number, different person
        let err = store
            .insert_client(&sample_client("Henry", 10_000_000))
            .unwrap_err();
        assert!(matches!(err, BankError::Duplicate { .. }));

        assert_eq!(store.count_clients().unwrap(), 1);
    }

    #[test]
    fn test_highest_numbers() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.highest_client_number().unwrap(), None);
        assert_eq!(store.highest_account_number().unwrap(), None);

        store.insert_client(&sample_client("A", 10_000_005)).unwrap();
        store.insert_client(&sample_client("B", 10_000_002)).unwrap();
        assert_eq!(store.highest_client_number().unwrap(), Some(10_000_005));
    }

    #[test]
    fn test_update_and_delete_client() {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store.insert_client(&sample_client("Ada", 10_000_000)).unwrap();

        let mut client = store.get_client(id).unwrap().unwrap();
        client.city = "Toronto".to_string();
        store.update_client(&client).unwrap();
        assert_eq!(store.get_client(id).unwrap().unwrap().city, "Toronto");

        store.delete_client(id).unwrap();
        assert!(store.get_client(id).unwrap().is_none());
        assert!(matches!(
            store.delete_client(id).unwrap_err(),
            BankError::NotFound { .. }
        ));
    }

    #[test]
    fn test_every_account_kind_round_trips() {
        let store = SqliteStore::open_in_memory().unwrap();
        let client_id = store.insert_client(&sample_client("Ada", 10_000_000)).unwrap();

        let accounts = vec![
            BankAccount::savings(client_id, 1, 100.0, 2.5),
            BankAccount::mortgage(client_id, 1, 250_000.0, 0.049, Some(300)),
            BankAccount::mortgage(client_id, 2, 90_000.0, 0.051, None),
            BankAccount::investment(client_id, 1, 10_000.0, 0.035).with_notes("TFSA"),
            BankAccount::chequing(client_id, 3, 50.0, 4.0),
        ];

        for (i, mut account) in accounts.into_iter().enumerate() {
            account.account_number = i as i64 + 1;
            let id = store.insert_bank_account(&account).unwrap();
            let loaded = store.get_bank_account(id).unwrap().unwrap();

            account.bank_account_id = Some(id);
            assert_eq!(loaded, account);
        }

        let listed = store.accounts_for_client(client_id).unwrap();
        assert_eq!(listed.len(), 5);
        assert_eq!(store.highest_account_number().unwrap(), Some(5));
    }

    #[test]
    fn test_foreign_keys_are_enforced() {
        let store = SqliteStore::open_in_memory().unwrap();

        let mut orphan = BankAccount::savings(999, 1, 0.0, 0.0);
        orphan.account_number = 1;
        let err = store.insert_bank_account(&orphan).unwrap_err();
        assert!(matches!(err, BankError::Conflict(_)));

        let client_id = store.insert_client(&sample_client("Ada", 10_000_000)).unwrap();
        let mut account = BankAccount::savings(client_id, 1, 0.0, 0.0);
        account.account_number = 1;
        store.insert_bank_account(&account).unwrap();

        let err = store.delete_client(client_id).unwrap_err();
        assert!(matches!(err, BankError::Conflict(_)));
    }

    #[test]
    fn test_update_account_status() {
        let store = SqliteStore::open_in_memory().unwrap();
        let client_id = store.insert_client(&sample_client("Ada", 10_000_000)).unwrap();
        let mut account = BankAccount::chequing(client_id, 1, 10.0, 1.0);
        account.account_number = 1;
        let id = store.insert_bank_account(&account).unwrap();

        store.update_account_status(id, 4).unwrap();
        assert_eq!(store.get_bank_account(id).unwrap().unwrap().account_status_id, 4);

        assert!(matches!(
            store.update_account_status(id + 1, 4).unwrap_err(),
            BankError::NotFound { .. }
        ));
    }

    #[test]
    fn test_event_log() {
        let store = SqliteStore::open_in_memory().unwrap();

        let event = Event::new(
            "client_registered",
            "client",
            "1",
            serde_json::json!({"client_number": 10000000}),
            "test_actor",
        );
        store.insert_event(&event).unwrap();

        let events = store.events_for_entity("client", "1").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "client_registered");
        assert_eq!(events[0].actor, "test_actor");
        assert_eq!(events[0].data["client_number"], 10000000);

        assert!(store.events_for_entity("client", "2").unwrap().is_empty());
    }
}
