// 👤 Client Entity - the customer who owns bank accounts
//
// Identity: client_id (store-assigned)
// Business key: client_number (8 digits, assigned from a sequence)
// Relationship: Client 1 → N BankAccount (resolved through the store)

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{BankError, BankResult};

/// First client number handed out.
pub const CLIENT_NUMBER_MIN: i64 = 10_000_000;

/// Last valid client number.
pub const CLIENT_NUMBER_MAX: i64 = 99_999_999;

// ============================================================================
// CLIENT ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    /// Store-assigned identity (None until persisted)
    #[serde(default)]
    pub client_id: Option<i64>,

    /// Business key, 0 until assigned
    #[serde(default)]
    pub client_number: i64,

    pub first_name: String,
    pub last_name: String,

    /// Street address
    pub address: String,

    pub city: String,

    /// Two-letter province code, e.g. "ON"
    pub province: String,

    /// Canadian postal code, e.g. "N2G 4M4"
    pub postal_code: String,

    pub date_created: NaiveDate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Client {
    /// Create a client dated today, with no number assigned yet.
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        address: impl Into<String>,
        city: impl Into<String>,
        province: impl Into<String>,
        postal_code: impl Into<String>,
    ) -> Self {
        Client {
            client_id: None,
            client_number: 0,
            first_name: first_name.into(),
            last_name: last_name.into(),
            address: address.into(),
            city: city.into(),
            province: province.into(),
            postal_code: postal_code.into(),
            date_created: Local::now().date_naive(),
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// "Address City,Province PostalCode"
    pub fn full_address(&self) -> String {
        format!(
            "{} {},{} {}",
            self.address, self.city, self.province, self.postal_code
        )
    }

    pub fn has_number(&self) -> bool {
        self.client_number != 0
    }

    /// Assign the number following `highest` (the largest one already in use).
    pub fn set_next_client_number(&mut self, highest: Option<i64>) -> BankResult<()> {
        self.client_number = next_client_number(highest)?;
        Ok(())
    }

    /// Deduplication key over the fields that identify a person at an address.
    /// NOTE: this is for import deduplication, not identity (that is client_id).
    pub fn compute_idempotency_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}|{}|{}|{}",
            self.first_name.trim().to_lowercase(),
            self.last_name.trim().to_lowercase(),
            self.address.trim().to_lowercase(),
            self.postal_code.replace(' ', "").to_uppercase()
        ));
        format!("{:x}", hasher.finalize())
    }
}

pub fn next_client_number(highest: Option<i64>) -> BankResult<i64> {
    match highest {
        None => Ok(CLIENT_NUMBER_MIN),
        Some(last) if last < CLIENT_NUMBER_MIN => Ok(CLIENT_NUMBER_MIN),
        Some(last) if last >= CLIENT_NUMBER_MAX => Err(BankError::NumberSpaceExhausted {
            what: "client",
            last,
        }),
        Some(last) => Ok(last + 1),
    }
}
