// 💳 Bank Account Entity - one account held by a client
//
// Identity: bank_account_id (store-assigned)
// Business key: account_number (shared sequence across all kinds)
// Relationships: client_id → Client, account_status_id → AccountStatus
// Kind-specific fields (charges, rates) live in the AccountKind enum.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::entities::account_status::AccountStatus;
use crate::error::{BankError, BankResult};

/// First account number handed out.
pub const ACCOUNT_NUMBER_START: i64 = 1;

// ============================================================================
// ACCOUNT KIND
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "account_type")]
pub enum AccountKind {
    /// Interest-free savings with a monthly service charge
    Savings { savings_service_charges: f64 },

    /// Mortgage with a rate and an amortization period in months
    Mortgage {
        mortgage_rate: f64,
        #[serde(default)]
        amortization: Option<i32>,
    },

    /// Investment account earning interest
    Investment { interest_rate: f64 },

    /// Day-to-day chequing with a monthly service charge
    Chequing { chequing_service_charges: f64 },
}

/// Field-less tag for an [`AccountKind`], used for discriminator columns and
/// filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    Savings,
    Mortgage,
    Investment,
    Chequing,
}

impl AccountType {
    pub const ALL: [AccountType; 4] = [
        AccountType::Savings,
        AccountType::Mortgage,
        AccountType::Investment,
        AccountType::Chequing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Savings => "Savings",
            AccountType::Mortgage => "Mortgage",
            AccountType::Investment => "Investment",
            AccountType::Chequing => "Chequing",
        }
    }

    /// Value stored in the `account_type` column.
    pub fn discriminator(&self) -> &'static str {
        match self {
            AccountType::Savings => "SavingsAccount",
            AccountType::Mortgage => "MortgageAccount",
            AccountType::Investment => "InvestmentAccount",
            AccountType::Chequing => "ChequingAccount",
        }
    }

    pub fn from_discriminator(value: &str) -> Option<AccountType> {
        AccountType::ALL
            .iter()
            .copied()
            .find(|t| t.discriminator() == value)
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        AccountType::ALL
            .iter()
            .copied()
            .find(|t| {
                t.as_str().eq_ignore_ascii_case(trimmed)
                    || t.discriminator().eq_ignore_ascii_case(trimmed)
            })
            .ok_or_else(|| BankError::UnknownVariant {
                what: "account type",
                value: s.to_string(),
            })
    }
}

impl AccountKind {
    pub fn account_type(&self) -> AccountType {
        match self {
            AccountKind::Savings { .. } => AccountType::Savings,
            AccountKind::Mortgage { .. } => AccountType::Mortgage,
            AccountKind::Investment { .. } => AccountType::Investment,
            AccountKind::Chequing { .. } => AccountType::Chequing,
        }
    }

    /// Base rate for rate-bearing kinds.
    pub fn base_rate(&self) -> Option<f64> {
        match self {
            AccountKind::Mortgage { mortgage_rate, .. } => Some(*mortgage_rate),
            AccountKind::Investment { interest_rate } => Some(*interest_rate),
            AccountKind::Savings { .. } | AccountKind::Chequing { .. } => None,
        }
    }

    /// Monthly service charge for fee-bearing kinds.
    pub fn service_charges(&self) -> Option<f64> {
        match self {
            AccountKind::Savings { savings_service_charges } => Some(*savings_service_charges),
            AccountKind::Chequing { chequing_service_charges } => Some(*chequing_service_charges),
            AccountKind::Mortgage { .. } | AccountKind::Investment { .. } => None,
        }
    }
}

// ============================================================================
// BANK ACCOUNT ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankAccount {
    /// Store-assigned identity (None until persisted)
    #[serde(default)]
    pub bank_account_id: Option<i64>,

    /// Business key, 0 until assigned
    #[serde(default)]
    pub account_number: i64,

    /// Owning client (foreign key)
    pub client_id: i64,

    /// Current status (foreign key)
    pub account_status_id: i64,

    pub balance: f64,

    pub opening_balance: f64,

    pub date_created: NaiveDate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    #[serde(flatten)]
    pub kind: AccountKind,
}

impl BankAccount {
    /// Create an account dated today. The balance starts at the opening balance.
    pub fn new(client_id: i64, account_status_id: i64, opening_balance: f64, kind: AccountKind) -> Self {
        BankAccount {
            bank_account_id: None,
            account_number: 0,
            client_id,
            account_status_id,
            balance: opening_balance,
            opening_balance,
            date_created: Local::now().date_naive(),
            notes: None,
            kind,
        }
    }

    pub fn savings(client_id: i64, status_id: i64, opening_balance: f64, service_charges: f64) -> Self {
        Self::new(
            client_id,
            status_id,
            opening_balance,
            AccountKind::Savings {
                savings_service_charges: service_charges,
            },
        )
    }

    pub fn mortgage(
        client_id: i64,
        status_id: i64,
        opening_balance: f64,
        mortgage_rate: f64,
        amortization: Option<i32>,
    ) -> Self {
        Self::new(
            client_id,
            status_id,
            opening_balance,
            AccountKind::Mortgage {
                mortgage_rate,
                amortization,
            },
        )
    }

    pub fn investment(client_id: i64, status_id: i64, opening_balance: f64, interest_rate: f64) -> Self {
        Self::new(
            client_id,
            status_id,
            opening_balance,
            AccountKind::Investment { interest_rate },
        )
    }

    pub fn chequing(client_id: i64, status_id: i64, opening_balance: f64, service_charges: f64) -> Self {
        Self::new(
            client_id,
            status_id,
            opening_balance,
            AccountKind::Chequing {
                chequing_service_charges: service_charges,
            },
        )
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn account_type(&self) -> AccountType {
        self.kind.account_type()
    }

    pub fn has_number(&self) -> bool {
        self.account_number != 0
    }

    /// Assign the number following `highest` (the largest one in use by any kind).
    pub fn set_next_account_number(&mut self, highest: Option<i64>) -> BankResult<()> {
        self.account_number = next_account_number(highest)?;
        Ok(())
    }

    pub fn balance_change(&self) -> f64 {
        self.balance - self.opening_balance
    }

    pub fn is_overdrawn(&self) -> bool {
        self.balance < 0.0
    }

    /// Base rate adjusted by the account's status. None for kinds without a rate.
    pub fn effective_rate(&self, status: &AccountStatus) -> Option<f64> {
        self.kind
            .base_rate()
            .map(|rate| rate + status.rate_adjustment())
    }
}

pub fn next_account_number(highest: Option<i64>) -> BankResult<i64> {
    match highest {
        None => Ok(ACCOUNT_NUMBER_START),
        Some(last) if last < ACCOUNT_NUMBER_START => Ok(ACCOUNT_NUMBER_START),
        Some(last) => last.checked_add(1).ok_or(BankError::NumberSpaceExhausted {
            what: "account",
            last,
        }),
    }
}
