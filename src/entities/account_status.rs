// 🚦 Account Status Entity - lifecycle state of a bank account
//
// Every status carries a rate adjustment hook. Rate-bearing accounts add the
// adjustment of their current status to their base rate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BankError;

/// Adjustment applied when a status does not override it.
pub const BASE_RATE_ADJUSTMENT: f64 = 0.0;

// ============================================================================
// STATUS KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusKind {
    /// Account in good standing
    Active,

    /// No recent activity
    Inactive,

    /// Payments are overdue
    Delinquent,

    /// No movement allowed until reviewed
    Frozen,

    /// Account is closed
    Closed,
}

impl StatusKind {
    pub const ALL: [StatusKind; 5] = [
        StatusKind::Active,
        StatusKind::Inactive,
        StatusKind::Delinquent,
        StatusKind::Frozen,
        StatusKind::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusKind::Active => "Active",
            StatusKind::Inactive => "Inactive",
            StatusKind::Delinquent => "Delinquent",
            StatusKind::Frozen => "Frozen",
            StatusKind::Closed => "Closed",
        }
    }

    /// Rate adjustment for accounts in this status.
    pub fn rate_adjustment(&self) -> f64 {
        match self {
            StatusKind::Active => BASE_RATE_ADJUSTMENT,
            StatusKind::Inactive => 0.0,
            StatusKind::Delinquent => 0.0,
            StatusKind::Frozen => 0.0,
            StatusKind::Closed => 0.0,
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusKind {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StatusKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| BankError::UnknownVariant {
                what: "account status",
                value: s.to_string(),
            })
    }
}

// ============================================================================
// ACCOUNT STATUS ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountStatus {
    /// Store-assigned identity (None until persisted)
    pub account_status_id: Option<i64>,

    pub description: String,

    pub kind: StatusKind,
}

impl AccountStatus {
    pub fn new(kind: StatusKind) -> Self {
        AccountStatus {
            account_status_id: None,
            description: kind.as_str().to_string(),
            kind,
        }
    }

    /// Statuses seeded into every new store, in identity order.
    pub fn defaults() -> Vec<AccountStatus> {
        StatusKind::ALL.iter().map(|kind| AccountStatus::new(*kind)).collect()
    }

    pub fn rate_adjustment(&self) -> f64 {
        self.kind.rate_adjustment()
    }

    pub fn is_closed(&self) -> bool {
        self.kind == StatusKind::Closed
    }
}
