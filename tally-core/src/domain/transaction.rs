//! Ledger transaction domain model

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// A permanent double-entry ledger row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub id: Uuid,
    pub owner: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub description: String,
    pub debit_account: String,
    pub credit_account: String,
    pub category: String,
    /// Import batch the row was confirmed from
    pub batch_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LedgerTransaction {
    pub fn new(
        owner: impl Into<String>,
        date: NaiveDate,
        amount: Decimal,
        description: impl Into<String>,
        debit_account: impl Into<String>,
        credit_account: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner: owner.into(),
            date,
            amount: amount.round_dp(2),
            description: description.into(),
            debit_account: debit_account.into(),
            credit_account: credit_account.into(),
            category: category.into(),
            batch_id: None,
            created_at: Utc::now(),
        }
    }

    /// Validate ledger invariants
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.amount <= Decimal::ZERO {
            return Err("amount must be strictly positive");
        }
        if self.debit_account.trim().is_empty() || self.credit_account.trim().is_empty() {
            return Err("both debit and credit accounts are required");
        }
        if self.debit_account == self.credit_account {
            return Err("debit and credit accounts must differ");
        }
        if self.description.trim().is_empty() {
            return Err("description cannot be empty");
        }
        Ok(())
    }

    /// Amount in minor units as stored in the database
    pub fn amount_cents(&self) -> i64 {
        to_cents(self.amount)
    }

    /// Duplicate key over (owner, date, amount, description)
    ///
    /// Exact values only: two rows with the same fingerprint are the same
    /// ledger entry as far as confirm is concerned.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.owner, self.date, self.amount, &self.description)
    }
}

/// SHA-256 over the exact duplicate-signal fields
pub fn fingerprint(owner: &str, date: NaiveDate, amount: Decimal, description: &str) -> String {
    let key = format!(
        "{}|{}|{}|{}",
        owner,
        date.format("%Y-%m-%d"),
        to_cents(amount),
        description
    );
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Convert a two-decimal amount to integer cents
pub fn to_cents(amount: Decimal) -> i64 {
    (amount.round_dp(2) * Decimal::ONE_HUNDRED)
        .trunc()
        .to_i64()
        .unwrap_or(0)
}

/// Convert integer cents back to a two-decimal amount
pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}
