//! Staged transaction domain model - the review holding area

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::candidate::{Direction, RawTransactionCandidate};

/// Category assigned when nothing matched
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Review status of a staged row
///
/// Anything other than `pending` or `rejected` counts as approved for commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagedStatus {
    Pending,
    Rejected,
    Approved(String),
}

impl StagedStatus {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "pending" => StagedStatus::Pending,
            "rejected" => StagedStatus::Rejected,
            _ => StagedStatus::Approved(s.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            StagedStatus::Pending => "pending",
            StagedStatus::Rejected => "rejected",
            StagedStatus::Approved(s) => s.as_str(),
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, StagedStatus::Rejected)
    }
}

impl fmt::Display for StagedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for StagedStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StagedStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(StagedStatus::parse(&s))
    }
}

/// A classified candidate awaiting human review
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedTransaction {
    pub id: Uuid,
    pub owner: String,
    pub batch_id: String,
    pub date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    pub direction: Direction,
    pub running_balance: Option<Decimal>,
    pub reference: Option<String>,
    pub suggested_category: String,
    pub suggested_debit_account: Option<String>,
    pub suggested_credit_account: Option<String>,
    pub confidence: f64,
    pub status: StagedStatus,
    pub source_file: String,
    pub created_at: DateTime<Utc>,
}

impl StagedTransaction {
    pub fn from_candidate(
        owner: &str,
        batch_id: &str,
        source_file: &str,
        candidate: RawTransactionCandidate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner: owner.to_string(),
            batch_id: batch_id.to_string(),
            date: candidate.date,
            description: candidate.description,
            amount: candidate.amount,
            direction: candidate.direction,
            running_balance: candidate.running_balance,
            reference: candidate.reference,
            suggested_category: UNCATEGORIZED.to_string(),
            suggested_debit_account: None,
            suggested_credit_account: None,
            confidence: 0.0,
            status: StagedStatus::Pending,
            source_file: source_file.to_string(),
            created_at: Utc::now(),
        }
    }

    /// The (debit, credit) account pair, when both ledger sides are filled in
    pub fn ledger_accounts(&self) -> Option<(&str, &str)> {
        let debit = self.suggested_debit_account.as_deref()?;
        let credit = self.suggested_credit_account.as_deref()?;
        if debit.trim().is_empty() || credit.trim().is_empty() {
            return None;
        }
        Some((debit, credit))
    }
}

/// A staged row as shown to the reviewer, with account display names resolved
#[derive(Debug, Clone, Serialize)]
pub struct StagedView {
    #[serde(flatten)]
    pub staged: StagedTransaction,
    pub debit_account_name: Option<String>,
    pub credit_account_name: Option<String>,
}

/// Partial update applied by the review surface
///
/// `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StagedUpdate {
    pub category: Option<String>,
    pub debit_account: Option<String>,
    pub credit_account: Option<String>,
    pub direction: Option<Direction>,
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub status: Option<String>,
}

impl StagedUpdate {
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.debit_account.is_none()
            && self.credit_account.is_none()
            && self.direction.is_none()
            && self.description.is_none()
            && self.amount.is_none()
            && self.status.is_none()
    }

    /// Validate field values before they reach the store
    pub fn validate(&self) -> Result<(), &'static str> {
        if let Some(amount) = self.amount {
            if amount <= Decimal::ZERO {
                return Err("amount must be greater than zero");
            }
        }
        if let Some(desc) = &self.description {
            if desc.trim().is_empty() {
                return Err("description cannot be empty");
            }
        }
        if let Some(category) = &self.category {
            if category.trim().is_empty() {
                return Err("category cannot be empty");
            }
        }
        if let Some(status) = &self.status {
            if status.trim().is_empty() {
                return Err("status cannot be empty");
            }
        }
        Ok(())
    }

    /// Apply this update to a staged row in memory
    pub fn apply_to(&self, staged: &mut StagedTransaction) {
        if let Some(category) = &self.category {
            staged.suggested_category = category.trim().to_string();
        }
        if let Some(debit) = &self.debit_account {
            staged.suggested_debit_account = non_empty(debit);
        }
        if let Some(credit) = &self.credit_account {
            staged.suggested_credit_account = non_empty(credit);
        }
        if let Some(direction) = self.direction {
            staged.direction = direction;
        }
        if let Some(desc) = &self.description {
            staged.description = desc.trim().to_string();
        }
        if let Some(amount) = self.amount {
            staged.amount = amount.round_dp(2);
        }
        if let Some(status) = &self.status {
            staged.status = StagedStatus::parse(status);
        }
    }
}

/// An empty account id clears the side
fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
