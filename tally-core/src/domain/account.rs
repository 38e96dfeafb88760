//! Account domain model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Ledger account type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Asset,
    Liability,
    Income,
    Expense,
    Equity,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Asset => "asset",
            AccountType::Liability => "liability",
            AccountType::Income => "income",
            AccountType::Expense => "expense",
            AccountType::Equity => "equity",
        }
    }

    /// Debit-normal accounts grow with debits; the rest grow with credits
    pub fn is_debit_normal(&self) -> bool {
        matches!(self, AccountType::Asset | AccountType::Expense)
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asset" | "assets" | "bank" => Ok(AccountType::Asset),
            "liability" | "liabilities" | "credit" => Ok(AccountType::Liability),
            "income" | "revenue" => Ok(AccountType::Income),
            "expense" | "expenses" => Ok(AccountType::Expense),
            "equity" => Ok(AccountType::Equity),
            other => Err(format!(
                "unknown account type '{}' (expected asset, liability, income, expense or equity)",
                other
            )),
        }
    }
}

/// A ledger account owned by a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub owner: String,
    pub name: String,
    pub account_type: AccountType,
    /// Free-form refinement, e.g. "savings" or "credit card"
    pub sub_type: Option<String>,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(
        id: impl Into<String>,
        owner: impl Into<String>,
        name: impl Into<String>,
        account_type: AccountType,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            owner: owner.into(),
            name: name.into(),
            account_type,
            sub_type: None,
            balance: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this account's name contains the given category (case-insensitive)
    pub fn name_contains(&self, category: &str) -> bool {
        let needle = category.trim().to_lowercase();
        !needle.is_empty() && self.name.to_lowercase().contains(&needle)
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.name.trim().is_empty() {
            return Err("account name cannot be empty");
        }
        if self.owner.trim().is_empty() {
            return Err("account owner cannot be empty");
        }
        Ok(())
    }
}
