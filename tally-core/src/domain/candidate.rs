//! Raw transaction candidate produced by the statement extractors

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which way money moved relative to the statement's own account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Money leaving the source account
    Outflow,
    /// Money entering the source account
    Inflow,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Outflow => "outflow",
            Direction::Inflow => "inflow",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "outflow" | "debit" | "dr" | "out" => Ok(Direction::Outflow),
            "inflow" | "credit" | "cr" | "in" => Ok(Direction::Inflow),
            other => Err(format!("unknown direction '{}' (expected inflow or outflow)", other)),
        }
    }
}

/// One transaction recovered from a statement, before classification
///
/// Amounts are always non-negative with two fractional digits; the sign
/// lives in `direction`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransactionCandidate {
    pub date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    pub direction: Direction,
    /// Informational only, never used for balances
    pub running_balance: Option<Decimal>,
    /// Cheque / reference number when the statement layout exposes one
    pub reference: Option<String>,
}

impl RawTransactionCandidate {
    pub fn new(
        date: NaiveDate,
        description: impl Into<String>,
        amount: Decimal,
        direction: Direction,
    ) -> Self {
        Self {
            date,
            description: description.into(),
            amount: amount.abs().round_dp(2),
            direction,
            running_balance: None,
            reference: None,
        }
    }

    pub fn with_balance(mut self, balance: Option<Decimal>) -> Self {
        self.running_balance = balance;
        self
    }

    pub fn with_reference(mut self, reference: Option<String>) -> Self {
        self.reference = reference;
        self
    }
}
