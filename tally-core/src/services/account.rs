//! Account service - the minimal chart of accounts the review flow needs

use std::sync::Arc;

use serde::Serialize;

use crate::domain::result::{Error, Result};
use crate::domain::{Account, AccountType};
use crate::ports::Ledger;

/// Outcome of a balance recomputation
#[derive(Debug, Clone, Serialize)]
pub struct RecomputeResult {
    pub accounts_updated: usize,
}

pub struct AccountService {
    ledger: Arc<dyn Ledger>,
}

impl AccountService {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    /// Create an account; the id is derived from the name when not given
    pub fn create(
        &self,
        owner: &str,
        id: Option<&str>,
        name: &str,
        account_type: &str,
        sub_type: Option<&str>,
    ) -> Result<Account> {
        let account_type: AccountType = account_type.parse().map_err(Error::Validation)?;
        let id = match id {
            Some(id) if !id.trim().is_empty() => id.trim().to_string(),
            _ => slugify(name),
        };
        if id.is_empty() {
            return Err(Error::validation("account name must contain letters or digits"));
        }

        let mut account = Account::new(id, owner, name.trim(), account_type);
        account.sub_type = sub_type
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        account.validate().map_err(Error::validation)?;

        self.ledger.add_account(&account)?;
        tracing::debug!(id = %account.id, kind = %account.account_type, "created account");
        Ok(account)
    }

    pub fn list(&self, owner: &str) -> Result<Vec<Account>> {
        self.ledger.list_accounts(owner)
    }

    /// Rebuild cached balances from committed transactions
    pub fn recompute_balances(&self, owner: &str) -> Result<RecomputeResult> {
        let accounts_updated = self.ledger.recompute_balances(owner)?;
        Ok(RecomputeResult { accounts_updated })
    }
}

/// Lower-case id from a display name: "HDFC Savings" -> "hdfc-savings"
pub fn slugify(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("HDFC Savings"), "hdfc-savings");
        assert_eq!(slugify("  Food & Dining "), "food-dining");
        assert_eq!(slugify("&&"), "");
    }
}
