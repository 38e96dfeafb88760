//! Store ports - staging rows, the rule corpus and the ledger
//!
//! Every method is owner-scoped: a row belonging to another owner behaves
//! exactly like a missing one.

use uuid::Uuid;

use crate::domain::result::Result;
use crate::domain::{Account, CategoryRule, LedgerTransaction, StagedTransaction, StagedView};

/// Provisional rows awaiting review
pub trait StagingStore: Send + Sync {
    fn insert_staged(&self, row: &StagedTransaction) -> Result<()>;

    /// Pending rows joined with account display names, by date then insertion order
    fn list_pending(&self, owner: &str, batch_id: Option<&str>) -> Result<Vec<StagedView>>;

    /// Every row regardless of status, in the same order as `list_pending`
    fn list_staged(&self, owner: &str, batch_id: Option<&str>) -> Result<Vec<StagedTransaction>>;

    fn get_staged(&self, owner: &str, id: Uuid) -> Result<Option<StagedTransaction>>;

    fn update_staged(&self, row: &StagedTransaction) -> Result<()>;

    /// Delete the given rows, returning how many existed
    fn delete_staged(&self, owner: &str, ids: &[Uuid]) -> Result<usize>;

    /// Delete all rows of the owner, or of one batch
    fn clear_staged(&self, owner: &str, batch_id: Option<&str>) -> Result<usize>;
}

/// Learned description -> classification mappings
pub trait RuleStore: Send + Sync {
    /// Rules ranked by descending hit count
    fn list_rules(&self, owner: &str, limit: Option<usize>) -> Result<Vec<CategoryRule>>;

    /// Insert with hit_count 1, or overwrite category and accounts and bump hit_count
    fn upsert_rule(&self, rule: &CategoryRule) -> Result<()>;
}

/// Accounts and committed transactions
pub trait Ledger: Send + Sync {
    fn add_account(&self, account: &Account) -> Result<()>;

    fn list_accounts(&self, owner: &str) -> Result<Vec<Account>>;

    fn get_account(&self, owner: &str, id: &str) -> Result<Option<Account>>;

    /// Whether a transaction with this fingerprint is already committed
    fn has_fingerprint(&self, owner: &str, fingerprint: &str) -> Result<bool>;

    /// Insert a transaction; `Ok(false)` when its fingerprint already exists
    fn insert_transaction(&self, tx: &LedgerTransaction) -> Result<bool>;

    /// Recompute every cached account balance of the owner, returning the count updated
    fn recompute_balances(&self, owner: &str) -> Result<usize>;
}
