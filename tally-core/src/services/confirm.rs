//! Confirmation service - commit staged rows into the ledger
//!
//! Rows are processed one at a time and never inside a single database
//! transaction: a failure part-way leaves earlier rows committed and is
//! reported per row. Re-running confirm is safe because a committed row's
//! fingerprint turns any second insert into a duplicate skip.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::domain::result::Result;
use crate::domain::{CategoryRule, LedgerTransaction, StagedTransaction, UNCATEGORIZED};
use crate::ports::{Ledger, RuleStore, StagingStore};

/// Why a row was not committed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingAccount,
    Duplicate,
}

/// What happened to one staged row
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RowOutcome {
    Committed { staged_id: Uuid, ledger_id: Uuid },
    Skipped { staged_id: Uuid, reason: SkipReason },
    Failed { staged_id: Uuid, error: String },
}

/// Aggregate of one confirm run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfirmResult {
    pub imported: usize,
    pub skipped_duplicates: usize,
    pub skipped_missing_account: usize,
    pub failed: usize,
    /// Rejected rows dropped from staging
    pub rejected: usize,
    /// First error messages, up to the configured cap
    pub errors: Vec<String>,
    pub outcomes: Vec<RowOutcome>,
}

impl ConfirmResult {
    pub fn skipped(&self) -> usize {
        self.skipped_duplicates + self.skipped_missing_account
    }

    fn push_error(&mut self, cap: usize, message: String) {
        if self.errors.len() < cap {
            self.errors.push(message);
        }
    }

    fn record(&mut self, outcome: RowOutcome, cap: usize) {
        match &outcome {
            RowOutcome::Committed { .. } => self.imported += 1,
            RowOutcome::Skipped { reason: SkipReason::Duplicate, .. } => {
                self.skipped_duplicates += 1
            }
            RowOutcome::Skipped { reason: SkipReason::MissingAccount, .. } => {
                self.skipped_missing_account += 1
            }
            RowOutcome::Failed { staged_id, error } => {
                self.failed += 1;
                let message = format!("{}: {}", staged_id, error);
                self.push_error(cap, message);
            }
        }
        self.outcomes.push(outcome);
    }
}

pub struct ConfirmationService {
    staging: Arc<dyn StagingStore>,
    rules: Arc<dyn RuleStore>,
    ledger: Arc<dyn Ledger>,
    error_cap: usize,
}

impl ConfirmationService {
    pub fn new(
        staging: Arc<dyn StagingStore>,
        rules: Arc<dyn RuleStore>,
        ledger: Arc<dyn Ledger>,
        error_cap: usize,
    ) -> Self {
        Self {
            staging,
            rules,
            ledger,
            error_cap,
        }
    }

    /// Commit every non-rejected staged row of the owner, optionally one batch
    pub fn confirm(&self, owner: &str, batch_id: Option<&str>) -> Result<ConfirmResult> {
        let rows = self.staging.list_staged(owner, batch_id)?;
        let mut result = ConfirmResult::default();
        let mut processed: Vec<Uuid> = Vec::new();

        for row in &rows {
            if row.status.is_rejected() {
                result.rejected += 1;
                processed.push(row.id);
                continue;
            }

            let outcome = self.commit_row(owner, row, &mut result);
            if matches!(
                outcome,
                RowOutcome::Committed { .. }
                    | RowOutcome::Skipped { reason: SkipReason::Duplicate, .. }
            ) {
                processed.push(row.id);
            }
            result.record(outcome, self.error_cap);
        }

        if !processed.is_empty() {
            if let Err(e) = self.staging.delete_staged(owner, &processed) {
                tracing::warn!(error = %e, "failed to delete processed staged rows");
                result.push_error(self.error_cap, format!("cleanup failed: {}", e));
            }
        }

        if result.imported > 0 {
            if let Err(e) = self.ledger.recompute_balances(owner) {
                tracing::warn!(error = %e, "balance recomputation failed");
                result.push_error(self.error_cap, format!("balance recomputation failed: {}", e));
            }
        }

        tracing::debug!(
            imported = result.imported,
            duplicates = result.skipped_duplicates,
            missing_account = result.skipped_missing_account,
            failed = result.failed,
            "confirm finished"
        );
        Ok(result)
    }

    fn commit_row(
        &self,
        owner: &str,
        row: &StagedTransaction,
        result: &mut ConfirmResult,
    ) -> RowOutcome {
        let staged_id = row.id;
        let Some((debit, credit)) = row.ledger_accounts() else {
            return RowOutcome::Skipped {
                staged_id,
                reason: SkipReason::MissingAccount,
            };
        };

        let mut tx = LedgerTransaction::new(
            owner,
            row.date,
            row.amount,
            row.description.clone(),
            debit,
            credit,
            row.suggested_category.clone(),
        );
        tx.batch_id = Some(row.batch_id.clone());

        if let Err(e) = tx.validate() {
            return RowOutcome::Failed {
                staged_id,
                error: e.to_string(),
            };
        }

        match self.ledger.has_fingerprint(owner, &tx.fingerprint()) {
            Ok(true) => {
                return RowOutcome::Skipped {
                    staged_id,
                    reason: SkipReason::Duplicate,
                }
            }
            Ok(false) => {}
            Err(e) => {
                return RowOutcome::Failed {
                    staged_id,
                    error: e.to_string(),
                }
            }
        }

        match self.ledger.insert_transaction(&tx) {
            Ok(true) => {}
            Ok(false) => {
                return RowOutcome::Skipped {
                    staged_id,
                    reason: SkipReason::Duplicate,
                }
            }
            Err(e) => {
                tracing::warn!(%staged_id, error = %e, "ledger insert failed");
                return RowOutcome::Failed {
                    staged_id,
                    error: e.to_string(),
                };
            }
        }

        self.learn(owner, row, result);

        RowOutcome::Committed {
            staged_id,
            ledger_id: tx.id,
        }
    }

    /// Reinforce the rule corpus from a committed row
    fn learn(&self, owner: &str, row: &StagedTransaction, result: &mut ConfirmResult) {
        if row.suggested_category == UNCATEGORIZED {
            return;
        }
        let Some(pattern) = CategoryRule::derive_pattern(&row.description) else {
            return;
        };

        let rule = CategoryRule::new(
            owner,
            pattern,
            row.suggested_category.clone(),
            row.suggested_debit_account.clone(),
            row.suggested_credit_account.clone(),
        );
        if let Err(e) = self.rules.upsert_rule(&rule) {
            tracing::warn!(pattern = %rule.pattern, error = %e, "rule upsert failed");
            result.push_error(self.error_cap, format!("rule '{}': {}", rule.pattern, e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_counts_and_caps_errors() {
        let mut result = ConfirmResult::default();
        for _ in 0..7 {
            result.record(
                RowOutcome::Failed {
                    staged_id: Uuid::new_v4(),
                    error: "boom".into(),
                },
                5,
            );
        }
        result.record(
            RowOutcome::Skipped {
                staged_id: Uuid::new_v4(),
                reason: SkipReason::Duplicate,
            },
            5,
        );

        assert_eq!(result.failed, 7);
        assert_eq!(result.errors.len(), 5);
        assert_eq!(result.skipped(), 1);
        assert_eq!(result.outcomes.len(), 8);
    }

    #[test]
    fn test_outcome_serializes_with_tag() {
        let id = Uuid::nil();
        let json = serde_json::to_value(RowOutcome::Skipped {
            staged_id: id,
            reason: SkipReason::MissingAccount,
        })
        .unwrap();
        assert_eq!(json["outcome"], "skipped");
        assert_eq!(json["reason"], "missing_account");
    }
}
