//! Staging service - review of provisional rows
//!
//! Rows start `pending`. Editing may change any field including status;
//! `rejected` rows are kept out of confirm until cleared, and any other
//! status counts as approved.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{StagedTransaction, StagedUpdate, StagedView};
use crate::ports::StagingStore;

/// Outcome of a bulk edit
#[derive(Debug, Clone, Serialize)]
pub struct BulkEditResult {
    pub requested: usize,
    pub updated: usize,
}

pub struct StagingService {
    store: Arc<dyn StagingStore>,
}

impl StagingService {
    pub fn new(store: Arc<dyn StagingStore>) -> Self {
        Self { store }
    }

    /// Pending rows, optionally for one batch, by date then insertion order
    pub fn list(&self, owner: &str, batch_id: Option<&str>) -> Result<Vec<StagedView>> {
        self.store.list_pending(owner, batch_id)
    }

    /// Apply a partial update to one row
    pub fn edit(&self, owner: &str, id: Uuid, update: &StagedUpdate) -> Result<StagedTransaction> {
        if update.is_empty() {
            return Err(Error::validation("no fields to update"));
        }
        update.validate().map_err(Error::validation)?;

        let mut row = self
            .store
            .get_staged(owner, id)?
            .ok_or_else(|| Error::not_found(format!("staged transaction {}", id)))?;

        update.apply_to(&mut row);
        self.store.update_staged(&row)?;
        Ok(row)
    }

    /// Apply the same update to many rows; failing ids are skipped
    pub fn bulk_edit(&self, owner: &str, ids: &[Uuid], update: &StagedUpdate) -> Result<BulkEditResult> {
        if update.is_empty() {
            return Err(Error::validation("no fields to update"));
        }
        update.validate().map_err(Error::validation)?;

        let mut updated = 0;
        for id in ids {
            match self.edit(owner, *id, update) {
                Ok(_) => updated += 1,
                Err(e) => tracing::debug!(%id, error = %e, "bulk edit skipped row"),
            }
        }

        Ok(BulkEditResult {
            requested: ids.len(),
            updated,
        })
    }

    /// Delete all staged rows of the owner, or of one batch, regardless of status
    pub fn clear(&self, owner: &str, batch_id: Option<&str>) -> Result<usize> {
        self.store.clear_staged(owner, batch_id)
    }
}

/// Parse a comma or whitespace separated id list
pub fn parse_ids(raw: &str) -> Result<Vec<Uuid>> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| {
            Uuid::parse_str(s).map_err(|_| Error::validation(format!("invalid id '{}'", s)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ids() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let ids = parse_ids(&format!("{},{}\n", a, b)).unwrap();
        assert_eq!(ids, vec![a, b]);
        assert!(parse_ids("not-an-id").is_err());
        assert!(parse_ids("  ").unwrap().is_empty());
    }
}
