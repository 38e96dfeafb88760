//! Rule service - read access to the learned rule corpus

use std::sync::Arc;

use crate::domain::result::Result;
use crate::domain::CategoryRule;
use crate::ports::RuleStore;

pub struct RuleService {
    store: Arc<dyn RuleStore>,
    list_limit: usize,
}

impl RuleService {
    pub fn new(store: Arc<dyn RuleStore>, list_limit: usize) -> Self {
        Self { store, list_limit }
    }

    /// The owner's rules by descending hit count, capped at the list limit
    pub fn list(&self, owner: &str) -> Result<Vec<CategoryRule>> {
        self.store.list_rules(owner, Some(self.list_limit))
    }
}
