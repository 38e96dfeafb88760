//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod account;
pub mod candidate;
pub mod result;
mod rule;
pub mod staged;
pub mod transaction;

pub use account::{Account, AccountType};
pub use candidate::{Direction, RawTransactionCandidate};
pub use rule::CategoryRule;
pub use staged::{StagedStatus, StagedTransaction, StagedUpdate, StagedView, UNCATEGORIZED};
pub use transaction::LedgerTransaction;
