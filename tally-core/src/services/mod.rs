//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on one use case of the import-review-confirm flow.

mod account;
pub mod classify;
mod confirm;
mod import;
pub mod logging;
pub mod migration;
mod rules;
mod staging;

pub use account::{slugify, AccountService, RecomputeResult};
pub use classify::{Classification, ClassificationEngine, Classifier};
pub use confirm::{ConfirmResult, ConfirmationService, RowOutcome, SkipReason};
pub use import::{new_batch_id, ImportService, UploadOptions, UploadResult};
pub use logging::{EntryPoint, LogEntry, LogEvent, LogStats, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use rules::RuleService;
pub use staging::{parse_ids, BulkEditResult, StagingService};
