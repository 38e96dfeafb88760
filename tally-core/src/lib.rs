//! Tally Core - statement ingestion and review for a double-entry ledger
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core business entities (StagedTransaction, CategoryRule, Account, etc.)
//! - **ports**: Trait definitions for external dependencies (StagingStore, Ledger, GlyphSource)
//! - **services**: Business logic orchestration (upload, review, confirm)
//! - **adapters**: Concrete implementations (DuckDB, PDF glyphs)
//! - **extract**: Statement extractors for delimited, spreadsheet and page-layout files

pub mod adapters;
pub mod config;
pub mod domain;
pub mod extract;
pub mod log_migrations;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use adapters::duckdb::DuckDbRepository;
use adapters::pdf::PdfGlyphReader;
use config::Config;
use extract::StatementExtractor;
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::Error;
pub use domain::{
    Account, AccountType, CategoryRule, Direction, LedgerTransaction, RawTransactionCandidate,
    StagedStatus, StagedTransaction, StagedUpdate, StagedView,
};
pub use services::{EntryPoint, LogEvent, LoggingService};

/// Database file inside the data directory
pub const DB_FILENAME: &str = "tally.duckdb";

/// Main context for Tally operations
///
/// Holds the configuration, the database and every service wired to it.
/// All services share one repository.
pub struct TallyContext {
    pub config: Config,
    pub repository: Arc<DuckDbRepository>,
    pub import_service: ImportService,
    pub staging_service: StagingService,
    pub confirmation_service: ConfirmationService,
    pub rule_service: RuleService,
    pub account_service: AccountService,
}

impl TallyContext {
    /// Open (or create) the data directory's database and wire the services
    pub fn new(data_dir: &Path) -> Result<Self> {
        let config = Config::load(data_dir)?;
        let repository = Arc::new(DuckDbRepository::new(&data_dir.join(DB_FILENAME))?);
        repository.ensure_schema()?;
        Ok(Self::with_repository(config, repository))
    }

    /// Wire services over an already-open repository
    pub fn with_repository(config: Config, repository: Arc<DuckDbRepository>) -> Self {
        let settings = config.import.clone();
        let extractor =
            StatementExtractor::new(Box::new(PdfGlyphReader::new()), settings.row_tolerance);

        let import_service = ImportService::new(
            repository.clone(),
            repository.clone(),
            repository.clone(),
            extractor,
            settings.clone(),
        );
        let staging_service = StagingService::new(repository.clone());
        let confirmation_service = ConfirmationService::new(
            repository.clone(),
            repository.clone(),
            repository.clone(),
            settings.error_cap,
        );
        let rule_service = RuleService::new(repository.clone(), settings.rule_list_limit);
        let account_service = AccountService::new(repository.clone());

        Self {
            config,
            repository,
            import_service,
            staging_service,
            confirmation_service,
            rule_service,
            account_service,
        }
    }

    /// Owner used when the caller does not name one
    pub fn owner(&self) -> &str {
        &self.config.owner
    }
}
