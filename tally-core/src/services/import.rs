//! Import service - statement upload into the staging area
//!
//! One upload is one batch: the document is extracted, every candidate is
//! classified against the owner's rule corpus and accounts, and the result
//! is staged as pending rows for review.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::config::ImportSettings;
use crate::domain::result::{Error, Result};
use crate::domain::StagedTransaction;
use crate::extract::{Issuer, StatementExtractor, StatementFormat, StatementKind};
use crate::ports::{Ledger, RuleStore, StagingStore};
use crate::services::classify::ClassificationEngine;

/// Per-upload options
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    /// Secret for a protected page-layout document
    pub password: Option<String>,
    /// Bank or card account the statement belongs to
    pub source_account: Option<String>,
    /// Extract and classify without staging
    pub dry_run: bool,
}

/// Outcome of one upload
#[derive(Debug, Clone, Serialize)]
pub struct UploadResult {
    pub batch_id: String,
    pub total_parsed: usize,
    pub total_staged: usize,
    pub summary: String,
    pub format: StatementFormat,
    pub issuer: Issuer,
    pub kind: StatementKind,
    pub dry_run: bool,
    /// Staging insert failures, capped at the configured error cap
    pub errors: Vec<String>,
    /// Classified rows; filled only for dry runs
    pub preview: Vec<StagedTransaction>,
}

pub struct ImportService {
    staging: Arc<dyn StagingStore>,
    rules: Arc<dyn RuleStore>,
    ledger: Arc<dyn Ledger>,
    extractor: StatementExtractor,
    settings: ImportSettings,
}

pub fn new_batch_id() -> String {
    format!("batch_{}", Uuid::new_v4().simple())
}

impl ImportService {
    pub fn new(
        staging: Arc<dyn StagingStore>,
        rules: Arc<dyn RuleStore>,
        ledger: Arc<dyn Ledger>,
        extractor: StatementExtractor,
        settings: ImportSettings,
    ) -> Self {
        Self {
            staging,
            rules,
            ledger,
            extractor,
            settings,
        }
    }

    /// Extract, classify and stage one statement file
    pub fn upload(
        &self,
        owner: &str,
        file_name: &str,
        bytes: &[u8],
        options: &UploadOptions,
    ) -> Result<UploadResult> {
        let size = bytes.len() as u64;
        if size > self.settings.max_upload_bytes {
            return Err(Error::FileTooLarge {
                size,
                limit: self.settings.max_upload_bytes,
            });
        }
        if bytes.is_empty() {
            return Err(Error::validation(format!("'{}' is empty", file_name)));
        }

        let source_account = options.source_account.as_deref();
        if let Some(account) = source_account {
            if self.ledger.get_account(owner, account)?.is_none() {
                return Err(Error::not_found(format!("account '{}'", account)));
            }
        }

        let extraction = self
            .extractor
            .extract(file_name, bytes, options.password.as_deref())?;
        tracing::debug!(
            format = extraction.format.label(),
            issuer = extraction.issuer.display_name(),
            candidates = extraction.candidates.len(),
            "extracted statement"
        );

        let engine = ClassificationEngine::new(
            self.rules.list_rules(owner, None)?,
            self.ledger.list_accounts(owner)?,
        );

        let batch_id = new_batch_id();
        let rows: Vec<StagedTransaction> = extraction
            .candidates
            .into_iter()
            .map(|candidate| {
                let mut row =
                    StagedTransaction::from_candidate(owner, &batch_id, file_name, candidate);
                engine.apply(&mut row, source_account);
                row
            })
            .collect();
        let total_parsed = rows.len();

        let mut total_staged = 0;
        let mut errors = Vec::new();
        if !options.dry_run {
            for row in &rows {
                match self.staging.insert_staged(row) {
                    Ok(()) => total_staged += 1,
                    Err(e) => {
                        tracing::warn!(batch = %batch_id, error = %e, "failed to stage row");
                        if errors.len() < self.settings.error_cap {
                            errors.push(e.to_string());
                        }
                    }
                }
            }
        }

        let summary = summarize(
            total_parsed,
            total_staged,
            options.dry_run,
            extraction.format,
            extraction.issuer,
            extraction.kind,
        );

        Ok(UploadResult {
            batch_id,
            total_parsed,
            total_staged,
            summary,
            format: extraction.format,
            issuer: extraction.issuer,
            kind: extraction.kind,
            dry_run: options.dry_run,
            errors,
            preview: if options.dry_run { rows } else { Vec::new() },
        })
    }
}

fn summarize(
    parsed: usize,
    staged: usize,
    dry_run: bool,
    format: StatementFormat,
    issuer: Issuer,
    kind: StatementKind,
) -> String {
    let source = match issuer {
        Issuer::Unknown => format!("{} {}", format.label(), kind.label()),
        known => format!("{} {} ({})", known.display_name(), kind.label(), format.label()),
    };
    if dry_run {
        format!("Parsed {} transactions from {} (dry run, nothing staged)", parsed, source)
    } else {
        format!("Staged {} of {} transactions from {}", staged, parsed, source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_ids_are_unique_and_prefixed() {
        let a = new_batch_id();
        let b = new_batch_id();
        assert!(a.starts_with("batch_"));
        assert_eq!(a.len(), "batch_".len() + 32);
        assert_ne!(a, b);
    }

    #[test]
    fn test_summary_mentions_issuer_when_known() {
        let s = summarize(3, 3, false, StatementFormat::PageLayout, Issuer::Hdfc, StatementKind::CreditCard);
        assert_eq!(s, "Staged 3 of 3 transactions from HDFC Bank credit card statement (PDF)");

        let s = summarize(2, 0, true, StatementFormat::Delimited, Issuer::Unknown, StatementKind::Bank);
        assert_eq!(s, "Parsed 2 transactions from CSV bank statement (dry run, nothing staged)");
    }
}
