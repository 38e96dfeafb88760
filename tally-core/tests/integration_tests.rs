//! Integration tests for tally-core services
//!
//! These tests drive the upload, review and confirm flow end to end against
//! a real DuckDB file. PDF decoding is replaced at the GlyphSource trait.
//!
//! Run with: cargo test --test integration_tests -- --nocapture

use std::str::FromStr;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use tally_core::adapters::duckdb::DuckDbRepository;
use tally_core::config::{Config, ImportSettings};
use tally_core::domain::result::Result as CoreResult;
use tally_core::domain::{
    Account, AccountType, CategoryRule, Direction, LedgerTransaction, StagedUpdate,
};
use tally_core::extract::{PositionedToken, StatementExtractor};
use tally_core::ports::{GlyphSource, Ledger, RuleStore, StagingStore};
use tally_core::services::{ImportService, UploadOptions};
use tally_core::{Error, TallyContext};

const OWNER: &str = "alice";

// ============================================================================
// Test Helpers
// ============================================================================

/// Create a test repository with schema initialized
fn create_test_repo(temp_dir: &TempDir) -> Arc<DuckDbRepository> {
    let db_path = temp_dir.path().join("test.duckdb");
    let repo = DuckDbRepository::new(&db_path).expect("Failed to create repository");
    repo.ensure_schema().expect("Failed to initialize schema");
    Arc::new(repo)
}

/// Create a fully wired context over a fresh repository
fn create_test_context(temp_dir: &TempDir) -> TallyContext {
    let repo = create_test_repo(temp_dir);
    TallyContext::with_repository(Config::default(), repo)
}

/// Bank account plus the expense account "Coffee Shop" should resolve to
fn create_test_accounts(ctx: &TallyContext) {
    ctx.account_service
        .create(OWNER, Some("bank"), "Savings", "asset", None)
        .unwrap();
    ctx.account_service
        .create(OWNER, Some("food"), "Food & Dining", "expense", None)
        .unwrap();
}

fn upload_csv(ctx: &TallyContext, csv: &str) -> tally_core::services::UploadResult {
    let options = UploadOptions {
        source_account: Some("bank".to_string()),
        ..Default::default()
    };
    ctx.import_service
        .upload(OWNER, "statement.csv", csv.as_bytes(), &options)
        .unwrap()
}

const COFFEE_CSV: &str = "Date,Description,Debit,Credit\n01-01-2024,Coffee Shop,150.00,0\n";

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// GlyphSource serving fixed tokens, standing in for PDF decoding
struct FixedGlyphs(Vec<PositionedToken>);

impl GlyphSource for FixedGlyphs {
    fn read_glyphs(&self, _bytes: &[u8], password: Option<&str>) -> CoreResult<Vec<PositionedToken>> {
        match password {
            Some("secret") => Ok(self.0.clone()),
            Some(_) => Err(Error::PasswordIncorrect),
            None => Err(Error::PasswordRequired),
        }
    }
}

// ============================================================================
// End-to-End Upload / Review / Confirm Tests
// ============================================================================

/// Upload one CSV row, review it, confirm it into the ledger
#[test]
fn test_delimited_upload_list_confirm() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);
    create_test_accounts(&ctx);

    let upload = upload_csv(&ctx, COFFEE_CSV);
    assert_eq!(upload.total_parsed, 1);
    assert_eq!(upload.total_staged, 1);
    assert!(upload.batch_id.starts_with("batch_"));

    let pending = ctx.staging_service.list(OWNER, Some(&upload.batch_id)).unwrap();
    assert_eq!(pending.len(), 1);
    let row = &pending[0].staged;
    assert_eq!(row.direction, Direction::Outflow);
    assert_eq!(row.amount, dec("150.00"));
    assert_eq!(row.date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    assert_eq!(row.suggested_category, "Food & Dining");
    assert_eq!(row.suggested_credit_account.as_deref(), Some("bank"));
    assert_eq!(row.suggested_debit_account.as_deref(), Some("food"));
    assert_eq!(pending[0].credit_account_name.as_deref(), Some("Savings"));

    let result = ctx
        .confirmation_service
        .confirm(OWNER, Some(&upload.batch_id))
        .unwrap();
    assert_eq!(result.imported, 1);
    assert_eq!(result.skipped(), 0);
    assert!(result.errors.is_empty());

    assert_eq!(ctx.repository.count_transactions(OWNER).unwrap(), 1);
    assert_eq!(ctx.repository.count_staged(OWNER).unwrap(), 0);

    // Balances follow the committed row
    let accounts = ctx.account_service.list(OWNER).unwrap();
    let bank = accounts.iter().find(|a| a.id == "bank").unwrap();
    let food = accounts.iter().find(|a| a.id == "food").unwrap();
    assert_eq!(bank.balance, dec("-150.00"));
    assert_eq!(food.balance, dec("150.00"));
}

/// Dry runs classify but stage nothing
#[test]
fn test_dry_run_stages_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);
    create_test_accounts(&ctx);

    let options = UploadOptions {
        source_account: Some("bank".to_string()),
        dry_run: true,
        ..Default::default()
    };
    let result = ctx
        .import_service
        .upload(OWNER, "statement.csv", COFFEE_CSV.as_bytes(), &options)
        .unwrap();

    assert_eq!(result.total_parsed, 1);
    assert_eq!(result.total_staged, 0);
    assert_eq!(result.preview.len(), 1);
    assert_eq!(ctx.repository.count_staged(OWNER).unwrap(), 0);
}

/// A CSV without transactions is a client error carrying a hint
#[test]
fn test_upload_without_transactions_has_hint() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);

    let err = ctx
        .import_service
        .upload(OWNER, "empty.csv", b"Date,Description,Amount\n", &UploadOptions::default())
        .unwrap_err();

    assert!(matches!(err, Error::NoTransactions { .. }));
    assert!(err.is_client_error());
    assert!(err.hint().is_some());
}

/// Uploads are rejected before parsing when over the size limit
#[test]
fn test_upload_size_limit() {
    let temp_dir = TempDir::new().unwrap();
    let repo = create_test_repo(&temp_dir);
    let mut config = Config::default();
    config.import.max_upload_bytes = 16;
    let ctx = TallyContext::with_repository(config, repo);

    let err = ctx
        .import_service
        .upload(OWNER, "statement.csv", COFFEE_CSV.as_bytes(), &UploadOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::FileTooLarge { limit: 16, .. }));
}

/// An unknown source account is NotFound
#[test]
fn test_upload_unknown_source_account() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);

    let options = UploadOptions {
        source_account: Some("nope".to_string()),
        ..Default::default()
    };
    let err = ctx
        .import_service
        .upload(OWNER, "statement.csv", COFFEE_CSV.as_bytes(), &options)
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

/// Page-layout uploads go through the GlyphSource, including password handling
#[test]
fn test_page_layout_upload_with_password() {
    let temp_dir = TempDir::new().unwrap();
    let repo = create_test_repo(&temp_dir);

    let tokens = vec![
        PositionedToken::new("HDFC BANK", 20.0, 30.0, 1),
        PositionedToken::new("Date", 20.0, 80.0, 1),
        PositionedToken::new("Narration", 100.0, 80.0, 1),
        PositionedToken::new("Withdrawal", 300.0, 80.0, 1),
        PositionedToken::new("Deposit", 400.0, 80.0, 1),
        PositionedToken::new("Balance", 500.0, 80.0, 1),
        PositionedToken::new("02/03/2024", 20.0, 100.0, 1),
        PositionedToken::new("SWIGGY ORDER", 100.0, 100.0, 1),
        PositionedToken::new("250.00", 300.0, 100.0, 1),
        PositionedToken::new("9,750.00", 500.0, 100.0, 1),
    ];
    let extractor = StatementExtractor::new(Box::new(FixedGlyphs(tokens)), 4.0)
        .with_temp_dir(temp_dir.path());
    let service = ImportService::new(
        repo.clone(),
        repo.clone(),
        repo.clone(),
        extractor,
        ImportSettings::default(),
    );
    let pdf = b"%PDF-1.4 fixture";

    let err = service
        .upload(OWNER, "statement.pdf", pdf, &UploadOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::PasswordRequired));

    let wrong = UploadOptions {
        password: Some("guess".into()),
        ..Default::default()
    };
    let err = service.upload(OWNER, "statement.pdf", pdf, &wrong).unwrap_err();
    assert!(matches!(err, Error::PasswordIncorrect));

    let right = UploadOptions {
        password: Some("secret".into()),
        ..Default::default()
    };
    let result = service.upload(OWNER, "statement.pdf", pdf, &right).unwrap();
    assert_eq!(result.total_staged, 1);
    assert!(result.summary.contains("HDFC Bank"));

    let staged = repo.list_staged(OWNER, Some(&result.batch_id)).unwrap();
    assert_eq!(staged[0].amount, dec("250.00"));
    assert_eq!(staged[0].direction, Direction::Outflow);
    assert_eq!(staged[0].running_balance, Some(dec("9750.00")));
    assert_eq!(staged[0].suggested_category, "Food & Dining");

    // Temp files are gone on success and on failure
    let leftovers: Vec<_> = std::fs::read_dir(temp_dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("tally-upload-"))
        .collect();
    assert!(leftovers.is_empty(), "temp upload files leaked");
}

// ============================================================================
// Duplicate Detection Tests
// ============================================================================

/// A row matching a committed transaction is skipped, never inserted twice
#[test]
fn test_confirm_duplicate_is_skipped() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);
    create_test_accounts(&ctx);

    let first = upload_csv(&ctx, COFFEE_CSV);
    ctx.confirmation_service
        .confirm(OWNER, Some(&first.batch_id))
        .unwrap();

    let second = upload_csv(&ctx, COFFEE_CSV);
    let result = ctx
        .confirmation_service
        .confirm(OWNER, Some(&second.batch_id))
        .unwrap();

    assert_eq!(result.imported, 0);
    assert_eq!(result.skipped_duplicates, 1);
    assert_eq!(result.failed, 0);
    assert_eq!(ctx.repository.count_transactions(OWNER).unwrap(), 1);
    // Duplicates leave staging
    assert_eq!(ctx.repository.count_staged(OWNER).unwrap(), 0);
}

/// Re-running confirm on an already confirmed batch changes nothing
#[test]
fn test_confirm_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);
    create_test_accounts(&ctx);

    let upload = upload_csv(&ctx, COFFEE_CSV);
    let first = ctx
        .confirmation_service
        .confirm(OWNER, Some(&upload.batch_id))
        .unwrap();
    let second = ctx
        .confirmation_service
        .confirm(OWNER, Some(&upload.batch_id))
        .unwrap();

    assert_eq!(first.imported, 1);
    assert_eq!(second.imported, 0);
    assert!(second.outcomes.is_empty());
    assert_eq!(ctx.repository.count_transactions(OWNER).unwrap(), 1);
}

/// The storage layer rejects a second row with the same fingerprint
#[test]
fn test_ledger_fingerprint_is_unique() {
    let temp_dir = TempDir::new().unwrap();
    let repo = create_test_repo(&temp_dir);
    let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();

    let tx = LedgerTransaction::new(OWNER, date, dec("10.00"), String::from("Tea"), "food", "bank", String::from("Food & Dining"));
    let again = LedgerTransaction::new(OWNER, date, dec("10.00"), String::from("Tea"), "food", "bank", String::from("Food & Dining"));

    assert!(repo.insert_transaction(&tx).unwrap());
    assert!(!repo.insert_transaction(&again).unwrap());
    assert!(repo.has_fingerprint(OWNER, &tx.fingerprint()).unwrap());
    assert!(!repo.has_fingerprint("bob", &tx.fingerprint()).unwrap());
}

// ============================================================================
// Confirm Outcome Tests
// ============================================================================

/// Rows without both accounts stay staged; rejected rows are dropped
#[test]
fn test_confirm_missing_account_and_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);
    create_test_accounts(&ctx);

    let csv = "Date,Description,Debit,Credit\n\
               01-02-2024,Mystery Vendor,40.00,0\n\
               02-02-2024,Coffee Shop,12.00,0\n\
               03-02-2024,Starbucks Latte,6.50,0\n";
    let upload = upload_csv(&ctx, csv);
    assert_eq!(upload.total_staged, 3);

    let pending = ctx.staging_service.list(OWNER, Some(&upload.batch_id)).unwrap();
    let starbucks = pending
        .iter()
        .find(|v| v.staged.description.contains("Starbucks"))
        .unwrap();
    let reject = StagedUpdate {
        status: Some("rejected".into()),
        ..Default::default()
    };
    ctx.staging_service
        .edit(OWNER, starbucks.staged.id, &reject)
        .unwrap();

    let result = ctx
        .confirmation_service
        .confirm(OWNER, Some(&upload.batch_id))
        .unwrap();
    assert_eq!(result.imported, 1);
    assert_eq!(result.skipped_missing_account, 1);
    assert_eq!(result.rejected, 1);

    let remaining = ctx.staging_service.list(OWNER, Some(&upload.batch_id)).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].staged.description, "Mystery Vendor");
}

// ============================================================================
// Rule Reinforcement Tests
// ============================================================================

/// Confirming learns a rule; confirming the pattern again reinforces it
#[test]
fn test_rule_learned_and_reinforced() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);
    create_test_accounts(&ctx);

    let first = upload_csv(&ctx, COFFEE_CSV);
    ctx.confirmation_service
        .confirm(OWNER, Some(&first.batch_id))
        .unwrap();

    let rules = ctx.rule_service.list(OWNER).unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].pattern, "coffee shop");
    assert_eq!(rules[0].hit_count, 1);

    // Same pattern, different date, reviewer recategorises it
    let second = upload_csv(&ctx, "Date,Description,Debit,Credit\n05-01-2024,Coffee Shop,90.00,0\n");
    let pending = ctx.staging_service.list(OWNER, Some(&second.batch_id)).unwrap();
    let update = StagedUpdate {
        category: Some("Office Supplies".into()),
        ..Default::default()
    };
    ctx.staging_service
        .edit(OWNER, pending[0].staged.id, &update)
        .unwrap();
    ctx.confirmation_service
        .confirm(OWNER, Some(&second.batch_id))
        .unwrap();

    let rules = ctx.rule_service.list(OWNER).unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].hit_count, 2);
    assert_eq!(rules[0].category, "Office Supplies");

    // The learned rule now outranks the keyword table
    let third = upload_csv(&ctx, "Date,Description,Debit,Credit\n09-01-2024,Coffee Shop,20.00,0\n");
    let pending = ctx.staging_service.list(OWNER, Some(&third.batch_id)).unwrap();
    assert_eq!(pending[0].staged.suggested_category, "Office Supplies");
    assert!((pending[0].staged.confidence - 0.8).abs() < 1e-9);
}

/// Uncategorized rows teach nothing
#[test]
fn test_uncategorized_does_not_learn() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);
    create_test_accounts(&ctx);

    let upload = upload_csv(&ctx, "Date,Description,Debit,Credit\n01-03-2024,Mystery Vendor,5.00,0\n");
    let pending = ctx.staging_service.list(OWNER, Some(&upload.batch_id)).unwrap();
    let update = StagedUpdate {
        debit_account: Some("food".into()),
        ..Default::default()
    };
    ctx.staging_service
        .edit(OWNER, pending[0].staged.id, &update)
        .unwrap();

    let result = ctx
        .confirmation_service
        .confirm(OWNER, Some(&upload.batch_id))
        .unwrap();
    assert_eq!(result.imported, 1);
    assert!(ctx.rule_service.list(OWNER).unwrap().is_empty());
}

/// The rule listing is capped and ranked by hit count
#[test]
fn test_rule_list_cap_and_ranking() {
    let temp_dir = TempDir::new().unwrap();
    let repo = create_test_repo(&temp_dir);
    let mut config = Config::default();
    config.import.rule_list_limit = 3;
    let ctx = TallyContext::with_repository(config, repo.clone());

    // Earlier vendors are reinforced more often but updated least recently,
    // so a recency ordering would put them last
    for i in 0..5 {
        let rule = CategoryRule::new(OWNER, format!("vendor {}", i), "Shopping", None, None);
        for _ in 0..(5 - i) {
            repo.upsert_rule(&rule).unwrap();
        }
    }

    let rules = ctx.rule_service.list(OWNER).unwrap();
    assert_eq!(rules.len(), 3);
    let patterns: Vec<&str> = rules.iter().map(|r| r.pattern.as_str()).collect();
    assert_eq!(patterns, vec!["vendor 0", "vendor 1", "vendor 2"]);
    let hits: Vec<i64> = rules.iter().map(|r| r.hit_count).collect();
    assert_eq!(hits, vec![5, 4, 3]);
}

// ============================================================================
// Review Tests
// ============================================================================

/// Bulk edit counts successes and skips unknown ids
#[test]
fn test_bulk_edit_tolerates_failures() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);
    create_test_accounts(&ctx);

    let csv = "Date,Description,Debit,Credit\n\
               01-04-2024,Vendor One,10.00,0\n\
               02-04-2024,Vendor Two,20.00,0\n";
    let upload = upload_csv(&ctx, csv);
    let mut ids: Vec<Uuid> = ctx
        .staging_service
        .list(OWNER, Some(&upload.batch_id))
        .unwrap()
        .iter()
        .map(|v| v.staged.id)
        .collect();
    ids.push(Uuid::new_v4());

    let update = StagedUpdate {
        category: Some("Travel".into()),
        debit_account: Some("food".into()),
        ..Default::default()
    };
    let result = ctx.staging_service.bulk_edit(OWNER, &ids, &update).unwrap();
    assert_eq!(result.requested, 3);
    assert_eq!(result.updated, 2);

    for view in ctx.staging_service.list(OWNER, Some(&upload.batch_id)).unwrap() {
        assert_eq!(view.staged.suggested_category, "Travel");
        assert_eq!(view.debit_account_name.as_deref(), Some("Food & Dining"));
    }
}

/// Edits are validated and scoped to the owner
#[test]
fn test_edit_validation_and_owner_scope() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);
    create_test_accounts(&ctx);

    let upload = upload_csv(&ctx, COFFEE_CSV);
    let id = ctx.staging_service.list(OWNER, Some(&upload.batch_id)).unwrap()[0]
        .staged
        .id;

    let bad = StagedUpdate {
        amount: Some(Decimal::ZERO),
        ..Default::default()
    };
    assert!(matches!(
        ctx.staging_service.edit(OWNER, id, &bad),
        Err(Error::Validation(_))
    ));

    let ok = StagedUpdate {
        amount: Some(dec("175.25")),
        direction: Some(Direction::Inflow),
        ..Default::default()
    };
    assert!(matches!(
        ctx.staging_service.edit("bob", id, &ok),
        Err(Error::NotFound(_))
    ));

    let edited = ctx.staging_service.edit(OWNER, id, &ok).unwrap();
    assert_eq!(edited.amount, dec("175.25"));
    assert_eq!(edited.direction, Direction::Inflow);
}

/// Listing orders by date then insertion order, across batches
#[test]
fn test_list_ordering() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);
    create_test_accounts(&ctx);

    upload_csv(&ctx, "Date,Description,Debit,Credit\n05-06-2024,Late,1.00,0\n01-06-2024,Early,2.00,0\n");
    upload_csv(&ctx, "Date,Description,Debit,Credit\n05-06-2024,Late Second,3.00,0\n");

    let names: Vec<String> = ctx
        .staging_service
        .list(OWNER, None)
        .unwrap()
        .into_iter()
        .map(|v| v.staged.description)
        .collect();
    assert_eq!(names, vec!["Early", "Late", "Late Second"]);
}

/// Clearing deletes regardless of status, per batch or for the owner
#[test]
fn test_clear_staged() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);
    create_test_accounts(&ctx);

    let a = upload_csv(&ctx, COFFEE_CSV);
    let b = upload_csv(&ctx, "Date,Description,Debit,Credit\n02-01-2024,Tea Stall,15.00,0\n");

    let id = ctx.staging_service.list(OWNER, Some(&a.batch_id)).unwrap()[0]
        .staged
        .id;
    let reject = StagedUpdate {
        status: Some("rejected".into()),
        ..Default::default()
    };
    ctx.staging_service.edit(OWNER, id, &reject).unwrap();

    assert_eq!(ctx.staging_service.clear(OWNER, Some(&a.batch_id)).unwrap(), 1);
    assert_eq!(ctx.repository.count_staged(OWNER).unwrap(), 1);

    assert_eq!(ctx.staging_service.clear(OWNER, None).unwrap(), 1);
    assert!(ctx.staging_service.list(OWNER, Some(&b.batch_id)).unwrap().is_empty());
}

// ============================================================================
// Account Tests
// ============================================================================

/// Account creation validates the type and rejects duplicates
#[test]
fn test_account_create_and_list() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);

    let account = ctx
        .account_service
        .create(OWNER, None, "HDFC Credit Card", "liability", Some("credit_card"))
        .unwrap();
    assert_eq!(account.id, "hdfc-credit-card");
    assert_eq!(account.account_type, AccountType::Liability);

    assert!(matches!(
        ctx.account_service.create(OWNER, None, "Odd", "gadget", None),
        Err(Error::Validation(_))
    ));
    assert!(ctx
        .account_service
        .create(OWNER, None, "HDFC Credit Card", "liability", None)
        .is_err());

    let accounts: Vec<Account> = ctx.account_service.list(OWNER).unwrap();
    assert_eq!(accounts.len(), 1);
    assert!(ctx.account_service.list("bob").unwrap().is_empty());
}

/// Balances use the account's normal side
#[test]
fn test_recompute_balances_by_normal_side() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_test_context(&temp_dir);
    ctx.account_service
        .create(OWNER, Some("card"), "Card", "liability", None)
        .unwrap();
    ctx.account_service
        .create(OWNER, Some("shop"), "Shopping", "expense", None)
        .unwrap();

    let date = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
    let tx = LedgerTransaction::new(OWNER, date, dec("499.00"), String::from("AMAZON"), "shop", "card", String::from("Shopping"));
    ctx.repository.insert_transaction(&tx).unwrap();

    let result = ctx.account_service.recompute_balances(OWNER).unwrap();
    assert_eq!(result.accounts_updated, 2);

    let accounts = ctx.account_service.list(OWNER).unwrap();
    let card = accounts.iter().find(|a| a.id == "card").unwrap();
    let shop = accounts.iter().find(|a| a.id == "shop").unwrap();
    assert_eq!(card.balance, dec("499.00"));
    assert_eq!(shop.balance, dec("499.00"));
}
