//! DuckDB repository implementation

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context};
use chrono::{DateTime, NaiveDate, Utc};
use duckdb::types::Type;
use duckdb::{params, params_from_iter, Connection};
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::transaction::{from_cents, to_cents};
use crate::domain::{
    Account, AccountType, CategoryRule, Direction, LedgerTransaction, StagedStatus,
    StagedTransaction, StagedView,
};
use crate::migrations::MIGRATIONS;
use crate::ports::{Ledger, RuleStore, StagingStore};
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

const STAGED_COLUMNS: &str = "s.id, s.owner, s.batch_id, CAST(s.date AS VARCHAR), s.description,
    s.amount_cents, s.direction, s.running_balance_cents, s.reference, s.suggested_category,
    s.suggested_debit_account, s.suggested_credit_account, s.confidence, s.status,
    s.source_file, s.created_at";

const ACCOUNT_COLUMNS: &str =
    "account_id, owner, name, account_type, sub_type, balance_cents, created_at, updated_at";

const RULE_COLUMNS: &str = "owner, pattern, category, suggested_debit_account,
    suggested_credit_account, hit_count, updated_at";

/// Check if an error message indicates a file locking issue that should be retried
pub fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
        || lower.contains("could not set lock on file")
}

/// DuckDB-backed staging store, rule corpus and ledger
pub struct DuckDbRepository {
    conn: Mutex<Connection>,
}

impl DuckDbRepository {
    /// Open (or create) the database at `db_path`
    ///
    /// Opening retries with exponential backoff while another process holds
    /// the file lock. Migrations are not run here; see [`Self::ensure_schema`].
    pub fn new(db_path: &Path) -> anyhow::Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                    });
                }
                Err(e) => {
                    // Alternate format includes the underlying DuckDB message
                    let err_msg = format!("{:#}", e);
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        tracing::warn!(
                            delay_ms = delay.as_millis() as u64,
                            attempt = attempt + 1,
                            max = MAX_RETRIES,
                            error = %err_msg,
                            "database busy, retrying"
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow!("Failed to open database after {} retries", MAX_RETRIES)))
    }

    fn try_open_connection(db_path: &Path) -> anyhow::Result<Connection> {
        // Extension autoloading stays off; json is linked statically
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_with_flags(db_path, config)
            .with_context(|| format!("failed to open {}", db_path.display()))?;
        Ok(conn)
    }

    /// Run pending migrations, returning what was applied
    pub fn run_migrations(&self) -> anyhow::Result<MigrationResult> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow!("Lock poisoned: {}", e))?;
        MigrationService::new(&conn, MIGRATIONS).run_pending()
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> anyhow::Result<()> {
        self.run_migrations()?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::database(format!("connection lock poisoned: {}", e)))
    }

    /// Number of staged rows of any status
    pub fn count_staged(&self, owner: &str) -> Result<i64> {
        let conn = self.lock()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM sys_staged_transactions WHERE owner = ?",
            [owner],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Number of committed ledger transactions
    pub fn count_transactions(&self, owner: &str) -> Result<i64> {
        let conn = self.lock()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM sys_ledger_transactions WHERE owner = ?",
            [owner],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

// === Row mapping ===

fn conversion_error<E>(idx: usize, err: E) -> duckdb::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    duckdb::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn text_error(idx: usize, msg: String) -> duckdb::Error {
    conversion_error(idx, std::io::Error::new(std::io::ErrorKind::InvalidData, msg))
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn get_date(row: &duckdb::Row, idx: usize) -> duckdb::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| conversion_error(idx, e))
}

fn get_uuid(row: &duckdb::Row, idx: usize) -> duckdb::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn row_to_staged(row: &duckdb::Row) -> duckdb::Result<StagedTransaction> {
    let direction: String = row.get(6)?;
    let status: String = row.get(13)?;
    let created_at: String = row.get(15)?;

    Ok(StagedTransaction {
        id: get_uuid(row, 0)?,
        owner: row.get(1)?,
        batch_id: row.get(2)?,
        date: get_date(row, 3)?,
        description: row.get(4)?,
        amount: from_cents(row.get(5)?),
        direction: direction
            .parse::<Direction>()
            .map_err(|e| text_error(6, e))?,
        running_balance: row.get::<_, Option<i64>>(7)?.map(from_cents),
        reference: row.get(8)?,
        suggested_category: row.get(9)?,
        suggested_debit_account: row.get(10)?,
        suggested_credit_account: row.get(11)?,
        confidence: row.get(12)?,
        status: StagedStatus::parse(&status),
        source_file: row.get(14)?,
        created_at: parse_timestamp(&created_at),
    })
}

fn row_to_account(row: &duckdb::Row) -> duckdb::Result<Account> {
    let account_type: String = row.get(3)?;
    let created_at: String = row.get(6)?;
    let updated_at: String = row.get(7)?;

    Ok(Account {
        id: row.get(0)?,
        owner: row.get(1)?,
        name: row.get(2)?,
        account_type: account_type
            .parse::<AccountType>()
            .map_err(|e| text_error(3, e))?,
        sub_type: row.get(4)?,
        balance: from_cents(row.get(5)?),
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}

fn row_to_rule(row: &duckdb::Row) -> duckdb::Result<CategoryRule> {
    let updated_at: String = row.get(6)?;
    Ok(CategoryRule {
        owner: row.get(0)?,
        pattern: row.get(1)?,
        category: row.get(2)?,
        suggested_debit_account: row.get(3)?,
        suggested_credit_account: row.get(4)?,
        hit_count: row.get(5)?,
        updated_at: parse_timestamp(&updated_at),
    })
}

fn query_accounts(conn: &Connection, owner: &str) -> Result<Vec<Account>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM sys_accounts WHERE owner = ? ORDER BY account_type, name",
        ACCOUNT_COLUMNS
    ))?;
    let accounts = stmt
        .query_map([owner], row_to_account)?
        .collect::<duckdb::Result<Vec<_>>>()?;
    Ok(accounts)
}

/// WHERE clause and parameters for an owner scope with an optional batch
fn owner_scope<'a>(owner: &'a str, batch_id: Option<&'a str>) -> (String, Vec<&'a str>) {
    match batch_id {
        Some(batch) => (
            "s.owner = ? AND s.batch_id = ?".to_string(),
            vec![owner, batch],
        ),
        None => ("s.owner = ?".to_string(), vec![owner]),
    }
}

// === Staging ===

impl StagingStore for DuckDbRepository {
    fn insert_staged(&self, row: &StagedTransaction) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO sys_staged_transactions (id, owner, batch_id, date, description,
                 amount_cents, direction, running_balance_cents, reference, suggested_category,
                 suggested_debit_account, suggested_credit_account, confidence, status,
                 source_file, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                row.id.to_string(),
                row.owner,
                row.batch_id,
                row.date.format("%Y-%m-%d").to_string(),
                row.description,
                to_cents(row.amount),
                row.direction.as_str(),
                row.running_balance.map(to_cents),
                row.reference,
                row.suggested_category,
                row.suggested_debit_account,
                row.suggested_credit_account,
                row.confidence,
                row.status.as_str(),
                row.source_file,
                row.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn list_pending(&self, owner: &str, batch_id: Option<&str>) -> Result<Vec<StagedView>> {
        let conn = self.lock()?;
        let (scope, args) = owner_scope(owner, batch_id);
        let mut stmt = conn.prepare(&format!(
            "SELECT {}, d.name, c.name
             FROM sys_staged_transactions s
             LEFT JOIN sys_accounts d
                ON d.owner = s.owner AND d.account_id = s.suggested_debit_account
             LEFT JOIN sys_accounts c
                ON c.owner = s.owner AND c.account_id = s.suggested_credit_account
             WHERE {} AND s.status = 'pending'
             ORDER BY s.date, s.seq",
            STAGED_COLUMNS, scope
        ))?;

        let views = stmt
            .query_map(params_from_iter(args), |row| {
                Ok(StagedView {
                    staged: row_to_staged(row)?,
                    debit_account_name: row.get(16)?,
                    credit_account_name: row.get(17)?,
                })
            })?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(views)
    }

    fn list_staged(&self, owner: &str, batch_id: Option<&str>) -> Result<Vec<StagedTransaction>> {
        let conn = self.lock()?;
        let (scope, args) = owner_scope(owner, batch_id);
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sys_staged_transactions s WHERE {} ORDER BY s.date, s.seq",
            STAGED_COLUMNS, scope
        ))?;
        let rows = stmt
            .query_map(params_from_iter(args), row_to_staged)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn get_staged(&self, owner: &str, id: Uuid) -> Result<Option<StagedTransaction>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sys_staged_transactions s WHERE s.owner = ? AND s.id = ?",
            STAGED_COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![owner, id.to_string()], row_to_staged)?;
        let row = rows.next().transpose()?;
        Ok(row)
    }

    fn update_staged(&self, row: &StagedTransaction) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE sys_staged_transactions SET
                date = ?, description = ?, amount_cents = ?, direction = ?,
                suggested_category = ?, suggested_debit_account = ?,
                suggested_credit_account = ?, confidence = ?, status = ?
             WHERE owner = ? AND id = ?",
            params![
                row.date.format("%Y-%m-%d").to_string(),
                row.description,
                to_cents(row.amount),
                row.direction.as_str(),
                row.suggested_category,
                row.suggested_debit_account,
                row.suggested_credit_account,
                row.confidence,
                row.status.as_str(),
                row.owner,
                row.id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(Error::not_found(format!("staged transaction {}", row.id)));
        }
        Ok(())
    }

    fn delete_staged(&self, owner: &str, ids: &[Uuid]) -> Result<usize> {
        let conn = self.lock()?;
        let mut deleted = 0;
        for id in ids {
            deleted += conn.execute(
                "DELETE FROM sys_staged_transactions WHERE owner = ? AND id = ?",
                params![owner, id.to_string()],
            )?;
        }
        Ok(deleted)
    }

    fn clear_staged(&self, owner: &str, batch_id: Option<&str>) -> Result<usize> {
        let conn = self.lock()?;
        let deleted = match batch_id {
            Some(batch) => conn.execute(
                "DELETE FROM sys_staged_transactions WHERE owner = ? AND batch_id = ?",
                params![owner, batch],
            )?,
            None => conn.execute(
                "DELETE FROM sys_staged_transactions WHERE owner = ?",
                [owner],
            )?,
        };
        Ok(deleted)
    }
}

// === Rules ===

impl RuleStore for DuckDbRepository {
    fn list_rules(&self, owner: &str, limit: Option<usize>) -> Result<Vec<CategoryRule>> {
        let conn = self.lock()?;
        let limit_clause = limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sys_category_rules WHERE owner = ?
             ORDER BY hit_count DESC, updated_at DESC, pattern{}",
            RULE_COLUMNS, limit_clause
        ))?;
        let rules = stmt
            .query_map([owner], row_to_rule)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(rules)
    }

    fn upsert_rule(&self, rule: &CategoryRule) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO sys_category_rules (owner, pattern, category, suggested_debit_account,
                 suggested_credit_account, hit_count, updated_at)
             VALUES (?, ?, ?, ?, ?, 1, ?)
             ON CONFLICT (owner, pattern) DO UPDATE SET
                category = EXCLUDED.category,
                suggested_debit_account = EXCLUDED.suggested_debit_account,
                suggested_credit_account = EXCLUDED.suggested_credit_account,
                hit_count = hit_count + 1,
                updated_at = EXCLUDED.updated_at",
            params![
                rule.owner,
                rule.pattern,
                rule.category,
                rule.suggested_debit_account,
                rule.suggested_credit_account,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

// === Ledger ===

impl Ledger for DuckDbRepository {
    fn add_account(&self, account: &Account) -> Result<()> {
        let conn = self.lock()?;
        let exists: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sys_accounts WHERE owner = ? AND account_id = ?",
            params![account.owner, account.id],
            |row| row.get(0),
        )?;
        if exists > 0 {
            return Err(Error::validation(format!(
                "account '{}' already exists",
                account.id
            )));
        }

        conn.execute(
            &format!(
                "INSERT INTO sys_accounts ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                ACCOUNT_COLUMNS
            ),
            params![
                account.id,
                account.owner,
                account.name,
                account.account_type.as_str(),
                account.sub_type,
                to_cents(account.balance),
                account.created_at.to_rfc3339(),
                account.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn list_accounts(&self, owner: &str) -> Result<Vec<Account>> {
        let conn = self.lock()?;
        query_accounts(&conn, owner)
    }

    fn get_account(&self, owner: &str, id: &str) -> Result<Option<Account>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sys_accounts WHERE owner = ? AND account_id = ?",
            ACCOUNT_COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![owner, id], row_to_account)?;
        let account = rows.next().transpose()?;
        Ok(account)
    }

    fn has_fingerprint(&self, owner: &str, fingerprint: &str) -> Result<bool> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sys_ledger_transactions WHERE owner = ? AND fingerprint = ?",
            params![owner, fingerprint],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn insert_transaction(&self, tx: &LedgerTransaction) -> Result<bool> {
        let conn = self.lock()?;
        // The fingerprint primary key turns a duplicate into a no-op
        let rows_changed = conn.execute(
            "INSERT INTO sys_ledger_transactions (fingerprint, id, owner, date, amount_cents,
                 description, debit_account, credit_account, category, batch_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT DO NOTHING",
            params![
                tx.fingerprint(),
                tx.id.to_string(),
                tx.owner,
                tx.date.format("%Y-%m-%d").to_string(),
                tx.amount_cents(),
                tx.description,
                tx.debit_account,
                tx.credit_account,
                tx.category,
                tx.batch_id,
                tx.created_at.to_rfc3339(),
            ],
        )?;
        Ok(rows_changed > 0)
    }

    fn recompute_balances(&self, owner: &str) -> Result<usize> {
        let conn = self.lock()?;
        let accounts = query_accounts(&conn, owner)?;
        let now = Utc::now().to_rfc3339();

        for account in &accounts {
            let (debits, credits): (i64, i64) = conn.query_row(
                "SELECT
                    CAST(COALESCE(SUM(CASE WHEN debit_account = ? THEN amount_cents ELSE 0 END), 0) AS BIGINT),
                    CAST(COALESCE(SUM(CASE WHEN credit_account = ? THEN amount_cents ELSE 0 END), 0) AS BIGINT)
                 FROM sys_ledger_transactions WHERE owner = ?",
                params![account.id, account.id, owner],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            let balance = if account.account_type.is_debit_normal() {
                debits - credits
            } else {
                credits - debits
            };

            conn.execute(
                "UPDATE sys_accounts SET balance_cents = ?, updated_at = ?
                 WHERE owner = ? AND account_id = ?",
                params![balance, now, owner, account.id],
            )?;
        }

        Ok(accounts.len())
    }
}
