//! Confirm command - commit reviewed transactions into the ledger

use anyhow::Result;
use colored::Colorize;

use super::{get_context, get_logger, log_event, print_json};
use crate::output;
use tally_core::LogEvent;

pub fn run(owner: Option<String>, batch: Option<String>, json: bool) -> Result<()> {
    let (ctx, owner) = get_context(owner)?;
    let logger = get_logger();

    let result = match ctx.confirmation_service.confirm(&owner, batch.as_deref()) {
        Ok(r) => r,
        Err(e) => {
            log_event(
                &logger,
                LogEvent::new("confirm_failed")
                    .with_command("confirm")
                    .with_error(e.to_string()),
            );
            return Err(e.into());
        }
    };

    let mut event = LogEvent::new("confirm_completed").with_command("confirm");
    if result.failed > 0 {
        event = event.with_error(format!("{} rows failed", result.failed));
    }
    log_event(&logger, event);

    if json {
        return print_json(&result);
    }

    if result.imported == 0 && result.skipped() == 0 && result.failed == 0 && result.rejected == 0 {
        println!("Nothing to confirm.");
        return Ok(());
    }

    output::success(&format!("Imported {} transactions", result.imported));
    if result.skipped_duplicates > 0 {
        println!("  Skipped: {} (already in ledger)", result.skipped_duplicates);
    }
    if result.skipped_missing_account > 0 {
        output::warning(&format!(
            "  Skipped: {} (missing debit or credit account, still staged)",
            result.skipped_missing_account
        ));
    }
    if result.rejected > 0 {
        println!("  Rejected rows removed: {}", result.rejected);
    }
    if result.failed > 0 {
        println!("  {} {}", "Failed:".red(), result.failed);
    }
    if !result.errors.is_empty() {
        println!();
        println!("{}", "Errors:".red().bold());
        for err in &result.errors {
            println!("  {}", err);
        }
    }

    Ok(())
}
