//! Upload command - extract a statement into staging

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use dialoguer::Password;
use indicatif::{ProgressBar, ProgressStyle};

use super::{get_context, get_logger, log_event, print_json};
use crate::output;
use tally_core::services::{UploadOptions, UploadResult};
use tally_core::{Error, LogEvent, TallyContext};

/// Rows shown in the human-readable preview
const PREVIEW_ROWS: usize = 10;

fn spinner(message: String) -> Option<ProgressBar> {
    if atty::isnt(atty::Stream::Stderr) {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(80));
    Some(pb)
}

fn upload_once(
    ctx: &TallyContext,
    owner: &str,
    file_name: &str,
    bytes: &[u8],
    options: &UploadOptions,
) -> tally_core::domain::result::Result<UploadResult> {
    let pb = spinner(format!("Reading {}", file_name));
    let result = ctx.import_service.upload(owner, file_name, bytes, options);
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    result
}

pub fn run(
    owner: Option<String>,
    file: &Path,
    password: Option<String>,
    account: Option<String>,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let (ctx, owner) = get_context(owner)?;
    let logger = get_logger();

    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| file.display().to_string());

    let mut options = UploadOptions {
        password,
        source_account: account,
        dry_run,
    };

    let mut result = upload_once(&ctx, &owner, &file_name, &bytes, &options);

    // Ask for the statement password once when we can prompt
    let can_prompt = !json && atty::is(atty::Stream::Stdin);
    if can_prompt {
        if let Err(e @ (Error::PasswordRequired | Error::PasswordIncorrect)) = &result {
            output::warning(&e.to_string());
            let secret = Password::new()
                .with_prompt("Statement password")
                .interact()?;
            options.password = Some(secret);
            result = upload_once(&ctx, &owner, &file_name, &bytes, &options);
        }
    }

    let result = match result {
        Ok(r) => r,
        Err(e) => {
            let mut event = LogEvent::new("upload_failed")
                .with_command("upload")
                .with_error(e.to_string());
            if let Some(ext) = file.extension() {
                event = event.with_format(ext.to_string_lossy().to_lowercase());
            }
            log_event(&logger, event);
            return Err(e.into());
        }
    };

    log_event(
        &logger,
        LogEvent::new("upload_completed")
            .with_command("upload")
            .with_format(result.format.label()),
    );

    if json {
        return print_json(&result);
    }

    if result.dry_run {
        println!("{}", "DRY RUN - Nothing staged".yellow());
        println!();
        print_preview(&result);
    } else {
        output::success(&result.summary);
        println!("  Batch: {}", result.batch_id.bold());
    }

    if !result.errors.is_empty() {
        println!();
        println!("{}", "Rows that could not be staged:".red());
        for err in &result.errors {
            println!("  {}", err);
        }
    }

    if !result.dry_run && result.total_staged > 0 {
        println!();
        output::info(&format!(
            "Review with 'tally staged list --batch {}', then 'tally confirm --batch {}'",
            result.batch_id, result.batch_id
        ));
    }

    Ok(())
}

fn print_preview(result: &UploadResult) {
    println!("{}", result.summary);
    println!();

    let mut table = output::create_table();
    table.set_header(vec!["Date", "Description", "Direction", "Amount", "Category", "Confidence"]);
    for row in result.preview.iter().take(PREVIEW_ROWS) {
        table.add_row(vec![
            row.date.to_string(),
            row.description.clone(),
            row.direction.to_string(),
            output::format_amount(row.amount),
            row.suggested_category.clone(),
            output::format_confidence(row.confidence),
        ]);
    }
    println!("{}", table);

    if result.preview.len() > PREVIEW_ROWS {
        println!("... and {} more", result.preview.len() - PREVIEW_ROWS);
    }
}
