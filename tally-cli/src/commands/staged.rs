//! Staged command - review, edit and clear staged transactions

use std::io::{self, Read};
use std::str::FromStr;

use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use dialoguer::Confirm;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{get_context, get_logger, log_event, print_json};
use crate::output;
use tally_core::services::parse_ids;
use tally_core::{Direction, LogEvent, StagedUpdate, StagedView};

#[derive(Subcommand)]
pub enum StagedCommands {
    /// List pending staged transactions
    List {
        /// Only show this batch
        #[arg(long)]
        batch: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit one staged transaction
    Edit {
        /// Staged transaction ID
        id: String,
        #[command(flatten)]
        fields: EditFields,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Apply the same edit to many staged transactions
    BulkEdit {
        /// Comma-separated IDs (read from stdin when omitted)
        #[arg(long)]
        ids: Option<String>,
        #[command(flatten)]
        fields: EditFields,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete staged transactions regardless of status
    Clear {
        /// Only clear this batch
        #[arg(long)]
        batch: Option<String>,
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Fields a reviewer may overwrite
#[derive(Args, Debug, Default)]
pub struct EditFields {
    /// Category
    #[arg(long)]
    category: Option<String>,
    /// Debit account ID
    #[arg(long)]
    debit: Option<String>,
    /// Credit account ID
    #[arg(long)]
    credit: Option<String>,
    /// inflow or outflow
    #[arg(long)]
    direction: Option<String>,
    /// Description
    #[arg(long)]
    description: Option<String>,
    /// Amount (positive)
    #[arg(long)]
    amount: Option<String>,
    /// Status (pending, rejected, approved, ...)
    #[arg(long)]
    status: Option<String>,
}

impl EditFields {
    fn into_update(self) -> Result<StagedUpdate> {
        let direction = match self.direction {
            Some(d) => Some(Direction::from_str(&d).map_err(anyhow::Error::msg)?),
            None => None,
        };
        let amount = match self.amount {
            Some(a) => match Decimal::from_str(a.trim().replace(',', "").as_str()) {
                Ok(v) => Some(v),
                Err(_) => bail!("Invalid amount: {}", a),
            },
            None => None,
        };
        Ok(StagedUpdate {
            category: self.category,
            debit_account: self.debit,
            credit_account: self.credit,
            direction,
            description: self.description,
            amount,
            status: self.status,
        })
    }
}

pub fn run(owner: Option<String>, command: StagedCommands) -> Result<()> {
    match command {
        StagedCommands::List { batch, json } => list(owner, batch, json),
        StagedCommands::Edit { id, fields, json } => edit(owner, &id, fields, json),
        StagedCommands::BulkEdit { ids, fields, json } => bulk_edit(owner, ids, fields, json),
        StagedCommands::Clear { batch, force, json } => clear(owner, batch, force, json),
    }
}

fn list(owner: Option<String>, batch: Option<String>, json: bool) -> Result<()> {
    let (ctx, owner) = get_context(owner)?;
    let rows = ctx.staging_service.list(&owner, batch.as_deref())?;

    if json {
        return print_json(&rows);
    }

    if rows.is_empty() {
        println!("No pending transactions.");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["ID", "Date", "Description", "Amount", "Category", "Debit", "Credit", "Conf."]);
    for view in &rows {
        table.add_row(row_cells(view));
    }
    println!("{}", table);
    println!("{} pending", rows.len());
    Ok(())
}

fn row_cells(view: &StagedView) -> Vec<String> {
    let row = &view.staged;
    let amount = match row.direction {
        Direction::Inflow => output::format_amount(row.amount).green().to_string(),
        Direction::Outflow => format!("-{}", output::format_amount(row.amount)).red().to_string(),
    };
    let account = |name: &Option<String>, id: &Option<String>| {
        name.clone()
            .or_else(|| id.clone())
            .unwrap_or_else(|| "-".dimmed().to_string())
    };

    vec![
        row.id.to_string(),
        row.date.to_string(),
        row.description.clone(),
        amount,
        row.suggested_category.clone(),
        account(&view.debit_account_name, &row.suggested_debit_account),
        account(&view.credit_account_name, &row.suggested_credit_account),
        output::format_confidence(row.confidence),
    ]
}

fn edit(owner: Option<String>, id: &str, fields: EditFields, json: bool) -> Result<()> {
    let id = Uuid::parse_str(id.trim()).map_err(|_| anyhow::anyhow!("Invalid ID: {}", id))?;
    let update = fields.into_update()?;
    let (ctx, owner) = get_context(owner)?;

    let row = ctx.staging_service.edit(&owner, id, &update)?;

    if json {
        return print_json(&row);
    }
    output::success(&format!("Updated {}", row.id));
    println!(
        "  {} {} {} [{}] {}",
        row.date,
        row.description,
        output::format_amount(row.amount),
        row.suggested_category,
        row.status
    );
    Ok(())
}

fn bulk_edit(owner: Option<String>, ids: Option<String>, fields: EditFields, json: bool) -> Result<()> {
    let raw = match ids {
        Some(ids) => ids,
        None if atty::isnt(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
        None => bail!("No IDs provided. Use --ids or pipe IDs via stdin."),
    };
    let ids = parse_ids(&raw)?;
    if ids.is_empty() {
        bail!("No IDs provided");
    }

    let update = fields.into_update()?;
    let (ctx, owner) = get_context(owner)?;
    let result = ctx.staging_service.bulk_edit(&owner, &ids, &update)?;

    if json {
        return print_json(&result);
    }
    output::success(&format!("Updated {} of {} transactions", result.updated, result.requested));
    Ok(())
}

fn clear(owner: Option<String>, batch: Option<String>, force: bool, json: bool) -> Result<()> {
    let (ctx, owner) = get_context(owner)?;

    if !force && !json {
        let scope = match &batch {
            Some(b) => format!("batch {}", b),
            None => "all batches".to_string(),
        };
        if !Confirm::new()
            .with_prompt(format!("Delete staged transactions for {}?", scope))
            .default(false)
            .interact()?
        {
            println!("{}", "Cancelled".dimmed());
            return Ok(());
        }
    }

    let deleted = ctx.staging_service.clear(&owner, batch.as_deref())?;
    log_event(&get_logger(), LogEvent::new("staged_cleared").with_command("staged clear"));

    if json {
        return print_json(&serde_json::json!({ "deleted": deleted }));
    }
    println!("Deleted {} staged transactions", deleted);
    Ok(())
}
