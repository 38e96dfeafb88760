//! Account command - create and list accounts

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use super::{get_context, print_json};
use crate::output;

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Create an account
    New {
        /// Display name
        #[arg(long)]
        name: String,
        /// asset, liability, income, expense or equity
        #[arg(long = "type")]
        account_type: String,
        /// Free-form sub type (savings, credit_card, ...)
        #[arg(long)]
        sub_type: Option<String>,
        /// Account ID (derived from the name when omitted)
        #[arg(long)]
        id: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List accounts with balances
    List {
        /// Rebuild balances from the ledger first
        #[arg(long)]
        recompute: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(owner: Option<String>, command: AccountCommands) -> Result<()> {
    match command {
        AccountCommands::New { name, account_type, sub_type, id, json } => {
            let (ctx, owner) = get_context(owner)?;
            let account = ctx.account_service.create(
                &owner,
                id.as_deref(),
                &name,
                &account_type,
                sub_type.as_deref(),
            )?;

            if json {
                return print_json(&account);
            }
            output::success(&format!("Created account '{}'", account.name));
            println!("  ID: {}", account.id.bold());
            println!("  Type: {}", account.account_type);
        }
        AccountCommands::List { recompute, json } => {
            let (ctx, owner) = get_context(owner)?;
            if recompute {
                ctx.account_service.recompute_balances(&owner)?;
            }
            let accounts = ctx.account_service.list(&owner)?;

            if json {
                return print_json(&accounts);
            }

            if accounts.is_empty() {
                println!("No accounts. Create one with 'tally account new --name <NAME> --type asset'.");
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["ID", "Name", "Type", "Sub type", "Balance"]);
            for account in &accounts {
                table.add_row(vec![
                    account.id.clone(),
                    account.name.clone(),
                    account.account_type.to_string(),
                    account.sub_type.clone().unwrap_or_else(|| "-".into()),
                    output::format_amount(account.balance),
                ]);
            }
            println!("{}", table);
        }
    }
    Ok(())
}
