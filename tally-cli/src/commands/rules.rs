//! Rules command - inspect the learned categorization rules

use anyhow::Result;
use clap::Subcommand;

use super::{get_context, print_json};
use crate::output;

#[derive(Subcommand)]
pub enum RulesCommands {
    /// List rules ranked by how often they were confirmed
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(owner: Option<String>, command: RulesCommands) -> Result<()> {
    match command {
        RulesCommands::List { json } => {
            let (ctx, owner) = get_context(owner)?;
            let rules = ctx.rule_service.list(&owner)?;

            if json {
                return print_json(&rules);
            }

            if rules.is_empty() {
                println!("No rules learned yet. Rules are created when you confirm categorized transactions.");
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["Pattern", "Category", "Debit", "Credit", "Hits", "Confidence"]);
            for rule in &rules {
                table.add_row(vec![
                    rule.pattern.clone(),
                    rule.category.clone(),
                    rule.suggested_debit_account.clone().unwrap_or_else(|| "-".into()),
                    rule.suggested_credit_account.clone().unwrap_or_else(|| "-".into()),
                    rule.hit_count.to_string(),
                    output::format_confidence(rule.confidence()),
                ]);
            }
            println!("{}", table);
        }
    }
    Ok(())
}
