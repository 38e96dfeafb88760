//! Tally CLI - review bank statements into your ledger

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{account, confirm, logs, rules, staged, upload};

/// Tally - statement import and review in your terminal
#[derive(Parser)]
#[command(name = "tally", version, about, long_about = None)]
struct Cli {
    /// Owner whose data to act on (overrides settings.json and TALLY_OWNER)
    #[arg(long, global = true)]
    owner: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a statement (CSV, XLS/XLSX/ODS or PDF) into staging
    Upload {
        /// Statement file
        file: PathBuf,
        /// Password for a protected PDF
        #[arg(short, long)]
        password: Option<String>,
        /// Account ID the statement belongs to
        #[arg(long)]
        account: Option<String>,
        /// Extract and classify without staging
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Review staged transactions
    Staged {
        #[command(subcommand)]
        command: staged::StagedCommands,
    },

    /// Commit reviewed transactions into the ledger
    Confirm {
        /// Only confirm this batch
        #[arg(long)]
        batch: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect learned categorization rules
    Rules {
        #[command(subcommand)]
        command: rules::RulesCommands,
    },

    /// Manage accounts
    Account {
        #[command(subcommand)]
        command: account::AccountCommands,
    },

    /// View and manage application logs
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::report_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let owner = cli.owner;
    match cli.command {
        Commands::Upload { file, password, account, dry_run, json } => {
            upload::run(owner, &file, password, account, dry_run, json)
        }
        Commands::Staged { command } => staged::run(owner, command),
        Commands::Confirm { batch, json } => confirm::run(owner, batch, json),
        Commands::Rules { command } => rules::run(owner, command),
        Commands::Account { command } => account::run(owner, command),
        Commands::Logs { command } => logs::run(command),
    }
}
