//! CLI command implementations

pub mod account;
pub mod confirm;
pub mod logs;
pub mod rules;
pub mod staged;
pub mod upload;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tally_core::{EntryPoint, LogEvent, LoggingService, TallyContext};

/// Get the logging service for CLI operations
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger() -> Option<LoggingService> {
    let data_dir = get_data_dir().ok()?;
    std::fs::create_dir_all(&data_dir).ok()?;
    LoggingService::new(&data_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION")).ok()
}

/// Log an event, ignoring any errors (logging should never break the app)
pub fn log_event(logger: &Option<LoggingService>, event: LogEvent) {
    if let Some(l) = logger {
        if let Err(e) = l.log(event) {
            tracing::debug!(error = %e, "failed to write log event");
        }
    }
}

/// Get the data directory from TALLY_DIR or ~/.tally
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("TALLY_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".tally"))
        .context("Could not find home directory; set TALLY_DIR")
}

/// Open the context and resolve the acting owner
pub fn get_context(owner: Option<String>) -> Result<(TallyContext, String)> {
    let data_dir = get_data_dir()?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create tally directory: {:?}", data_dir))?;

    let ctx = TallyContext::new(&data_dir).context("Failed to initialize tally context")?;
    let owner = owner
        .filter(|o| !o.trim().is_empty())
        .unwrap_or_else(|| ctx.owner().to_string());
    Ok((ctx, owner))
}

/// Print a serializable value as pretty JSON
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
