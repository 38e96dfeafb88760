//! Configuration management
//!
//! settings.json lives in the data directory:
//! ```json
//! {
//!   "owner": "default",
//!   "import": { "maxUploadBytes": 20971520, "rowTolerance": 4.0, "errorCap": 5, "ruleListLimit": 200 }
//! }
//! ```
//! Keys this crate does not manage are ignored.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::extract::layout::ROW_TOLERANCE;

pub const DEFAULT_OWNER: &str = "default";
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;
pub const DEFAULT_ERROR_CAP: usize = 5;
pub const DEFAULT_RULE_LIST_LIMIT: usize = 200;

const SETTINGS_FILE: &str = "settings.json";
const OWNER_ENV: &str = "TALLY_OWNER";
const MAX_UPLOAD_ENV: &str = "TALLY_MAX_UPLOAD_BYTES";

/// Raw settings.json structure
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    import: ImportSettings,
}

/// Limits applied by upload, confirm and rule listing
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSettings {
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    /// Vertical tolerance for page-layout row clustering
    #[serde(default = "default_row_tolerance")]
    pub row_tolerance: f64,
    /// Maximum number of error messages surfaced per upload or confirm
    #[serde(default = "default_error_cap")]
    pub error_cap: usize,
    #[serde(default = "default_rule_list_limit")]
    pub rule_list_limit: usize,
}

fn default_max_upload_bytes() -> u64 {
    DEFAULT_MAX_UPLOAD_BYTES
}

fn default_row_tolerance() -> f64 {
    ROW_TOLERANCE
}

fn default_error_cap() -> usize {
    DEFAULT_ERROR_CAP
}

fn default_rule_list_limit() -> usize {
    DEFAULT_RULE_LIST_LIMIT
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            row_tolerance: ROW_TOLERANCE,
            error_cap: DEFAULT_ERROR_CAP,
            rule_list_limit: DEFAULT_RULE_LIST_LIMIT,
        }
    }
}

/// Tally configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub owner: String,
    pub import: ImportSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            owner: DEFAULT_OWNER.to_string(),
            import: ImportSettings::default(),
        }
    }
}

impl Config {
    /// Load settings.json from the data directory, then apply TALLY_* overrides
    pub fn load(data_dir: &Path) -> Result<Self> {
        let mut config = Self::load_file(data_dir)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load settings.json without environment overrides
    pub fn load_file(data_dir: &Path) -> Result<Self> {
        let raw = read_settings(data_dir)?;
        Ok(Self {
            owner: raw
                .owner
                .filter(|o| !o.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_OWNER.to_string()),
            import: raw.import,
        })
    }

    /// Apply environment overrides through a variable lookup
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(owner) = lookup(OWNER_ENV).filter(|o| !o.trim().is_empty()) {
            self.owner = owner;
        }
        if let Some(raw) = lookup(MAX_UPLOAD_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(limit) => self.import.max_upload_bytes = limit,
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid {}", MAX_UPLOAD_ENV),
            }
        }
    }
}

fn read_settings(data_dir: &Path) -> Result<SettingsFile> {
    let path = data_dir.join(SETTINGS_FILE);
    if !path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let settings = serde_json::from_str(&content)
        .with_context(|| format!("invalid JSON in {}", path.display()))?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_file() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_file(dir.path()).unwrap();
        assert_eq!(config.owner, "default");
        assert_eq!(config.import, ImportSettings::default());
        assert_eq!(config.import.max_upload_bytes, 20 * 1024 * 1024);
    }

    #[test]
    fn test_partial_import_section_fills_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{"owner": "alice", "import": {"errorCap": 10}}"#,
        )
        .unwrap();

        let config = Config::load_file(dir.path()).unwrap();
        assert_eq!(config.owner, "alice");
        assert_eq!(config.import.error_cap, 10);
        assert_eq!(config.import.rule_list_limit, 200);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env(|key| match key {
            "TALLY_OWNER" => Some("bob".to_string()),
            "TALLY_MAX_UPLOAD_BYTES" => Some("1024".to_string()),
            _ => None,
        });
        assert_eq!(config.owner, "bob");
        assert_eq!(config.import.max_upload_bytes, 1024);

        config.apply_env(|key| (key == "TALLY_MAX_UPLOAD_BYTES").then(|| "lots".to_string()));
        assert_eq!(config.import.max_upload_bytes, 1024);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{"theme": "dark", "import": {"maxUploadBytes": 100}}"#,
        )
        .unwrap();

        let config = Config::load_file(dir.path()).unwrap();
        assert_eq!(config.owner, "default");
        assert_eq!(config.import.max_upload_bytes, 100);
    }
}
