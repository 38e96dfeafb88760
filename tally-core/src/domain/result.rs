//! Result and error types for the core library

use thiserror::Error;

/// Core library error type
///
/// The first group of variants is caller-correctable (a bad upload, a wrong
/// password, an unknown id); see [`Error::is_client_error`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("File too large: {size} bytes (limit is {limit} bytes)")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("This document is password protected; supply the statement password")]
    PasswordRequired,

    #[error("Incorrect password for this document")]
    PasswordIncorrect,

    #[error("No transactions found in {format} file. {hint}")]
    NoTransactions { format: String, hint: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an extraction-empty error with a remediation hint
    pub fn no_transactions(format: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::NoTransactions {
            format: format.into(),
            hint: hint.into(),
        }
    }

    /// Errors the caller can fix by changing the request (the 4xx class)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedFormat(_)
                | Error::FileTooLarge { .. }
                | Error::PasswordRequired
                | Error::PasswordIncorrect
                | Error::NoTransactions { .. }
                | Error::NotFound(_)
                | Error::Validation(_)
        )
    }

    /// Remediation hint for client errors, when one applies
    pub fn hint(&self) -> Option<&str> {
        match self {
            Error::NoTransactions { hint, .. } => Some(hint.as_str()),
            Error::PasswordRequired => Some("Re-run with --password <secret>"),
            Error::PasswordIncorrect => Some("Check the password printed on the statement email or bank portal"),
            Error::UnsupportedFormat(_) => Some("Supported formats are CSV, XLS/XLSX/ODS and PDF"),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<Error>() {
            Ok(inner) => inner,
            Err(err) => match err.downcast_ref::<duckdb::Error>() {
                Some(db) => Error::Database(db.to_string()),
                None => Error::Other(format!("{:#}", err)),
            },
        }
    }
}

impl From<duckdb::Error> for Error {
    fn from(err: duckdb::Error) -> Self {
        Error::Database(err.to_string())
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;
