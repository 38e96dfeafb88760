//! Statement extraction - format detection, dispatch and extractors
//!
//! Every extractor turns one source document into an ordered list of
//! [`RawTransactionCandidate`]s:
//!
//! - **delimited**: CSV/TSV with header synonym detection
//! - **spreadsheet**: first worksheet rendered to delimited text
//! - **layout**: page-layout reconstruction from positioned glyphs
//! - **lines**: line-based fallback when a layout has no header row

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

pub mod delimited;
pub mod layout;
pub mod lines;
pub mod spreadsheet;
pub mod values;

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::domain::result::{Error, Result};
use crate::domain::RawTransactionCandidate;
use crate::ports::GlyphSource;

pub use layout::{Issuer, PositionedToken, Row, StatementKind};

/// Source document family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementFormat {
    Delimited,
    Spreadsheet,
    PageLayout,
}

impl StatementFormat {
    /// Pick a format from the file extension, then from the leading bytes
    pub fn detect(file_name: &str, bytes: &[u8]) -> Result<Self> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("csv" | "tsv" | "txt") => return Ok(StatementFormat::Delimited),
            Some("xlsx" | "xlsm" | "xlsb" | "xls" | "ods") => return Ok(StatementFormat::Spreadsheet),
            Some("pdf") => return Ok(StatementFormat::PageLayout),
            _ => {}
        }

        if bytes.starts_with(b"%PDF-") {
            Ok(StatementFormat::PageLayout)
        } else if bytes.starts_with(b"PK\x03\x04") || bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0]) {
            Ok(StatementFormat::Spreadsheet)
        } else {
            Err(Error::UnsupportedFormat(match ext {
                Some(e) => format!(".{} files are not supported", e),
                None => format!("could not recognise '{}'", file_name),
            }))
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatementFormat::Delimited => "CSV",
            StatementFormat::Spreadsheet => "spreadsheet",
            StatementFormat::PageLayout => "PDF",
        }
    }

    /// Remediation hint when nothing could be extracted
    pub fn empty_hint(&self) -> &'static str {
        match self {
            StatementFormat::Delimited => {
                "Check that the file has a header row naming a date column and either debit/credit or amount columns."
            }
            StatementFormat::Spreadsheet => {
                "Make sure the first worksheet holds the transaction table with a header row (Date, Description, Debit/Credit or Amount)."
            }
            StatementFormat::PageLayout => {
                "The statement layout could not be read. Scanned (image-only) PDFs are not supported; try the CSV or Excel download from your bank instead."
            }
        }
    }

    fn temp_suffix(&self, file_name: &str) -> String {
        match Path::new(file_name).extension().and_then(|e| e.to_str()) {
            Some(ext) => format!(".{}", ext.to_lowercase()),
            None => match self {
                StatementFormat::Delimited => ".csv".to_string(),
                StatementFormat::Spreadsheet => ".xlsx".to_string(),
                StatementFormat::PageLayout => ".pdf".to_string(),
            },
        }
    }
}

/// Everything an extractor recovered from one document
#[derive(Debug, Clone)]
pub struct Extraction {
    pub format: StatementFormat,
    pub candidates: Vec<RawTransactionCandidate>,
    pub issuer: Issuer,
    pub kind: StatementKind,
}

/// Dispatches a document to the right extractor
///
/// The uploaded bytes are written to a named temp file for the duration of
/// the extraction; the file is removed when the guard drops, whether the
/// extraction succeeded or not.
pub struct StatementExtractor {
    glyphs: Box<dyn GlyphSource>,
    row_tolerance: f64,
    temp_dir: Option<PathBuf>,
}

impl StatementExtractor {
    pub fn new(glyphs: Box<dyn GlyphSource>, row_tolerance: f64) -> Self {
        Self {
            glyphs,
            row_tolerance,
            temp_dir: None,
        }
    }

    /// Write upload temp files under `dir` instead of the system temp dir
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn extract(
        &self,
        file_name: &str,
        bytes: &[u8],
        password: Option<&str>,
    ) -> Result<Extraction> {
        let format = StatementFormat::detect(file_name, bytes)?;

        let suffix = format.temp_suffix(file_name);
        let mut builder = tempfile::Builder::new();
        builder.prefix("tally-upload-").suffix(&suffix);
        let mut temp = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        temp.write_all(bytes)?;
        temp.flush()?;

        let extraction = self.extract_path(format, temp.path(), password);

        if let Err(e) = temp.close() {
            tracing::warn!(error = %e, "failed to remove temporary upload file");
        }

        let extraction = extraction?;
        if extraction.candidates.is_empty() {
            return Err(Error::no_transactions(format.label(), format.empty_hint()));
        }
        Ok(extraction)
    }

    fn extract_path(
        &self,
        format: StatementFormat,
        path: &Path,
        password: Option<&str>,
    ) -> Result<Extraction> {
        match format {
            StatementFormat::Delimited => {
                let text = std::fs::read(path)?;
                Ok(Extraction {
                    format,
                    candidates: delimited::extract(&String::from_utf8_lossy(&text))?,
                    issuer: Issuer::Unknown,
                    kind: StatementKind::Bank,
                })
            }
            StatementFormat::Spreadsheet => Ok(Extraction {
                format,
                candidates: spreadsheet::extract(path)?,
                issuer: Issuer::Unknown,
                kind: StatementKind::Bank,
            }),
            StatementFormat::PageLayout => {
                let data = std::fs::read(path)?;
                let tokens = self.glyphs.read_glyphs(&data, password)?;
                tracing::debug!(glyphs = tokens.len(), "collected page glyphs");
                let layout = layout::reconstruct(tokens, self.row_tolerance);
                Ok(Extraction {
                    format,
                    candidates: layout.candidates,
                    issuer: layout.issuer,
                    kind: layout.kind,
                })
            }
        }
    }
}
