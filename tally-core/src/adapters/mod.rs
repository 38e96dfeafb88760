//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for StagingStore, RuleStore and Ledger
//! - pdf-extract over lopdf for GlyphSource

pub mod duckdb;
pub mod pdf;
