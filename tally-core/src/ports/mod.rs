//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The core domain
//! depends only on these traits, not on concrete implementations.

mod glyph_source;
mod repository;

pub use glyph_source::GlyphSource;
pub use repository::{Ledger, RuleStore, StagingStore};
