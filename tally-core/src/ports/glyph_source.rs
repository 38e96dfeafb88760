//! Glyph source port - positioned text from page-layout documents

use crate::domain::result::Result;
use crate::extract::PositionedToken;

/// Decodes a page-layout document into positioned word tokens
///
/// Implementations return `Error::PasswordRequired` when the document is
/// protected and no password was given, and `Error::PasswordIncorrect`
/// when the given password does not open it.
pub trait GlyphSource: Send + Sync {
    fn read_glyphs(&self, bytes: &[u8], password: Option<&str>) -> Result<Vec<PositionedToken>>;
}
