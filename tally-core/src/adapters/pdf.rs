//! PDF glyph reader - positioned word tokens via pdf-extract
//!
//! pdf-extract walks every content stream and reports each character with
//! its text-rendering matrix. Characters are merged into word runs while
//! they share a baseline and follow each other closely; whitespace ends a
//! run. Coordinates are flipped so that y grows down the page.

use lopdf::Document;
use pdf_extract::{output_doc, MediaBox, OutputDev, OutputError, Transform};

use crate::domain::result::{Error, Result};
use crate::extract::PositionedToken;
use crate::ports::GlyphSource;

/// A baseline jump beyond this fraction of the glyph size starts a new run
const BASELINE_JUMP: f64 = 0.5;

/// A horizontal gap beyond this fraction of the glyph size starts a new run
const WORD_GAP: f64 = 0.25;

/// Reads PDF statements, decrypting with the supplied password
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfGlyphReader;

impl PdfGlyphReader {
    pub fn new() -> Self {
        Self
    }

    fn load(bytes: &[u8], password: Option<&str>) -> Result<Document> {
        let mut doc = Document::load_mem(bytes).map_err(|e| {
            let msg = e.to_string();
            if mentions_encryption(&msg) {
                match password {
                    None => Error::PasswordRequired,
                    Some(_) => Error::PasswordIncorrect,
                }
            } else {
                Error::validation(format!("could not read PDF: {}", msg))
            }
        })?;

        if doc.is_encrypted() {
            match password {
                // Owner-password-only documents open with an empty user password
                None => doc.decrypt("").map_err(|_| Error::PasswordRequired)?,
                Some(p) => doc.decrypt(p).map_err(|_| Error::PasswordIncorrect)?,
            }
        }
        Ok(doc)
    }
}

fn mentions_encryption(msg: &str) -> bool {
    let lower = msg.to_lowercase();
    lower.contains("encrypt") || lower.contains("decrypt") || lower.contains("password")
}

impl GlyphSource for PdfGlyphReader {
    fn read_glyphs(&self, bytes: &[u8], password: Option<&str>) -> Result<Vec<PositionedToken>> {
        let doc = Self::load(bytes, password)?;
        let mut collector = GlyphCollector::default();
        output_doc(&doc, &mut collector)
            .map_err(|e| Error::validation(format!("could not read PDF text: {:?}", e)))?;
        Ok(collector.finish())
    }
}

#[derive(Debug)]
struct Run {
    text: String,
    x: f64,
    y: f64,
    size: f64,
    end_x: f64,
}

/// OutputDev that accumulates word runs per page
#[derive(Debug, Default)]
struct GlyphCollector {
    tokens: Vec<PositionedToken>,
    page: u32,
    page_top: f64,
    current: Option<Run>,
}

impl GlyphCollector {
    fn flush(&mut self) {
        if let Some(run) = self.current.take() {
            let text = run.text.trim();
            if !text.is_empty() {
                self.tokens
                    .push(PositionedToken::new(text, run.x, run.y, self.page));
            }
        }
    }

    /// Add one glyph at page position (x, y) with the given size and advance
    fn push_glyph(&mut self, ch: &str, x: f64, y: f64, size: f64, advance: f64) {
        if ch.chars().all(char::is_whitespace) {
            self.flush();
            return;
        }

        let continues = self.current.as_ref().map_or(false, |run| {
            let tolerance = run.size.max(size);
            (y - run.y).abs() <= tolerance * BASELINE_JUMP
                && x >= run.x
                && (x - run.end_x).abs() <= tolerance * WORD_GAP
        });
        if !continues {
            self.flush();
        }

        match self.current.as_mut() {
            Some(run) => {
                run.text.push_str(ch);
                run.end_x = x + advance;
            }
            None => {
                self.current = Some(Run {
                    text: ch.to_string(),
                    x,
                    y,
                    size,
                    end_x: x + advance,
                });
            }
        }
    }

    fn finish(mut self) -> Vec<PositionedToken> {
        self.flush();
        self.tokens
    }
}

impl OutputDev for GlyphCollector {
    fn begin_page(
        &mut self,
        page_num: u32,
        media_box: &MediaBox,
        _art_box: Option<(f64, f64, f64, f64)>,
    ) -> std::result::Result<(), OutputError> {
        self.flush();
        self.page = page_num;
        self.page_top = media_box.ury;
        Ok(())
    }

    fn end_page(&mut self) -> std::result::Result<(), OutputError> {
        self.flush();
        Ok(())
    }

    fn output_character(
        &mut self,
        trm: &Transform,
        width: f64,
        _spacing: f64,
        font_size: f64,
        char: &str,
    ) -> std::result::Result<(), OutputError> {
        let scale = (trm.m11 * trm.m11 + trm.m12 * trm.m12).sqrt();
        let size = (font_size * scale).abs();
        let x = trm.m31;
        let y = self.page_top - trm.m32;
        self.push_glyph(char, x, y, size, width * size);
        Ok(())
    }

    fn begin_word(&mut self) -> std::result::Result<(), OutputError> {
        Ok(())
    }

    fn end_word(&mut self) -> std::result::Result<(), OutputError> {
        Ok(())
    }

    fn end_line(&mut self) -> std::result::Result<(), OutputError> {
        self.flush();
        Ok(())
    }
}
