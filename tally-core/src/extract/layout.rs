//! Page-layout reconstructor
//!
//! A PDF statement has no table structure, only positioned glyph runs.
//! Rows are rebuilt by clustering tokens on the vertical axis, a header row
//! supplies column anchors, and each token of a transaction is assigned to
//! the anchor nearest to it horizontally. Wrapped narration lines are merged
//! into the transaction started by the preceding dated row.

use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;

use super::delimited::collapse_whitespace;
use super::lines;
use super::values::{date_prefix, direction_marker, is_decimal_token, parse_amount, parse_signed_amount};
use crate::domain::{Direction, RawTransactionCandidate};

/// Maximum vertical distance between glyphs on the same row
pub const ROW_TOLERANCE: f64 = 4.0;

/// Keyword groups a header row must hit at least this many of
pub const HEADER_MIN_HITS: usize = 3;

const HEADER_KEYWORDS: &[&[&str]] = &[
    &["date"],
    &["narration"],
    &["description"],
    &["particulars"],
    &["withdrawal"],
    &["deposit"],
    &["debit"],
    &["credit"],
    &["balance"],
    &["cheque", "chq", "reference", "ref no", "ref."],
];

const TERMINAL_KEYWORDS: &[&str] = &["total", "opening", "closing", "statement"];

const CARD_INFLOW_MARKERS: &[&str] = &["refund", "cashback", "reversal", "credit", "payment received"];

const NARRATION_LABELS: &[&str] = &["narration", "description", "particulars", "details", "remarks"];

re!(re_page_footer, r"(?i)^\s*page\s+\d+(?:\s+of\s+\d+)?\s*$");
re!(re_date_part,
    r"(?i)^(?:[\d/\-.]+|(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?),?$");

/// A run of text at a page position, y growing downward
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionedToken {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub page: u32,
}

impl PositionedToken {
    pub fn new(text: impl Into<String>, x: f64, y: f64, page: u32) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            page,
        }
    }
}

/// Tokens sharing a baseline, ordered left to right
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub page: u32,
    pub y: f64,
    pub tokens: Vec<PositionedToken>,
}

impl Row {
    /// Row text with tokens joined by a double space
    pub fn text(&self) -> String {
        self.tokens
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join("  ")
    }
}

/// Group tokens into rows
///
/// Tokens are sorted by (page, y, x); a token joins the current row when it
/// is on the same page and within `tolerance` of the previous token's y.
pub fn cluster_rows(mut tokens: Vec<PositionedToken>, tolerance: f64) -> Vec<Row> {
    tokens.retain(|t| !t.text.trim().is_empty());
    tokens.sort_by(|a, b| {
        a.page
            .cmp(&b.page)
            .then(a.y.total_cmp(&b.y))
            .then(a.x.total_cmp(&b.x))
    });

    let mut rows: Vec<Row> = Vec::new();
    let mut last_y = f64::NEG_INFINITY;

    for token in tokens {
        let joins = matches!(
            rows.last(),
            Some(row) if row.page == token.page && (token.y - last_y).abs() <= tolerance
        );
        last_y = token.y;

        match rows.last_mut() {
            Some(row) if joins => row.tokens.push(token),
            _ => rows.push(Row {
                page: token.page,
                y: token.y,
                tokens: vec![token],
            }),
        }
    }

    for row in &mut rows {
        row.tokens.sort_by(|a, b| a.x.total_cmp(&b.x));
    }
    rows
}

/// Statement issuer, a hint only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Issuer {
    Hdfc,
    Icici,
    Sbi,
    Axis,
    Kotak,
    YesBank,
    Idfc,
    IndusInd,
    BankOfBaroda,
    Pnb,
    Canara,
    UnionBank,
    Federal,
    Hsbc,
    StandardChartered,
    Citi,
    Amex,
    Unknown,
}

const ISSUER_NAMES: &[(&str, Issuer)] = &[
    ("hdfc", Issuer::Hdfc),
    ("icici", Issuer::Icici),
    ("state bank of india", Issuer::Sbi),
    ("sbi card", Issuer::Sbi),
    ("axis bank", Issuer::Axis),
    ("kotak", Issuer::Kotak),
    ("yes bank", Issuer::YesBank),
    ("idfc", Issuer::Idfc),
    ("indusind", Issuer::IndusInd),
    ("bank of baroda", Issuer::BankOfBaroda),
    ("punjab national bank", Issuer::Pnb),
    ("canara bank", Issuer::Canara),
    ("union bank of india", Issuer::UnionBank),
    ("federal bank", Issuer::Federal),
    ("hsbc", Issuer::Hsbc),
    ("standard chartered", Issuer::StandardChartered),
    ("citibank", Issuer::Citi),
    ("american express", Issuer::Amex),
];

impl Issuer {
    /// First issuer name found in lower-cased statement text
    pub fn detect(text_lower: &str) -> Self {
        ISSUER_NAMES
            .iter()
            .find(|(name, _)| text_lower.contains(name))
            .map(|(_, issuer)| *issuer)
            .unwrap_or(Issuer::Unknown)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Issuer::Hdfc => "HDFC Bank",
            Issuer::Icici => "ICICI Bank",
            Issuer::Sbi => "State Bank of India",
            Issuer::Axis => "Axis Bank",
            Issuer::Kotak => "Kotak Mahindra Bank",
            Issuer::YesBank => "Yes Bank",
            Issuer::Idfc => "IDFC First Bank",
            Issuer::IndusInd => "IndusInd Bank",
            Issuer::BankOfBaroda => "Bank of Baroda",
            Issuer::Pnb => "Punjab National Bank",
            Issuer::Canara => "Canara Bank",
            Issuer::UnionBank => "Union Bank of India",
            Issuer::Federal => "Federal Bank",
            Issuer::Hsbc => "HSBC",
            Issuer::StandardChartered => "Standard Chartered",
            Issuer::Citi => "Citibank",
            Issuer::Amex => "American Express",
            Issuer::Unknown => "unknown issuer",
        }
    }
}

/// Bank account statement or credit card statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    Bank,
    CreditCard,
}

impl StatementKind {
    pub fn detect(text_lower: &str) -> Self {
        if text_lower.contains("credit card") || text_lower.contains("card number") {
            StatementKind::CreditCard
        } else {
            StatementKind::Bank
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatementKind::Bank => "bank statement",
            StatementKind::CreditCard => "credit card statement",
        }
    }
}

/// Card statements default to outflow; refund-like rows and explicit
/// credits flip to inflow. Bank statements keep the resolved direction.
pub(crate) fn adjust_for_statement(
    kind: StatementKind,
    direction: Direction,
    text: &str,
    explicit_inflow: bool,
) -> Direction {
    if kind != StatementKind::CreditCard {
        return direction;
    }
    let lower = text.to_lowercase();
    if explicit_inflow || CARD_INFLOW_MARKERS.iter().any(|m| lower.contains(m)) {
        Direction::Inflow
    } else {
        Direction::Outflow
    }
}

/// Semantic role of a table column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Date,
    ValueDate,
    Narration,
    Reference,
    Withdrawal,
    Deposit,
    Balance,
    Amount,
}

/// Horizontal anchor per column role, taken from the header row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnAnchors {
    pub date: Option<f64>,
    pub value_date: Option<f64>,
    pub narration: Option<f64>,
    pub reference: Option<f64>,
    pub withdrawal: Option<f64>,
    pub deposit: Option<f64>,
    pub balance: Option<f64>,
    /// Generic "amount" labels not already tied to withdrawal/deposit
    pub amounts: Vec<f64>,
}

impl ColumnAnchors {
    /// Read anchors from the tokens of a header row
    pub fn from_header(row: &Row) -> Self {
        let mut anchors = Self::default();
        let mut previous: Option<ColumnRole> = None;
        let mut i = 0;

        while i < row.tokens.len() {
            let token = &row.tokens[i];
            let word = token.text.to_lowercase();
            let next = row.tokens.get(i + 1).map(|t| t.text.to_lowercase());
            let x = token.x;

            let role = if word.contains("value") {
                let inline = word.contains("date") || word.contains("dt");
                let split = next
                    .as_deref()
                    .map_or(false, |n| n.starts_with("date") || n.starts_with("dt"));
                if split && !inline {
                    i += 1;
                }
                if inline || split {
                    set(&mut anchors.value_date, x);
                    Some(ColumnRole::ValueDate)
                } else {
                    None
                }
            } else if word.contains("date") || word == "dt" {
                set(&mut anchors.date, x);
                Some(ColumnRole::Date)
            } else if NARRATION_LABELS.iter().any(|l| word.contains(l)) {
                set(&mut anchors.narration, x);
                Some(ColumnRole::Narration)
            } else if word.contains("cheque") || word.contains("chq") || word.starts_with("ref") {
                set(&mut anchors.reference, x);
                Some(ColumnRole::Reference)
            } else if word.contains("withdrawal") || word.contains("debit") || is_word(&word, "dr") {
                set(&mut anchors.withdrawal, x);
                Some(ColumnRole::Withdrawal)
            } else if word.contains("deposit") || word.contains("credit") || is_word(&word, "cr") {
                set(&mut anchors.deposit, x);
                Some(ColumnRole::Deposit)
            } else if word.contains("balance") {
                set(&mut anchors.balance, x);
                Some(ColumnRole::Balance)
            } else if word.contains("amount") || word.starts_with("amt") {
                let qualifies_previous = matches!(
                    previous,
                    Some(ColumnRole::Withdrawal | ColumnRole::Deposit | ColumnRole::Balance)
                );
                if !qualifies_previous {
                    anchors.amounts.push(x);
                }
                Some(ColumnRole::Amount)
            } else {
                None
            };

            if role.is_some() {
                previous = role;
            }
            i += 1;
        }

        anchors.infer_amount_columns();
        anchors
    }

    /// Two generic amount columns stand in for withdrawal and deposit
    fn infer_amount_columns(&mut self) {
        let distinct = matches!(
            (self.withdrawal, self.deposit),
            (Some(w), Some(d)) if (w - d).abs() > f64::EPSILON
        );
        if !distinct && self.amounts.len() >= 2 {
            let left = self.amounts.iter().copied().fold(f64::INFINITY, f64::min);
            let right = self.amounts.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            self.withdrawal = Some(left);
            self.deposit = Some(right);
            self.amounts.clear();
        }
    }

    fn numeric_anchors(&self) -> Vec<(ColumnRole, f64)> {
        let mut anchors = Vec::new();
        push_anchor(&mut anchors, ColumnRole::Withdrawal, self.withdrawal);
        push_anchor(&mut anchors, ColumnRole::Deposit, self.deposit);
        push_anchor(&mut anchors, ColumnRole::Balance, self.balance);
        anchors.extend(self.amounts.iter().map(|x| (ColumnRole::Amount, *x)));
        anchors
    }

    fn all_anchors(&self) -> Vec<(ColumnRole, f64)> {
        let mut anchors = Vec::new();
        push_anchor(&mut anchors, ColumnRole::Date, self.date);
        push_anchor(&mut anchors, ColumnRole::ValueDate, self.value_date);
        push_anchor(&mut anchors, ColumnRole::Narration, self.narration);
        push_anchor(&mut anchors, ColumnRole::Reference, self.reference);
        anchors.extend(self.numeric_anchors());
        anchors
    }

    /// Nearest money column; ties go to withdrawal, then deposit, then balance
    pub fn numeric_role(&self, x: f64) -> Option<ColumnRole> {
        nearest(&self.numeric_anchors(), x)
    }

    /// Nearest column of any role
    pub fn nearest_role(&self, x: f64) -> Option<ColumnRole> {
        nearest(&self.all_anchors(), x)
    }
}

fn set(slot: &mut Option<f64>, x: f64) {
    if slot.is_none() {
        *slot = Some(x);
    }
}

fn push_anchor(anchors: &mut Vec<(ColumnRole, f64)>, role: ColumnRole, x: Option<f64>) {
    if let Some(x) = x {
        anchors.push((role, x));
    }
}

fn nearest(anchors: &[(ColumnRole, f64)], x: f64) -> Option<ColumnRole> {
    let mut best: Option<(ColumnRole, f64)> = None;
    for &(role, anchor) in anchors {
        let distance = (anchor - x).abs();
        match best {
            Some((_, d)) if distance >= d => {}
            _ => best = Some((role, distance)),
        }
    }
    best.map(|(role, _)| role)
}

fn is_word(text: &str, word: &str) -> bool {
    text.split(|c: char| !c.is_alphanumeric()).any(|w| w == word)
}

/// Number of header keyword groups present in a row's text
pub fn header_hits(text: &str) -> usize {
    let lower = text.to_lowercase();
    HEADER_KEYWORDS
        .iter()
        .filter(|group| group.iter().any(|k| lower.contains(k)))
        .count()
}

/// Index of the first row that looks like a table header
pub fn find_header(rows: &[Row]) -> Option<usize> {
    rows.iter()
        .position(|row| header_hits(&row.text()) >= HEADER_MIN_HITS)
}

fn is_terminal(text: &str) -> bool {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .any(|w| TERMINAL_KEYWORDS.contains(&w))
}

/// A dated row plus its continuation lines, not yet resolved
#[derive(Debug)]
struct PendingEntry {
    date: chrono::NaiveDate,
    page: u32,
    tokens: Vec<PositionedToken>,
    text: String,
}

/// Extract transactions from the rows below a header
pub fn extract_table(
    rows: &[Row],
    anchors: &ColumnAnchors,
    kind: StatementKind,
) -> Vec<RawTransactionCandidate> {
    let mut candidates = Vec::new();
    let mut pending: Option<PendingEntry> = None;

    for row in rows {
        let text = row.text();

        if let Some((date, prefix_len)) = date_prefix(&text) {
            flush(&mut pending, anchors, kind, &mut candidates);
            let skip = tokens_spanning(&row.tokens, prefix_len);
            pending = Some(PendingEntry {
                date,
                page: row.page,
                tokens: row.tokens[skip..].to_vec(),
                text,
            });
            continue;
        }

        let ends_entry = is_terminal(&text)
            || header_hits(&text) >= HEADER_MIN_HITS
            || re_page_footer().is_match(&text);
        let page_changed = pending.as_ref().map_or(false, |p| p.page != row.page);
        if ends_entry || page_changed {
            flush(&mut pending, anchors, kind, &mut candidates);
            continue;
        }

        if let Some(entry) = pending.as_mut() {
            entry.tokens.extend(row.tokens.iter().cloned());
            entry.text.push_str("  ");
            entry.text.push_str(&text);
        }
    }

    flush(&mut pending, anchors, kind, &mut candidates);
    candidates
}

/// Leading tokens covered by the first `len` bytes of the row text
fn tokens_spanning(tokens: &[PositionedToken], len: usize) -> usize {
    let mut covered = 0;
    let mut count = 0;
    for token in tokens {
        if covered >= len {
            break;
        }
        covered += token.text.len() + 2;
        count += 1;
    }
    count
}

fn flush(
    pending: &mut Option<PendingEntry>,
    anchors: &ColumnAnchors,
    kind: StatementKind,
    out: &mut Vec<RawTransactionCandidate>,
) {
    if let Some(entry) = pending.take() {
        match resolve_entry(&entry, anchors, kind) {
            Some(candidate) => out.push(candidate),
            None => tracing::debug!(date = %entry.date, "discarding layout row without amount or narration"),
        }
    }
}

fn resolve_entry(
    entry: &PendingEntry,
    anchors: &ColumnAnchors,
    kind: StatementKind,
) -> Option<RawTransactionCandidate> {
    let mut withdrawal: Option<Decimal> = None;
    let mut deposit: Option<Decimal> = None;
    let mut balance: Option<Decimal> = None;
    let mut amount: Option<Decimal> = None;
    let mut marker: Option<Direction> = None;
    let mut last_numeric: Option<ColumnRole> = None;
    let mut narration: Vec<&str> = Vec::new();
    let mut reference: Vec<&str> = Vec::new();

    for token in &entry.tokens {
        let text = token.text.trim();
        let lower = text.to_lowercase();

        if matches!(lower.trim_end_matches('.'), "cr" | "dr") {
            if last_numeric == Some(ColumnRole::Amount) {
                marker = direction_marker(text);
            }
            continue;
        }

        if is_decimal_token(text) {
            let role = anchors.numeric_role(token.x);
            match role {
                Some(ColumnRole::Withdrawal) => {
                    withdrawal.get_or_insert(parse_amount(text));
                }
                Some(ColumnRole::Deposit) => {
                    deposit.get_or_insert(parse_amount(text));
                }
                Some(ColumnRole::Balance) => {
                    if balance.is_none() {
                        balance = parse_signed_amount(text);
                    }
                }
                Some(ColumnRole::Amount) => {
                    if amount.is_none() {
                        amount = Some(parse_amount(text));
                        marker = direction_marker(text).or(marker);
                    }
                }
                _ => narration.push(text),
            }
            last_numeric = role;
            continue;
        }

        match anchors.nearest_role(token.x) {
            Some(ColumnRole::Date | ColumnRole::ValueDate) if re_date_part().is_match(text) => {}
            Some(ColumnRole::Reference) if starts_with_digits(text, 5) => reference.push(text),
            _ => narration.push(text),
        }
    }

    let narration = collapse_whitespace(&narration.join(" "));
    if narration.is_empty() {
        return None;
    }

    let withdrawal = withdrawal.unwrap_or(Decimal::ZERO);
    let deposit = deposit.unwrap_or(Decimal::ZERO);
    let amount = amount.unwrap_or(Decimal::ZERO);

    let (value, direction, explicit_inflow) = if !withdrawal.is_zero() {
        (withdrawal, Direction::Outflow, false)
    } else if !deposit.is_zero() {
        (deposit, Direction::Inflow, true)
    } else if !amount.is_zero() {
        let direction = marker.unwrap_or(Direction::Outflow);
        (amount, direction, direction == Direction::Inflow)
    } else {
        return None;
    };

    let direction = adjust_for_statement(kind, direction, &entry.text, explicit_inflow);
    let reference = if reference.is_empty() {
        None
    } else {
        Some(reference.join(""))
    };

    Some(
        RawTransactionCandidate::new(entry.date, narration, value, direction)
            .with_balance(balance)
            .with_reference(reference),
    )
}

fn starts_with_digits(text: &str, n: usize) -> bool {
    text.chars().take(n).filter(|c| c.is_ascii_digit()).count() == n
}

/// Result of reconstructing one document
#[derive(Debug, Clone)]
pub struct LayoutExtraction {
    pub candidates: Vec<RawTransactionCandidate>,
    pub issuer: Issuer,
    pub kind: StatementKind,
    /// Index of the detected header row, None when the line fallback ran
    pub header_row: Option<usize>,
}

/// Rebuild transactions from positioned glyph tokens
pub fn reconstruct(tokens: Vec<PositionedToken>, tolerance: f64) -> LayoutExtraction {
    let rows = cluster_rows(tokens, tolerance);
    let full_text = rows
        .iter()
        .map(Row::text)
        .collect::<Vec<_>>()
        .join("\n")
        .to_lowercase();

    let issuer = Issuer::detect(&full_text);
    let kind = StatementKind::detect(&full_text);

    let mut header_row = find_header(&rows);
    let mut candidates = match header_row {
        Some(idx) => {
            let anchors = ColumnAnchors::from_header(&rows[idx]);
            tracing::debug!(row = idx, ?anchors, "detected layout header");
            extract_table(&rows[idx + 1..], &anchors, kind)
        }
        None => Vec::new(),
    };

    if candidates.is_empty() {
        tracing::debug!(rows = rows.len(), "no table rows recovered, using line fallback");
        header_row = None;
        candidates = lines::extract(&rows, kind);
    }

    LayoutExtraction {
        candidates,
        issuer,
        kind,
        header_row,
    }
}
