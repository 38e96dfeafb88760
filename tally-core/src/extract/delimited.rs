//! Delimited-text extractor
//!
//! Bank CSV exports differ in delimiter, preamble and header wording. The
//! header row is located by synonym matching, then each data row is turned
//! into a candidate; rows without a parseable date or a non-zero amount
//! are skipped.

use std::collections::HashMap;

use csv::{ReaderBuilder, StringRecord};

use super::values::{direction_marker, parse_amount, parse_date, parse_signed_amount};
use crate::domain::result::{Error, Result};
use crate::domain::{Direction, RawTransactionCandidate};

/// Rows searched for a header before giving up
const HEADER_SEARCH_ROWS: usize = 30;

/// Description used when a row has none
const UNLABELLED: &str = "Unlabelled transaction";

const DATE_SYNONYMS: &[&str] = &[
    "txn date",
    "transaction date",
    "tran date",
    "posting date",
    "posted date",
    "date",
    "value date",
];
const TYPE_SYNONYMS: &[&str] = &[
    "cr/dr",
    "dr/cr",
    "debit/credit",
    "transaction type",
    "txn type",
    "type",
];
const BALANCE_SYNONYMS: &[&str] = &["closing balance", "running balance", "balance", "bal"];
const OUTFLOW_SYNONYMS: &[&str] = &["withdrawal", "debit", "dr", "paid out", "money out"];
const INFLOW_SYNONYMS: &[&str] = &["deposit", "credit", "cr", "paid in", "money in"];
const AMOUNT_SYNONYMS: &[&str] = &["amount", "amt"];
const DESCRIPTION_SYNONYMS: &[&str] = &[
    "description",
    "narration",
    "particulars",
    "details",
    "remarks",
    "memo",
    "payee",
    "merchant",
];

/// Column positions for the roles a statement can expose
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMap {
    pub date: usize,
    pub description: Option<usize>,
    pub outflow: Option<usize>,
    pub inflow: Option<usize>,
    pub amount: Option<usize>,
    pub balance: Option<usize>,
    pub kind: Option<usize>,
}

impl ColumnMap {
    /// Infer column roles from header cells
    ///
    /// Roles are claimed in a fixed order and each column serves one role.
    /// Returns None unless a date column and at least one amount-bearing
    /// column are present.
    pub fn detect(headers: &[String]) -> Option<Self> {
        let lowered: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
        let mut taken = vec![false; lowered.len()];

        let date = claim(&lowered, &mut taken, DATE_SYNONYMS)?;
        let kind = claim(&lowered, &mut taken, TYPE_SYNONYMS);
        let balance = claim(&lowered, &mut taken, BALANCE_SYNONYMS);
        let outflow = claim(&lowered, &mut taken, OUTFLOW_SYNONYMS);
        let inflow = claim(&lowered, &mut taken, INFLOW_SYNONYMS);
        let amount = if outflow.is_none() && inflow.is_none() {
            claim(&lowered, &mut taken, AMOUNT_SYNONYMS)
        } else {
            None
        };
        let description = claim(&lowered, &mut taken, DESCRIPTION_SYNONYMS);

        if outflow.is_none() && inflow.is_none() && amount.is_none() {
            return None;
        }

        Some(Self {
            date,
            description,
            outflow,
            inflow,
            amount,
            balance,
            kind,
        })
    }
}

/// Claim the first free column matching the earliest synonym in the list
fn claim(headers: &[String], taken: &mut [bool], synonyms: &[&str]) -> Option<usize> {
    for synonym in synonyms {
        let found = headers
            .iter()
            .enumerate()
            .find(|(i, h)| !taken[*i] && header_matches(h, synonym));
        if let Some((i, _)) = found {
            taken[i] = true;
            return Some(i);
        }
    }
    None
}

/// Short synonyms ("dr", "cr", "amt") only match as whole words
fn header_matches(header: &str, synonym: &str) -> bool {
    if synonym.len() <= 3 {
        header
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| word == synonym)
    } else {
        header.contains(synonym)
    }
}

/// Pick the delimiter that splits the most lines into the same number of fields
pub fn sniff_delimiter(text: &str) -> u8 {
    let lines: Vec<&str> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(20)
        .collect();

    let mut best = (b',', 0usize, 0usize);
    for &candidate in &[b',', b';', b'\t', b'|'] {
        let mut frequencies: HashMap<usize, usize> = HashMap::new();
        for line in &lines {
            let count = line.bytes().filter(|&b| b == candidate).count();
            if count > 0 {
                *frequencies.entry(count).or_default() += 1;
            }
        }
        if let Some((&count, &lines_agreeing)) = frequencies
            .iter()
            .max_by_key(|(count, lines)| (**lines, **count))
        {
            if (lines_agreeing, count) > (best.1, best.2) {
                best = (candidate, lines_agreeing, count);
            }
        }
    }
    best.0
}

/// Extract candidates from delimited text
pub fn extract(text: &str) -> Result<Vec<RawTransactionCandidate>> {
    let text = text.trim_start_matches('\u{feff}');
    let delimiter = sniff_delimiter(text);

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let mut records: Vec<StringRecord> = Vec::new();
    for record in reader.records() {
        match record {
            Ok(r) => records.push(r),
            Err(e) => tracing::debug!(error = %e, "skipping unreadable delimited row"),
        }
    }

    let (header_idx, columns) = records
        .iter()
        .take(HEADER_SEARCH_ROWS)
        .enumerate()
        .find_map(|(i, record)| {
            let headers: Vec<String> = record.iter().map(|f| f.to_string()).collect();
            ColumnMap::detect(&headers).map(|map| (i, map))
        })
        .ok_or_else(|| {
            Error::no_transactions(
                "CSV",
                "Could not find a header row with a date column and debit/credit or amount columns.",
            )
        })?;

    tracing::debug!(header_row = header_idx, ?columns, "detected delimited columns");

    Ok(records[header_idx + 1..]
        .iter()
        .filter_map(|record| candidate_from_record(record, &columns))
        .collect())
}

fn candidate_from_record(
    record: &StringRecord,
    columns: &ColumnMap,
) -> Option<RawTransactionCandidate> {
    let field = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("").trim();

    let date = parse_date(field(Some(columns.date)))?;

    let (amount, direction) = if columns.outflow.is_some() || columns.inflow.is_some() {
        let out = parse_amount(field(columns.outflow));
        let inn = parse_amount(field(columns.inflow));
        if !out.is_zero() {
            (out, Direction::Outflow)
        } else if !inn.is_zero() {
            (inn, Direction::Inflow)
        } else {
            return None;
        }
    } else {
        let raw = field(columns.amount);
        let signed = parse_signed_amount(raw)?;
        if signed.is_zero() {
            return None;
        }
        let direction = columns
            .kind
            .and_then(|_| direction_from_type(field(columns.kind)))
            .or_else(|| direction_marker(raw))
            .unwrap_or(if signed.is_sign_negative() {
                Direction::Outflow
            } else {
                Direction::Inflow
            });
        (signed.abs(), direction)
    };

    let description = collapse_whitespace(field(columns.description));
    let description = if description.is_empty() {
        UNLABELLED.to_string()
    } else {
        description
    };

    let balance = columns
        .balance
        .and_then(|_| parse_signed_amount(field(columns.balance)));

    Some(RawTransactionCandidate::new(date, description, amount, direction).with_balance(balance))
}

/// Read an explicit direction column ("DR", "Credit", "Withdrawal")
fn direction_from_type(value: &str) -> Option<Direction> {
    let v = value.trim().to_lowercase();
    if v.is_empty() {
        return None;
    }
    if v.starts_with("dr") || v.contains("debit") || v.contains("withdraw") {
        Some(Direction::Outflow)
    } else if v.starts_with("cr") || v.contains("credit") || v.contains("deposit") {
        Some(Direction::Inflow)
    } else {
        None
    }
}

pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
