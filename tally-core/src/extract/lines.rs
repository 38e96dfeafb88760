//! Line-based fallback for page layouts without a usable header row
//!
//! Every row starting with a date is a transaction. Decimal tokens after
//! the date are money columns read left to right; the text between the date
//! and the first amount is the narration.

use rust_decimal::Decimal;

use super::delimited::collapse_whitespace;
use super::layout::{adjust_for_statement, Row, StatementKind};
use super::values::{date_prefix, direction_marker, is_decimal_token, parse_amount, parse_signed_amount};
use crate::domain::{Direction, RawTransactionCandidate};

/// Narrations shorter than this borrow the following row's text
const MIN_NARRATION_CHARS: usize = 5;

struct MoneyToken<'a> {
    raw: &'a str,
    marker: Option<Direction>,
}

pub fn extract(rows: &[Row], kind: StatementKind) -> Vec<RawTransactionCandidate> {
    let mut candidates = Vec::new();

    for (i, row) in rows.iter().enumerate() {
        let text = row.text();
        let Some((date, prefix_len)) = date_prefix(&text) else {
            continue;
        };

        let words: Vec<&str> = text[prefix_len..].split_whitespace().collect();
        let Some(first_amount) = words.iter().position(|w| is_decimal_token(w)) else {
            continue;
        };

        let mut money: Vec<MoneyToken> = Vec::new();
        for word in &words[first_amount..] {
            if is_decimal_token(word) {
                money.push(MoneyToken {
                    raw: *word,
                    marker: direction_marker(word),
                });
            } else if let Some(last) = money.last_mut() {
                if matches!(word.to_lowercase().trim_end_matches('.'), "cr" | "dr") {
                    last.marker = direction_marker(word);
                }
            }
        }

        let mut narration = collapse_whitespace(&words[..first_amount].join(" "));
        if narration.chars().count() < MIN_NARRATION_CHARS {
            if let Some(next) = rows.get(i + 1).filter(|next| next.page == row.page) {
                let next_text = next.text();
                if date_prefix(&next_text).is_none() {
                    narration = collapse_whitespace(&format!("{narration} {next_text}"));
                }
            }
        }
        if narration.is_empty() {
            continue;
        }

        let Some((amount, direction, balance)) = resolve_money(&money) else {
            tracing::debug!(%date, "line fallback row without a non-zero amount");
            continue;
        };

        let direction = adjust_for_statement(kind, direction, &text, direction == Direction::Inflow);
        candidates.push(
            RawTransactionCandidate::new(date, narration, amount, direction).with_balance(balance),
        );
    }

    candidates
}

/// Interpret the money tokens of a line by how many there are
fn resolve_money(money: &[MoneyToken]) -> Option<(Decimal, Direction, Option<Decimal>)> {
    let single = |token: &MoneyToken| {
        let amount = parse_amount(token.raw);
        let direction = token.marker.unwrap_or(Direction::Outflow);
        (amount, direction)
    };

    let (amount, direction, balance) = match money {
        [] => return None,
        [only] => {
            let (amount, direction) = single(only);
            (amount, direction, None)
        }
        [first, second] => {
            let (amount, direction) = single(first);
            (amount, direction, parse_signed_amount(second.raw))
        }
        [outflow, inflow, .., last] => {
            let balance = parse_signed_amount(last.raw);
            let out = parse_amount(outflow.raw);
            let inn = parse_amount(inflow.raw);
            if !out.is_zero() {
                (out, Direction::Outflow, balance)
            } else {
                (inn, Direction::Inflow, balance)
            }
        }
    };

    if amount.is_zero() {
        None
    } else {
        Some((amount, direction, balance))
    }
}
