//! Value parsers - statement dates and amounts
//!
//! Pure functions. Failure is reported as `None` (dates) or zero (amounts),
//! never as a panic; callers skip the row.

use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::domain::Direction;

re!(re_dmy, r"^(\d{1,2})[/\-.](\d{1,2})[/\-.](\d{4}|\d{2})$");
re!(re_ymd, r"^(\d{4})[/\-.](\d{1,2})[/\-.](\d{1,2})$");
re!(re_day_mon_year,
    r"(?i)^(\d{1,2})[\s\-/]+([a-z]{3})[a-z]*\.?[\s\-/,]+(\d{4}|\d{2})$");
re!(re_date_prefix,
    r"(?i)^\s*(\d{1,2}[/\-.]\d{1,2}[/\-.](?:\d{4}|\d{2})|\d{4}[/\-.]\d{1,2}[/\-.]\d{1,2}|\d{1,2}[\s\-/]+(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?[\s\-/,]+(?:\d{4}|\d{2}))(?:\s|$)");
re!(re_trailing_time,
    r"(?i)^(.+?)[\sT]+\d{1,2}:\d{2}(?::\d{2})?(?:\.\d+)?\s*(?:am|pm)?(?:\s*(?:z|[+\-]\d{2}:?\d{2}))?$");
re!(re_currency, r"(?i)(rs\.?|inr|usd|eur|gbp|₹|\$|€|£|¥)");
re!(re_decimal_token,
    r"(?i)^[(\-+]?(?:rs\.?|inr|₹|\$)?\d{1,3}(?:,\d{2,3})*\.\d{1,2}\)?-?(?:cr|dr)?\.?$|^[(\-+]?(?:rs\.?|inr|₹|\$)?\d+\.\d{1,2}\)?-?(?:cr|dr)?\.?$");
re!(re_direction_marker, r"(?i)(?:^|[\d\s.])(cr|dr)\.?\s*$");

/// Fallback spellings tried after the explicit patterns
const FALLBACK_FORMATS: &[&str] = &[
    "%d %B %Y",
    "%B %d %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%b %d %Y",
    "%d-%B-%Y",
    "%d %b, %Y",
    "%Y%m%d",
];

/// Parse a statement date, day-first
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim().trim_matches('"').trim();
    if s.is_empty() {
        return None;
    }

    if let Some(caps) = re_dmy().captures(s) {
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let year = expand_year(&caps[3])?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    if let Some(caps) = re_ymd().captures(s) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    if let Some(caps) = re_day_mon_year().captures(s) {
        let day: u32 = caps[1].parse().ok()?;
        let month = month_from_abbrev(&caps[2])?;
        let year = expand_year(&caps[3])?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    // Spreadsheet exports often carry a time of day
    if let Some(caps) = re_trailing_time().captures(s) {
        let date_part = caps[1].trim();
        if date_part.len() < s.len() {
            return parse_date(date_part);
        }
    }

    FALLBACK_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Normalize a statement date to `YYYY-MM-DD`
pub fn normalize_date(raw: &str) -> Option<String> {
    parse_date(raw).map(|d| d.format("%Y-%m-%d").to_string())
}

/// If `text` starts with a date, return it and the byte length it spans
pub fn date_prefix(text: &str) -> Option<(NaiveDate, usize)> {
    let caps = re_date_prefix().captures(text)?;
    let m = caps.get(1)?;
    let date = parse_date(m.as_str())?;
    Some((date, m.end()))
}

/// Whether a token looks like a money value with two (or one) decimals
pub fn is_decimal_token(token: &str) -> bool {
    re_decimal_token().is_match(token.trim())
}

/// Trailing Cr / Dr marker on an amount ("1,200.00 Cr")
pub fn direction_marker(raw: &str) -> Option<Direction> {
    let caps = re_direction_marker().captures(raw.trim())?;
    match caps[1].to_lowercase().as_str() {
        "cr" => Some(Direction::Inflow),
        "dr" => Some(Direction::Outflow),
        _ => None,
    }
}

/// Parse an amount keeping its sign
///
/// Handles currency glyphs, grouping separators in any convention
/// ("1,23,456.78"), parentheses and trailing minus for negatives.
pub fn parse_signed_amount(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let without_currency = re_currency().replace_all(trimmed, "");
    let s = without_currency.trim();

    let parenthesized = s.starts_with('(') && s.ends_with(')');
    let negative = parenthesized
        || s.starts_with('-')
        || s.ends_with('-')
        || s.trim_start_matches('(').starts_with('-');

    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    if cleaned.is_empty() || cleaned.matches('.').count() > 1 {
        return None;
    }

    let value = Decimal::from_str(&cleaned).ok()?.round_dp(2);
    Some(if negative { -value } else { value })
}

/// Parse an amount as an absolute value; anything unparseable is zero
pub fn parse_amount(raw: &str) -> Decimal {
    parse_signed_amount(raw)
        .map(|d| d.abs())
        .unwrap_or(Decimal::ZERO)
}

fn expand_year(raw: &str) -> Option<i32> {
    let year: i32 = raw.parse().ok()?;
    if raw.len() == 2 {
        Some(if year > 50 { 1900 + year } else { 2000 + year })
    } else {
        Some(year)
    }
}

fn month_from_abbrev(raw: &str) -> Option<u32> {
    let month = match raw.to_lowercase().get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}
