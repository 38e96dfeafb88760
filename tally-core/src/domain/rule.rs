//! Learned category rule domain entity

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Maximum number of description tokens folded into a rule pattern
const PATTERN_TOKENS: usize = 4;

/// A learned description -> classification mapping, scoped to one owner
///
/// Rules are unique per (owner, pattern). Confirming the same pattern again
/// overwrites category and accounts and bumps `hit_count`.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryRule {
    pub owner: String,
    /// Lower-cased, space-joined alphabetic tokens
    pub pattern: String,
    pub category: String,
    pub suggested_debit_account: Option<String>,
    pub suggested_credit_account: Option<String>,
    pub hit_count: i64,
    pub updated_at: DateTime<Utc>,
}

impl CategoryRule {
    pub fn new(
        owner: impl Into<String>,
        pattern: impl Into<String>,
        category: impl Into<String>,
        suggested_debit_account: Option<String>,
        suggested_credit_account: Option<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            pattern: pattern.into(),
            category: category.into(),
            suggested_debit_account,
            suggested_credit_account,
            hit_count: 1,
            updated_at: Utc::now(),
        }
    }

    /// Derive a rule pattern from a transaction description
    ///
    /// Takes up to the first four purely alphabetic tokens longer than two
    /// characters. Returns None when the description has no such token.
    pub fn derive_pattern(description: &str) -> Option<String> {
        let tokens: Vec<String> = description
            .split(|c: char| !c.is_alphabetic())
            .filter(|t| t.chars().count() > 2)
            .take(PATTERN_TOKENS)
            .map(|t| t.to_lowercase())
            .collect();

        if tokens.is_empty() {
            None
        } else {
            Some(tokens.join(" "))
        }
    }

    /// Lower-cased alphabetic tokens longer than two characters, space-joined
    ///
    /// Tokenised exactly like `derive_pattern`, so the pattern derived from a
    /// description is always a prefix of that description's normal form.
    pub fn normalize_description(description: &str) -> String {
        description
            .split(|c: char| !c.is_alphabetic())
            .filter(|t| t.chars().count() > 2)
            .map(|t| t.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Whether this rule's pattern occurs in the description (case-insensitive)
    pub fn matches(&self, description: &str) -> bool {
        if self.pattern.is_empty() {
            return false;
        }
        description.to_lowercase().contains(&self.pattern)
            || Self::normalize_description(description).contains(&self.pattern)
    }

    /// Confidence carried by a learned rule with this hit count
    pub fn confidence(&self) -> f64 {
        (0.7 + 0.05 * self.hit_count.max(0) as f64).min(0.95)
    }
}
