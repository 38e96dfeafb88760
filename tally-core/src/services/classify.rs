//! Classification - learned rules, then keyword defaults, then accounts
//!
//! Each classifier is a pure function of the description. The chain tries
//! them in order and the first answer wins; if none answers the row is
//! "Uncategorized" with zero confidence.

use serde::Serialize;

use crate::domain::{
    Account, AccountType, CategoryRule, Direction, StagedTransaction, UNCATEGORIZED,
};

/// Confidence carried by a keyword-table match
pub const KEYWORD_CONFIDENCE: f64 = 0.5;

/// A suggested category with optional ledger sides
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub category: String,
    pub debit_account: Option<String>,
    pub credit_account: Option<String>,
    pub confidence: f64,
}

impl Classification {
    pub fn uncategorized() -> Self {
        Self {
            category: UNCATEGORIZED.to_string(),
            debit_account: None,
            credit_account: None,
            confidence: 0.0,
        }
    }
}

pub trait Classifier {
    fn classify(&self, description: &str) -> Option<Classification>;
}

/// Owner's rule corpus, consulted by descending hit count
pub struct LearnedRuleClassifier {
    rules: Vec<CategoryRule>,
}

impl LearnedRuleClassifier {
    pub fn new(mut rules: Vec<CategoryRule>) -> Self {
        rules.sort_by(|a, b| b.hit_count.cmp(&a.hit_count));
        Self { rules }
    }
}

impl Classifier for LearnedRuleClassifier {
    fn classify(&self, description: &str) -> Option<Classification> {
        let rule = self.rules.iter().find(|r| r.matches(description))?;
        Some(Classification {
            category: rule.category.clone(),
            debit_account: rule.suggested_debit_account.clone(),
            credit_account: rule.suggested_credit_account.clone(),
            confidence: rule.confidence(),
        })
    }
}

/// Ordered keyword table; first category with a matching keyword wins
const KEYWORD_TABLE: &[(&str, &[&str])] = &[
    ("Salary", &["salary", "payroll", "sal credit"]),
    ("Interest", &["interest", "int pd", "int credit"]),
    ("Refunds", &["refund", "reversal", "cashback"]),
    ("EMI & Loans", &["emi", "loan", "nach", "ecs"]),
    ("Investments", &["mutual fund", "sip", "zerodha", "groww", "nps", "ppf"]),
    ("Insurance", &["insurance", "lic", "policy", "premium"]),
    ("Rent", &["rent", "landlord", "nobroker"]),
    ("Cash Withdrawal", &["atm", "cash withdrawal", "nwd", "atw"]),
    ("Bank Charges", &["charges", "fee", "gst", "penalty", "annual fee", "sms alert"]),
    (
        "Food & Dining",
        &["swiggy", "zomato", "restaurant", "cafe", "coffee", "starbucks", "dominos", "pizza", "mcdonald", "kfc", "eatery"],
    ),
    (
        "Groceries",
        &["bigbasket", "grofers", "blinkit", "zepto", "dmart", "grocery", "supermarket", "more retail", "instamart"],
    ),
    (
        "Shopping",
        &["amazon", "flipkart", "myntra", "ajio", "nykaa", "meesho", "decathlon", "ikea"],
    ),
    (
        "Transport",
        &["uber", "ola", "rapido", "metro", "fuel", "petrol", "diesel", "fastag", "parking", "irctc"],
    ),
    (
        "Travel",
        &["makemytrip", "goibibo", "cleartrip", "indigo", "air india", "vistara", "hotel", "airbnb", "oyo"],
    ),
    (
        "Utilities",
        &["electricity", "bescom", "water bill", "gas", "broadband", "airtel", "jio", "vodafone", "recharge", "dth", "bill payment"],
    ),
    (
        "Entertainment",
        &["netflix", "spotify", "prime video", "hotstar", "bookmyshow", "pvr", "inox", "youtube"],
    ),
    (
        "Health",
        &["pharmacy", "apollo", "medplus", "hospital", "clinic", "diagnostic", "1mg", "pharmeasy", "practo"],
    ),
    ("Education", &["school", "college", "tuition", "udemy", "coursera", "byju", "university"]),
    ("Transfers", &["neft", "imps", "rtgs", "transfer", "self"]),
];

/// Built-in vocabulary of merchants, utilities and income words
pub struct KeywordClassifier;

impl KeywordClassifier {
    /// Lower-cased alphanumeric words, space-padded for whole-word search
    fn normalize(description: &str) -> String {
        let words: Vec<String> = description
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(|w| w.to_lowercase())
            .collect();
        format!(" {} ", words.join(" "))
    }
}

impl Classifier for KeywordClassifier {
    fn classify(&self, description: &str) -> Option<Classification> {
        let haystack = Self::normalize(description);
        KEYWORD_TABLE
            .iter()
            .find(|(_, keywords)| {
                keywords
                    .iter()
                    .any(|kw| haystack.contains(&format!(" {} ", kw)))
            })
            .map(|(category, _)| Classification {
                category: category.to_string(),
                debit_account: None,
                credit_account: None,
                confidence: KEYWORD_CONFIDENCE,
            })
    }
}

/// Classifier chain plus account resolution against the owner's accounts
pub struct ClassificationEngine {
    chain: Vec<Box<dyn Classifier + Send + Sync>>,
    accounts: Vec<Account>,
}

impl ClassificationEngine {
    /// Learned rules first, keyword table second
    pub fn new(rules: Vec<CategoryRule>, accounts: Vec<Account>) -> Self {
        Self {
            chain: vec![
                Box::new(LearnedRuleClassifier::new(rules)),
                Box::new(KeywordClassifier),
            ],
            accounts,
        }
    }

    pub fn classify(&self, description: &str) -> Classification {
        self.chain
            .iter()
            .find_map(|c| c.classify(description))
            .unwrap_or_else(Classification::uncategorized)
    }

    /// Fill both ledger sides from the source account and a category search
    ///
    /// Outflows credit the source account and debit an expense account
    /// named after the category; inflows mirror that against income
    /// accounts. Sides that cannot be resolved stay `None`.
    pub fn resolve_accounts(
        &self,
        classification: &mut Classification,
        direction: Direction,
        source_account: Option<&str>,
    ) {
        let Some(source) = source_account else {
            return;
        };

        match direction {
            Direction::Outflow => {
                classification.credit_account = Some(source.to_string());
                if classification.debit_account.as_deref().map_or(true, |d| d == source) {
                    classification.debit_account =
                        self.find_account(AccountType::Expense, &classification.category);
                }
            }
            Direction::Inflow => {
                classification.debit_account = Some(source.to_string());
                if classification.credit_account.as_deref().map_or(true, |c| c == source) {
                    classification.credit_account =
                        self.find_account(AccountType::Income, &classification.category);
                }
            }
        }
    }

    fn find_account(&self, account_type: AccountType, category: &str) -> Option<String> {
        if category == UNCATEGORIZED {
            return None;
        }
        self.accounts
            .iter()
            .find(|a| a.account_type == account_type && a.name_contains(category))
            .map(|a| a.id.clone())
    }

    /// Classify a staged row in place
    pub fn apply(&self, row: &mut StagedTransaction, source_account: Option<&str>) {
        let mut classification = self.classify(&row.description);
        self.resolve_accounts(&mut classification, row.direction, source_account);

        row.suggested_category = classification.category;
        row.suggested_debit_account = classification.debit_account;
        row.suggested_credit_account = classification.credit_account;
        row.confidence = classification.confidence;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(pattern: &str, category: &str, hits: i64) -> CategoryRule {
        let mut rule = CategoryRule::new("alice", pattern, category, None, None);
        rule.hit_count = hits;
        rule
    }

    #[test]
    fn test_learned_rule_wins_over_keywords() {
        let engine = ClassificationEngine::new(vec![rule("swiggy", "Office Lunch", 6)], vec![]);
        let result = engine.classify("UPI/SWIGGY/4412/food");
        assert_eq!(result.category, "Office Lunch");
        assert_eq!(result.confidence, 0.95);
    }

    #[test]
    fn test_rules_ranked_by_hit_count() {
        let engine = ClassificationEngine::new(
            vec![rule("amazon", "Shopping", 1), rule("amazon prime", "Entertainment", 4)],
            vec![],
        );
        let result = engine.classify("AMAZON PRIME MEMBERSHIP");
        assert_eq!(result.category, "Entertainment");
        assert!((result.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_keyword_fallback() {
        let engine = ClassificationEngine::new(vec![], vec![]);
        let result = engine.classify("Coffee Shop");
        assert_eq!(result.category, "Food & Dining");
        assert_eq!(result.confidence, KEYWORD_CONFIDENCE);
    }

    #[test]
    fn test_keywords_match_whole_words() {
        let engine = ClassificationEngine::new(vec![], vec![]);
        // "ola" inside "granola" and "emi" inside "chemist" must not match
        assert_eq!(engine.classify("granola bar").category, UNCATEGORIZED);
        assert_eq!(engine.classify("chemist").category, UNCATEGORIZED);
        assert_eq!(engine.classify("OLA CABS").category, "Transport");
    }

    #[test]
    fn test_uncategorized_has_zero_confidence() {
        let engine = ClassificationEngine::new(vec![], vec![]);
        let result = engine.classify("XYZ 123");
        assert_eq!(result, Classification::uncategorized());
    }

    #[test]
    fn test_outflow_resolves_expense_account() {
        let accounts = vec![
            Account::new("bank", "alice", "Savings", AccountType::Asset),
            Account::new("food", "alice", "Food & Dining", AccountType::Expense),
        ];
        let engine = ClassificationEngine::new(vec![], accounts);

        let mut c = engine.classify("ZOMATO ORDER");
        engine.resolve_accounts(&mut c, Direction::Outflow, Some("bank"));
        assert_eq!(c.credit_account.as_deref(), Some("bank"));
        assert_eq!(c.debit_account.as_deref(), Some("food"));
    }

    #[test]
    fn test_inflow_resolves_income_account() {
        let accounts = vec![Account::new("pay", "alice", "Salary Income", AccountType::Income)];
        let engine = ClassificationEngine::new(vec![], accounts);

        let mut c = engine.classify("ACME PAYROLL MAY");
        engine.resolve_accounts(&mut c, Direction::Inflow, Some("bank"));
        assert_eq!(c.debit_account.as_deref(), Some("bank"));
        assert_eq!(c.credit_account.as_deref(), Some("pay"));
    }

    #[test]
    fn test_unresolved_side_stays_empty() {
        let engine = ClassificationEngine::new(vec![], vec![]);
        let mut c = engine.classify("mystery");
        engine.resolve_accounts(&mut c, Direction::Outflow, Some("bank"));
        assert_eq!(c.credit_account.as_deref(), Some("bank"));
        assert_eq!(c.debit_account, None);

        let mut c = engine.classify("mystery");
        engine.resolve_accounts(&mut c, Direction::Outflow, None);
        assert_eq!(c.credit_account, None);
    }

    #[test]
    fn test_rule_accounts_are_kept() {
        let mut learned = rule("rent", "Rent", 2);
        learned.suggested_debit_account = Some("rent-exp".into());
        let engine = ClassificationEngine::new(vec![learned], vec![]);

        let mut c = engine.classify("MONTHLY RENT TRANSFER");
        engine.resolve_accounts(&mut c, Direction::Outflow, Some("bank"));
        assert_eq!(c.debit_account.as_deref(), Some("rent-exp"));
        assert_eq!(c.credit_account.as_deref(), Some("bank"));
    }
}
