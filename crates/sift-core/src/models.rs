//! Data models for Sift

use std::collections::btree_map;
use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Catch-all category; always a member of every category set
pub const MISC: &str = "Misc";

/// Default closed category set, in display order
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "Rent",
    "Groceries",
    "Dining",
    "Transport",
    "Utilities",
    "Investments",
    "Income",
    "Shopping",
    MISC,
];

/// Money direction of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Debit,
    Credit,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debit => "Debit",
            Self::Credit => "Credit",
        }
    }

    /// Infer direction from a signed amount (positive = money in)
    pub fn from_amount(amount: f64) -> Self {
        if amount > 0.0 {
            Self::Credit
        } else {
            Self::Debit
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "debit" => Ok(Self::Debit),
            "credit" => Ok(Self::Credit),
            _ => Err(format!("Unknown direction: {}", s)),
        }
    }
}

/// A financial transaction flowing through the classification core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transactions without a date are skipped by recurring detection
    #[serde(default)]
    pub date: Option<NaiveDate>,
    pub description: String,
    /// Negative = expense, positive = income
    pub amount: f64,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub balance: Option<f64>,
    /// Always a member of the configured category set once categorized
    #[serde(default = "misc")]
    pub category: String,
    /// Canonical merchant name (empty until normalized)
    #[serde(default)]
    pub merchant: String,
    /// Where the record came from (e.g., statement file name)
    #[serde(default)]
    pub source: Option<String>,
}

fn misc() -> String {
    MISC.to_string()
}

impl Transaction {
    /// Create an uncategorized transaction, inferring direction from the amount sign
    pub fn new(date: Option<NaiveDate>, description: impl Into<String>, amount: f64) -> Self {
        Self {
            date,
            description: description.into(),
            amount,
            direction: Direction::from_amount(amount),
            balance: None,
            category: misc(),
            merchant: String::new(),
            source: None,
        }
    }

    /// Builder-style category setter (used when loading categorized history)
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }
}

/// Raw transaction candidate as produced by CSV/PDF/LLM extraction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub balance: Option<f64>,
    #[serde(default)]
    pub source: Option<String>,
}

/// Closed set of category names
///
/// `Misc` is always a member; names are trimmed and deduplicated on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySet {
    names: Vec<String>,
}

impl CategorySet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set: Vec<String> = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            if !name.is_empty() && !set.iter().any(|n| n == name) {
                set.push(name.to_string());
            }
        }
        if !set.iter().any(|n| n == MISC) {
            set.push(MISC.to_string());
        }
        Self { names: set }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Coerce a category into the set (out-of-set values become `Misc`)
    pub fn resolve(&self, name: &str) -> String {
        if self.contains(name) {
            name.to_string()
        } else {
            MISC.to_string()
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for CategorySet {
    fn default() -> Self {
        Self::new(DEFAULT_CATEGORIES.iter().copied())
    }
}

/// A keyword rule: any keyword found in a description assigns the category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub category: String,
    /// Lowercase substrings, checked in order
    pub keywords: Vec<String>,
}

impl CategoryRule {
    /// Build a rule, lowercasing and trimming keywords and dropping empty ones
    pub fn new<I, S>(category: impl Into<String>, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            category: category.into().trim().to_string(),
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// Re-apply keyword normalization (used at the load boundary)
    pub fn normalized(self) -> Self {
        Self::new(self.category, self.keywords)
    }
}

/// Exact-description category overrides (description -> category)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Overrides(BTreeMap<String, String>);

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, description: &str) -> Option<&str> {
        self.0.get(description).map(String::as_str)
    }

    pub fn insert(&mut self, description: impl Into<String>, category: impl Into<String>) {
        self.0.insert(description.into(), category.into());
    }

    pub fn remove(&mut self, description: &str) -> Option<String> {
        self.0.remove(description)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }
}

impl FromIterator<(String, String)> for Overrides {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// User-defined merchant mappings (raw description -> canonical name)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MerchantMappings(BTreeMap<String, String>);

impl MerchantMappings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, raw: &str) -> Option<&str> {
        self.0.get(raw).map(String::as_str)
    }

    pub fn insert(&mut self, raw: impl Into<String>, canonical: impl Into<String>) {
        self.0.insert(raw.into(), canonical.into());
    }

    pub fn remove(&mut self, raw: &str) -> Option<String> {
        self.0.remove(raw)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }
}

impl FromIterator<(String, String)> for MerchantMappings {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A previously categorized description used as a similarity candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownMerchant {
    pub description: String,
    pub category: String,
}

impl KnownMerchant {
    pub fn new(description: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            category: category.into(),
        }
    }
}

/// Which tier of the categorization cascade decided a category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategorySource {
    /// Exact-description user override
    Override,
    /// Keyword rule substring match
    Rule,
    /// Nearest known merchant by embedding similarity
    Similarity,
    /// Evidence-word scoring fallback
    Heuristic,
}

impl CategorySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Override => "override",
            Self::Rule => "rule",
            Self::Similarity => "similarity",
            Self::Heuristic => "heuristic",
        }
    }
}

impl std::str::FromStr for CategorySource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "override" => Ok(Self::Override),
            "rule" => Ok(Self::Rule),
            "similarity" => Ok(Self::Similarity),
            "heuristic" => Ok(Self::Heuristic),
            _ => Err(format!("Unknown category source: {}", s)),
        }
    }
}

/// A detected recurring payment with its forecast next occurrence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringPattern {
    /// Grouping key: first words of the description plus the rounded amount bucket
    pub key: String,
    /// Description of the most recent occurrence
    pub description: String,
    /// Amount of the most recent occurrence
    pub amount: f64,
    pub category: String,
    /// Mean interval truncated to whole days
    pub frequency_days: i64,
    pub mean_interval_days: f64,
    pub last_date: NaiveDate,
    pub next_expected: NaiveDate,
    pub occurrences: usize,
    /// 0.0 - 1.0
    pub confidence: f64,
}

/// A recurring pattern expected within a forecast window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpcomingExpense {
    pub description: String,
    pub amount: f64,
    pub category: String,
    pub expected_date: NaiveDate,
    /// Negative when the expected date has already passed
    pub days_until: i64,
    pub frequency_days: i64,
    pub confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_set_always_has_misc() {
        let set = CategorySet::new(["Groceries", "Dining"]);
        assert!(set.contains(MISC));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_category_set_dedupes_and_trims() {
        let set = CategorySet::new([" Rent ", "Rent", "", "Misc"]);
        assert_eq!(set.names(), &["Rent".to_string(), "Misc".to_string()]);
    }

    #[test]
    fn test_category_set_resolve() {
        let set = CategorySet::default();
        assert_eq!(set.resolve("Groceries"), "Groceries");
        assert_eq!(set.resolve("groceries"), "Misc");
        assert_eq!(set.resolve("Entertainment"), "Misc");
        assert_eq!(set.resolve(""), "Misc");
    }

    #[test]
    fn test_category_rule_normalizes_keywords() {
        let rule = CategoryRule::new("Groceries", ["  Whole Foods ", "", "ALDI"]);
        assert_eq!(rule.keywords, vec!["whole foods", "aldi"]);
    }

    #[test]
    fn test_direction_from_amount() {
        assert_eq!(Direction::from_amount(12.5), Direction::Credit);
        assert_eq!(Direction::from_amount(-3.0), Direction::Debit);
        assert_eq!(Direction::from_amount(0.0), Direction::Debit);
    }

    #[test]
    fn test_category_source_roundtrip() {
        for source in [
            CategorySource::Override,
            CategorySource::Rule,
            CategorySource::Similarity,
            CategorySource::Heuristic,
        ] {
            assert_eq!(source.as_str().parse::<CategorySource>().unwrap(), source);
        }
    }

    #[test]
    fn test_transaction_deserialize_defaults() {
        let tx: Transaction =
            serde_json::from_str(r#"{"description":"NETFLIX.COM","amount":-15.99}"#).unwrap();
        assert_eq!(tx.category, MISC);
        assert!(tx.date.is_none());
        assert_eq!(tx.direction, Direction::Debit);
    }

    #[test]
    fn test_overrides_serialize_as_map() {
        let mut overrides = Overrides::new();
        overrides.insert("STORE A", "Shopping");
        let json = serde_json::to_string(&overrides).unwrap();
        assert_eq!(json, r#"{"STORE A":"Shopping"}"#);
    }
}
