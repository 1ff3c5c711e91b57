//! Keyword rules and description overrides
//!
//! Rules are an ordered list of `CategoryRule`s. Matching walks rules in stored
//! order and keywords in stored order; the first case-insensitive substring hit
//! decides the category.

use crate::models::{CategoryRule, CategorySet, Overrides};

/// Deterministic keyword matcher over an ordered rule list
#[derive(Debug, Clone, Default)]
pub struct KeywordRuleMatcher {
    rules: Vec<CategoryRule>,
}

impl KeywordRuleMatcher {
    pub fn new(rules: Vec<CategoryRule>) -> Self {
        Self { rules }
    }

    /// Matcher over the built-in default rules
    pub fn with_defaults() -> Self {
        Self::new(default_rules())
    }

    /// Category of the first rule with a keyword contained in the description
    pub fn match_category(&self, description: &str) -> Option<&str> {
        self.matching_rule(description)
            .map(|(rule, _)| rule.category.as_str())
    }

    /// First matching rule and the keyword that matched
    pub fn matching_rule(&self, description: &str) -> Option<(&CategoryRule, &str)> {
        let desc = description.to_lowercase();
        if desc.trim().is_empty() {
            return None;
        }

        for rule in &self.rules {
            for keyword in &rule.keywords {
                if !keyword.is_empty() && desc.contains(keyword.as_str()) {
                    return Some((rule, keyword.as_str()));
                }
            }
        }
        None
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    pub fn into_rules(self) -> Vec<CategoryRule> {
        self.rules
    }
}

/// Built-in keyword rules used when no rules have been saved
pub fn default_rules() -> Vec<CategoryRule> {
    vec![
        CategoryRule::new("Rent", ["rent", "landlord", "property management", "lease"]),
        CategoryRule::new(
            "Groceries",
            [
                "grocery",
                "supermarket",
                "whole foods",
                "trader joe",
                "aldi",
                "lidl",
                "kroger",
                "safeway",
                "publix",
                "walmart grocery",
                "costco",
                "sprouts",
                "farmers market",
            ],
        ),
        CategoryRule::new(
            "Dining",
            [
                "starbucks",
                "coffee",
                "cafe",
                "restaurant",
                "diner",
                "bar",
                "grill",
                "pizza",
                "doordash",
                "uber eats",
                "grubhub",
                "chipotle",
                "panera",
                "subway",
                "mcdonald",
                "burger",
                "taco",
                "shake shack",
            ],
        ),
        CategoryRule::new(
            "Transport",
            [
                "uber", "lyft", "taxi", "transit", "metro", "train", "bus", "parking", "toll",
                "gas", "fuel", "exxon", "shell", "chevron",
            ],
        ),
        CategoryRule::new(
            "Utilities",
            [
                "electric",
                "power",
                "water",
                "sewer",
                "gas utility",
                "internet",
                "wifi",
                "verizon",
                "at&t",
                "t-mobile",
                "comcast",
                "xfinity",
                "spectrum",
                "utility",
            ],
        ),
        CategoryRule::new(
            "Investments",
            [
                "brokerage",
                "robinhood",
                "vanguard",
                "fidelity",
                "schwab",
                "etrade",
                "td ameritrade",
                "investment",
            ],
        ),
        CategoryRule::new(
            "Income",
            [
                "payroll",
                "salary",
                "paycheck",
                "direct deposit",
                "deposit",
                "bonus",
                "interest",
                "refund",
            ],
        ),
        CategoryRule::new(
            "Shopping",
            [
                "amazon", "target", "best buy", "walmart", "etsy", "shop", "store", "purchase",
                "order",
            ],
        ),
    ]
}

/// Set an override for an exact description.
///
/// The category is coerced into the set, so an override can never introduce
/// an out-of-set category.
pub fn add_override(
    overrides: &mut Overrides,
    categories: &CategorySet,
    description: &str,
    category: &str,
) -> String {
    let category = categories.resolve(category.trim());
    overrides.insert(description, category.clone());
    category
}

/// Remove the override for an exact description, returning its category
pub fn remove_override(overrides: &mut Overrides, description: &str) -> Option<String> {
    overrides.remove(description)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rules() -> KeywordRuleMatcher {
        KeywordRuleMatcher::new(vec![
            CategoryRule::new("Groceries", ["whole foods", "safeway", "grocery"]),
            CategoryRule::new("Dining", ["restaurant", "cafe", "pizza"]),
        ])
    }

    #[test]
    fn test_keyword_match() {
        let matcher = sample_rules();
        assert_eq!(matcher.match_category("WHOLE FOODS MARKET"), Some("Groceries"));
        assert_eq!(matcher.match_category("Pizza Hut"), Some("Dining"));
        assert_eq!(matcher.match_category("unknown store"), None);
    }

    #[test]
    fn test_keyword_match_case_insensitive() {
        let matcher = sample_rules();
        assert_eq!(
            matcher.match_category("WHOLE FOODS MARKET"),
            matcher.match_category("whole foods market")
        );
        assert_eq!(matcher.match_category("Whole Foods Market"), Some("Groceries"));
    }

    #[test]
    fn test_keyword_match_empty_description() {
        let matcher = sample_rules();
        assert_eq!(matcher.match_category(""), None);
        assert_eq!(matcher.match_category("   "), None);
    }

    #[test]
    fn test_rule_order_decides() {
        // "UBER EATS" hits Transport's "uber" only if Transport comes first
        let matcher = KeywordRuleMatcher::new(vec![
            CategoryRule::new("Transport", ["uber"]),
            CategoryRule::new("Dining", ["uber eats"]),
        ]);
        assert_eq!(matcher.match_category("UBER EATS ORDER"), Some("Transport"));

        let matcher = KeywordRuleMatcher::new(vec![
            CategoryRule::new("Dining", ["uber eats"]),
            CategoryRule::new("Transport", ["uber"]),
        ]);
        assert_eq!(matcher.match_category("UBER EATS ORDER"), Some("Dining"));
    }

    #[test]
    fn test_matching_rule_reports_keyword() {
        let matcher = sample_rules();
        let (rule, keyword) = matcher.matching_rule("SAFEWAY #1234").unwrap();
        assert_eq!(rule.category, "Groceries");
        assert_eq!(keyword, "safeway");
    }

    #[test]
    fn test_default_rules() {
        let matcher = KeywordRuleMatcher::with_defaults();
        assert_eq!(matcher.match_category("MONTHLY RENT PAYMENT"), Some("Rent"));
        assert_eq!(matcher.match_category("COMCAST CABLE"), Some("Utilities"));
        assert_eq!(matcher.match_category("ACME PAYROLL"), Some("Income"));
        assert_eq!(matcher.match_category("SHELL OIL 5744"), Some("Transport"));
        // All default categories are members of the default set
        let set = CategorySet::default();
        assert!(matcher.rules().iter().all(|r| set.contains(&r.category)));
    }

    #[test]
    fn test_add_and_remove_override() {
        let set = CategorySet::default();
        let mut overrides = Overrides::new();

        let stored = add_override(&mut overrides, &set, "STORE A", "Shopping");
        assert_eq!(stored, "Shopping");
        assert_eq!(overrides.get("STORE A"), Some("Shopping"));

        // Replaces an existing override
        add_override(&mut overrides, &set, "STORE A", "Groceries");
        assert_eq!(overrides.get("STORE A"), Some("Groceries"));

        assert_eq!(
            remove_override(&mut overrides, "STORE A"),
            Some("Groceries".to_string())
        );
        assert!(overrides.is_empty());
        assert_eq!(remove_override(&mut overrides, "STORE A"), None);
    }

    #[test]
    fn test_add_override_coerces_unknown_category() {
        let set = CategorySet::default();
        let mut overrides = Overrides::new();
        let stored = add_override(&mut overrides, &set, "GYM", "Fitness");
        assert_eq!(stored, "Misc");
        assert_eq!(overrides.get("GYM"), Some("Misc"));
    }
}
