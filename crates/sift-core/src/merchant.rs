//! Merchant name normalization
//!
//! Maps noisy bank descriptions like "UBER *TRIP ABC123" to a canonical merchant
//! name ("Uber") for grouping and display.
//!
//! Resolution order:
//! 1. User merchant mappings (exact, case-sensitive match on the raw text)
//! 2. Built-in vendor signatures, tested in list order (first match wins)
//! 3. Cleaned original: trailing reference codes stripped, title-cased

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::models::MerchantMappings;

/// Vendor family a built-in signature belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MerchantKind {
    Rideshare,
    FoodDelivery,
    Marketplace,
    Subscription,
    PaymentProcessor,
    Grocery,
    BigBox,
    Restaurant,
    Fuel,
    Brokerage,
}

impl MerchantKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rideshare => "rideshare",
            Self::FoodDelivery => "food_delivery",
            Self::Marketplace => "marketplace",
            Self::Subscription => "subscription",
            Self::PaymentProcessor => "payment_processor",
            Self::Grocery => "grocery",
            Self::BigBox => "big_box",
            Self::Restaurant => "restaurant",
            Self::Fuel => "fuel",
            Self::Brokerage => "brokerage",
        }
    }
}

/// A vendor signature: a start-anchored, case-insensitive regex and the name it maps to
#[derive(Debug, Clone)]
pub struct MerchantPattern {
    pub kind: MerchantKind,
    pub regex: Regex,
    pub canonical: &'static str,
}

impl MerchantPattern {
    /// Compile a signature. The pattern is anchored at the start of the description.
    pub fn new(
        kind: MerchantKind,
        pattern: &str,
        canonical: &'static str,
    ) -> crate::Result<Self> {
        let regex = Regex::new(&format!("(?i)^(?:{})", pattern))?;
        Ok(Self {
            kind,
            regex,
            canonical,
        })
    }

    pub fn matches(&self, description: &str) -> bool {
        self.regex.is_match(description)
    }
}

/// Built-in signatures in priority order.
///
/// Order is load-bearing: "UBER *" must precede "UBER EATS", "SPOTIFY USA" precedes
/// the bare "SPOTIFY", and merchant signatures precede the payment-processor
/// prefixes (PAYPAL *, SQ *, TST *) that wrap them.
const BUILTIN_SIGNATURES: &[(MerchantKind, &str, &str)] = &[
    (MerchantKind::Rideshare, r"UBER\s*\*", "Uber"),
    (MerchantKind::FoodDelivery, r"UBER\s+EATS", "Uber Eats"),
    (MerchantKind::Rideshare, r"LYFT\s*\*", "Lyft"),
    (MerchantKind::Marketplace, r"AMZN\s+MKTP", "Amazon"),
    (MerchantKind::Marketplace, r"AMAZON\.COM", "Amazon"),
    (MerchantKind::Marketplace, r"AMZ\s*\*", "Amazon"),
    (MerchantKind::FoodDelivery, r"DOORDASH\s*\*", "DoorDash"),
    (MerchantKind::FoodDelivery, r"GRUBHUB\s*\*", "Grubhub"),
    (MerchantKind::Subscription, r"NETFLIX\.COM", "Netflix"),
    (MerchantKind::Subscription, r"SPOTIFY\s+USA", "Spotify"),
    (MerchantKind::Subscription, r"SPOTIFY", "Spotify"),
    (MerchantKind::Subscription, r"APPLE\.COM/BILL", "Apple"),
    (MerchantKind::PaymentProcessor, r"PAYPAL\s*\*", "PayPal"),
    (MerchantKind::PaymentProcessor, r"SQ\s*\*", "Square"),
    (MerchantKind::PaymentProcessor, r"TST\s*\*", "Toast"),
    (MerchantKind::Subscription, r"GOOGLE\s*\*", "Google"),
    (MerchantKind::Grocery, r"WHOLEFDS", "Whole Foods"),
    (MerchantKind::BigBox, r"WM\s+SUPERCENTER", "Walmart"),
    (MerchantKind::BigBox, r"TARGET\s+T?-?\d+", "Target"),
    (MerchantKind::BigBox, r"COSTCO\s+WHSE", "Costco"),
    (MerchantKind::Restaurant, r"STARBUCKS", "Starbucks"),
    (MerchantKind::Restaurant, r"DUNKIN\s*#\d+", "Dunkin"),
    (MerchantKind::Restaurant, r"MCDONALDS", "McDonalds"),
    (MerchantKind::Fuel, r"CHEVRON\s+\d+", "Chevron"),
    (MerchantKind::Fuel, r"SHELL\s+OIL", "Shell"),
    (MerchantKind::Brokerage, r"VANGUARD", "Vanguard"),
    (MerchantKind::Brokerage, r"FIDELITY", "Fidelity"),
];

static BUILTIN_PATTERNS: LazyLock<Vec<MerchantPattern>> = LazyLock::new(|| {
    BUILTIN_SIGNATURES
        .iter()
        .map(|(kind, pattern, canonical)| {
            MerchantPattern::new(*kind, pattern, canonical).expect("valid regex")
        })
        .collect()
});

// Trailing artifacts, stripped in this order
static TRAILING_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+[A-Z0-9]{6,}$").expect("valid regex"));
static TRAILING_STORE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+#\d+$").expect("valid regex"));
static TRAILING_NUMERIC_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+\d{10,}$").expect("valid regex"));

/// Built-in vendor signatures in evaluation order
pub fn builtin_patterns() -> &'static [MerchantPattern] {
    &BUILTIN_PATTERNS
}

/// Merchant normalizer with user mappings layered over the built-in cascade
#[derive(Debug, Clone)]
pub struct MerchantNormalizer {
    mappings: MerchantMappings,
    patterns: Vec<MerchantPattern>,
}

impl Default for MerchantNormalizer {
    fn default() -> Self {
        Self::new(MerchantMappings::new())
    }
}

impl MerchantNormalizer {
    pub fn new(mappings: MerchantMappings) -> Self {
        Self {
            mappings,
            patterns: builtin_patterns().to_vec(),
        }
    }

    /// Use a custom signature list instead of the built-ins
    pub fn with_patterns(mappings: MerchantMappings, patterns: Vec<MerchantPattern>) -> Self {
        Self { mappings, patterns }
    }

    /// Normalize a raw description to a canonical merchant name
    pub fn normalize(&self, description: &str) -> String {
        if description.trim().is_empty() {
            return String::new();
        }

        if let Some(canonical) = self.mappings.get(description) {
            debug!("Merchant mapping matched for '{}': {}", description, canonical);
            return canonical.to_string();
        }

        if let Some(pattern) = self.matching_pattern(description) {
            return pattern.canonical.to_string();
        }

        clean_description(description)
    }

    /// First built-in signature matching the description, if any
    pub fn matching_pattern(&self, description: &str) -> Option<&MerchantPattern> {
        self.patterns.iter().find(|p| p.matches(description))
    }

    pub fn mappings(&self) -> &MerchantMappings {
        &self.mappings
    }

    /// Add or replace a user mapping
    pub fn add_mapping(&mut self, raw: impl Into<String>, canonical: impl Into<String>) {
        self.mappings.insert(raw, canonical);
    }

    /// Remove a user mapping, returning the previous canonical name
    pub fn remove_mapping(&mut self, raw: &str) -> Option<String> {
        self.mappings.remove(raw)
    }

    /// Consume the normalizer, handing the mappings back for persistence
    pub fn into_mappings(self) -> MerchantMappings {
        self.mappings
    }
}

/// Normalize with built-in signatures only (no user mappings)
pub fn normalize_merchant(description: &str) -> String {
    if description.trim().is_empty() {
        return String::new();
    }
    match builtin_patterns().iter().find(|p| p.matches(description)) {
        Some(pattern) => pattern.canonical.to_string(),
        None => clean_description(description),
    }
}

/// Strip trailing transaction artifacts and title-case the remainder
fn clean_description(description: &str) -> String {
    let cleaned = description.trim();
    let cleaned = TRAILING_REFERENCE.replace(cleaned, "");
    let cleaned = TRAILING_STORE_NUMBER.replace(&cleaned, "");
    let cleaned = TRAILING_NUMERIC_CODE.replace(&cleaned, "");
    title_case(&cleaned).trim().to_string()
}

/// Uppercase the first letter of every alphabetic run, lowercase the rest
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_alpha = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_known_signatures() {
        assert_eq!(normalize_merchant("UBER *TRIP 12345"), "Uber");
        assert_eq!(normalize_merchant("AMZN MKTP US*AB123"), "Amazon");
        assert_eq!(normalize_merchant("NETFLIX.COM"), "Netflix");
        assert_eq!(normalize_merchant("SPOTIFY USA"), "Spotify");
        assert_eq!(normalize_merchant("WHOLEFDS MKT 10234"), "Whole Foods");
        assert_eq!(normalize_merchant("TARGET T-1234 AUSTIN TX"), "Target");
        assert_eq!(normalize_merchant("TARGET 00012345"), "Target");
        assert_eq!(normalize_merchant("DUNKIN #345678"), "Dunkin");
        assert_eq!(normalize_merchant("CHEVRON 0203456"), "Chevron");
    }

    #[test]
    fn test_normalize_is_case_insensitive() {
        assert_eq!(normalize_merchant("uber *trip"), "Uber");
        assert_eq!(normalize_merchant("Starbucks Store 123"), "Starbucks");
    }

    #[test]
    fn test_signature_priority() {
        // UBER EATS has no '*', so only the delivery signature matches
        assert_eq!(normalize_merchant("UBER EATS ORDER"), "Uber Eats");
        // Processor prefix wins only when no merchant signature precedes it
        assert_eq!(normalize_merchant("SQ *BLUE BOTTLE"), "Square");
        assert_eq!(normalize_merchant("TST* JOES PIZZA"), "Toast");
    }

    #[test]
    fn test_signatures_are_start_anchored() {
        // "UBER" appears but not at the start
        assert_ne!(normalize_merchant("PAYMENT TO UBER *TRIP"), "Uber");
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize_merchant(""), "");
        assert_eq!(normalize_merchant("   "), "");
        assert_eq!(MerchantNormalizer::default().normalize(""), "");
    }

    #[test]
    fn test_clean_strips_trailing_codes() {
        assert_eq!(normalize_merchant("LOCAL BAKERY XK92JD7"), "Local Bakery");
        assert_eq!(normalize_merchant("CORNER DELI #1234"), "Corner Deli");
        assert_eq!(
            normalize_merchant("CITY WATER DEPT 12345678901"),
            "City Water Dept"
        );
        assert_eq!(normalize_merchant("  joe's   cafe  "), "Joe'S   Cafe");
    }

    #[test]
    fn test_clean_keeps_short_codes() {
        assert_eq!(normalize_merchant("CAFE 123"), "Cafe 123");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("HELLO WORLD"), "Hello World");
        assert_eq!(title_case("7eleven store"), "7Eleven Store");
    }

    #[test]
    fn test_user_mapping_takes_priority() {
        let mut normalizer = MerchantNormalizer::default();
        normalizer.add_mapping("UBER *TRIP 12345", "Work Travel");
        assert_eq!(normalizer.normalize("UBER *TRIP 12345"), "Work Travel");
        // Mapping is exact and case-sensitive
        assert_eq!(normalizer.normalize("uber *trip 12345"), "Uber");
    }

    #[test]
    fn test_remove_mapping() {
        let mut normalizer = MerchantNormalizer::default();
        normalizer.add_mapping("MY GYM LLC", "Gym");
        assert_eq!(normalizer.remove_mapping("MY GYM LLC"), Some("Gym".to_string()));
        assert_eq!(normalizer.remove_mapping("MY GYM LLC"), None);
        assert_eq!(normalizer.normalize("MY GYM LLC"), "My Gym Llc");
        assert!(normalizer.into_mappings().is_empty());
    }

    #[test]
    fn test_matching_pattern_kind() {
        let normalizer = MerchantNormalizer::default();
        let pattern = normalizer.matching_pattern("SHELL OIL 5744").unwrap();
        assert_eq!(pattern.kind, MerchantKind::Fuel);
        assert!(normalizer.matching_pattern("RANDOM SHOP").is_none());
    }

    #[test]
    fn test_custom_patterns() {
        let patterns =
            vec![MerchantPattern::new(MerchantKind::Grocery, r"HEB\s", "H-E-B").unwrap()];
        let normalizer = MerchantNormalizer::with_patterns(MerchantMappings::new(), patterns);
        assert_eq!(normalizer.normalize("HEB #123 AUSTIN"), "H-E-B");
        // Built-ins are not consulted
        assert_eq!(normalizer.normalize("NETFLIX.COM"), "Netflix.Com");
    }
}
