//! Heuristic fallback classifier
//!
//! Last tier of the categorization cascade. Scores evidence words per category
//! and picks the strictly highest score; ties and all-zero scores resolve to
//! `Misc`. It never fails, so every transaction ends up with a category.
//!
//! The word lists are policy, not business logic: swap in a different
//! `EvidencePolicy` to change them.

use std::collections::HashMap;

use crate::models::{CategorySet, MISC};

/// Points added per evidence word found in a description
pub const EVIDENCE_WEIGHT: u32 = 2;

/// Points added when a strong income/investment signal is present
pub const STRONG_SIGNAL_WEIGHT: u32 = 3;

/// Evidence-word table driving the fallback scores
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidencePolicy {
    /// (category, words); each word found adds `evidence_weight`
    pub evidence: Vec<(String, Vec<String>)>,
    /// (category, words); any word found adds `strong_weight` once
    pub strong_signals: Vec<(String, Vec<String>)>,
    pub evidence_weight: u32,
    pub strong_weight: u32,
}

fn owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl Default for EvidencePolicy {
    fn default() -> Self {
        Self {
            evidence: vec![
                ("Rent".into(), owned(&["apartment", "housing", "unit", "lease"])),
                (
                    "Groceries".into(),
                    owned(&["market", "foods", "produce", "butcher", "bakery"]),
                ),
                (
                    "Dining".into(),
                    owned(&["cuisine", "takeout", "lunch", "dinner", "breakfast"]),
                ),
                (
                    "Transport".into(),
                    owned(&["ride", "trip", "station", "fare", "vehicle"]),
                ),
                (
                    "Utilities".into(),
                    owned(&["bill", "statement", "autopay", "monthly", "service"]),
                ),
                (
                    "Investments".into(),
                    owned(&["broker", "securities", "shares", "fund", "ira", "401k"]),
                ),
                (
                    "Income".into(),
                    owned(&["pay", "employer", "wages", "payout", "income"]),
                ),
                (
                    "Shopping".into(),
                    owned(&["online", "retail", "cart", "shipping", "merch"]),
                ),
            ],
            strong_signals: vec![
                (
                    "Income".into(),
                    owned(&["payroll", "salary", "wages", "direct deposit"]),
                ),
                (
                    "Investments".into(),
                    owned(&["dividend", "contribution", "brokerage", "vanguard", "fidelity"]),
                ),
            ],
            evidence_weight: EVIDENCE_WEIGHT,
            strong_weight: STRONG_SIGNAL_WEIGHT,
        }
    }
}

/// Deterministic evidence scorer; the guaranteed terminal tier
#[derive(Debug, Clone, Default)]
pub struct HeuristicFallbackClassifier {
    policy: EvidencePolicy,
}

impl HeuristicFallbackClassifier {
    pub fn new(policy: EvidencePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &EvidencePolicy {
        &self.policy
    }

    /// Score every category in the set for a description
    ///
    /// Categories outside the set are ignored, so stale policy entries cannot
    /// leak an out-of-set category.
    pub fn scores(&self, description: &str, categories: &CategorySet) -> HashMap<String, u32> {
        let desc = description.trim().to_lowercase();
        let mut scores: HashMap<String, u32> = categories
            .names()
            .iter()
            .map(|c| (c.clone(), 0))
            .collect();
        if desc.is_empty() {
            return scores;
        }

        for (category, words) in &self.policy.evidence {
            if let Some(score) = scores.get_mut(category) {
                let hits = words.iter().filter(|w| desc.contains(w.as_str())).count() as u32;
                *score += hits * self.policy.evidence_weight;
            }
        }

        for (category, words) in &self.policy.strong_signals {
            if let Some(score) = scores.get_mut(category) {
                if words.iter().any(|w| desc.contains(w.as_str())) {
                    *score += self.policy.strong_weight;
                }
            }
        }

        scores
    }

    /// Category with the strictly highest score; ties and zero resolve to `Misc`
    pub fn classify(&self, description: &str, categories: &CategorySet) -> String {
        let scores = self.scores(description, categories);

        let mut best: Option<(&str, u32)> = None;
        let mut tied = false;
        // Walk in set order so the result does not depend on HashMap iteration
        for name in categories.names() {
            let score = scores.get(name).copied().unwrap_or(0);
            match best {
                Some((_, top)) if score > top => {
                    best = Some((name, score));
                    tied = false;
                }
                Some((_, top)) if score == top => tied = true,
                None => best = Some((name, score)),
                _ => {}
            }
        }

        match best {
            Some((name, score)) if score > 0 && !tied => name.to_string(),
            _ => MISC.to_string(),
        }
    }
}
