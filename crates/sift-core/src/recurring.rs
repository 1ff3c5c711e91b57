//! Recurring payment detection
//!
//! Groups history by a coarse key (first three words of the description plus
//! the amount rounded to the nearest 10), then keeps groups whose day gaps are
//! regular enough to forecast the next occurrence.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use tracing::debug;

use crate::config::RecurringConfig;
use crate::models::{RecurringPattern, Transaction, UpcomingExpense};

/// Number of leading description words in the grouping key
const KEY_WORDS: usize = 3;

/// Amount bucket width for the grouping key
const AMOUNT_BUCKET: f64 = 10.0;

/// Grouping key for a transaction: (first words, rounded amount)
fn group_key(description: &str, amount: f64) -> (String, i64) {
    let lower = description.trim().to_lowercase();
    let words = lower
        .split_whitespace()
        .take(KEY_WORDS)
        .collect::<Vec<_>>()
        .join(" ");
    let bucket = ((amount / AMOUNT_BUCKET).round_ties_even() * AMOUNT_BUCKET) as i64;
    (words, bucket)
}

/// Interval-regularity detector
#[derive(Debug, Clone, Default)]
pub struct RecurringPatternDetector {
    config: RecurringConfig,
}

impl RecurringPatternDetector {
    pub fn new(config: RecurringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RecurringConfig {
        &self.config
    }

    /// Detect recurring patterns, sorted by next expected date
    pub fn detect(&self, transactions: &[Transaction]) -> Vec<RecurringPattern> {
        let mut groups: BTreeMap<(String, i64), Vec<(NaiveDate, &Transaction)>> = BTreeMap::new();
        for tx in transactions {
            // Undated rows cannot contribute intervals
            let Some(date) = tx.date else { continue };
            groups
                .entry(group_key(&tx.description, tx.amount))
                .or_default()
                .push((date, tx));
        }

        let min_occurrences = self.config.min_occurrences.max(2);
        let mut patterns: Vec<RecurringPattern> = groups
            .into_iter()
            .filter(|(_, occurrences)| occurrences.len() >= min_occurrences)
            .filter_map(|(key, mut occurrences)| {
                occurrences.sort_by_key(|(date, _)| *date);
                self.analyze(&key, &occurrences)
            })
            .collect();

        patterns.sort_by(|a, b| {
            a.next_expected
                .cmp(&b.next_expected)
                .then_with(|| a.description.cmp(&b.description))
                .then_with(|| a.key.cmp(&b.key))
        });
        patterns
    }

    /// Test one date-sorted group; `None` when it is not regular
    fn analyze(
        &self,
        key: &(String, i64),
        occurrences: &[(NaiveDate, &Transaction)],
    ) -> Option<RecurringPattern> {
        let gaps: Vec<f64> = occurrences
            .windows(2)
            .map(|pair| (pair[1].0 - pair[0].0).num_days() as f64)
            .collect();
        if gaps.is_empty() {
            return None;
        }

        let mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
        // Same-day repeats have no cadence, whatever the configured floor
        if mean <= 0.0 {
            debug!(key = %key.0, mean, "Zero interval");
            return None;
        }
        if mean < self.config.min_interval_days || mean > self.config.max_interval_days {
            debug!(key = %key.0, mean, "Interval out of range");
            return None;
        }

        let confidence = if gaps.len() > 1 {
            let variance = gaps.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / gaps.len() as f64;
            let consistency = (1.0 - variance.sqrt() / mean).clamp(0.0, 1.0);
            if !consistency.is_finite() || consistency < self.config.min_consistency {
                debug!(key = %key.0, consistency, "Intervals too irregular");
                return None;
            }
            consistency
        } else {
            self.config.single_interval_confidence.clamp(0.0, 1.0)
        };

        let (last_date, last) = *occurrences.last()?;
        let next_expected = last_date.checked_add_signed(Duration::days(mean.round() as i64))?;

        Some(RecurringPattern {
            key: format!("{}|{}", key.0, key.1),
            description: last.description.clone(),
            amount: last.amount,
            category: last.category.clone(),
            frequency_days: mean.trunc() as i64,
            mean_interval_days: mean,
            last_date,
            next_expected,
            occurrences: occurrences.len(),
            confidence,
        })
    }
}

/// Detect recurring patterns with default thresholds
pub fn detect_recurring(transactions: &[Transaction]) -> Vec<RecurringPattern> {
    RecurringPatternDetector::default().detect(transactions)
}

/// Patterns expected on or before `today + days_ahead`, in input order
pub fn upcoming_recurring(
    patterns: &[RecurringPattern],
    today: NaiveDate,
    days_ahead: i64,
) -> Vec<UpcomingExpense> {
    let cutoff = today
        .checked_add_signed(Duration::days(days_ahead))
        .unwrap_or(NaiveDate::MAX);

    patterns
        .iter()
        .filter(|p| p.next_expected <= cutoff)
        .map(|p| UpcomingExpense {
            description: p.description.clone(),
            amount: p.amount,
            category: p.category.clone(),
            expected_date: p.next_expected,
            days_until: (p.next_expected - today).num_days(),
            frequency_days: p.frequency_days,
            confidence: p.confidence,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn tx(date: NaiveDate, description: &str, amount: f64) -> Transaction {
        Transaction::new(Some(date), description, amount)
    }

    #[test]
    fn test_monthly_subscription() {
        let history = vec![
            tx(d(2025, 1, 15), "Netflix Subscription", 15.99).with_category("Utilities"),
            tx(d(2025, 2, 15), "Netflix Subscription", 15.99).with_category("Utilities"),
            tx(d(2025, 3, 15), "Netflix Subscription", 15.99).with_category("Utilities"),
        ];
        let patterns = detect_recurring(&history);

        assert_eq!(patterns.len(), 1);
        let p = &patterns[0];
        assert!((p.frequency_days - 30).abs() <= 2);
        assert_eq!(p.occurrences, 3);
        assert_eq!(p.last_date, d(2025, 3, 15));
        assert_eq!(p.category, "Utilities");
        // gaps 31 and 28: mean 29.5 rounds to 30
        assert_eq!(p.next_expected, d(2025, 4, 14));
        assert!(p.confidence >= 0.7 && p.confidence <= 1.0);
    }

    #[test]
    fn test_weekly_pattern() {
        let start = d(2025, 1, 1);
        let history: Vec<_> = (0..4)
            .map(|i| tx(start + Duration::days(7 * i), "Weekly Groceries", 50.0))
            .collect();
        let patterns = detect_recurring(&history);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].frequency_days, 7);
        assert!((patterns[0].confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_irregular_intervals_rejected() {
        let history = vec![
            tx(d(2025, 1, 1), "Irregular Payment", 100.0),
            tx(d(2025, 1, 8), "Irregular Payment", 100.0),
            tx(d(2025, 2, 1), "Irregular Payment", 100.0),
        ];
        assert!(detect_recurring(&history).is_empty());
    }

    #[test]
    fn test_long_intervals_rejected() {
        let history = vec![
            tx(d(2025, 1, 1), "Quarterly Payment", 500.0),
            tx(d(2025, 4, 15), "Quarterly Payment", 500.0),
            tx(d(2025, 8, 1), "Quarterly Payment", 500.0),
        ];
        assert!(detect_recurring(&history).is_empty());
    }

    #[test]
    fn test_short_intervals_rejected() {
        let history = vec![
            tx(d(2025, 1, 1), "Daily Coffee", 5.0),
            tx(d(2025, 1, 2), "Daily Coffee", 5.0),
            tx(d(2025, 1, 3), "Daily Coffee", 5.0),
        ];
        assert!(detect_recurring(&history).is_empty());
    }

    #[test]
    fn test_single_occurrence() {
        let history = vec![tx(d(2025, 1, 15), "One-time purchase", 100.0)];
        assert!(detect_recurring(&history).is_empty());
    }

    #[test]
    fn test_empty_history() {
        assert!(detect_recurring(&[]).is_empty());
    }

    #[test]
    fn test_two_occurrences_use_single_interval_confidence() {
        let history = vec![
            tx(d(2025, 1, 15), "Monthly Bill", 100.0),
            tx(d(2025, 2, 15), "Monthly Bill", 100.0),
        ];
        let patterns = detect_recurring(&history);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].confidence, 0.8);
        assert_eq!(patterns[0].next_expected, d(2025, 3, 18));
    }

    #[test]
    fn test_undated_rows_dropped() {
        let history = vec![
            tx(d(2025, 1, 15), "Test", 100.0),
            Transaction::new(None, "Test", 100.0),
            tx(d(2025, 2, 15), "Test", 100.0),
        ];
        let patterns = detect_recurring(&history);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].occurrences, 2);
    }

    #[test]
    fn test_grouping_uses_first_three_words_and_amount_bucket() {
        let history = vec![
            tx(d(2025, 1, 1), "SPOTIFY USA PREMIUM 1234", 10.99),
            tx(d(2025, 2, 1), "spotify usa premium 9876", 9.99),
            tx(d(2025, 3, 1), "Spotify USA Premium", 11.49),
        ];
        let patterns = detect_recurring(&history);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].key, "spotify usa premium|10");
        // Representative fields come from the most recent occurrence
        assert_eq!(patterns[0].description, "Spotify USA Premium");
        assert_eq!(patterns[0].amount, 11.49);
    }

    #[test]
    fn test_different_amount_buckets_split_groups() {
        let history = vec![
            tx(d(2025, 1, 1), "Gym Membership", 30.0),
            tx(d(2025, 2, 1), "Gym Membership", 30.0),
            tx(d(2025, 1, 5), "Gym Membership", 80.0),
        ];
        let patterns = detect_recurring(&history);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].occurrences, 2);
    }

    #[test]
    fn test_unsorted_input_and_sorted_output() {
        let history = vec![
            tx(d(2025, 3, 1), "Rent Payment", -1500.0),
            tx(d(2025, 2, 10), "Gym", -40.0),
            tx(d(2025, 1, 1), "Rent Payment", -1500.0),
            tx(d(2025, 1, 10), "Gym", -40.0),
            tx(d(2025, 2, 1), "Rent Payment", -1500.0),
        ];
        let patterns = detect_recurring(&history);
        assert_eq!(patterns.len(), 2);
        assert!(patterns[0].next_expected <= patterns[1].next_expected);
        assert_eq!(patterns[0].description, "Gym");
        assert_eq!(patterns[1].occurrences, 3);
        // Sign is kept as-is
        assert_eq!(patterns[1].amount, -1500.0);
    }

    #[test]
    fn test_custom_thresholds() {
        let history = vec![
            tx(d(2025, 1, 1), "Daily Coffee", 5.0),
            tx(d(2025, 1, 2), "Daily Coffee", 5.0),
            tx(d(2025, 1, 3), "Daily Coffee", 5.0),
        ];
        let detector = RecurringPatternDetector::new(RecurringConfig {
            min_interval_days: 1.0,
            ..RecurringConfig::default()
        });
        assert_eq!(detector.detect(&history).len(), 1);

        let strict = RecurringPatternDetector::new(RecurringConfig {
            min_occurrences: 4,
            min_interval_days: 1.0,
            ..RecurringConfig::default()
        });
        assert!(strict.detect(&history).is_empty());
    }

    #[test]
    fn test_same_day_repeats_rejected_with_zero_floor() {
        let history = vec![
            tx(d(2025, 1, 1), "Same Day", -20.0),
            tx(d(2025, 1, 1), "Same Day", -20.0),
            tx(d(2025, 1, 1), "Same Day", -20.0),
        ];
        let detector = RecurringPatternDetector::new(RecurringConfig {
            min_interval_days: 0.0,
            ..RecurringConfig::default()
        });
        assert!(detector.detect(&history).is_empty());
        assert!(detector.detect(&history[..2]).is_empty());
    }

    #[test]
    fn test_confidence_stays_in_unit_range() {
        let history = vec![
            tx(d(2025, 1, 1), "Gym Visit", -10.0),
            tx(d(2025, 1, 1), "Gym Visit", -10.0),
            tx(d(2025, 1, 11), "Gym Visit", -10.0),
        ];
        let detector = RecurringPatternDetector::new(RecurringConfig {
            min_interval_days: 0.0,
            min_consistency: 0.0,
            ..RecurringConfig::default()
        });

        let patterns = detector.detect(&history);
        assert_eq!(patterns.len(), 1);
        assert!((0.0..=1.0).contains(&patterns[0].confidence));
        assert_eq!(patterns[0].confidence, 0.0);
    }

    #[test]
    fn test_upcoming() {
        let history = vec![
            tx(d(2025, 1, 1), "Rent Payment", -1500.0),
            tx(d(2025, 1, 31), "Rent Payment", -1500.0),
            tx(d(2025, 3, 2), "Rent Payment", -1500.0),
            tx(d(2025, 1, 1), "Quarterly Fee", -300.0),
            tx(d(2025, 2, 15), "Quarterly Fee", -300.0),
        ];
        let patterns = detect_recurring(&history);
        assert_eq!(patterns.len(), 2);

        let today = d(2025, 3, 15);
        let upcoming = upcoming_recurring(&patterns, today, 30);
        assert_eq!(upcoming.len(), 2);
        // Both are expected on 2025-04-01
        assert!(upcoming.iter().all(|u| u.days_until == 17));

        let soon = upcoming_recurring(&patterns, today, 10);
        assert!(soon.is_empty());
    }

    #[test]
    fn test_upcoming_overdue_has_negative_days() {
        let history = vec![
            tx(d(2025, 1, 1), "Insurance", -90.0),
            tx(d(2025, 2, 1), "Insurance", -90.0),
        ];
        let patterns = detect_recurring(&history);
        let upcoming = upcoming_recurring(&patterns, d(2025, 3, 10), 0);
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].expected_date, d(2025, 3, 4));
        assert_eq!(upcoming[0].days_until, -6);
    }
}
