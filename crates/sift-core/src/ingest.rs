//! Conversion of extracted transaction candidates into typed transactions

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::models::{Direction, RawTransaction, Transaction};

/// Accepted date formats, tried in order
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%Y/%m/%d",
    "%d-%m-%Y",
    "%d %b %Y",
    "%b %d, %Y",
];

/// Longest type string that is still treated as a type rather than stray text
const MAX_TYPE_LEN: usize = 50;

/// Parse a date using the first format that accepts it
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

/// Infer Debit/Credit from a type string, falling back to the amount sign
pub fn infer_direction(kind: Option<&str>, amount: Option<f64>) -> Direction {
    if let Some(kind) = kind.map(str::trim).filter(|k| !k.is_empty()) {
        let lower = kind.to_lowercase();
        if lower.contains("debit") || lower.contains("withdrawal") {
            return Direction::Debit;
        }
        if lower.contains("credit") || lower.contains("deposit") {
            return Direction::Credit;
        }
        if kind.contains('/') || kind.chars().count() > MAX_TYPE_LEN {
            warn!(kind = %kind, "Type field looks malformed, defaulting to Debit");
            return Direction::Debit;
        }
        debug!(kind = %kind, "Unknown transaction type, inferring from amount");
    }

    match amount {
        Some(a) if a > 0.0 => Direction::Credit,
        _ => Direction::Debit,
    }
}

impl RawTransaction {
    /// Build a typed, uncategorized transaction.
    ///
    /// Unparseable dates become `None`, a missing amount becomes `0.0`, and the
    /// category starts as `Misc`.
    pub fn into_transaction(self) -> Transaction {
        let date = parse_date(&self.date);
        if date.is_none() && !self.date.trim().is_empty() {
            debug!(date = %self.date, "Unparseable transaction date");
        }
        let direction = infer_direction(self.kind.as_deref(), self.amount);

        let mut tx = Transaction::new(date, self.description.trim(), self.amount.unwrap_or(0.0));
        tx.direction = direction;
        tx.balance = self.balance;
        tx.source = self.source;
        tx
    }
}

/// Convert a batch of candidates, preserving order
pub fn ingest(raw: Vec<RawTransaction>) -> Vec<Transaction> {
    raw.into_iter().map(RawTransaction::into_transaction).collect()
}
