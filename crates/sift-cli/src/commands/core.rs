//! Shared command utilities
//!
//! This module contains:
//! - `open_context` - Load configuration and open the data directory
//! - `read_raw_transactions` / `read_transactions` - JSON input loading

use std::fs;
use std::path::Path;

use anyhow::{Context as _, Result};
use sift_core::{ingest, Config, RawTransaction, Store, Transaction};
use tracing::debug;

/// Resolved configuration plus the data directory it points at
pub struct Context {
    pub config: Config,
    pub store: Store,
}

/// Load config (explicit path, default location, or embedded defaults) and open the store.
///
/// `--data-dir` wins over `[storage] data_dir`.
pub fn open_context(config_path: Option<&Path>, data_dir: Option<&Path>) -> Result<Context> {
    let config = Config::load(config_path).context("Failed to load config")?;
    let dir = data_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.data_dir());
    debug!(data_dir = %dir.display(), "Opening data directory");

    let store = Store::new(&dir).context("Failed to open data directory")?;
    Ok(Context { config, store })
}

/// Read a JSON array of raw extracted transactions
pub fn read_raw_transactions(path: &Path) -> Result<Vec<Transaction>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let raw: Vec<RawTransaction> = serde_json::from_str(&content)
        .with_context(|| format!("Invalid transaction JSON in {}", path.display()))?;
    Ok(ingest(raw))
}

/// Read a JSON array of transactions.
///
/// Rows carrying a `category` are previously categorized output; anything
/// else goes through ingest like a fresh statement.
pub fn read_transactions(path: &Path) -> Result<Vec<Transaction>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let rows: Vec<serde_json::Value> = serde_json::from_str(&content)
        .with_context(|| format!("Invalid transaction JSON in {}", path.display()))?;

    let categorized = !rows.is_empty() && rows.iter().all(|row| row.get("category").is_some());
    if categorized {
        let transactions: Vec<Transaction> = serde_json::from_value(serde_json::Value::Array(rows))
            .with_context(|| format!("Invalid transaction JSON in {}", path.display()))?;
        return Ok(transactions);
    }

    let raw: Vec<RawTransaction> = serde_json::from_value(serde_json::Value::Array(rows))
        .with_context(|| format!("Invalid transaction JSON in {}", path.display()))?;
    Ok(ingest(raw))
}
