//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Sift - Categorize transactions and find recurring payments
#[derive(Parser)]
#[command(name = "sift")]
#[command(about = "Transaction categorization and recurring payment detection", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to ~/.config/sift/sift.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Data directory for rules, overrides, mappings and the embedding cache
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Normalize raw merchant descriptions
    Normalize {
        /// Descriptions to normalize
        #[arg(required = true)]
        descriptions: Vec<String>,
    },

    /// Categorize transactions from a JSON file
    ///
    /// Input is a JSON array of {date, description, amount, type, balance}.
    /// Categorized transactions are printed as JSON.
    Categorize {
        /// JSON file of raw transactions
        #[arg(short, long)]
        input: PathBuf,

        /// JSON file of previously categorized transactions (similarity candidates)
        #[arg(long)]
        history: Option<PathBuf>,

        /// Write categorized JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip the embedding similarity tier
        #[arg(long)]
        no_embeddings: bool,
    },

    /// Detect recurring payments in a JSON file of transactions
    Recurring {
        /// JSON file of raw or categorized transactions
        #[arg(short, long)]
        input: PathBuf,

        /// Only show payments expected within this many days
        #[arg(long)]
        upcoming: Option<i64>,

        /// Reference date for --upcoming (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        today: Option<String>,
    },

    /// Manage exact-description category overrides
    Override {
        #[command(subcommand)]
        action: Option<OverrideAction>,
    },

    /// Manage merchant name mappings
    Mapping {
        #[command(subcommand)]
        action: Option<MappingAction>,
    },

    /// Manage keyword rules
    Rules {
        #[command(subcommand)]
        action: Option<RulesAction>,
    },

    /// Manage the embedding cache
    Cache {
        #[command(subcommand)]
        action: Option<CacheAction>,
    },
}

#[derive(Subcommand)]
pub enum OverrideAction {
    /// List overrides
    List,

    /// Pin a description to a category
    Add {
        /// Exact transaction description
        description: String,

        /// Category (out-of-set names become Misc)
        category: String,
    },

    /// Remove an override
    Remove {
        /// Exact transaction description
        description: String,
    },
}

#[derive(Subcommand)]
pub enum MappingAction {
    /// List merchant mappings
    List,

    /// Map a raw description to a canonical merchant name
    Add {
        /// Exact raw description
        raw: String,

        /// Canonical merchant name
        canonical: String,
    },

    /// Remove a merchant mapping
    Remove {
        /// Exact raw description
        raw: String,
    },
}

#[derive(Subcommand)]
pub enum RulesAction {
    /// List keyword rules in priority order
    List,

    /// Replace saved rules with the built-in defaults
    Reset,
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// Show embedding cache size and location
    Stats,

    /// Delete all cached embeddings
    Clear,
}
