//! Sift CLI - Transaction categorization
//!
//! Usage:
//!   sift normalize "UBER *TRIP 12345"       Normalize merchant names
//!   sift categorize --input tx.json          Categorize transactions
//!   sift recurring --input tx.json           Detect recurring payments
//!   sift override add "LANDLORD LLC" Rent    Pin a description to a category

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    // Logs go to stderr so JSON output on stdout stays clean
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();

    let ctx = commands::open_context(cli.config.as_deref(), cli.data_dir.as_deref())?;

    match cli.command {
        Commands::Normalize { descriptions } => commands::cmd_normalize(&ctx, &descriptions),
        Commands::Categorize {
            input,
            history,
            output,
            no_embeddings,
        } => commands::cmd_categorize(
            &ctx,
            &input,
            history.as_deref(),
            output.as_deref(),
            no_embeddings,
        ),
        Commands::Recurring {
            input,
            upcoming,
            today,
        } => commands::cmd_recurring(&ctx, &input, upcoming, today.as_deref()),
        Commands::Override { action } => match action {
            None | Some(OverrideAction::List) => commands::cmd_override_list(&ctx),
            Some(OverrideAction::Add {
                description,
                category,
            }) => commands::cmd_override_add(&ctx, &description, &category),
            Some(OverrideAction::Remove { description }) => {
                commands::cmd_override_remove(&ctx, &description)
            }
        },
        Commands::Mapping { action } => match action {
            None | Some(MappingAction::List) => commands::cmd_mapping_list(&ctx),
            Some(MappingAction::Add { raw, canonical }) => {
                commands::cmd_mapping_add(&ctx, &raw, &canonical)
            }
            Some(MappingAction::Remove { raw }) => commands::cmd_mapping_remove(&ctx, &raw),
        },
        Commands::Rules { action } => match action {
            None | Some(RulesAction::List) => commands::cmd_rules_list(&ctx),
            Some(RulesAction::Reset) => commands::cmd_rules_reset(&ctx),
        },
        Commands::Cache { action } => match action {
            None | Some(CacheAction::Stats) => commands::cmd_cache_stats(&ctx),
            Some(CacheAction::Clear) => commands::cmd_cache_clear(&ctx),
        },
    }
}
