//! Normalize, categorize and recurring command implementations

use std::fs;
use std::path::Path;

use anyhow::{Context as _, Result};
use chrono::{Local, NaiveDate};
use sift_core::{
    upcoming_recurring, CategorizationPipeline, CategorizeReport, MerchantNormalizer,
    RecurringPattern, RecurringPatternDetector, Transaction,
};

use super::{read_raw_transactions, read_transactions, truncate, Context};

pub fn cmd_normalize(ctx: &Context, descriptions: &[String]) -> Result<()> {
    let normalizer = MerchantNormalizer::new(ctx.store.load_mappings());
    for description in descriptions {
        println!("{} → {}", description, normalizer.normalize(description));
    }
    Ok(())
}

/// Categorize a raw transaction file, optionally learning similarity candidates from history
pub fn categorize_file(
    ctx: &Context,
    input: &Path,
    history: Option<&Path>,
    no_embeddings: bool,
) -> Result<(Vec<Transaction>, CategorizeReport)> {
    let mut transactions = read_raw_transactions(input)?;

    let mut pipeline = CategorizationPipeline::from_config(&ctx.config, &ctx.store);
    if let Some(history) = history {
        pipeline.learn_from_history(&read_transactions(history)?);
    }

    let embeddings_enabled = !no_embeddings && ctx.config.embeddings_enabled();
    let report = pipeline.categorize_in_place(&mut transactions, embeddings_enabled);
    Ok((transactions, report))
}

pub fn cmd_categorize(
    ctx: &Context,
    input: &Path,
    history: Option<&Path>,
    output: Option<&Path>,
    no_embeddings: bool,
) -> Result<()> {
    let (transactions, report) = categorize_file(ctx, input, history, no_embeddings)?;
    let json = serde_json::to_string_pretty(&transactions)?;

    match output {
        Some(path) => {
            fs::write(path, json + "\n")
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("✅ Wrote {} transactions to {}", transactions.len(), path.display());
        }
        None => println!("{}", json),
    }

    // Summary on stderr so stdout stays valid JSON
    eprintln!();
    eprintln!("📊 Categorized {} transactions", report.processed);
    eprintln!("   ─────────────────────────────");
    eprintln!("   Override:   {}", report.by_override);
    eprintln!("   Rule:       {}", report.by_rule);
    eprintln!("   Similarity: {}", report.by_similarity);
    eprintln!("   Heuristic:  {}", report.by_heuristic);
    eprintln!("   Misc:       {}", report.misc);

    Ok(())
}

/// Detect recurring patterns in a transaction file using the configured thresholds
pub fn recurring_file(ctx: &Context, input: &Path) -> Result<Vec<RecurringPattern>> {
    let transactions = read_transactions(input)?;
    let detector = RecurringPatternDetector::new(ctx.config.recurring.clone());
    Ok(detector.detect(&transactions))
}

pub fn cmd_recurring(
    ctx: &Context,
    input: &Path,
    upcoming: Option<i64>,
    today: Option<&str>,
) -> Result<()> {
    let patterns = recurring_file(ctx, input)?;

    if patterns.is_empty() {
        println!("No recurring payments detected.");
        return Ok(());
    }

    if let Some(days) = upcoming {
        let today = match today {
            Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .context("Invalid --today format (use YYYY-MM-DD)")?,
            None => Local::now().date_naive(),
        };
        let upcoming = upcoming_recurring(&patterns, today, days);

        println!();
        println!("📅 Expected in the next {} days", days);
        println!("   ─────────────────────────────────────────────────────────────");
        if upcoming.is_empty() {
            println!("   Nothing due.");
        }
        for expense in &upcoming {
            let when = if expense.days_until < 0 {
                format!("{} days overdue", -expense.days_until)
            } else {
                format!("in {} days", expense.days_until)
            };
            println!(
                "   {:24} │ {:>10.2} │ {} ({}) │ {:.0}%",
                truncate(&expense.description, 24),
                expense.amount,
                expense.expected_date,
                when,
                expense.confidence * 100.0
            );
        }
        return Ok(());
    }

    println!();
    println!("🔁 Recurring Payments");
    println!("   ─────────────────────────────────────────────────────────────");
    for p in &patterns {
        println!(
            "   {:24} │ {:>10.2} │ every {:>2} days │ next {} │ {}x │ {:.0}%",
            truncate(&p.description, 24),
            p.amount,
            p.frequency_days,
            p.next_expected,
            p.occurrences,
            p.confidence * 100.0
        );
    }

    Ok(())
}
