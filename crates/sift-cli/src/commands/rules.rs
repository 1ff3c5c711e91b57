//! Keyword rule and embedding cache command implementations

use anyhow::Result;
use sift_core::EmbeddingCache;

use super::{truncate, Context};

pub fn cmd_rules_list(ctx: &Context) -> Result<()> {
    let rules = ctx.store.load_rules();
    let categories = ctx.config.category_set();

    println!();
    println!("📏 Keyword Rules (first match wins)");
    println!("   ─────────────────────────────────────────────────────────────");
    for (i, rule) in rules.iter().enumerate() {
        let marker = if categories.contains(&rule.category) {
            ""
        } else {
            " (not in category set, resolves to Misc)"
        };
        println!(
            "   {:>2}. {:12} {}{}",
            i + 1,
            rule.category,
            truncate(&rule.keywords.join(", "), 60),
            marker
        );
    }

    Ok(())
}

pub fn cmd_rules_reset(ctx: &Context) -> Result<()> {
    let rules = ctx.store.reset_rules()?;
    println!("✅ Restored {} default rules", rules.len());
    Ok(())
}

pub fn cmd_cache_stats(ctx: &Context) -> Result<()> {
    let path = ctx.store.embeddings_path();
    let cache = EmbeddingCache::open(&path);
    let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);

    println!();
    println!("🧠 Embedding Cache");
    println!("   ─────────────────────────────");
    println!("   Backend:  {}", ctx.config.embedding.backend.as_str());
    println!("   Path:     {}", path.display());
    println!("   Vectors:  {}", cache.fingerprint().unwrap_or("-"));
    println!("   Entries:  {}", cache.len());
    println!("   Size:     {} bytes", size);

    Ok(())
}

pub fn cmd_cache_clear(ctx: &Context) -> Result<()> {
    let mut cache = EmbeddingCache::open(ctx.store.embeddings_path());
    let count = cache.len();
    cache.clear()?;
    println!("✅ Cleared {} cached embeddings", count);
    Ok(())
}
