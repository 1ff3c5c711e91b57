//! Override and merchant mapping command implementations

use anyhow::Result;
use sift_core::{add_override, remove_override, MerchantNormalizer, MISC};

use super::{truncate, Context};

pub fn cmd_override_list(ctx: &Context) -> Result<()> {
    let overrides = ctx.store.load_overrides();

    if overrides.is_empty() {
        println!("No overrides. Add one with:");
        println!("  sift override add \"DESCRIPTION\" Category");
        return Ok(());
    }

    println!();
    println!("📌 Overrides");
    println!("   ─────────────────────────────────────────────────────────────");
    for (description, category) in overrides.iter() {
        println!("   {:40} → {}", truncate(description, 40), category);
    }

    Ok(())
}

pub fn cmd_override_add(ctx: &Context, description: &str, category: &str) -> Result<()> {
    let categories = ctx.config.category_set();
    let mut overrides = ctx.store.load_overrides();

    let resolved = add_override(&mut overrides, &categories, description, category);
    ctx.store.save_overrides(&overrides)?;

    if resolved == MISC && category.trim() != MISC {
        println!(
            "⚠️  '{}' is not a known category (known: {}); saved as {}",
            category,
            categories.names().join(", "),
            MISC
        );
    }
    println!("✅ '{}' → {}", description, resolved);

    Ok(())
}

pub fn cmd_override_remove(ctx: &Context, description: &str) -> Result<()> {
    let mut overrides = ctx.store.load_overrides();

    let removed = remove_override(&mut overrides, description)
        .ok_or_else(|| anyhow::anyhow!("No override for '{}'", description))?;
    ctx.store.save_overrides(&overrides)?;

    println!("✅ Removed override '{}' (was {})", description, removed);
    Ok(())
}

pub fn cmd_mapping_list(ctx: &Context) -> Result<()> {
    let mappings = ctx.store.load_mappings();

    if mappings.is_empty() {
        println!("No merchant mappings. Add one with:");
        println!("  sift mapping add \"RAW DESCRIPTION\" \"Merchant Name\"");
        return Ok(());
    }

    println!();
    println!("🏪 Merchant Mappings");
    println!("   ─────────────────────────────────────────────────────────────");
    for (raw, canonical) in mappings.iter() {
        println!("   {:40} → {}", truncate(raw, 40), canonical);
    }

    Ok(())
}

pub fn cmd_mapping_add(ctx: &Context, raw: &str, canonical: &str) -> Result<()> {
    let canonical = canonical.trim();
    if canonical.is_empty() {
        anyhow::bail!("Merchant name cannot be empty");
    }

    let mut normalizer = MerchantNormalizer::new(ctx.store.load_mappings());
    normalizer.add_mapping(raw, canonical);
    ctx.store.save_mappings(normalizer.mappings())?;

    println!("✅ '{}' → {}", raw, canonical);
    Ok(())
}

pub fn cmd_mapping_remove(ctx: &Context, raw: &str) -> Result<()> {
    let mut normalizer = MerchantNormalizer::new(ctx.store.load_mappings());

    let removed = normalizer
        .remove_mapping(raw)
        .ok_or_else(|| anyhow::anyhow!("No mapping for '{}'", raw))?;
    ctx.store.save_mappings(normalizer.mappings())?;

    println!("✅ Removed mapping '{}' (was {})", raw, removed);
    Ok(())
}
