//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Shared utilities (open_context, JSON input loading)
//! - `categorize` - Normalize, categorize and recurring commands
//! - `overrides` - Override and merchant mapping management
//! - `rules` - Keyword rule and embedding cache management

pub mod categorize;
pub mod core;
pub mod overrides;
pub mod rules;

// Re-export command functions for main.rs
pub use categorize::*;
pub use core::*;
pub use overrides::*;
pub use rules::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
