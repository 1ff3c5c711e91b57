//! Sift Core Library
//!
//! Transaction classification core:
//! - Merchant normalization via an ordered signature cascade
//! - Keyword rules and exact-description overrides
//! - Embedding similarity against known merchants, with a persistent cache
//! - Heuristic evidence-word fallback that always yields a category
//! - Recurring payment detection and upcoming expense forecasts
//! - Layered TOML configuration and file-backed persistence

pub mod categorize;
pub mod config;
pub mod embedding;
pub mod error;
pub mod fallback;
pub mod ingest;
pub mod merchant;
pub mod models;
pub mod recurring;
pub mod rules;
pub mod similarity;
pub mod store;

/// Test utilities including mock Ollama server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use categorize::{
    categorize, known_merchants_from, CategorizationPipeline, CategorizationPipelineBuilder,
    CategorizeReport, CategoryAssignment,
};
pub use config::{Config, EmbeddingBackend, EmbeddingConfig, RecurringConfig};
pub use embedding::{
    EmbeddingCache, EmbeddingClient, EmbeddingProvider, HashingEmbedder, NullEmbedder,
    OllamaEmbedder,
};
pub use error::{Error, Result};
pub use fallback::{EvidencePolicy, HeuristicFallbackClassifier};
pub use ingest::ingest;
pub use merchant::{normalize_merchant, MerchantKind, MerchantNormalizer, MerchantPattern};
pub use models::{
    CategoryRule, CategorySet, CategorySource, Direction, KnownMerchant, MerchantMappings,
    Overrides, RawTransaction, RecurringPattern, Transaction, UpcomingExpense, MISC,
};
pub use recurring::{detect_recurring, upcoming_recurring, RecurringPatternDetector};
pub use rules::{add_override, default_rules, remove_override, KeywordRuleMatcher};
pub use similarity::{cosine_similarity, SimilarityMatch, SimilarityMatcher};
pub use store::Store;
