//! Categorization pipeline
//!
//! Every transaction gets exactly one category from the closed set. Tiers are
//! tried in strict priority order and the first decision wins:
//!
//! 1. Override: exact match on the raw description
//! 2. Keyword rules: first case-insensitive substring hit
//! 3. Similarity: nearest known merchant by embedding (optional)
//! 4. Heuristic fallback: evidence-word scoring, never fails
//!
//! Whatever a tier returns is coerced into the category set, so an out-of-set
//! category can never leak into a transaction.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::Config;
use crate::embedding::{
    EmbeddingCache, EmbeddingClient, EmbeddingProvider, NullEmbedder,
};
use crate::fallback::{EvidencePolicy, HeuristicFallbackClassifier};
use crate::merchant::MerchantNormalizer;
use crate::models::{
    CategoryRule, CategorySet, CategorySource, KnownMerchant, MerchantMappings, Overrides,
    Transaction, MISC,
};
use crate::rules::{default_rules, KeywordRuleMatcher};
use crate::similarity::{SimilarityMatcher, DEFAULT_SIMILARITY_THRESHOLD};
use crate::store::Store;

/// Result of categorizing a single description
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryAssignment {
    pub category: String,
    pub source: CategorySource,
    /// Cosine similarity (only set when source is Similarity)
    pub score: Option<f64>,
}

impl CategoryAssignment {
    fn new(category: String, source: CategorySource) -> Self {
        Self {
            category,
            source,
            score: None,
        }
    }
}

/// Outcome of a batch categorization
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategorizeReport {
    pub processed: usize,
    pub by_override: usize,
    pub by_rule: usize,
    pub by_similarity: usize,
    pub by_heuristic: usize,
    /// Transactions that ended up in `Misc`
    pub misc: usize,
    /// Deciding tier per transaction, in input order
    pub sources: Vec<CategorySource>,
}

impl CategorizeReport {
    fn record(&mut self, assignment: &CategoryAssignment) {
        self.processed += 1;
        match assignment.source {
            CategorySource::Override => self.by_override += 1,
            CategorySource::Rule => self.by_rule += 1,
            CategorySource::Similarity => self.by_similarity += 1,
            CategorySource::Heuristic => self.by_heuristic += 1,
        }
        if assignment.category == MISC {
            self.misc += 1;
        }
        self.sources.push(assignment.source);
    }
}

/// Strict-priority categorization cascade
pub struct CategorizationPipeline {
    categories: CategorySet,
    overrides: Overrides,
    rules: KeywordRuleMatcher,
    similarity: SimilarityMatcher,
    fallback: HeuristicFallbackClassifier,
    normalizer: MerchantNormalizer,
    known_merchants: Vec<KnownMerchant>,
}

impl Default for CategorizationPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl CategorizationPipeline {
    /// Pipeline with default categories and rules and embeddings disabled
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> CategorizationPipelineBuilder {
        CategorizationPipelineBuilder::default()
    }

    /// Pipeline wired from configuration and the persisted collections in a store
    pub fn from_config(config: &Config, store: &Store) -> Self {
        let provider: Arc<dyn EmbeddingProvider> = if config.embeddings_enabled() {
            Arc::new(EmbeddingClient::from_config(&config.embedding))
        } else {
            Arc::new(NullEmbedder)
        };
        let cache = if provider.is_available() {
            store.open_embedding_cache()
        } else {
            EmbeddingCache::in_memory()
        };

        Self::builder()
            .categories(config.category_set())
            .rules(store.load_rules())
            .overrides(store.load_overrides())
            .mappings(store.load_mappings())
            .embedding_provider(provider)
            .embedding_cache(cache)
            .similarity_threshold(config.categorization.similarity_threshold)
            .build()
    }

    pub fn categories(&self) -> &CategorySet {
        &self.categories
    }

    pub fn overrides(&self) -> &Overrides {
        &self.overrides
    }

    pub fn rules(&self) -> &KeywordRuleMatcher {
        &self.rules
    }

    pub fn similarity(&self) -> &SimilarityMatcher {
        &self.similarity
    }

    pub fn normalizer(&self) -> &MerchantNormalizer {
        &self.normalizer
    }

    pub fn known_merchants(&self) -> &[KnownMerchant] {
        &self.known_merchants
    }

    /// Replace the similarity candidates (only in-set, non-Misc entries are kept)
    pub fn set_known_merchants(&mut self, known: Vec<KnownMerchant>) {
        self.known_merchants = filter_known(known, &self.categories);
    }

    /// Derive similarity candidates from categorized history
    pub fn learn_from_history(&mut self, history: &[Transaction]) {
        self.known_merchants = known_merchants_from(history, &self.categories);
        debug!(count = self.known_merchants.len(), "Known merchants from history");
    }

    /// Categorize a single description
    pub fn categorize_one(&self, description: &str, embeddings_enabled: bool) -> CategoryAssignment {
        if let Some(assignment) = self.decide_deterministic(description) {
            return assignment;
        }

        let similar = if self.similarity_applies(embeddings_enabled) && !description.trim().is_empty()
        {
            self.similarity
                .match_batch(&[description.to_string()], &self.known_merchants)
                .pop()
                .flatten()
        } else {
            None
        };

        match similar {
            Some(m) => self.similarity_assignment(description, m.category, m.score),
            None => self.fallback_assignment(description),
        }
    }

    /// Categorize transactions, returning them with `category` (and `merchant`) set
    pub fn categorize(
        &self,
        mut transactions: Vec<Transaction>,
        embeddings_enabled: bool,
    ) -> Vec<Transaction> {
        self.categorize_in_place(&mut transactions, embeddings_enabled);
        transactions
    }

    /// Categorize in place, returning per-tier counts.
    ///
    /// Descriptions that reach the similarity tier are embedded together in a
    /// single provider round trip.
    pub fn categorize_in_place(
        &self,
        transactions: &mut [Transaction],
        embeddings_enabled: bool,
    ) -> CategorizeReport {
        let mut decided: Vec<Option<CategoryAssignment>> = transactions
            .iter()
            .map(|tx| self.decide_deterministic(&tx.description))
            .collect();

        // Similarity tier for everything the deterministic tiers left open
        if self.similarity_applies(embeddings_enabled) {
            let pending: Vec<usize> = decided
                .iter()
                .enumerate()
                .filter(|(i, d)| d.is_none() && !transactions[*i].description.trim().is_empty())
                .map(|(i, _)| i)
                .collect();

            if !pending.is_empty() {
                let descriptions: Vec<String> = pending
                    .iter()
                    .map(|&i| transactions[i].description.clone())
                    .collect();
                let matches = self
                    .similarity
                    .match_batch(&descriptions, &self.known_merchants);

                for (&i, m) in pending.iter().zip(matches) {
                    if let Some(m) = m {
                        decided[i] = Some(self.similarity_assignment(
                            &transactions[i].description,
                            m.category,
                            m.score,
                        ));
                    }
                }
            }
        }

        let mut report = CategorizeReport::default();
        for (tx, decision) in transactions.iter_mut().zip(decided) {
            let assignment = decision.unwrap_or_else(|| self.fallback_assignment(&tx.description));
            if tx.merchant.trim().is_empty() {
                tx.merchant = self.normalizer.normalize(&tx.description);
            }
            tx.category = assignment.category.clone();
            report.record(&assignment);
        }

        info!(
            processed = report.processed,
            by_override = report.by_override,
            by_rule = report.by_rule,
            by_similarity = report.by_similarity,
            by_heuristic = report.by_heuristic,
            "Categorization complete"
        );
        report
    }

    fn similarity_applies(&self, embeddings_enabled: bool) -> bool {
        embeddings_enabled && !self.known_merchants.is_empty() && self.similarity.is_available()
    }

    /// Override and rule tiers
    fn decide_deterministic(&self, description: &str) -> Option<CategoryAssignment> {
        if let Some(category) = self.overrides.get(description) {
            debug!("Override matched for '{}': {}", description, category);
            return Some(CategoryAssignment::new(
                self.coerce(category),
                CategorySource::Override,
            ));
        }

        if let Some((rule, keyword)) = self.rules.matching_rule(description) {
            debug!(
                "Rule matched for '{}': {} (keyword '{}')",
                description, rule.category, keyword
            );
            return Some(CategoryAssignment::new(
                self.coerce(&rule.category),
                CategorySource::Rule,
            ));
        }

        None
    }

    fn similarity_assignment(
        &self,
        description: &str,
        category: String,
        score: f64,
    ) -> CategoryAssignment {
        debug!(
            "Similarity matched for '{}': {} (score: {:.3})",
            description, category, score
        );
        CategoryAssignment {
            category: self.coerce(&category),
            source: CategorySource::Similarity,
            score: Some(score),
        }
    }

    fn fallback_assignment(&self, description: &str) -> CategoryAssignment {
        let category = self.fallback.classify(description, &self.categories);
        debug!("Heuristic fallback for '{}': {}", description, category);
        CategoryAssignment::new(self.coerce(&category), CategorySource::Heuristic)
    }

    fn coerce(&self, category: &str) -> String {
        let resolved = self.categories.resolve(category);
        if resolved != category {
            debug!("Category '{}' not in set, using {}", category, MISC);
        }
        resolved
    }
}

/// Builder for `CategorizationPipeline`
pub struct CategorizationPipelineBuilder {
    categories: CategorySet,
    rules: Vec<CategoryRule>,
    overrides: Overrides,
    mappings: MerchantMappings,
    provider: Arc<dyn EmbeddingProvider>,
    cache: EmbeddingCache,
    threshold: f64,
    policy: EvidencePolicy,
    known_merchants: Vec<KnownMerchant>,
}

impl Default for CategorizationPipelineBuilder {
    fn default() -> Self {
        Self {
            categories: CategorySet::default(),
            rules: default_rules(),
            overrides: Overrides::new(),
            mappings: MerchantMappings::new(),
            provider: Arc::new(NullEmbedder),
            cache: EmbeddingCache::in_memory(),
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
            policy: EvidencePolicy::default(),
            known_merchants: Vec::new(),
        }
    }
}

impl CategorizationPipelineBuilder {
    pub fn categories(mut self, categories: CategorySet) -> Self {
        self.categories = categories;
        self
    }

    pub fn rules(mut self, rules: Vec<CategoryRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn mappings(mut self, mappings: MerchantMappings) -> Self {
        self.mappings = mappings;
        self
    }

    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.provider = provider;
        self
    }

    pub fn embedding_cache(mut self, cache: EmbeddingCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn similarity_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn evidence_policy(mut self, policy: EvidencePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn known_merchants(mut self, known: Vec<KnownMerchant>) -> Self {
        self.known_merchants = known;
        self
    }

    pub fn build(self) -> CategorizationPipeline {
        let rules = self
            .rules
            .into_iter()
            .map(CategoryRule::normalized)
            .collect();
        let known_merchants = filter_known(self.known_merchants, &self.categories);

        CategorizationPipeline {
            overrides: self.overrides,
            rules: KeywordRuleMatcher::new(rules),
            similarity: SimilarityMatcher::new(self.provider, self.cache)
                .with_threshold(self.threshold),
            fallback: HeuristicFallbackClassifier::new(self.policy),
            normalizer: MerchantNormalizer::new(self.mappings),
            known_merchants,
            categories: self.categories,
        }
    }
}

/// Keep usable candidates: non-empty description, category in the set and not `Misc`
fn filter_known(known: Vec<KnownMerchant>, categories: &CategorySet) -> Vec<KnownMerchant> {
    let mut seen = HashSet::new();
    known
        .into_iter()
        .filter(|k| {
            !k.description.trim().is_empty()
                && k.category != MISC
                && categories.contains(&k.category)
        })
        .filter(|k| seen.insert((k.description.clone(), k.category.clone())))
        .collect()
}

/// Similarity candidates from categorized history, first occurrence order
pub fn known_merchants_from(history: &[Transaction], categories: &CategorySet) -> Vec<KnownMerchant> {
    filter_known(
        history
            .iter()
            .map(|tx| KnownMerchant::new(tx.description.clone(), tx.category.clone()))
            .collect(),
        categories,
    )
}

/// Categorize with default categories and the local hashing embedder
pub fn categorize(
    transactions: Vec<Transaction>,
    rules: Vec<CategoryRule>,
    overrides: Overrides,
    known_merchants: Vec<KnownMerchant>,
    embeddings_enabled: bool,
) -> Vec<Transaction> {
    let provider: Arc<dyn EmbeddingProvider> = if embeddings_enabled {
        Arc::new(EmbeddingClient::from_config(&Default::default()))
    } else {
        Arc::new(NullEmbedder)
    };

    CategorizationPipeline::builder()
        .rules(rules)
        .overrides(overrides)
        .known_merchants(known_merchants)
        .embedding_provider(provider)
        .build()
        .categorize(transactions, embeddings_enabled)
}
