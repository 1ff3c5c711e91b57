//! Embedding similarity matching against known merchants
//!
//! A description is matched to the most similar previously categorized
//! description. Every provider failure is reported as "no match" so the
//! cascade can fall through to the heuristic tier.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::embedding::{EmbeddingCache, EmbeddingProvider};
use crate::error::Result;
use crate::models::KnownMerchant;

/// Default minimum cosine similarity for a match
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.6;

/// Cosine similarity of two vectors.
///
/// Mismatched lengths, empty vectors and zero-norm vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Best candidate for a query
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatch {
    /// Known description that matched
    pub description: String,
    pub category: String,
    pub score: f64,
}

/// Index of the highest-scoring candidate (first index wins ties)
fn argmax(query: &[f32], candidates: &[Vec<f32>]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (i, candidate) in candidates.iter().enumerate() {
        let score = cosine_similarity(query, candidate);
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((i, score)),
        }
    }
    best
}

/// Nearest-known-merchant matcher with an embedding cache in front of the provider
pub struct SimilarityMatcher {
    provider: Arc<dyn EmbeddingProvider>,
    cache: Mutex<EmbeddingCache>,
    threshold: f64,
}

impl SimilarityMatcher {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, cache: EmbeddingCache) -> Self {
        Self {
            provider,
            cache: Mutex::new(cache),
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn is_available(&self) -> bool {
        self.provider.is_available()
    }

    fn lock_cache(&self) -> MutexGuard<'_, EmbeddingCache> {
        // A panic mid-insert leaves at worst a missing entry
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn cache_len(&self) -> usize {
        self.lock_cache().len()
    }

    pub fn clear_cache(&self) -> Result<()> {
        self.lock_cache().clear()
    }

    /// Embed texts via the cache without holding the lock across the provider call
    fn embed_through_cache(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let fingerprint = self.provider.fingerprint();
        let uncached = {
            let mut cache = self.lock_cache();
            cache.bind(&fingerprint);
            cache.uncached(texts)
        };

        if uncached.is_empty() {
            return self.lock_cache().lookup(texts);
        }

        debug!(
            provider = self.provider.name(),
            cached = texts.len() - uncached.len(),
            computing = uncached.len(),
            "Computing embeddings"
        );
        let computed = self.provider.embed(&uncached)?;

        let mut cache = self.lock_cache();
        cache.bind(&fingerprint);
        cache.insert_computed(&uncached, computed)?;
        cache.lookup(texts)
    }

    /// Category of the nearest known merchant, if similar enough
    pub fn match_category(&self, description: &str, known: &[KnownMerchant]) -> Option<String> {
        self.nearest(description, known)
            .filter(|m| m.score >= self.threshold)
            .map(|m| m.category)
    }

    /// Nearest known merchant regardless of threshold
    pub fn nearest(&self, description: &str, known: &[KnownMerchant]) -> Option<SimilarityMatch> {
        self.nearest_batch(&[description.to_string()], known)
            .pop()
            .flatten()
    }

    /// Threshold-filtered matches for many descriptions with a single provider round trip
    pub fn match_batch(
        &self,
        descriptions: &[String],
        known: &[KnownMerchant],
    ) -> Vec<Option<SimilarityMatch>> {
        self.nearest_batch(descriptions, known)
            .into_iter()
            .map(|m| m.filter(|m| m.score >= self.threshold))
            .collect()
    }

    fn nearest_batch(
        &self,
        descriptions: &[String],
        known: &[KnownMerchant],
    ) -> Vec<Option<SimilarityMatch>> {
        let none = || vec![None; descriptions.len()];
        if descriptions.is_empty() || known.is_empty() {
            return none();
        }
        if !self.provider.is_available() {
            debug!(provider = self.provider.name(), "Embedding provider unavailable");
            return none();
        }

        let texts: Vec<String> = descriptions
            .iter()
            .cloned()
            .chain(known.iter().map(|k| k.description.clone()))
            .collect();

        let vectors = match self.embed_through_cache(&texts) {
            Ok(vectors) => vectors,
            Err(e) => {
                warn!(
                    provider = self.provider.name(),
                    error = %e,
                    "Embedding failed, skipping similarity matching"
                );
                return none();
            }
        };

        let (queries, candidates) = vectors.split_at(descriptions.len());
        queries
            .iter()
            .map(|query| {
                argmax(query, candidates).map(|(i, score)| SimilarityMatch {
                    description: known[i].description.clone(),
                    category: known[i].category.clone(),
                    score,
                })
            })
            .collect()
    }
}
