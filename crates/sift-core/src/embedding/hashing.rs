//! Local hashing embedder
//!
//! Feature-hashes character trigrams of each word into a fixed number of
//! buckets and L2-normalizes the result. Deterministic across runs and
//! platforms, needs no model download, and places descriptions that share
//! merchant words close together.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::Result;

use super::EmbeddingProvider;

/// Default vector length
pub const DEFAULT_DIMENSIONS: usize = 256;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Character-trigram hashing embedder
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
    /// Number of `embed` calls (shared across clones)
    calls: Arc<AtomicUsize>,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// How many batches this embedder has been asked to compute
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Embed a single text
    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let lower = text.to_lowercase();

        for word in lower.split(|c: char| !c.is_alphanumeric()) {
            if word.is_empty() {
                continue;
            }
            let padded: Vec<char> = std::iter::once('#')
                .chain(word.chars())
                .chain(std::iter::once('#'))
                .collect();
            for gram in padded.windows(3) {
                let bucket = (fnv1a(gram) % self.dimensions as u64) as usize;
                vector[bucket] += 1.0;
            }
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

fn fnv1a(chars: &[char]) -> u64 {
    let mut hash = FNV_OFFSET;
    for c in chars {
        let mut buf = [0u8; 4];
        for byte in c.encode_utf8(&mut buf).as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    }
    hash
}

impl EmbeddingProvider for HashingEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn name(&self) -> &str {
        "hashing"
    }

    fn fingerprint(&self) -> String {
        format!("hashing:{}", self.dimensions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::cosine_similarity;

    #[test]
    fn test_deterministic() {
        let embedder = HashingEmbedder::default();
        assert_eq!(
            embedder.embed_one("Whole Foods Market"),
            embedder.embed_one("Whole Foods Market")
        );
    }

    #[test]
    fn test_unit_length() {
        let v = HashingEmbedder::default().embed_one("NETFLIX.COM");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let v = HashingEmbedder::new(8).embed_one("  ");
        assert_eq!(v, vec![0.0; 8]);
    }

    #[test]
    fn test_shared_words_are_similar() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed_one("Whole Foods");
        let b = embedder.embed_one("WHOLE FOODS MARKET #123");
        let c = embedder.embed_one("Shell Oil");
        assert!(cosine_similarity(&a, &b) > 0.6);
        assert!(cosine_similarity(&a, &c) < 0.3);
    }

    #[test]
    fn test_counts_calls() {
        let embedder = HashingEmbedder::default();
        let clone = embedder.clone();
        embedder.embed(&["a".to_string(), "b".to_string()]).unwrap();
        clone.embed(&["c".to_string()]).unwrap();
        assert_eq!(embedder.calls(), 2);
    }
}
