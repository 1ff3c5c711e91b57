//! Pluggable embedding providers
//!
//! This module provides a backend-agnostic interface for turning text into
//! fixed-length vectors used by similarity matching.
//!
//! # Architecture
//!
//! - `EmbeddingProvider` trait: the capability every backend implements
//! - `EmbeddingClient` enum: concrete wrapper selected once from configuration
//! - Backends: `OllamaEmbedder` (HTTP), `HashingEmbedder` (local, deterministic),
//!   `NullEmbedder` (embeddings disabled or unavailable)
//! - `EmbeddingCache`: persistent key -> vector store in front of any provider
//!
//! # Configuration
//!
//! Selected by `[embedding] backend` in sift.toml, overridable with environment
//! variables:
//! - `SIFT_EMBEDDING_BACKEND`: none, ollama, hashing
//! - `OLLAMA_HOST`: Ollama server URL
//! - `SIFT_EMBEDDING_MODEL`: embedding model name (default: nomic-embed-text)

mod cache;
mod hashing;
mod ollama;

pub use cache::EmbeddingCache;
pub use hashing::HashingEmbedder;
pub use ollama::OllamaEmbedder;

use tracing::warn;

use crate::config::{EmbeddingBackend, EmbeddingConfig};
use crate::error::{Error, Result};

/// Capability interface for embedding text
///
/// Implementations must be Send + Sync so a pipeline can be shared across threads.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts, returning one vector per input in input order
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Whether this provider can produce embeddings at all
    fn is_available(&self) -> bool {
        true
    }

    /// Backend name (for logging)
    fn name(&self) -> &str;

    /// Identity of the vector space this provider produces.
    ///
    /// Vectors from different fingerprints are not comparable, so a cache
    /// built under one fingerprint is discarded when another binds to it.
    fn fingerprint(&self) -> String {
        self.name().to_string()
    }
}

/// Provider used when embeddings are disabled or the backend could not be built
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEmbedder;

impl EmbeddingProvider for NullEmbedder {
    fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(Error::Embedding("embeddings are disabled".into()))
    }

    fn is_available(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "none"
    }
}

/// Concrete embedding client
///
/// Selected at construction time; callers never branch on `Option`s.
#[derive(Clone)]
pub enum EmbeddingClient {
    /// Embeddings disabled or unavailable
    Null(NullEmbedder),
    /// Ollama `/api/embed` endpoint
    Ollama(OllamaEmbedder),
    /// Local character n-gram hashing
    Hashing(HashingEmbedder),
}

impl EmbeddingClient {
    /// Build the configured backend.
    ///
    /// A backend that cannot be constructed degrades to `Null`, which makes the
    /// similarity tier report "no match" instead of failing the pipeline.
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        match config.backend {
            EmbeddingBackend::None => EmbeddingClient::Null(NullEmbedder),
            EmbeddingBackend::Hashing => {
                EmbeddingClient::Hashing(HashingEmbedder::new(config.dimensions))
            }
            EmbeddingBackend::Ollama => match OllamaEmbedder::from_config(config) {
                Ok(embedder) => EmbeddingClient::Ollama(embedder),
                Err(e) => {
                    warn!(error = %e, "Failed to build Ollama embedder, disabling embeddings");
                    EmbeddingClient::Null(NullEmbedder)
                }
            },
        }
    }

    pub fn null() -> Self {
        EmbeddingClient::Null(NullEmbedder)
    }

    pub fn hashing(dimensions: usize) -> Self {
        EmbeddingClient::Hashing(HashingEmbedder::new(dimensions))
    }
}

impl EmbeddingProvider for EmbeddingClient {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        match self {
            EmbeddingClient::Null(b) => b.embed(texts),
            EmbeddingClient::Ollama(b) => b.embed(texts),
            EmbeddingClient::Hashing(b) => b.embed(texts),
        }
    }

    fn is_available(&self) -> bool {
        match self {
            EmbeddingClient::Null(b) => b.is_available(),
            EmbeddingClient::Ollama(b) => b.is_available(),
            EmbeddingClient::Hashing(b) => b.is_available(),
        }
    }

    fn name(&self) -> &str {
        match self {
            EmbeddingClient::Null(b) => b.name(),
            EmbeddingClient::Ollama(b) => b.name(),
            EmbeddingClient::Hashing(b) => b.name(),
        }
    }

    fn fingerprint(&self) -> String {
        match self {
            EmbeddingClient::Null(b) => b.fingerprint(),
            EmbeddingClient::Ollama(b) => b.fingerprint(),
            EmbeddingClient::Hashing(b) => b.fingerprint(),
        }
    }
}
