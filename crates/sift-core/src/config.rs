//! Configuration for Sift
//!
//! ## Resolution
//!
//! Config is loaded in layers:
//! 1. Embedded defaults (`config/sift.toml`, compiled into the binary)
//! 2. An override file: an explicit path, else `~/.config/sift/sift.toml` if it exists.
//!    Keys missing from the override keep their default values.
//! 3. Environment variables:
//!    - `SIFT_EMBEDDING_BACKEND`: none, ollama, hashing
//!    - `OLLAMA_HOST`: Ollama server URL
//!    - `SIFT_EMBEDDING_MODEL`: embedding model name

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::CategorySet;

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/sift.toml");

/// Which embedding backend to construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Similarity tier disabled
    None,
    /// Ollama `/api/embed`
    Ollama,
    /// Local deterministic hashing embedder
    #[default]
    Hashing,
}

impl EmbeddingBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Ollama => "ollama",
            Self::Hashing => "hashing",
        }
    }
}

impl std::str::FromStr for EmbeddingBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "off" | "disabled" => Ok(Self::None),
            "ollama" => Ok(Self::Ollama),
            "hashing" | "local" => Ok(Self::Hashing),
            _ => Err(format!("Unknown embedding backend: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategorizationConfig {
    pub similarity_threshold: f64,
    pub use_embeddings: bool,
}

impl Default for CategorizationConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: crate::similarity::DEFAULT_SIMILARITY_THRESHOLD,
            use_embeddings: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    pub host: String,
    pub model: String,
    pub timeout_secs: u64,
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::default(),
            host: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            timeout_secs: 30,
            dimensions: 256,
        }
    }
}

/// Thresholds for recurring pattern detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecurringConfig {
    pub min_occurrences: usize,
    pub min_interval_days: f64,
    pub max_interval_days: f64,
    pub min_consistency: f64,
    pub single_interval_confidence: f64,
}

impl Default for RecurringConfig {
    fn default() -> Self {
        Self {
            min_occurrences: 2,
            min_interval_days: 7.0,
            max_interval_days: 90.0,
            min_consistency: 0.7,
            single_interval_confidence: 0.8,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Empty = platform data directory
    pub data_dir: String,
}

/// Full Sift configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub categories: Vec<String>,
    pub categorization: CategorizationConfig,
    pub embedding: EmbeddingConfig,
    pub recurring: RecurringConfig,
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            categories: crate::models::DEFAULT_CATEGORIES
                .iter()
                .map(|c| c.to_string())
                .collect(),
            categorization: CategorizationConfig::default(),
            embedding: EmbeddingConfig::default(),
            recurring: RecurringConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Load config: override path (or default location), then environment.
    ///
    /// An explicit path that does not exist is an error; a missing default
    /// location silently means "defaults only".
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                Self::from_file(path)?
            }
            None => match default_config_path() {
                Some(default_path) if default_path.exists() => Self::from_file(&default_path)?,
                _ => Self::embedded(),
            },
        };
        config.apply_env();
        Ok(config)
    }

    /// Embedded defaults only
    pub fn embedded() -> Self {
        Self::parse(DEFAULT_CONFIG).unwrap_or_else(|e| {
            warn!(error = %e, "Embedded config invalid, using built-in defaults");
            Self::default()
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "Loading config override");
        Self::parse(&content)
    }

    /// Parse TOML; missing keys take default values
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply `SIFT_EMBEDDING_BACKEND`, `OLLAMA_HOST` and `SIFT_EMBEDDING_MODEL`
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply environment overrides from an arbitrary lookup (testable without
    /// touching the process environment)
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = lookup("SIFT_EMBEDDING_BACKEND") {
            match backend.parse() {
                Ok(backend) => self.embedding.backend = backend,
                Err(e) => warn!(error = %e, "Ignoring SIFT_EMBEDDING_BACKEND"),
            }
        }
        if let Some(host) = lookup("OLLAMA_HOST").filter(|h| !h.trim().is_empty()) {
            self.embedding.host = host;
        }
        if let Some(model) = lookup("SIFT_EMBEDDING_MODEL").filter(|m| !m.trim().is_empty()) {
            self.embedding.model = model;
        }
    }

    /// The closed category set (always contains `Misc`)
    pub fn category_set(&self) -> CategorySet {
        CategorySet::new(&self.categories)
    }

    /// Whether the similarity tier should run at all
    pub fn embeddings_enabled(&self) -> bool {
        self.categorization.use_embeddings && self.embedding.backend != EmbeddingBackend::None
    }

    /// Resolved data directory
    pub fn data_dir(&self) -> PathBuf {
        let configured = self.storage.data_dir.trim();
        if !configured.is_empty() {
            return PathBuf::from(configured);
        }
        default_data_dir()
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("sift").join("sift.toml"))
}

/// Default data directory (`~/.local/share/sift` on Linux)
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("sift"))
        .unwrap_or_else(|| PathBuf::from(".sift"))
}
