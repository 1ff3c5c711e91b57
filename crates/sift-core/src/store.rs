//! File-backed persistence for user-editable collections
//!
//! Layout under the data directory:
//!
//! ```text
//! rules.json              [{"category": "...", "keywords": ["..."]}]
//! overrides.json          {"description": "category"}
//! merchant_mappings.json  {"raw description": "Canonical Name"}
//! embeddings.bin.gz       embedding cache (see `EmbeddingCache`)
//! ```
//!
//! Loads never fail on bad data: a missing file is an empty collection and a
//! corrupt file is logged and treated as empty (rules fall back to the
//! built-in defaults). Saves are atomic.

use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::embedding::EmbeddingCache;
use crate::error::{Error, Result};
use crate::models::{CategoryRule, MerchantMappings, Overrides};
use crate::rules::default_rules;

const RULES_FILE: &str = "rules.json";
const OVERRIDES_FILE: &str = "overrides.json";
const MAPPINGS_FILE: &str = "merchant_mappings.json";
const EMBEDDINGS_FILE: &str = "embeddings.bin.gz";

/// Data directory holding persisted rules, overrides, mappings and the embedding cache
#[derive(Debug, Clone)]
pub struct Store {
    data_dir: PathBuf,
}

impl Store {
    /// Open a store, creating the directory if it doesn't exist
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        if !data_dir.exists() {
            fs::create_dir_all(&data_dir).map_err(|e| {
                Error::Config(format!(
                    "Failed to create data directory {}: {}",
                    data_dir.display(),
                    e
                ))
            })?;
            info!("Created data directory: {}", data_dir.display());
        }
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn rules_path(&self) -> PathBuf {
        self.data_dir.join(RULES_FILE)
    }

    pub fn overrides_path(&self) -> PathBuf {
        self.data_dir.join(OVERRIDES_FILE)
    }

    pub fn mappings_path(&self) -> PathBuf {
        self.data_dir.join(MAPPINGS_FILE)
    }

    pub fn embeddings_path(&self) -> PathBuf {
        self.data_dir.join(EMBEDDINGS_FILE)
    }

    /// Keyword rules in stored order; defaults when none are saved or the file is unusable
    pub fn load_rules(&self) -> Vec<CategoryRule> {
        match read_json::<Vec<CategoryRule>>(&self.rules_path()) {
            Some(rules) if !rules.is_empty() => rules
                .into_iter()
                .map(CategoryRule::normalized)
                .filter(|r| !r.category.is_empty())
                .collect(),
            _ => default_rules(),
        }
    }

    pub fn save_rules(&self, rules: &[CategoryRule]) -> Result<()> {
        write_json(&self.rules_path(), &rules)
    }

    /// Replace saved rules with the built-in defaults
    pub fn reset_rules(&self) -> Result<Vec<CategoryRule>> {
        let rules = default_rules();
        self.save_rules(&rules)?;
        Ok(rules)
    }

    pub fn load_overrides(&self) -> Overrides {
        read_json(&self.overrides_path()).unwrap_or_default()
    }

    pub fn save_overrides(&self, overrides: &Overrides) -> Result<()> {
        write_json(&self.overrides_path(), overrides)
    }

    pub fn load_mappings(&self) -> MerchantMappings {
        read_json(&self.mappings_path()).unwrap_or_default()
    }

    pub fn save_mappings(&self, mappings: &MerchantMappings) -> Result<()> {
        write_json(&self.mappings_path(), mappings)
    }

    /// Open the persistent embedding cache in this directory
    pub fn open_embedding_cache(&self) -> EmbeddingCache {
        EmbeddingCache::open(self.embeddings_path())
    }
}

/// Read a JSON file; `None` when missing or unparseable
fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read data file, using empty");
            return None;
        }
    };

    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Corrupt data file, using empty");
            None
        }
    }
}

/// Write JSON through a temp file in the same directory, then rename over the target
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;

    debug!(path = %path.display(), "Saved data file");
    Ok(())
}
