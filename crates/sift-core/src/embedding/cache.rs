//! Persistent embedding cache
//!
//! Maps `hex(sha256(lowercase(text)))` to an embedding vector so repeated
//! descriptions never hit the provider twice. The cache also records the
//! fingerprint of the provider that produced its vectors; binding a provider
//! with a different fingerprint discards the stale entries.
//!
//! On-disk format (gzip-compressed):
//!
//! ```text
//! magic "SFEC" | version u8 | fingerprint length u16 | fingerprint bytes | entry count u32
//! per entry:   key length u16 | key bytes | dimensions u32 | f32 values
//! ```
//!
//! All integers and floats are little-endian. Missing, truncated or otherwise
//! corrupt files load as an empty cache. Writes go through a temp file and an
//! atomic rename; a failed write leaves the cache working in memory.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

use super::EmbeddingProvider;

const MAGIC: &[u8; 4] = b"SFEC";
const FORMAT_VERSION: u8 = 2;

/// Embedding cache with optional disk persistence
#[derive(Debug, Default)]
pub struct EmbeddingCache {
    path: Option<PathBuf>,
    /// Provider fingerprint the entries belong to (`None` until bound)
    fingerprint: Option<String>,
    entries: HashMap<String, Vec<f32>>,
}

/// Decoded cache file contents
struct CacheFile {
    fingerprint: Option<String>,
    entries: HashMap<String, Vec<f32>>,
}

impl EmbeddingCache {
    /// Cache that never touches disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open a cache file, starting cold if it is missing or unreadable
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file = match read_cache_file(&path) {
            Ok(file) => {
                debug!(
                    path = %path.display(),
                    count = file.entries.len(),
                    fingerprint = file.fingerprint.as_deref().unwrap_or(""),
                    "Loaded embedding cache"
                );
                Some(file)
            }
            Err(Error::Io(e)) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Embedding cache unreadable, starting empty");
                None
            }
        };
        let (fingerprint, entries) = file
            .map(|f| (f.fingerprint, f.entries))
            .unwrap_or_default();

        Self {
            path: Some(path),
            fingerprint,
            entries,
        }
    }

    /// Cache key for a text
    pub fn key(text: &str) -> String {
        hex::encode(Sha256::digest(text.to_lowercase().as_bytes()))
    }

    pub fn get(&self, text: &str) -> Option<&[f32]> {
        self.entries.get(&Self::key(text)).map(Vec::as_slice)
    }

    pub fn insert(&mut self, text: &str, embedding: Vec<f32>) {
        self.entries.insert(Self::key(text), embedding);
    }

    pub fn contains(&self, text: &str) -> bool {
        self.entries.contains_key(&Self::key(text))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Fingerprint of the provider the cached vectors came from
    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    /// Bind the cache to a provider fingerprint.
    ///
    /// Entries recorded under a different fingerprint are dropped, since their
    /// vectors live in another space. Returns `true` when entries were dropped.
    pub fn bind(&mut self, fingerprint: &str) -> bool {
        let stale = matches!(&self.fingerprint, Some(current) if current != fingerprint)
            && !self.entries.is_empty();
        if stale {
            info!(
                from = self.fingerprint.as_deref().unwrap_or(""),
                to = fingerprint,
                dropped = self.entries.len(),
                "Embedding provider changed, discarding cached vectors"
            );
            self.entries.clear();
        }
        self.fingerprint = Some(fingerprint.to_string());
        stale
    }

    /// Texts with no cached vector, deduplicated by key in first-seen order
    pub fn uncached(&self, texts: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        texts
            .iter()
            .filter(|text| {
                let key = Self::key(text);
                !self.entries.contains_key(&key) && seen.insert(key)
            })
            .cloned()
            .collect()
    }

    /// Record freshly computed vectors for `texts` and persist best-effort
    pub fn insert_computed(&mut self, texts: &[String], vectors: Vec<Vec<f32>>) -> Result<()> {
        if vectors.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "provider returned {} embeddings for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        for (text, vector) in texts.iter().zip(vectors) {
            self.insert(text, vector);
        }
        self.flush();
        Ok(())
    }

    /// Cached vectors for every text, in input order
    pub fn lookup(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts
            .iter()
            .map(|text| {
                self.get(text).map(<[f32]>::to_vec).ok_or_else(|| {
                    Error::Embedding(format!("missing cache entry {}", Self::key(text)))
                })
            })
            .collect()
    }

    /// Drop every entry and delete the cache file
    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        if let Some(path) = &self.path {
            match fs::remove_file(path) {
                Ok(()) => info!(path = %path.display(), "Cleared embedding cache"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Write the cache to disk (no-op for in-memory caches)
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let tmp = tempfile::NamedTempFile::new_in(&dir)?;
        {
            let mut encoder =
                GzEncoder::new(BufWriter::new(tmp.as_file()), Compression::default());
            write_entries(&mut encoder, self.fingerprint.as_deref(), &self.entries)?;
            encoder.finish()?.flush()?;
        }
        tmp.persist(path).map_err(|e| Error::Io(e.error))?;

        debug!(path = %path.display(), count = self.entries.len(), "Saved embedding cache");
        Ok(())
    }

    /// Best-effort save: failures are logged and the cache stays in memory
    fn flush(&self) {
        if let Err(e) = self.save() {
            warn!(error = %e, "Failed to persist embedding cache, continuing in memory");
        }
    }

    /// Embed texts through the cache.
    ///
    /// Output order matches input order. The provider is called at most once,
    /// with exactly the uncached texts (deduplicated by key, first-seen order),
    /// and not at all when every text is cached.
    pub fn embed_batch(
        &mut self,
        provider: &dyn EmbeddingProvider,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>> {
        self.bind(&provider.fingerprint());

        let uncached = self.uncached(texts);
        if !uncached.is_empty() {
            debug!(
                provider = provider.name(),
                cached = texts.len() - uncached.len(),
                computing = uncached.len(),
                "Computing embeddings"
            );
            let computed = provider.embed(&uncached)?;
            self.insert_computed(&uncached, computed)?;
        }

        self.lookup(texts)
    }
}

fn read_cache_file(path: &Path) -> Result<CacheFile> {
    let file = File::open(path)?;
    let mut decoder = GzDecoder::new(BufReader::new(file));
    let mut bytes = Vec::new();
    decoder
        .read_to_end(&mut bytes)
        .map_err(|e| Error::CacheFormat(format!("decompression failed: {}", e)))?;
    decode_entries(&bytes)
}

fn write_entries<W: Write>(
    writer: &mut W,
    fingerprint: Option<&str>,
    entries: &HashMap<String, Vec<f32>>,
) -> Result<()> {
    let fingerprint = fingerprint.unwrap_or("");
    let fingerprint_len = u16::try_from(fingerprint.len())
        .map_err(|_| Error::CacheFormat("provider fingerprint too long".into()))?;
    let count = u32::try_from(entries.len())
        .map_err(|_| Error::CacheFormat("too many cache entries".into()))?;

    writer.write_all(MAGIC)?;
    writer.write_all(&[FORMAT_VERSION])?;
    writer.write_all(&fingerprint_len.to_le_bytes())?;
    writer.write_all(fingerprint.as_bytes())?;
    writer.write_all(&count.to_le_bytes())?;

    // Sorted so identical caches produce identical files
    let mut keys: Vec<&String> = entries.keys().collect();
    keys.sort();

    for key in keys {
        let vector = &entries[key];
        let key_len = u16::try_from(key.len())
            .map_err(|_| Error::CacheFormat(format!("cache key too long: {}", key.len())))?;
        let dims = u32::try_from(vector.len())
            .map_err(|_| Error::CacheFormat("embedding too long".into()))?;

        writer.write_all(&key_len.to_le_bytes())?;
        writer.write_all(key.as_bytes())?;
        writer.write_all(&dims.to_le_bytes())?;
        for value in vector {
            writer.write_all(&value.to_le_bytes())?;
        }
    }
    Ok(())
}

/// Cursor over the decompressed cache bytes
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| Error::CacheFormat("unexpected end of cache file".into()))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn f32(&mut self) -> Result<f32> {
        let b = self.take(4)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

fn decode_entries(bytes: &[u8]) -> Result<CacheFile> {
    let mut reader = Reader { bytes, pos: 0 };

    if reader.take(MAGIC.len())? != MAGIC {
        return Err(Error::CacheFormat("bad magic".into()));
    }
    let version = reader.take(1)?[0];
    if version != FORMAT_VERSION {
        return Err(Error::CacheFormat(format!(
            "unsupported version {}",
            version
        )));
    }

    let fingerprint_len = reader.u16()? as usize;
    let fingerprint = std::str::from_utf8(reader.take(fingerprint_len)?)
        .map_err(|_| Error::CacheFormat("provider fingerprint is not UTF-8".into()))?;
    let fingerprint = (!fingerprint.is_empty()).then(|| fingerprint.to_string());

    let count = reader.u32()? as usize;
    let mut entries = HashMap::new();
    for _ in 0..count {
        let key_len = reader.u16()? as usize;
        let key = std::str::from_utf8(reader.take(key_len)?)
            .map_err(|_| Error::CacheFormat("cache key is not UTF-8".into()))?
            .to_string();
        let dims = reader.u32()? as usize;
        // Bound the allocation by what is actually left in the file
        if dims.saturating_mul(4) > bytes.len() - reader.pos {
            return Err(Error::CacheFormat("embedding length exceeds file".into()));
        }
        let mut vector = Vec::with_capacity(dims);
        for _ in 0..dims {
            vector.push(reader.f32()?);
        }
        entries.insert(key, vector);
    }

    if reader.pos != bytes.len() {
        return Err(Error::CacheFormat("trailing bytes after entries".into()));
    }
    Ok(CacheFile {
        fingerprint,
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{HashingEmbedder, NullEmbedder};
    use tempfile::TempDir;

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_set_and_get() {
        let mut cache = EmbeddingCache::in_memory();
        cache.insert("test text", vec![0.1, 0.2, 0.3]);
        assert_eq!(cache.get("test text"), Some(&[0.1, 0.2, 0.3][..]));
        assert!(cache.get("nonexistent").is_none());
    }

    #[test]
    fn test_key_is_case_insensitive() {
        let mut cache = EmbeddingCache::in_memory();
        cache.insert("Test Text", vec![1.0, 2.0]);
        assert_eq!(cache.get("test text"), Some(&[1.0, 2.0][..]));
        assert_eq!(EmbeddingCache::key("ABC"), EmbeddingCache::key("abc"));
        assert_eq!(EmbeddingCache::key("abc").len(), 64);
    }

    #[test]
    fn test_persistence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("embeddings.bin.gz");

        let mut cache = EmbeddingCache::open(&path);
        cache.insert("persist test", vec![0.5, -0.6, f32::MIN_POSITIVE]);
        cache.save().unwrap();

        let reloaded = EmbeddingCache::open(&path);
        assert_eq!(reloaded.len(), 1);
        assert_eq!(
            reloaded.get("persist test"),
            Some(&[0.5, -0.6, f32::MIN_POSITIVE][..])
        );
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("embeddings.bin.gz");
        fs::write(&path, b"definitely not gzip").unwrap();

        let cache = EmbeddingCache::open(&path);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_truncated_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("embeddings.bin.gz");

        let mut cache = EmbeddingCache::open(&path);
        cache.insert("a", vec![1.0; 16]);
        cache.insert("b", vec![2.0; 16]);
        cache.save().unwrap();

        // Re-compress a truncated payload so gzip itself is valid
        let mut raw = Vec::new();
        GzDecoder::new(File::open(&path).unwrap())
            .read_to_end(&mut raw)
            .unwrap();
        raw.truncate(raw.len() - 7);
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(&raw).unwrap();
        encoder.finish().unwrap();

        assert!(EmbeddingCache::open(&path).is_empty());
    }

    #[test]
    fn test_decode_rejects_bad_header() {
        assert!(decode_entries(b"NOPE\x02\x00\x00\x00\x00\x00\x00").is_err());
        assert!(decode_entries(b"SFEC\x09\x00\x00\x00\x00\x00\x00").is_err());
        // Version 1 files predate fingerprints and load cold
        assert!(decode_entries(b"SFEC\x01\x00\x00\x00\x00").is_err());

        let file = decode_entries(b"SFEC\x02\x00\x00\x00\x00\x00\x00").unwrap();
        assert!(file.entries.is_empty());
        assert!(file.fingerprint.is_none());
    }

    #[test]
    fn test_missing_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let cache = EmbeddingCache::open(dir.path().join("missing.bin.gz"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_unwritable_path_stays_in_memory() {
        let dir = TempDir::new().unwrap();
        // A regular file where the parent directory should be
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"x").unwrap();
        let mut cache = EmbeddingCache::open(blocker.join("embeddings.bin.gz"));

        let embedder = HashingEmbedder::new(8);
        let vectors = cache.embed_batch(&embedder, &texts(&["alpha"])).unwrap();
        assert_eq!(vectors.len(), 1);
        assert!(cache.contains("alpha"));
        assert!(cache.save().is_err());
    }

    #[test]
    fn test_batch_preserves_order_and_only_computes_uncached() {
        let embedder = HashingEmbedder::new(16);
        let mut cache = EmbeddingCache::in_memory();
        cache.insert("beta", vec![9.0; 16]);

        let out = cache
            .embed_batch(&embedder, &texts(&["alpha", "beta", "gamma"]))
            .unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], embedder.embed_one("alpha"));
        assert_eq!(out[1], vec![9.0; 16]);
        assert_eq!(out[2], embedder.embed_one("gamma"));
        assert_eq!(embedder.calls(), 1);
    }

    #[test]
    fn test_batch_is_idempotent() {
        let embedder = HashingEmbedder::new(16);
        let mut cache = EmbeddingCache::in_memory();
        let input = texts(&["Whole Foods", "NETFLIX.COM", "whole foods"]);

        let first = cache.embed_batch(&embedder, &input).unwrap();
        let second = cache.embed_batch(&embedder, &input).unwrap();

        assert_eq!(embedder.calls(), 1);
        assert_eq!(cache.len(), 2);
        let bits = |v: &Vec<Vec<f32>>| -> Vec<Vec<u32>> {
            v.iter()
                .map(|e| e.iter().map(|x| x.to_bits()).collect())
                .collect()
        };
        assert_eq!(bits(&first), bits(&second));
    }

    #[test]
    fn test_batch_survives_reload_without_provider_call() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("embeddings.bin.gz");
        let input = texts(&["Shell Oil", "Costco"]);

        let first = {
            let embedder = HashingEmbedder::new(16);
            let mut cache = EmbeddingCache::open(&path);
            cache.embed_batch(&embedder, &input).unwrap()
        };

        let embedder = HashingEmbedder::new(16);
        let mut cache = EmbeddingCache::open(&path);
        let second = cache.embed_batch(&embedder, &input).unwrap();
        assert_eq!(embedder.calls(), 0);
        assert_eq!(first, second);
    }

    #[test]
    fn test_fingerprint_persists_with_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("embeddings.bin.gz");

        let embedder = HashingEmbedder::new(16);
        let mut cache = EmbeddingCache::open(&path);
        cache.embed_batch(&embedder, &texts(&["Costco"])).unwrap();

        let reloaded = EmbeddingCache::open(&path);
        assert_eq!(reloaded.fingerprint(), Some("hashing:16"));
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn test_provider_change_discards_stale_vectors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("embeddings.bin.gz");
        let input = texts(&["Bluebird Florist", "Costco"]);

        {
            let wide = HashingEmbedder::new(256);
            let mut cache = EmbeddingCache::open(&path);
            cache.embed_batch(&wide, &input).unwrap();
        }

        let narrow = HashingEmbedder::new(64);
        let mut cache = EmbeddingCache::open(&path);
        let vectors = cache.embed_batch(&narrow, &input).unwrap();

        assert_eq!(narrow.calls(), 1);
        assert!(vectors.iter().all(|v| v.len() == 64));
        assert_eq!(cache.fingerprint(), Some("hashing:64"));
        assert_eq!(cache.len(), 2);

        // The rewritten file belongs to the new provider
        let reloaded = EmbeddingCache::open(&path);
        assert_eq!(reloaded.fingerprint(), Some("hashing:64"));
        assert!(reloaded.get("Costco").is_some_and(|v| v.len() == 64));
    }

    #[test]
    fn test_bind_keeps_entries_for_same_or_unknown_fingerprint() {
        let mut cache = EmbeddingCache::in_memory();
        cache.insert("beta", vec![1.0; 4]);

        assert!(!cache.bind("hashing:4"));
        assert!(!cache.bind("hashing:4"));
        assert_eq!(cache.len(), 1);

        assert!(cache.bind("ollama:nomic-embed-text"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_uncached_dedups_in_first_seen_order() {
        let mut cache = EmbeddingCache::in_memory();
        cache.insert("beta", vec![1.0]);

        let pending = cache.uncached(&texts(&["Gamma", "beta", "alpha", "gamma"]));
        assert_eq!(pending, texts(&["Gamma", "alpha"]));
    }

    #[test]
    fn test_insert_computed_rejects_wrong_count() {
        let mut cache = EmbeddingCache::in_memory();
        assert!(cache
            .insert_computed(&texts(&["a", "b"]), vec![vec![1.0]])
            .is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_provider_error_propagates_from_batch() {
        let mut cache = EmbeddingCache::in_memory();
        assert!(cache.embed_batch(&NullEmbedder, &texts(&["x"])).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_empty_batch() {
        let embedder = HashingEmbedder::new(4);
        let mut cache = EmbeddingCache::in_memory();
        assert!(cache.embed_batch(&embedder, &[]).unwrap().is_empty());
        assert_eq!(embedder.calls(), 0);
    }

    #[test]
    fn test_clear_removes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("embeddings.bin.gz");
        let mut cache = EmbeddingCache::open(&path);
        cache.insert("x", vec![1.0]);
        cache.save().unwrap();
        assert!(path.exists());

        cache.clear().unwrap();
        assert!(cache.is_empty());
        assert!(!path.exists());
        // Clearing again is fine
        cache.clear().unwrap();
    }
}
