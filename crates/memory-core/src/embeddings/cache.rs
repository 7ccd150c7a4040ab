//! Embedding cache (C7, §4.7, §6)
//!
//! Keyed by memory id; each entry also stores the content hash and model
//! name it was computed from, so a stale entry (content edited, or model
//! changed) is detected and recomputed without needing to re-embed
//! everything on every read.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::embeddings::provider::EmbeddingProvider;
use crate::error::Result;

/// Texts longer than this are truncated before embedding, to bound provider
/// cost (§4.7).
pub const MAX_EMBEDDING_CHARS: usize = 6000;

const CACHE_VERSION: u32 = 1;

/// Truncate `text` to at most [`MAX_EMBEDDING_CHARS`] characters, cutting at
/// the last whitespace before the limit and appending `"..."` (§4.7). A
/// shorter text is returned unchanged.
pub fn truncate_for_embedding(text: &str) -> String {
    if text.chars().count() <= MAX_EMBEDDING_CHARS {
        return text.to_string();
    }
    let prefix: String = text.chars().take(MAX_EMBEDDING_CHARS).collect();
    let cut = prefix.rfind(char::is_whitespace).unwrap_or(prefix.len());
    format!("{}...", &prefix[..cut])
}

/// Lowercase hex of the first 16 bytes of the SHA-256 digest of the
/// normalised body (§4.7).
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    digest[..16].iter().map(|b| format!("{b:02x}")).collect()
}

/// Unit-normalise a vector in place; a zero vector is left unchanged.
fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector {
            *v /= norm;
        }
    }
}

/// One cached embedding and the fingerprint it was computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub embedding: Vec<f32>,
    pub hash: String,
    pub timestamp: DateTime<Utc>,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    memories: HashMap<String, CacheEntry>,
}

impl Default for CacheFile {
    fn default() -> Self {
        CacheFile { version: CACHE_VERSION, memories: HashMap::new() }
    }
}

/// A persisted, memory-id-keyed embedding cache for one scope
/// (`<root>/embeddings.json`, §6).
#[derive(Debug, Clone, Default)]
pub struct EmbeddingCache {
    entries: HashMap<String, CacheEntry>,
}

impl EmbeddingCache {
    fn path(root: &Path) -> PathBuf {
        root.join("embeddings.json")
    }

    /// Load the cache for a scope root. A missing or corrupt file loads as
    /// empty: the cache file being unreadable is recoverable (§4.7).
    pub fn load(root: &Path) -> Self {
        let path = Self::path(root);
        let Ok(raw) = std::fs::read_to_string(&path) else {
            return Self::default();
        };
        match serde_json::from_str::<CacheFile>(&raw) {
            Ok(file) => EmbeddingCache { entries: file.memories },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "corrupt embedding cache, starting empty");
                Self::default()
            }
        }
    }

    /// Atomically persist the cache. Per §4.7, the cache file being
    /// unwritable is fatal to the operation that chose to persist, so this
    /// propagates.
    pub fn save(&self, root: &Path) -> Result<()> {
        let file = CacheFile {
            version: CACHE_VERSION,
            memories: self.entries.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        crate::fsutil::atomic_write(&Self::path(root), json.as_bytes())?;
        Ok(())
    }

    /// Get the embedding for `memory_id`/`content`, computing it via
    /// `provider` (and caching the result) if the cached entry is missing or
    /// stale (content hash or model name changed).
    pub fn get(
        &mut self,
        memory_id: &str,
        content: &str,
        model: &str,
        provider: &dyn EmbeddingProvider,
    ) -> Result<Vec<f32>> {
        let hash = content_hash(content);
        if let Some(entry) = self.entries.get(memory_id) {
            if entry.hash == hash && entry.model == model {
                return Ok(entry.embedding.clone());
            }
        }

        let mut vector = provider.embed(&truncate_for_embedding(content))?;
        normalize(&mut vector);
        self.entries.insert(
            memory_id.to_string(),
            CacheEntry {
                embedding: vector.clone(),
                hash,
                timestamp: Utc::now(),
                model: model.to_string(),
            },
        );
        Ok(vector)
    }

    /// Embed every `(memory_id, content)` pair whose cached entry is missing
    /// or stale, calling `on_progress(done, total)` after each one, and
    /// persisting once at the end regardless of how many were recomputed.
    pub fn batch(
        &mut self,
        memories: &[(String, String)],
        model: &str,
        provider: &dyn EmbeddingProvider,
        root: &Path,
        mut on_progress: impl FnMut(usize, usize),
    ) -> Result<Vec<Vec<f32>>> {
        let total = memories.len();
        let mut results = Vec::with_capacity(total);
        for (done, (id, content)) in memories.iter().enumerate() {
            results.push(self.get(id, content, model, provider)?);
            on_progress(done + 1, total);
        }
        self.save(root)?;
        Ok(results)
    }

    /// Remove the cached entry for a memory id (used by delete cleanup).
    pub fn remove(&mut self, memory_id: &str) -> bool {
        self.entries.remove(memory_id).is_some()
    }

    /// The embedding for `memory_id`, if cached, regardless of staleness.
    pub fn embedding_for(&self, memory_id: &str) -> Option<&[f32]> {
        self.entries.get(memory_id).map(|e| e.embedding.as_slice())
    }

    /// All `(id, embedding)` pairs currently cached, for similarity search.
    pub fn all(&self) -> impl Iterator<Item = (&str, &[f32])> {
        self.entries.iter().map(|(id, e)| (id.as_str(), e.embedding.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
