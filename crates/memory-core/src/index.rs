//! Index store (C3)
//!
//! A per-scope JSON summary cache. Always a hint: readers must recheck the
//! memory file itself before trusting presence (§4.3).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::IndexEntry;

const INDEX_VERSION: &str = "1.0.0";

/// On-disk shape of `index.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexFile {
    version: String,
    #[serde(rename = "lastUpdated")]
    last_updated: DateTime<Utc>,
    entries: Vec<IndexEntry>,
}

/// In-memory view of a scope's index, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct Index {
    entries: HashMap<String, IndexEntry>,
}

impl Index {
    fn path(root: &Path) -> PathBuf {
        root.join("index.json")
    }

    /// Load the index for a scope root. A missing or corrupt file loads as
    /// empty — the index is a derivable cache, never a source of truth.
    pub fn load(root: &Path) -> Self {
        let path = Self::path(root);
        let Ok(raw) = std::fs::read_to_string(&path) else {
            return Self::default();
        };
        match serde_json::from_str::<IndexFile>(&raw) {
            Ok(file) => {
                let entries = file
                    .entries
                    .into_iter()
                    .map(|e| (e.id.clone(), e))
                    .collect();
                Index { entries }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "corrupt index, starting empty");
                Self::default()
            }
        }
    }

    /// Atomically replace the on-disk index with the current contents.
    pub fn save(&self, root: &Path) -> Result<()> {
        let file = IndexFile {
            version: INDEX_VERSION.to_string(),
            last_updated: Utc::now(),
            entries: self.entries.values().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        crate::fsutil::atomic_write(&Self::path(root), json.as_bytes())?;
        Ok(())
    }

    /// Insert or replace the entry with this id.
    pub fn add(&mut self, entry: IndexEntry) {
        self.entries.insert(entry.id.clone(), entry);
    }

    /// Remove the entry with this id. Returns whether one was present.
    pub fn remove(&mut self, id: &str) -> bool {
        self.entries.remove(id).is_some()
    }

    /// Look up an entry by id.
    pub fn find(&self, id: &str) -> Option<&IndexEntry> {
        self.entries.get(id)
    }

    /// All entries, in no particular order.
    pub fn all(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    /// All known ids, for slug-collision resolution.
    pub fn ids(&self) -> std::collections::HashSet<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
