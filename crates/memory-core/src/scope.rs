//! Scope resolver (C5)
//!
//! Maps a requested scope to a storage root, enumerates the scopes readable
//! from a given working directory, and merges their indices with
//! higher-priority tiers shadowing lower ones on id collision.

use std::path::{Path, PathBuf};

use crate::error::{MemoryError, Result};
use crate::index::Index;
use crate::model::{IndexEntry, Scope};

/// Inputs needed to resolve a scope to a storage path (§4.5).
#[derive(Debug, Clone)]
pub struct ScopeResolver {
    pub cwd: PathBuf,
    pub global_root: PathBuf,
    pub enterprise_enabled: bool,
    pub enterprise_path: Option<PathBuf>,
    /// Scope to use when the caller doesn't request one explicitly.
    pub configured_default: Option<Scope>,
}

impl ScopeResolver {
    /// Walk up from `cwd` looking for a `.git` directory; returns the
    /// repository root if found.
    pub fn git_root(&self) -> Option<PathBuf> {
        let mut dir = self.cwd.as_path();
        loop {
            if dir.join(".git").exists() {
                return Some(dir.to_path_buf());
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => return None,
            }
        }
    }

    fn project_root(&self) -> PathBuf {
        self.git_root().unwrap_or_else(|| self.cwd.clone())
    }

    /// The default scope when none is requested: config default, else
    /// `project` inside a git repo, else `global`.
    pub fn default_scope(&self) -> Scope {
        if let Some(configured) = self.configured_default {
            return configured;
        }
        if self.git_root().is_some() {
            Scope::Project
        } else {
            Scope::Global
        }
    }

    /// Resolve a scope (or the default, if `None`) to its storage root.
    pub fn resolve(&self, requested: Option<Scope>) -> Result<PathBuf> {
        let scope = requested.unwrap_or_else(|| self.default_scope());
        match scope {
            Scope::Enterprise => {
                if !self.enterprise_enabled {
                    return Err(MemoryError::ScopeDisabled("enterprise".to_string()));
                }
                let path = self.enterprise_path.clone().ok_or_else(|| {
                    MemoryError::ScopeUnavailable(
                        "enterprise".to_string(),
                        "no path configured".to_string(),
                    )
                })?;
                if !is_readable_writable_dir(&path) {
                    return Err(MemoryError::ScopeUnavailable(
                        "enterprise".to_string(),
                        format!("{} is not a readable/writable directory", path.display()),
                    ));
                }
                Ok(path)
            }
            Scope::Local => Ok(self.project_root().join(".claude").join("memory").join("local")),
            Scope::Project => Ok(self.project_root().join(".claude").join("memory")),
            Scope::Global => Ok(self.global_root.clone()),
        }
    }

    /// Scopes readable from `cwd`, in shadowing priority order, omitting
    /// enterprise when it is unavailable.
    pub fn readable_scopes(&self) -> Vec<Scope> {
        let mut scopes = Vec::new();
        if self.enterprise_enabled
            && self
                .enterprise_path
                .as_ref()
                .is_some_and(|p| is_readable_writable_dir(p))
        {
            scopes.push(Scope::Enterprise);
        }
        scopes.push(Scope::Local);
        scopes.push(Scope::Project);
        scopes.push(Scope::Global);
        scopes
    }

    /// Load and merge the index entries of every readable scope.
    /// Higher-priority tiers shadow lower ones on id collision (spec.md §9,
    /// open question: "pick higher-priority-wins and document it").
    pub fn merge(&self) -> Vec<IndexEntry> {
        let mut merged: std::collections::HashMap<String, IndexEntry> = std::collections::HashMap::new();
        // Iterate lowest priority first so higher-priority inserts overwrite.
        let mut scopes = self.readable_scopes();
        scopes.sort_by_key(|s| std::cmp::Reverse(s.priority()));
        for scope in scopes {
            let Ok(root) = self.resolve(Some(scope)) else {
                continue;
            };
            let index = Index::load(&root);
            for entry in index.all() {
                let mut entry = entry.clone();
                entry.scope = scope;
                merged.insert(entry.id.clone(), entry);
            }
        }
        merged.into_values().collect()
    }
}

fn is_readable_writable_dir(path: &Path) -> bool {
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    if !meta.is_dir() {
        return false;
    }
    // Best-effort: attempt to create a throwaway probe file.
    let probe = path.join(format!(".probe-{}", std::process::id()));
    let writable = std::fs::write(&probe, b"").is_ok();
    let _ = std::fs::remove_file(&probe);
    writable
}
