//! Session state (C13)
//!
//! Per-session record of which memories have already been surfaced, so the
//! injector (C11) doesn't repeat itself within one coding session.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::MemoryType;

/// Dedup key: the same underlying memory can be surfaced once per type
/// class (§4.13).
fn shown_key(memory_id: &str, memory_type: MemoryType) -> String {
    format!("{memory_id}:{memory_type}")
}

/// In-memory record of what has already been shown during one session.
///
/// A hook invocation is a short-lived process (§5), so dedup across the
/// calls that make up one Claude Code session only works if this is
/// persisted between them — see [`SessionState::load`]/[`SessionState::save`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    shown: HashSet<String>,
    started_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new() -> Self {
        SessionState {
            shown: HashSet::new(),
            started_at: Utc::now(),
        }
    }

    /// Path a session's state file lives at, given the directory sessions
    /// are kept under (the global scope root) and the host's session id.
    pub fn path_for(sessions_dir: &Path, session_id: &str) -> std::path::PathBuf {
        sessions_dir.join(format!("{session_id}.json"))
    }

    /// Load session state from disk, or start fresh if absent or corrupt.
    pub fn load(path: &Path) -> Self {
        let Ok(raw) = std::fs::read_to_string(path) else {
            return Self::new();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "corrupt session file, starting fresh");
            Self::new()
        })
    }

    /// Persist session state, creating the parent directory if needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(crate::error::MemoryError::Filesystem)?;
        }
        let raw = serde_json::to_vec_pretty(self).map_err(|e| crate::error::MemoryError::Parse(e.to_string()))?;
        crate::fsutil::atomic_write(path, &raw)
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Record that `memory_id` was surfaced as `memory_type`.
    pub fn record(&mut self, memory_id: &str, memory_type: MemoryType) {
        self.shown.insert(shown_key(memory_id, memory_type));
    }

    /// Whether `memory_id` has already been surfaced as `memory_type`.
    pub fn has(&self, memory_id: &str, memory_type: MemoryType) -> bool {
        self.shown.contains(&shown_key(memory_id, memory_type))
    }

    /// Reset all dedup state (used when a session is explicitly cleared).
    pub fn clear(&mut self) {
        self.shown.clear();
    }

    pub fn len(&self) -> usize {
        self.shown.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shown.is_empty()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_then_has_is_true() {
        let mut state = SessionState::new();
        assert!(!state.has("m1", MemoryType::Gotcha));
        state.record("m1", MemoryType::Gotcha);
        assert!(state.has("m1", MemoryType::Gotcha));
    }

    #[test]
    fn dedup_key_is_per_type_not_just_per_id() {
        let mut state = SessionState::new();
        state.record("m1", MemoryType::Gotcha);
        assert!(!state.has("m1", MemoryType::Decision));
    }

    #[test]
    fn clear_resets_shown_set() {
        let mut state = SessionState::new();
        state.record("m1", MemoryType::Gotcha);
        state.clear();
        assert!(!state.has("m1", MemoryType::Gotcha));
        assert!(state.is_empty());
    }
}
