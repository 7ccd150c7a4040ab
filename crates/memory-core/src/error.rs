//! Error taxonomy
//!
//! One enum covering every failure mode a store operation can produce,
//! matching the taxonomy in the specification: validation, protection,
//! timeout, embedding-provider, parse, filesystem, configuration, internal.
//! Downstream layers (CLI exit codes, hook allow/warn/block) map from this
//! enum rather than re-deriving their own error classification.

use std::path::PathBuf;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, MemoryError>;

/// Everything that can go wrong in the memory store.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// A memory file or config failed schema validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// A requested memory id does not exist in any readable scope.
    #[error("memory not found: {0}")]
    NotFound(String),

    /// Frontmatter delimiters (`---`) are missing or malformed.
    #[error("malformed frontmatter header in {path}")]
    MalformedHeader {
        /// Path of the offending file.
        path: PathBuf,
    },

    /// Frontmatter parsed as YAML but is missing required keys or has the
    /// wrong type for one of them.
    #[error("invalid frontmatter schema: {0}")]
    InvalidSchema(String),

    /// Both endpoints of a graph edge must already be known ids.
    #[error("graph endpoint not found: {0}")]
    GraphNotFound(String),

    /// `link(a, a, ...)` was attempted.
    #[error("a memory cannot link to itself: {0}")]
    SelfLink(String),

    /// The forward edge `(a, b, label)` already exists.
    #[error("edge already exists: {source} -> {target} ({label})")]
    DuplicateEdge {
        /// Source memory id.
        source: String,
        /// Target memory id.
        target: String,
        /// Edge label.
        label: String,
    },

    /// A requested scope is not enabled in configuration.
    #[error("scope '{0}' is disabled")]
    ScopeDisabled(String),

    /// A requested scope is enabled but its storage path is missing or not
    /// readable/writable.
    #[error("scope '{0}' is unavailable: {1}")]
    ScopeUnavailable(String, String),

    /// Cosine similarity was asked to compare vectors of different length.
    #[error("vector shape mismatch: {a} vs {b}")]
    ShapeMismatch {
        /// Length of the first vector.
        a: usize,
        /// Length of the second vector.
        b: usize,
    },

    /// Cosine similarity was asked to compare a zero-length vector.
    #[error("empty vector supplied to similarity computation")]
    Empty,

    /// A suspension point (embedding call, subprocess wait) exceeded its
    /// configured timeout. Non-fatal: callers degrade gracefully.
    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The embedding provider returned an error or is unreachable.
    #[error("embedding provider error: {0}")]
    EmbeddingProvider(String),

    /// JSON or YAML parsing failed outside of frontmatter (index/graph/cache
    /// files, config).
    #[error("parse error: {0}")]
    Parse(String),

    /// Filesystem I/O failure.
    #[error("filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),

    /// Configuration is present but malformed in a way that the loader could
    /// not fall back from on its own (reserved for future use — today the
    /// config loader always falls back to defaults instead of raising this).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Anything unexpected. The host must never be blocked by a bug here.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for MemoryError {
    fn from(e: serde_json::Error) -> Self {
        MemoryError::Parse(e.to_string())
    }
}

impl From<serde_yaml::Error> for MemoryError {
    fn from(e: serde_yaml::Error) -> Self {
        MemoryError::Parse(e.to_string())
    }
}

impl MemoryError {
    /// The `§7` propagation class this error belongs to, used by the CLI to
    /// pick an exit code and by the hook dispatcher to pick a decision.
    pub fn class(&self) -> ErrorClass {
        match self {
            MemoryError::Validation(_)
            | MemoryError::MalformedHeader { .. }
            | MemoryError::InvalidSchema(_)
            | MemoryError::SelfLink(_)
            | MemoryError::DuplicateEdge { .. }
            | MemoryError::GraphNotFound(_)
            | MemoryError::ShapeMismatch { .. }
            | MemoryError::Empty
            | MemoryError::Parse(_) => ErrorClass::Block,

            MemoryError::ScopeDisabled(_)
            | MemoryError::ScopeUnavailable(_, _)
            | MemoryError::Configuration(_) => ErrorClass::Warn,

            MemoryError::Timeout(_) | MemoryError::EmbeddingProvider(_) => ErrorClass::Allow,

            MemoryError::NotFound(_) | MemoryError::Filesystem(_) => ErrorClass::Warn,

            MemoryError::Internal(_) => ErrorClass::Allow,
        }
    }
}

/// The propagation class assigned to an error (see spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Surfaces as `Allow`, possibly with degraded context. Never blocks the
    /// host.
    Allow,
    /// Surfaces as `Warn` (CLI exit code 1).
    Warn,
    /// Surfaces as `Block` (CLI exit code 2).
    Block,
}
