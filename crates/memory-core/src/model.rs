//! Core data model: memory types, scopes, index entries, and graph edges.
//!
//! Mirrors spec.md §3. Kept deliberately flat — the graph owns only
//! `{id, label}` pairs and the index owns only summaries, never references
//! into `Memory` itself, so nothing here forms a reference cycle.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The six recognised memory types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    Decision,
    Learning,
    Artifact,
    Gotcha,
    Breadcrumb,
    Hub,
}

impl MemoryType {
    /// All variants, in priority order used by the injector (lower index =
    /// surfaced first).
    pub const INJECTION_PRIORITY: [MemoryType; 3] =
        [MemoryType::Gotcha, MemoryType::Decision, MemoryType::Learning];

    /// The slug prefix for this type (§4.2).
    pub fn prefix(self) -> &'static str {
        match self {
            MemoryType::Decision => "decision",
            MemoryType::Learning => "learning",
            MemoryType::Artifact => "artifact",
            MemoryType::Gotcha => "gotcha",
            MemoryType::Breadcrumb => "breadcrumb",
            MemoryType::Hub => "hub",
        }
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

impl std::str::FromStr for MemoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "decision" => Ok(MemoryType::Decision),
            "learning" => Ok(MemoryType::Learning),
            "artifact" => Ok(MemoryType::Artifact),
            "gotcha" => Ok(MemoryType::Gotcha),
            "breadcrumb" => Ok(MemoryType::Breadcrumb),
            "hub" => Ok(MemoryType::Hub),
            other => Err(format!("unknown memory type: {other}")),
        }
    }
}

/// Gotcha severity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    /// Weight used by the relevance scorer (§4.10). `None` maps to 0.5
    /// there, not here — this only covers an explicit severity.
    pub fn weight(self) -> f32 {
        match self {
            Severity::Critical => 1.0,
            Severity::High => 0.8,
            Severity::Medium => 0.5,
            Severity::Low => 0.3,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "critical" => Ok(Severity::Critical),
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// A storage tier (§4.5).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Highest priority: shared, centrally administered.
    Enterprise,
    /// Per-project, not meant to be committed (gitignored).
    Local,
    /// Per-project, shared with the team via version control.
    Project,
    /// Lowest priority: user-wide, shared across every project.
    Global,
}

impl Scope {
    /// Priority order used by [`crate::scope::ScopeResolver::merge`]:
    /// enterprise shadows local shadows project shadows global.
    pub fn priority(self) -> u8 {
        match self {
            Scope::Enterprise => 0,
            Scope::Local => 1,
            Scope::Project => 2,
            Scope::Global => 3,
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Scope::Enterprise => "enterprise",
            Scope::Local => "local",
            Scope::Project => "project",
            Scope::Global => "global",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "enterprise" => Ok(Scope::Enterprise),
            "local" => Ok(Scope::Local),
            "project" => Ok(Scope::Project),
            "global" => Ok(Scope::Global),
            other => Err(format!("unknown scope: {other}")),
        }
    }
}

/// A single structured note.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Memory {
    pub id: String,
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    pub title: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub links: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip)]
    pub body: String,
    #[serde(skip)]
    pub scope: Option<Scope>,
}

impl Memory {
    /// File-association tags (`file:`, `pattern:`, `dir:` prefixes).
    pub fn file_patterns(&self) -> Vec<String> {
        crate::pattern::extract_file_patterns(&self.tags)
    }
}

/// A summary of a memory for fast listing, kept in the per-scope index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    pub title: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub scope: Scope,
    pub relative_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
}

impl From<&Memory> for IndexEntry {
    fn from(m: &Memory) -> Self {
        IndexEntry {
            id: m.id.clone(),
            memory_type: m.memory_type,
            title: m.title.clone(),
            tags: m.tags.clone(),
            created: m.created,
            updated: m.updated,
            scope: m.scope.unwrap_or(Scope::Global),
            relative_path: format!("{}.md", m.id),
            severity: m.severity,
        }
    }
}

/// A single labelled graph edge as stored on disk: `id -> [{target, label}]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Edge {
    pub target: String,
    pub label: String,
}

/// Direction filter for [`crate::graph::GraphStore::edges`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Out,
    In,
    Both,
}
