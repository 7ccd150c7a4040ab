//! Memory CRUD (C6)
//!
//! Ties together the frontmatter codec, slug generator, index, graph, and
//! scope resolver into the write/read/list/delete operations a caller
//! actually invokes.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::{MemoryError, Result};
use crate::frontmatter::{self, Header};
use crate::graph::Graph;
use crate::index::Index;
use crate::model::{IndexEntry, Memory, MemoryType, Scope};
use crate::slug;

/// Fields accepted by [`Store::write`]. `id` is `Some` for an update to an
/// existing memory, `None` to create a new one.
#[derive(Debug, Clone)]
pub struct WriteRequest {
    pub id: Option<String>,
    pub memory_type: MemoryType,
    pub title: String,
    pub body: String,
    pub tags: std::collections::BTreeSet<String>,
    pub severity: Option<crate::model::Severity>,
    pub links: std::collections::BTreeSet<String>,
    pub source: Option<String>,
}

/// Sort key for [`Store::list`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    Created,
    Updated,
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Filter + paging parameters for [`Store::list`].
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub memory_type: Option<MemoryType>,
    pub tags: Vec<String>,
    pub scope: Option<Scope>,
    pub sort_by: Option<SortBy>,
    pub sort_order: Option<SortOrder>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// The result of [`Store::list`]: the page plus the total before paging.
#[derive(Debug, Clone)]
pub struct ListResult {
    pub entries: Vec<IndexEntry>,
    pub total: usize,
}

/// One failed side-effect from a partially-successful [`Store::delete`].
#[derive(Debug, Clone)]
pub struct DeleteError {
    pub step: &'static str,
    pub message: String,
}

/// The outcome of [`Store::delete`]: any step that failed is reported, but
/// every step is still attempted (§4.6).
#[derive(Debug, Clone, Default)]
pub struct DeleteReport {
    pub errors: Vec<DeleteError>,
}

impl DeleteReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// CRUD operations over a single resolved scope root.
pub struct Store {
    root: PathBuf,
    scope: Scope,
}

impl Store {
    pub fn new(root: PathBuf, scope: Scope) -> Self {
        Store { root, scope }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn memory_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.md"))
    }

    /// Write a new or existing memory.
    pub fn write(&self, req: WriteRequest, git_root: Option<&Path>) -> Result<Memory> {
        if req.title.trim().is_empty() {
            return Err(MemoryError::Validation("title must not be empty".to_string()));
        }

        let mut index = Index::load(&self.root);
        let now = Utc::now();

        let (id, created) = match &req.id {
            Some(existing_id) => {
                let created = index
                    .find(existing_id)
                    .map(|e| e.created)
                    .unwrap_or(now);
                (existing_id.clone(), created)
            }
            None => {
                let candidate = slug::generate(&req.title, Some(req.memory_type));
                let id = slug::resolve_collision(&candidate, &index.ids());
                (id, now)
            }
        };

        let memory = Memory {
            id: id.clone(),
            memory_type: req.memory_type,
            title: req.title,
            tags: req.tags,
            severity: req.severity,
            created,
            updated: now,
            links: req.links,
            source: req.source,
            body: req.body,
            scope: Some(self.scope),
        };

        let header = Header::from(&memory);
        let document = frontmatter::emit(&header, &memory.body)?;
        crate::fsutil::atomic_write(&self.memory_path(&id), document.as_bytes())?;

        index.add(IndexEntry::from(&memory));
        index.save(&self.root)?;

        if self.scope == Scope::Local {
            if let Some(git_root) = git_root {
                ensure_gitignore_entry(git_root, ".claude/memory/local/")?;
            }
        }

        Ok(memory)
    }

    /// Read a memory by id: check the index for its relative path, falling
    /// back to probing `<root>/<id>.md` directly if the index doesn't know
    /// it (the index is a hint, never authoritative, §4.3).
    pub fn read(&self, id: &str) -> Result<Memory> {
        let index = Index::load(&self.root);
        let path = match index.find(id) {
            Some(entry) => self.root.join(&entry.relative_path),
            None => self.memory_path(id),
        };

        let content = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MemoryError::NotFound(id.to_string())
            } else {
                MemoryError::Filesystem(e)
            }
        })?;

        let (header, body) = frontmatter::parse(&content, &path)?;
        Ok(header.into_memory(id.to_string(), body, self.scope))
    }

    /// List entries from this scope's index, filtered, sorted, and paged.
    /// Returns the total count before paging is applied.
    pub fn list(&self, filter: &ListFilter) -> ListResult {
        let index = Index::load(&self.root);
        let mut entries: Vec<IndexEntry> = index
            .all()
            .filter(|e| filter.memory_type.is_none_or(|t| e.memory_type == t))
            .filter(|e| filter.tags.is_empty() || filter.tags.iter().any(|t| e.tags.contains(t)))
            .filter(|e| filter.scope.is_none_or(|s| e.scope == s))
            .cloned()
            .collect();

        let sort_by = filter.sort_by.unwrap_or(SortBy::Updated);
        let order = filter.sort_order.unwrap_or(SortOrder::Descending);
        entries.sort_by(|a, b| {
            let ordering = match sort_by {
                SortBy::Created => a.created.cmp(&b.created),
                SortBy::Updated => a.updated.cmp(&b.updated),
                SortBy::Title => a.title.cmp(&b.title),
            };
            match order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            }
        });

        let total = entries.len();
        let offset = filter.offset.unwrap_or(0);
        let page: Vec<IndexEntry> = match filter.limit {
            Some(limit) => entries.into_iter().skip(offset).take(limit).collect(),
            None => entries.into_iter().skip(offset).collect(),
        };

        ListResult { entries: page, total }
    }

    /// Delete a memory: remove its file, index entry, graph edges, and
    /// embedding cache entry. Every step is attempted regardless of earlier
    /// failures; failures are collected rather than short-circuiting.
    pub fn delete(&self, id: &str) -> DeleteReport {
        let mut report = DeleteReport::default();

        let path = self.memory_path(id);
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                report.errors.push(DeleteError {
                    step: "file",
                    message: MemoryError::NotFound(id.to_string()).to_string(),
                });
            }
            Err(e) => report.errors.push(DeleteError {
                step: "file",
                message: e.to_string(),
            }),
        }

        let mut index = Index::load(&self.root);
        let had_entry = index.remove(id);
        if let Err(e) = index.save(&self.root) {
            report.errors.push(DeleteError { step: "index", message: e.to_string() });
        }
        if !had_entry {
            report.errors.push(DeleteError {
                step: "index",
                message: format!("no index entry for {id}"),
            });
        }

        let mut graph = Graph::load(&self.root);
        graph.cascade_delete(id);
        if let Err(e) = graph.save(&self.root) {
            report.errors.push(DeleteError { step: "graph", message: e.to_string() });
        }

        let mut cache = crate::embeddings::EmbeddingCache::load(&self.root);
        cache.remove(id);
        if let Err(e) = cache.save(&self.root) {
            report.errors.push(DeleteError { step: "embedding_cache", message: e.to_string() });
        }

        report
    }

    /// All ids currently known to this scope's index (used for slug
    /// collision resolution and graph endpoint validation).
    pub fn known_ids(&self) -> HashSet<String> {
        Index::load(&self.root).ids()
    }
}

fn ensure_gitignore_entry(git_root: &Path, entry: &str) -> Result<()> {
    let path = git_root.join(".gitignore");
    let existing = std::fs::read_to_string(&path).unwrap_or_default();
    if existing.lines().any(|l| l.trim() == entry) {
        return Ok(());
    }
    let mut updated = existing;
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(entry);
    updated.push('\n');
    std::fs::write(&path, updated)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn request(title: &str) -> WriteRequest {
        WriteRequest {
            id: None,
            memory_type: MemoryType::Decision,
            title: title.to_string(),
            body: "Body text.".to_string(),
            tags: Default::default(),
            severity: None,
            links: Default::default(),
            source: None,
        }
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path().to_path_buf(), Scope::Project);
        let written = store.write(request("Use OAuth2 with PKCE"), None).unwrap();
        let read = store.read(&written.id).unwrap();
        assert_eq!(read.title, "Use OAuth2 with PKCE");
        assert_eq!(read.body, "Body text.\n");
    }

    #[test]
    fn write_generates_collision_resolved_slug() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path().to_path_buf(), Scope::Project);
        let first = store.write(request("Same Title"), None).unwrap();
        let second = store.write(request("Same Title"), None).unwrap();
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn update_preserves_created_bumps_updated() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path().to_path_buf(), Scope::Project);
        let first = store.write(request("Title"), None).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(5));
        let mut update = request("Title");
        update.id = Some(first.id.clone());
        update.body = "Updated body.".to_string();
        let second = store.write(update, None).unwrap();

        assert_eq!(second.created, first.created);
        assert!(second.updated > first.updated);
    }

    #[test]
    fn read_missing_id_is_not_found() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path().to_path_buf(), Scope::Project);
        let err = store.read("nonexistent").unwrap_err();
        assert!(matches!(err, MemoryError::NotFound(_)));
    }

    #[test]
    fn read_falls_back_to_disk_probe_when_index_missing_entry() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path().to_path_buf(), Scope::Project);
        let written = store.write(request("Orphan"), None).unwrap();

        // Simulate an index that lost track of a file that still exists.
        let mut index = Index::load(dir.path());
        index.remove(&written.id);
        index.save(dir.path()).unwrap();

        let read = store.read(&written.id).unwrap();
        assert_eq!(read.id, written.id);
    }

    #[test]
    fn list_filters_sorts_and_pages() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path().to_path_buf(), Scope::Project);
        store.write(request("Alpha"), None).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        store.write(request("Beta"), None).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        store.write(request("Gamma"), None).unwrap();

        let filter = ListFilter {
            sort_by: Some(SortBy::Title),
            sort_order: Some(SortOrder::Ascending),
            limit: Some(2),
            ..Default::default()
        };
        let result = store.list(&filter);
        assert_eq!(result.total, 3);
        assert_eq!(result.entries.len(), 2);
        assert_eq!(result.entries[0].title, "Alpha");
        assert_eq!(result.entries[1].title, "Beta");
    }

    #[test]
    fn delete_removes_file_index_and_graph_entry() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path().to_path_buf(), Scope::Project);
        let a = store.write(request("A"), None).unwrap();
        let b = store.write(request("B"), None).unwrap();

        let mut graph = Graph::load(dir.path());
        let known = store.known_ids();
        graph.link(&a.id, &b.id, "relates-to", None, &known).unwrap();
        graph.save(dir.path()).unwrap();

        let report = store.delete(&a.id);
        assert!(report.is_ok());
        assert!(store.read(&a.id).is_err());

        let graph_after = Graph::load(dir.path());
        assert!(graph_after
            .edges(&b.id, crate::model::Direction::Both)
            .iter()
            .all(|e| e.target != a.id));
    }

    #[test]
    fn delete_missing_file_reports_error_but_still_cleans_up() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path().to_path_buf(), Scope::Project);
        let report = store.delete("never-existed");
        assert!(!report.is_ok());
    }

    #[test]
    fn local_scope_write_adds_gitignore_entry() {
        let git_root = tempdir().unwrap();
        std::fs::create_dir(git_root.path().join(".git")).unwrap();
        let scope_root = git_root.path().join(".claude").join("memory").join("local");
        std::fs::create_dir_all(&scope_root).unwrap();

        let store = Store::new(scope_root, Scope::Local);
        store.write(request("Local Only"), Some(git_root.path())).unwrap();

        let gitignore = std::fs::read_to_string(git_root.path().join(".gitignore")).unwrap();
        assert!(gitignore.contains(".claude/memory/local/"));
    }

    #[test]
    fn gitignore_entry_not_duplicated_on_second_write() {
        let git_root = tempdir().unwrap();
        std::fs::create_dir(git_root.path().join(".git")).unwrap();
        let scope_root = git_root.path().join(".claude").join("memory").join("local");
        std::fs::create_dir_all(&scope_root).unwrap();

        let store = Store::new(scope_root, Scope::Local);
        store.write(request("One"), Some(git_root.path())).unwrap();
        store.write(request("Two"), Some(git_root.path())).unwrap();

        let gitignore = std::fs::read_to_string(git_root.path().join(".gitignore")).unwrap();
        assert_eq!(gitignore.matches(".claude/memory/local/").count(), 1);
    }
}
