//! Integration tests for the "scope isolation" testable property (spec.md
//! §8): a `local` memory is invisible outside its own tree, visible within
//! the same project via `merge()`, and isolated from a sibling project with
//! no shared `.git` ancestor.

use std::collections::BTreeSet;

use tempfile::tempdir;

use memory_core::scope::ScopeResolver;
use memory_core::store::{Store, WriteRequest};
use memory_core::{MemoryType, Scope};

fn write_req(title: &str) -> WriteRequest {
    WriteRequest {
        id: None,
        memory_type: MemoryType::Learning,
        title: title.to_string(),
        body: "Body.".to_string(),
        tags: BTreeSet::new(),
        severity: None,
        links: BTreeSet::new(),
        source: None,
    }
}

fn resolver(cwd: &std::path::Path, global: &std::path::Path) -> ScopeResolver {
    ScopeResolver {
        cwd: cwd.to_path_buf(),
        global_root: global.to_path_buf(),
        enterprise_enabled: false,
        enterprise_path: None,
        configured_default: None,
    }
}

/// A project root is anywhere with a `.git` directory.
fn init_git_repo(dir: &std::path::Path) {
    std::fs::create_dir_all(dir.join(".git")).unwrap();
}

#[test]
fn local_scope_is_isolated_from_project_and_global_lists() {
    let project = tempdir().unwrap();
    let global = tempdir().unwrap();
    init_git_repo(project.path());

    let resolver = resolver(project.path(), global.path());

    let local_root = resolver.resolve(Some(Scope::Local)).unwrap();
    let local_store = Store::new(local_root, Scope::Local);
    let written = local_store.write(write_req("Local-only scratch note"), None).unwrap();

    let project_root = resolver.resolve(Some(Scope::Project)).unwrap();
    let project_store = Store::new(project_root, Scope::Project);
    let project_listed = project_store.list(&Default::default());
    assert!(!project_listed.entries.iter().any(|e| e.id == written.id));

    let global_store = Store::new(global.path().to_path_buf(), Scope::Global);
    let global_listed = global_store.list(&Default::default());
    assert!(!global_listed.entries.iter().any(|e| e.id == written.id));
}

#[test]
fn merge_surfaces_local_alongside_project_within_same_tree() {
    let project = tempdir().unwrap();
    let global = tempdir().unwrap();
    init_git_repo(project.path());

    let resolver = resolver(project.path(), global.path());

    let local_root = resolver.resolve(Some(Scope::Local)).unwrap();
    let local_store = Store::new(local_root, Scope::Local);
    let local_written = local_store.write(write_req("Local note"), None).unwrap();

    let project_root = resolver.resolve(Some(Scope::Project)).unwrap();
    let project_store = Store::new(project_root, Scope::Project);
    let project_written = project_store.write(write_req("Project note"), None).unwrap();

    let merged = resolver.merge();
    let ids: BTreeSet<_> = merged.iter().map(|e| e.id.clone()).collect();
    assert!(ids.contains(&local_written.id));
    assert!(ids.contains(&project_written.id));
}

#[test]
fn sibling_directory_without_shared_git_root_does_not_see_project_memories() {
    let workspace = tempdir().unwrap();
    let project = workspace.path().join("project-a");
    let sibling = workspace.path().join("sibling-b");
    std::fs::create_dir_all(&project).unwrap();
    std::fs::create_dir_all(&sibling).unwrap();
    init_git_repo(&project);
    // `sibling` has no `.git` of its own and `workspace` (its parent) has
    // none either, so `project_root()` for it falls back to `sibling`
    // itself rather than discovering `project`'s repo.
    let global = tempdir().unwrap();

    let project_resolver = resolver(&project, global.path());
    let project_root = project_resolver.resolve(Some(Scope::Project)).unwrap();
    let project_store = Store::new(project_root, Scope::Project);
    let written = project_store.write(write_req("Project-a secret"), None).unwrap();

    let sibling_resolver = resolver(&sibling, global.path());
    assert!(sibling_resolver.git_root().is_none());
    let sibling_root = sibling_resolver.resolve(Some(Scope::Project)).unwrap();
    let sibling_store = Store::new(sibling_root, Scope::Project);
    let sibling_listed = sibling_store.list(&Default::default());
    assert!(!sibling_listed.entries.iter().any(|e| e.id == written.id));

    // Global is shared across both, since neither overrode the default root.
    let global_store = Store::new(global.path().to_path_buf(), Scope::Global);
    let global_written = global_store.write(write_req("Global note"), None).unwrap();
    let sibling_merged = sibling_resolver.merge();
    assert!(sibling_merged.iter().any(|e| e.id == global_written.id));
}

#[test]
fn default_scope_is_project_inside_git_and_global_outside() {
    let project = tempdir().unwrap();
    let global = tempdir().unwrap();
    init_git_repo(project.path());
    let in_git = resolver(project.path(), global.path());
    assert_eq!(in_git.default_scope(), Scope::Project);

    let outside = tempdir().unwrap();
    let no_git = resolver(outside.path(), global.path());
    assert_eq!(no_git.default_scope(), Scope::Global);
}
