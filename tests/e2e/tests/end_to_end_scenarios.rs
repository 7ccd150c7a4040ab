//! Integration tests for spec.md §8's numbered end-to-end scenarios.
//!
//! Unlike the unit tests inside each `memory-core`/`memory-cli` module,
//! these drive several components together the way the `memory-hook`
//! binary actually does: `ScopeResolver` -> `Store` -> `hooks::dispatch`.

use std::collections::BTreeSet;
use std::path::PathBuf;

use tempfile::tempdir;

use memory_cli::hooks::{self, Decision, DispatchContext, HookInput};
use memory_cli::hooks::event::ToolInput;
use memory_core::config::Config;
use memory_core::embeddings::{EmbeddingCache, EmbeddingProvider, StubEmbeddingProvider};
use memory_core::scope::ScopeResolver;
use memory_core::store::{Store, WriteRequest};
use memory_core::{MemoryType, Scope, Severity};

fn resolver(cwd: &std::path::Path, global: &std::path::Path) -> ScopeResolver {
    ScopeResolver {
        cwd: cwd.to_path_buf(),
        global_root: global.to_path_buf(),
        enterprise_enabled: false,
        enterprise_path: None,
        configured_default: None,
    }
}

fn decision_request(memory_type: MemoryType, title: &str) -> WriteRequest {
    WriteRequest {
        id: None,
        memory_type,
        title: title.to_string(),
        body: "Body text.".to_string(),
        tags: BTreeSet::new(),
        severity: None,
        links: BTreeSet::new(),
        source: None,
    }
}

/// Scenario 1: write-then-read, with the written entry visible in `list`.
#[test]
fn write_then_read_and_list() {
    let global = tempdir().unwrap();
    let store = Store::new(global.path().to_path_buf(), Scope::Global);

    let mut req = decision_request(MemoryType::Decision, "Use OAuth2 with PKCE");
    req.tags = ["auth".to_string(), "oauth2".to_string()].into();
    let written = store.write(req, None).unwrap();
    assert_eq!(written.id, "decision-use-oauth2-with-pkce");

    let read = store.read(&written.id).unwrap();
    assert_eq!(read.tags, ["auth".to_string(), "oauth2".to_string()].into());
    assert_eq!(read.body, "Body text.\n");

    let listed = store.list(&Default::default());
    assert!(listed.entries.iter().any(|e| e.id == written.id));
}

/// Scenario 2: a second write with a colliding slug gets a `-1` suffix.
#[test]
fn title_collision_appends_numeric_suffix() {
    let global = tempdir().unwrap();
    let store = Store::new(global.path().to_path_buf(), Scope::Global);

    let first = store.write(decision_request(MemoryType::Decision, "OAuth2"), None).unwrap();
    let second = store.write(decision_request(MemoryType::Decision, "OAuth2"), None).unwrap();

    assert_eq!(first.id, "decision-oauth2");
    assert_eq!(second.id, "decision-oauth2-1");
}

/// Scenario 3: writing into the memory directory is blocked, reading isn't.
#[test]
fn protection_blocks_write_allows_read() {
    let cwd = tempdir().unwrap();
    let global = tempdir().unwrap();
    let memory_dir = cwd.path().join(".claude").join("memory");
    std::fs::create_dir_all(&memory_dir).unwrap();

    let ctx = DispatchContext {
        config: Config::default(),
        resolver: resolver(cwd.path(), global.path()),
    };

    let write_input = HookInput {
        hook_event_name: "PreToolUse".to_string(),
        tool_name: Some("Write".to_string()),
        tool_input: Some(ToolInput {
            file_path: Some(memory_dir.join("foo.md").to_string_lossy().to_string()),
            command: None,
        }),
        session_id: Some("s1".to_string()),
        cwd: None,
        permission_mode: Some("bypassPermissions".to_string()),
    };
    let decision = hooks::dispatch(&write_input, &ctx);
    assert_eq!(decision.exit_code(), 2);
    match decision {
        Decision::Block(message) => assert!(message.contains("memory directory")),
        other => panic!("expected Block, got {other:?}"),
    }

    let mut read_input = write_input.clone();
    read_input.tool_name = Some("Read".to_string());
    let decision = hooks::dispatch(&read_input, &ctx);
    assert_eq!(decision, Decision::Allow(None));
}

/// Scenario 4: a gotcha matching the event's file path is surfaced once,
/// then deduped on a second `PostToolUse` call for the same session —
/// exercising `SessionState::load`/`save` across two separate
/// `DispatchContext`s the way two separate `memory-hook` process
/// invocations would.
#[test]
fn relevance_injection_dedups_across_hook_invocations() {
    let cwd = tempdir().unwrap();
    let global = tempdir().unwrap();

    let store = Store::new(global.path().to_path_buf(), Scope::Global);
    let mut req = decision_request(MemoryType::Gotcha, "Token refresh race");
    req.tags = ["auth".to_string(), "oauth2".to_string(), "concurrency".to_string(), "pattern:src/auth/**".to_string()].into();
    req.severity = Some(Severity::High);
    store.write(req, None).unwrap();

    let first_call = HookInput {
        hook_event_name: "PostToolUse".to_string(),
        tool_name: Some("Edit".to_string()),
        tool_input: Some(ToolInput { file_path: Some("src/auth/login.ts".to_string()), command: None }),
        session_id: Some("session-a".to_string()),
        cwd: None,
        permission_mode: Some("bypassPermissions".to_string()),
    };

    let ctx1 = DispatchContext { config: Config::default(), resolver: resolver(cwd.path(), global.path()) };
    let decision = hooks::dispatch(&first_call, &ctx1);
    match decision {
        Decision::Allow(Some(context)) => assert!(context.contains("Token refresh race")),
        other => panic!("expected Allow(Some(..)) with the gotcha, got {other:?}"),
    }

    // A second, independent process invocation (fresh DispatchContext) on a
    // different file under the same pattern, same session id.
    let mut second_call = first_call.clone();
    second_call.tool_input = Some(ToolInput { file_path: Some("src/auth/token.ts".to_string()), command: None });
    let ctx2 = DispatchContext { config: Config::default(), resolver: resolver(cwd.path(), global.path()) };
    let decision = hooks::dispatch(&second_call, &ctx2);
    assert_eq!(decision, Decision::Allow(None));
}

/// Scenario 5: two bodies differing only in trailing whitespace embed to
/// near-identical vectors, above the default duplicate threshold.
#[test]
fn near_duplicate_bodies_exceed_duplicate_threshold() {
    let provider = StubEmbeddingProvider::default();
    let a = provider.embed("Remember to rotate refresh tokens every 30 days.").unwrap();
    let b = provider.embed("Remember to rotate refresh tokens every 30 days.   ").unwrap();

    let pairs = memory_core::similarity::duplicates(&[a, b], 0.92).unwrap();
    assert_eq!(pairs.len(), 1);
    assert!(pairs[0].similarity >= 0.92);
}

/// The embedding cache keys on memory id: a change in body content (and
/// thus content hash) forces recomputation even though the id is unchanged.
#[test]
fn embedding_cache_recomputes_on_content_change() {
    let root = tempdir().unwrap();
    let provider = StubEmbeddingProvider::default();
    let mut cache = EmbeddingCache::load(root.path());

    let v1 = cache.get("m1", "original content", "stub", &provider).unwrap();
    cache.save(root.path()).unwrap();

    let mut reloaded = EmbeddingCache::load(root.path());
    let v2 = reloaded.get("m1", "original content", "stub", &provider).unwrap();
    assert_eq!(v1, v2);

    let v3 = reloaded.get("m1", "changed content", "stub", &provider).unwrap();
    assert_ne!(v1, v3);
}

/// Scenario 6: a forked session short-circuits before the handler runs —
/// true for `PostToolUse` too, not just `PreToolUse` (already covered in
/// `memory-cli`'s own dispatcher tests). The injector never constructs an
/// embedding provider at all (relevance scoring is tag/pattern/recency/
/// severity only, §4.10), so "zero embedding provider calls" holds for
/// every `PostToolUse` dispatch, forked or not; what forking changes is
/// that the handler — and therefore any memory I/O — never runs.
#[test]
fn forked_session_short_circuits_post_tool_use() {
    let cwd = tempdir().unwrap();
    // A global root that doesn't exist: if the real handler ran, `merge()`
    // would still tolerate it, so this alone doesn't prove non-execution,
    // but combined with the unit-level dispatch ordering test in
    // `memory-cli::hooks::dispatcher` (forked check happens before the
    // `match` on event name) the short-circuit is established there; this
    // test pins the externally observable contract for `PostToolUse`.
    let missing_global = cwd.path().join("does-not-exist");

    let ctx = DispatchContext { config: Config::default(), resolver: resolver(cwd.path(), &missing_global) };
    let mut forked = HookInput {
        hook_event_name: "PostToolUse".to_string(),
        tool_name: Some("Edit".to_string()),
        tool_input: Some(ToolInput { file_path: Some("src/auth/login.ts".to_string()), command: None }),
        session_id: Some("forked".to_string()),
        cwd: None,
        permission_mode: Some("default".to_string()),
    };
    assert!(forked.is_forked_session());
    assert_eq!(hooks::dispatch(&forked, &ctx), Decision::Allow(None));

    forked.permission_mode = Some("bypassPermissions".to_string());
    assert!(!forked.is_forked_session());
}

#[allow(dead_code)]
fn unused_import_anchor() -> Option<PathBuf> {
    None
}
