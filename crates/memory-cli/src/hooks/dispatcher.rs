//! Hook dispatcher (C14)
//!
//! Reads one JSON document, routes it to a handler by event name, and
//! converts a handler panic into `Allow` so a bug here never blocks the
//! host (§4.14).

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use memory_core::config::Config;
use memory_core::scope::ScopeResolver;

use crate::hooks::event::{Decision, HookInput};
use crate::injector::{self, ToolEvent};
use crate::protection::{self, ToolOperation};

/// Everything a handler needs that isn't in the input document itself.
pub struct DispatchContext {
    pub config: Config,
    pub resolver: ScopeResolver,
}

/// Dispatch one parsed input to its handler, with panic containment.
pub fn dispatch(input: &HookInput, ctx: &DispatchContext) -> Decision {
    if input.is_forked_session() {
        return Decision::Allow(None);
    }

    let result = panic::catch_unwind(AssertUnwindSafe(|| match input.hook_event_name.as_str() {
        "PreToolUse" => handle_pre_tool_use(input, ctx),
        "PostToolUse" => handle_post_tool_use(input, ctx),
        "SessionStart" => handle_session_start(input, ctx),
        "SessionEnd" => handle_session_end(input, ctx),
        _ => Decision::Allow(None),
    }));

    result.unwrap_or_else(|_| Decision::Allow(None))
}

fn handle_pre_tool_use(input: &HookInput, ctx: &DispatchContext) -> Decision {
    let Some(tool_name) = input.tool_name.as_deref() else {
        return Decision::Allow(None);
    };

    let file_path = input.tool_input.as_ref().and_then(|t| t.file_path.as_deref());
    let command = input.tool_input.as_ref().and_then(|t| t.command.as_deref());

    let memory_roots = known_memory_roots(&ctx.resolver);
    let op = ToolOperation {
        tool_name,
        shell_command: command,
        file_path: file_path.map(Path::new),
    };

    match protection::evaluate(&op, &memory_roots) {
        protection::Verdict::Block(message) => Decision::Block(message),
        protection::Verdict::Allow => Decision::Allow(None),
    }
}

fn handle_post_tool_use(input: &HookInput, ctx: &DispatchContext) -> Decision {
    let Some(tool_name) = input.tool_name.as_deref() else {
        return Decision::Allow(None);
    };
    let file_path = input.tool_input.as_ref().and_then(|t| t.file_path.as_deref());

    let merged = ctx.resolver.merge();
    let memories: Vec<memory_core::Memory> = merged
        .into_iter()
        .filter_map(|entry| load_memory_for_entry(ctx, &entry).ok())
        .collect();

    let event = ToolEvent {
        tool_name,
        file_path,
        context_tags: Vec::new(),
    };

    let session_path = input.session_id.as_deref().map(|id| {
        memory_core::session::SessionState::path_for(&ctx.resolver.global_root.join("sessions"), id)
    });
    let mut session = session_path
        .as_deref()
        .map(memory_core::session::SessionState::load)
        .unwrap_or_default();

    let selected = injector::select(&memories, &event, &ctx.config, &mut session, chrono::Utc::now());

    if let Some(path) = &session_path {
        if let Err(e) = session.save(path) {
            tracing::warn!(error = %e, "failed to persist session state");
        }
    }

    if selected.is_empty() {
        Decision::Allow(None)
    } else {
        Decision::Allow(Some(injector::format_bullets(&selected)))
    }
}

fn load_memory_for_entry(
    ctx: &DispatchContext,
    entry: &memory_core::IndexEntry,
) -> memory_core::Result<memory_core::Memory> {
    let root = ctx.resolver.resolve(Some(entry.scope))?;
    let store = memory_core::Store::new(root, entry.scope);
    store.read(&entry.id)
}

fn handle_session_start(_input: &HookInput, _ctx: &DispatchContext) -> Decision {
    Decision::Allow(None)
}

fn handle_session_end(_input: &HookInput, _ctx: &DispatchContext) -> Decision {
    Decision::Allow(None)
}

fn known_memory_roots(resolver: &ScopeResolver) -> Vec<PathBuf> {
    resolver
        .readable_scopes()
        .into_iter()
        .filter_map(|scope| resolver.resolve(Some(scope)).ok())
        .collect()
}
