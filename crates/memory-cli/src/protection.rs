//! Path-protection policy (C12)
//!
//! Decides whether a tool invocation is allowed to touch the memory
//! directory, independent of the rest of the injector/dispatcher pipeline.

use std::path::{Path, PathBuf};

/// Tools whose effect is read-only and never needs inspection.
const READ_ONLY_TOOLS: &[&str] = &["Read", "Glob", "Grep"];

/// Tools that can mutate a file and must be checked against the protected
/// directory.
const MUTATING_TOOLS: &[&str] = &["Write", "Edit", "MultiEdit"];

/// Shell verbs considered read-only even when the command line includes the
/// memory directory as an argument (§4.12).
const READ_ONLY_SHELL_VERBS: &[&str] =
    &["cat", "head", "tail", "grep", "ls", "find", "stat", "file", "wc", "sort", "uniq", "diff"];

/// One tool invocation as seen by the protection policy.
#[derive(Debug, Clone)]
pub struct ToolOperation<'a> {
    pub tool_name: &'a str,
    pub shell_command: Option<&'a str>,
    pub file_path: Option<&'a Path>,
}

/// The verdict of [`evaluate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Block(String),
}

/// Evaluate a tool operation against the memory-directory protection policy.
/// `memory_roots` is every scope root currently known (any of enterprise,
/// local, project, global) — a path is protected if it resolves under any
/// of them, or generically under a `.claude/memory` directory anywhere on
/// the resolved path.
pub fn evaluate(op: &ToolOperation, memory_roots: &[PathBuf]) -> Verdict {
    if READ_ONLY_TOOLS.contains(&op.tool_name) {
        return Verdict::Allow;
    }

    if is_memory_cli_invocation(op.shell_command) {
        return Verdict::Allow;
    }

    if MUTATING_TOOLS.contains(&op.tool_name) {
        if let Some(path) = op.file_path {
            if targets_memory_dir(path, memory_roots) {
                return Verdict::Block(format!(
                    "refusing to let {} write inside the memory directory: {}",
                    op.tool_name,
                    path.display()
                ));
            }
        }
        return Verdict::Allow;
    }

    if op.tool_name == "Bash" {
        if let Some(command) = op.shell_command {
            return evaluate_shell_command(command, memory_roots);
        }
        return Verdict::Allow;
    }

    Verdict::Allow
}

fn is_memory_cli_invocation(shell_command: Option<&str>) -> bool {
    let Some(command) = shell_command else { return false };
    let trimmed = command.trim_start();
    trimmed.starts_with("memory ") || trimmed == "memory"
}

fn evaluate_shell_command(command: &str, memory_roots: &[PathBuf]) -> Verdict {
    let normalized = command.trim();

    if normalized.starts_with("git rm --cached") {
        return Verdict::Allow;
    }

    let touches_memory_dir = memory_roots
        .iter()
        .any(|root| normalized.contains(&root.to_string_lossy().to_string()))
        || normalized.contains(".claude/memory");

    if !touches_memory_dir {
        return Verdict::Allow;
    }

    let has_redirect = normalized.contains('>') || normalized.contains("| tee");
    let first_word = normalized.split_whitespace().next().unwrap_or("");
    // `rm`/`mv`/`cp` are destructive on their own; `printf` only writes
    // anywhere when paired with a redirect (§4.12: `printf … > …`).
    let is_destructive_verb = matches!(first_word, "rm" | "mv" | "cp")
        || (first_word == "printf" && has_redirect);

    if has_redirect || is_destructive_verb {
        return Verdict::Block(format!(
            "refusing to run a shell command that writes into the memory directory: {command}"
        ));
    }

    if READ_ONLY_SHELL_VERBS.contains(&first_word) {
        return Verdict::Allow;
    }

    Verdict::Allow
}

/// Whether `path`, once canonicalised (falling back to lexical
/// normalisation if the path doesn't exist yet), lies under any of
/// `memory_roots` or under a `.claude/memory` directory at all —
/// using `<prefix>+separator` matching rather than substring matching so a
/// sibling directory merely named `memory-notes` is never mistaken for the
/// protected one (§4.12).
fn targets_memory_dir(path: &Path, memory_roots: &[PathBuf]) -> bool {
    let resolved = resolve(path);

    for root in memory_roots {
        let resolved_root = resolve(root);
        if is_prefix(&resolved_root, &resolved) {
            return true;
        }
    }

    resolved
        .components()
        .collect::<Vec<_>>()
        .windows(2)
        .any(|w| {
            w[0].as_os_str() == ".claude"
                && w[1].as_os_str() == "memory"
        })
}

fn resolve(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| lexical_normalize(path))
}

fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        use std::path::Component;
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn is_prefix(prefix: &Path, path: &Path) -> bool {
    if prefix == path {
        return true;
    }
    path.starts_with(prefix)
}
