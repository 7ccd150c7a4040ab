//! `memory-hook`: the hook dispatcher binary (C14).
//!
//! A short-lived process: reads at most one JSON document from stdin,
//! dispatches it, writes at most one JSON document to stdout, and exits
//! with the decision's code. Concurrency is between invocations of this
//! binary, never within one (§5).

use std::io::{IsTerminal, Read, Write};

use memory_cli::hooks::{self, Decision, DispatchContext, HookInput, HookOutput, HookSpecificOutput};
use memory_core::config::Config;
use memory_core::scope::ScopeResolver;

fn main() {
    init_logging();

    let exit_code = run();
    std::process::exit(exit_code);
}

fn run() -> i32 {
    let raw_input = read_stdin();
    if raw_input.trim().is_empty() {
        return Decision::Allow(None).exit_code();
    }

    let input: HookInput = match serde_json::from_str(&raw_input) {
        Ok(input) => input,
        Err(e) => {
            tracing::warn!(error = %e, "malformed hook input, allowing");
            return Decision::Allow(None).exit_code();
        }
    };

    let ctx = build_context();
    let decision = hooks::dispatch(&input, &ctx);
    emit(&input, &decision);
    decision.exit_code()
}

fn read_stdin() -> String {
    if std::io::stdin().is_terminal() {
        return String::new();
    }
    let mut buf = String::new();
    let _ = std::io::stdin().read_to_string(&mut buf);
    buf
}

fn build_context() -> DispatchContext {
    let cwd = std::env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from("."));
    let global_root = directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".claude").join("memory"))
        .unwrap_or_else(|| cwd.join(".claude-memory-fallback"));
    let enterprise_path = std::env::var("CLAUDE_MEMORY_ENTERPRISE_PATH").ok().map(std::path::PathBuf::from);

    Config::seed_from_plugin_root(&global_root);
    let config = Config::load(&global_root.join("config.yaml"));

    DispatchContext {
        config,
        resolver: ScopeResolver {
            cwd,
            global_root,
            enterprise_enabled: enterprise_path.is_some(),
            enterprise_path,
            configured_default: None,
        },
    }
}

fn emit(input: &HookInput, decision: &Decision) {
    let is_session_lifecycle = matches!(input.hook_event_name.as_str(), "SessionStart" | "SessionEnd");

    match decision {
        Decision::Allow(Some(context)) if !is_session_lifecycle => {
            let output = HookOutput {
                hook_specific_output: HookSpecificOutput {
                    hook_event_name: input.hook_event_name.clone(),
                    additional_context: context.clone(),
                },
            };
            if let Ok(json) = serde_json::to_string(&output) {
                println!("{json}");
            }
        }
        Decision::Allow(Some(context)) => {
            println!("{context}");
        }
        Decision::Allow(None) => {}
        Decision::Warn(message) => {
            eprintln!("{message}");
        }
        Decision::Block(message) => {
            eprintln!("{message}");
        }
    }
    let _ = std::io::stdout().flush();
}

// SIGTERM/SIGINT are left to the default disposition deliberately: a write
// in progress goes through atomic rename (temp file + rename), so there is
// no partial state for an interrupted process to leave behind, and the OS
// convention (128+signal: 143, 130) already matches §5's contract without
// a handler.

fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .try_init();
}
