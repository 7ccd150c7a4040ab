//! Hook event types (C14, §6).
//!
//! Mirrors the JSON shape the host sends on stdin:
//! `{"hook_event_name":"PreToolUse","tool_name":"Write",
//!   "tool_input":{"file_path":"..."},"session_id":"...","cwd":"...",
//!   "permission_mode":"bypassPermissions"}`.

use serde::{Deserialize, Serialize};

/// The parsed hook input document.
#[derive(Debug, Clone, Deserialize)]
pub struct HookInput {
    pub hook_event_name: String,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: Option<ToolInput>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub permission_mode: Option<String>,
}

/// The subset of `tool_input` fields handlers care about.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolInput {
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
}

impl HookInput {
    /// A "forked session" is a distinguished marker meant to short-circuit
    /// to `allow` immediately, preventing recursive hook invocation (§4.14).
    pub fn is_forked_session(&self) -> bool {
        self.permission_mode.as_deref() == Some("default")
    }
}

/// The outcome of a handler (§4.14): `Allow` optionally carries context to
/// inject, `Warn`/`Block` carry a human-readable message.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Allow(Option<String>),
    Warn(String),
    Block(String),
}

impl Decision {
    /// The process exit code this decision maps to (§4.14: allow=0, warn=1,
    /// block=2).
    pub fn exit_code(&self) -> i32 {
        match self {
            Decision::Allow(_) => 0,
            Decision::Warn(_) => 1,
            Decision::Block(_) => 2,
        }
    }
}

impl From<&memory_core::MemoryError> for Decision {
    /// Map a core error to a decision per its §7 propagation class: `Block`
    /// errors block, `Warn` errors warn, and `Allow`-class errors degrade
    /// silently rather than holding up the host.
    fn from(error: &memory_core::MemoryError) -> Self {
        match error.class() {
            memory_core::ErrorClass::Block => Decision::Block(error.to_string()),
            memory_core::ErrorClass::Warn => Decision::Warn(error.to_string()),
            memory_core::ErrorClass::Allow => Decision::Allow(None),
        }
    }
}

/// `{"hookSpecificOutput":{"hookEventName":...,"additionalContext":...}}`
/// emitted on stdout for non-session events that produced context.
#[derive(Debug, Clone, Serialize)]
pub struct HookOutput {
    #[serde(rename = "hookSpecificOutput")]
    pub hook_specific_output: HookSpecificOutput,
}

#[derive(Debug, Clone, Serialize)]
pub struct HookSpecificOutput {
    #[serde(rename = "hookEventName")]
    pub hook_event_name: String,
    #[serde(rename = "additionalContext")]
    pub additional_context: String,
}
