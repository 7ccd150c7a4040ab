//! Hook event dispatch (C14).

pub mod dispatcher;
pub mod event;

pub use dispatcher::{dispatch, DispatchContext};
pub use event::{Decision, HookInput, HookOutput, HookSpecificOutput};
