//! Building and supervising agent invocations.

mod invocation;
mod supervisor;

pub use invocation::{resolve_agent_bin, Invocation, AGENT_BIN_ENV, NO_CONFIRM_ENV};
pub use supervisor::{RunError, RunHandle, RunOutcome, Supervisor};
