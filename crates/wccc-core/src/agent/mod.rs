//! Agent orchestration
//!
//! The planner seam, the append-only conversation, the bounded loop that
//! ties planner and tools together, and the transcript reporter.

mod conversation;
mod planner;
mod runner;
pub mod transcript;

pub use conversation::Conversation;
pub use planner::{Planner, PlannerReply};
pub use runner::{
    AgentLoop, AgentOptions, AgentRun, HookDecision, LoopState, PlannerDrivenRetry, RetryHook,
};
pub use transcript::Verbosity;
