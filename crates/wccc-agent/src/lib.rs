//! wccc-agent: workflows, run driver and scheduling for the browser agent
//!
//! Glues the planner loop from wccc-core to a browser session from
//! wccc-browser. A run builds the task text, acquires a session, lets the
//! planner drive the browser tools and always releases the session.

pub mod cli;
pub mod error;
pub mod logging;
pub mod runner;
pub mod scheduler;
pub mod task;

pub use error::{AgentError, Result};
pub use runner::{WorkflowRunner, run_workflow};
pub use scheduler::{Scheduler, SchedulerHandle, parse_cron};
pub use task::{TaskPrompt, Workflow, redact, system_prompt};
