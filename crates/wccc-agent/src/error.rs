//! Error types for wccc-agent

use thiserror::Error;

/// wccc-agent error type
///
/// Wraps the sub-crate errors for the run driver and the scheduler.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Configuration or planner failure
    #[error("Core error: {0}")]
    Core(#[from] wccc_core::Error),

    /// Session acquisition failed
    #[error("Browser error: {0}")]
    Browser(#[from] wccc_browser::BrowserError),

    /// The requested workflow cannot be built
    #[error("Task error: {0}")]
    Task(String),

    #[error("Schedule error: {0}")]
    Schedule(String),

    #[error("Logging error: {0}")]
    Logging(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AgentError>;
