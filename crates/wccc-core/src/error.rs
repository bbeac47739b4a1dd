//! Error types for wccc-core

use thiserror::Error;

/// Main error type for wccc-core
#[derive(Error, Debug)]
pub enum Error {
    #[error("Planner error: {0}")]
    Planner(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for wccc-core
pub type Result<T> = std::result::Result<T, Error>;
