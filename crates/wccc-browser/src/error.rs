//! Error types for wccc-browser

use thiserror::Error;

/// wccc-browser error type
///
/// Every message names the selector, frame or argument involved so the
/// planner can decide how to recover.
#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Browser initialization failed: {0}")]
    Initialization(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Interaction failed: {0}")]
    Interaction(String),

    #[error("Screenshot failed: {0}")]
    Screenshot(String),

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Frame error: {0}")]
    Frame(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Teardown failed: {0}")]
    Teardown(String),

    #[error("Artifact error: {0}")]
    Artifact(#[from] std::io::Error),
}

impl From<BrowserError> for wccc_core::Error {
    fn from(e: BrowserError) -> Self {
        wccc_core::Error::Browser(e.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, BrowserError>;
