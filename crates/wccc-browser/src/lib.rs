//! wccc-browser: browser session and page tools for the wccc agent
//!
//! This crate owns everything that touches the browser.
//!
//! ## Features
//!
//! - Headless Chrome backend via the headless_chrome crate
//! - Session lifecycle with ordered, failure-tolerant teardown
//! - Stale process and profile lock recovery before launch
//! - Sixteen planner tools, including frame-aware variants
//! - `testing` feature: an in-memory driver and page
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wccc_browser::{BrowserConfig, ChromeDriver, SessionManager, ToolContext};
//! use wccc_core::ToolManager;
//!
//! let config = BrowserConfig::default();
//! let sessions = SessionManager::new(Arc::new(ChromeDriver::new()), config.clone(), "logs/screenshots");
//! let session = sessions.acquire().await?;
//!
//! let mut manager = ToolManager::new();
//! wccc_browser::register_browser_tools(
//!     &mut manager,
//!     Arc::new(ToolContext::for_session(&session, &config)),
//! )?;
//!
//! // ... run the agent ...
//!
//! sessions.release(session).await;
//! ```

pub mod chrome;
pub mod driver;
pub mod error;
pub mod frames;
pub mod page;
pub mod recovery;
pub mod session;
pub mod tools;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use chrome::ChromeDriver;
pub use driver::{BrowserDriver, BrowserHandle, ContextHandle};
pub use error::{BrowserError, Result};
pub use page::{FrameInfo, Page};
pub use recovery::{RecoveryReport, StaleStateRecovery};
pub use session::{BrowserConfig, BrowserConfigBuilder, Session, SessionGuard, SessionManager};
pub use tools::{
    BrowserTool, BrowserToolKind, CONTENT_LIMIT, ToolContext, browser_tool_definitions,
    browser_tool_names,
    register_browser_tools,
};
