//! Browser lifecycle handles
//!
//! A session acquires a driver, browser, context and page in that order and
//! releases them in reverse. Each level is a trait so the session logic can
//! run against the in-memory backend in tests.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::page::Page;
use crate::session::BrowserConfig;

/// Entry point to a browser backend
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Start a browser process configured by `config`.
    async fn launch(&self, config: &BrowserConfig) -> Result<Box<dyn BrowserHandle>>;

    /// Stop the driver and anything it still owns. Safe to call repeatedly.
    async fn stop(&self) -> Result<()>;
}

/// A running browser
#[async_trait]
pub trait BrowserHandle: Send + Sync {
    /// Open an isolated context with the configured viewport and user agent.
    async fn new_context(&self) -> Result<Box<dyn ContextHandle>>;

    async fn close(&self) -> Result<()>;
}

/// An isolated browsing context
#[async_trait]
pub trait ContextHandle: Send + Sync {
    async fn new_page(&self) -> Result<Arc<dyn Page>>;

    async fn close(&self) -> Result<()>;
}
