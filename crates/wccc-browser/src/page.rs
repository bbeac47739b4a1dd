//! Page abstraction over a single browser tab

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

/// A document or embedded sub-document within a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameInfo {
    /// Position in document order, main frame first
    pub index: usize,
    /// Backend frame identifier
    pub id: String,
    /// Frame name attribute, possibly empty
    pub name: String,
    pub url: String,
    pub is_main: bool,
}

impl FrameInfo {
    pub fn new(index: usize, id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            index,
            id: id.into(),
            name: name.into(),
            url: url.into(),
            is_main: index == 0,
        }
    }
}

impl fmt::Display for FrameInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = if self.name.is_empty() { "-" } else { &self.name };
        write!(f, "[{}] name={} url={}", self.index, name, self.url)?;
        if self.is_main {
            write!(f, " (main)")?;
        }
        Ok(())
    }
}

/// Operations the browser tools perform against one page
///
/// Frame-aware operations take `None` for the main document. Implementations
/// must be safe to share between tool instances.
#[async_trait]
pub trait Page: Send + Sync {
    /// Load `url` and wait for the page to settle. Returns the final URL.
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<String>;

    /// Click the first element matching `selector`.
    async fn click(&self, frame: Option<&FrameInfo>, selector: &str, timeout: Duration) -> Result<()>;

    /// Replace the value of an input element.
    async fn fill(
        &self,
        frame: Option<&FrameInfo>,
        selector: &str,
        text: &str,
        timeout: Duration,
    ) -> Result<()>;

    /// Type keystroke by keystroke into an element.
    async fn type_text(&self, selector: &str, text: &str, timeout: Duration) -> Result<()>;

    async fn press_key(&self, key: &str) -> Result<()>;

    /// Capture the viewport as PNG bytes.
    async fn screenshot(&self) -> Result<Vec<u8>>;

    /// Serialized HTML of the document or frame.
    async fn content(&self, frame: Option<&FrameInfo>) -> Result<String>;

    /// Text content of the first matching element, `None` when it has none.
    async fn text(&self, selector: &str, timeout: Duration) -> Result<Option<String>>;

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()>;

    async fn is_visible(&self, selector: &str) -> Result<bool>;

    async fn evaluate(&self, script: &str) -> Result<Value>;

    /// All frames in document order.
    async fn frames(&self) -> Result<Vec<FrameInfo>>;

    async fn close(&self) -> Result<()>;
}
