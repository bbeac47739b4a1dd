//! Browser tools exposed to the planner
//!
//! Every tool drives the session's single page. Failures never escape as
//! errors: they come back to the planner as error text naming the selector,
//! frame or argument involved.

mod iframe;
mod inspect;
mod interaction;
mod navigation;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, warn};
use wccc_core::{SchemaBuilder, Tool, ToolDefinition, ToolManager, ToolResult};

use crate::error::{BrowserError, Result};
use crate::page::Page;
use crate::session::{BrowserConfig, Session};

/// Characters of HTML returned by the content tools
pub const CONTENT_LIMIT: usize = 5000;
/// Bounds for the `wait` tool, in seconds
pub const MIN_WAIT_SECS: u64 = 1;
pub const MAX_WAIT_SECS: u64 = 10;
/// Upper bound for `wait_for_selector`
pub const MAX_SELECTOR_WAIT_MS: u64 = 60_000;

/// Grace period on top of a backend timeout before the tool gives up
const DEADLINE_SLACK: Duration = Duration::from_secs(5);

/// What every browser tool shares: the page, where artifacts go, timeouts
pub struct ToolContext {
    page: Arc<dyn Page>,
    artifact_dir: PathBuf,
    navigation_timeout: Duration,
    element_timeout: Duration,
}

impl ToolContext {
    pub fn new(page: Arc<dyn Page>, artifact_dir: impl Into<PathBuf>, config: &BrowserConfig) -> Self {
        Self {
            page,
            artifact_dir: artifact_dir.into(),
            navigation_timeout: config.navigation_timeout(),
            element_timeout: config.element_timeout(),
        }
    }

    pub fn for_session(session: &Session, config: &BrowserConfig) -> Self {
        Self::new(session.page(), session.artifact_dir(), config)
    }

    pub fn page(&self) -> &dyn Page {
        self.page.as_ref()
    }

    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    pub fn navigation_timeout(&self) -> Duration {
        self.navigation_timeout
    }

    pub fn element_timeout(&self) -> Duration {
        self.element_timeout
    }

    /// Run a page operation, failing with a timeout if the backend hangs
    /// well past its own limit.
    pub(crate) async fn within<T>(
        &self,
        what: &str,
        limit: Duration,
        op: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::time::timeout(limit + DEADLINE_SLACK, op)
            .await
            .map_err(|_| {
                BrowserError::Timeout(format!("{} did not finish within {}ms", what, limit.as_millis()))
            })?
    }
}

/// The browser tools, in registration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrowserToolKind {
    Navigate,
    Click,
    Fill,
    Type,
    PressKey,
    Screenshot,
    GetContent,
    GetText,
    WaitForSelector,
    Wait,
    IsVisible,
    Evaluate,
    ListFrames,
    GetFrameContent,
    FillInFrame,
    ClickInFrame,
}

impl BrowserToolKind {
    pub const ALL: [BrowserToolKind; 16] = [
        Self::Navigate,
        Self::Click,
        Self::Fill,
        Self::Type,
        Self::PressKey,
        Self::Screenshot,
        Self::GetContent,
        Self::GetText,
        Self::WaitForSelector,
        Self::Wait,
        Self::IsVisible,
        Self::Evaluate,
        Self::ListFrames,
        Self::GetFrameContent,
        Self::FillInFrame,
        Self::ClickInFrame,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Navigate => "navigate",
            Self::Click => "click",
            Self::Fill => "fill",
            Self::Type => "type",
            Self::PressKey => "press_key",
            Self::Screenshot => "screenshot",
            Self::GetContent => "get_content",
            Self::GetText => "get_text",
            Self::WaitForSelector => "wait_for_selector",
            Self::Wait => "wait",
            Self::IsVisible => "is_visible",
            Self::Evaluate => "evaluate",
            Self::ListFrames => "list_frames",
            Self::GetFrameContent => "get_frame_content",
            Self::FillInFrame => "fill_in_frame",
            Self::ClickInFrame => "click_in_frame",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Navigate => "Navigate the page to a URL and wait for it to load. Returns the final URL.",
            Self::Click => "Click the first element matching a CSS selector in the main document.",
            Self::Fill => "Replace the value of an input matching a CSS selector.",
            Self::Type => "Type text keystroke by keystroke into an element matching a CSS selector.",
            Self::PressKey => "Press a keyboard key such as Enter, Tab or Escape.",
            Self::Screenshot => {
                "Capture the viewport as <name>.png in this run's artifact directory. Returns the file path."
            }
            Self::GetContent => "Return the first 5000 characters of the page HTML.",
            Self::GetText => "Return the text content of the first element matching a CSS selector.",
            Self::WaitForSelector => "Wait until an element matching a CSS selector is present.",
            Self::Wait => "Pause for 1 to 10 seconds.",
            Self::IsVisible => {
                "Return \"true\" if an element matching a CSS selector is visible, otherwise \"false\"."
            }
            Self::Evaluate => "Run a JavaScript expression in the page and return its result.",
            Self::ListFrames => "List the page's frames with index, name and URL.",
            Self::GetFrameContent => {
                "Return the first 5000 characters of a frame's HTML. Frames are referenced by index, name or URL fragment."
            }
            Self::FillInFrame => "Replace the value of an input inside a frame.",
            Self::ClickInFrame => "Click an element inside a frame.",
        }
    }

    pub fn input_schema(&self) -> Value {
        const FRAME: (&str, &str, &str, bool) = (
            "frame",
            "string",
            "Frame index, or a fragment of the frame's name or URL",
            true,
        );
        const SELECTOR: (&str, &str, &str, bool) =
            ("selector", "string", "CSS selector of the target element", true);

        match self {
            Self::Navigate => SchemaBuilder::object_schema(vec![(
                "url",
                "string",
                "Absolute http(s) URL to open",
                true,
            )]),
            Self::Click | Self::GetText | Self::IsVisible => {
                SchemaBuilder::object_schema(vec![SELECTOR])
            }
            Self::Fill | Self::Type => SchemaBuilder::object_schema(vec![
                SELECTOR,
                ("text", "string", "Text to enter", true),
            ]),
            Self::PressKey => SchemaBuilder::object_schema(vec![(
                "key",
                "string",
                "Key name, e.g. Enter, Tab, Escape, ArrowDown",
                true,
            )]),
            Self::Screenshot => SchemaBuilder::object_schema(vec![(
                "name",
                "string",
                "File name without extension; reusing a name overwrites the file",
                true,
            )]),
            Self::GetContent | Self::ListFrames => SchemaBuilder::empty(),
            Self::WaitForSelector => SchemaBuilder::with_range(
                SchemaBuilder::object_schema(vec![
                    SELECTOR,
                    ("timeout_ms", "integer", "How long to wait in milliseconds", false),
                ]),
                "timeout_ms",
                1,
                MAX_SELECTOR_WAIT_MS as i64,
            ),
            Self::Wait => SchemaBuilder::with_range(
                SchemaBuilder::object_schema(vec![(
                    "seconds",
                    "number",
                    "Seconds to pause",
                    true,
                )]),
                "seconds",
                MIN_WAIT_SECS as i64,
                MAX_WAIT_SECS as i64,
            ),
            Self::Evaluate => SchemaBuilder::object_schema(vec![(
                "script",
                "string",
                "JavaScript expression; promises are awaited",
                true,
            )]),
            Self::GetFrameContent => SchemaBuilder::object_schema(vec![FRAME]),
            Self::FillInFrame => SchemaBuilder::object_schema(vec![
                FRAME,
                SELECTOR,
                ("text", "string", "Text to enter", true),
            ]),
            Self::ClickInFrame => SchemaBuilder::object_schema(vec![FRAME, SELECTOR]),
        }
    }

    async fn run(self, ctx: &ToolContext, input: &Value) -> Result<String> {
        match self {
            Self::Navigate => navigation::navigate(ctx, input).await,
            Self::WaitForSelector => navigation::wait_for_selector(ctx, input).await,
            Self::Wait => navigation::wait(input).await,
            Self::Click => interaction::click(ctx, input).await,
            Self::Fill => interaction::fill(ctx, input).await,
            Self::Type => interaction::type_text(ctx, input).await,
            Self::PressKey => interaction::press_key(ctx, input).await,
            Self::Screenshot => inspect::screenshot(ctx, input).await,
            Self::GetContent => inspect::get_content(ctx).await,
            Self::GetText => inspect::get_text(ctx, input).await,
            Self::IsVisible => inspect::is_visible(ctx, input).await,
            Self::Evaluate => inspect::evaluate(ctx, input).await,
            Self::ListFrames => iframe::list_frames(ctx).await,
            Self::GetFrameContent => iframe::get_frame_content(ctx, input).await,
            Self::FillInFrame => iframe::fill_in_frame(ctx, input).await,
            Self::ClickInFrame => iframe::click_in_frame(ctx, input).await,
        }
    }
}

/// One browser tool bound to a shared context
pub struct BrowserTool {
    kind: BrowserToolKind,
    ctx: Arc<ToolContext>,
}

impl BrowserTool {
    pub fn new(kind: BrowserToolKind, ctx: Arc<ToolContext>) -> Self {
        Self { kind, ctx }
    }

    pub fn kind(&self) -> BrowserToolKind {
        self.kind
    }
}

#[async_trait]
impl Tool for BrowserTool {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn description(&self) -> &str {
        self.kind.description()
    }

    fn input_schema(&self) -> Value {
        self.kind.input_schema()
    }

    async fn execute(&self, input: Value) -> wccc_core::Result<ToolResult> {
        debug!("Running browser tool {}", self.kind.name());
        let outcome = self.kind.run(&self.ctx, &input).await;
        if let Err(ref e) = outcome {
            warn!("Browser tool {} failed: {}", self.kind.name(), e);
        }
        Ok(ToolResult::from_outcome(outcome))
    }
}

/// Names of all browser tools, in registration order
pub fn browser_tool_names() -> Vec<&'static str> {
    BrowserToolKind::ALL.iter().map(|kind| kind.name()).collect()
}

/// Tool definitions without a live page, for prompts and listings
pub fn browser_tool_definitions() -> Vec<ToolDefinition> {
    BrowserToolKind::ALL
        .iter()
        .map(|kind| ToolDefinition::new(kind.name(), kind.description(), kind.input_schema()))
        .collect()
}

/// Register every browser tool against one shared context
pub fn register_browser_tools(manager: &mut ToolManager, ctx: Arc<ToolContext>) -> wccc_core::Result<()> {
    for kind in BrowserToolKind::ALL {
        manager.register(Arc::new(BrowserTool::new(kind, Arc::clone(&ctx))))?;
    }
    Ok(())
}

/// A string argument that may be empty
fn required_str<'a>(input: &'a Value, key: &str) -> Result<&'a str> {
    match input.get(key) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(BrowserError::InvalidInput(format!(
            "parameter '{}' must be a string, got {}",
            key, other
        ))),
        None => Err(BrowserError::InvalidInput(format!(
            "missing required parameter '{}'",
            key
        ))),
    }
}

/// A string argument that must contain something other than whitespace
fn non_empty_str<'a>(input: &'a Value, key: &str) -> Result<&'a str> {
    let value = required_str(input, key)?;
    if value.trim().is_empty() {
        return Err(BrowserError::InvalidInput(format!(
            "parameter '{}' must not be empty",
            key
        )));
    }
    Ok(value)
}

/// Frame references may arrive as a number or a string
fn frame_ref(input: &Value) -> Result<String> {
    match input.get("frame") {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) if !other.is_null() => Err(BrowserError::InvalidInput(format!(
            "parameter 'frame' must be an index, name or URL fragment, got {}",
            other
        ))),
        _ => Err(BrowserError::InvalidInput(
            "missing required parameter 'frame'".to_string(),
        )),
    }
}

fn render_value(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakePage, FAKE_PNG};
    use tempfile::TempDir;

    pub(super) fn context(page: FakePage, dir: &Path) -> (Arc<FakePage>, Arc<ToolContext>) {
        let page = Arc::new(page);
        let ctx = ToolContext::new(
            Arc::clone(&page) as Arc<dyn Page>,
            dir,
            &BrowserConfig::default(),
        );
        (page, Arc::new(ctx))
    }

    fn manager(ctx: Arc<ToolContext>) -> ToolManager {
        let mut manager = ToolManager::new();
        register_browser_tools(&mut manager, ctx).unwrap();
        manager
    }

    #[test]
    fn test_kind_names_round_trip() {
        for kind in BrowserToolKind::ALL {
            assert_eq!(BrowserToolKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(BrowserToolKind::from_name("browser_navigate"), None);
    }

    #[test]
    fn test_registration_covers_every_tool() {
        let dir = TempDir::new().unwrap();
        let (_, ctx) = context(FakePage::new(), dir.path());
        let manager = manager(ctx);

        assert_eq!(manager.len(), 16);
        assert_eq!(manager.tool_names(), browser_tool_names());
        manager.validate(browser_tool_names().as_slice()).unwrap();

        for def in manager.definitions() {
            assert_eq!(def.input_schema["type"], "object", "{}", def.name);
            assert!(!def.description.is_empty());
        }

        let offline: Vec<String> = browser_tool_definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(offline, browser_tool_names());
    }

    #[test]
    fn test_double_registration_rejected() {
        let dir = TempDir::new().unwrap();
        let (_, ctx) = context(FakePage::new(), dir.path());
        let mut manager = manager(Arc::clone(&ctx));
        assert!(register_browser_tools(&mut manager, ctx).is_err());
    }

    #[tokio::test]
    async fn test_malformed_input_never_errors() {
        let dir = TempDir::new().unwrap();
        let (_, ctx) = context(FakePage::new(), dir.path());
        let manager = manager(ctx);

        let malformed = [
            Value::Null,
            json!("just a string"),
            json!([1, 2, 3]),
            json!({}),
            json!({"selector": 42, "url": false, "frame": {"x": 1}, "seconds": "soon"}),
        ];

        for name in browser_tool_names() {
            if matches!(name, "get_content" | "list_frames") {
                continue;
            }
            for input in &malformed {
                let result = manager.execute(name, input.clone()).await;
                assert!(result.is_error, "{} accepted {}", name, input);
                assert!(!result.output.is_empty());
            }
        }
    }

    #[tokio::test]
    async fn test_failure_text_names_the_selector() {
        let dir = TempDir::new().unwrap();
        let (_, ctx) = context(FakePage::new(), dir.path());
        let manager = manager(ctx);

        let result = manager
            .execute("click", json!({"selector": "#missing-button"}))
            .await;
        assert!(result.is_error);
        assert!(result.output.contains("#missing-button"));
    }

    #[tokio::test]
    async fn test_screenshot_through_manager() {
        let dir = TempDir::new().unwrap();
        let (_, ctx) = context(FakePage::new(), dir.path());
        let manager = manager(ctx);

        let result = manager.execute("screenshot", json!({"name": "home"})).await;
        assert!(!result.is_error, "{}", result.output);
        assert_eq!(std::fs::read(dir.path().join("home.png")).unwrap(), FAKE_PNG);
    }

    #[tokio::test]
    async fn test_within_times_out_hung_operation() {
        let dir = TempDir::new().unwrap();
        let (_, ctx) = context(FakePage::new(), dir.path());
        tokio::time::pause();
        let result: Result<()> = ctx
            .within("hang", Duration::from_millis(10), std::future::pending())
            .await;
        assert!(matches!(result, Err(BrowserError::Timeout(_))));
    }

    #[test]
    fn test_argument_helpers() {
        let input = json!({"selector": "  ", "text": "", "frame": 2});
        assert!(non_empty_str(&input, "selector").is_err());
        assert_eq!(required_str(&input, "text").unwrap(), "");
        assert_eq!(frame_ref(&input).unwrap(), "2");
        assert!(frame_ref(&json!({"frame": ""})).is_err());
        assert_eq!(render_value(json!("plain")), "plain");
        assert_eq!(render_value(json!({"a": 1})), r#"{"a":1}"#);
    }
}
