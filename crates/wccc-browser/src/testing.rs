//! In-memory browser backend
//!
//! `FakeDriver` hands out a single scripted [`FakePage`] and records every
//! lifecycle step and page action in a shared event log.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::driver::{BrowserDriver, BrowserHandle, ContextHandle};
use crate::error::{BrowserError, Result};
use crate::page::{FrameInfo, Page};
use crate::session::BrowserConfig;

/// PNG signature followed by a marker, enough for file checks
pub const FAKE_PNG: &[u8] = b"\x89PNG\r\n\x1a\nwccc-fake";

const LIFECYCLE_EVENTS: [&str; 7] = [
    "driver.launch",
    "context.open",
    "page.open",
    "page.close",
    "context.close",
    "browser.close",
    "driver.stop",
];

/// Where the fake backend should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Launch,
    Context,
    Page,
    PageClose,
    ContextClose,
    BrowserClose,
    DriverStop,
}

#[derive(Debug, Clone, Default)]
struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    fn push(&self, event: impl Into<String>) {
        lock(&self.0).push(event.into());
    }

    fn snapshot(&self) -> Vec<String> {
        lock(&self.0).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Debug, Clone)]
struct FakeElement {
    text: Option<String>,
    visible: bool,
    value: String,
}

#[derive(Debug)]
struct PageState {
    url: String,
    html: String,
    elements: HashMap<String, FakeElement>,
    frames: Vec<FrameInfo>,
    frame_html: HashMap<String, String>,
    frame_elements: HashMap<String, HashSet<String>>,
    fail_close: bool,
    never_settles: bool,
}

/// Scripted page
#[derive(Debug)]
pub struct FakePage {
    state: Mutex<PageState>,
    events: EventLog,
}

impl Default for FakePage {
    fn default() -> Self {
        Self::new()
    }
}

impl FakePage {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PageState {
                url: "about:blank".to_string(),
                html: "<html><head></head><body></body></html>".to_string(),
                elements: HashMap::new(),
                frames: vec![FrameInfo::new(0, "main", "", "about:blank")],
                frame_html: HashMap::new(),
                frame_elements: HashMap::new(),
                fail_close: false,
                never_settles: false,
            }),
            events: EventLog::default(),
        }
    }

    /// Main-document HTML returned by `content(None)`
    pub fn with_html(self, html: impl Into<String>) -> Self {
        lock(&self.state).html = html.into();
        self
    }

    /// A visible main-document element
    pub fn with_element(self, selector: impl Into<String>, text: Option<&str>) -> Self {
        self.insert_element(selector.into(), text, true)
    }

    pub fn with_hidden_element(self, selector: impl Into<String>) -> Self {
        self.insert_element(selector.into(), None, false)
    }

    /// Navigations commit but the document never finishes loading
    pub fn never_settling(self) -> Self {
        lock(&self.state).never_settles = true;
        self
    }

    /// A child frame with its own HTML and interactive selectors
    pub fn with_frame(
        self,
        name: impl Into<String>,
        url: impl Into<String>,
        html: impl Into<String>,
        selectors: &[&str],
    ) -> Self {
        {
            let mut state = lock(&self.state);
            let index = state.frames.len();
            let id = format!("frame-{}", index);
            state.frame_html.insert(id.clone(), html.into());
            state.frame_elements.insert(
                id.clone(),
                selectors.iter().map(|s| s.to_string()).collect(),
            );
            state.frames.push(FrameInfo::new(index, id, name, url));
        }
        self
    }

    fn insert_element(self, selector: String, text: Option<&str>, visible: bool) -> Self {
        lock(&self.state).elements.insert(
            selector,
            FakeElement {
                text: text.map(str::to_string),
                visible,
                value: String::new(),
            },
        );
        self
    }

    pub fn url(&self) -> String {
        lock(&self.state).url.clone()
    }

    /// Current value of a filled or typed element
    pub fn value_of(&self, selector: &str) -> Option<String> {
        lock(&self.state)
            .elements
            .get(selector)
            .map(|e| e.value.clone())
    }

    /// Page actions recorded so far, without lifecycle events
    pub fn actions(&self) -> Vec<String> {
        self.events
            .snapshot()
            .into_iter()
            .filter(|e| !LIFECYCLE_EVENTS.contains(&e.as_str()))
            .collect()
    }

    fn require_element(&self, selector: &str) -> Result<()> {
        if lock(&self.state).elements.contains_key(selector) {
            Ok(())
        } else {
            Err(BrowserError::ElementNotFound(format!(
                "Element '{}' not found",
                selector
            )))
        }
    }

    /// Present and rendered, as clicks and fills require
    fn require_visible(&self, selector: &str, timeout: Duration) -> Result<()> {
        self.require_element(selector)?;
        let visible = lock(&self.state)
            .elements
            .get(selector)
            .is_some_and(|e| e.visible);
        if visible {
            Ok(())
        } else {
            Err(BrowserError::Interaction(format!(
                "Element '{}' is not visible within {}ms",
                selector,
                timeout.as_millis()
            )))
        }
    }

    fn require_frame_element(&self, frame: &FrameInfo, selector: &str) -> Result<()> {
        let state = lock(&self.state);
        let found = state
            .frame_elements
            .get(&frame.id)
            .is_some_and(|set| set.contains(selector));
        if found {
            Ok(())
        } else {
            Err(BrowserError::ElementNotFound(format!(
                "Element '{}' not found in frame {}",
                selector, frame.index
            )))
        }
    }
}

#[async_trait]
impl Page for FakePage {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<String> {
        self.events.push(format!("navigate {}", url));
        if url.contains("unreachable") {
            return Err(BrowserError::Navigation(format!(
                "Failed to navigate to {}: net::ERR_NAME_NOT_RESOLVED",
                url
            )));
        }
        let mut state = lock(&self.state);
        state.url = url.to_string();
        if let Some(main) = state.frames.first_mut() {
            main.url = url.to_string();
        }
        if state.never_settles {
            return Err(BrowserError::Timeout(format!(
                "Navigation to {} did not settle within {}ms",
                url,
                timeout.as_millis()
            )));
        }
        Ok(url.to_string())
    }

    async fn click(&self, frame: Option<&FrameInfo>, selector: &str, timeout: Duration) -> Result<()> {
        match frame.filter(|f| !f.is_main) {
            Some(frame) => {
                self.require_frame_element(frame, selector)?;
                self.events.push(format!("click {} in frame {}", selector, frame.index));
            }
            None => {
                self.require_visible(selector, timeout)?;
                self.events.push(format!("click {}", selector));
            }
        }
        Ok(())
    }

    async fn fill(
        &self,
        frame: Option<&FrameInfo>,
        selector: &str,
        text: &str,
        timeout: Duration,
    ) -> Result<()> {
        match frame.filter(|f| !f.is_main) {
            Some(frame) => {
                self.require_frame_element(frame, selector)?;
                self.events.push(format!("fill {} in frame {}", selector, frame.index));
            }
            None => {
                self.require_visible(selector, timeout)?;
                if let Some(element) = lock(&self.state).elements.get_mut(selector) {
                    element.value = text.to_string();
                }
                self.events.push(format!("fill {}", selector));
            }
        }
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str, _timeout: Duration) -> Result<()> {
        self.require_element(selector)?;
        if let Some(element) = lock(&self.state).elements.get_mut(selector) {
            element.value.push_str(text);
        }
        self.events.push(format!("type {}", selector));
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        self.events.push(format!("press {}", key));
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.events.push("screenshot");
        Ok(FAKE_PNG.to_vec())
    }

    async fn content(&self, frame: Option<&FrameInfo>) -> Result<String> {
        let state = lock(&self.state);
        match frame.filter(|f| !f.is_main) {
            Some(frame) => state.frame_html.get(&frame.id).cloned().ok_or_else(|| {
                BrowserError::Frame(format!("frame {} has been detached", frame.index))
            }),
            None => Ok(state.html.clone()),
        }
    }

    async fn text(&self, selector: &str, _timeout: Duration) -> Result<Option<String>> {
        lock(&self.state)
            .elements
            .get(selector)
            .map(|e| e.text.clone())
            .ok_or_else(|| BrowserError::ElementNotFound(format!("Element '{}' not found", selector)))
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        self.require_element(selector).map_err(|_| {
            BrowserError::Timeout(format!(
                "Element '{}' not found within {}ms",
                selector,
                timeout.as_millis()
            ))
        })
    }

    async fn is_visible(&self, selector: &str) -> Result<bool> {
        lock(&self.state)
            .elements
            .get(selector)
            .map(|e| e.visible)
            .ok_or_else(|| BrowserError::ElementNotFound(format!("Element '{}' not found", selector)))
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        self.events.push("evaluate");
        if script.contains("throw") {
            return Err(BrowserError::Script(format!("Uncaught Error in '{}'", script)));
        }
        match script.trim() {
            "document.title" => Ok(json!("Fake Page")),
            "location.href" => Ok(json!(self.url())),
            _ => Ok(json!({ "script_length": script.len() })),
        }
    }

    async fn frames(&self) -> Result<Vec<FrameInfo>> {
        Ok(lock(&self.state).frames.clone())
    }

    async fn close(&self) -> Result<()> {
        self.events.push("page.close");
        if lock(&self.state).fail_close {
            return Err(BrowserError::Teardown("page already crashed".to_string()));
        }
        Ok(())
    }
}

/// Driver that launches a fake browser around one shared page
#[derive(Debug, Clone)]
pub struct FakeDriver {
    page: Arc<FakePage>,
    events: EventLog,
    failures: HashSet<FailPoint>,
}

impl FakeDriver {
    pub fn new(page: FakePage) -> Self {
        let events = page.events.clone();
        Self {
            page: Arc::new(page),
            events,
            failures: HashSet::new(),
        }
    }

    pub fn failing_at(mut self, point: FailPoint) -> Self {
        if point == FailPoint::PageClose {
            lock(&self.page.state).fail_close = true;
        }
        self.failures.insert(point);
        self
    }

    /// The page every context hands out
    pub fn page(&self) -> Arc<FakePage> {
        Arc::clone(&self.page)
    }

    pub fn events(&self) -> Vec<String> {
        self.events.snapshot()
    }

    /// Lifecycle events only, in order
    pub fn lifecycle(&self) -> Vec<String> {
        self.events
            .snapshot()
            .into_iter()
            .filter(|e| LIFECYCLE_EVENTS.contains(&e.as_str()))
            .collect()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events.snapshot().iter().filter(|e| *e == event).count()
    }

    fn check(&self, point: FailPoint, err: impl FnOnce() -> BrowserError) -> Result<()> {
        if self.failures.contains(&point) {
            Err(err())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    async fn launch(&self, _config: &BrowserConfig) -> Result<Box<dyn BrowserHandle>> {
        self.events.push("driver.launch");
        self.check(FailPoint::Launch, || {
            BrowserError::Initialization("Could not auto detect a chrome executable".to_string())
        })?;
        Ok(Box::new(FakeBrowser {
            driver: self.clone(),
        }))
    }

    async fn stop(&self) -> Result<()> {
        self.events.push("driver.stop");
        self.check(FailPoint::DriverStop, || {
            BrowserError::Teardown("driver already stopped".to_string())
        })
    }
}

struct FakeBrowser {
    driver: FakeDriver,
}

#[async_trait]
impl BrowserHandle for FakeBrowser {
    async fn new_context(&self) -> Result<Box<dyn ContextHandle>> {
        self.driver.events.push("context.open");
        self.driver.check(FailPoint::Context, || {
            BrowserError::Initialization("Failed to create browser context".to_string())
        })?;
        Ok(Box::new(FakeContext {
            driver: self.driver.clone(),
        }))
    }

    async fn close(&self) -> Result<()> {
        self.driver.events.push("browser.close");
        self.driver.check(FailPoint::BrowserClose, || {
            BrowserError::Teardown("browser connection lost".to_string())
        })
    }
}

struct FakeContext {
    driver: FakeDriver,
}

#[async_trait]
impl ContextHandle for FakeContext {
    async fn new_page(&self) -> Result<Arc<dyn Page>> {
        self.driver.events.push("page.open");
        self.driver.check(FailPoint::Page, || {
            BrowserError::Initialization("Failed to open page".to_string())
        })?;
        Ok(self.driver.page() as Arc<dyn Page>)
    }

    async fn close(&self) -> Result<()> {
        self.driver.events.push("context.close");
        self.driver.check(FailPoint::ContextClose, || {
            BrowserError::Teardown("context already disposed".to_string())
        })
    }
}
