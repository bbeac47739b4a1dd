//! Headless Chrome backend
//!
//! headless_chrome is synchronous, so every call runs on the blocking pool.
//! CDP commands whose parameter structs differ between protocol revisions
//! are built from JSON.

use std::ffi::OsStr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use headless_chrome::protocol::cdp::{Emulation, Page as Cdp, Runtime, Target};
use headless_chrome::{Browser, LaunchOptionsBuilder, Tab};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::driver::{BrowserDriver, BrowserHandle, ContextHandle};
use crate::error::{BrowserError, Result};
use crate::page::{FrameInfo, Page};
use crate::session::BrowserConfig;

/// Keeps the DevTools connection open while the planner is thinking
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(3600);
const POLL_INTERVAL: Duration = Duration::from_millis(100);
const CLICK_SETTLE: Duration = Duration::from_millis(300);
const ISOLATED_WORLD: &str = "wccc_frame_world";

const FILL_FN: &str = "function (value) {
    this.focus();
    this.value = '';
    this.value = value;
    this.dispatchEvent(new Event('input', { bubbles: true }));
    this.dispatchEvent(new Event('change', { bubbles: true }));
}";

const CLICK_FN: &str = "function () { this.click(); }";

const TEXT_FN: &str = "function () { return this.textContent; }";

async fn blocking<T, F>(op: &'static str, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| BrowserError::Interaction(format!("{} task failed: {}", op, e)))?
}

fn cdp<T: serde::de::DeserializeOwned>(params: Value) -> Result<T> {
    serde_json::from_value(params)
        .map_err(|e| BrowserError::Interaction(format!("Invalid DevTools parameters: {}", e)))
}

/// JSON string literal usable inside a script
fn js_string(text: &str) -> String {
    Value::String(text.to_string()).to_string()
}

/// Launches Chrome or Chromium through headless_chrome
#[derive(Default)]
pub struct ChromeDriver {
    browser: Mutex<Option<Arc<Browser>>>,
}

impl ChromeDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BrowserDriver for ChromeDriver {
    async fn launch(&self, config: &BrowserConfig) -> Result<Box<dyn BrowserHandle>> {
        let launch_config = config.clone();
        let browser = blocking("launch", move || launch_browser(&launch_config)).await?;
        let browser = Arc::new(browser);

        if let Ok(mut slot) = self.browser.lock() {
            *slot = Some(Arc::clone(&browser));
        }

        Ok(Box::new(ChromeBrowser {
            browser,
            config: config.clone(),
        }))
    }

    async fn stop(&self) -> Result<()> {
        let browser = self
            .browser
            .lock()
            .map_err(|e| BrowserError::Teardown(format!("Driver state poisoned: {}", e)))?
            .take();
        if let Some(browser) = browser {
            // The process is killed once the last handle is gone
            drop(browser);
            info!("Browser driver stopped");
        }
        Ok(())
    }
}

fn launch_browser(config: &BrowserConfig) -> Result<Browser> {
    let mut args: Vec<String> = vec![
        format!("--window-size={},{}", config.width, config.height),
        "--no-sandbox".to_string(),
        "--disable-setuid-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
    ];

    if !config.enable_gpu {
        args.push("--disable-gpu".to_string());
        args.push("--disable-software-rasterizer".to_string());
    }

    if let Some(ref ua) = config.user_agent {
        args.push(format!("--user-agent={}", ua));
    }

    let os_args: Vec<&OsStr> = args.iter().map(OsStr::new).collect();

    let launch_options = LaunchOptionsBuilder::default()
        .headless(config.headless)
        .sandbox(false)
        .window_size(Some((config.width, config.height)))
        .path(config.chrome_path.clone())
        .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
        .args(os_args)
        .build()
        .map_err(|e| {
            BrowserError::Initialization(format!("Failed to build launch options: {}", e))
        })?;

    let browser = Browser::new(launch_options).map_err(|e| {
        BrowserError::Initialization(format!("Failed to launch browser: {}", e))
    })?;

    info!("Browser launched (headless: {})", config.headless);
    Ok(browser)
}

struct ChromeBrowser {
    browser: Arc<Browser>,
    config: BrowserConfig,
}

#[async_trait]
impl BrowserHandle for ChromeBrowser {
    async fn new_context(&self) -> Result<Box<dyn ContextHandle>> {
        let browser = Arc::clone(&self.browser);
        let id = blocking("new_context", move || {
            let context = browser.new_context().map_err(|e| {
                BrowserError::Initialization(format!("Failed to create browser context: {}", e))
            })?;
            Ok(context.get_id().to_string())
        })
        .await?;

        debug!("Opened browser context {}", id);
        Ok(Box::new(ChromeContext {
            browser: Arc::clone(&self.browser),
            id,
            config: self.config.clone(),
        }))
    }

    async fn close(&self) -> Result<()> {
        let browser = Arc::clone(&self.browser);
        blocking("close_browser", move || {
            let tabs = browser
                .get_tabs()
                .lock()
                .map(|tabs| tabs.clone())
                .map_err(|e| BrowserError::Teardown(format!("Failed to lock tabs: {}", e)))?;
            for tab in tabs {
                if let Err(e) = tab.close(false) {
                    debug!("Tab already gone during browser close: {}", e);
                }
            }
            Ok(())
        })
        .await
    }
}

struct ChromeContext {
    browser: Arc<Browser>,
    id: String,
    config: BrowserConfig,
}

#[async_trait]
impl ContextHandle for ChromeContext {
    async fn new_page(&self) -> Result<Arc<dyn Page>> {
        let browser = Arc::clone(&self.browser);
        let context_id = self.id.clone();
        let config = self.config.clone();

        let tab = blocking("new_page", move || {
            let create: Target::CreateTarget = cdp(json!({
                "url": "about:blank",
                "browserContextId": context_id,
            }))?;
            let tab = browser.new_tab_with_options(create).map_err(|e| {
                BrowserError::Initialization(format!("Failed to open page: {}", e))
            })?;

            let metrics: Emulation::SetDeviceMetricsOverride = cdp(json!({
                "width": config.width,
                "height": config.height,
                "deviceScaleFactor": 1,
                "mobile": false,
            }))?;
            tab.call_method(metrics).map_err(|e| {
                BrowserError::Initialization(format!("Failed to set viewport: {}", e))
            })?;

            if let Some(ref ua) = config.user_agent {
                tab.set_user_agent(ua, None, None).map_err(|e| {
                    BrowserError::Initialization(format!("Failed to set user agent: {}", e))
                })?;
            }

            tab.set_default_timeout(Duration::from_secs(config.navigation_timeout));
            Ok(tab)
        })
        .await?;

        Ok(Arc::new(ChromePage { tab }))
    }

    async fn close(&self) -> Result<()> {
        let browser = Arc::clone(&self.browser);
        let context_id = self.id.clone();
        blocking("close_context", move || {
            let tabs = browser
                .get_tabs()
                .lock()
                .map(|tabs| tabs.clone())
                .map_err(|e| BrowserError::Teardown(format!("Failed to lock tabs: {}", e)))?;
            let Some(control) = tabs.first() else {
                return Ok(());
            };
            let dispose: Target::DisposeBrowserContext = cdp(json!({
                "browserContextId": context_id,
            }))?;
            control.call_method(dispose).map_err(|e| {
                BrowserError::Teardown(format!("Failed to dispose context {}: {}", context_id, e))
            })?;
            Ok(())
        })
        .await
    }
}

/// One tab, driven over the DevTools protocol
pub struct ChromePage {
    tab: Arc<Tab>,
}

impl ChromePage {
    fn tab(&self) -> Arc<Tab> {
        Arc::clone(&self.tab)
    }
}

fn evaluate_main(tab: &Tab, expression: &str) -> Result<Value> {
    let result = tab
        .evaluate(expression, true)
        .map_err(|e| BrowserError::Script(format!("JavaScript execution failed: {}", e)))?;
    if matches!(result.subtype, Some(Runtime::RemoteObjectSubtype::Error)) {
        return Err(BrowserError::Script(
            result
                .description
                .unwrap_or_else(|| "script threw an error".to_string()),
        ));
    }
    Ok(result.value.unwrap_or(Value::Null))
}

fn evaluate_in_frame(tab: &Tab, frame: &FrameInfo, expression: &str) -> Result<Value> {
    let world: Cdp::CreateIsolatedWorld = cdp(json!({
        "frameId": frame.id,
        "worldName": ISOLATED_WORLD,
    }))?;
    let world = tab
        .call_method(world)
        .map_err(|e| BrowserError::Frame(format!("Frame {} is not accessible: {}", frame.index, e)))?;

    let eval: Runtime::Evaluate = cdp(json!({
        "expression": expression,
        "contextId": world.execution_context_id,
        "returnByValue": true,
        "awaitPromise": true,
    }))?;
    let reply = tab
        .call_method(eval)
        .map_err(|e| BrowserError::Script(format!("Evaluation in frame {} failed: {}", frame.index, e)))?;

    if let Some(details) = reply.exception_details {
        return Err(BrowserError::Script(format!(
            "Script threw in frame {}: {}",
            frame.index, details.text
        )));
    }
    Ok(reply.result.value.unwrap_or(Value::Null))
}

/// Call `check` every poll interval until it holds or `deadline` passes.
/// `check` always runs at least once.
fn poll_until(deadline: Instant, mut check: impl FnMut() -> bool) -> bool {
    loop {
        if check() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

fn not_visible_error(selector: &str, timeout: Duration) -> BrowserError {
    BrowserError::Interaction(format!(
        "Element '{}' is not visible within {}ms",
        selector,
        timeout.as_millis()
    ))
}

/// Poll `expression` in a frame until it returns "ok" or the timeout passes.
fn poll_frame_action(
    tab: &Tab,
    frame: &FrameInfo,
    selector: &str,
    expression: &str,
    timeout: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        let status = evaluate_in_frame(tab, frame, expression)?;
        if status == "ok" {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(if status == "hidden" {
                BrowserError::Interaction(format!(
                    "Element '{}' in frame {} is not visible within {}ms",
                    selector,
                    frame.index,
                    timeout.as_millis()
                ))
            } else {
                BrowserError::ElementNotFound(format!(
                    "Element '{}' not found in frame {} within {}ms",
                    selector,
                    frame.index,
                    timeout.as_millis()
                ))
            });
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Script fragment: sets `shown` for the element bound to `el`
const SHOWN_JS: &str = "const style = window.getComputedStyle(el); const rect = el.getBoundingClientRect(); \
     const shown = style.display !== 'none' && style.visibility !== 'hidden' \
     && rect.width > 0 && rect.height > 0;";

fn frame_click_script(selector: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({sel}); \
         if (!el) return 'missing'; {shown} if (!shown) return 'hidden'; \
         el.scrollIntoView({{ block: 'center' }}); el.click(); return 'ok'; }})()",
        sel = js_string(selector),
        shown = SHOWN_JS
    )
}

fn frame_fill_script(selector: &str, text: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({sel}); \
         if (!el) return 'missing'; {shown} if (!shown) return 'hidden'; \
         el.focus(); el.value = ''; el.value = {text}; \
         el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
         el.dispatchEvent(new Event('change', {{ bubbles: true }})); return 'ok'; }})()",
        sel = js_string(selector),
        text = js_string(text),
        shown = SHOWN_JS
    )
}

fn visibility_script(selector: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({sel}); \
         if (!el) return null; {shown} return shown; }})()",
        sel = js_string(selector),
        shown = SHOWN_JS
    )
}

/// Flatten a `Page.getFrameTree` reply in document order.
fn flatten_frame_tree(tree: &Value, frames: &mut Vec<FrameInfo>) {
    let frame = &tree["frame"];
    let index = frames.len();
    frames.push(FrameInfo::new(
        index,
        frame["id"].as_str().unwrap_or_default(),
        frame["name"].as_str().unwrap_or_default(),
        frame["url"].as_str().unwrap_or_default(),
    ));
    if let Some(children) = tree["childFrames"].as_array() {
        for child in children {
            flatten_frame_tree(child, frames);
        }
    }
}

/// Wait for `selector` to be rendered visible in the main document
fn wait_until_visible(tab: &Tab, selector: &str, deadline: Instant, timeout: Duration) -> Result<()> {
    let script = visibility_script(selector);
    let shown = poll_until(deadline, || {
        matches!(evaluate_main(tab, &script), Ok(Value::Bool(true)))
    });
    if shown {
        Ok(())
    } else {
        Err(not_visible_error(selector, timeout))
    }
}

fn settle_timeout(url: &str, timeout: Duration) -> BrowserError {
    BrowserError::Timeout(format!(
        "Navigation to {} did not settle within {}ms",
        url,
        timeout.as_millis()
    ))
}

fn element_error(selector: &str, e: impl std::fmt::Display) -> BrowserError {
    BrowserError::ElementNotFound(format!("Element '{}' not found: {}", selector, e))
}

#[async_trait]
impl Page for ChromePage {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<String> {
        let tab = self.tab();
        let url = url.to_string();
        blocking("navigate", move || {
            info!("Navigating to: {}", url);
            let deadline = Instant::now() + timeout;
            tab.set_default_timeout(timeout);
            tab.navigate_to(&url).map_err(|e| {
                BrowserError::Navigation(format!("Failed to navigate to {}: {}", url, e))
            })?;
            tab.wait_until_navigated().map_err(|e| {
                BrowserError::Navigation(format!("Navigation to {} did not complete: {}", url, e))
            })?;

            let loaded = poll_until(deadline, || {
                matches!(
                    evaluate_main(&tab, "document.readyState"),
                    Ok(Value::String(state)) if state == "complete"
                )
            });
            if !loaded {
                return Err(settle_timeout(&url, timeout));
            }

            let final_url = tab.get_url();
            info!("Navigated to: {}", final_url);
            Ok(final_url)
        })
        .await
    }

    async fn click(&self, frame: Option<&FrameInfo>, selector: &str, timeout: Duration) -> Result<()> {
        let tab = self.tab();
        let selector = selector.to_string();
        let frame = frame.filter(|f| !f.is_main).cloned();
        blocking("click", move || {
            info!("Clicking element: {}", selector);
            let deadline = Instant::now() + timeout;
            match frame {
                Some(frame) => {
                    let script = frame_click_script(&selector);
                    poll_frame_action(&tab, &frame, &selector, &script, timeout)?;
                }
                None => {
                    let element = tab
                        .wait_for_element_with_custom_timeout(&selector, timeout)
                        .map_err(|e| element_error(&selector, e))?;
                    wait_until_visible(&tab, &selector, deadline, timeout)?;
                    if let Err(e) = element.scroll_into_view() {
                        debug!("Could not scroll '{}' into view: {}", selector, e);
                    }
                    // Dispatched from script so overlays cannot intercept the click
                    element.call_js_fn(CLICK_FN, vec![], false).map_err(|e| {
                        BrowserError::Interaction(format!("Failed to click '{}': {}", selector, e))
                    })?;
                }
            }
            std::thread::sleep(CLICK_SETTLE);
            Ok(())
        })
        .await
    }

    async fn fill(
        &self,
        frame: Option<&FrameInfo>,
        selector: &str,
        text: &str,
        timeout: Duration,
    ) -> Result<()> {
        let tab = self.tab();
        let selector = selector.to_string();
        let text = text.to_string();
        let frame = frame.filter(|f| !f.is_main).cloned();
        blocking("fill", move || {
            info!("Filling element: {} ({} chars)", selector, text.chars().count());
            let deadline = Instant::now() + timeout;
            match frame {
                Some(frame) => {
                    let script = frame_fill_script(&selector, &text);
                    poll_frame_action(&tab, &frame, &selector, &script, timeout)
                }
                None => {
                    let element = tab
                        .wait_for_element_with_custom_timeout(&selector, timeout)
                        .map_err(|e| element_error(&selector, e))?;
                    wait_until_visible(&tab, &selector, deadline, timeout)?;
                    element
                        .call_js_fn(FILL_FN, vec![Value::String(text)], false)
                        .map_err(|e| {
                            BrowserError::Interaction(format!("Failed to fill '{}': {}", selector, e))
                        })?;
                    Ok(())
                }
            }
        })
        .await
    }

    async fn type_text(&self, selector: &str, text: &str, timeout: Duration) -> Result<()> {
        let tab = self.tab();
        let selector = selector.to_string();
        let text = text.to_string();
        blocking("type", move || {
            info!("Typing into element: {} ({} chars)", selector, text.chars().count());
            let element = tab
                .wait_for_element_with_custom_timeout(&selector, timeout)
                .map_err(|e| element_error(&selector, e))?;
            element.type_into(&text).map_err(|e| {
                BrowserError::Interaction(format!("Failed to type into '{}': {}", selector, e))
            })?;
            Ok(())
        })
        .await
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        let tab = self.tab();
        let key = key.to_string();
        blocking("press_key", move || {
            tab.press_key(&key).map_err(|e| {
                BrowserError::Interaction(format!("Failed to press '{}': {}", key, e))
            })?;
            Ok(())
        })
        .await
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let tab = self.tab();
        blocking("screenshot", move || {
            let png = tab
                .capture_screenshot(Cdp::CaptureScreenshotFormatOption::Png, None, None, true)
                .map_err(|e| {
                    BrowserError::Screenshot(format!("Failed to capture screenshot: {}", e))
                })?;
            debug!("Screenshot captured: {} bytes", png.len());
            Ok(png)
        })
        .await
    }

    async fn content(&self, frame: Option<&FrameInfo>) -> Result<String> {
        let tab = self.tab();
        let frame = frame.filter(|f| !f.is_main).cloned();
        blocking("content", move || match frame {
            Some(frame) => {
                let html = evaluate_in_frame(&tab, &frame, "document.documentElement.outerHTML")?;
                Ok(html.as_str().unwrap_or_default().to_string())
            }
            None => tab.get_content().map_err(|e| {
                BrowserError::Extraction(format!("Failed to get page source: {}", e))
            }),
        })
        .await
    }

    async fn text(&self, selector: &str, timeout: Duration) -> Result<Option<String>> {
        let tab = self.tab();
        let selector = selector.to_string();
        blocking("text", move || {
            let element = tab
                .wait_for_element_with_custom_timeout(&selector, timeout)
                .map_err(|e| element_error(&selector, e))?;
            let result = element.call_js_fn(TEXT_FN, vec![], false).map_err(|e| {
                BrowserError::Extraction(format!("Failed to read text of '{}': {}", selector, e))
            })?;
            Ok(result.value.and_then(|v| v.as_str().map(str::to_string)))
        })
        .await
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        let tab = self.tab();
        let selector = selector.to_string();
        blocking("wait_for_selector", move || {
            debug!("Waiting for element: {} (timeout: {:?})", selector, timeout);
            tab.wait_for_element_with_custom_timeout(&selector, timeout)
                .map_err(|e| {
                    BrowserError::Timeout(format!(
                        "Element '{}' not found within {}ms: {}",
                        selector,
                        timeout.as_millis(),
                        e
                    ))
                })?;
            Ok(())
        })
        .await
    }

    async fn is_visible(&self, selector: &str) -> Result<bool> {
        let tab = self.tab();
        let selector = selector.to_string();
        blocking("is_visible", move || {
            match evaluate_main(&tab, &visibility_script(&selector))? {
                Value::Bool(visible) => Ok(visible),
                _ => Err(BrowserError::ElementNotFound(format!(
                    "Element '{}' not found",
                    selector
                ))),
            }
        })
        .await
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        let tab = self.tab();
        let script = script.to_string();
        blocking("evaluate", move || evaluate_main(&tab, &script)).await
    }

    async fn frames(&self) -> Result<Vec<FrameInfo>> {
        let tab = self.tab();
        blocking("frames", move || {
            let tree = tab
                .call_method(Cdp::GetFrameTree(None))
                .map_err(|e| BrowserError::Frame(format!("Failed to read frame tree: {}", e)))?;
            let tree = serde_json::to_value(&tree)
                .map_err(|e| BrowserError::Frame(format!("Unreadable frame tree: {}", e)))?;
            let mut frames = Vec::new();
            flatten_frame_tree(&tree["frameTree"], &mut frames);
            Ok(frames)
        })
        .await
    }

    async fn close(&self) -> Result<()> {
        let tab = self.tab();
        blocking("close_page", move || {
            tab.close(true)
                .map_err(|e| BrowserError::Teardown(format!("Failed to close page: {}", e)))?;
            Ok(())
        })
        .await
    }
}
