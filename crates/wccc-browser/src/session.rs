//! Browser session management
//!
//! Acquires the browser resources a run needs and releases them in reverse
//! order, tolerating failures at every teardown step.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;
use wccc_core::BrowserSettings;

use crate::driver::{BrowserDriver, BrowserHandle, ContextHandle};
use crate::error::{BrowserError, Result};
use crate::page::Page;
use crate::recovery::StaleStateRecovery;

/// Browser session configuration
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Whether to run in headless mode
    pub headless: bool,
    /// Viewport width in pixels
    pub width: u32,
    /// Viewport height in pixels
    pub height: u32,
    /// Navigation timeout in seconds
    pub navigation_timeout: u64,
    /// Element wait timeout in seconds
    pub element_timeout: u64,
    /// Enable GPU acceleration
    pub enable_gpu: bool,
    /// Custom user agent
    pub user_agent: Option<String>,
    /// Explicit browser binary, otherwise auto-detected
    pub chrome_path: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            width: 1280,
            height: 720,
            navigation_timeout: 15,
            element_timeout: 10,
            enable_gpu: false,
            user_agent: None,
            chrome_path: None,
        }
    }
}

impl BrowserConfig {
    /// Create a new configuration builder
    pub fn builder() -> BrowserConfigBuilder {
        BrowserConfigBuilder::default()
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout)
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_secs(self.element_timeout)
    }
}

impl From<&BrowserSettings> for BrowserConfig {
    fn from(settings: &BrowserSettings) -> Self {
        let mut builder = BrowserConfig::builder()
            .headless(settings.headless)
            .window_size(settings.width, settings.height)
            .navigation_timeout(settings.page_timeout_secs)
            .element_timeout(settings.element_timeout_secs);
        if !settings.user_agent.is_empty() {
            builder = builder.user_agent(settings.user_agent.clone());
        }
        if let Some(ref path) = settings.chrome_path {
            builder = builder.chrome_path(path);
        }
        builder.build()
    }
}

/// Builder for BrowserConfig
#[derive(Default)]
pub struct BrowserConfigBuilder {
    config: BrowserConfig,
}

impl BrowserConfigBuilder {
    pub fn headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }

    pub fn window_size(mut self, width: u32, height: u32) -> Self {
        self.config.width = width;
        self.config.height = height;
        self
    }

    pub fn navigation_timeout(mut self, seconds: u64) -> Self {
        self.config.navigation_timeout = seconds;
        self
    }

    pub fn element_timeout(mut self, seconds: u64) -> Self {
        self.config.element_timeout = seconds;
        self
    }

    pub fn enable_gpu(mut self, enable: bool) -> Self {
        self.config.enable_gpu = enable;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(user_agent.into());
        self
    }

    pub fn chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.chrome_path = Some(path.into());
        self
    }

    pub fn build(self) -> BrowserConfig {
        self.config
    }
}

/// Resources held by one run
///
/// Obtained from [`SessionManager::acquire`] and handed back to
/// [`SessionManager::release`], which consumes it.
pub struct Session {
    id: String,
    artifact_dir: PathBuf,
    page: Arc<dyn Page>,
    context: Box<dyn ContextHandle>,
    browser: Box<dyn BrowserHandle>,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Directory that receives this run's screenshots
    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    pub fn page(&self) -> Arc<dyn Page> {
        Arc::clone(&self.page)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("artifact_dir", &self.artifact_dir)
            .finish_non_exhaustive()
    }
}

/// Acquires and releases browser sessions against one driver
#[derive(Clone)]
pub struct SessionManager {
    driver: Arc<dyn BrowserDriver>,
    config: BrowserConfig,
    artifact_root: PathBuf,
    recovery: StaleStateRecovery,
}

impl SessionManager {
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        config: BrowserConfig,
        artifact_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            driver,
            config,
            artifact_root: artifact_root.into(),
            recovery: StaleStateRecovery::chrome_defaults(),
        }
    }

    pub fn with_recovery(mut self, recovery: StaleStateRecovery) -> Self {
        self.recovery = recovery;
        self
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    /// Recover stale state, create the run's artifact directory, then start
    /// the browser, a context and a page.
    ///
    /// If any step fails, whatever was already acquired is released before
    /// the error is returned.
    pub async fn acquire(&self) -> Result<Session> {
        self.recovery.recover().await;

        let id = new_session_id();
        let artifact_dir = self.artifact_root.join(&id);
        if let Err(e) = tokio::fs::create_dir_all(&artifact_dir).await {
            self.teardown(None, None, None).await;
            return Err(BrowserError::Initialization(format!(
                "Failed to create artifact directory {}: {}",
                artifact_dir.display(),
                e
            )));
        }

        info!(
            "Starting browser session {} (headless: {}, viewport: {}x{})",
            id, self.config.headless, self.config.width, self.config.height
        );

        let browser = match self.driver.launch(&self.config).await {
            Ok(browser) => browser,
            Err(e) => {
                self.teardown(None, None, None).await;
                return Err(e);
            }
        };

        let context = match browser.new_context().await {
            Ok(context) => context,
            Err(e) => {
                self.teardown(None, None, Some(browser)).await;
                return Err(e);
            }
        };

        let page = match context.new_page().await {
            Ok(page) => page,
            Err(e) => {
                self.teardown(None, Some(context), Some(browser)).await;
                return Err(e);
            }
        };

        info!(
            "Browser session {} ready, artifacts in {}",
            id,
            artifact_dir.display()
        );

        Ok(Session {
            id,
            artifact_dir,
            page,
            context,
            browser,
        })
    }

    /// Hand `session` to a guard that releases it even if the caller is cancelled
    pub fn guard(&self, session: Session) -> SessionGuard {
        SessionGuard {
            manager: self.clone(),
            session: Some(session),
        }
    }

    /// Close page, context and browser, then stop the driver.
    pub async fn release(&self, session: Session) {
        info!("Releasing browser session {}", session.id);
        let Session {
            page,
            context,
            browser,
            ..
        } = session;
        self.teardown(Some(page), Some(context), Some(browser)).await;
    }

    async fn teardown(
        &self,
        page: Option<Arc<dyn Page>>,
        context: Option<Box<dyn ContextHandle>>,
        browser: Option<Box<dyn BrowserHandle>>,
    ) {
        if let Some(page) = page {
            if let Err(e) = page.close().await {
                warn!("Failed to close page: {}", e);
            }
        }
        if let Some(context) = context {
            if let Err(e) = context.close().await {
                warn!("Failed to close browser context: {}", e);
            }
        }
        if let Some(browser) = browser {
            if let Err(e) = browser.close().await {
                warn!("Failed to close browser: {}", e);
            }
        }
        if let Err(e) = self.driver.stop().await {
            warn!("Failed to stop browser driver: {}", e);
        }
    }
}

/// Owns a session until it is released
///
/// Teardown runs on a spawned task, so it completes even when the future
/// awaiting [`SessionGuard::release`] is cancelled. Dropping an unreleased
/// guard (a cancelled or panicking run) spawns the same teardown.
pub struct SessionGuard {
    manager: SessionManager,
    session: Option<Session>,
}

impl SessionGuard {
    /// Tear the session down and wait for it
    pub async fn release(mut self) {
        if let Some(handle) = self.spawn_release() {
            if let Err(e) = handle.await {
                warn!("Session teardown task failed: {}", e);
            }
        }
    }

    fn spawn_release(&mut self) -> Option<JoinHandle<()>> {
        let session = self.session.take()?;
        let manager = self.manager.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => Some(runtime.spawn(async move { manager.release(session).await })),
            Err(_) => {
                warn!("No async runtime left, browser session {} not released", session.id);
                None
            }
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(session) = &self.session {
            warn!("Browser session {} dropped before release, tearing down in the background", session.id);
            self.spawn_release();
        }
    }
}

impl std::fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGuard")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

fn new_session_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}",
        chrono::Local::now().format("%Y%m%d_%H%M%S"),
        &suffix[..8]
    )
}
