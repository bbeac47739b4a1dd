//! Configuration management
//!
//! Settings are resolved in this order:
//! 1. Environment variables
//! 2. `wccc-agent.toml` in the working directory
//! 3. Defaults
//!
//! `${VAR_NAME}` references inside the TOML file are expanded from the
//! environment before parsing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::Error;

/// Default config file name looked up by [`Config::load`]
pub const CONFIG_FILE: &str = "wccc-agent.toml";

/// LLM Provider type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Anthropic Messages API
    Claude,
    /// OpenAI-compatible chat completions
    OpenAi,
    /// Gemini through its OpenAI-compatible endpoint
    #[default]
    Gemini,
}

impl LlmProvider {
    /// Parse a provider name, falling back to Gemini for unknown values
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "claude" | "anthropic" => Self::Claude,
            "openai" | "glm" => Self::OpenAi,
            _ => Self::Gemini,
        }
    }

    /// Base URL used when none is configured
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Claude => "https://api.anthropic.com/v1",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
        }
    }
}

/// LLM configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API key
    pub api_key: String,
    /// Model to use
    pub model: String,
    /// API provider
    pub provider: LlmProvider,
    /// Base URL (optional, for custom endpoints)
    pub base_url: Option<String>,
    /// Sampling temperature
    pub temperature: f32,
    /// Output token cap per planner turn
    pub max_tokens: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-2.0-flash".to_string(),
            provider: LlmProvider::default(),
            base_url: None,
            temperature: 0.0,
            max_tokens: 4096,
        }
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// Browser launch and page-action settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Whether to run in headless mode
    pub headless: bool,
    /// Viewport width in pixels
    pub width: u32,
    /// Viewport height in pixels
    pub height: u32,
    /// Navigation timeout in seconds
    pub page_timeout_secs: u64,
    /// Element wait timeout in seconds
    pub element_timeout_secs: u64,
    /// User agent presented by the page
    pub user_agent: String,
    /// Explicit Chrome/Chromium binary
    pub chrome_path: Option<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            width: 1280,
            height: 720,
            page_timeout_secs: 15,
            element_timeout_secs: 10,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
                .to_string(),
            chrome_path: None,
        }
    }
}

/// Orchestration loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Planner turn budget
    pub max_steps: usize,
    /// Dump the whole transcript after a run
    pub verbose: bool,
    /// Root under which per-run artifact directories are created
    pub artifact_root: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 100,
            verbose: false,
            artifact_root: "logs/screenshots".to_string(),
        }
    }
}

/// Target site and credentials
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Club homepage
    pub url: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            url: "https://www.wccyclingclub.com/content.aspx?page_id=0&club_id=939827"
                .to_string(),
            username: String::new(),
            password: String::new(),
        }
    }
}

impl fmt::Debug for SiteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory receiving one log file per run
    pub dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: "logs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Cron expression (seconds field included)
    pub cron: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cron: "0 0 * * * *".to_string(),
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub browser: BrowserSettings,
    pub agent: AgentConfig,
    pub site: SiteConfig,
    pub logging: LoggingConfig,
    pub schedule: ScheduleConfig,
}

impl Config {
    /// Load from `wccc-agent.toml` when present, otherwise from the environment
    pub fn load() -> crate::Result<Self> {
        if Path::new(CONFIG_FILE).exists() {
            return Self::from_toml_file(CONFIG_FILE);
        }
        Self::from_env()
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Self::default();
        config.apply_overrides(env_lookup);
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file, then apply environment overrides
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let mut config = Self::from_toml_str(&content, env_lookup)?;
        config.apply_overrides(env_lookup);
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML text after expanding `${VAR}` references through `lookup`
    pub fn from_toml_str(
        content: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> crate::Result<Self> {
        let expanded = expand_vars(content, &lookup);
        toml::from_str(&expanded).map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// Overlay values found through `lookup` (the process environment in production)
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("LLM_API_KEY").or_else(|| get("GOOGLE_API_KEY")) {
            self.llm.api_key = key;
        }
        if let Some(model) = get("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(provider) = get("LLM_PROVIDER") {
            self.llm.provider = LlmProvider::parse(&provider);
        }
        if let Some(base_url) = get("LLM_BASE_URL") {
            self.llm.base_url = Some(base_url);
        }

        if let Some(url) = get("WCCC_URL") {
            self.site.url = url;
        }
        if let Some(username) = get("WCCC_USERNAME") {
            self.site.username = username;
        }
        if let Some(password) = get("WCCC_PASSWORD") {
            self.site.password = password;
        }

        if let Some(secs) = get("PAGE_TIMEOUT_SECONDS").and_then(|v| v.parse().ok()) {
            self.browser.page_timeout_secs = secs;
        }
        if let Some(headless) = get("BROWSER_HEADLESS") {
            self.browser.headless = parse_flag(&headless);
        }
        if let Some(path) = get("CHROME_PATH") {
            self.browser.chrome_path = Some(path);
        }

        if let Some(steps) = get("AGENT_MAX_STEPS").and_then(|v| v.parse().ok()) {
            self.agent.max_steps = steps;
        }
        if let Some(verbose) = get("AGENT_VERBOSE") {
            self.agent.verbose = parse_flag(&verbose);
        }
        if let Some(dir) = get("ARTIFACT_DIR") {
            self.agent.artifact_root = dir;
        }

        if let Some(dir) = get("LOG_DIR") {
            self.logging.dir = dir;
        }
        if let Some(cron) = get("SCHEDULE_CRON") {
            self.schedule.cron = cron;
        }
    }

    /// Reject configurations that cannot start a run
    pub fn validate(&self) -> crate::Result<()> {
        if self.llm.api_key.trim().is_empty() {
            return Err(Error::Config(
                "LLM_API_KEY or GOOGLE_API_KEY not set".to_string(),
            ));
        }
        if self.agent.max_steps == 0 {
            return Err(Error::Config("agent.max_steps must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Base URL for the planner endpoint
    pub fn llm_base_url(&self) -> String {
        self.llm
            .base_url
            .clone()
            .unwrap_or_else(|| self.llm.provider.default_base_url().to_string())
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() { "" } else { "***" }
}

/// Replace `${VAR}` with the looked-up value; unknown variables expand to ""
fn expand_vars(value: &str, lookup: &impl Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                name.push(c);
            }
            if let Some(v) = lookup(&name) {
                result.push_str(&v);
            }
        } else {
            result.push(c);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.agent.max_steps, 100);
        assert_eq!(config.browser.page_timeout_secs, 15);
        assert_eq!(config.llm.provider, LlmProvider::Gemini);
        assert_eq!(config.schedule.cron, "0 0 * * * *");
        assert!(config.browser.headless);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(lookup_from(&[
            ("GOOGLE_API_KEY", "g-key"),
            ("WCCC_USERNAME", "rider@example.com"),
            ("WCCC_PASSWORD", "hunter2"),
            ("PAGE_TIMEOUT_SECONDS", "30"),
            ("AGENT_MAX_STEPS", "12"),
            ("AGENT_VERBOSE", "true"),
            ("LLM_PROVIDER", "claude"),
        ]));

        assert_eq!(config.llm.api_key, "g-key");
        assert_eq!(config.site.username, "rider@example.com");
        assert_eq!(config.site.password, "hunter2");
        assert_eq!(config.browser.page_timeout_secs, 30);
        assert_eq!(config.agent.max_steps, 12);
        assert!(config.agent.verbose);
        assert_eq!(config.llm.provider, LlmProvider::Claude);
    }

    #[test]
    fn test_llm_api_key_wins_over_google_key() {
        let mut config = Config::default();
        config.apply_overrides(lookup_from(&[
            ("LLM_API_KEY", "primary"),
            ("GOOGLE_API_KEY", "fallback"),
        ]));
        assert_eq!(config.llm.api_key, "primary");
    }

    #[test]
    fn test_empty_and_malformed_overrides_are_ignored() {
        let mut config = Config::default();
        config.apply_overrides(lookup_from(&[
            ("LLM_MODEL", "  "),
            ("PAGE_TIMEOUT_SECONDS", "soon"),
        ]));
        assert_eq!(config.llm.model, "gemini-2.0-flash");
        assert_eq!(config.browser.page_timeout_secs, 15);
    }

    #[test]
    fn test_toml_with_env_expansion() {
        let toml = r#"
            [llm]
            api_key = "${TEST_KEY}"
            provider = "openai"
            model = "gpt-4o"

            [agent]
            max_steps = 40

            [site]
            username = "${MISSING}"
        "#;

        let config = Config::from_toml_str(toml, lookup_from(&[("TEST_KEY", "abc")])).unwrap();
        assert_eq!(config.llm.api_key, "abc");
        assert_eq!(config.llm.provider, LlmProvider::OpenAi);
        assert_eq!(config.agent.max_steps, 40);
        assert_eq!(config.site.username, "");
        // untouched sections keep their defaults
        assert_eq!(config.browser.width, 1280);
    }

    #[test]
    fn test_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            "[llm]\napi_key = \"file-key\"\n\n[logging]\ndir = \"/var/log/wccc\"\n",
        )
        .unwrap();

        let config = Config::from_toml_file(&path).unwrap();
        assert!(!config.llm.api_key.is_empty());
        assert_eq!(config.browser.height, 720);

        let missing = Config::from_toml_file(dir.path().join("absent.toml"));
        assert!(matches!(missing, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_requires_api_key() {
        let config = Config::default();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::default();
        config.llm.api_key = "key".to_string();
        assert!(config.validate().is_ok());

        config.agent.max_steps = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut config = Config::default();
        config.llm.api_key = "sk-secret".to_string();
        config.site.password = "hunter2".to_string();

        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("sk-secret"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_provider_parse_and_base_url() {
        assert_eq!(LlmProvider::parse("Anthropic"), LlmProvider::Claude);
        assert_eq!(LlmProvider::parse("glm"), LlmProvider::OpenAi);
        assert_eq!(LlmProvider::parse("google"), LlmProvider::Gemini);

        let mut config = Config::default();
        assert!(config.llm_base_url().contains("generativelanguage"));
        config.llm.base_url = Some("http://localhost:8080/v1".to_string());
        assert_eq!(config.llm_base_url(), "http://localhost:8080/v1");
    }
}
