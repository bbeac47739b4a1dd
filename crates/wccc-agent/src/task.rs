//! System prompt and workflow task text
//!
//! The retry policy lives here, in prose: the planner is asked to retry a
//! failed action up to three times. Nothing in the loop enforces it.

use std::fmt;
use std::str::FromStr;

use wccc_core::config::{BrowserSettings, SiteConfig};
use wccc_core::ToolDefinition;

use crate::error::{AgentError, Result};

/// Page used by the smoke workflow
pub const SMOKE_URL: &str = "https://example.com";
pub const RETRY_ATTEMPTS: usize = 3;

const MASK: &str = "********";

/// A canned task for the agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Workflow {
    /// Open a neutral page and take a screenshot
    Smoke,
    /// Load the club homepage and describe it
    Home,
    SignIn,
    /// Sign in, find a ride matching the search term and register
    Signup { search: String },
}

impl Workflow {
    pub const NAMES: [&'static str; 4] = ["smoke", "home", "sign-in", "signup"];

    /// Build from a CLI name; `signup` needs a search term
    pub fn from_name(name: &str, search: Option<&str>) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "smoke" => Ok(Self::Smoke),
            "home" => Ok(Self::Home),
            "sign-in" | "signin" | "login" => Ok(Self::SignIn),
            "signup" | "sign-up" => {
                let search = search
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| {
                        AgentError::Task("the signup workflow needs a ride search term".to_string())
                    })?;
                Ok(Self::Signup {
                    search: search.to_string(),
                })
            }
            other => Err(AgentError::Task(format!(
                "unknown workflow '{}', expected one of: {}",
                other,
                Self::NAMES.join(", ")
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Smoke => "smoke",
            Self::Home => "home",
            Self::SignIn => "sign-in",
            Self::Signup { .. } => "signup",
        }
    }

    pub fn needs_credentials(&self) -> bool {
        matches!(self, Self::SignIn | Self::Signup { .. })
    }

    /// The user turn that starts the run
    pub fn task_text(&self, site: &SiteConfig) -> Result<String> {
        if self.needs_credentials() && (site.username.is_empty() || site.password.is_empty()) {
            return Err(AgentError::Task(format!(
                "the {} workflow needs WCCC_USERNAME and WCCC_PASSWORD",
                self.name()
            )));
        }

        let text = match self {
            Self::Smoke => format!(
                "Navigate to {SMOKE_URL} and take a screenshot of the page.\n\
                 Report what you see on the page."
            ),
            Self::Home => format!(
                "Navigate to {url} and take a screenshot of the page.\n\
                 Confirm that you have successfully loaded the WCCC Cycling Club website.\n\
                 Report what you see on the homepage.",
                url = site.url
            ),
            Self::SignIn => format!(
                "{login}\n\
                 Report whether login was successful and what you see on the page after login.",
                login = login_steps(site)
            ),
            Self::Signup { search } => format!(
                "{login}\n\
                 7. Once logged in, open the ride calendar or events list\n\
                 8. Find the upcoming ride matching \"{search}\"\n\
                 9. Open it and register for the ride, confirming any dialogs\n\
                 10. Take a screenshot of the registration confirmation\n\n\
                 If no ride matches \"{search}\", report the rides you found instead of registering.\n\
                 Report whether the registration succeeded.",
                login = login_steps(site),
            ),
        };
        Ok(text)
    }
}

impl fmt::Display for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signup { search } => write!(f, "signup ({})", search),
            other => f.write_str(other.name()),
        }
    }
}

impl FromStr for Workflow {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s, None)
    }
}

fn login_steps(site: &SiteConfig) -> String {
    format!(
        "1. Navigate to {url}\n\
         2. Find the login form on the page (it may be inside a frame; use list_frames)\n\
         3. Enter these credentials:\n   \
            - Username/Email: {user}\n   \
            - Password: {password}\n\
         4. Submit the login form\n\
         5. Take a screenshot after the login attempt\n\
         6. Verify that you are now logged in (look for a user profile, logout button or welcome message)\n\n\
         IMPORTANT: If the login fails, review what went wrong from the page state, and retry.\n\
         You have up to {RETRY_ATTEMPTS} attempts to log in successfully.\n\
         After {RETRY_ATTEMPTS} failed attempts, report the error and stop.\n",
        url = site.url,
        user = site.username,
        password = site.password,
    )
}

/// System turn: role, tool list, ground rules and run context
pub fn system_prompt(site: &SiteConfig, browser: &BrowserSettings, tools: &[ToolDefinition]) -> String {
    let tool_lines = tools
        .iter()
        .map(|t| format!("- {}: {}", t.name, t.description))
        .collect::<Vec<_>>()
        .join("\n");

    let username = if site.username.is_empty() {
        "(not configured)"
    } else {
        site.username.as_str()
    };

    format!(
        "You are an automation agent that helps sign up for cycling rides on the WCCC website ({url}).\n\n\
         You control a single browser page through these tools:\n{tool_lines}\n\n\
         Always take a screenshot after important actions to document what you see.\n\
         If an action fails, review the current page state and retry up to {RETRY_ATTEMPTS} times before giving up.\n\
         When you are done, answer with a plain-text report and no tool calls.\n\n\
         Current task context:\n\
         - WCCC Username: {username}\n\
         - Page timeout: {timeout} seconds\n",
        url = site.url,
        timeout = browser.page_timeout_secs,
    )
}

/// Replace every occurrence of each non-empty secret
pub fn redact(text: &str, secrets: &[&str]) -> String {
    secrets
        .iter()
        .filter(|s| !s.is_empty())
        .fold(text.to_string(), |acc, secret| acc.replace(secret, MASK))
}

/// The two opening turns of a run
#[derive(Clone)]
pub struct TaskPrompt {
    pub workflow: Workflow,
    pub system: String,
    pub task: String,
}

impl TaskPrompt {
    pub fn build(
        workflow: Workflow,
        site: &SiteConfig,
        browser: &BrowserSettings,
        tools: &[ToolDefinition],
    ) -> Result<Self> {
        let task = workflow.task_text(site)?;
        Ok(Self {
            system: system_prompt(site, browser, tools),
            task,
            workflow,
        })
    }
}

impl fmt::Debug for TaskPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskPrompt")
            .field("workflow", &self.workflow)
            .field("task_chars", &self.task.chars().count())
            .finish_non_exhaustive()
    }
}
