//! Run driver: one workflow, one session, one bounded agent loop
//!
//! The session is released exactly once on every path out of [`WorkflowRunner::run`],
//! including planner failures and a run future dropped mid-flight.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info};
use wccc_browser::{
    BrowserConfig, BrowserDriver, SessionManager, StaleStateRecovery, ToolContext,
    browser_tool_definitions, register_browser_tools,
};
use wccc_core::agent::transcript::{self, Verbosity};
use wccc_core::{AgentLoop, AgentOptions, AgentRun, Config, LoopState, Planner, ToolManager};

use crate::error::Result;
use crate::task::{TaskPrompt, Workflow, redact};

pub struct WorkflowRunner {
    config: Config,
    sessions: SessionManager,
}

impl WorkflowRunner {
    pub fn new(config: Config, driver: Arc<dyn BrowserDriver>) -> Self {
        let browser = BrowserConfig::from(&config.browser);
        let sessions = SessionManager::new(driver, browser, &config.agent.artifact_root);
        Self { config, sessions }
    }

    /// Replace the stale-state recovery run before each launch
    pub fn with_recovery(mut self, recovery: StaleStateRecovery) -> Self {
        self.sessions = self.sessions.with_recovery(recovery);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Secrets that must never reach a log line or a printed transcript
    pub fn secrets(&self) -> Vec<&str> {
        vec![self.config.site.password.as_str()]
    }

    /// Run `workflow` to a terminal state
    ///
    /// # Errors
    /// Fails before launching a browser when the workflow cannot be built,
    /// and after teardown when the session or the planner fails.
    pub async fn run(&self, planner: &dyn Planner, workflow: &Workflow) -> Result<AgentRun> {
        let prompt = TaskPrompt::build(
            workflow.clone(),
            &self.config.site,
            &self.config.browser,
            &browser_tool_definitions(),
        )?;

        info!(workflow = %workflow, "Starting workflow");
        debug!("Task: {}", redact(&prompt.task, &self.secrets()));

        let started = Instant::now();
        let session = self.sessions.acquire().await?;
        let ctx = Arc::new(ToolContext::for_session(&session, self.sessions.config()));
        // from here on teardown happens even if this future is dropped
        let guard = self.sessions.guard(session);

        let outcome = self.drive(ctx, planner, &prompt).await;
        guard.release().await;

        let elapsed = started.elapsed().as_secs_f64();
        match &outcome {
            Ok(run) => {
                info!(
                    workflow = %workflow,
                    state = ?run.state,
                    steps = run.steps,
                    input_tokens = run.usage.input_tokens,
                    output_tokens = run.usage.output_tokens,
                    "Workflow finished in {:.1}s",
                    elapsed
                );
                if run.state == LoopState::Exhausted {
                    info!("{}", run.report());
                }
            }
            Err(e) => error!(workflow = %workflow, "Workflow failed after {:.1}s: {}", elapsed, e),
        }

        outcome
    }

    async fn drive(&self, ctx: Arc<ToolContext>, planner: &dyn Planner, prompt: &TaskPrompt) -> Result<AgentRun> {
        let mut tools = ToolManager::new();
        register_browser_tools(&mut tools, ctx)?;

        // the prompt was written from the offline listing; the registry must match it
        let advertised: Vec<String> = browser_tool_definitions().into_iter().map(|d| d.name).collect();
        tools.validate(advertised.as_slice())?;

        let options = AgentOptions::with_max_steps(self.config.agent.max_steps);
        let run = AgentLoop::new(planner, &tools, options)
            .run(&prompt.system, &prompt.task)
            .await?;
        Ok(run)
    }

    /// Transcript for the console, with secrets masked
    pub fn render(&self, run: &AgentRun, verbose: bool) -> String {
        let verbosity = if verbose { Verbosity::Verbose } else { Verbosity::Terse };
        let mut body = transcript::render(&run.conversation, verbosity);
        if run.state == LoopState::Exhausted {
            body = format!("{}\n\n{}", body, run.report());
        }
        redact(&body, &self.secrets())
    }
}

/// One-shot helper over [`WorkflowRunner`]
pub async fn run_workflow(
    config: Config,
    driver: Arc<dyn BrowserDriver>,
    planner: &dyn Planner,
    workflow: &Workflow,
) -> Result<AgentRun> {
    WorkflowRunner::new(config, driver).run(planner, workflow).await
}
