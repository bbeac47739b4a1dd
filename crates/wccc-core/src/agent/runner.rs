//! Bounded planner/tool loop
//!
//! `Idle -> Running -> {Completed, Exhausted, Failed}`. The loop hands the
//! planner the conversation and every tool descriptor, dispatches the
//! invocations it returns, and folds the results back in as one tool turn.
//! Tool-result text is never interpreted here.

use tracing::{debug, error, info, warn};

use super::conversation::Conversation;
use super::planner::Planner;
use crate::Result;
use crate::llm::{Message, MessageContent, ToolCall, Usage};
use crate::tool::{ToolManager, ToolResult};

/// Loop lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    /// The planner stopped requesting tools
    Completed,
    /// The step budget ran out first
    Exhausted,
    /// The planner could not be reached or answered garbage
    Failed,
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Exhausted | Self::Failed)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AgentOptions {
    /// Maximum planner turns per run
    pub max_steps: usize,
    /// Stop once the planner has consumed this many tokens in total
    pub max_tokens: Option<u64>,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            max_steps: 100,
            max_tokens: None,
        }
    }
}

impl AgentOptions {
    pub fn with_max_steps(max_steps: usize) -> Self {
        Self {
            max_steps,
            ..Default::default()
        }
    }
}

/// What a [`RetryHook`] wants after a batch of tool results
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookDecision {
    Continue,
    /// Append a user turn before the next planner step
    Inject(String),
    /// End the run as exhausted
    Stop(String),
}

/// Host-side retry policy seam
///
/// Retries are planner-driven by default: the task text asks for them and
/// the step budget is the only hard stop. A host-enforced policy plugs in
/// here without touching the tool contract.
pub trait RetryHook: Send {
    fn after_tools(&mut self, step: usize, calls: &[ToolCall], results: &[ToolResult]) -> HookDecision;
}

/// Default hook: never intervenes
#[derive(Debug, Default, Clone, Copy)]
pub struct PlannerDrivenRetry;

impl RetryHook for PlannerDrivenRetry {
    fn after_tools(&mut self, _: usize, _: &[ToolCall], _: &[ToolResult]) -> HookDecision {
        HookDecision::Continue
    }
}

/// Terminal outcome of a run that did not fail
#[derive(Debug, Clone)]
pub struct AgentRun {
    pub state: LoopState,
    pub conversation: Conversation,
    /// Planner turns consumed
    pub steps: usize,
    pub usage: Usage,
    /// Why the run ended early, when something other than the step budget ended it
    pub stop_reason: Option<String>,
}

impl AgentRun {
    /// Final report for the caller
    pub fn report(&self) -> String {
        match self.state {
            LoopState::Exhausted => match &self.stop_reason {
                Some(reason) => format!(
                    "Run exhausted after {} planner turns without a final answer: {}",
                    self.steps, reason
                ),
                None => format!(
                    "Run exhausted after {} planner turns without a final answer",
                    self.steps
                ),
            },
            _ => self.conversation.final_report().unwrap_or_default(),
        }
    }
}

/// Orchestration loop over one planner and one tool registry
pub struct AgentLoop<'a> {
    planner: &'a dyn Planner,
    tools: &'a ToolManager,
    options: AgentOptions,
    hook: Box<dyn RetryHook + 'a>,
    state: LoopState,
}

impl<'a> AgentLoop<'a> {
    pub fn new(planner: &'a dyn Planner, tools: &'a ToolManager, options: AgentOptions) -> Self {
        Self {
            planner,
            tools,
            options,
            hook: Box::new(PlannerDrivenRetry),
            state: LoopState::Idle,
        }
    }

    /// Replace the retry hook
    pub fn with_hook(mut self, hook: impl RetryHook + 'a) -> Self {
        self.hook = Box::new(hook);
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Drive the run to a terminal state
    ///
    /// # Errors
    /// Planner-contact failures end the run in [`LoopState::Failed`] and are
    /// returned as-is; tool failures never surface here.
    pub async fn run(&mut self, system: &str, task: &str) -> Result<AgentRun> {
        let mut conversation = Conversation::seeded(system, task);
        let definitions = self.tools.definitions();
        let mut usage = Usage::default();
        self.state = LoopState::Running;

        info!(
            tools = definitions.len(),
            max_steps = self.options.max_steps,
            "Agent loop started"
        );

        for step in 1..=self.options.max_steps {
            debug!(step, turns = conversation.len(), "Requesting planner turn");

            let reply = match self.planner.plan(conversation.turns(), &definitions).await {
                Ok(reply) => reply,
                Err(e) => {
                    self.state = LoopState::Failed;
                    error!(step, "Planner call failed: {}", e);
                    return Err(e);
                }
            };

            if let Some(u) = &reply.usage {
                usage.add(u);
            }

            let calls = reply.invocations();
            conversation.push(Message::assistant_blocks(reply.content));

            if calls.is_empty() {
                self.state = LoopState::Completed;
                info!(step, "Planner returned a final answer");
                return Ok(AgentRun {
                    state: self.state,
                    conversation,
                    steps: step,
                    usage,
                    stop_reason: None,
                });
            }

            let mut results = Vec::with_capacity(calls.len());
            let mut blocks = Vec::with_capacity(calls.len());
            for call in &calls {
                debug!(step, tool = %call.name, "Executing tool");
                let result = self.tools.execute(&call.name, call.input.clone()).await;
                info!(step, tool = %call.name, is_error = result.is_error, "Tool finished");

                blocks.push(MessageContent::ToolResult {
                    tool_use_id: call.id.clone(),
                    content: result.output.clone(),
                    is_error: result.is_error,
                });
                results.push(result);
            }
            conversation.push(Message::tool_results(blocks));

            match self.hook.after_tools(step, &calls, &results) {
                HookDecision::Continue => {}
                HookDecision::Inject(text) => {
                    debug!(step, "Retry hook injected a user turn");
                    conversation.push(Message::user(text));
                }
                HookDecision::Stop(reason) => {
                    warn!(step, "Retry hook stopped the run: {}", reason);
                    return Ok(self.exhausted(conversation, step, usage, Some(reason)));
                }
            }

            if let Some(limit) = self.options.max_tokens {
                if usage.total() >= limit {
                    warn!(step, used = usage.total(), limit, "Token budget exhausted");
                    let reason = format!("token budget of {} used up ({} spent)", limit, usage.total());
                    return Ok(self.exhausted(conversation, step, usage, Some(reason)));
                }
            }
        }

        warn!(
            max_steps = self.options.max_steps,
            "Step budget exhausted before the planner finished"
        );
        Ok(self.exhausted(conversation, self.options.max_steps, usage, None))
    }

    fn exhausted(
        &mut self,
        conversation: Conversation,
        steps: usize,
        usage: Usage,
        stop_reason: Option<String>,
    ) -> AgentRun {
        self.state = LoopState::Exhausted;
        AgentRun {
            state: self.state,
            conversation,
            steps,
            usage,
            stop_reason,
        }
    }
}
