//! wccc-core: planner, tool system and orchestration loop
//!
//! Shared by the browser tool crate and the agent binary: configuration,
//! the LLM planner client, the tool registry and the bounded agent loop.

pub mod agent;
pub mod config;
pub mod error;
pub mod llm;
pub mod tool;

pub use agent::{AgentLoop, AgentOptions, AgentRun, Conversation, LoopState, Planner, PlannerReply};
pub use config::{AgentConfig, BrowserSettings, Config, LlmConfig, LlmProvider, SiteConfig};
pub use error::{Error, Result};
pub use llm::{LlmClient, Message, MessageContent, Role, ToolCall, ToolDefinition};
pub use tool::{SchemaBuilder, Tool, ToolManager, ToolResult};
