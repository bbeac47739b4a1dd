//! Planner seam
//!
//! The planner decides the next browser action. The loop only needs a
//! request/response call; `LlmClient` is the production implementation.

use async_trait::async_trait;

use crate::Result;
use crate::llm::{Message, MessageContent, ToolCall, ToolDefinition, Usage, tool_calls_of};

/// One planner response: free text, tool invocations, or both
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlannerReply {
    pub content: Vec<MessageContent>,
    pub usage: Option<Usage>,
}

impl PlannerReply {
    /// A reply that ends the run
    pub fn final_answer(text: impl Into<String>) -> Self {
        Self {
            content: vec![MessageContent::Text { text: text.into() }],
            usage: None,
        }
    }

    /// A reply requesting the given invocations, in order
    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            content: calls
                .into_iter()
                .map(|c| MessageContent::ToolUse {
                    id: c.id,
                    name: c.name,
                    input: c.input,
                })
                .collect(),
            usage: None,
        }
    }

    /// Tool invocations carried by this reply
    pub fn invocations(&self) -> Vec<ToolCall> {
        tool_calls_of(&self.content)
    }
}

/// Decision-maker consulted once per loop step
#[async_trait]
pub trait Planner: Send + Sync {
    /// Choose the next action given the whole conversation and every tool descriptor
    async fn plan(&self, conversation: &[Message], tools: &[ToolDefinition]) -> Result<PlannerReply>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reply_constructors() {
        let done = PlannerReply::final_answer("all good");
        assert!(done.invocations().is_empty());

        let reply = PlannerReply::tool_calls(vec![
            ToolCall {
                id: "1".to_string(),
                name: "navigate".to_string(),
                input: json!({"url": "https://example.test"}),
            },
            ToolCall {
                id: "2".to_string(),
                name: "screenshot".to_string(),
                input: json!({"name": "done"}),
            },
        ]);
        let names: Vec<String> = reply.invocations().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["navigate", "screenshot"]);
    }
}
