//! Tool trait definition
//!
//! Defines the core trait for page-action units that the planner can
//! invoke by name.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::fmt::Display;

use crate::Result;

/// Tool execution result
///
/// Always present: failures are carried as text with `is_error` set,
/// never as a propagated error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    /// Output string from tool execution
    pub output: String,
    /// Whether the execution resulted in an error
    pub is_error: bool,
}

impl ToolResult {
    /// Create a successful tool result
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: false,
        }
    }

    /// Create an error tool result
    pub fn error(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: true,
        }
    }

    /// Collapse a typed outcome into text
    pub fn from_outcome<E: Display>(outcome: std::result::Result<String, E>) -> Self {
        match outcome {
            Ok(text) => Self::success(text),
            Err(e) => Self::error(e.to_string()),
        }
    }
}

/// Tool trait for planner tool calls
///
/// Implement this trait to expose an action that the planner can
/// request via a tool invocation.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name (unique within a registry)
    fn name(&self) -> &str;

    /// Get the tool description (shown to the planner when selecting tools)
    fn description(&self) -> &str;

    /// Get the JSON schema for the tool's input parameters
    fn input_schema(&self) -> JsonValue;

    /// Execute the tool with the given input
    ///
    /// Implementations should report their own failures through
    /// [`ToolResult::error`]; an `Err` is still absorbed by the manager.
    async fn execute(&self, input: JsonValue) -> Result<ToolResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_outcome() {
        let ok: std::result::Result<String, String> = Ok("done".to_string());
        assert_eq!(ToolResult::from_outcome(ok), ToolResult::success("done"));

        let err: std::result::Result<String, String> = Err("Element '#x' not found".to_string());
        let result = ToolResult::from_outcome(err);
        assert!(result.is_error);
        assert_eq!(result.output, "Element '#x' not found");
    }
}
