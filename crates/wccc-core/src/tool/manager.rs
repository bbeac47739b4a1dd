//! Tool manager for registering and executing tools

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::warn;

use crate::llm::ToolDefinition;
use crate::tool::{Tool, ToolResult};
use crate::{Error, Result};

/// Manager for registered tools
///
/// Keeps registration order so the descriptor set presented to the
/// planner is stable across runs.
pub struct ToolManager {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolManager {
    /// Create a new empty tool manager
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a tool
    ///
    /// # Errors
    /// Returns an error if a tool with the same name is already registered
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(Error::Config(format!("Tool '{}' registered twice", name)));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&i| Arc::clone(&self.tools[i]))
    }

    /// All tool descriptors, in registration order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition::new(t.name(), t.description(), t.input_schema()))
            .collect()
    }

    /// Check that every expected name is registered
    ///
    /// Run at startup so a name enumerated to the planner can never miss
    /// the dispatcher.
    pub fn validate<S: AsRef<str>>(&self, expected: &[S]) -> Result<()> {
        let missing: Vec<&str> = expected
            .iter()
            .map(AsRef::as_ref)
            .filter(|name| !self.contains(name))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::UnknownTool(missing.join(", ")))
        }
    }

    /// Execute a tool by name
    ///
    /// Never fails: unknown names and tool errors come back as error results.
    pub async fn execute(&self, name: &str, input: JsonValue) -> ToolResult {
        let Some(tool) = self.get(name) else {
            warn!(tool = name, "Planner requested an unregistered tool");
            return ToolResult::error(format!(
                "Unknown tool: {}. Available tools: {}",
                name,
                self.tool_names().join(", ")
            ));
        };

        match tool.execute(input).await {
            Ok(result) => result,
            Err(e) => ToolResult::error(format!("Tool '{}' failed: {}", name, e)),
        }
    }

    /// Check if a tool is registered
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if no tools are registered
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Get all registered tool names, in registration order
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }
}

impl Default for ToolManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the text argument"
        }

        fn input_schema(&self) -> JsonValue {
            json!({"type": "object", "properties": {"text": {"type": "string"}}})
        }

        async fn execute(&self, input: JsonValue) -> Result<ToolResult> {
            match input["text"].as_str() {
                Some(text) => Ok(ToolResult::success(text)),
                None => Err(Error::ToolExecution("missing text".to_string())),
            }
        }
    }

    struct NamedTool(&'static str);

    #[async_trait]
    impl Tool for NamedTool {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            ""
        }

        fn input_schema(&self) -> JsonValue {
            json!({})
        }

        async fn execute(&self, _input: JsonValue) -> Result<ToolResult> {
            Ok(ToolResult::success(self.0))
        }
    }

    #[tokio::test]
    async fn test_execute_registered_tool() {
        let mut manager = ToolManager::new();
        manager.register(Arc::new(EchoTool)).unwrap();

        let result = manager.execute("echo", json!({"text": "hi"})).await;
        assert_eq!(result, ToolResult::success("hi"));
    }

    #[tokio::test]
    async fn test_tool_error_is_absorbed() {
        let mut manager = ToolManager::new();
        manager.register(Arc::new(EchoTool)).unwrap();

        let result = manager.execute("echo", json!({})).await;
        assert!(result.is_error);
        assert!(result.output.contains("echo"));
        assert!(result.output.contains("missing text"));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_an_error_result() {
        let mut manager = ToolManager::new();
        manager.register(Arc::new(EchoTool)).unwrap();

        let result = manager.execute("teleport", json!({})).await;
        assert!(result.is_error);
        assert!(result.output.contains("Unknown tool: teleport"));
        assert!(result.output.contains("echo"));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut manager = ToolManager::new();
        manager.register(Arc::new(EchoTool)).unwrap();
        assert!(manager.register(Arc::new(EchoTool)).is_err());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_definitions_keep_registration_order() {
        let mut manager = ToolManager::new();
        for name in ["navigate", "click", "fill", "wait"] {
            manager.register(Arc::new(NamedTool(name))).unwrap();
        }

        let names: Vec<String> = manager.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["navigate", "click", "fill", "wait"]);
        assert_eq!(manager.tool_names(), vec!["navigate", "click", "fill", "wait"]);
    }

    #[test]
    fn test_validate() {
        let mut manager = ToolManager::new();
        manager.register(Arc::new(NamedTool("navigate"))).unwrap();

        assert!(manager.validate(&["navigate"]).is_ok());
        match manager.validate(&["navigate", "click", "fill"]) {
            Err(Error::UnknownTool(missing)) => assert_eq!(missing, "click, fill"),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
