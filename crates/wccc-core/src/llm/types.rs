//! Conversation and planner wire types

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// One turn of the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<MessageContent>,
}

impl Message {
    /// Create a system message
    pub fn system(text: impl Into<String>) -> Self {
        Self::text(Role::System, text)
    }

    /// Create a user message with text
    pub fn user(text: impl Into<String>) -> Self {
        Self::text(Role::User, text)
    }

    /// Create an assistant message with text
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::text(Role::Assistant, text)
    }

    /// Create an assistant message from raw planner blocks
    pub fn assistant_blocks(content: Vec<MessageContent>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    /// Create a tool turn carrying one result block per invocation
    pub fn tool_results(results: Vec<MessageContent>) -> Self {
        Self {
            role: Role::Tool,
            content: results,
        }
    }

    fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: vec![MessageContent::Text { text: text.into() }],
        }
    }

    /// Get text content from message
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                MessageContent::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Tool invocations requested in this turn, in emission order
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        tool_calls_of(&self.content)
    }
}

/// Content block in a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: String },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

/// A tool invocation emitted by the planner
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: Value,
}

/// Extract tool invocations from content blocks, in emission order
pub fn tool_calls_of(content: &[MessageContent]) -> Vec<ToolCall> {
    content
        .iter()
        .filter_map(|c| match c {
            MessageContent::ToolUse { id, name, input } => Some(ToolCall {
                id: id.clone(),
                name: name.clone(),
                input: input.clone(),
            }),
            _ => None,
        })
        .collect()
}

/// Tool descriptor presented to the planner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// Token usage information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

impl Usage {
    pub fn add(&mut self, other: &Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }

    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

// ============================================================================
// Anthropic Messages API
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct WireMessage {
    pub role: &'static str,
    pub content: Vec<MessageContent>,
}

/// Messages API request
#[derive(Debug, Clone, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    pub temperature: f32,
}

impl MessagesRequest {
    /// Build from the conversation; system turns are lifted into `system`
    /// and tool turns travel as user turns of `tool_result` blocks.
    pub fn from_conversation(
        model: &str,
        max_tokens: u64,
        temperature: f32,
        conversation: &[Message],
        tools: &[ToolDefinition],
    ) -> Self {
        let system = conversation
            .iter()
            .filter(|m| m.role == Role::System)
            .map(Message::text_content)
            .collect::<Vec<_>>();

        let messages = conversation
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| WireMessage {
                role: match m.role {
                    Role::Assistant => "assistant",
                    _ => "user",
                },
                content: m.content.clone(),
            })
            .collect();

        Self {
            model: model.to_string(),
            max_tokens,
            system: if system.is_empty() {
                None
            } else {
                Some(system.join("\n\n"))
            },
            messages,
            tools: tools.to_vec(),
            temperature,
        }
    }
}

/// Messages API response
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub id: String,
    pub content: Vec<MessageContent>,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

// ============================================================================
// OpenAI-compatible types (OpenAI, GLM, Gemini)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenAiMessage {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallResponse>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl OpenAiMessage {
    fn plain(role: &str, content: String) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

/// OpenAI-compatible tool definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiTool {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: OpenAiFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiFunction {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl From<&ToolDefinition> for OpenAiTool {
    fn from(tool: &ToolDefinition) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: OpenAiFunction {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.input_schema.clone(),
            },
        }
    }
}

/// OpenAI-compatible chat completion request
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<OpenAiMessage>,
    pub max_tokens: u64,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<OpenAiTool>,
}

impl ChatCompletionRequest {
    pub fn from_conversation(
        model: &str,
        max_tokens: u64,
        temperature: f32,
        conversation: &[Message],
        tools: &[ToolDefinition],
    ) -> Self {
        let mut messages = Vec::with_capacity(conversation.len());

        for msg in conversation {
            match msg.role {
                Role::System | Role::User => {
                    messages.push(OpenAiMessage::plain(msg.role.as_str(), msg.text_content()));
                }
                Role::Assistant => {
                    let calls: Vec<ToolCallResponse> = msg
                        .tool_calls()
                        .into_iter()
                        .map(|c| ToolCallResponse {
                            id: c.id,
                            call_type: "function".to_string(),
                            function: FunctionCallResponse {
                                name: c.name,
                                arguments: c.input.to_string(),
                            },
                        })
                        .collect();
                    let text = msg.text_content();
                    messages.push(OpenAiMessage {
                        role: "assistant".to_string(),
                        content: if text.is_empty() { None } else { Some(text) },
                        tool_calls: if calls.is_empty() { None } else { Some(calls) },
                        tool_call_id: None,
                    });
                }
                Role::Tool => {
                    for block in &msg.content {
                        if let MessageContent::ToolResult {
                            tool_use_id,
                            content,
                            ..
                        } = block
                        {
                            messages.push(OpenAiMessage {
                                role: "tool".to_string(),
                                content: Some(content.clone()),
                                tool_calls: None,
                                tool_call_id: Some(tool_use_id.clone()),
                            });
                        }
                    }
                }
            }
        }

        Self {
            model: model.to_string(),
            messages,
            max_tokens,
            temperature,
            tools: tools.iter().map(OpenAiTool::from).collect(),
        }
    }
}

/// OpenAI-compatible chat completion response
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub id: String,
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<OpenAiUsage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: OpenAiMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallResponse {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,
    pub function: FunctionCallResponse,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCallResponse {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct OpenAiUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

impl ChatCompletionResponse {
    /// Convert the first choice into content blocks.
    ///
    /// Malformed arguments are kept as a JSON string so the tool reports
    /// the problem instead of the run failing.
    pub fn into_blocks(self) -> (Vec<MessageContent>, Option<Usage>) {
        let usage = self.usage.map(|u| Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        });

        let Some(choice) = self.choices.into_iter().next() else {
            return (vec![], usage);
        };

        let mut content = Vec::new();
        if let Some(text) = choice.message.content.filter(|t| !t.is_empty()) {
            content.push(MessageContent::Text { text });
        }
        for (index, tc) in choice.message.tool_calls.unwrap_or_default().into_iter().enumerate() {
            let input = if tc.function.arguments.trim().is_empty() {
                json!({})
            } else {
                serde_json::from_str(&tc.function.arguments)
                    .unwrap_or(Value::String(tc.function.arguments.clone()))
            };
            let id = if tc.id.is_empty() {
                format!("call_{}", index)
            } else {
                tc.id
            };
            content.push(MessageContent::ToolUse {
                id,
                name: tc.function.name,
                input,
            });
        }

        (content, usage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_conversation() -> Vec<Message> {
        vec![
            Message::system("You drive a browser."),
            Message::user("Open the homepage."),
            Message::assistant_blocks(vec![
                MessageContent::Text {
                    text: "Navigating first.".to_string(),
                },
                MessageContent::ToolUse {
                    id: "call_1".to_string(),
                    name: "navigate".to_string(),
                    input: json!({"url": "https://example.test"}),
                },
            ]),
            Message::tool_results(vec![MessageContent::ToolResult {
                tool_use_id: "call_1".to_string(),
                content: "https://example.test/".to_string(),
                is_error: false,
            }]),
        ]
    }

    #[test]
    fn test_message_helpers() {
        let msg = &sample_conversation()[2];
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.text_content(), "Navigating first.");

        let calls = msg.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "navigate");
        assert_eq!(calls[0].input["url"], "https://example.test");
    }

    #[test]
    fn test_anthropic_request_lifts_system_and_maps_tool_turns() {
        let conversation = sample_conversation();
        let request = MessagesRequest::from_conversation("m", 1024, 0.0, &conversation, &[]);

        assert_eq!(request.system.as_deref(), Some("You drive a browser."));
        let roles: Vec<_> = request.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec!["user", "assistant", "user"]);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][2]["content"][0]["type"], "tool_result");
        assert!(json.get("tools").is_none());
    }

    #[test]
    fn test_openai_request_expands_tool_results() {
        let conversation = sample_conversation();
        let tools = vec![ToolDefinition::new("navigate", "Go to a URL", json!({"type": "object"}))];
        let request = ChatCompletionRequest::from_conversation("m", 1024, 0.0, &conversation, &tools);

        assert_eq!(request.messages.len(), 4);
        assert_eq!(request.messages[0].role, "system");

        let assistant = &request.messages[2];
        let calls = assistant.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "navigate");
        assert_eq!(calls[0].id, "call_1");

        let tool = &request.messages[3];
        assert_eq!(tool.role, "tool");
        assert_eq!(tool.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(request.tools[0].function.name, "navigate");
    }

    #[test]
    fn test_openai_response_into_blocks() {
        let body = json!({
            "id": "resp",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [
                        {"id": "", "type": "function", "function": {"name": "screenshot", "arguments": "{\"name\":\"home\"}"}},
                        {"id": "b", "type": "function", "function": {"name": "click", "arguments": "{not json"}}
                    ]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        });

        let response: ChatCompletionResponse = serde_json::from_value(body).unwrap();
        let (blocks, usage) = response.into_blocks();
        let calls = tool_calls_of(&blocks);

        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id, "call_0");
        assert_eq!(calls[0].input["name"], "home");
        assert_eq!(calls[1].input, Value::String("{not json".to_string()));
        assert_eq!(usage.unwrap().output_tokens, 5);
    }

    #[test]
    fn test_anthropic_response_parses_tool_use() {
        let body = json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "model": "claude",
            "content": [
                {"type": "text", "text": "Clicking"},
                {"type": "tool_use", "id": "tu_1", "name": "click", "input": {"selector": "#go"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 3, "output_tokens": 4}
        });

        let response: MessagesResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.stop_reason.as_deref(), Some("tool_use"));
        assert_eq!(tool_calls_of(&response.content)[0].input["selector"], "#go");
    }
}
