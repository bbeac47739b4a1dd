//! LLM API HTTP Client
//!
//! Supports the Anthropic Messages API and OpenAI-compatible APIs
//! (OpenAI, GLM, Gemini).

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::agent::{Planner, PlannerReply};
use crate::config::{Config, LlmProvider};
use crate::error::{Error, Result};

use super::types::*;

/// Planner backed by a hosted LLM
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    provider: LlmProvider,
    temperature: f32,
    max_tokens: u64,
}

impl LlmClient {
    /// Create a new LLM client
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(Error::Http)?;

        Ok(Self {
            client,
            api_key: config.llm.api_key.clone(),
            model: config.llm.model.clone(),
            base_url: config.llm_base_url(),
            provider: config.llm.provider.clone(),
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
        })
    }

    /// Get the model name
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get the provider type
    pub fn provider(&self) -> &LlmProvider {
        &self.provider
    }

    async fn send_anthropic(
        &self,
        conversation: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<PlannerReply> {
        let url = format!("{}/messages", self.base_url);
        let request = MessagesRequest::from_conversation(
            &self.model,
            self.max_tokens,
            self.temperature,
            conversation,
            tools,
        );

        debug!("Sending request to Anthropic API: {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        let body = Self::read_body(response).await?;
        let parsed: MessagesResponse = serde_json::from_str(&body).map_err(|e| {
            Error::Planner(format!("Failed to parse response: {} - {}", e, body))
        })?;

        info!(
            "Anthropic API response: stop_reason={:?}, tokens={}",
            parsed.stop_reason,
            parsed.usage.map(|u| u.output_tokens).unwrap_or(0)
        );

        Ok(PlannerReply {
            content: parsed.content,
            usage: parsed.usage,
        })
    }

    async fn send_openai(
        &self,
        conversation: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<PlannerReply> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatCompletionRequest::from_conversation(
            &self.model,
            self.max_tokens,
            self.temperature,
            conversation,
            tools,
        );

        debug!("Sending request to OpenAI-compatible API: {}", url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        let body = Self::read_body(response).await?;
        let parsed: ChatCompletionResponse = serde_json::from_str(&body).map_err(|e| {
            Error::Planner(format!("Failed to parse response: {} - {}", e, body))
        })?;

        if parsed.choices.is_empty() {
            return Err(Error::Planner(format!("Response had no choices: {}", body)));
        }

        let finish_reason = parsed.choices[0].finish_reason.clone();
        let (content, usage) = parsed.into_blocks();

        info!(
            "OpenAI-compatible API response: finish_reason={:?}, tokens={}",
            finish_reason,
            usage.map(|u| u.output_tokens).unwrap_or(0)
        );

        Ok(PlannerReply { content, usage })
    }

    async fn read_body(response: reqwest::Response) -> Result<String> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!("Planner API error: {} - {}", status, body);
            return Err(Error::Planner(format!("{}: {}", status, body)));
        }

        Ok(body)
    }
}

#[async_trait]
impl Planner for LlmClient {
    async fn plan(&self, conversation: &[Message], tools: &[ToolDefinition]) -> Result<PlannerReply> {
        match self.provider {
            LlmProvider::Claude => self.send_anthropic(conversation, tools).await,
            LlmProvider::OpenAi | LlmProvider::Gemini => self.send_openai(conversation, tools).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_uses_provider_default_base_url() {
        let mut config = Config::default();
        config.llm.api_key = "key".to_string();
        config.llm.provider = LlmProvider::Claude;
        config.llm.model = "claude-sonnet".to_string();

        let client = LlmClient::new(&config).unwrap();
        assert_eq!(client.model(), "claude-sonnet");
        assert_eq!(client.provider(), &LlmProvider::Claude);
        assert_eq!(client.base_url, "https://api.anthropic.com/v1");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_an_error() {
        let mut config = Config::default();
        config.llm.api_key = "key".to_string();
        config.llm.base_url = Some("http://127.0.0.1:9".to_string());

        let client = LlmClient::new(&config).unwrap();
        let result = client.plan(&[Message::user("hi")], &[]).await;
        assert!(result.is_err());
    }
}
