//! Anthropic Claude Provider
//!
//! `LlmProvider` over the Anthropic Messages API with native tool use.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::http_client::build_http_client;
use super::provider::{missing_api_key_error, parse_http_error, LlmProvider};
use super::types::{
    LlmError, LlmRequestOptions, LlmResponse, LlmResult, Message, MessageContent, MessageRole,
    ProviderConfig, StopReason, ToolCall, ToolCallMode, ToolDefinition, UsageStats,
};

/// Default Anthropic API endpoint
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Current API version
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Claude provider
pub struct AnthropicProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(config: ProviderConfig) -> LlmResult<Self> {
        let client = build_http_client(config.timeout_secs)?;
        Ok(Self { config, client })
    }

    fn base_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or(ANTHROPIC_API_URL)
    }

    fn build_request_body(
        &self,
        messages: &[Message],
        system: Option<&str>,
        tools: &[ToolDefinition],
        request_options: &LlmRequestOptions,
    ) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.config.model_name(),
            "max_tokens": self.config.max_tokens,
            "temperature": request_options
                .temperature_override
                .unwrap_or(self.config.temperature),
        });

        if let Some(sys) = system {
            body["system"] = serde_json::json!(sys);
        }

        // System turns travel in the top-level field, never as messages
        let claude_messages: Vec<serde_json::Value> = messages
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .map(|m| self.message_to_claude(m))
            .collect();
        body["messages"] = serde_json::json!(claude_messages);

        if !tools.is_empty() && request_options.tool_call_mode != ToolCallMode::None {
            let claude_tools: Vec<serde_json::Value> =
                tools.iter().map(|t| self.tool_to_claude(t)).collect();
            body["tools"] = serde_json::json!(claude_tools);
            if request_options.tool_call_mode == ToolCallMode::Required {
                body["tool_choice"] = serde_json::json!({ "type": "any" });
            }
        }

        for (key, value) in &self.config.options {
            body[key.as_str()] = value.clone();
        }

        body
    }

    fn message_to_claude(&self, message: &Message) -> serde_json::Value {
        let role = match message.role {
            MessageRole::Assistant => "assistant",
            MessageRole::User | MessageRole::System => "user",
        };

        let content: Vec<serde_json::Value> = message
            .content
            .iter()
            .map(|c| match c {
                MessageContent::Text { text } => serde_json::json!({
                    "type": "text",
                    "text": text
                }),
                MessageContent::ToolUse { id, name, input } => serde_json::json!({
                    "type": "tool_use",
                    "id": id,
                    "name": name,
                    "input": input
                }),
                MessageContent::ToolResult {
                    tool_use_id,
                    content,
                    is_error,
                } => {
                    let mut result = serde_json::json!({
                        "type": "tool_result",
                        "tool_use_id": tool_use_id,
                        "content": content
                    });
                    if let Some(true) = is_error {
                        result["is_error"] = serde_json::json!(true);
                    }
                    result
                }
            })
            .collect();

        serde_json::json!({
            "role": role,
            "content": content
        })
    }

    fn tool_to_claude(&self, tool: &ToolDefinition) -> serde_json::Value {
        serde_json::json!({
            "name": tool.name,
            "description": tool.description,
            "input_schema": tool.input_schema
        })
    }

    fn parse_response(&self, response: ClaudeResponse) -> LlmResponse {
        let mut text_blocks = Vec::new();
        let mut tool_calls = Vec::new();

        for block in response.content {
            match block {
                ContentBlock::Text { text } => text_blocks.push(text),
                ContentBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                    id,
                    name,
                    arguments: input,
                }),
                ContentBlock::Other => {}
            }
        }

        let content = if text_blocks.is_empty() {
            None
        } else {
            Some(text_blocks.join("\n"))
        };

        LlmResponse {
            content,
            tool_calls,
            stop_reason: response
                .stop_reason
                .as_deref()
                .map(StopReason::from)
                .unwrap_or(StopReason::EndTurn),
            usage: UsageStats {
                input_tokens: response.usage.input_tokens,
                output_tokens: response.usage.output_tokens,
            },
            model: response.model,
        }
    }

    async fn post(&self, body: &serde_json::Value) -> LlmResult<(u16, String)> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| missing_api_key_error("anthropic"))?;

        let response = self
            .client
            .post(self.base_url())
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError {
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let body_text = response.text().await.map_err(|e| LlmError::NetworkError {
            message: e.to_string(),
        })?;
        Ok((status, body_text))
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn model(&self) -> &str {
        self.config.model_name()
    }

    fn supports_tools(&self) -> bool {
        true
    }

    async fn send_message(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        tools: Vec<ToolDefinition>,
        request_options: LlmRequestOptions,
    ) -> LlmResult<LlmResponse> {
        let body =
            self.build_request_body(&messages, system.as_deref(), &tools, &request_options);
        debug!(
            model = self.config.model_name(),
            messages = messages.len(),
            tools = tools.len(),
            "sending anthropic request"
        );

        let (status, body_text) = self.post(&body).await?;
        if status != 200 {
            return Err(parse_http_error(status, &body_text, "anthropic"));
        }

        let claude_response: ClaudeResponse =
            serde_json::from_str(&body_text).map_err(|e| LlmError::ParseError {
                message: format!("Failed to parse response: {}", e),
            })?;

        Ok(self.parse_response(claude_response))
    }

    async fn health_check(&self) -> LlmResult<()> {
        let body = serde_json::json!({
            "model": self.config.model_name(),
            "max_tokens": 1,
            "messages": [{"role": "user", "content": "Hi"}]
        });
        let (status, body_text) = self.post(&body).await?;
        if status == 200 {
            Ok(())
        } else {
            Err(parse_http_error(status, &body_text, "anthropic"))
        }
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

/// Claude API response format
#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ContentBlock>,
    model: String,
    stop_reason: Option<String>,
    usage: ResponseUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ResponseUsage {
    input_tokens: u32,
    output_tokens: u32,
}
