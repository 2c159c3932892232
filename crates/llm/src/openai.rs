//! OpenAI-Compatible Provider
//!
//! `LlmProvider` over the chat-completions API. The same wire format serves
//! OpenAI itself and local Ollama servers; Ollama is treated as having no
//! native tool calling so adapters switch to prompt-based tool calls.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::http_client::build_http_client;
use super::provider::{missing_api_key_error, parse_http_error, LlmProvider};
use super::types::{
    LlmError, LlmRequestOptions, LlmResponse, LlmResult, Message, MessageContent, MessageRole,
    ProviderConfig, ProviderType, StopReason, ToolCall, ToolCallMode, ToolDefinition, UsageStats,
};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

const OLLAMA_API_URL: &str = "http://localhost:11434/v1/chat/completions";

/// OpenAI chat-completions provider (also used for Ollama)
pub struct OpenAIProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn new(config: ProviderConfig) -> LlmResult<Self> {
        let client = build_http_client(config.timeout_secs)?;
        Ok(Self { config, client })
    }

    fn is_ollama(&self) -> bool {
        self.config.provider == ProviderType::Ollama
    }

    fn base_url(&self) -> &str {
        let default = if self.is_ollama() {
            OLLAMA_API_URL
        } else {
            OPENAI_API_URL
        };
        self.config.base_url.as_deref().unwrap_or(default)
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
            "stream": false,
        });

        let mut openai_messages: Vec<serde_json::Value> = Vec::new();
        if let Some(sys) = system {
            openai_messages.push(serde_json::json!({
                "role": "system",
                "content": sys
            }));
        }
        for msg in messages {
            openai_messages.extend(self.message_to_openai(msg));
        }
        body["messages"] = serde_json::json!(openai_messages);

        if !tools.is_empty() && request_options.tool_call_mode != ToolCallMode::None {
            let openai_tools: Vec<serde_json::Value> =
                tools.iter().map(|t| self.tool_to_openai(t)).collect();
            body["tools"] = serde_json::json!(openai_tools);
            if request_options.tool_call_mode == ToolCallMode::Required {
                body["tool_choice"] = serde_json::json!("required");
            }
        }

        for (key, value) in &self.config.options {
            body[key.as_str()] = value.clone();
        }

        body
    }

    /// Convert one conversation message into chat-completions messages.
    ///
    /// Tool results become one `tool` message each; tool uses become the
    /// assistant message's `tool_calls`.
    fn message_to_openai(&self, message: &Message) -> Vec<serde_json::Value> {
        let role = match message.role {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        };

        let tool_results: Vec<serde_json::Value> = message
            .content
            .iter()
            .filter_map(|c| match c {
                MessageContent::ToolResult {
                    tool_use_id,
                    content,
                    ..
                } => Some(serde_json::json!({
                    "role": "tool",
                    "tool_call_id": tool_use_id,
                    "content": content
                })),
                _ => None,
            })
            .collect();
        if !tool_results.is_empty() {
            return tool_results;
        }

        let tool_calls: Vec<serde_json::Value> = message
            .content
            .iter()
            .filter_map(|c| match c {
                MessageContent::ToolUse { id, name, input } => Some(serde_json::json!({
                    "id": id,
                    "type": "function",
                    "function": {
                        "name": name,
                        "arguments": input.to_string()
                    }
                })),
                _ => None,
            })
            .collect();

        let text_content = message.text_content();
        let mut msg = serde_json::json!({ "role": role });
        if !tool_calls.is_empty() {
            msg["tool_calls"] = serde_json::json!(tool_calls);
            if !text_content.is_empty() {
                msg["content"] = serde_json::json!(text_content);
            }
        } else {
            msg["content"] = serde_json::json!(text_content);
        }
        vec![msg]
    }

    fn tool_to_openai(&self, tool: &ToolDefinition) -> serde_json::Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.input_schema
            }
        })
    }

    fn parse_response(&self, response: OpenAIResponse) -> LlmResponse {
        let mut content = None;
        let mut tool_calls = Vec::new();
        let mut finish_reason = None;

        if let Some(choice) = response.choices.into_iter().next() {
            finish_reason = choice.finish_reason;
            if let Some(msg) = choice.message {
                content = msg.content.filter(|c| !c.is_empty());
                for tc in msg.tool_calls.unwrap_or_default() {
                    let arguments = match serde_json::from_str(&tc.function.arguments) {
                        Ok(value) => value,
                        Err(e) => {
                            warn!(tool = %tc.function.name, error = %e, "tool call arguments are not valid JSON");
                            serde_json::Value::Null
                        }
                    };
                    tool_calls.push(ToolCall {
                        id: tc.id,
                        name: tc.function.name,
                        arguments,
                    });
                }
            }
        }

        let usage = response
            .usage
            .map(|u| UsageStats {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        LlmResponse {
            content,
            tool_calls,
            stop_reason: finish_reason
                .as_deref()
                .map(StopReason::from)
                .unwrap_or(StopReason::EndTurn),
            usage,
            model: response.model.unwrap_or_else(|| self.config.model_name().to_string()),
        }
    }

    async fn post(&self, body: &serde_json::Value) -> LlmResult<(u16, String)> {
        let mut request = self
            .client
            .post(self.base_url())
            .header("Content-Type", "application/json");

        match self.config.api_key.as_ref() {
            Some(key) => request = request.header("Authorization", format!("Bearer {}", key)),
            None if self.is_ollama() => {}
            None => return Err(missing_api_key_error(self.name())),
        }

        let response = request.json(body).send().await.map_err(|e| {
            if self.is_ollama() && e.is_connect() {
                LlmError::ProviderUnavailable {
                    message: format!("Ollama is not reachable at {}: {}", self.base_url(), e),
                }
            } else {
                LlmError::NetworkError {
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status().as_u16();
        let body_text = response.text().await.map_err(|e| LlmError::NetworkError {
            message: e.to_string(),
        })?;
        Ok((status, body_text))
    }
}

#[async_trait]
impl LlmProvider for OpenAIProvider {
    fn name(&self) -> &'static str {
        if self.is_ollama() {
            "ollama"
        } else {
            "openai"
        }
    }

    fn model(&self) -> &str {
        self.config.model_name()
    }

    fn supports_tools(&self) -> bool {
        !self.is_ollama()
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
            provider = self.name(),
            model = self.config.model_name(),
            messages = messages.len(),
            tools = tools.len(),
            "sending chat completion request"
        );

        let (status, body_text) = self.post(&body).await?;
        if status != 200 {
            return Err(parse_http_error(status, &body_text, self.name()));
        }

        let parsed: OpenAIResponse =
            serde_json::from_str(&body_text).map_err(|e| LlmError::ParseError {
                message: format!("Failed to parse response: {}", e),
            })?;
        Ok(self.parse_response(parsed))
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
            Err(parse_http_error(status, &body_text, self.name()))
        }
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    id: String,
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
