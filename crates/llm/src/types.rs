//! LLM Types
//!
//! Conversation, tool and response types shared by every provider, plus the
//! provider configuration and error taxonomy.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Supported LLM provider types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    #[default]
    Anthropic,
    OpenAI,
    Ollama,
}

impl ProviderType {
    /// Model used when the configuration does not name one.
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderType::Anthropic => "claude-sonnet-4-20250514",
            ProviderType::OpenAI => "gpt-4o",
            ProviderType::Ollama => "qwen2.5-coder:14b",
        }
    }

    /// Environment variable holding the API key, if the provider needs one.
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            ProviderType::Anthropic => Some("ANTHROPIC_API_KEY"),
            ProviderType::OpenAI => Some("OPENAI_API_KEY"),
            ProviderType::Ollama => None,
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderType::Anthropic => write!(f, "anthropic"),
            ProviderType::OpenAI => write!(f, "openai"),
            ProviderType::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for ProviderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(ProviderType::Anthropic),
            "openai" => Ok(ProviderType::OpenAI),
            "ollama" => Ok(ProviderType::Ollama),
            other => Err(format!("unknown provider '{}'", other)),
        }
    }
}

/// Tool calling mode preference for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallMode {
    /// Provider chooses when to call tools.
    #[default]
    Auto,
    /// Provider must call one of the offered tools.
    Required,
    /// Disable tool calling for this request.
    None,
}

/// How far a provider's native tool calling can be trusted.
///
/// `supports_tools()` is the API capability; this is what adapters use to
/// pick between native tools and prompt-based tool calling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallReliability {
    /// Native tool calling works consistently (Anthropic, OpenAI).
    Reliable,
    /// Native tools are accepted but emission is inconsistent.
    Unreliable,
    /// No native tool calling; adapters fall back to prompt instructions.
    None,
}

/// Per-request options for provider behavior.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmRequestOptions {
    #[serde(default)]
    pub tool_call_mode: ToolCallMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_override: Option<f32>,
}

impl LlmRequestOptions {
    pub fn required_tool() -> Self {
        Self {
            tool_call_mode: ToolCallMode::Required,
            temperature_override: None,
        }
    }
}

/// Configuration for an LLM provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub provider: ProviderType,
    /// API key (not needed for Ollama)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Base URL override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Model name; empty means the provider default
    #[serde(default)]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Whole-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Provider-specific request fields merged into the body
    #[serde(default)]
    pub options: HashMap<String, serde_json::Value>,
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.7
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: ProviderType::Anthropic,
            api_key: None,
            base_url: None,
            model: ProviderType::Anthropic.default_model().to_string(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            options: HashMap::new(),
        }
    }
}

impl ProviderConfig {
    /// The configured model, or the provider default when unset.
    pub fn model_name(&self) -> &str {
        if self.model.trim().is_empty() {
            self.provider.default_model()
        } else {
            &self.model
        }
    }
}

/// Message role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// Content block within a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: String },
    /// Tool use request from the assistant
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    /// Result of executing a tool use
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: Vec<MessageContent>,
}

impl Message {
    /// Create a simple text message
    pub fn text(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            role,
            content: vec![MessageContent::Text { text: text.into() }],
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::text(MessageRole::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::text(MessageRole::Assistant, text)
    }

    /// Assistant turn carrying optional narration and the tool calls it made.
    pub fn assistant_with_tools(text: Option<&str>, calls: &[ToolCall]) -> Self {
        let mut content = Vec::with_capacity(calls.len() + 1);
        if let Some(text) = text.filter(|t| !t.trim().is_empty()) {
            content.push(MessageContent::Text {
                text: text.to_string(),
            });
        }
        content.extend(calls.iter().map(|call| MessageContent::ToolUse {
            id: call.id.clone(),
            name: call.name.clone(),
            input: call.arguments.clone(),
        }));
        Self {
            role: MessageRole::Assistant,
            content,
        }
    }

    /// Create a tool result message
    pub fn tool_result(
        tool_use_id: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Self::tool_results(vec![(tool_use_id.into(), content.into(), is_error)])
    }

    /// One user message answering several tool uses of the previous turn.
    pub fn tool_results(results: Vec<(String, String, bool)>) -> Self {
        Self {
            role: MessageRole::User,
            content: results
                .into_iter()
                .map(|(tool_use_id, content, is_error)| MessageContent::ToolResult {
                    tool_use_id,
                    content,
                    is_error: if is_error { Some(true) } else { None },
                })
                .collect(),
        }
    }

    /// Concatenated text blocks.
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
}

/// JSON Schema for tool parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<HashMap<String, ParameterSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ParameterSchema>>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

impl ParameterSchema {
    fn scalar(schema_type: &str, description: Option<&str>) -> Self {
        Self {
            schema_type: schema_type.to_string(),
            description: description.map(|s| s.to_string()),
            properties: None,
            required: None,
            items: None,
            enum_values: None,
        }
    }

    pub fn string(description: Option<&str>) -> Self {
        Self::scalar("string", description)
    }

    pub fn integer(description: Option<&str>) -> Self {
        Self::scalar("integer", description)
    }

    pub fn boolean(description: Option<&str>) -> Self {
        Self::scalar("boolean", description)
    }

    /// String restricted to `values`.
    pub fn string_enum(description: Option<&str>, values: &[&str]) -> Self {
        let mut schema = Self::scalar("string", description);
        schema.enum_values = Some(values.iter().map(|v| v.to_string()).collect());
        schema
    }

    pub fn object(
        description: Option<&str>,
        properties: HashMap<String, ParameterSchema>,
        required: Vec<String>,
    ) -> Self {
        let mut schema = Self::scalar("object", description);
        schema.properties = Some(properties);
        schema.required = Some(required);
        schema
    }

    pub fn array(description: Option<&str>, items: ParameterSchema) -> Self {
        let mut schema = Self::scalar("array", description);
        schema.items = Some(Box::new(items));
        schema
    }
}

/// Definition of a tool that can be called by the LLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: ParameterSchema,
}

/// A tool call requested by the LLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl UsageStats {
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }

    /// Accumulate another call's usage.
    pub fn add(&mut self, other: &UsageStats) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
    }
}

/// Stop reason for the response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
    ToolUse,
    Other(String),
}

impl From<&str> for StopReason {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "end_turn" | "stop" => StopReason::EndTurn,
            "max_tokens" | "length" => StopReason::MaxTokens,
            "stop_sequence" => StopReason::StopSequence,
            "tool_use" | "tool_calls" | "function_call" => StopReason::ToolUse,
            other => StopReason::Other(other.to_string()),
        }
    }
}

/// Response from an LLM provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    pub stop_reason: StopReason,
    pub usage: UsageStats,
    pub model: String,
}

impl LlmResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Error types for LLM operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LlmError {
    /// Authentication failed (invalid or missing API key)
    AuthenticationFailed { message: String },
    RateLimited {
        message: String,
        retry_after: Option<u32>,
    },
    ModelNotFound { model: String },
    /// Invalid request (bad parameters)
    InvalidRequest { message: String },
    ServerError {
        message: String,
        status: Option<u16>,
    },
    /// Network/connection error
    NetworkError { message: String },
    /// Response parsing error
    ParseError { message: String },
    /// Provider not reachable (e.g., Ollama not running)
    ProviderUnavailable { message: String },
    Other { message: String },
}

impl LlmError {
    /// Transient failures worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited { .. }
                | LlmError::ServerError { .. }
                | LlmError::NetworkError { .. }
                | LlmError::ProviderUnavailable { .. }
        )
    }

    /// Server-suggested delay in seconds, if any.
    pub fn retry_after_secs(&self) -> Option<u32> {
        match self {
            LlmError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmError::AuthenticationFailed { message } => {
                write!(f, "Authentication failed: {}", message)
            }
            LlmError::RateLimited { message, .. } => write!(f, "Rate limited: {}", message),
            LlmError::ModelNotFound { model } => write!(f, "Model not found: {}", model),
            LlmError::InvalidRequest { message } => write!(f, "Invalid request: {}", message),
            LlmError::ServerError { message, status } => {
                if let Some(s) = status {
                    write!(f, "Server error ({}): {}", s, message)
                } else {
                    write!(f, "Server error: {}", message)
                }
            }
            LlmError::NetworkError { message } => write!(f, "Network error: {}", message),
            LlmError::ParseError { message } => write!(f, "Parse error: {}", message),
            LlmError::ProviderUnavailable { message } => {
                write!(f, "Provider unavailable: {}", message)
            }
            LlmError::Other { message } => write!(f, "Error: {}", message),
        }
    }
}

impl std::error::Error for LlmError {}

/// Result type for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provider_config_default() {
        let config = ProviderConfig::default();
        assert_eq!(config.provider, ProviderType::Anthropic);
        assert_eq!(config.max_tokens, 4096);
        assert_eq!(config.timeout_secs, 120);
        assert!((config.temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_provider_config_from_partial_json() {
        let config: ProviderConfig =
            serde_json::from_value(json!({"provider": "ollama"})).unwrap();
        assert_eq!(config.provider, ProviderType::Ollama);
        assert_eq!(config.model_name(), "qwen2.5-coder:14b");
        assert_eq!(config.max_tokens, 4096);
    }

    #[test]
    fn test_provider_type_parse() {
        assert_eq!("OpenAI".parse::<ProviderType>().unwrap(), ProviderType::OpenAI);
        assert_eq!("claude".parse::<ProviderType>().unwrap(), ProviderType::Anthropic);
        assert!("gemini".parse::<ProviderType>().is_err());
        assert_eq!(ProviderType::Anthropic.api_key_env(), Some("ANTHROPIC_API_KEY"));
        assert_eq!(ProviderType::Ollama.api_key_env(), None);
    }

    #[test]
    fn test_assistant_with_tools() {
        let calls = vec![ToolCall {
            id: "call_1".to_string(),
            name: "write_file".to_string(),
            arguments: json!({"path": "App.tsx", "content": "x"}),
        }];
        let msg = Message::assistant_with_tools(Some("Writing the root component."), &calls);
        assert_eq!(msg.role, MessageRole::Assistant);
        assert_eq!(msg.content.len(), 2);
        assert_eq!(msg.text_content(), "Writing the root component.");

        let bare = Message::assistant_with_tools(Some("   "), &calls);
        assert_eq!(bare.content.len(), 1);
    }

    #[test]
    fn test_tool_results_message() {
        let msg = Message::tool_results(vec![
            ("a".to_string(), "ok".to_string(), false),
            ("b".to_string(), "Error: missing".to_string(), true),
        ]);
        assert_eq!(msg.role, MessageRole::User);
        assert_eq!(
            msg.content[1],
            MessageContent::ToolResult {
                tool_use_id: "b".to_string(),
                content: "Error: missing".to_string(),
                is_error: Some(true),
            }
        );
    }

    #[test]
    fn test_message_content_serialization() {
        let content = MessageContent::ToolUse {
            id: "tool_123".to_string(),
            name: "read_file".to_string(),
            input: json!({"path": "App.tsx"}),
        };
        let value = serde_json::to_value(&content).unwrap();
        assert_eq!(value["type"], "tool_use");
        assert_eq!(value["name"], "read_file");
    }

    #[test]
    fn test_usage_accumulation() {
        let mut total = UsageStats::default();
        total.add(&UsageStats {
            input_tokens: 10,
            output_tokens: 5,
        });
        total.add(&UsageStats {
            input_tokens: 3,
            output_tokens: 2,
        });
        assert_eq!(total.input_tokens, 13);
        assert_eq!(total.total_tokens(), 20);
    }

    #[test]
    fn test_error_retryability() {
        assert!(LlmError::NetworkError {
            message: "reset".to_string()
        }
        .is_retryable());
        assert!(!LlmError::AuthenticationFailed {
            message: "bad key".to_string()
        }
        .is_retryable());
        let limited = LlmError::RateLimited {
            message: "slow down".to_string(),
            retry_after: Some(3),
        };
        assert_eq!(limited.retry_after_secs(), Some(3));
        assert_eq!(limited.to_string(), "Rate limited: slow down");
    }

    #[test]
    fn test_stop_reason_from_str() {
        assert_eq!(StopReason::from("tool_calls"), StopReason::ToolUse);
        assert_eq!(StopReason::from("stop"), StopReason::EndTurn);
        assert_eq!(
            StopReason::from("content_filter"),
            StopReason::Other("content_filter".to_string())
        );
    }
}
