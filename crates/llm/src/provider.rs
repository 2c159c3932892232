//! LLM Provider Trait
//!
//! Defines the common interface for all LLM providers.

use std::sync::Arc;

use async_trait::async_trait;

use super::anthropic::AnthropicProvider;
use super::openai::OpenAIProvider;
use super::types::{
    LlmError, LlmRequestOptions, LlmResponse, LlmResult, Message, ProviderConfig, ProviderType,
    ToolCallReliability, ToolDefinition,
};

/// A chat-completion backend.
///
/// Implementations are stateless between calls: the full conversation is sent
/// on every request.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Short provider name used in logs and errors
    fn name(&self) -> &'static str;

    fn model(&self) -> &str;

    /// Whether the API accepts native tool definitions
    fn supports_tools(&self) -> bool;

    /// How reliably the model emits native tool calls.
    fn tool_call_reliability(&self) -> ToolCallReliability {
        if self.supports_tools() {
            ToolCallReliability::Reliable
        } else {
            ToolCallReliability::None
        }
    }

    /// Send one request and wait for the complete response.
    async fn send_message(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        tools: Vec<ToolDefinition>,
        request_options: LlmRequestOptions,
    ) -> LlmResult<LlmResponse>;

    /// Cheap reachability/credential check
    async fn health_check(&self) -> LlmResult<()>;

    fn config(&self) -> &ProviderConfig;
}

/// Build the provider named by `config`.
pub fn create_provider(config: ProviderConfig) -> LlmResult<Arc<dyn LlmProvider>> {
    let provider: Arc<dyn LlmProvider> = match config.provider {
        ProviderType::Anthropic => Arc::new(AnthropicProvider::new(config)?),
        ProviderType::OpenAI | ProviderType::Ollama => Arc::new(OpenAIProvider::new(config)?),
    };
    Ok(provider)
}

/// Error for a hosted provider without credentials.
pub fn missing_api_key_error(provider: &str) -> LlmError {
    LlmError::AuthenticationFailed {
        message: format!("API key not configured for {}", provider),
    }
}

/// Map a non-success HTTP response to an [`LlmError`].
pub fn parse_http_error(status: u16, body: &str, provider: &str) -> LlmError {
    let message = extract_error_message(body).unwrap_or_else(|| body.to_string());
    match status {
        401 => LlmError::AuthenticationFailed {
            message: format!("{}: Invalid API key", provider),
        },
        403 => LlmError::AuthenticationFailed {
            message: format!("{}: Access denied", provider),
        },
        404 => LlmError::ModelNotFound { model: message },
        429 => LlmError::RateLimited {
            message,
            retry_after: None,
        },
        400 | 413 | 422 => LlmError::InvalidRequest { message },
        500..=599 => LlmError::ServerError {
            message,
            status: Some(status),
        },
        _ => LlmError::Other {
            message: format!("HTTP {}: {}", status, message),
        },
    }
}

/// Pull `error.message` (or a string `error`) out of a JSON error body.
fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;
    error
        .get("message")
        .and_then(|m| m.as_str())
        .or_else(|| error.as_str())
        .map(|s| s.to_string())
}
