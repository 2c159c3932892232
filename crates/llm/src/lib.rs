//! Appweaver LLM
//!
//! A uniform interface over chat-completion backends:
//! - Anthropic Claude (Messages API, native tools)
//! - OpenAI and OpenAI-compatible servers (chat completions)
//! - Ollama (local, prompt-based tool calling)

pub mod anthropic;
pub mod http_client;
pub mod openai;
pub mod provider;
pub mod types;

pub use anthropic::AnthropicProvider;
pub use http_client::build_http_client;
pub use openai::OpenAIProvider;
pub use provider::{create_provider, missing_api_key_error, parse_http_error, LlmProvider};
pub use types::*;
