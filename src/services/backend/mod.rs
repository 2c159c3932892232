//! Provider Adapters
//!
//! The orchestrator talks to every LLM backend through [`BuildBackend`]: send
//! the conversation, get back narration, tool calls and token usage. Two
//! capability profiles implement it:
//!
//! - [`MultiToolBackend`] passes the full tool surface through to the provider.
//! - [`SingleToolBackend`] exposes only `write_file` and runs plan extraction
//!   itself.
//!
//! Providers without native tool calling are driven through textual tool
//! instructions in both profiles.

mod multi_tool;
mod single_tool;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use appweaver_core::{BuildMode, Plan};
use appweaver_llm::{
    LlmProvider, LlmResult, Message, MessageContent, ToolCall, ToolCallReliability, UsageStats,
};
use appweaver_tools::{format_tool_result, parse_tool_calls};

use crate::models::settings::BackendProfile;

pub use multi_tool::MultiToolBackend;
pub use single_tool::SingleToolBackend;

/// What the orchestrator sends on each backend turn.
#[derive(Debug, Clone, Copy)]
pub struct ConversationState<'a> {
    pub system: &'a str,
    pub messages: &'a [Message],
    pub plan: Option<&'a Plan>,
    /// Plan paths not yet written, in plan order
    pub pending: &'a [String],
    pub mode: BuildMode,
}

/// One backend turn as seen by the orchestrator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendTurn {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: UsageStats,
    /// Provider round-trips spent producing this turn
    pub backend_calls: u32,
}

impl BackendTurn {
    /// A turn produced without contacting the provider.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Uniform submit contract over the backend profiles.
#[async_trait]
pub trait BuildBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn submit(&self, state: &ConversationState<'_>) -> LlmResult<BackendTurn>;
}

/// Build the adapter for `profile` around `provider`.
pub fn create_backend(
    profile: BackendProfile,
    provider: Arc<dyn LlmProvider>,
) -> Arc<dyn BuildBackend> {
    match profile {
        BackendProfile::MultiTool => Arc::new(MultiToolBackend::new(provider)),
        BackendProfile::SingleTool => Arc::new(SingleToolBackend::new(provider)),
    }
}

/// Whether `provider` needs textual tool instructions instead of native tools.
pub(crate) fn uses_prompt_fallback(provider: &dyn LlmProvider) -> bool {
    provider.tool_call_reliability() == ToolCallReliability::None
}

/// Rewrite tool blocks as plain text, except `write_file`-style blocks named
/// by `keep`.
///
/// Used for providers without native tools (`keep = None`) and to hide tools a
/// profile does not offer from the provider.
pub(crate) fn flatten_tool_blocks(messages: &[Message], keep: Option<&str>) -> Vec<Message> {
    let mut tool_names: HashMap<&str, &str> = HashMap::new();
    let mut flattened = Vec::with_capacity(messages.len());

    for message in messages {
        let mut content = Vec::with_capacity(message.content.len());
        let mut text = String::new();

        for block in &message.content {
            let as_text = match block {
                MessageContent::Text { text } => Some(text.clone()),
                MessageContent::ToolUse { id, name, input } => {
                    tool_names.insert(id.as_str(), name.as_str());
                    if keep == Some(name.as_str()) {
                        None
                    } else {
                        Some(format!(
                            "```tool_call\n{}\n```",
                            serde_json::json!({ "tool": name, "arguments": input })
                        ))
                    }
                }
                MessageContent::ToolResult {
                    tool_use_id,
                    content: result,
                    is_error,
                } => {
                    let name = tool_names.get(tool_use_id.as_str()).copied().unwrap_or("tool");
                    if keep == Some(name) {
                        None
                    } else {
                        Some(format_tool_result(
                            name,
                            tool_use_id,
                            result,
                            is_error.unwrap_or(false),
                        ))
                    }
                }
            };

            match as_text {
                Some(block_text) => {
                    if !text.is_empty() {
                        text.push_str("\n\n");
                    }
                    text.push_str(&block_text);
                }
                None => {
                    if !text.is_empty() {
                        content.push(MessageContent::Text {
                            text: std::mem::take(&mut text),
                        });
                    }
                    content.push(block.clone());
                }
            }
        }
        if !text.is_empty() {
            content.push(MessageContent::Text { text });
        }
        if !content.is_empty() {
            flattened.push(Message {
                role: message.role,
                content,
            });
        }
    }
    flattened
}

/// Tool calls parsed out of a text reply, with fresh ids.
pub(crate) fn text_tool_calls(text: &str) -> Vec<ToolCall> {
    parse_tool_calls(text)
        .into_iter()
        .map(|parsed| ToolCall {
            id: format!("text_call_{}", Uuid::new_v4().simple()),
            name: parsed.tool_name,
            arguments: parsed.arguments,
        })
        .collect()
}

/// Trimmed narration, `None` when blank.
pub(crate) fn non_empty(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}
