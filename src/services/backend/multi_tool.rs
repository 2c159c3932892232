//! Profile A: multi-tool backend
//!
//! Thin pass-through. The provider sees the full tool surface (or only the
//! planning tool in plan mode) and its tool calls are returned unchanged.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use appweaver_core::BuildMode;
use appweaver_llm::{LlmProvider, LlmRequestOptions, LlmResult, ToolDefinition};
use appweaver_tools::{
    all_tool_definitions, build_tool_call_instructions, extract_text_without_tool_calls,
    planning_tool_definitions,
};

use super::{
    flatten_tool_blocks, non_empty, text_tool_calls, uses_prompt_fallback, BackendTurn,
    BuildBackend, ConversationState,
};

pub struct MultiToolBackend {
    provider: Arc<dyn LlmProvider>,
}

impl MultiToolBackend {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    fn tools_for(mode: BuildMode) -> Vec<ToolDefinition> {
        match mode {
            BuildMode::Build => all_tool_definitions(),
            BuildMode::Plan => planning_tool_definitions(),
        }
    }
}

#[async_trait]
impl BuildBackend for MultiToolBackend {
    fn name(&self) -> &'static str {
        "multi-tool"
    }

    async fn submit(&self, state: &ConversationState<'_>) -> LlmResult<BackendTurn> {
        let tools = Self::tools_for(state.mode);

        if uses_prompt_fallback(self.provider.as_ref()) {
            let system = format!(
                "{}\n\n{}",
                state.system,
                build_tool_call_instructions(&tools)
            );
            let response = self
                .provider
                .send_message(
                    flatten_tool_blocks(state.messages, None),
                    Some(system),
                    Vec::new(),
                    LlmRequestOptions::default(),
                )
                .await?;

            let text = response.content.unwrap_or_default();
            let tool_calls = text_tool_calls(&text);
            debug!(
                provider = self.provider.name(),
                calls = tool_calls.len(),
                "parsed prompt-based tool calls"
            );
            return Ok(BackendTurn {
                text: non_empty(Some(extract_text_without_tool_calls(&text))),
                tool_calls,
                usage: response.usage,
                backend_calls: 1,
            });
        }

        let response = self
            .provider
            .send_message(
                state.messages.to_vec(),
                Some(state.system.to_string()),
                tools,
                LlmRequestOptions::default(),
            )
            .await?;

        Ok(BackendTurn {
            text: non_empty(response.content),
            tool_calls: response.tool_calls,
            usage: response.usage,
            backend_calls: 1,
        })
    }
}
