//! Profile B: single-tool backend
//!
//! The provider only ever sees `write_file`. The adapter runs plan extraction
//! itself (a planning declaration consumed locally, surfaced to the
//! orchestrator as a synthesized `create_plan` call), restates the plan on
//! every request since the backend keeps no memory of it, and returns an empty
//! turn once nothing is pending so that auto-completion fires.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use appweaver_core::BuildMode;
use appweaver_llm::{LlmProvider, LlmRequestOptions, LlmResult, ToolCall};
use appweaver_tools::{
    build_tool_call_instructions, extract_json_object, extract_text_without_tool_calls,
    planning_tool_definitions, write_only_tool_definitions, ToolName,
};

use super::{
    flatten_tool_blocks, non_empty, text_tool_calls, uses_prompt_fallback, BackendTurn,
    BuildBackend, ConversationState,
};

const PLAN_TOOL_INSTRUCTION: &str = "Before writing any code, call create_plan with the \
complete app manifest. file_tree must list every file the app needs.";

const PLAN_JSON_INSTRUCTION: &str = "Before writing any code, reply with ONLY a JSON object \
describing the app: {\"app_name\": string, \"app_type\": string, \"features\": [string], \
\"screens\": [string], \"file_tree\": [every relative file path], \"dependencies\": [string], \
\"plan_steps\": [string]}";

pub struct SingleToolBackend {
    provider: Arc<dyn LlmProvider>,
}

impl SingleToolBackend {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    async fn extract_plan(&self, state: &ConversationState<'_>) -> LlmResult<BackendTurn> {
        let fallback = uses_prompt_fallback(self.provider.as_ref());
        let response = if fallback {
            self.provider
                .send_message(
                    flatten_tool_blocks(state.messages, None),
                    Some(format!("{}\n\n{}", state.system, PLAN_JSON_INSTRUCTION)),
                    Vec::new(),
                    LlmRequestOptions::default(),
                )
                .await?
        } else {
            self.provider
                .send_message(
                    flatten_tool_blocks(state.messages, None),
                    Some(format!("{}\n\n{}", state.system, PLAN_TOOL_INSTRUCTION)),
                    planning_tool_definitions(),
                    LlmRequestOptions::required_tool(),
                )
                .await?
        };

        let text = response.content.unwrap_or_default();
        let native = response
            .tool_calls
            .into_iter()
            .find(|call| call.name == ToolName::CreatePlan.as_str());

        let (call, narration) = match native {
            Some(call) => (Some(call), text),
            None => {
                let textual = text_tool_calls(&text)
                    .into_iter()
                    .find(|call| call.name == ToolName::CreatePlan.as_str());
                match textual {
                    Some(call) => (Some(call), extract_text_without_tool_calls(&text)),
                    None => (
                        extract_json_object(&text)
                            .filter(looks_like_manifest)
                            .map(synthesized_plan_call),
                        String::new(),
                    ),
                }
            }
        };

        match &call {
            Some(_) => debug!(provider = self.provider.name(), "plan extracted"),
            None => warn!(provider = self.provider.name(), "plan extraction produced no manifest"),
        }

        Ok(BackendTurn {
            text: non_empty(Some(narration)),
            tool_calls: call.into_iter().collect(),
            usage: response.usage,
            backend_calls: 1,
        })
    }

    /// Plan summary and remaining paths, appended to the system prompt.
    fn plan_context(state: &ConversationState<'_>) -> String {
        let mut context = String::from("## Build plan\n");
        if let Some(plan) = state.plan {
            context.push_str(&format!("{}\n", plan.summary()));
        }
        context.push_str("Files still to write:\n");
        for path in state.pending {
            context.push_str(&format!("- {}\n", path));
        }
        context.push_str("Write the remaining files with write_file, a few per turn.");
        context
    }
}

fn looks_like_manifest(value: &Value) -> bool {
    value.get("file_tree").is_some() || value.get("fileTree").is_some()
}

fn synthesized_plan_call(manifest: Value) -> ToolCall {
    ToolCall {
        id: format!("plan_{}", Uuid::new_v4().simple()),
        name: ToolName::CreatePlan.as_str().to_string(),
        arguments: manifest,
    }
}

#[async_trait]
impl BuildBackend for SingleToolBackend {
    fn name(&self) -> &'static str {
        "single-tool"
    }

    async fn submit(&self, state: &ConversationState<'_>) -> LlmResult<BackendTurn> {
        if state.plan.is_none() {
            return self.extract_plan(state).await;
        }
        if state.mode == BuildMode::Plan || state.pending.is_empty() {
            return Ok(BackendTurn::empty());
        }

        let write_file = ToolName::WriteFile.as_str();
        let tools = write_only_tool_definitions();
        let system = format!("{}\n\n{}", state.system, Self::plan_context(state));

        let (text, calls, usage) = if uses_prompt_fallback(self.provider.as_ref()) {
            let response = self
                .provider
                .send_message(
                    flatten_tool_blocks(state.messages, None),
                    Some(format!("{}\n\n{}", system, build_tool_call_instructions(&tools))),
                    Vec::new(),
                    LlmRequestOptions::default(),
                )
                .await?;
            let text = response.content.unwrap_or_default();
            let calls = text_tool_calls(&text);
            (
                Some(extract_text_without_tool_calls(&text)),
                calls,
                response.usage,
            )
        } else {
            let response = self
                .provider
                .send_message(
                    flatten_tool_blocks(state.messages, Some(write_file)),
                    Some(system),
                    tools,
                    LlmRequestOptions::default(),
                )
                .await?;
            (response.content, response.tool_calls, response.usage)
        };

        let (tool_calls, foreign): (Vec<ToolCall>, Vec<ToolCall>) =
            calls.into_iter().partition(|call| call.name == write_file);
        for call in &foreign {
            warn!(tool = %call.name, "dropping tool call outside the single-tool surface");
        }

        Ok(BackendTurn {
            text: non_empty(text),
            tool_calls,
            usage,
            backend_calls: 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use appweaver_core::Plan;
    use appweaver_llm::{
        LlmResponse, Message, ProviderConfig, StopReason, ToolCallMode, ToolDefinition, UsageStats,
    };
    use serde_json::json;
    use std::sync::Mutex;

    /// Provider returning one canned response and recording what it was sent.
    struct CannedProvider {
        native_tools: bool,
        response: LlmResponse,
        seen: Mutex<Vec<(Option<String>, Vec<String>, ToolCallMode)>>,
        config: ProviderConfig,
    }

    impl CannedProvider {
        fn new(native_tools: bool, content: Option<&str>, tool_calls: Vec<ToolCall>) -> Self {
            Self {
                native_tools,
                response: LlmResponse {
                    content: content.map(|c| c.to_string()),
                    tool_calls,
                    stop_reason: StopReason::EndTurn,
                    usage: UsageStats {
                        input_tokens: 10,
                        output_tokens: 5,
                    },
                    model: "canned".to_string(),
                },
                seen: Mutex::new(Vec::new()),
                config: ProviderConfig::default(),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for CannedProvider {
        fn name(&self) -> &'static str {
            "canned"
        }

        fn model(&self) -> &str {
            "canned"
        }

        fn supports_tools(&self) -> bool {
            self.native_tools
        }

        async fn send_message(
            &self,
            _messages: Vec<Message>,
            system: Option<String>,
            tools: Vec<ToolDefinition>,
            request_options: LlmRequestOptions,
        ) -> LlmResult<LlmResponse> {
            self.seen.lock().unwrap().push((
                system,
                tools.into_iter().map(|t| t.name).collect(),
                request_options.tool_call_mode,
            ));
            Ok(self.response.clone())
        }

        async fn health_check(&self) -> LlmResult<()> {
            Ok(())
        }

        fn config(&self) -> &ProviderConfig {
            &self.config
        }
    }

    fn plan() -> Plan {
        Plan::from_args(&json!({
            "app_name": "Todo",
            "file_tree": ["app/_layout.tsx", "app/(tabs)/index.tsx"]
        }))
        .unwrap()
    }

    fn state<'a>(
        messages: &'a [Message],
        plan: Option<&'a Plan>,
        pending: &'a [String],
    ) -> ConversationState<'a> {
        ConversationState {
            system: "You build apps.",
            messages,
            plan,
            pending,
            mode: BuildMode::Build,
        }
    }

    #[tokio::test]
    async fn test_plan_extraction_uses_required_planning_tool() {
        let provider = Arc::new(CannedProvider::new(
            true,
            None,
            vec![ToolCall {
                id: "toolu_1".to_string(),
                name: "create_plan".to_string(),
                arguments: json!({"app_name": "Todo", "file_tree": ["App.tsx"]}),
            }],
        ));
        let backend = SingleToolBackend::new(provider.clone());
        let messages = vec![Message::user("todo app")];

        let turn = backend.submit(&state(&messages, None, &[])).await.unwrap();
        assert_eq!(turn.tool_calls.len(), 1);
        assert_eq!(turn.tool_calls[0].name, "create_plan");
        assert_eq!(turn.backend_calls, 1);
        assert_eq!(turn.usage.input_tokens, 10);

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0].1, vec!["create_plan".to_string()]);
        assert_eq!(seen[0].2, ToolCallMode::Required);
    }

    #[tokio::test]
    async fn test_plan_extraction_from_json_text() {
        let provider = Arc::new(CannedProvider::new(
            false,
            Some("{\"app_name\": \"Todo\", \"file_tree\": [\"App.tsx\"]}"),
            Vec::new(),
        ));
        let backend = SingleToolBackend::new(provider.clone());
        let messages = vec![Message::user("todo app")];

        let turn = backend.submit(&state(&messages, None, &[])).await.unwrap();
        assert_eq!(turn.tool_calls[0].name, "create_plan");
        assert_eq!(turn.tool_calls[0].arguments["file_tree"][0], "App.tsx");
        assert!(turn.tool_calls[0].id.starts_with("plan_"));
        assert!(turn.text.is_none());
        assert!(provider.seen.lock().unwrap()[0].1.is_empty());
    }

    #[tokio::test]
    async fn test_nothing_pending_skips_backend() {
        let provider = Arc::new(CannedProvider::new(true, Some("hi"), Vec::new()));
        let backend = SingleToolBackend::new(provider.clone());
        let plan = plan();
        let messages = vec![Message::user("todo app")];

        let turn = backend.submit(&state(&messages, Some(&plan), &[])).await.unwrap();
        assert_eq!(turn, BackendTurn::empty());
        assert!(provider.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_turn_offers_only_write_file() {
        let provider = Arc::new(CannedProvider::new(
            true,
            Some("Writing the layout."),
            vec![
                ToolCall {
                    id: "toolu_1".to_string(),
                    name: "write_file".to_string(),
                    arguments: json!({"path": "app/_layout.tsx", "content": "export {}"}),
                },
                ToolCall {
                    id: "toolu_2".to_string(),
                    name: "complete".to_string(),
                    arguments: json!({"summary": "done"}),
                },
            ],
        ));
        let backend = SingleToolBackend::new(provider.clone());
        let plan = plan();
        let pending = plan.file_tree.clone();
        let messages = vec![Message::user("todo app")];

        let turn = backend
            .submit(&state(&messages, Some(&plan), &pending))
            .await
            .unwrap();
        assert_eq!(turn.tool_calls.len(), 1);
        assert_eq!(turn.tool_calls[0].name, "write_file");
        assert_eq!(turn.text.as_deref(), Some("Writing the layout."));

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0].1, vec!["write_file".to_string()]);
        let system = seen[0].0.as_deref().unwrap();
        assert!(system.contains("- app/(tabs)/index.tsx"));
    }
}
