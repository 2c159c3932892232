//! Shared fixtures for the integration tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use appweaver::{
    BuildBackend, MultiToolBackend, Orchestrator, OrchestratorConfig, RunRequest, RunSummary,
    SingleToolBackend,
};
use appweaver_core::{BuildEvent, BuildEventKind};
use appweaver_llm::{
    LlmProvider, LlmRequestOptions, LlmResponse, LlmResult, Message, ProviderConfig, StopReason,
    ToolCall, ToolDefinition, UsageStats,
};
use appweaver_tools::InMemoryProject;

/// What the provider was asked on one request.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub system: Option<String>,
    pub tools: Vec<String>,
    pub messages: Vec<Message>,
}

/// Provider replaying a queue of responses. Once the queue is empty it
/// answers with plain narration.
pub struct ScriptedProvider {
    native_tools: bool,
    responses: Mutex<VecDeque<LlmResult<LlmResponse>>>,
    seen: Mutex<Vec<SeenRequest>>,
    config: ProviderConfig,
}

impl ScriptedProvider {
    pub fn new(native_tools: bool, responses: Vec<LlmResult<LlmResponse>>) -> Arc<Self> {
        Arc::new(Self {
            native_tools,
            responses: Mutex::new(responses.into()),
            seen: Mutex::new(Vec::new()),
            config: ProviderConfig::default(),
        })
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-1"
    }

    fn supports_tools(&self) -> bool {
        self.native_tools
    }

    async fn send_message(
        &self,
        messages: Vec<Message>,
        system: Option<String>,
        tools: Vec<ToolDefinition>,
        _request_options: LlmRequestOptions,
    ) -> LlmResult<LlmResponse> {
        self.seen.lock().unwrap().push(SeenRequest {
            system,
            tools: tools.into_iter().map(|t| t.name).collect(),
            messages,
        });
        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(text("Let me think about that.")))
    }

    async fn health_check(&self) -> LlmResult<()> {
        Ok(())
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

fn response(content: Option<String>, tool_calls: Vec<ToolCall>) -> LlmResponse {
    let stop_reason = if tool_calls.is_empty() {
        StopReason::EndTurn
    } else {
        StopReason::ToolUse
    };
    LlmResponse {
        content,
        tool_calls,
        stop_reason,
        usage: UsageStats {
            input_tokens: 100,
            output_tokens: 40,
        },
        model: "scripted-1".to_string(),
    }
}

/// A response carrying native tool calls.
pub fn calls(calls: Vec<ToolCall>) -> LlmResponse {
    response(None, calls)
}

/// A plain text response.
pub fn text(content: &str) -> LlmResponse {
    response(Some(content.to_string()), Vec::new())
}

pub fn call(id: &str, name: &str, arguments: Value) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments,
    }
}

pub fn plan_call(id: &str, paths: &[&str]) -> ToolCall {
    call(
        id,
        "create_plan",
        json!({
            "app_name": "Todo",
            "app_type": "productivity",
            "file_tree": paths,
            "dependencies": ["expo-router"]
        }),
    )
}

pub fn write_call(id: &str, path: &str) -> ToolCall {
    call(
        id,
        "write_file",
        json!({"path": path, "content": source_for(path)}),
    )
}

pub fn complete_call(id: &str, summary: &str) -> ToolCall {
    call(id, "complete", json!({"summary": summary}))
}

pub fn source_for(path: &str) -> String {
    format!("// {}\nexport default function Screen() {{ return null; }}\n", path)
}

pub fn test_config() -> OrchestratorConfig {
    OrchestratorConfig {
        max_iterations: 10,
        max_backend_calls: 30,
        retry_backoff_ms: 1,
        ..Default::default()
    }
}

/// Result of a finished run.
pub struct Finished {
    pub events: Vec<BuildEvent>,
    pub summary: RunSummary,
    pub project: Arc<InMemoryProject>,
}

impl Finished {
    pub fn names(&self) -> Vec<&'static str> {
        self.events.iter().map(|e| e.name()).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events.iter().filter(|e| e.name() == name).count()
    }

    pub fn created_paths(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match &e.kind {
                BuildEventKind::FileCreated { path, .. } => Some(path.clone()),
                _ => None,
            })
            .collect()
    }
}

pub async fn run_backend(
    backend: Arc<dyn BuildBackend>,
    config: OrchestratorConfig,
    request: RunRequest,
) -> Finished {
    let project = Arc::new(InMemoryProject::new());
    let orchestrator = Arc::new(Orchestrator::new(config, backend, project.clone()));
    let (events, summary) = orchestrator.run(request).collect().await.unwrap();
    Finished {
        events,
        summary,
        project,
    }
}

pub async fn run_multi(provider: Arc<ScriptedProvider>, config: OrchestratorConfig) -> Finished {
    let backend = Arc::new(MultiToolBackend::new(provider));
    run_backend(backend, config, RunRequest::new("Build a todo app")).await
}

pub async fn run_single(provider: Arc<ScriptedProvider>, config: OrchestratorConfig) -> Finished {
    let backend = Arc::new(SingleToolBackend::new(provider));
    run_backend(backend, config, RunRequest::new("Build a todo app")).await
}
