//! Orchestrator Service
//!
//! Drives one build run: repeated backend turns, sequential tool dispatch
//! against the project executor, plan/completion gating, and the event
//! stream. Each run owns its own [`RunState`]; nothing is shared between runs.

use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::Stream;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use appweaver_core::{
    language_for_path, normalize_path, BuildEvent, BuildEventKind, BuildMode, BuildPhase,
    FileStatus, Plan,
};
use appweaver_llm::{create_provider, LlmError, LlmResult, Message, MessageContent, MessageRole};
use appweaver_tools::{BuildToolCall, ProjectExecutor, ToolError, ToolName, ToolResult};

use super::budget::BudgetGuard;
use super::continuation::{ContinuationDecision, ContinuationPolicy};
use super::emitter::EventEmitter;
use super::prompts;
use super::run_state::RunState;
use crate::models::orchestrator::{OrchestratorConfig, RunRequest, RunSummary};
use crate::models::settings::AppConfig;
use crate::services::backend::{create_backend, BackendTurn, BuildBackend, ConversationState};
use crate::utils::error::{AppError, AppResult};

const CANCELLED: &str = "run cancelled";

/// How the loop ended, before the terminal events are emitted.
enum LoopOutcome {
    Completed,
    Failed {
        error: String,
        /// Backend failures and plan-less stops always end in `error`
        fatal: bool,
    },
}

/// A successful write or patch reported by the executor.
#[derive(Debug, Clone, Copy)]
enum FileChange {
    /// `created` is false when the executor overwrote an existing file
    Write { created: bool },
    Patch,
}

/// Orchestrator service for build runs
pub struct Orchestrator {
    config: OrchestratorConfig,
    backend: Arc<dyn BuildBackend>,
    executor: Arc<dyn ProjectExecutor>,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        backend: Arc<dyn BuildBackend>,
        executor: Arc<dyn ProjectExecutor>,
    ) -> Self {
        Self {
            config,
            backend,
            executor,
        }
    }

    /// Build the provider and backend profile named by `config`.
    pub fn from_config(config: &AppConfig, executor: Arc<dyn ProjectExecutor>) -> AppResult<Self> {
        let provider = create_provider(config.provider.clone())?;
        info!(
            provider = provider.name(),
            model = provider.model(),
            profile = %config.profile,
            "orchestrator configured"
        );
        let backend = create_backend(config.profile, provider);
        Ok(Self::new(config.orchestrator.clone(), backend, executor))
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Start a run in a background task and return its event stream.
    ///
    /// Each run gets its own cancellation token, reachable through
    /// [`BuildRun::cancellation_token`].
    pub fn run(self: Arc<Self>, request: RunRequest) -> BuildRun {
        let (tx, rx) = mpsc::channel(self.config.event_buffer.max(1));
        let cancel = CancellationToken::new();
        let run_cancel = cancel.clone();
        let span = info_span!("build", backend = self.backend.name(), mode = %request.mode);
        let handle = tokio::spawn(
            async move { self.execute(request, tx, run_cancel).await }.instrument(span),
        );
        BuildRun {
            events: ReceiverStream::new(rx),
            handle,
            cancel,
        }
    }

    /// Execute a run to completion, emitting events on `tx`.
    ///
    /// Always ends with `run_finish`, and always returns a summary.
    pub async fn execute(
        &self,
        request: RunRequest,
        tx: mpsc::Sender<BuildEvent>,
        cancel: CancellationToken,
    ) -> RunSummary {
        let run_id = Uuid::new_v4().to_string();
        let mut state = RunState::new(run_id.clone(), request.mode);
        let mut events = EventEmitter::new(run_id.clone(), tx);

        info!(run_id = %run_id, mode = %request.mode, "run started");
        events
            .emit(BuildEventKind::RunStart {
                run_id,
                mode: request.mode,
            })
            .await;

        self.seed_existing_files(&request.existing_files).await;

        let system = prompts::system_prompt(
            self.config.system_prompt.as_deref(),
            request.mode,
            &request.existing_files,
        );
        let mut messages = vec![Message::user(request.prompt)];

        let outcome = self
            .drive(&mut state, &mut events, &system, &mut messages, &cancel)
            .await;
        self.finish(&mut state, &mut events, outcome).await;
        state.summary()
    }

    async fn seed_existing_files(&self, files: &BTreeMap<String, String>) {
        for (path, content) in files {
            let result = self.executor.write_file(path, content).await;
            if !result.success {
                warn!(path = %path, error = ?result.error, "could not seed existing file");
            }
        }
        if !files.is_empty() {
            debug!(count = files.len(), "seeded existing files");
        }
    }

    async fn drive(
        &self,
        state: &mut RunState,
        events: &mut EventEmitter,
        system: &str,
        messages: &mut Vec<Message>,
        cancel: &CancellationToken,
    ) -> LoopOutcome {
        let budget = BudgetGuard::from_config(&self.config);
        let policy = ContinuationPolicy::from_config(&self.config);

        loop {
            if cancel.is_cancelled() {
                return cancelled();
            }

            state.iteration += 1;
            events
                .emit(BuildEventKind::Iteration {
                    iteration: state.iteration,
                })
                .await;

            let pending = state.pending_paths();
            let conversation = ConversationState {
                system,
                messages: messages.as_slice(),
                plan: state.plan.as_ref(),
                pending: &pending,
                mode: state.mode,
            };
            let remaining_calls = budget.remaining_calls(state.backend_calls);
            let (result, failed_attempts) =
                self.submit_with_retry(&conversation, remaining_calls, cancel).await;
            state.backend_calls += failed_attempts;

            let turn = match result {
                Ok(turn) => turn,
                Err(_) if cancel.is_cancelled() => return cancelled(),
                Err(e) => {
                    error!(
                        run_id = %state.run_id,
                        iteration = state.iteration,
                        error = %e,
                        "backend call failed"
                    );
                    return LoopOutcome::Failed {
                        error: e.to_string(),
                        fatal: true,
                    };
                }
            };
            state.backend_calls += turn.backend_calls;

            let valid_calls = self.process_turn(state, events, messages, turn).await;

            if state.is_terminal() {
                return LoopOutcome::Completed;
            }

            if valid_calls == 0 {
                let pending = state.pending_paths();
                let decision = policy.decide(
                    state.plan.as_ref(),
                    &pending,
                    state.written_paths().len(),
                    state.plan_prompts,
                );
                match decision {
                    ContinuationDecision::Continue { message } => {
                        debug!(run_id = %state.run_id, pending = pending.len(), "continuing stalled build");
                        push_user_text(messages, message);
                    }
                    ContinuationDecision::PromptForPlan { message } => {
                        state.plan_prompts += 1;
                        debug!(run_id = %state.run_id, attempt = state.plan_prompts, "asking for a plan");
                        push_user_text(messages, message);
                    }
                    ContinuationDecision::AutoComplete => {
                        self.auto_complete(state, events).await;
                        return LoopOutcome::Completed;
                    }
                    ContinuationDecision::Stop { reason } => {
                        return LoopOutcome::Failed {
                            error: reason,
                            fatal: true,
                        };
                    }
                }
            }

            if let Some(exceeded) = budget.check(state.iteration, state.backend_calls) {
                if state.plan.is_some() && state.pending_paths().is_empty() {
                    self.auto_complete(state, events).await;
                    return LoopOutcome::Completed;
                }
                warn!(run_id = %state.run_id, "{}", exceeded);
                return LoopOutcome::Failed {
                    error: exceeded.to_string(),
                    fatal: false,
                };
            }
        }
    }

    /// Submit one turn, retrying transient errors with exponential backoff.
    ///
    /// Returns the result and the number of failed attempts, each of which
    /// counts as a backend call.
    async fn submit_with_retry(
        &self,
        conversation: &ConversationState<'_>,
        remaining_calls: u32,
        cancel: &CancellationToken,
    ) -> (LlmResult<BackendTurn>, u32) {
        let mut failed = 0u32;
        loop {
            let error = match self.backend.submit(conversation).await {
                Ok(turn) => return (Ok(turn), failed),
                Err(e) => e,
            };
            failed += 1;

            let retries_left = failed <= self.config.max_backend_retries;
            if !error.is_retryable() || !retries_left || failed >= remaining_calls {
                return (Err(error), failed);
            }

            let delay = retry_delay(&error, self.config.retry_backoff_ms, failed - 1);
            warn!(
                attempt = failed,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "retrying backend call"
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => return (Err(error), failed),
            }
        }
    }

    /// Record a backend turn and dispatch its tool calls in order. Returns the
    /// number of calls that named an available tool.
    async fn process_turn(
        &self,
        state: &mut RunState,
        events: &mut EventEmitter,
        messages: &mut Vec<Message>,
        turn: BackendTurn,
    ) -> usize {
        state.usage.add(&turn.usage);
        if turn.backend_calls > 0 {
            events
                .emit(BuildEventKind::Usage {
                    input_tokens: turn.usage.input_tokens,
                    output_tokens: turn.usage.output_tokens,
                })
                .await;
        }
        if let Some(text) = &turn.text {
            events
                .emit(BuildEventKind::TextDelta {
                    message: text.clone(),
                })
                .await;
        }
        if turn.text.is_none() && turn.tool_calls.is_empty() {
            return 0;
        }
        messages.push(Message::assistant_with_tools(
            turn.text.as_deref(),
            &turn.tool_calls,
        ));

        let mut results = Vec::with_capacity(turn.tool_calls.len());
        let mut valid_calls = 0;
        for call in &turn.tool_calls {
            if state.is_terminal() {
                results.push((
                    call.id.clone(),
                    "Error: the run has already finished".to_string(),
                    true,
                ));
                continue;
            }

            let name = match self.available_tool(&call.name, state.mode) {
                Ok(name) => name,
                Err(reason) => {
                    warn!(run_id = %state.run_id, tool = %call.name, "skipping tool call: {}", reason);
                    results.push((call.id.clone(), format!("Error: {}", reason), true));
                    continue;
                }
            };
            valid_calls += 1;

            events
                .emit(BuildEventKind::ToolCall {
                    tool_id: call.id.clone(),
                    tool: name.as_str().to_string(),
                    input: call.arguments.clone(),
                })
                .await;

            let result = match BuildToolCall::parse(name, &call.arguments) {
                Ok(parsed) => self.dispatch(parsed, state, events).await,
                Err(e) => ToolResult::err(e.to_string()),
            };
            if !result.success {
                debug!(run_id = %state.run_id, tool = name.as_str(), error = ?result.error, "tool call failed");
            }

            events
                .emit(BuildEventKind::ToolResult {
                    tool_id: call.id.clone(),
                    tool: name.as_str().to_string(),
                    result: result.payload(),
                })
                .await;
            results.push((call.id.clone(), result.to_content(), !result.success));
        }

        messages.push(Message::tool_results(results));
        valid_calls
    }

    fn available_tool(&self, name: &str, mode: BuildMode) -> Result<ToolName, String> {
        let tool: ToolName = name.parse().map_err(|e: ToolError| e.to_string())?;
        if mode == BuildMode::Plan && tool != ToolName::CreatePlan {
            return Err(format!("{} is not available in plan mode", tool));
        }
        Ok(tool)
    }

    async fn dispatch(
        &self,
        call: BuildToolCall,
        state: &mut RunState,
        events: &mut EventEmitter,
    ) -> ToolResult {
        match call {
            BuildToolCall::CreatePlan { manifest } => {
                self.handle_create_plan(&manifest, state, events).await
            }
            BuildToolCall::WriteFile { path, content } => {
                let result = self.executor.write_file(&path, &content).await;
                if result.success {
                    let path = resolved_path(&result, &path);
                    let created = result
                        .data
                        .as_ref()
                        .and_then(|d| d.get("created"))
                        .and_then(Value::as_bool)
                        .unwrap_or_else(|| !state.has_written(&path));
                    let change = FileChange::Write { created };
                    self.record_file(state, events, &path, &content, change).await;
                }
                result
            }
            BuildToolCall::PatchFile {
                path,
                find,
                replace,
            } => {
                let result = self.executor.patch_file(&path, &find, &replace).await;
                if result.success {
                    let path = resolved_path(&result, &path);
                    let content = match result.data_str("content") {
                        Some(content) => content.to_string(),
                        None => self
                            .executor
                            .read_file(&path)
                            .await
                            .output
                            .unwrap_or_default(),
                    };
                    self.record_file(state, events, &path, &content, FileChange::Patch)
                        .await;
                }
                result
            }
            BuildToolCall::DeleteFile { path } => {
                let result = self.executor.delete_file(&path).await;
                let deleted = result
                    .data
                    .as_ref()
                    .and_then(|d| d.get("deleted"))
                    .and_then(Value::as_bool)
                    .unwrap_or(true);
                if result.success && deleted {
                    let path = resolved_path(&result, &path);
                    self.enter_phase(state, events, BuildPhase::Coding).await;
                    state.record_delete(&path);
                    events
                        .emit(BuildEventKind::FileDeleted { path: path.clone() })
                        .await;
                    if state.declares(&path) {
                        self.emit_progress(state, events, &path).await;
                    }
                }
                result
            }
            call @ (BuildToolCall::VerifyProject { .. } | BuildToolCall::RunTest { .. }) => {
                self.enter_phase(state, events, BuildPhase::Testing).await;
                self.executor.execute(&call).await
            }
            call @ BuildToolCall::FixError { .. } => {
                self.enter_phase(state, events, BuildPhase::Debugging).await;
                self.executor.execute(&call).await
            }
            BuildToolCall::Complete {
                summary,
                next_steps,
                ..
            } => self.handle_complete(&summary, &next_steps, state, events).await,
            call => self.executor.execute(&call).await,
        }
    }

    async fn handle_create_plan(
        &self,
        manifest: &Value,
        state: &mut RunState,
        events: &mut EventEmitter,
    ) -> ToolResult {
        if state.plan.is_some() {
            return ToolResult::err("A plan already exists for this run and cannot be replaced");
        }
        let plan = match Plan::from_args(manifest) {
            Ok(plan) => plan,
            Err(e) => return ToolResult::err(e.to_string()),
        };
        let result = self.executor.create_plan(&plan).await;
        if !result.success {
            return result;
        }

        info!(run_id = %state.run_id, app = %plan.app_name, files = plan.total_files(), "plan accepted");
        self.enter_phase(state, events, BuildPhase::Planning).await;
        state.set_plan(plan.clone());
        events.emit(BuildEventKind::PlanCreated { plan: plan.clone() }).await;
        let next = state.pending_paths().into_iter().next().unwrap_or_default();
        self.emit_progress(state, events, &next).await;

        if state.mode == BuildMode::Plan {
            state.completion = Some(plan.summary());
            self.enter_phase(state, events, BuildPhase::Complete).await;
        }
        result
    }

    async fn handle_complete(
        &self,
        summary: &str,
        next_steps: &[String],
        state: &mut RunState,
        events: &mut EventEmitter,
    ) -> ToolResult {
        let pending = state.pending_paths();
        if !pending.is_empty() {
            info!(run_id = %state.run_id, pending = pending.len(), "completion rejected");
            return ToolResult::err(prompts::completion_rejected(&pending))
                .with_data(json!({ "pending": pending }));
        }
        if state.plan.is_none() && state.written_paths().is_empty() {
            return ToolResult::err("Cannot complete: no plan was created and no files were written");
        }

        let result = self
            .executor
            .complete(summary, state.written_paths(), next_steps)
            .await;
        if result.success {
            state.completion = Some(summary.to_string());
            self.enter_phase(state, events, BuildPhase::Complete).await;
        }
        result
    }

    /// Complete on the backend's behalf once nothing is pending.
    async fn auto_complete(&self, state: &mut RunState, events: &mut EventEmitter) {
        let summary = match &state.plan {
            Some(plan) => format!("Built {}", plan.summary()),
            None => format!("Built {} file(s)", state.written_paths().len()),
        };
        info!(run_id = %state.run_id, "auto-completing build");
        let result = self
            .executor
            .complete(&summary, state.written_paths(), &[])
            .await;
        if !result.success {
            warn!(run_id = %state.run_id, error = ?result.error, "executor rejected completion");
        }
        state.completion = Some(summary);
        self.enter_phase(state, events, BuildPhase::Complete).await;
    }

    async fn record_file(
        &self,
        state: &mut RunState,
        events: &mut EventEmitter,
        path: &str,
        content: &str,
        change: FileChange,
    ) {
        let status = match change {
            FileChange::Write { created } => state.record_write(path, content, created),
            FileChange::Patch => {
                state.record_patch(path, content);
                FileStatus::Updated
            }
        };
        self.enter_phase(state, events, BuildPhase::Coding).await;

        let path_owned = path.to_string();
        let content = content.to_string();
        let language = language_for_path(path).to_string();
        let event = match status {
            FileStatus::Created => BuildEventKind::FileCreated {
                path: path_owned,
                content,
                language,
            },
            _ => BuildEventKind::FileUpdated {
                path: path_owned,
                content,
                language,
            },
        };
        debug!(run_id = %state.run_id, path = %path, kind = event.name(), "file written");
        events.emit(event).await;

        if state.declares(path) {
            self.emit_progress(state, events, path).await;
        }
    }

    async fn emit_progress(&self, state: &RunState, events: &mut EventEmitter, current: &str) {
        let total_files = state.plan.as_ref().map(Plan::total_files).unwrap_or(0);
        events
            .emit(BuildEventKind::PlanProgress {
                current_file: current.to_string(),
                completed_files: state.completed_files(),
                total_files,
            })
            .await;
    }

    async fn enter_phase(&self, state: &mut RunState, events: &mut EventEmitter, phase: BuildPhase) {
        if state.advance(phase) {
            debug!(run_id = %state.run_id, phase = %phase, "phase changed");
            events.emit(BuildEventKind::PhaseChange { phase }).await;
        }
    }

    async fn finish(&self, state: &mut RunState, events: &mut EventEmitter, outcome: LoopOutcome) {
        match outcome {
            LoopOutcome::Completed => {
                state.success = true;
                let summary = state.completion.clone().unwrap_or_default();
                events
                    .emit(BuildEventKind::Complete {
                        summary,
                        files_created: state.written_paths().to_vec(),
                    })
                    .await;
                info!(
                    run_id = %state.run_id,
                    files = state.written_paths().len(),
                    iterations = state.iteration,
                    backend_calls = state.backend_calls,
                    "run complete"
                );
            }
            LoopOutcome::Failed { error, fatal } => {
                if fatal || state.written_paths().is_empty() {
                    self.enter_phase(state, events, BuildPhase::Error).await;
                }
                warn!(run_id = %state.run_id, phase = %state.phase, error = %error, "run failed");
                state.error = Some(error.clone());
                events.emit(BuildEventKind::Error { error }).await;
            }
        }

        events
            .emit(BuildEventKind::RunFinish {
                phase: state.phase,
                success: state.success,
            })
            .await;
    }
}

fn cancelled() -> LoopOutcome {
    LoopOutcome::Failed {
        error: CANCELLED.to_string(),
        fatal: false,
    }
}

/// Server-suggested delay, or `base * 2^attempt`.
fn retry_delay(error: &LlmError, base_ms: u64, attempt: u32) -> Duration {
    match error.retry_after_secs() {
        Some(secs) => Duration::from_secs(u64::from(secs)),
        None => Duration::from_millis(base_ms.saturating_mul(1u64 << attempt.min(16))),
    }
}

/// The executor's normalized path when it reports one.
fn resolved_path(result: &ToolResult, requested: &str) -> String {
    match result.data_str("path") {
        Some(path) => path.to_string(),
        None => normalize_path(requested).unwrap_or_else(|_| requested.to_string()),
    }
}

/// Append `text` to a trailing user message, or start a new one, so that
/// roles keep alternating.
fn push_user_text(messages: &mut Vec<Message>, text: String) {
    match messages.last_mut() {
        Some(last) if last.role == MessageRole::User => {
            last.content.push(MessageContent::Text { text });
        }
        _ => messages.push(Message::user(text)),
    }
}

/// A running build: a stream of events plus the summary once it finishes.
pub struct BuildRun {
    events: ReceiverStream<BuildEvent>,
    handle: JoinHandle<RunSummary>,
    cancel: CancellationToken,
}

impl BuildRun {
    /// Token that cancels this run and no other.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the final summary, discarding events not yet consumed.
    pub async fn summary(self) -> AppResult<RunSummary> {
        drop(self.events);
        self.handle
            .await
            .map_err(|e| AppError::internal(format!("build task failed: {}", e)))
    }

    /// Drain every event, then return them with the summary.
    pub async fn collect(mut self) -> AppResult<(Vec<BuildEvent>, RunSummary)> {
        use futures_util::StreamExt;

        let mut collected = Vec::new();
        while let Some(event) = self.events.next().await {
            collected.push(event);
        }
        let summary = self.summary().await?;
        Ok((collected, summary))
    }
}

impl Stream for BuildRun {
    type Item = BuildEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().events).poll_next(cx)
    }
}
