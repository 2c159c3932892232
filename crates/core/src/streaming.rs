//! Build Event Types
//!
//! The orchestrator's only externally observable contract: an ordered stream
//! of timestamped, tagged records. Consumers rebuild run state by folding
//! these events (see [`crate::snapshot`]), never by reading orchestrator
//! internals.

use serde::{Deserialize, Serialize};

use crate::phase::{BuildMode, BuildPhase};
use crate::plan::Plan;

/// Outcome of one tool call as reported on the event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResultPayload {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Typed payload of a build event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BuildEventKind {
    /// First event of every run
    RunStart { run_id: String, mode: BuildMode },

    /// Last event of every run, successful or not
    RunFinish { phase: BuildPhase, success: bool },

    PhaseChange { phase: BuildPhase },

    Iteration { iteration: u32 },

    /// A plan was accepted; every declared path is now pending
    PlanCreated { plan: Plan },

    PlanProgress {
        current_file: String,
        completed_files: usize,
        total_files: usize,
    },

    ToolCall {
        tool_id: String,
        tool: String,
        input: serde_json::Value,
    },

    ToolResult {
        tool_id: String,
        tool: String,
        result: ToolResultPayload,
    },

    /// Free-form narration from the backend
    TextDelta { message: String },

    FileCreated {
        path: String,
        content: String,
        language: String,
    },

    FileUpdated {
        path: String,
        content: String,
        language: String,
    },

    FileDeleted { path: String },

    /// Token usage of one backend turn
    Usage { input_tokens: u32, output_tokens: u32 },

    Error { error: String },

    /// Successful completion; always immediately precedes `run_finish`
    Complete {
        summary: String,
        files_created: Vec<String>,
    },
}

impl BuildEventKind {
    /// The serialized `type` tag.
    pub fn name(&self) -> &'static str {
        match self {
            BuildEventKind::RunStart { .. } => "run_start",
            BuildEventKind::RunFinish { .. } => "run_finish",
            BuildEventKind::PhaseChange { .. } => "phase_change",
            BuildEventKind::Iteration { .. } => "iteration",
            BuildEventKind::PlanCreated { .. } => "plan_created",
            BuildEventKind::PlanProgress { .. } => "plan_progress",
            BuildEventKind::ToolCall { .. } => "tool_call",
            BuildEventKind::ToolResult { .. } => "tool_result",
            BuildEventKind::TextDelta { .. } => "text_delta",
            BuildEventKind::FileCreated { .. } => "file_created",
            BuildEventKind::FileUpdated { .. } => "file_updated",
            BuildEventKind::FileDeleted { .. } => "file_deleted",
            BuildEventKind::Usage { .. } => "usage",
            BuildEventKind::Error { .. } => "error",
            BuildEventKind::Complete { .. } => "complete",
        }
    }
}

/// Envelope appended to the event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildEvent {
    /// Monotonic per-run sequence number, starting at 0
    pub seq: u64,
    /// Unix epoch milliseconds
    pub timestamp: i64,
    #[serde(flatten)]
    pub kind: BuildEventKind,
}

impl BuildEvent {
    /// Stamp `kind` with the current time.
    pub fn new(seq: u64, kind: BuildEventKind) -> Self {
        Self {
            seq,
            timestamp: chrono::Utc::now().timestamp_millis(),
            kind,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}
