//! Orchestrator Models
//!
//! Run configuration, the invocation request, and the resolved summary a run
//! returns once its event stream closes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use appweaver_core::{BuildMode, BuildPhase, FileRecord, Plan};
use appweaver_llm::UsageStats;

/// Configuration for the orchestrator loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Loop turns before the run stops (prevents infinite loops)
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Round-trips to the LLM backend, retries included
    #[serde(default = "default_max_backend_calls")]
    pub max_backend_calls: u32,
    /// Files a continuation prompt asks for in one turn
    #[serde(default = "default_continuation_batch_size")]
    pub continuation_batch_size: usize,
    /// "Please plan first" prompts before giving up on a plan
    #[serde(default = "default_max_plan_prompts")]
    pub max_plan_prompts: u32,
    /// Retries for transient backend errors
    #[serde(default = "default_max_backend_retries")]
    pub max_backend_retries: u32,
    /// Base delay of the exponential retry backoff
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Channel capacity between the loop and the stream consumer
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    /// Replaces the built-in system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_max_iterations() -> u32 {
    12
}

fn default_max_backend_calls() -> u32 {
    100
}

fn default_continuation_batch_size() -> usize {
    3
}

fn default_max_plan_prompts() -> u32 {
    2
}

fn default_max_backend_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_event_buffer() -> usize {
    256
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_backend_calls: default_max_backend_calls(),
            continuation_batch_size: default_continuation_batch_size(),
            max_plan_prompts: default_max_plan_prompts(),
            max_backend_retries: default_max_backend_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            event_buffer: default_event_buffer(),
            system_prompt: None,
        }
    }
}

/// One build request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub prompt: String,
    /// Files already in the project, keyed by relative path
    #[serde(default)]
    pub existing_files: BTreeMap<String, String>,
    #[serde(default)]
    pub mode: BuildMode,
}

impl RunRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_mode(mut self, mode: BuildMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_existing_files(mut self, files: BTreeMap<String, String>) -> Self {
        self.existing_files = files;
        self
    }
}

/// Final result of a run, resolved after the event stream closes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub success: bool,
    pub phase: BuildPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
    /// Every tracked record, pending plan paths included
    pub files: Vec<FileRecord>,
    pub usage: UsageStats,
    pub iterations: u32,
    pub backend_calls: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunSummary {
    /// Records with content written during the run.
    pub fn written_files(&self) -> impl Iterator<Item = &FileRecord> {
        self.files.iter().filter(|f| f.status.is_written())
    }

    pub fn file(&self, path: &str) -> Option<&FileRecord> {
        self.files.iter().find(|f| f.path == path)
    }
}
