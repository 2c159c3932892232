//! Per-run state owned by the orchestrator loop.

use std::collections::BTreeMap;

use tracing::debug;

use appweaver_core::{pending_paths, BuildMode, BuildPhase, FileRecord, FileStatus, Plan};
use appweaver_llm::UsageStats;

use crate::models::orchestrator::RunSummary;

#[derive(Debug, Clone)]
pub struct RunState {
    pub run_id: String,
    pub mode: BuildMode,
    pub phase: BuildPhase,
    pub iteration: u32,
    pub backend_calls: u32,
    pub plan: Option<Plan>,
    pub files: BTreeMap<String, FileRecord>,
    pub usage: UsageStats,
    /// "Please plan" prompts sent so far
    pub plan_prompts: u32,
    /// Summary accepted by a successful completion
    pub completion: Option<String>,
    pub success: bool,
    pub error: Option<String>,
    /// Paths written this run, in first-write order
    written: Vec<String>,
}

impl RunState {
    pub fn new(run_id: impl Into<String>, mode: BuildMode) -> Self {
        Self {
            run_id: run_id.into(),
            mode,
            phase: BuildPhase::Idle,
            iteration: 0,
            backend_calls: 0,
            plan: None,
            files: BTreeMap::new(),
            usage: UsageStats::default(),
            plan_prompts: 0,
            completion: None,
            success: false,
            error: None,
            written: Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn pending_paths(&self) -> Vec<String> {
        match &self.plan {
            Some(plan) => pending_paths(plan, &self.files),
            None => Vec::new(),
        }
    }

    /// Accept the plan; every declared path not already written becomes pending.
    pub fn set_plan(&mut self, plan: Plan) {
        for path in &plan.file_tree {
            self.files
                .entry(path.clone())
                .or_insert_with(|| FileRecord::pending(path.clone()));
        }
        self.plan = Some(plan);
    }

    pub fn declares(&self, path: &str) -> bool {
        self.plan.as_ref().is_some_and(|p| p.declares(path))
    }

    pub fn has_written(&self, path: &str) -> bool {
        self.written.iter().any(|p| p == path)
    }

    /// Record a full write. `created` is whether the executor had no file at
    /// `path` before; overwrites within this run are always updates.
    pub fn record_write(&mut self, path: &str, content: &str, created: bool) -> FileStatus {
        let status = if created && !self.has_written(path) {
            FileStatus::Created
        } else {
            FileStatus::Updated
        };
        if !self.has_written(path) {
            self.written.push(path.to_string());
        }
        self.files
            .insert(path.to_string(), FileRecord::written(path, content, status));
        status
    }

    /// Record patched content; always an update.
    pub fn record_patch(&mut self, path: &str, content: &str) {
        if !self.has_written(path) {
            self.written.push(path.to_string());
        }
        self.files.insert(
            path.to_string(),
            FileRecord::written(path, content, FileStatus::Updated),
        );
    }

    /// Forget a deleted path. Planned paths return to pending.
    pub fn record_delete(&mut self, path: &str) {
        self.written.retain(|p| p != path);
        if self.declares(path) {
            self.files
                .insert(path.to_string(), FileRecord::pending(path));
        } else {
            self.files.remove(path);
        }
    }

    /// Paths created or updated this run, in first-write order.
    pub fn written_paths(&self) -> &[String] {
        &self.written
    }

    pub fn completed_files(&self) -> usize {
        match &self.plan {
            Some(plan) => plan.total_files() - self.pending_paths().len(),
            None => 0,
        }
    }

    /// Move to `next` if the phase machine allows it. Returns whether the
    /// phase changed.
    pub fn advance(&mut self, next: BuildPhase) -> bool {
        if next == self.phase {
            return false;
        }
        if !self.phase.can_transition_to(next) {
            debug!(from = %self.phase, to = %next, "phase transition not allowed");
            return false;
        }
        self.phase = next;
        true
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id.clone(),
            success: self.success,
            phase: self.phase,
            plan: self.plan.clone(),
            files: self.files.values().cloned().collect(),
            usage: self.usage,
            iterations: self.iteration,
            backend_calls: self.backend_calls,
            error: self.error.clone(),
        }
    }
}
