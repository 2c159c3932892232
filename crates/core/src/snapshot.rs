//! Run Snapshot Reducer
//!
//! Pure fold from build events to a view of run state, so that consumers
//! (CLI, UI, tests) can reconstruct progress from the stream alone.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::files::{FileRecord, FileStatus};
use crate::phase::{BuildMode, BuildPhase};
use crate::plan::{pending_paths, Plan};
use crate::streaming::{BuildEvent, BuildEventKind};

/// Completion reported by a `complete` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionSummary {
    pub summary: String,
    pub files_created: Vec<String>,
}

/// State reconstructed from a run's events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub run_id: Option<String>,
    pub mode: BuildMode,
    pub phase: BuildPhase,
    pub iteration: u32,
    pub plan: Option<Plan>,
    pub files: BTreeMap<String, FileRecord>,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub tool_calls: u32,
    pub failed_tool_calls: u32,
    pub narration: Vec<String>,
    pub completion: Option<CompletionSummary>,
    pub error: Option<String>,
    /// Set by `run_finish`
    pub success: Option<bool>,
}

impl RunSnapshot {
    /// Fold an event sequence from an empty snapshot.
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a BuildEvent>) -> Self {
        events.into_iter().fold(Self::default(), |state, event| {
            Self::reduce(&state, &event.kind)
        })
    }

    /// Pure transition: returns the snapshot after `event`.
    pub fn reduce(state: &RunSnapshot, event: &BuildEventKind) -> RunSnapshot {
        let mut next = state.clone();
        next.apply(event);
        next
    }

    /// In-place form of [`RunSnapshot::reduce`].
    pub fn apply(&mut self, event: &BuildEventKind) {
        match event {
            BuildEventKind::RunStart { run_id, mode } => {
                *self = RunSnapshot {
                    run_id: Some(run_id.clone()),
                    mode: *mode,
                    ..RunSnapshot::default()
                };
            }
            BuildEventKind::RunFinish { phase, success } => {
                self.phase = *phase;
                self.success = Some(*success);
            }
            BuildEventKind::PhaseChange { phase } => self.phase = *phase,
            BuildEventKind::Iteration { iteration } => self.iteration = *iteration,
            BuildEventKind::PlanCreated { plan } => {
                if self.plan.is_none() {
                    for path in &plan.file_tree {
                        self.files
                            .entry(path.clone())
                            .or_insert_with(|| FileRecord::pending(path.clone()));
                    }
                    self.plan = Some(plan.clone());
                }
            }
            BuildEventKind::PlanProgress { .. } => {}
            BuildEventKind::ToolCall { .. } => self.tool_calls += 1,
            BuildEventKind::ToolResult { result, .. } => {
                if !result.success {
                    self.failed_tool_calls += 1;
                }
            }
            BuildEventKind::TextDelta { message } => self.narration.push(message.clone()),
            BuildEventKind::FileCreated { path, content, .. } => {
                self.files.insert(
                    path.clone(),
                    FileRecord::written(path.clone(), content.clone(), FileStatus::Created),
                );
            }
            BuildEventKind::FileUpdated { path, content, .. } => {
                self.files.insert(
                    path.clone(),
                    FileRecord::written(path.clone(), content.clone(), FileStatus::Updated),
                );
            }
            BuildEventKind::FileDeleted { path } => {
                let planned = self.plan.as_ref().is_some_and(|p| p.declares(path));
                if planned {
                    self.files
                        .insert(path.clone(), FileRecord::pending(path.clone()));
                } else {
                    self.files.remove(path);
                }
            }
            BuildEventKind::Usage {
                input_tokens,
                output_tokens,
            } => {
                self.input_tokens = self.input_tokens.saturating_add(*input_tokens);
                self.output_tokens = self.output_tokens.saturating_add(*output_tokens);
            }
            BuildEventKind::Error { error } => self.error = Some(error.clone()),
            BuildEventKind::Complete {
                summary,
                files_created,
            } => {
                self.completion = Some(CompletionSummary {
                    summary: summary.clone(),
                    files_created: files_created.clone(),
                });
            }
        }
    }

    pub fn pending_paths(&self) -> Vec<String> {
        match &self.plan {
            Some(plan) => pending_paths(plan, &self.files),
            None => Vec::new(),
        }
    }

    /// Paths with a created or updated record.
    pub fn written_paths(&self) -> Vec<String> {
        self.files
            .values()
            .filter(|r| r.status.is_written())
            .map(|r| r.path.clone())
            .collect()
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn is_finished(&self) -> bool {
        self.success.is_some()
    }
}
