//! Continuation Policy
//!
//! Decides what happens when a backend turn ends without a usable tool call.
//! It looks only at run state, never at which backend profile is active.

use appweaver_core::Plan;

use super::prompts;
use crate::models::orchestrator::OrchestratorConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContinuationDecision {
    /// Feed `message` back and keep building
    Continue { message: String },
    /// No plan yet; ask for one
    PromptForPlan { message: String },
    /// Nothing left to write; finish as if `complete` had been called
    AutoComplete,
    /// End the run unsuccessfully
    Stop { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContinuationPolicy {
    batch_size: usize,
    max_plan_prompts: u32,
}

impl ContinuationPolicy {
    pub fn new(batch_size: usize, max_plan_prompts: u32) -> Self {
        Self {
            batch_size: batch_size.max(1),
            max_plan_prompts,
        }
    }

    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self::new(config.continuation_batch_size, config.max_plan_prompts)
    }

    /// `plan_prompts_sent` counts earlier [`ContinuationDecision::PromptForPlan`]
    /// decisions; `files_written` counts paths written this run.
    pub fn decide(
        &self,
        plan: Option<&Plan>,
        pending: &[String],
        files_written: usize,
        plan_prompts_sent: u32,
    ) -> ContinuationDecision {
        match plan {
            None if plan_prompts_sent < self.max_plan_prompts => {
                ContinuationDecision::PromptForPlan {
                    message: prompts::plan_request(),
                }
            }
            None if files_written > 0 => ContinuationDecision::AutoComplete,
            None => ContinuationDecision::Stop {
                reason: "Backend stopped without creating a plan".to_string(),
            },
            Some(_) if pending.is_empty() => ContinuationDecision::AutoComplete,
            Some(_) => ContinuationDecision::Continue {
                message: prompts::continuation(pending, self.batch_size),
            },
        }
    }
}
