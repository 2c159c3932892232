//! Tool Executor Contract
//!
//! The virtual project a run builds into. The orchestrator treats every
//! operation as fallible and forwards failures to the backend as tool results;
//! a failed operation is a value, never an `Err`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use appweaver_core::{Plan, ToolResultPayload};

use crate::calls::BuildToolCall;

/// Result of a tool execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    /// Text shown to the backend on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Failure reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Structured payload for the orchestrator and callers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: Some(output.into()),
            error: None,
            data: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
            data: None,
        }
    }

    /// Attach a structured payload.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Convert to string for LLM consumption
    pub fn to_content(&self) -> String {
        if self.success {
            self.output.clone().unwrap_or_default()
        } else {
            format!(
                "Error: {}",
                self.error.as_deref().unwrap_or("Unknown error")
            )
        }
    }

    /// The event-stream view of this result.
    pub fn payload(&self) -> ToolResultPayload {
        ToolResultPayload {
            success: self.success,
            output: self.output.clone(),
            error: self.error.clone(),
        }
    }

    /// String field of the structured payload.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.as_ref()?.get(key)?.as_str()
    }
}

/// The eleven project operations a build can invoke.
#[async_trait]
pub trait ProjectExecutor: Send + Sync {
    /// Record the accepted plan manifest.
    async fn create_plan(&self, plan: &Plan) -> ToolResult;

    /// Create or overwrite a file. Success data: `{path, created}`.
    async fn write_file(&self, path: &str, content: &str) -> ToolResult;

    /// Replace the first occurrence of `find`. Fails when the file or the text
    /// is absent; the error names the path. Success data: `{path, content}`.
    async fn patch_file(&self, path: &str, find: &str, replace: &str) -> ToolResult;

    /// Matching `(path, line, snippet)` triples, capped at 200.
    async fn search_files(&self, query: &str, path_prefix: Option<&str>) -> ToolResult;

    /// Data: `{errors: [...], warnings: [...]}`.
    async fn verify_project(&self, checks: &[String]) -> ToolResult;

    /// Deleting a missing file succeeds as a no-op.
    async fn delete_file(&self, path: &str) -> ToolResult;

    async fn read_file(&self, path: &str) -> ToolResult;

    async fn list_files(&self, prefix: Option<&str>) -> ToolResult;

    /// Same result shape as `verify_project`.
    async fn run_test(&self, check_type: &str) -> ToolResult;

    /// Current file content truncated at a byte cap; fails if the file is absent.
    async fn fix_error(&self, path: &str, message: &str, description: &str) -> ToolResult;

    async fn complete(
        &self,
        summary: &str,
        files_created: &[String],
        next_steps: &[String],
    ) -> ToolResult;

    /// Dispatch a decoded call to the matching operation.
    async fn execute(&self, call: &BuildToolCall) -> ToolResult {
        match call {
            BuildToolCall::CreatePlan { manifest } => match Plan::from_args(manifest) {
                Ok(plan) => self.create_plan(&plan).await,
                Err(e) => ToolResult::err(e.to_string()),
            },
            BuildToolCall::WriteFile { path, content } => self.write_file(path, content).await,
            BuildToolCall::PatchFile {
                path,
                find,
                replace,
            } => self.patch_file(path, find, replace).await,
            BuildToolCall::SearchFiles { query, path_prefix } => {
                self.search_files(query, path_prefix.as_deref()).await
            }
            BuildToolCall::VerifyProject { checks } => self.verify_project(checks).await,
            BuildToolCall::DeleteFile { path } => self.delete_file(path).await,
            BuildToolCall::ReadFile { path } => self.read_file(path).await,
            BuildToolCall::ListFiles { prefix } => self.list_files(prefix.as_deref()).await,
            BuildToolCall::RunTest { check_type } => self.run_test(check_type).await,
            BuildToolCall::FixError {
                path,
                message,
                description,
            } => self.fix_error(path, message, description).await,
            BuildToolCall::Complete {
                summary,
                files_created,
                next_steps,
            } => self.complete(summary, files_created, next_steps).await,
        }
    }
}
