//! Typed Build Tool Calls
//!
//! Decodes raw `(name, arguments)` pairs from a backend into typed calls.
//! Backends drift on argument names (`file_path` vs `path`, `old_string` vs
//! `find`), so each argument accepts a short list of aliases.

use serde_json::Value;

use crate::definitions::ToolName;
use crate::error::ToolError;

/// A decoded build tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildToolCall {
    CreatePlan {
        manifest: Value,
    },
    WriteFile {
        path: String,
        content: String,
    },
    PatchFile {
        path: String,
        find: String,
        replace: String,
    },
    SearchFiles {
        query: String,
        path_prefix: Option<String>,
    },
    VerifyProject {
        checks: Vec<String>,
    },
    DeleteFile {
        path: String,
    },
    ReadFile {
        path: String,
    },
    ListFiles {
        prefix: Option<String>,
    },
    RunTest {
        check_type: String,
    },
    FixError {
        path: String,
        message: String,
        description: String,
    },
    Complete {
        summary: String,
        files_created: Vec<String>,
        next_steps: Vec<String>,
    },
}

const PATH_KEYS: &[&str] = &["path", "file_path", "filePath", "file"];

impl BuildToolCall {
    /// Decode `arguments` for the tool `name`.
    pub fn parse(name: ToolName, arguments: &Value) -> Result<Self, ToolError> {
        let tool = name.as_str();
        let args = ArgReader { tool, value: arguments };
        Ok(match name {
            ToolName::CreatePlan => {
                if !arguments.is_object() {
                    return Err(ToolError::invalid(tool, "manifest", "expected a JSON object"));
                }
                BuildToolCall::CreatePlan {
                    manifest: arguments.clone(),
                }
            }
            ToolName::WriteFile => BuildToolCall::WriteFile {
                path: args.required(PATH_KEYS)?,
                content: args.required(&["content", "contents", "text"])?,
            },
            ToolName::PatchFile => {
                let find = args.required(&["find", "search", "old_string", "old"])?;
                if find.is_empty() {
                    return Err(ToolError::invalid(tool, "find", "must not be empty"));
                }
                BuildToolCall::PatchFile {
                    path: args.required(PATH_KEYS)?,
                    find,
                    replace: args.required(&["replace", "replacement", "new_string", "new"])?,
                }
            }
            ToolName::SearchFiles => BuildToolCall::SearchFiles {
                query: args.required(&["query", "pattern", "text"])?,
                path_prefix: args.optional(&["path_prefix", "pathPrefix", "path", "prefix"]),
            },
            ToolName::VerifyProject => BuildToolCall::VerifyProject {
                checks: args.list(&["checks"]),
            },
            ToolName::DeleteFile => BuildToolCall::DeleteFile {
                path: args.required(PATH_KEYS)?,
            },
            ToolName::ReadFile => BuildToolCall::ReadFile {
                path: args.required(PATH_KEYS)?,
            },
            ToolName::ListFiles => BuildToolCall::ListFiles {
                prefix: args.optional(&["prefix", "dir", "directory", "path"]),
            },
            ToolName::RunTest => BuildToolCall::RunTest {
                check_type: args
                    .optional(&["check_type", "checkType", "type"])
                    .unwrap_or_else(|| "all".to_string()),
            },
            ToolName::FixError => BuildToolCall::FixError {
                path: args.required(PATH_KEYS)?,
                message: args.required(&["message", "error", "error_message"])?,
                description: args.optional(&["description", "fix"]).unwrap_or_default(),
            },
            ToolName::Complete => BuildToolCall::Complete {
                summary: args
                    .optional(&["summary", "message"])
                    .unwrap_or_else(|| "Build complete".to_string()),
                files_created: args.list(&["files_created", "filesCreated", "files"]),
                next_steps: args.list(&["next_steps", "nextSteps"]),
            },
        })
    }

    pub fn name(&self) -> ToolName {
        match self {
            BuildToolCall::CreatePlan { .. } => ToolName::CreatePlan,
            BuildToolCall::WriteFile { .. } => ToolName::WriteFile,
            BuildToolCall::PatchFile { .. } => ToolName::PatchFile,
            BuildToolCall::SearchFiles { .. } => ToolName::SearchFiles,
            BuildToolCall::VerifyProject { .. } => ToolName::VerifyProject,
            BuildToolCall::DeleteFile { .. } => ToolName::DeleteFile,
            BuildToolCall::ReadFile { .. } => ToolName::ReadFile,
            BuildToolCall::ListFiles { .. } => ToolName::ListFiles,
            BuildToolCall::RunTest { .. } => ToolName::RunTest,
            BuildToolCall::FixError { .. } => ToolName::FixError,
            BuildToolCall::Complete { .. } => ToolName::Complete,
        }
    }
}

struct ArgReader<'a> {
    tool: &'a str,
    value: &'a Value,
}

impl ArgReader<'_> {
    fn find(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter()
            .find_map(|key| self.value.get(*key))
            .filter(|v| !v.is_null())
    }

    fn required(&self, keys: &[&str]) -> Result<String, ToolError> {
        match self.find(keys) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(Value::Bool(b)) => Ok(b.to_string()),
            Some(_) => Err(ToolError::invalid(self.tool, keys[0], "expected a string")),
            None => Err(ToolError::missing(self.tool, keys[0])),
        }
    }

    fn optional(&self, keys: &[&str]) -> Option<String> {
        match self.find(keys) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
            _ => None,
        }
    }

    /// A string list; a single string is accepted as a one-element list.
    fn list(&self, keys: &[&str]) -> Vec<String> {
        match self.find(keys) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.to_string())
                .collect(),
            Some(Value::String(s)) if !s.trim().is_empty() => vec![s.clone()],
            _ => Vec::new(),
        }
    }
}
