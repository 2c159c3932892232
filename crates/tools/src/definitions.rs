//! Build Tool Definitions
//!
//! The fixed, versioned tool surface offered to backends. Multi-tool backends
//! see all eleven tools; single-tool backends see only `write_file`, plus the
//! planning declaration used internally for plan extraction.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use appweaver_llm::types::{ParameterSchema, ToolDefinition};

use crate::error::ToolError;

/// Version of the tool surface below. Bump when a schema changes.
pub const TOOLSET_VERSION: &str = "2";

/// Names of the eleven build tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    CreatePlan,
    WriteFile,
    PatchFile,
    SearchFiles,
    VerifyProject,
    DeleteFile,
    ReadFile,
    ListFiles,
    RunTest,
    FixError,
    Complete,
}

impl ToolName {
    pub const ALL: [ToolName; 11] = [
        ToolName::CreatePlan,
        ToolName::WriteFile,
        ToolName::PatchFile,
        ToolName::SearchFiles,
        ToolName::VerifyProject,
        ToolName::DeleteFile,
        ToolName::ReadFile,
        ToolName::ListFiles,
        ToolName::RunTest,
        ToolName::FixError,
        ToolName::Complete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::CreatePlan => "create_plan",
            ToolName::WriteFile => "write_file",
            ToolName::PatchFile => "patch_file",
            ToolName::SearchFiles => "search_files",
            ToolName::VerifyProject => "verify_project",
            ToolName::DeleteFile => "delete_file",
            ToolName::ReadFile => "read_file",
            ToolName::ListFiles => "list_files",
            ToolName::RunTest => "run_test",
            ToolName::FixError => "fix_error",
            ToolName::Complete => "complete",
        }
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolName::ALL
            .iter()
            .copied()
            .find(|name| name.as_str() == s.trim())
            .ok_or_else(|| ToolError::UnknownTool(s.to_string()))
    }
}

fn props(entries: Vec<(&str, ParameterSchema)>) -> HashMap<String, ParameterSchema> {
    entries
        .into_iter()
        .map(|(name, schema)| (name.to_string(), schema))
        .collect()
}

fn required(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn string_list(description: &str) -> ParameterSchema {
    ParameterSchema::array(Some(description), ParameterSchema::string(None))
}

/// Definition of one build tool.
pub fn tool_definition(name: ToolName) -> ToolDefinition {
    let (description, input_schema) = match name {
        ToolName::CreatePlan => (
            "Declare the app plan before writing code. file_tree lists every file the build \
             will produce; the build cannot complete until all of them are written. Call once.",
            ParameterSchema::object(
                None,
                props(vec![
                    ("app_name", ParameterSchema::string(Some("Display name of the app"))),
                    (
                        "app_type",
                        ParameterSchema::string(Some("Category, e.g. productivity, social, game")),
                    ),
                    ("features", string_list("User-facing features")),
                    ("screens", string_list("Screen names")),
                    (
                        "file_tree",
                        string_list("Every relative file path the build will create, in write order"),
                    ),
                    ("dependencies", string_list("npm packages the app needs")),
                    ("plan_steps", string_list("Ordered implementation steps")),
                ]),
                required(&["app_name", "app_type", "file_tree"]),
            ),
        ),
        ToolName::WriteFile => (
            "Create or overwrite a project file with complete content.",
            ParameterSchema::object(
                None,
                props(vec![
                    ("path", ParameterSchema::string(Some("Relative file path"))),
                    ("content", ParameterSchema::string(Some("Full file content"))),
                ]),
                required(&["path", "content"]),
            ),
        ),
        ToolName::PatchFile => (
            "Replace the first occurrence of `find` with `replace` in an existing file. \
             Fails if the file or the text does not exist.",
            ParameterSchema::object(
                None,
                props(vec![
                    ("path", ParameterSchema::string(Some("Relative file path"))),
                    ("find", ParameterSchema::string(Some("Exact text to replace"))),
                    ("replace", ParameterSchema::string(Some("Replacement text"))),
                ]),
                required(&["path", "find", "replace"]),
            ),
        ),
        ToolName::SearchFiles => (
            "Case-insensitive text search across project files. Returns path:line matches.",
            ParameterSchema::object(
                None,
                props(vec![
                    ("query", ParameterSchema::string(Some("Text to search for"))),
                    (
                        "path_prefix",
                        ParameterSchema::string(Some("Only search under this directory")),
                    ),
                ]),
                required(&["query"]),
            ),
        ),
        ToolName::VerifyProject => (
            "Run static project checks and report errors and warnings.",
            ParameterSchema::object(
                None,
                props(vec![(
                    "checks",
                    ParameterSchema::array(
                        Some("Checks to run; empty runs all"),
                        ParameterSchema::string_enum(None, &["imports", "syntax", "empty", "entry"]),
                    ),
                )]),
                vec![],
            ),
        ),
        ToolName::DeleteFile => (
            "Delete a project file. Deleting a missing file is not an error.",
            ParameterSchema::object(
                None,
                props(vec![("path", ParameterSchema::string(Some("Relative file path")))]),
                required(&["path"]),
            ),
        ),
        ToolName::ReadFile => (
            "Read the content of a project file.",
            ParameterSchema::object(
                None,
                props(vec![("path", ParameterSchema::string(Some("Relative file path")))]),
                required(&["path"]),
            ),
        ),
        ToolName::ListFiles => (
            "List project file paths, optionally under a directory prefix.",
            ParameterSchema::object(
                None,
                props(vec![("prefix", ParameterSchema::string(Some("Directory prefix")))]),
                vec![],
            ),
        ),
        ToolName::RunTest => (
            "Run a named test suite over the project: lint, typecheck, smoke or all.",
            ParameterSchema::object(
                None,
                props(vec![(
                    "check_type",
                    ParameterSchema::string_enum(
                        Some("Suite to run"),
                        &["lint", "typecheck", "smoke", "all"],
                    ),
                )]),
                required(&["check_type"]),
            ),
        ),
        ToolName::FixError => (
            "Report an error in a file and get its current content back for repair.",
            ParameterSchema::object(
                None,
                props(vec![
                    ("path", ParameterSchema::string(Some("File containing the error"))),
                    ("message", ParameterSchema::string(Some("Error message"))),
                    ("description", ParameterSchema::string(Some("Planned fix"))),
                ]),
                required(&["path", "message"]),
            ),
        ),
        ToolName::Complete => (
            "Finish the build. Rejected while any planned file is still unwritten.",
            ParameterSchema::object(
                None,
                props(vec![
                    ("summary", ParameterSchema::string(Some("What was built"))),
                    ("files_created", string_list("Paths written during the build")),
                    ("next_steps", string_list("Suggested follow-ups")),
                ]),
                required(&["summary"]),
            ),
        ),
    };

    ToolDefinition {
        name: name.as_str().to_string(),
        description: description.to_string(),
        input_schema,
    }
}

/// All eleven build tools.
pub fn all_tool_definitions() -> Vec<ToolDefinition> {
    ToolName::ALL.iter().map(|name| tool_definition(*name)).collect()
}

/// The planning declaration alone.
pub fn planning_tool_definitions() -> Vec<ToolDefinition> {
    vec![tool_definition(ToolName::CreatePlan)]
}

/// The single-tool surface: `write_file` only.
pub fn write_only_tool_definitions() -> Vec<ToolDefinition> {
    vec![tool_definition(ToolName::WriteFile)]
}
