//! Appweaver Tools
//!
//! The build tool surface and the project it operates on:
//! - `ToolName` / tool definitions - the eleven tools offered to backends
//! - `BuildToolCall` - typed decoding of backend tool calls
//! - `ProjectExecutor` / `ToolResult` - the executor contract
//! - `InMemoryProject` - default virtual project
//! - `verify` - static project checks
//! - `prompt_fallback` - textual tool calling for providers without native tools

pub mod calls;
pub mod definitions;
pub mod error;
pub mod executor;
pub mod memory;
pub mod prompt_fallback;
pub mod verify;

pub use calls::BuildToolCall;
pub use definitions::{
    all_tool_definitions, planning_tool_definitions, tool_definition,
    write_only_tool_definitions, ToolName, TOOLSET_VERSION,
};
pub use error::ToolError;
pub use executor::{ProjectExecutor, ToolResult};
pub use memory::{
    CompletionRecord, InMemoryProject, SearchMatch, FIX_ERROR_CONTENT_CAP, SEARCH_MATCH_CAP,
};
pub use prompt_fallback::{
    build_tool_call_instructions, extract_json_object, extract_text_without_tool_calls,
    format_tool_result, parse_tool_calls, ParsedToolCall,
};
pub use verify::{ProjectIssue, VerifyReport};
