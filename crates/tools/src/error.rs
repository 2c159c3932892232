//! Tool argument errors.

use thiserror::Error;

/// Failure to turn a backend tool call into a typed [`crate::BuildToolCall`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("{tool}: missing required argument '{argument}'")]
    MissingArgument { tool: String, argument: String },

    #[error("{tool}: invalid argument '{argument}': {message}")]
    InvalidArgument {
        tool: String,
        argument: String,
        message: String,
    },
}

impl ToolError {
    pub fn missing(tool: &str, argument: &str) -> Self {
        Self::MissingArgument {
            tool: tool.to_string(),
            argument: argument.to_string(),
        }
    }

    pub fn invalid(tool: &str, argument: &str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            tool: tool.to_string(),
            argument: argument.to_string(),
            message: message.into(),
        }
    }
}
