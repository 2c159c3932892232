//! Core Error Types
//!
//! Foundational error types shared by every Appweaver crate. The core crate
//! stays dependency-light (thiserror + serde), so the application crate
//! extends these with I/O and provider variants of its own.

use thiserror::Error;

/// Core error type for the Appweaver workspace.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A plan manifest that cannot become a completion contract
    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    /// A project path that cannot be normalized
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid plan error
    pub fn invalid_plan(msg: impl Into<String>) -> Self {
        Self::InvalidPlan(msg.into())
    }

    /// Create an invalid path error
    pub fn invalid_path(msg: impl Into<String>) -> Self {
        Self::InvalidPath(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Convert CoreError to a string
impl From<CoreError> for String {
    fn from(err: CoreError) -> String {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::config("invalid setting");
        assert_eq!(err.to_string(), "Configuration error: invalid setting");
    }

    #[test]
    fn test_error_conversion() {
        let err = CoreError::invalid_plan("file_tree is empty");
        let msg: String = err.into();
        assert_eq!(msg, "Invalid plan: file_tree is empty");
    }

    #[test]
    fn test_serde_error_conversion() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let core_err: CoreError = serde_err.into();
        assert!(matches!(core_err, CoreError::Serialization(_)));
    }

    #[test]
    fn test_invalid_path_error() {
        let err = CoreError::invalid_path("../etc/passwd");
        assert_eq!(err.to_string(), "Invalid path: ../etc/passwd");
    }
}
