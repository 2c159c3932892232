//! File Records
//!
//! Per-path bookkeeping for a run. The tool executor owns the actual bytes;
//! a record mirrors the last content the run wrote and its completion status.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a tracked path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// Declared by the plan, not yet written
    Pending,
    /// First written during this run
    Created,
    /// Written again, or patched
    Updated,
    /// Last write attempt failed
    Error,
}

impl FileStatus {
    /// Created and updated paths satisfy the completion contract.
    pub fn is_written(&self) -> bool {
        matches!(self, FileStatus::Created | FileStatus::Updated)
    }
}

/// A tracked project file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    #[serde(default)]
    pub content: String,
    pub language: String,
    pub status: FileStatus,
}

impl FileRecord {
    /// A plan-declared path with no content yet.
    pub fn pending(path: impl Into<String>) -> Self {
        let path = path.into();
        let language = language_for_path(&path).to_string();
        Self {
            path,
            content: String::new(),
            language,
            status: FileStatus::Pending,
        }
    }

    /// A path written with `content`.
    pub fn written(path: impl Into<String>, content: impl Into<String>, status: FileStatus) -> Self {
        let mut record = Self::pending(path);
        record.mark_written(content, status);
        record
    }

    pub fn mark_written(&mut self, content: impl Into<String>, status: FileStatus) {
        self.content = content.into();
        self.status = status;
    }
}

/// Map a path's extension to the language tag used in file events.
pub fn language_for_path(path: &str) -> &'static str {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let extension = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => return "plaintext",
    };
    match extension.as_str() {
        "ts" | "tsx" | "mts" | "cts" => "typescript",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "json" => "json",
        "md" | "mdx" => "markdown",
        "css" => "css",
        "scss" => "scss",
        "html" | "htm" => "html",
        "yml" | "yaml" => "yaml",
        "svg" | "xml" => "xml",
        _ => "plaintext",
    }
}
