//! Appweaver Core
//!
//! Foundational types for the Appweaver workspace. This crate has no
//! dependency on providers, tools or the runtime.
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `plan` - The plan contract and pending-path computation
//! - `files` - File records and language inference
//! - `phase` - Build phase state machine and run modes
//! - `streaming` - Build event types
//! - `snapshot` - Pure reducer from events to run state

pub mod error;
pub mod files;
pub mod phase;
pub mod plan;
pub mod snapshot;
pub mod streaming;

pub use error::{CoreError, CoreResult};
pub use files::{language_for_path, FileRecord, FileStatus};
pub use phase::{BuildMode, BuildPhase};
pub use plan::{normalize_path, pending_paths, Plan};
pub use snapshot::{CompletionSummary, RunSnapshot};
pub use streaming::{BuildEvent, BuildEventKind, ToolResultPayload};
