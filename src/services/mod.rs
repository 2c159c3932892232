//! Services
//!
//! The provider adapters and the build orchestrator.

pub mod backend;
pub mod orchestrator;

pub use backend::{create_backend, BackendTurn, BuildBackend, ConversationState};
pub use orchestrator::{BuildRun, Orchestrator};
