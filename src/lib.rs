//! Appweaver
//!
//! LLM-driven builder that turns an app description into a complete
//! multi-file project. This crate holds:
//! - Configuration (`models::settings`, `models::orchestrator`)
//! - Provider adapters for the multi-tool and single-tool backend profiles
//! - The build orchestrator and its event stream
//! - CLI support (logging, project directory I/O)

pub mod logging;
pub mod models;
pub mod services;
pub mod utils;

pub use models::orchestrator::{OrchestratorConfig, RunRequest, RunSummary};
pub use models::settings::{AppConfig, BackendProfile};
pub use services::backend::{
    create_backend, BackendTurn, BuildBackend, ConversationState, MultiToolBackend,
    SingleToolBackend,
};
pub use services::orchestrator::{BuildRun, Orchestrator};
pub use utils::error::{AppError, AppResult};
