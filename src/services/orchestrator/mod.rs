//! Build Orchestrator
//!
//! The agent loop that turns one request into a bounded sequence of backend
//! turns and tool calls, gated by the plan contract.

mod budget;
mod continuation;
mod emitter;
pub mod prompts;
mod run_state;
mod service;


pub use budget::{BudgetExceeded, BudgetGuard};
pub use continuation::{ContinuationDecision, ContinuationPolicy};
pub use emitter::EventEmitter;
pub use run_state::RunState;
pub use service::{BuildRun, Orchestrator};
