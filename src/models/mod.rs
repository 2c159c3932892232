//! Data Models

pub mod orchestrator;
pub mod settings;
