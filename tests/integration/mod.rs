//! Integration Tests Module
//!
//! End-to-end runs of the orchestrator against a scripted LLM provider, going
//! through the real backend profiles and the in-memory project executor.

// Scripted provider and run helpers
mod support;

// Plan, write, complete flows through the multi-tool profile
mod build_flow_test;

// Single-tool profile and prompt-based tool calling
mod profiles_test;

// Event stream folding
mod snapshot_test;
