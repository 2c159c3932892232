//! Utilities

pub mod error;
pub mod project_dir;
