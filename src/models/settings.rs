//! Settings Models
//!
//! Application configuration loaded from a TOML file, with API keys resolved
//! from the environment when the file omits them.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use appweaver_llm::ProviderConfig;

use super::orchestrator::OrchestratorConfig;
use crate::utils::error::{AppError, AppResult};

/// Capability profile of the LLM backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BackendProfile {
    /// All eleven tools, explicit plan and completion
    #[default]
    MultiTool,
    /// `write_file` only; planning and completion handled by the adapter
    SingleTool,
}

impl std::fmt::Display for BackendProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendProfile::MultiTool => write!(f, "multi-tool"),
            BackendProfile::SingleTool => write!(f, "single-tool"),
        }
    }
}

impl std::str::FromStr for BackendProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "multi-tool" | "multi" | "a" => Ok(BackendProfile::MultiTool),
            "single-tool" | "single" | "b" => Ok(BackendProfile::SingleTool),
            _ => Err(format!("Unknown backend profile: {}", s)),
        }
    }
}

/// Application configuration stored in appweaver.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub profile: BackendProfile,
}

impl AppConfig {
    /// Load from a TOML file and resolve the API key from the environment.
    pub fn load(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&raw)?;
        config.resolve_api_key(|var| std::env::var(var).ok());
        debug!(path = %path.display(), provider = %config.provider.provider, "loaded config");
        Ok(config)
    }

    /// Load `path` when given, otherwise start from defaults.
    pub fn load_or_default(path: Option<&Path>) -> AppResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let mut config = Self::default();
                config.resolve_api_key(|var| std::env::var(var).ok());
                Ok(config)
            }
        }
    }

    pub fn from_toml(raw: &str) -> AppResult<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Fill a missing API key from the provider's environment variable.
    pub fn resolve_api_key(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let has_key = self
            .provider
            .api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty());
        if has_key {
            return;
        }
        if let Some(var) = self.provider.provider.api_key_env() {
            self.provider.api_key = lookup(var).filter(|k| !k.trim().is_empty());
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> AppResult<()> {
        let orchestrator = &self.orchestrator;
        if orchestrator.max_iterations == 0 {
            return Err(AppError::config("max_iterations must be at least 1"));
        }
        if orchestrator.max_backend_calls == 0 {
            return Err(AppError::config("max_backend_calls must be at least 1"));
        }
        if orchestrator.continuation_batch_size == 0 {
            return Err(AppError::config("continuation_batch_size must be at least 1"));
        }
        if orchestrator.event_buffer == 0 {
            return Err(AppError::config("event_buffer must be at least 1"));
        }

        if let Some(var) = self.provider.provider.api_key_env() {
            if self.provider.api_key.is_none() {
                return Err(AppError::config(format!(
                    "{} requires an API key (set api_key or {})",
                    self.provider.provider, var
                )));
            }
        }
        Ok(())
    }
}
