//! appweaver CLI
//!
//! Runs one build against the configured provider. Events are printed to
//! stdout as JSON lines, followed by the final run summary.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use futures_util::StreamExt;
use tracing::{info, warn};

use appweaver::models::settings::{AppConfig, BackendProfile};
use appweaver::utils::project_dir::{read_project_dir, write_project_dir};
use appweaver::{logging, Orchestrator, RunRequest};
use appweaver_core::BuildMode;
use appweaver_llm::ProviderType;
use appweaver_tools::InMemoryProject;

#[derive(Parser)]
#[command(name = "appweaver", version)]
#[command(about = "Build a mobile app project from a description with an LLM agent")]
struct Cli {
    /// Description of the app to build
    prompt: String,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// build or plan
    #[arg(long, default_value = "build")]
    mode: BuildMode,

    /// multi-tool or single-tool
    #[arg(long)]
    profile: Option<BackendProfile>,

    /// anthropic, openai or ollama
    #[arg(long)]
    provider: Option<ProviderType>,

    #[arg(long)]
    model: Option<String>,

    #[arg(long)]
    max_iterations: Option<u32>,

    #[arg(long)]
    max_backend_calls: Option<u32>,

    /// Write the final project files here
    #[arg(long)]
    out: Option<PathBuf>,

    /// Seed the run with the files in this directory
    #[arg(long)]
    existing: Option<PathBuf>,
}

impl Cli {
    /// File configuration with command-line overrides applied.
    fn resolve_config(&self) -> Result<AppConfig> {
        let mut config = AppConfig::load_or_default(self.config.as_deref())
            .context("failed to load configuration")?;

        if let Some(provider) = self.provider {
            if provider != config.provider.provider {
                config.provider.provider = provider;
                config.provider.model = String::new();
                config.provider.api_key = None;
                config.resolve_api_key(|var| std::env::var(var).ok());
            }
        }
        if let Some(model) = &self.model {
            config.provider.model = model.clone();
        }
        if let Some(profile) = self.profile {
            config.profile = profile;
        }
        if let Some(max) = self.max_iterations {
            config.orchestrator.max_iterations = max;
        }
        if let Some(max) = self.max_backend_calls {
            config.orchestrator.max_backend_calls = max;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    let existing = match &cli.existing {
        Some(dir) => read_project_dir(dir)
            .with_context(|| format!("failed to read {}", dir.display()))?,
        None => BTreeMap::new(),
    };

    let project = Arc::new(InMemoryProject::new());
    let orchestrator = Arc::new(Orchestrator::from_config(&config, project.clone())?);

    let request = RunRequest::new(cli.prompt.clone())
        .with_mode(cli.mode)
        .with_existing_files(existing);
    let mut run = orchestrator.run(request);

    let token = run.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling run");
            token.cancel();
        }
    });
    while let Some(event) = run.next().await {
        println!("{}", serde_json::to_string(&event)?);
    }
    let summary = run.summary().await?;

    if let Some(dir) = &cli.out {
        let files = project.files().await;
        let written = write_project_dir(dir, &files)
            .with_context(|| format!("failed to write {}", dir.display()))?;
        info!(dir = %dir.display(), files = written, "project written");
    }

    println!("{}", serde_json::to_string(&summary)?);
    if !summary.success {
        std::process::exit(1);
    }
    Ok(())
}
