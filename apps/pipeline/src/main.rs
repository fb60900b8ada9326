mod artifacts;
mod changes;
mod config;
mod errors;
mod extract;
mod llm_client;
mod merge;
mod pipeline;
mod summary;
mod tasks;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::artifacts::ArtifactStore;
use crate::config::Config;
use crate::errors::Phase;
use crate::extract::extractor::DEFAULT_SECTION_CAP;
use crate::llm_client::OpenAiClient;
use crate::merge::DEFAULT_SLOT_BUDGET;
use crate::pipeline::{Pipeline, PipelinePaths, WriteMode};
use crate::tasks::{spawn_pipeline, TaskRegistry, TaskState};

/// Tailors a LaTeX resume to a job description using a local LLM.
#[derive(Debug, Parser)]
#[command(name = "tailor", version, about)]
struct Cli {
    /// Job description text file
    #[arg(long, default_value = "jd.txt")]
    jd: PathBuf,

    /// LaTeX skills block file
    #[arg(long, default_value = "skills.tex")]
    skills: PathBuf,

    /// Full LaTeX resume source
    #[arg(long, default_value = "resume.tex")]
    resume: PathBuf,

    /// Directory for persisted artifacts and checkpoints
    #[arg(long, default_value = "artifacts")]
    artifacts_dir: PathBuf,

    /// OpenAI-compatible endpoint base URL
    #[arg(long, env = "TAILOR_BASE_URL")]
    base_url: Option<String>,

    /// Model identifier passed to the endpoint
    #[arg(long, env = "TAILOR_MODEL")]
    model: Option<String>,

    /// API key sent as a bearer token (local hosts accept any value)
    #[arg(long, env = "TAILOR_API_KEY")]
    api_key: Option<String>,

    /// Per-skill-section cap in the extraction artifact
    #[arg(long, default_value_t = DEFAULT_SECTION_CAP)]
    cap: usize,

    /// Maximum entries per category line after the merge
    #[arg(long, default_value_t = DEFAULT_SLOT_BUDGET)]
    budget: usize,

    /// Write artifacts but leave the .tex sources untouched
    #[arg(long, conflicts_with = "dry_run")]
    artifacts_only: bool,

    /// Compute everything, modify nothing outside the artifacts directory
    #[arg(long)]
    dry_run: bool,

    /// Keep derived artifacts from earlier runs (debugging aid)
    #[arg(long)]
    no_clean: bool,

    /// Phase to resume from (earlier phases must have left artifacts)
    #[arg(long, value_enum)]
    from: Option<StartPhase>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StartPhase {
    Extract,
    Merge,
    Summary,
}

impl From<StartPhase> for Phase {
    fn from(start: StartPhase) -> Self {
        match start {
            StartPhase::Extract => Phase::ExtractSkills,
            StartPhase::Merge => Phase::MergeSkills,
            StartPhase::Summary => Phase::TailorSummary,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env();

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting tailor v{}", env!("CARGO_PKG_VERSION"));

    let base_url = cli.base_url.unwrap_or(config.base_url);
    let model = cli.model.unwrap_or(config.model);
    let api_key = cli.api_key.unwrap_or(config.api_key);
    info!("LLM endpoint: {base_url} (model: {model})");

    let endpoint = Arc::new(OpenAiClient::new(
        base_url,
        api_key,
        model,
        config.timeout_secs,
    ));

    let mode = if cli.dry_run {
        WriteMode::DryRun
    } else if cli.artifacts_only {
        WriteMode::ArtifactsOnly
    } else {
        WriteMode::Full
    };

    let store = ArtifactStore::new(&cli.artifacts_dir)?;
    let paths = PipelinePaths {
        jd: cli.jd,
        skills: cli.skills,
        resume: cli.resume,
    };
    let mut pipeline = Pipeline::new(endpoint, store, paths, mode, cli.cap, cli.budget);
    if cli.no_clean {
        pipeline = pipeline.keep_stale_artifacts();
    }

    let start: Phase = cli.from.map(Into::into).unwrap_or(Phase::ExtractSkills);

    let registry = Arc::new(TaskRegistry::default());
    let (id, handle) = spawn_pipeline(Arc::clone(&registry), pipeline, start);
    handle.await?;

    let record = registry
        .get(id)
        .ok_or_else(|| anyhow!("task record missing for run {id}"))?;
    match record.state {
        TaskState::Completed => {
            let report = record
                .result
                .ok_or_else(|| anyhow!("completed run carried no report"))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        _ => bail!(record
            .error
            .unwrap_or_else(|| "pipeline run did not complete".to_string())),
    }
}
