//! Command-line entry point for the audsum pipeline.

use anyhow::Context;
use audsum::prelude::*;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

/// Turn a directory of audio/video files into text summaries.
#[derive(Debug, Parser)]
#[command(name = "audsum", version, about)]
struct Cli {
    /// Directory containing the audio/video files to process
    #[arg(long, value_name = "DIR")]
    input_dir: PathBuf,

    /// Directory receiving the summaries and intermediate state
    #[arg(long, value_name = "DIR")]
    output_dir: PathBuf,

    /// Number of items processed in parallel per stage
    #[arg(long, default_value_t = 1)]
    processes: usize,

    /// Skip audio extraction; use when the input is already audio-only
    #[arg(long)]
    audio_only: bool,

    /// Ignore any checkpoint and start over
    #[arg(long)]
    fresh: bool,

    /// JSON file with object-storage and API credentials; without it the
    /// run stops after extraction
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// ffmpeg executable
    #[arg(long, value_name = "PATH", default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    /// ffprobe executable
    #[arg(long, value_name = "PATH", default_value = "ffprobe")]
    ffprobe: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    audsum::logging::init();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let credentials = match &cli.config {
        Some(path) => Some(
            ServiceCredentials::load(path)
                .with_context(|| format!("loading credentials from {}", path.display()))?,
        ),
        None => None,
    };

    let config = PipelineConfig::new(cli.input_dir, cli.output_dir)
        .with_concurrency(cli.processes)
        .audio_only(cli.audio_only)
        .fresh(cli.fresh)
        .with_ffmpeg(cli.ffmpeg, cli.ffprobe)
        .with_credentials(credentials);

    let plan = RunPlan::resolve(&config.output_dir, config.fresh)
        .context("resolving the working directory")?;
    let workers = standard_workers(&config, &plan);

    let report = PipelineDriver::new(config, plan, Arc::new(FileSystemScanner), workers)
        .run()
        .await?;

    match report.status {
        RunStatus::Completed => info!(run_id = %report.run_id, "run completed"),
        RunStatus::CompletedDegraded => {
            info!(run_id = %report.run_id, "run completed without summaries (no credentials)");
        }
        RunStatus::NothingToDo => info!(run_id = %report.run_id, "no media files to process"),
    }
    for (stage, stage_report) in &report.stages {
        info!(%stage, %stage_report, "stage summary");
    }
    Ok(())
}
