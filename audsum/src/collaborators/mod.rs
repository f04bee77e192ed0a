//! The stage collaborators: discovery walk, ffmpeg extraction, object
//! upload, transcription, and summarization.
//!
//! The orchestration core only sees these through the
//! [`MediaScanner`](crate::driver::MediaScanner) and
//! [`ItemWorker`](crate::executor::ItemWorker) contracts; everything
//! stage-specific (subprocess flags, HTTP payloads, file formats) lives
//! here.

mod discover;
mod extract;
mod summarize;
mod transcribe;
mod upload;

pub use discover::FileSystemScanner;
pub use extract::FfmpegExtractor;
pub use summarize::SummaryClient;
pub use transcribe::TranscriptionClient;
pub use upload::ObjectStoreUploader;

use crate::config::PipelineConfig;
use crate::driver::StageWorkers;
use crate::executor::ItemWorker;
use crate::outcome::Outcome;
use crate::workdir::RunPlan;
use async_trait::async_trait;
use std::sync::Arc;

/// Placeholder for stages whose credentials are absent.
///
/// The driver ends the run before the remote stages when credentials are
/// missing, so this worker never runs in practice; if it ever does, it fails
/// the item with a clear reason instead of panicking.
struct UnavailableWorker(&'static str);

#[async_trait]
impl<I, O> ItemWorker<I, O> for UnavailableWorker
where
    I: Send + 'static,
    O: Send + 'static,
{
    async fn process(&self, _item: I) -> Outcome<O> {
        Outcome::Failure(format!("stage unavailable: {}", self.0))
    }
}

/// Builds the production collaborators for a resolved run.
///
/// When credentials are missing the remote slots get placeholders that fail
/// cleanly; the driver's degraded-completion path means they are never
/// invoked.
#[must_use]
pub fn standard_workers(config: &PipelineConfig, plan: &RunPlan) -> StageWorkers {
    let extract = Arc::new(FfmpegExtractor::new(
        &config.ffmpeg_path,
        &config.ffprobe_path,
        plan.audio_dir(),
    ));

    config.credentials.as_ref().map_or_else(
        || StageWorkers {
            extract: extract.clone(),
            upload: Arc::new(UnavailableWorker("object storage credentials missing")),
            transcribe: Arc::new(UnavailableWorker("transcription credentials missing")),
            summarize: Arc::new(UnavailableWorker("summary credentials missing")),
        },
        |creds| StageWorkers {
            extract: extract.clone(),
            upload: Arc::new(ObjectStoreUploader::new(creds)),
            transcribe: Arc::new(TranscriptionClient::new(creds, plan.transcript_dir())),
            summarize: Arc::new(SummaryClient::new(creds, config.output_dir.clone())),
        },
    )
}
