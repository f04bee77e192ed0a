//! The top-level pipeline state machine.
//!
//! The driver sequences the five stages in fixed order, consults the
//! checkpoint to skip completed ones, hands each remaining stage's input
//! manifest to the executor together with that stage's collaborator, and
//! aborts the run when a stage fails wholesale. Stage N+1 never starts
//! before stage N's executor call returns: its input manifest only exists
//! once stage N has been flushed, which also keeps the checkpoint
//! granularity meaningful.

use crate::config::PipelineConfig;
use crate::errors::{PipelineError, PipelineResult};
use crate::events::{EventSink, LoggingEventSink};
use crate::executor::{ItemWorker, StageExecutor};
use crate::manifest::{
    AudioTrack, DiscoveredMedia, ManifestStore, RemoteAudio, Summary, Transcript,
};
use crate::outcome::{Outcome, StageReport};
use crate::stage::Stage;
use crate::workdir::RunPlan;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Finds the media files a run will process.
///
/// Unlike the per-item stages, discovery produces the initial manifest in
/// one call.
#[async_trait]
pub trait MediaScanner: Send + Sync {
    /// Walks `input_dir` and returns the discovered files in a stable order.
    async fn scan(&self, input_dir: &Path) -> PipelineResult<Vec<DiscoveredMedia>>;
}

/// The per-item collaborators for the four executor-driven stages.
#[derive(Clone)]
pub struct StageWorkers {
    /// Audio extraction (video in, audio out).
    pub extract: Arc<dyn ItemWorker<DiscoveredMedia, AudioTrack>>,
    /// Object-storage upload.
    pub upload: Arc<dyn ItemWorker<AudioTrack, RemoteAudio>>,
    /// Speech-to-text transcription.
    pub transcribe: Arc<dyn ItemWorker<RemoteAudio, Transcript>>,
    /// Transcript summarization.
    pub summarize: Arc<dyn ItemWorker<Transcript, Summary>>,
}

/// How a run ended (abort is reported as an error instead).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// All five stages completed.
    Completed,
    /// Credentials for the remote stages were missing; the run stopped
    /// after extraction and was marked complete with a warning.
    CompletedDegraded,
    /// Discovery found no media files.
    NothingToDo,
}

/// Summary of one driver run.
#[derive(Debug)]
pub struct RunReport {
    /// Identifier of this run attempt.
    pub run_id: Uuid,
    /// How the run ended.
    pub status: RunStatus,
    /// The working directory used.
    pub workdir: PathBuf,
    /// Aggregate counts per executor-driven stage, in execution order.
    pub stages: Vec<(Stage, StageReport)>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
}

/// Drives one pipeline run to completion, resumption, or abort.
pub struct PipelineDriver {
    config: PipelineConfig,
    plan: RunPlan,
    scanner: Arc<dyn MediaScanner>,
    workers: StageWorkers,
    events: Arc<dyn EventSink>,
}

impl PipelineDriver {
    /// Creates a driver over a resolved run plan.
    ///
    /// Events default to tracing output; use [`Self::with_events`] to
    /// observe the run differently.
    #[must_use]
    pub fn new(
        config: PipelineConfig,
        plan: RunPlan,
        scanner: Arc<dyn MediaScanner>,
        workers: StageWorkers,
    ) -> Self {
        Self {
            config,
            plan,
            scanner,
            workers,
            events: Arc::new(LoggingEventSink),
        }
    }

    /// Replaces the event sink.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Runs every stage not yet covered by the checkpoint.
    ///
    /// Returns the run report on success (including degraded and
    /// nothing-to-do completions); a stage whose items all failed aborts the
    /// run with [`PipelineError::StageAborted`].
    pub async fn run(mut self) -> PipelineResult<RunReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        if !self.config.input_dir.is_dir() {
            return Err(PipelineError::InvalidInput {
                path: self.config.input_dir.clone(),
            });
        }

        let store = ManifestStore::new(&self.plan.workdir);
        let executor = StageExecutor::new(self.config.concurrency);
        let mut stages: Vec<(Stage, StageReport)> = Vec::new();

        self.events.try_emit(
            "run.started",
            Some(serde_json::json!({
                "run_id": run_id,
                "workdir": self.plan.workdir.display().to_string(),
                "checkpoint": self.plan.checkpoint.current(),
            })),
        );

        // DISCOVER
        if self.stage_is_done(Stage::Discover) {
            self.log_skip(Stage::Discover);
        } else {
            let found = self.scanner.scan(&self.config.input_dir).await?;
            info!(count = found.len(), "discovery finished");
            store.store(Stage::Discover, &found)?;

            if found.is_empty() {
                warn!("no media files found under the input directory; nothing to do");
                self.plan.checkpoint.write(Stage::terminal());
                self.events.try_emit("run.empty", None);
                return Ok(self.report(run_id, RunStatus::NothingToDo, stages, started_at));
            }
            self.plan.checkpoint.advance();
        }

        // EXTRACT
        if self.stage_is_done(Stage::Extract) {
            self.log_skip(Stage::Extract);
        } else if self.config.audio_only {
            // Pass-through: the discover manifest is copied verbatim, but
            // the checkpoint still advances so resumption stays uniform.
            let media: Vec<DiscoveredMedia> = store.load(Stage::Discover)?;
            let tracks: Vec<AudioTrack> = media
                .into_iter()
                .map(|m| AudioTrack {
                    ordinal: m.ordinal,
                    path: m.path,
                })
                .collect();
            store.store(Stage::Extract, &tracks)?;
            self.plan.checkpoint.advance();
            info!(count = tracks.len(), "audio-only mode: extraction passed through");
        } else {
            let report = self
                .run_stage(
                    Stage::Extract,
                    Stage::Discover,
                    &store,
                    &executor,
                    Arc::clone(&self.workers.extract),
                )
                .await?;
            stages.push((Stage::Extract, report));
        }

        // The remote stages need credentials; without them the run is
        // deliberately marked complete after the local work.
        if self.plan.checkpoint.current() < Stage::terminal() && self.config.credentials.is_none() {
            warn!(
                "service credentials are missing; stopping after extraction and marking the run complete"
            );
            self.plan.checkpoint.write(Stage::terminal());
            self.events.try_emit("run.degraded", None);
            return Ok(self.report(run_id, RunStatus::CompletedDegraded, stages, started_at));
        }

        // UPLOAD
        if self.stage_is_done(Stage::Upload) {
            self.log_skip(Stage::Upload);
        } else {
            let report = self
                .run_stage(
                    Stage::Upload,
                    Stage::Extract,
                    &store,
                    &executor,
                    Arc::clone(&self.workers.upload),
                )
                .await?;
            stages.push((Stage::Upload, report));
        }

        // TRANSCRIBE
        if self.stage_is_done(Stage::Transcribe) {
            self.log_skip(Stage::Transcribe);
        } else {
            let report = self
                .run_stage(
                    Stage::Transcribe,
                    Stage::Upload,
                    &store,
                    &executor,
                    Arc::clone(&self.workers.transcribe),
                )
                .await?;
            stages.push((Stage::Transcribe, report));
        }

        // SUMMARIZE
        if self.stage_is_done(Stage::Summarize) {
            self.log_skip(Stage::Summarize);
        } else {
            let report = self
                .run_stage(
                    Stage::Summarize,
                    Stage::Transcribe,
                    &store,
                    &executor,
                    Arc::clone(&self.workers.summarize),
                )
                .await?;
            stages.push((Stage::Summarize, report));
        }

        self.events.try_emit(
            "run.completed",
            Some(serde_json::json!({ "run_id": run_id })),
        );
        Ok(self.report(run_id, RunStatus::Completed, stages, started_at))
    }

    /// Loads `input_stage`'s manifest, fans it out to `worker`, applies the
    /// acceptance rule, persists the surviving records, and advances the
    /// checkpoint.
    async fn run_stage<I, O>(
        &mut self,
        stage: Stage,
        input_stage: Stage,
        store: &ManifestStore,
        executor: &StageExecutor,
        worker: Arc<dyn ItemWorker<I, O>>,
    ) -> PipelineResult<StageReport>
    where
        I: DeserializeOwned + Send + 'static,
        O: Serialize + Send + 'static,
    {
        let items: Vec<I> = store.load(input_stage)?;
        info!(%stage, count = items.len(), "stage started");
        self.events.try_emit(
            "stage.started",
            Some(serde_json::json!({ "stage": stage, "items": items.len() })),
        );

        let (outcomes, report) = executor.run(items, worker).await;

        for (index, outcome) in outcomes.iter().enumerate() {
            if let Some(reason) = outcome.failure_reason() {
                warn!(%stage, index, reason, "item failed");
            }
        }

        if report.is_total_failure() {
            self.events.try_emit(
                "run.aborted",
                Some(serde_json::json!({ "stage": stage, "failed": report.failure_count })),
            );
            return Err(PipelineError::StageAborted {
                stage,
                failed: report.failure_count,
            });
        }

        // Failures are dropped; successes and skips flow on in input order.
        let survivors: Vec<O> = outcomes.into_iter().filter_map(Outcome::into_value).collect();
        store.store(stage, &survivors)?;
        self.plan.checkpoint.advance();

        info!(%stage, %report, "stage completed");
        self.events.try_emit(
            "stage.completed",
            Some(serde_json::json!({
                "stage": stage,
                "success": report.success_count,
                "failed": report.failure_count,
                "skipped": report.skipped_count,
            })),
        );
        Ok(report)
    }

    fn stage_is_done(&self, stage: Stage) -> bool {
        self.plan.checkpoint.current() >= stage.index()
    }

    fn log_skip(&self, stage: Stage) {
        info!(%stage, checkpoint = self.plan.checkpoint.current(), "stage already completed; skipping");
        self.events
            .try_emit("stage.skipped", Some(serde_json::json!({ "stage": stage })));
    }

    fn report(
        &self,
        run_id: Uuid,
        status: RunStatus,
        stages: Vec<(Stage, StageReport)>,
        started_at: DateTime<Utc>,
    ) -> RunReport {
        RunReport {
            run_id,
            status,
            workdir: self.plan.workdir.clone(),
            stages,
            started_at,
            finished_at: Utc::now(),
        }
    }
}
