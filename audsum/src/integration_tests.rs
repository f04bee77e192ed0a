//! End-to-end driver tests with scripted collaborators.

use crate::checkpoint::CHECKPOINT_FILE;
use crate::config::{PipelineConfig, ServiceCredentials};
use crate::driver::{MediaScanner, PipelineDriver, RunStatus, StageWorkers};
use crate::errors::{PipelineError, PipelineResult};
use crate::events::CollectingEventSink;
use crate::executor::ItemWorker;
use crate::manifest::{
    AudioTrack, DiscoveredMedia, ManifestStore, RemoteAudio, Summary, Transcript,
};
use crate::outcome::Outcome;
use crate::stage::Stage;
use crate::workdir::RunPlan;
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

struct StubScanner {
    count: usize,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl MediaScanner for StubScanner {
    async fn scan(&self, _input_dir: &Path) -> PipelineResult<Vec<DiscoveredMedia>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((1..=self.count)
            .map(|ordinal| DiscoveredMedia {
                ordinal,
                path: PathBuf::from(format!("/in/{ordinal:03}.mp4")),
            })
            .collect())
    }
}

struct ScriptedWorker<F> {
    calls: Arc<AtomicUsize>,
    behavior: F,
}

#[async_trait]
impl<I, O, F> ItemWorker<I, O> for ScriptedWorker<F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I) -> Outcome<O> + Send + Sync,
{
    async fn process(&self, item: I) -> Outcome<O> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.behavior)(item)
    }
}

#[derive(Default)]
struct Counters {
    scan: Arc<AtomicUsize>,
    extract: Arc<AtomicUsize>,
    upload: Arc<AtomicUsize>,
    transcribe: Arc<AtomicUsize>,
    summarize: Arc<AtomicUsize>,
}

fn track(m: DiscoveredMedia) -> AudioTrack {
    AudioTrack {
        ordinal: m.ordinal,
        path: m.path,
    }
}

fn remote(t: &AudioTrack) -> RemoteAudio {
    RemoteAudio {
        ordinal: t.ordinal,
        key: format!("audio_transcription/{:03}.mp3", t.ordinal),
        url: format!("https://bucket/{:03}.mp3", t.ordinal),
    }
}

fn transcript(r: &RemoteAudio) -> Transcript {
    Transcript {
        ordinal: r.ordinal,
        path: PathBuf::from(format!("/work/{:03}.txt", r.ordinal)),
    }
}

fn summary(t: &Transcript) -> Summary {
    Summary {
        ordinal: t.ordinal,
        path: PathBuf::from(format!("/out/{:03}_summary.md", t.ordinal)),
    }
}

/// Workers where every item succeeds.
fn passing_workers(counters: &Counters) -> StageWorkers {
    StageWorkers {
        extract: Arc::new(ScriptedWorker {
            calls: Arc::clone(&counters.extract),
            behavior: |m: DiscoveredMedia| Outcome::Success(track(m)),
        }),
        upload: Arc::new(ScriptedWorker {
            calls: Arc::clone(&counters.upload),
            behavior: |t: AudioTrack| Outcome::Success(remote(&t)),
        }),
        transcribe: Arc::new(ScriptedWorker {
            calls: Arc::clone(&counters.transcribe),
            behavior: |r: RemoteAudio| Outcome::Success(transcript(&r)),
        }),
        summarize: Arc::new(ScriptedWorker {
            calls: Arc::clone(&counters.summarize),
            behavior: |t: Transcript| Outcome::Success(summary(&t)),
        }),
    }
}

/// Workers where every item reports a reusable prior result.
fn skipping_workers(counters: &Counters) -> StageWorkers {
    StageWorkers {
        extract: Arc::new(ScriptedWorker {
            calls: Arc::clone(&counters.extract),
            behavior: |m: DiscoveredMedia| Outcome::Skipped(track(m)),
        }),
        upload: Arc::new(ScriptedWorker {
            calls: Arc::clone(&counters.upload),
            behavior: |t: AudioTrack| Outcome::Skipped(remote(&t)),
        }),
        transcribe: Arc::new(ScriptedWorker {
            calls: Arc::clone(&counters.transcribe),
            behavior: |r: RemoteAudio| Outcome::Skipped(transcript(&r)),
        }),
        summarize: Arc::new(ScriptedWorker {
            calls: Arc::clone(&counters.summarize),
            behavior: |t: Transcript| Outcome::Skipped(summary(&t)),
        }),
    }
}

fn dummy_credentials() -> ServiceCredentials {
    ServiceCredentials {
        bucket_name: "bucket".to_string(),
        bucket_endpoint: "https://storage.test".to_string(),
        bucket_access_key_id: "id".to_string(),
        bucket_access_key_secret: "secret".to_string(),
        transcribe_api_url: "https://api.test/v1".to_string(),
        transcribe_api_key: "tk".to_string(),
        summary_api_url: "https://api.test/v1".to_string(),
        summary_api_key: "sk".to_string(),
    }
}

struct Fixture {
    input: TempDir,
    output: TempDir,
    counters: Counters,
}

impl Fixture {
    fn new() -> Self {
        Self {
            input: TempDir::new().unwrap(),
            output: TempDir::new().unwrap(),
            counters: Counters::default(),
        }
    }

    fn config(&self) -> PipelineConfig {
        PipelineConfig::new(self.input.path(), self.output.path())
            .with_concurrency(2)
            .with_credentials(Some(dummy_credentials()))
    }

    fn driver(
        &self,
        config: PipelineConfig,
        file_count: usize,
        workers: StageWorkers,
    ) -> PipelineDriver {
        let plan = RunPlan::resolve(&config.output_dir, config.fresh).unwrap();
        let scanner = Arc::new(StubScanner {
            count: file_count,
            calls: Arc::clone(&self.counters.scan),
        });
        PipelineDriver::new(config, plan, scanner, workers)
    }

    fn checkpoint_value(&self) -> String {
        std::fs::read_to_string(self.output.path().join(CHECKPOINT_FILE))
            .unwrap()
            .trim()
            .to_string()
    }
}

#[tokio::test]
async fn test_full_pipeline_completes() {
    let fx = Fixture::new();
    let workers = passing_workers(&fx.counters);

    let report = fx.driver(fx.config(), 3, workers).run().await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(fx.checkpoint_value(), "5");
    for (_, stage_report) in &report.stages {
        assert_eq!(stage_report.success_count, 3);
        assert_eq!(stage_report.failure_count, 0);
    }

    let store = ManifestStore::new(&report.workdir);
    let summaries: Vec<Summary> = store.load(Stage::Summarize).unwrap();
    assert_eq!(summaries.len(), 3);
    assert_eq!(fx.counters.scan.load(Ordering::SeqCst), 1);
    assert_eq!(fx.counters.summarize.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_one_extraction_failure_drops_item_downstream() {
    let fx = Fixture::new();
    let mut workers = passing_workers(&fx.counters);
    workers.extract = Arc::new(ScriptedWorker {
        calls: Arc::clone(&fx.counters.extract),
        behavior: |m: DiscoveredMedia| {
            if m.ordinal == 3 {
                Outcome::Failure("codec not supported".to_string())
            } else {
                Outcome::Success(track(m))
            }
        },
    });

    let report = fx.driver(fx.config(), 5, workers).run().await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    let extract_report = report
        .stages
        .iter()
        .find(|(stage, _)| *stage == Stage::Extract)
        .map(|(_, r)| *r)
        .unwrap();
    assert_eq!(extract_report.success_count, 4);
    assert_eq!(extract_report.failure_count, 1);

    // The failed item is gone; ordinals of the survivors are untouched.
    let store = ManifestStore::new(&report.workdir);
    let uploaded: Vec<RemoteAudio> = store.load(Stage::Upload).unwrap();
    assert_eq!(
        uploaded.iter().map(|r| r.ordinal).collect::<Vec<_>>(),
        vec![1, 2, 4, 5]
    );
    assert_eq!(fx.counters.upload.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_total_upload_failure_aborts_run() {
    let fx = Fixture::new();
    let mut workers = passing_workers(&fx.counters);
    workers.upload = Arc::new(ScriptedWorker {
        calls: Arc::clone(&fx.counters.upload),
        behavior: |_t: AudioTrack| Outcome::Failure("bad credentials".to_string()),
    });

    let err = fx.driver(fx.config(), 5, workers).run().await.unwrap_err();

    match err {
        PipelineError::StageAborted { stage, failed } => {
            assert_eq!(stage, Stage::Upload);
            assert_eq!(failed, 5);
        }
        other => panic!("expected StageAborted, got {other}"),
    }
    // The checkpoint stays at extract-complete.
    assert_eq!(fx.checkpoint_value(), "2");
    assert_eq!(fx.counters.transcribe.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_completed_run_resumes_without_reinvoking_anyone() {
    let fx = Fixture::new();
    fx.driver(fx.config(), 3, passing_workers(&fx.counters))
        .run()
        .await
        .unwrap();

    let second = Counters::default();
    let report = fx
        .driver(fx.config(), 3, passing_workers(&second))
        .run()
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(second.extract.load(Ordering::SeqCst), 0);
    assert_eq!(second.upload.load(Ordering::SeqCst), 0);
    assert_eq!(second.transcribe.load(Ordering::SeqCst), 0);
    assert_eq!(second.summarize.load(Ordering::SeqCst), 0);
    // Discovery is also covered by the checkpoint.
    assert_eq!(fx.counters.scan.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_abort_then_resume_picks_up_at_failed_stage() {
    let fx = Fixture::new();
    let mut broken = passing_workers(&fx.counters);
    broken.upload = Arc::new(ScriptedWorker {
        calls: Arc::clone(&fx.counters.upload),
        behavior: |_t: AudioTrack| Outcome::Failure("network down".to_string()),
    });
    fx.driver(fx.config(), 4, broken).run().await.unwrap_err();

    let second = Counters::default();
    let report = fx
        .driver(fx.config(), 4, passing_workers(&second))
        .run()
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    // Discover and extract were not redone; upload onward ran.
    assert_eq!(second.extract.load(Ordering::SeqCst), 0);
    assert_eq!(second.upload.load(Ordering::SeqCst), 4);
    assert_eq!(second.summarize.load(Ordering::SeqCst), 4);
    assert_eq!(fx.checkpoint_value(), "5");
}

#[tokio::test]
async fn test_fresh_flag_bypasses_checkpoint() {
    let fx = Fixture::new();
    fx.driver(fx.config(), 2, passing_workers(&fx.counters))
        .run()
        .await
        .unwrap();
    assert_eq!(fx.checkpoint_value(), "5");

    let second = Counters::default();
    let config = fx.config().fresh(true);
    let report = fx
        .driver(config, 2, passing_workers(&second))
        .run()
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(second.extract.load(Ordering::SeqCst), 2);
    assert_eq!(second.summarize.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_missing_credentials_completes_degraded() {
    let fx = Fixture::new();
    let config = fx.config().with_credentials(None);

    let report = fx
        .driver(config, 3, passing_workers(&fx.counters))
        .run()
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::CompletedDegraded);
    assert_eq!(fx.checkpoint_value(), "5");
    assert_eq!(fx.counters.extract.load(Ordering::SeqCst), 3);
    assert_eq!(fx.counters.upload.load(Ordering::SeqCst), 0);

    let store = ManifestStore::new(&report.workdir);
    assert!(store.exists(Stage::Extract));
    assert!(!store.exists(Stage::Upload));
}

#[tokio::test]
async fn test_audio_only_passes_extraction_through() {
    let fx = Fixture::new();
    let config = fx.config().audio_only(true);

    let report = fx
        .driver(config, 3, passing_workers(&fx.counters))
        .run()
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    // No extraction workers ran, but the stage still advanced.
    assert_eq!(fx.counters.extract.load(Ordering::SeqCst), 0);
    assert_eq!(fx.counters.upload.load(Ordering::SeqCst), 3);

    let store = ManifestStore::new(&report.workdir);
    let discovered: Vec<DiscoveredMedia> = store.load(Stage::Discover).unwrap();
    let extracted: Vec<AudioTrack> = store.load(Stage::Extract).unwrap();
    assert_eq!(
        discovered.iter().map(|m| &m.path).collect::<Vec<_>>(),
        extracted.iter().map(|t| &t.path).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_empty_discovery_is_nothing_to_do() {
    let fx = Fixture::new();

    let report = fx
        .driver(fx.config(), 0, passing_workers(&fx.counters))
        .run()
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::NothingToDo);
    assert_eq!(fx.checkpoint_value(), "5");
    assert_eq!(fx.counters.extract.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_all_skipped_rerun_is_acceptable() {
    // A user reset (deleting the checkpoint) must not force recomputation:
    // skip-existing workers reuse every prior result and the stage-level
    // all-skipped aggregate is acceptable.
    let fx = Fixture::new();
    fx.driver(fx.config(), 3, passing_workers(&fx.counters))
        .run()
        .await
        .unwrap();

    std::fs::remove_file(fx.output.path().join(CHECKPOINT_FILE)).unwrap();

    let second = Counters::default();
    let report = fx
        .driver(fx.config(), 3, skipping_workers(&second))
        .run()
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    for (_, stage_report) in &report.stages {
        assert_eq!(stage_report.failure_count, 0);
        assert_eq!(stage_report.success_count, 0);
        assert_eq!(stage_report.skipped_count, 3);
    }
    assert_eq!(fx.checkpoint_value(), "5");
}

#[tokio::test]
async fn test_invalid_input_directory_is_rejected() {
    let fx = Fixture::new();
    let mut config = fx.config();
    config.input_dir = PathBuf::from("/no/such/input");

    let err = fx
        .driver(config, 3, passing_workers(&fx.counters))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::InvalidInput { .. }));
    assert_eq!(fx.counters.scan.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_events_bracket_the_run() {
    let fx = Fixture::new();
    let sink = Arc::new(CollectingEventSink::new());

    fx.driver(fx.config(), 2, passing_workers(&fx.counters))
        .with_events(Arc::clone(&sink) as Arc<dyn crate::events::EventSink>)
        .run()
        .await
        .unwrap();

    let types = sink.event_types();
    assert_eq!(types.first().map(String::as_str), Some("run.started"));
    assert_eq!(types.last().map(String::as_str), Some("run.completed"));
    assert!(types.iter().any(|t| t == "stage.completed"));
}
