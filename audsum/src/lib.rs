//! # Audsum
//!
//! A resumable batch pipeline that turns a directory of audio/video files
//! into text summaries.
//!
//! The pipeline runs five fixed stages in order — discover, extract, upload,
//! transcribe, summarize — fanning each stage out over a bounded worker pool
//! and persisting a checkpoint after every completed stage so an interrupted
//! run can resume without redoing finished work:
//!
//! - **Checkpoint manager**: a single persisted step counter with atomic
//!   writes and a defined recovery policy for corruption or loss
//! - **Stage executor**: order-preserving fan-out with per-item failure
//!   isolation and success/failure/skip aggregation
//! - **Manifest store**: ordered JSON record lists passed between stages
//! - **Pipeline driver**: the fixed linear state machine that skips
//!   completed stages and aborts on total failure
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use audsum::prelude::*;
//!
//! let config = PipelineConfig::new("/media/talks", "/media/summaries")
//!     .with_concurrency(4);
//! let plan = RunPlan::resolve(&config.output_dir, config.fresh)?;
//! let workers = standard_workers(&config, &plan);
//! let report = PipelineDriver::new(config, plan, Arc::new(FileSystemScanner), workers)
//!     .run()
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, missing_docs, rust_2018_idioms)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod checkpoint;
pub mod collaborators;
pub mod config;
pub mod driver;
pub mod errors;
pub mod events;
pub mod executor;
pub mod logging;
pub mod manifest;
pub mod outcome;
pub mod retry;
pub mod stage;
pub mod workdir;

#[cfg(test)]
mod integration_tests;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::checkpoint::CheckpointManager;
    pub use crate::collaborators::{standard_workers, FileSystemScanner};
    pub use crate::config::{PipelineConfig, ServiceCredentials};
    pub use crate::driver::{MediaScanner, PipelineDriver, RunReport, RunStatus, StageWorkers};
    pub use crate::errors::{PipelineError, PipelineResult};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::executor::{ItemWorker, StageExecutor};
    pub use crate::manifest::{
        AudioTrack, DiscoveredMedia, ManifestStore, RemoteAudio, Summary, Transcript,
    };
    pub use crate::outcome::{Outcome, StageReport};
    pub use crate::stage::Stage;
    pub use crate::workdir::RunPlan;
}
