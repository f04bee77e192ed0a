//! Error types for the audsum pipeline.

use crate::stage::Stage;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The input directory is missing or not a directory.
    #[error("input directory {} does not exist or is not a directory", path.display())]
    InvalidInput {
        /// The offending path.
        path: PathBuf,
    },

    /// A stage's input manifest could not be found.
    ///
    /// Raised when resuming into a working directory whose manifests have
    /// been removed out from under the checkpoint.
    #[error("manifest {} for stage {stage} is missing", path.display())]
    MissingManifest {
        /// The stage whose input was expected.
        stage: Stage,
        /// The manifest path that was looked up.
        path: PathBuf,
    },

    /// Every item of a stage failed; the run is aborted.
    #[error("all {failed} item(s) failed at stage {stage}")]
    StageAborted {
        /// The stage that failed wholesale.
        stage: Stage,
        /// Number of failed items.
        failed: usize,
    },

    /// A configuration file could not be loaded or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias used throughout the crate.
pub type PipelineResult<T> = Result<T, PipelineError>;
