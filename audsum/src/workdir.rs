//! Working-directory resolution for fresh and resumed runs.
//!
//! Each run attempt gets one directory under `<output_root>/intermediates/`,
//! named `%Y%m%d_%H%M%S` so lexicographic order is chronological and "most
//! recent" resolution is a plain ordering operation.

use crate::checkpoint::CheckpointManager;
use crate::errors::PipelineResult;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Directory under the output root holding one subdirectory per run attempt.
pub const INTERMEDIATES_DIR: &str = "intermediates";

const AUDIO_SUBDIR: &str = "audios";
const TRANSCRIPT_SUBDIR: &str = "transcripts";

/// The resolved storage of one run attempt: the working directory plus the
/// checkpoint bound to the same output root.
#[derive(Debug)]
pub struct RunPlan {
    /// The active working directory for this attempt.
    pub workdir: PathBuf,
    /// The run's checkpoint, already reconciled with the directory state.
    pub checkpoint: CheckpointManager,
}

impl RunPlan {
    /// Resolves the working directory and checkpoint for a run.
    ///
    /// A zero checkpoint (or `fresh == true`) creates a new timestamped
    /// directory and establishes the checkpoint file at 0. A positive
    /// checkpoint resumes into the most recently created directory; if none
    /// exists the state is inconsistent (typically the user deleted the
    /// intermediates), so the checkpoint is reset and a fresh directory is
    /// created instead of crashing.
    pub fn resolve(output_root: &Path, fresh: bool) -> PipelineResult<Self> {
        fs::create_dir_all(output_root)?;
        let root = output_root.join(INTERMEDIATES_DIR);
        fs::create_dir_all(&root)?;

        let mut checkpoint = CheckpointManager::open(output_root);
        if fresh && checkpoint.current() > 0 {
            info!(
                step = checkpoint.current(),
                "fresh start requested; discarding checkpoint"
            );
            checkpoint.reset();
        }

        let workdir = if checkpoint.current() == 0 {
            let dir = create_workdir(&root)?;
            // Idempotent write at 0 to establish the file for this attempt.
            checkpoint.write(0);
            dir
        } else {
            match latest_workdir(&root)? {
                Some(dir) => {
                    info!(workdir = %dir.display(), step = checkpoint.current(), "resuming into working directory");
                    dir
                }
                None => {
                    error!(
                        step = checkpoint.current(),
                        "checkpoint is set but no working directory exists; starting fresh"
                    );
                    checkpoint.reset();
                    create_workdir(&root)?
                }
            }
        };

        let plan = Self { workdir, checkpoint };
        fs::create_dir_all(plan.audio_dir())?;
        fs::create_dir_all(plan.transcript_dir())?;
        Ok(plan)
    }

    /// Where extracted audio files are written.
    #[must_use]
    pub fn audio_dir(&self) -> PathBuf {
        self.workdir.join(AUDIO_SUBDIR)
    }

    /// Where transcript text files are written.
    #[must_use]
    pub fn transcript_dir(&self) -> PathBuf {
        self.workdir.join(TRANSCRIPT_SUBDIR)
    }
}

fn create_workdir(root: &Path) -> io::Result<PathBuf> {
    let name = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let dir = root.join(name);
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// The lexicographically greatest entry is the most recently created one,
/// by construction of the directory names.
fn latest_workdir(root: &Path) -> io::Result<Option<PathBuf>> {
    let mut latest: Option<PathBuf> = None;
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let path = entry.path();
        if latest.as_ref().map_or(true, |cur| cur.file_name() < path.file_name()) {
            latest = Some(path);
        }
    }
    Ok(latest)
}
