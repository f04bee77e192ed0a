//! The persisted completed-step counter.
//!
//! The checkpoint is a single non-negative integer in a text file under the
//! run's output root, holding the index of the last fully-completed stage.
//! It is only advanced after a stage's aggregate result was acceptable, so
//! on resume every stage at or below the checkpoint can be skipped outright.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{error, warn};

/// File name of the checkpoint under the output root.
pub const CHECKPOINT_FILE: &str = "checkpoint";

/// Owns the checkpoint file for one output root.
///
/// The in-memory value is authoritative: a failed persist is logged and the
/// run continues, at worst redoing idempotent work on the next invocation.
#[derive(Debug)]
pub struct CheckpointManager {
    path: PathBuf,
    current: u32,
}

impl CheckpointManager {
    /// Opens the checkpoint under `output_root`, reading any persisted value.
    ///
    /// A missing file reads as 0 (fresh run). Unparsable contents also read
    /// as 0, with a warning: corruption is recovered by starting over, which
    /// is safe because every stage is independently idempotent.
    #[must_use]
    pub fn open(output_root: &Path) -> Self {
        let path = output_root.join(CHECKPOINT_FILE);
        let current = Self::read_path(&path);
        Self { path, current }
    }

    fn read_path(path: &Path) -> u32 {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return 0,
            Err(err) => {
                warn!(path = %path.display(), %err, "checkpoint unreadable; treating run as fresh");
                return 0;
            }
        };

        match text.trim().parse::<u32>() {
            Ok(step) => step,
            Err(_) => {
                warn!(
                    path = %path.display(),
                    content = text.trim(),
                    "checkpoint contents are not a non-negative integer; treating run as fresh"
                );
                0
            }
        }
    }

    /// The current step value.
    #[must_use]
    pub const fn current(&self) -> u32 {
        self.current
    }

    /// Overwrites the checkpoint with `step` and persists it.
    pub fn write(&mut self, step: u32) {
        self.current = step;
        self.persist();
    }

    /// Resets the checkpoint to 0 and persists.
    pub fn reset(&mut self) {
        self.write(0);
    }

    /// Increments the step by one, persists, and returns the new value.
    ///
    /// Called exactly once per stage, after that stage's result was deemed
    /// acceptable.
    pub fn advance(&mut self) -> u32 {
        self.current += 1;
        self.persist();
        self.current
    }

    fn persist(&self) {
        if let Err(err) = self.try_persist() {
            error!(
                path = %self.path.display(),
                step = self.current,
                %err,
                "failed to persist checkpoint; in-memory value remains authoritative"
            );
        }
    }

    // Write-to-temp-then-rename so a crash mid-write never leaves a torn
    // file that parses as a wrong value.
    fn try_persist(&self) -> io::Result<()> {
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, format!("{}\n", self.current))?;
        fs::rename(&tmp, &self.path)
    }
}
