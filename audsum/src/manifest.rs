//! Work-item records and the manifest store.
//!
//! A manifest is an ordered JSON list of records, one file per stage
//! boundary, living in the run's working directory. Every record carries the
//! item's 1-based discovery ordinal so output naming (`001`, `002`, ...)
//! stays positional across stages even when items are dropped along the way.

use crate::errors::{PipelineError, PipelineResult};
use crate::stage::Stage;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A media file found by the discovery walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredMedia {
    /// 1-based position in discovery order; stable for the whole run.
    pub ordinal: usize,
    /// Absolute path of the source file.
    pub path: PathBuf,
}

/// An audio file ready for upload (extracted, or the source itself).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioTrack {
    /// Discovery ordinal of the source item.
    pub ordinal: usize,
    /// Path of the audio file on disk.
    pub path: PathBuf,
}

/// An audio object living in remote storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAudio {
    /// Discovery ordinal of the source item.
    pub ordinal: usize,
    /// Object key within the bucket.
    pub key: String,
    /// Fetchable URL handed to the transcription service.
    pub url: String,
}

/// A transcript file produced for one audio object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    /// Discovery ordinal of the source item.
    pub ordinal: usize,
    /// Path of the transcript text file.
    pub path: PathBuf,
}

/// A finished summary file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Discovery ordinal of the source item.
    pub ordinal: usize,
    /// Path of the summary markdown file.
    pub path: PathBuf,
}

/// Reads and writes the per-stage manifests of one working directory.
///
/// Pure data access: ordering and dropped-item policy are the caller's
/// concern. Manifests are immutable once written; re-running a stage
/// overwrites its manifest wholesale.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    dir: PathBuf,
}

impl ManifestStore {
    /// Creates a store rooted at the given working directory.
    #[must_use]
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self { dir: workdir.into() }
    }

    /// The file path of a stage's output manifest.
    #[must_use]
    pub fn path_for(&self, stage: Stage) -> PathBuf {
        self.dir.join(stage.manifest_name())
    }

    /// Loads the ordered record list written at `stage`'s output boundary.
    pub fn load<T: DeserializeOwned>(&self, stage: Stage) -> PipelineResult<Vec<T>> {
        let path = self.path_for(stage);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(PipelineError::MissingManifest { stage, path });
            }
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Writes `records` as `stage`'s output manifest, replacing any prior
    /// content.
    pub fn store<T: Serialize>(&self, stage: Stage, records: &[T]) -> PipelineResult<()> {
        let json = serde_json::to_vec_pretty(records)?;
        fs::write(self.path_for(stage), json)?;
        Ok(())
    }

    /// True if `stage` has a manifest on disk.
    #[must_use]
    pub fn exists(&self, stage: Stage) -> bool {
        self.path_for(stage).exists()
    }
}

/// Formats a discovery ordinal as the zero-padded artifact stem (`7` ->
/// `"007"`), shared by every stage that names files positionally.
#[must_use]
pub fn ordinal_stem(ordinal: usize) -> String {
    format!("{ordinal:03}")
}
