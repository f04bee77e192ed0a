//! Recursive media discovery.

use crate::driver::MediaScanner;
use crate::errors::{PipelineError, PipelineResult};
use crate::manifest::DiscoveredMedia;
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File extensions treated as media input (audio and video).
pub const MEDIA_EXTENSIONS: &[&str] = &[
    // audio
    "mp3", "wav", "flac", "aac", "ogg", "m4a", "wma", "opus",
    // video
    "mp4", "avi", "mkv", "mov", "wmv", "flv", "webm", "m4v", "mpg", "mpeg",
];

// System and tooling directories there is no point descending into.
const SKIP_DIR_NAMES: &[&str] = &[
    "$recycle.bin",
    "recycle.bin",
    "system volume information",
    "temp",
    "tmp",
    "cache",
    "logs",
    "log",
    "backup",
    "backups",
    "node_modules",
    "venv",
    "env",
    "virtualenv",
    "__pycache__",
];

/// Walks a directory tree for media files.
///
/// Entries are visited in name order within each directory, so discovery
/// ordinals are stable across runs on an unchanged tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSystemScanner;

impl FileSystemScanner {
    fn is_media_file(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .is_some_and(|ext| MEDIA_EXTENSIONS.contains(&ext.as_str()))
    }

    fn should_skip_dir(path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return true;
        };
        if name.starts_with('.') {
            debug!(dir = %path.display(), "skipping hidden directory");
            return true;
        }
        if SKIP_DIR_NAMES.contains(&name.to_ascii_lowercase().as_str()) {
            debug!(dir = %path.display(), "skipping system directory");
            return true;
        }
        false
    }

    fn walk(dir: &Path, found: &mut Vec<PathBuf>) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(dir = %dir.display(), %err, "cannot read directory; skipping");
                return;
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry.path()),
                Err(err) => {
                    warn!(dir = %dir.display(), %err, "unreadable directory entry");
                    None
                }
            })
            .collect();
        paths.sort();

        for path in paths {
            if path.is_dir() {
                if !Self::should_skip_dir(&path) {
                    Self::walk(&path, found);
                }
            } else if Self::is_media_file(&path) {
                found.push(path);
            }
        }
    }
}

#[async_trait]
impl MediaScanner for FileSystemScanner {
    async fn scan(&self, input_dir: &Path) -> PipelineResult<Vec<DiscoveredMedia>> {
        let dir = input_dir.to_path_buf();
        let paths = tokio::task::spawn_blocking(move || {
            let mut found = Vec::new();
            Self::walk(&dir, &mut found);
            found
        })
        .await
        .map_err(|err| PipelineError::Internal(format!("discovery task failed: {err}")))?;

        Ok(paths
            .into_iter()
            .enumerate()
            .map(|(index, path)| DiscoveredMedia {
                ordinal: index + 1,
                path,
            })
            .collect())
    }
}
