//! Audio extraction via ffmpeg.

use crate::executor::ItemWorker;
use crate::manifest::{ordinal_stem, AudioTrack, DiscoveredMedia};
use crate::outcome::Outcome;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Extensions that are already audio and need no extraction.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "aac", "flac", "ogg", "opus"];

const EXTRACT_TIMEOUT: Duration = Duration::from_secs(300);

// A prior output counts as valid when its duration is within this many
// seconds of the source's.
const DURATION_TOLERANCE_SECS: f64 = 5.0;

/// Extracts each video's audio track to `NNN.mp3` in the run's audio
/// directory.
///
/// Inputs that are already audio pass through as skips carrying the source
/// path. A prior output whose duration matches the source is reused; a
/// mismatched one is deleted and re-extracted.
#[derive(Debug, Clone)]
pub struct FfmpegExtractor {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    output_dir: PathBuf,
}

impl FfmpegExtractor {
    /// Creates an extractor writing into `output_dir`.
    #[must_use]
    pub fn new(ffmpeg: &Path, ffprobe: &Path, output_dir: PathBuf) -> Self {
        Self {
            ffmpeg: ffmpeg.to_path_buf(),
            ffprobe: ffprobe.to_path_buf(),
            output_dir,
        }
    }

    /// True when the path's extension marks it as audio.
    #[must_use]
    pub fn is_audio(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.as_str()))
    }

    fn target_for(&self, ordinal: usize) -> PathBuf {
        self.output_dir.join(format!("{}.mp3", ordinal_stem(ordinal)))
    }

    /// Media duration in seconds via ffprobe, or `None` when it cannot be
    /// determined.
    async fn probe_duration(&self, path: &Path) -> Option<f64> {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .output()
            .await
            .ok()?;

        if !output.status.success() {
            return None;
        }
        String::from_utf8_lossy(&output.stdout).trim().parse().ok()
    }

    async fn durations_match(&self, source: &Path, audio: &Path) -> bool {
        let (Some(source_secs), Some(audio_secs)) = (
            self.probe_duration(source).await,
            self.probe_duration(audio).await,
        ) else {
            return false;
        };
        (source_secs - audio_secs).abs() <= DURATION_TOLERANCE_SECS
    }

    async fn extract(&self, source: &Path, target: &Path) -> Result<(), String> {
        let result = tokio::time::timeout(
            EXTRACT_TIMEOUT,
            Command::new(&self.ffmpeg)
                .arg("-i")
                .arg(source)
                .args(["-vn", "-acodec", "libmp3lame", "-q:a", "2", "-y"])
                .arg(target)
                .output(),
        )
        .await;

        match result {
            Err(_) => Err(format!(
                "ffmpeg timed out after {}s",
                EXTRACT_TIMEOUT.as_secs()
            )),
            Ok(Err(err)) => Err(format!("failed to launch ffmpeg: {err}")),
            Ok(Ok(output)) if !output.status.success() => {
                Err(format!("ffmpeg exited with {}", output.status))
            }
            Ok(Ok(_)) => Ok(()),
        }
    }
}

#[async_trait]
impl ItemWorker<DiscoveredMedia, AudioTrack> for FfmpegExtractor {
    async fn process(&self, item: DiscoveredMedia) -> Outcome<AudioTrack> {
        // Already audio: pass the source through untouched.
        if Self::is_audio(&item.path) {
            if item.path.exists() {
                return Outcome::Skipped(AudioTrack {
                    ordinal: item.ordinal,
                    path: item.path,
                });
            }
            return Outcome::Failure(format!(
                "source audio no longer exists: {}",
                item.path.display()
            ));
        }

        let target = self.target_for(item.ordinal);
        if target.exists() {
            if self.durations_match(&item.path, &target).await {
                return Outcome::Skipped(AudioTrack {
                    ordinal: item.ordinal,
                    path: target,
                });
            }
            // Stale or truncated output from an interrupted run.
            if let Err(err) = tokio::fs::remove_file(&target).await {
                debug!(target = %target.display(), %err, "could not remove stale output");
            }
        }

        if let Err(reason) = self.extract(&item.path, &target).await {
            return Outcome::Failure(reason);
        }

        if target.exists() && self.durations_match(&item.path, &target).await {
            Outcome::Success(AudioTrack {
                ordinal: item.ordinal,
                path: target,
            })
        } else {
            Outcome::Failure("extracted audio failed duration verification".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_audio() {
        assert!(FfmpegExtractor::is_audio(Path::new("a.mp3")));
        assert!(FfmpegExtractor::is_audio(Path::new("b.FLAC")));
        assert!(!FfmpegExtractor::is_audio(Path::new("c.mp4")));
        assert!(!FfmpegExtractor::is_audio(Path::new("noext")));
    }

    #[test]
    fn test_target_naming_follows_ordinal() {
        let extractor = FfmpegExtractor::new(
            Path::new("ffmpeg"),
            Path::new("ffprobe"),
            PathBuf::from("/work/audios"),
        );
        assert_eq!(extractor.target_for(7), PathBuf::from("/work/audios/007.mp3"));
        assert_eq!(extractor.target_for(120), PathBuf::from("/work/audios/120.mp3"));
    }

    #[tokio::test]
    async fn test_audio_passthrough_requires_existing_source() {
        let extractor = FfmpegExtractor::new(
            Path::new("ffmpeg"),
            Path::new("ffprobe"),
            PathBuf::from("/tmp/nowhere"),
        );
        let item = DiscoveredMedia {
            ordinal: 1,
            path: PathBuf::from("/no/such/file.mp3"),
        };

        let outcome = extractor.process(item).await;
        assert!(outcome.is_failure());
    }

    #[tokio::test]
    async fn test_existing_audio_passes_through_as_skip() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = dir.path().join("talk.mp3");
        std::fs::write(&source, b"fake audio").unwrap();

        let extractor = FfmpegExtractor::new(
            Path::new("ffmpeg"),
            Path::new("ffprobe"),
            dir.path().join("audios"),
        );
        let outcome = extractor
            .process(DiscoveredMedia {
                ordinal: 3,
                path: source.clone(),
            })
            .await;

        match outcome {
            Outcome::Skipped(track) => {
                assert_eq!(track.ordinal, 3);
                assert_eq!(track.path, source);
            }
            other => panic!("expected skip, got {other:?}"),
        }
    }
}
