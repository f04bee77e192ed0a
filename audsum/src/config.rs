//! Run configuration and external service credentials.

use crate::errors::{PipelineError, PipelineResult};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Everything the driver needs to know about one run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory scanned for media files.
    pub input_dir: PathBuf,
    /// Where summaries, the checkpoint, and the intermediates root live.
    pub output_dir: PathBuf,
    /// Worker-pool bound per stage.
    pub concurrency: usize,
    /// Treat every input as audio: extraction becomes a pass-through.
    pub audio_only: bool,
    /// Bypass checkpoint resume and start over.
    pub fresh: bool,
    /// ffmpeg executable (name or path).
    pub ffmpeg_path: PathBuf,
    /// ffprobe executable (name or path).
    pub ffprobe_path: PathBuf,
    /// Credentials for the remote stages; absent means the run ends early
    /// after extraction, with a warning.
    pub credentials: Option<ServiceCredentials>,
}

impl PipelineConfig {
    /// Creates a configuration with defaults: one worker, full pipeline.
    #[must_use]
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            concurrency: 1,
            audio_only: false,
            fresh: false,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            credentials: None,
        }
    }

    /// Sets the worker-pool bound.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Enables audio-only mode.
    #[must_use]
    pub fn audio_only(mut self, enabled: bool) -> Self {
        self.audio_only = enabled;
        self
    }

    /// Forces a fresh start, bypassing any checkpoint.
    #[must_use]
    pub fn fresh(mut self, enabled: bool) -> Self {
        self.fresh = enabled;
        self
    }

    /// Overrides the ffmpeg/ffprobe executables.
    #[must_use]
    pub fn with_ffmpeg(mut self, ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        self.ffmpeg_path = ffmpeg.into();
        self.ffprobe_path = ffprobe.into();
        self
    }

    /// Attaches service credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Option<ServiceCredentials>) -> Self {
        self.credentials = credentials;
        self
    }
}

/// Keys and endpoints for the upload, transcription, and summary services.
///
/// Loaded from a JSON file with kebab-case keys, e.g.:
///
/// ```json
/// {
///   "bucket-name": "my-audio",
///   "bucket-endpoint": "https://storage.example.com",
///   "bucket-access-key-id": "AK...",
///   "bucket-access-key-secret": "...",
///   "transcribe-api-url": "https://api.example.com/v1",
///   "transcribe-api-key": "sk-...",
///   "summary-api-url": "https://api.example.com/v1",
///   "summary-api-key": "sk-..."
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServiceCredentials {
    /// Object storage bucket name.
    pub bucket_name: String,
    /// Object storage endpoint URL.
    pub bucket_endpoint: String,
    /// Object storage access key id.
    pub bucket_access_key_id: String,
    /// Object storage access key secret.
    pub bucket_access_key_secret: String,
    /// Base URL of the transcription API.
    pub transcribe_api_url: String,
    /// API key for the transcription service.
    pub transcribe_api_key: String,
    /// Base URL of the summarization API.
    pub summary_api_url: String,
    /// API key for the summarization service.
    pub summary_api_key: String,
}

impl ServiceCredentials {
    /// Loads credentials from a JSON file.
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let text = fs::read_to_string(path).map_err(|err| {
            PipelineError::Config(format!("cannot read {}: {err}", path.display()))
        })?;
        serde_json::from_str(&text).map_err(|err| {
            PipelineError::Config(format!("cannot parse {}: {err}", path.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_defaults() {
        let config = PipelineConfig::new("/in", "/out");
        assert_eq!(config.concurrency, 1);
        assert!(!config.audio_only);
        assert!(!config.fresh);
        assert!(config.credentials.is_none());
    }

    #[test]
    fn test_concurrency_is_clamped() {
        let config = PipelineConfig::new("/in", "/out").with_concurrency(0);
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn test_credentials_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "bucket-name": "my-audio",
                "bucket-endpoint": "https://storage.example.com",
                "bucket-access-key-id": "AKID",
                "bucket-access-key-secret": "SECRET",
                "transcribe-api-url": "https://api.example.com/v1",
                "transcribe-api-key": "tk",
                "summary-api-url": "https://api.example.com/v1",
                "summary-api-key": "sk"
            }"#,
        )
        .unwrap();

        let creds = ServiceCredentials::load(&path).unwrap();
        assert_eq!(creds.bucket_name, "my-audio");
        assert_eq!(creds.summary_api_key, "sk");
    }

    #[test]
    fn test_credentials_load_reports_missing_file() {
        let err = ServiceCredentials::load(Path::new("/no/such/config.json")).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_credentials_load_reports_bad_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();

        let err = ServiceCredentials::load(&path).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
