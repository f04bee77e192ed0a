//! Object-storage upload.

use crate::config::ServiceCredentials;
use crate::executor::ItemWorker;
use crate::manifest::{ordinal_stem, AudioTrack, RemoteAudio};
use crate::outcome::Outcome;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

// Keys are namespaced so the bucket can hold unrelated content.
const OBJECT_PREFIX: &str = "audio_transcription";

/// Uploads audio files to an HTTP object store.
///
/// An object of the expected key already present in the bucket is reused
/// (skip-existing), which makes the stage safe to re-run wholesale even
/// when the checkpoint had not advanced.
#[derive(Debug, Clone)]
pub struct ObjectStoreUploader {
    client: reqwest::Client,
    bucket_url: String,
    access_key_id: String,
    access_key_secret: String,
}

impl ObjectStoreUploader {
    /// Creates an uploader for the configured bucket.
    #[must_use]
    pub fn new(credentials: &ServiceCredentials) -> Self {
        let bucket_url = format!(
            "{}/{}",
            credentials.bucket_endpoint.trim_end_matches('/'),
            credentials.bucket_name
        );
        Self {
            client: reqwest::Client::new(),
            bucket_url,
            access_key_id: credentials.bucket_access_key_id.clone(),
            access_key_secret: credentials.bucket_access_key_secret.clone(),
        }
    }

    /// The object key for a discovery ordinal.
    #[must_use]
    pub fn object_key(ordinal: usize) -> String {
        format!("{OBJECT_PREFIX}/{}.mp3", ordinal_stem(ordinal))
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{key}", self.bucket_url)
    }

    async fn object_exists(&self, url: &str) -> bool {
        self.client
            .head(url)
            .basic_auth(&self.access_key_id, Some(&self.access_key_secret))
            .send()
            .await
            .map(|resp| resp.status().is_success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl ItemWorker<AudioTrack, RemoteAudio> for ObjectStoreUploader {
    async fn process(&self, item: AudioTrack) -> Outcome<RemoteAudio> {
        let key = Self::object_key(item.ordinal);
        let url = self.object_url(&key);

        if self.object_exists(&url).await {
            debug!(%key, "object already present; skipping upload");
            return Outcome::Skipped(RemoteAudio {
                ordinal: item.ordinal,
                key,
                url,
            });
        }

        let body = match tokio::fs::read(&item.path).await {
            Ok(body) => body,
            Err(err) => {
                return Outcome::Failure(format!(
                    "cannot read {}: {err}",
                    item.path.display()
                ))
            }
        };

        let response = self
            .client
            .put(&url)
            .basic_auth(&self.access_key_id, Some(&self.access_key_secret))
            .header(CONTENT_TYPE, "audio/mpeg")
            .body(body)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => Outcome::Success(RemoteAudio {
                ordinal: item.ordinal,
                key,
                url,
            }),
            Ok(resp) => Outcome::Failure(format!("upload rejected with status {}", resp.status())),
            Err(err) => Outcome::Failure(format!("upload failed: {err}")),
        }
    }
}
