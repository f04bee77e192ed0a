//! Speech-to-text transcription through an async task API.
//!
//! The service works in three steps: create a transcription task for an
//! audio URL, poll the task until it settles, then fetch the result payload
//! and flatten it to one `"{speaker}: {text}"` line per sentence, ordered by
//! begin time.

use crate::config::ServiceCredentials;
use crate::executor::ItemWorker;
use crate::manifest::{ordinal_stem, RemoteAudio, Transcript};
use crate::outcome::Outcome;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_POLLS: usize = 360; // 30 minutes at the default interval

#[derive(Debug, Deserialize)]
struct TaskCreated {
    task_id: String,
}

#[derive(Debug, Deserialize)]
struct TaskStatus {
    status: String,
    #[serde(default)]
    transcription_url: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscriptPayload {
    #[serde(default)]
    transcripts: Vec<TranscriptBlock>,
}

#[derive(Debug, Deserialize)]
struct TranscriptBlock {
    #[serde(default)]
    sentences: Vec<Sentence>,
}

#[derive(Debug, Deserialize)]
struct Sentence {
    #[serde(default)]
    speaker_id: u32,
    #[serde(default)]
    begin_time: u64,
    #[serde(default)]
    text: String,
}

/// Transcribes uploaded audio, writing one `NNN.txt` per item.
///
/// A transcript already on disk with non-trivial content is reused without
/// touching the API.
#[derive(Debug, Clone)]
pub struct TranscriptionClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    output_dir: PathBuf,
}

impl TranscriptionClient {
    /// Creates a client writing transcripts into `output_dir`.
    #[must_use]
    pub fn new(credentials: &ServiceCredentials, output_dir: PathBuf) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: credentials.transcribe_api_url.trim_end_matches('/').to_string(),
            api_key: credentials.transcribe_api_key.clone(),
            output_dir,
        }
    }

    fn transcript_path(&self, ordinal: usize) -> PathBuf {
        self.output_dir.join(format!("{}.txt", ordinal_stem(ordinal)))
    }

    async fn submit(&self, audio_url: &str) -> Result<String, String> {
        let response = self
            .client
            .post(format!("{}/transcriptions", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "file_url": audio_url,
                "diarization": true,
            }))
            .send()
            .await
            .map_err(|err| format!("task submission failed: {err}"))?;

        if !response.status().is_success() {
            return Err(format!("task rejected with status {}", response.status()));
        }
        let created: TaskCreated = response
            .json()
            .await
            .map_err(|err| format!("malformed task response: {err}"))?;
        Ok(created.task_id)
    }

    async fn wait_for_result(&self, task_id: &str) -> Result<String, String> {
        for _ in 0..MAX_POLLS {
            let status: TaskStatus = self
                .client
                .get(format!("{}/transcriptions/{task_id}", self.api_url))
                .bearer_auth(&self.api_key)
                .send()
                .await
                .map_err(|err| format!("task poll failed: {err}"))?
                .json()
                .await
                .map_err(|err| format!("malformed task status: {err}"))?;

            match status.status.as_str() {
                "succeeded" => {
                    return status
                        .transcription_url
                        .ok_or_else(|| "succeeded task carries no result URL".to_string());
                }
                "failed" => {
                    return Err(format!(
                        "transcription failed: {}",
                        status.message.unwrap_or_else(|| "unknown reason".to_string())
                    ));
                }
                other => debug!(task_id, state = other, "transcription pending"),
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        Err("transcription task did not settle in time".to_string())
    }

    async fn fetch_payload(&self, url: &str) -> Result<TranscriptPayload, String> {
        self.client
            .get(url)
            .send()
            .await
            .map_err(|err| format!("result fetch failed: {err}"))?
            .json()
            .await
            .map_err(|err| format!("malformed transcript payload: {err}"))
    }
}

/// Flattens a transcript payload to one line per sentence.
///
/// Sentences are ordered by begin time; empty text is dropped; speaker ids
/// are shifted to start at 1.
fn format_transcript(payload: &TranscriptPayload) -> String {
    let mut sentences: Vec<&Sentence> = payload
        .transcripts
        .iter()
        .flat_map(|block| block.sentences.iter())
        .filter(|s| !s.text.trim().is_empty())
        .collect();
    sentences.sort_by_key(|s| s.begin_time);

    sentences
        .iter()
        .map(|s| format!("{}: {}", s.speaker_id + 1, s.text.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A transcript counts as present when it has any non-whitespace content.
fn has_nontrivial_content(path: &Path) -> bool {
    std::fs::read_to_string(path)
        .map(|text| !text.trim().is_empty())
        .unwrap_or(false)
}

#[async_trait]
impl ItemWorker<RemoteAudio, Transcript> for TranscriptionClient {
    async fn process(&self, item: RemoteAudio) -> Outcome<Transcript> {
        let path = self.transcript_path(item.ordinal);
        if has_nontrivial_content(&path) {
            debug!(path = %path.display(), "transcript already present; skipping");
            return Outcome::Skipped(Transcript {
                ordinal: item.ordinal,
                path,
            });
        }

        let task_id = match self.submit(&item.url).await {
            Ok(task_id) => task_id,
            Err(reason) => return Outcome::Failure(reason),
        };
        let result_url = match self.wait_for_result(&task_id).await {
            Ok(url) => url,
            Err(reason) => return Outcome::Failure(reason),
        };
        let payload = match self.fetch_payload(&result_url).await {
            Ok(payload) => payload,
            Err(reason) => return Outcome::Failure(reason),
        };

        let text = format_transcript(&payload);
        if text.is_empty() {
            return Outcome::Failure("transcription produced no sentences".to_string());
        }
        if let Err(err) = tokio::fs::write(&path, &text).await {
            return Outcome::Failure(format!("cannot write {}: {err}", path.display()));
        }

        Outcome::Success(Transcript {
            ordinal: item.ordinal,
            path,
        })
    }
}
