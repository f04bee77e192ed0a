//! Transcript summarization through a chat-completion API.

use crate::config::ServiceCredentials;
use crate::executor::ItemWorker;
use crate::manifest::{ordinal_stem, Summary, Transcript};
use crate::outcome::Outcome;
use crate::retry::RetryConfig;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Instruction prepended to every summarization request.
///
/// The transcript format is one sentence per line, `speaker: text`, produced
/// by machine recognition — the model is told to read past recognition noise.
pub const SYSTEM_PROMPT: &str = "Summarize the main content of the following \
transcript. Each line is one sentence; the speaker id comes before the colon, \
the spoken content after it. Write the summary in Markdown, make each \
speaker's point clear, expand on the important passages, and keep it under \
6000 words. If a speaker's identity can be inferred, you may refer to them by \
it and note the mapping to speaker ids at the end. The text was machine-\
recognized from audio: ignore filler words, and where recognition errors are \
likely, infer the intended meaning from context.";

const SUMMARY_MODEL: &str = "deepseek-chat";
const SUMMARY_TEMPERATURE: f64 = 0.3;

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// Summarizes transcripts into `NNN_summary.md` files under the output root.
///
/// A summary already on disk with non-trivial content is reused; API calls
/// are retried with exponential backoff before the item is failed.
#[derive(Debug, Clone)]
pub struct SummaryClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    output_dir: PathBuf,
    retry: RetryConfig,
}

impl SummaryClient {
    /// Creates a client writing summaries into `output_dir`.
    #[must_use]
    pub fn new(credentials: &ServiceCredentials, output_dir: PathBuf) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: credentials.summary_api_url.trim_end_matches('/').to_string(),
            api_key: credentials.summary_api_key.clone(),
            output_dir,
            retry: RetryConfig::default(),
        }
    }

    /// Overrides the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn summary_path(&self, ordinal: usize) -> PathBuf {
        self.output_dir
            .join(format!("{}_summary.md", ordinal_stem(ordinal)))
    }

    async fn request_summary(&self, transcript: &str) -> Result<String, String> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": SUMMARY_MODEL,
                "messages": [
                    {"role": "system", "content": SYSTEM_PROMPT},
                    {"role": "user", "content": transcript},
                ],
                "stream": false,
                "temperature": SUMMARY_TEMPERATURE,
            }))
            .send()
            .await
            .map_err(|err| format!("summary request failed: {err}"))?;

        if !response.status().is_success() {
            return Err(format!("summary rejected with status {}", response.status()));
        }
        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|err| format!("malformed summary response: {err}"))?;
        chat.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| "summary response carries no choices".to_string())
    }

    async fn request_with_retry(&self, transcript: &str) -> Result<String, String> {
        let mut last_error = String::new();
        for attempt in 0..self.retry.max_attempts {
            match self.request_summary(transcript).await {
                Ok(summary) => return Ok(summary),
                Err(reason) => {
                    last_error = reason;
                    if attempt + 1 < self.retry.max_attempts {
                        let delay = self.retry.delay_for(attempt);
                        warn!(attempt = attempt + 1, ?delay, error = %last_error, "summary attempt failed; retrying");
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
        Err(last_error)
    }
}

fn has_nontrivial_content(path: &Path) -> bool {
    std::fs::read_to_string(path)
        .map(|text| !text.trim().is_empty())
        .unwrap_or(false)
}

#[async_trait]
impl ItemWorker<Transcript, Summary> for SummaryClient {
    async fn process(&self, item: Transcript) -> Outcome<Summary> {
        let path = self.summary_path(item.ordinal);
        if has_nontrivial_content(&path) {
            debug!(path = %path.display(), "summary already present; skipping");
            return Outcome::Skipped(Summary {
                ordinal: item.ordinal,
                path,
            });
        }

        let transcript = match tokio::fs::read_to_string(&item.path).await {
            Ok(text) => text,
            Err(err) => {
                return Outcome::Failure(format!(
                    "cannot read transcript {}: {err}",
                    item.path.display()
                ))
            }
        };

        let summary = match self.request_with_retry(&transcript).await {
            Ok(summary) => summary,
            Err(reason) => return Outcome::Failure(reason),
        };

        if let Err(err) = tokio::fs::write(&path, &summary).await {
            return Outcome::Failure(format!("cannot write {}: {err}", path.display()));
        }
        Outcome::Success(Summary {
            ordinal: item.ordinal,
            path,
        })
    }
}
