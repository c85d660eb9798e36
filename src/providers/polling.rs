use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;

use super::{
    failure_for_status, normalize_content, parse_transcript_body, ProviderKind, TranscriptFailure,
    TranscriptOutcome, TranscriptProvider,
};
use crate::metadata::VideoRecord;

const DEFAULT_BASE_URL: &str = "https://api.supadata.ai/v1";

/// Fixed wait between job-status polls
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Attempt budget for the poll loop (~60 seconds at the fixed interval)
const MAX_POLL_ATTEMPTS: u32 = 30;

/// Asynchronous transcript provider: the initial GET either returns content
/// immediately or HTTP 202 with a job ID that must be polled to completion.
pub struct PollingProvider {
    client: Client,
    api_key: String,
    base_url: String,
    poll_interval: Duration,
    max_attempts: u32,
}

impl PollingProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_settings(api_key, DEFAULT_BASE_URL, POLL_INTERVAL, MAX_POLL_ATTEMPTS)
    }

    /// Construct with explicit endpoint and poll budget
    pub fn with_settings(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        poll_interval: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
            poll_interval,
            max_attempts,
        }
    }

    async fn poll_job(&self, job_id: &str) -> TranscriptOutcome {
        for attempt in 1..=self.max_attempts {
            sleep(self.poll_interval).await;

            let url = format!("{}/transcript/{}", self.base_url, job_id);
            let response = match self
                .client
                .get(&url)
                .header("x-api-key", &self.api_key)
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    return TranscriptOutcome::Failed(TranscriptFailure::transport(e.to_string()))
                }
            };

            let status = response.status();
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    return TranscriptOutcome::Failed(TranscriptFailure::transport(e.to_string()))
                }
            };

            match classify_poll_body(status, &body) {
                PollStep::Completed(text) => return TranscriptOutcome::Text(text),
                PollStep::Failed(failure) => return TranscriptOutcome::Failed(failure),
                PollStep::Pending => {
                    tracing::debug!("Job {} still pending (poll {}/{})", job_id, attempt, self.max_attempts);
                }
            }
        }

        TranscriptOutcome::Failed(TranscriptFailure::generic(format!(
            "Transcript job timed out after {} polls (~{}s)",
            self.max_attempts,
            self.max_attempts as u64 * self.poll_interval.as_secs()
        )))
    }
}

#[async_trait]
impl TranscriptProvider for PollingProvider {
    async fn fetch(&self, video_id: &str) -> TranscriptOutcome {
        let url = format!(
            "{}/youtube/transcript?url={}&text=true",
            self.base_url,
            urlencoding::encode(&VideoRecord::watch_url(video_id))
        );

        tracing::debug!("Fetching transcript for {} (polling)", video_id);

        let response = match self
            .client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return TranscriptOutcome::Failed(TranscriptFailure::transport(e.to_string())),
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return TranscriptOutcome::Failed(TranscriptFailure::transport(e.to_string())),
        };

        if status == StatusCode::ACCEPTED {
            let Some(job_id) = job_id_from_body(&body) else {
                return TranscriptOutcome::Failed(TranscriptFailure::generic(
                    "202 Accepted without a job ID",
                ));
            };
            tracing::debug!("Transcript job submitted: {}", job_id);
            return self.poll_job(&job_id).await;
        }

        if !status.is_success() {
            return TranscriptOutcome::Failed(failure_for_status(status, &body));
        }

        parse_transcript_body(&body)
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Polling
    }
}

fn job_id_from_body(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("jobId")
        .or_else(|| value.get("job_id"))
        .and_then(|id| id.as_str())
        .map(|id| id.to_string())
}

/// One step of the poll state machine
#[derive(Debug, PartialEq)]
pub(crate) enum PollStep {
    Completed(String),
    Failed(TranscriptFailure),
    Pending,
}

/// Classify one job-status response. `completed` resolves with normalized
/// content, `failed` carries the job's reported error, and any other status
/// (queued, active, ...) keeps the loop polling.
pub(crate) fn classify_poll_body(status: StatusCode, body: &str) -> PollStep {
    if !status.is_success() {
        return PollStep::Failed(failure_for_status(status, body));
    }

    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => {
            return PollStep::Failed(TranscriptFailure::generic(format!(
                "Malformed job status response: {}",
                body.chars().take(100).collect::<String>()
            )))
        }
    };

    match value.get("status").and_then(|s| s.as_str()) {
        Some("completed") => match value.get("content") {
            Some(content) => PollStep::Completed(normalize_content(content)),
            None => PollStep::Failed(TranscriptFailure::generic(
                "Job completed without transcript content",
            )),
        },
        Some("failed") => {
            let message = value
                .get("error")
                .and_then(|e| e.as_str())
                .unwrap_or("job failed without a reported cause");
            PollStep::Failed(TranscriptFailure::remote_api(message))
        }
        _ => PollStep::Pending,
    }
}
