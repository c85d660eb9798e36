use chrono::Utc;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::sleep;

use crate::config::Config;
use crate::metadata::{ContentType, VideoRecord, YoutubeClient};
use crate::providers::TranscriptRouter;
use crate::usage::UsageLedger;
use crate::{rank, resolve, Result, ViralscopeError};

pub mod run;

pub use run::{RunHandle, RunState, CANCELLED};

/// Resolve raw input strings to a de-duplicated list of video IDs.
/// Unresolvable inputs are silently dropped; first-seen order is kept.
pub fn resolve_inputs(raw_inputs: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    raw_inputs
        .iter()
        .filter_map(|input| resolve::extract_video_id(input))
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Orchestrates the metadata and transcript phases of a batch run.
///
/// The transcript phase is strictly sequential with a fixed delay before
/// each fetch, respecting provider rate limits. Cancellation is cooperative
/// and checked twice per item: before dispatch and after the fetch returns.
pub struct Pipeline {
    config: Config,
    youtube: YoutubeClient,
    router: TranscriptRouter,
    ledger: UsageLedger,
    item_delay: Duration,
    persist_usage: bool,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        let provider = config.app.default_provider;
        Self::with_provider(config, provider)
    }

    pub fn with_provider(config: Config, provider: crate::providers::ProviderKind) -> Self {
        let youtube = YoutubeClient::new(config.api.youtube_api_key.clone());
        let router = TranscriptRouter::new(provider, config.provider_key(provider));
        let ledger = UsageLedger::from_config(&config);
        let item_delay = Duration::from_millis(config.app.item_delay_ms);
        Self {
            config,
            youtube,
            router,
            ledger,
            item_delay,
            persist_usage: true,
        }
    }

    /// Build a pipeline around an injected transcript router. Callers that
    /// inject a router own persistence of the usage counters themselves.
    pub fn with_router(config: Config, router: TranscriptRouter) -> Self {
        let youtube = YoutubeClient::new(config.api.youtube_api_key.clone());
        let ledger = UsageLedger::from_config(&config);
        let item_delay = Duration::from_millis(config.app.item_delay_ms);
        Self {
            config,
            youtube,
            router,
            ledger,
            item_delay,
            persist_usage: false,
        }
    }

    pub fn ledger(&self) -> &UsageLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut UsageLedger {
        &mut self.ledger
    }

    /// Metadata phase for multi-link mode: resolve every raw input, drop
    /// unresolvable ones, de-duplicate, and fetch details for the rest.
    ///
    /// Errors with [`ViralscopeError::NoValidInput`] when nothing resolves;
    /// that aborts the whole run.
    pub async fn fetch_batch_videos(&self, raw_inputs: &[String], run: &RunState) -> Result<Vec<VideoRecord>> {
        let ids = resolve_inputs(raw_inputs);
        if ids.is_empty() {
            return Err(ViralscopeError::NoValidInput.into());
        }

        self.require_youtube_key()?;

        run.log(&format!(
            "Resolved {} unique video ID(s) from {} input(s)",
            ids.len(),
            raw_inputs.len()
        ));

        let records = self.youtube.get_video_details(&ids).await?;
        run.log(&format!("Fetched metadata for {} video(s)", records.len()));
        run.publish(records.clone());

        Ok(records)
    }

    /// Metadata phase for channel mode
    pub async fn fetch_channel_videos(
        &self,
        channel_input: &str,
        limit: usize,
        content_type: ContentType,
        run: &RunState,
    ) -> Result<Vec<VideoRecord>> {
        self.require_youtube_key()?;

        let records = self
            .youtube
            .fetch_channel_videos(channel_input, limit, content_type, |phase| run.log(phase))
            .await?;

        run.log(&format!("Discovered {} video(s)", records.len()));
        run.publish(records.clone());

        Ok(records)
    }

    /// Analysis mode: metadata phase plus the virality ranking transform
    pub async fn analyze_batch(&self, raw_inputs: &[String], run: &RunState) -> Result<Vec<VideoRecord>> {
        let mut records = self.fetch_batch_videos(raw_inputs, run).await?;
        rank::apply_virality_ranking(&mut records, Utc::now());
        run.log("Computed virality scores");
        run.publish(records.clone());
        Ok(records)
    }

    /// Analysis mode over a channel's videos
    pub async fn analyze_channel(
        &self,
        channel_input: &str,
        limit: usize,
        content_type: ContentType,
        run: &RunState,
    ) -> Result<Vec<VideoRecord>> {
        let mut records = self
            .fetch_channel_videos(channel_input, limit, content_type, run)
            .await?;
        rank::apply_virality_ranking(&mut records, Utc::now());
        run.log("Computed virality scores");
        run.publish(records.clone());
        Ok(records)
    }

    /// Transcript phase: set every published record's transcript, one item
    /// at a time, publishing after each item.
    ///
    /// Progress advances from `base_offset` to `base_offset + span` as items
    /// complete. Per-item failures are recovered locally into the record;
    /// only a missing credential or an exhausted ledger aborts up front.
    pub async fn run_transcript_phase(&mut self, run: &RunHandle, base_offset: u8, span: u8) -> Result<()> {
        let kind = self.router.kind();

        if !self.router.has_credential() {
            return Err(ViralscopeError::Auth(format!(
                "no API key configured for the {kind} provider"
            ))
            .into());
        }
        if self.ledger.is_exhausted(kind) {
            return Err(ViralscopeError::QuotaExceeded {
                provider: kind.to_string(),
                count: self.ledger.count(kind),
                ceiling: kind.ceiling(),
            }
            .into());
        }
        if !run.begin() {
            return Err(ViralscopeError::InvalidInput(
                "a batch run is already in progress".to_string(),
            )
            .into());
        }

        let ids: Vec<String> = run.records().iter().map(|r| r.id.clone()).collect();
        let total = ids.len();
        run.log(&format!(
            "Fetching transcripts for {total} video(s) via the {kind} provider"
        ));

        for (index, id) in ids.iter().enumerate() {
            if run.is_cancelled(id) {
                run.set_transcript(index, CANCELLED.to_string());
                run.log(&format!("{id}: cancelled, skipping fetch"));
                advance(run, base_offset, span, index + 1, total);
                continue;
            }

            sleep(self.item_delay).await;

            let outcome = self.router.fetch_transcript(id).await;

            if run.is_cancelled(id) {
                // The fetch raced a cancellation; discard its result
                run.set_transcript(index, CANCELLED.to_string());
                run.log(&format!("{id}: cancelled while fetch was in flight"));
                advance(run, base_offset, span, index + 1, total);
                continue;
            }

            if outcome.is_success() {
                let count = self.ledger.increment(kind);
                self.persist_usage().await;
                run.log(&format!(
                    "{id}: transcript fetched ({kind} usage {count}/{})",
                    kind.ceiling()
                ));
            } else {
                run.log(&format!("{id}: {}", outcome.display_text()));
            }

            run.set_transcript(index, outcome.display_text());
            advance(run, base_offset, span, index + 1, total);
        }

        run.finish();
        run.log("Transcript phase complete");
        Ok(())
    }

    /// Re-fetch the transcript for one record, outside any batch run.
    ///
    /// Refused while a run is in progress. Replaces only that record; the
    /// original run's progress and log are untouched.
    pub async fn retry_transcript(&mut self, run: &RunHandle, video_id: &str) -> Result<VideoRecord> {
        if run.is_running() {
            return Err(ViralscopeError::InvalidInput(
                "cannot retry while a batch run is in progress".to_string(),
            )
            .into());
        }

        let index = run
            .records()
            .iter()
            .position(|r| r.id == video_id)
            .ok_or_else(|| ViralscopeError::NotFound(format!("no record for video {video_id}")))?;

        let kind = self.router.kind();
        if self.ledger.is_exhausted(kind) {
            return Err(ViralscopeError::QuotaExceeded {
                provider: kind.to_string(),
                count: self.ledger.count(kind),
                ceiling: kind.ceiling(),
            }
            .into());
        }

        tracing::info!("Retrying transcript for {}", video_id);
        let outcome = self.router.fetch_transcript(video_id).await;

        if outcome.is_success() {
            self.ledger.increment(kind);
            self.persist_usage().await;
        }

        run.set_transcript(index, outcome.display_text());
        Ok(run.records()[index].clone())
    }

    fn require_youtube_key(&self) -> Result<()> {
        if self.config.youtube_key().is_none() {
            return Err(ViralscopeError::Auth(
                "no YouTube API key configured".to_string(),
            )
            .into());
        }
        Ok(())
    }

    async fn persist_usage(&mut self) {
        self.ledger.write_back(&mut self.config);
        if !self.persist_usage {
            return;
        }
        if let Err(e) = self.config.save().await {
            tracing::warn!("Failed to persist usage counters: {e:#}");
        }
    }
}

/// Progress for the transcript phase: `floor(base + done/total * span)`
fn advance(run: &RunState, base_offset: u8, span: u8, done: usize, total: usize) {
    if total == 0 {
        return;
    }
    let portion = (done as f64 / total as f64) * span as f64;
    run.set_progress(base_offset.saturating_add(portion.floor() as u8));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{
        MockTranscriptProvider, ProviderKind, TranscriptFailure, TranscriptOutcome,
    };

    fn record(id: &str) -> VideoRecord {
        VideoRecord {
            id: id.to_string(),
            url: VideoRecord::watch_url(id),
            title: format!("video {id}"),
            channel_title: "channel".to_string(),
            channel_id: "UCuAXFkgsw1L7xaCfnd5JJOw".to_string(),
            thumbnail_url: String::new(),
            tags: Vec::new(),
            description: String::new(),
            view_count: "100".to_string(),
            like_count: "10".to_string(),
            comment_count: "1".to_string(),
            published_at: "2024-01-01T00:00:00Z".to_string(),
            duration: "PT2M".to_string(),
            virality_score: None,
            engagement_rate: None,
            rank: None,
            transcript: None,
        }
    }

    fn fast_config() -> Config {
        let mut config = Config::default();
        config.app.item_delay_ms = 0;
        config
    }

    fn pipeline_with_mock(mock: MockTranscriptProvider) -> Pipeline {
        Pipeline::with_router(fast_config(), TranscriptRouter::with_provider(Box::new(mock)))
    }

    #[test]
    fn test_resolve_inputs_dedupes() {
        let inputs = vec![
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
            "https://youtu.be/dQw4w9WgXcQ".to_string(),
            "dQw4w9WgXcQ".to_string(),
        ];
        assert_eq!(resolve_inputs(&inputs), vec!["dQw4w9WgXcQ".to_string()]);
    }

    #[test]
    fn test_resolve_inputs_drops_garbage() {
        let inputs = vec![
            "nonsense".to_string(),
            "https://youtu.be/aaaaaaaaaaa".to_string(),
            "https://example.com/".to_string(),
        ];
        assert_eq!(resolve_inputs(&inputs), vec!["aaaaaaaaaaa".to_string()]);
    }

    #[tokio::test]
    async fn test_batch_with_no_valid_inputs_errors() {
        let mut mock = MockTranscriptProvider::new();
        mock.expect_kind().return_const(ProviderKind::Direct);
        let pipeline = pipeline_with_mock(mock);
        let run = RunState::new();

        let inputs = vec!["nope".to_string(), "also nope".to_string()];
        let err = pipeline.fetch_batch_videos(&inputs, &run).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ViralscopeError>(),
            Some(ViralscopeError::NoValidInput)
        ));
    }

    #[tokio::test]
    async fn test_batch_without_youtube_key_is_auth_error() {
        let mut mock = MockTranscriptProvider::new();
        mock.expect_kind().return_const(ProviderKind::Direct);
        let pipeline = pipeline_with_mock(mock);
        let run = RunState::new();

        // Valid input, but no YouTube credential configured: fails before
        // any request is issued
        let inputs = vec!["https://youtu.be/dQw4w9WgXcQ".to_string()];
        let err = pipeline.fetch_batch_videos(&inputs, &run).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ViralscopeError>(),
            Some(ViralscopeError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn test_cancelled_item_skips_fetch() {
        let mut mock = MockTranscriptProvider::new();
        mock.expect_kind().return_const(ProviderKind::Direct);
        // Only the non-cancelled item may be fetched
        mock.expect_fetch()
            .withf(|id| id == "bbbbbbbbbbb")
            .times(1)
            .returning(|_| TranscriptOutcome::Text("some words".to_string()));

        let mut pipeline = pipeline_with_mock(mock);
        let run = RunState::new();
        run.publish(vec![record("aaaaaaaaaaa"), record("bbbbbbbbbbb")]);
        run.cancel("aaaaaaaaaaa");

        pipeline.run_transcript_phase(&run, 30, 70).await.unwrap();

        let records = run.records();
        assert_eq!(records[0].transcript.as_deref(), Some(CANCELLED));
        assert_eq!(records[1].transcript.as_deref(), Some("some words"));
        assert_eq!(run.progress(), 100);
        assert!(!run.is_running());
    }

    #[tokio::test]
    async fn test_mixed_success_and_failure_counts_usage_once() {
        let mut mock = MockTranscriptProvider::new();
        mock.expect_kind().return_const(ProviderKind::Direct);
        mock.expect_fetch()
            .withf(|id| id == "aaaaaaaaaaa")
            .returning(|_| TranscriptOutcome::Text("transcript text".to_string()));
        mock.expect_fetch()
            .withf(|id| id == "bbbbbbbbbbb")
            .returning(|_| {
                TranscriptOutcome::Failed(TranscriptFailure::generic(
                    "403 Forbidden - access to this video's transcript was denied",
                ))
            });

        let mut pipeline = pipeline_with_mock(mock);
        let run = RunState::new();
        run.publish(vec![record("aaaaaaaaaaa"), record("bbbbbbbbbbb")]);

        pipeline.run_transcript_phase(&run, 30, 70).await.unwrap();

        let records = run.records();
        assert_eq!(records[0].transcript.as_deref(), Some("transcript text"));
        let failed = records[1].transcript.as_deref().unwrap();
        assert!(failed.starts_with("Error:"));
        assert!(failed.contains("Forbidden"));

        // Only the success incremented the ledger
        assert_eq!(pipeline.ledger().count(ProviderKind::Direct), 1);
    }

    #[tokio::test]
    async fn test_exhausted_ledger_refuses_to_start() {
        let mut mock = MockTranscriptProvider::new();
        mock.expect_kind().return_const(ProviderKind::Direct);

        let mut pipeline = pipeline_with_mock(mock);
        pipeline.ledger_mut().override_count(ProviderKind::Direct, 20);

        let run = RunState::new();
        run.publish(vec![record("aaaaaaaaaaa")]);

        let err = pipeline.run_transcript_phase(&run, 30, 70).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ViralscopeError>(),
            Some(ViralscopeError::QuotaExceeded { .. })
        ));
        assert!(!run.is_running());
    }

    #[tokio::test]
    async fn test_retry_refused_while_running() {
        let mut mock = MockTranscriptProvider::new();
        mock.expect_kind().return_const(ProviderKind::Direct);

        let mut pipeline = pipeline_with_mock(mock);
        let run = RunState::new();
        run.publish(vec![record("aaaaaaaaaaa")]);
        assert!(run.begin());

        let err = pipeline
            .retry_transcript(&run, "aaaaaaaaaaa")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ViralscopeError>(),
            Some(ViralscopeError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_retry_replaces_single_record() {
        let mut mock = MockTranscriptProvider::new();
        mock.expect_kind().return_const(ProviderKind::Direct);
        mock.expect_fetch()
            .withf(|id| id == "aaaaaaaaaaa")
            .times(1)
            .returning(|_| TranscriptOutcome::Text("second attempt".to_string()));

        let mut pipeline = pipeline_with_mock(mock);
        let run = RunState::new();
        let mut first = record("aaaaaaaaaaa");
        first.transcript = Some("Error: 500 Internal Server Error".to_string());
        run.publish(vec![first, record("bbbbbbbbbbb")]);
        run.set_progress(100);

        let updated = pipeline.retry_transcript(&run, "aaaaaaaaaaa").await.unwrap();
        assert_eq!(updated.transcript.as_deref(), Some("second attempt"));
        assert_eq!(pipeline.ledger().count(ProviderKind::Direct), 1);

        // Untouched sibling and original progress
        assert!(run.records()[1].transcript.is_none());
        assert_eq!(run.progress(), 100);
    }

    #[tokio::test]
    async fn test_retry_unknown_id_is_not_found() {
        let mut mock = MockTranscriptProvider::new();
        mock.expect_kind().return_const(ProviderKind::Direct);

        let mut pipeline = pipeline_with_mock(mock);
        let run = RunState::new();
        run.publish(vec![record("aaaaaaaaaaa")]);

        let err = pipeline
            .retry_transcript(&run, "zzzzzzzzzzz")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ViralscopeError>(),
            Some(ViralscopeError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_credential_aborts_phase() {
        let config = fast_config();
        // No keys configured at all
        let mut pipeline = Pipeline::with_provider(config, ProviderKind::Polling);
        let run = RunState::new();
        run.publish(vec![record("aaaaaaaaaaa")]);

        let err = pipeline.run_transcript_phase(&run, 0, 100).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ViralscopeError>(),
            Some(ViralscopeError::Auth(_))
        ));
    }

    #[test]
    fn test_advance_floor_math() {
        let run = RunState::new();
        advance(&run, 30, 70, 1, 3);
        assert_eq!(run.progress(), 53); // 30 + floor(70/3)
        advance(&run, 30, 70, 3, 3);
        assert_eq!(run.progress(), 100);
    }
}
