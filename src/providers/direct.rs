use async_trait::async_trait;
use reqwest::Client;

use super::{
    failure_for_status, parse_transcript_body, ProviderKind, TranscriptFailure, TranscriptOutcome,
    TranscriptProvider,
};

const DEFAULT_BASE_URL: &str = "https://api.scrapecreators.com/v1";

/// Synchronous transcript provider: one GET carrying the video ID, response
/// carries the content (or an error field) directly.
pub struct DirectProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl DirectProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl TranscriptProvider for DirectProvider {
    async fn fetch(&self, video_id: &str) -> TranscriptOutcome {
        // Video IDs are URL-safe, no percent-encoding needed
        let url = format!(
            "{}/youtube/video/transcript?videoId={}",
            self.base_url, video_id
        );

        tracing::debug!("Fetching transcript for {} (direct)", video_id);

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

        if !status.is_success() {
            return TranscriptOutcome::Failed(failure_for_status(status, &body));
        }

        parse_transcript_body(&body)
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Direct
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_sends_video_id_parameter() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/youtube/video/transcript")
            .match_query(mockito::Matcher::UrlEncoded(
                "videoId".into(),
                "dQw4w9WgXcQ".into(),
            ))
            .match_header("x-api-key", "test-key")
            .with_status(200)
            .with_body(r#"{"content": "hello from the mock"}"#)
            .create_async()
            .await;

        let provider = DirectProvider::with_base_url("test-key", server.url());
        let outcome = provider.fetch("dQw4w9WgXcQ").await;

        mock.assert_async().await;
        assert_eq!(
            outcome,
            TranscriptOutcome::Text("hello from the mock".to_string())
        );
    }

    #[tokio::test]
    async fn test_fetch_maps_error_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/youtube/video/transcript")
            .match_query(mockito::Matcher::Any)
            .with_status(404)
            .with_body("")
            .create_async()
            .await;

        let provider = DirectProvider::with_base_url("test-key", server.url());
        let outcome = provider.fetch("dQw4w9WgXcQ").await;

        assert!(!outcome.is_success());
        assert!(outcome.display_text().contains("Not Found"));
    }
}
