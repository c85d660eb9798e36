use async_trait::async_trait;
use clap::ValueEnum;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod direct;
pub mod polling;

/// Maximum raw-body characters quoted in an error message, to keep HTML
/// error pages out of the logs
const BODY_SNIPPET_LEN: usize = 100;

/// Transcript provider backends
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Synchronous request/response provider
    Direct,
    /// Asynchronous submit-then-poll provider
    #[default]
    Polling,
}

impl ProviderKind {
    /// Usage ceiling for this provider's ledger counter
    pub fn ceiling(self) -> u32 {
        match self {
            ProviderKind::Direct => 20,
            ProviderKind::Polling => 100,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Direct => "direct",
            ProviderKind::Polling => "polling",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which leg of the fetch failed.
///
/// Downstream log coloring and retry eligibility distinguish these, so the
/// classification survives all the way to the display boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The HTTP request itself failed (DNS, connect, read)
    Transport,
    /// The provider reported an error in its response body
    RemoteApi,
    /// Everything else: bad status, missing content, timeout
    Generic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl TranscriptFailure {
    pub fn transport(message: impl Into<String>) -> Self {
        Self { kind: FailureKind::Transport, message: message.into() }
    }

    pub fn remote_api(message: impl Into<String>) -> Self {
        Self { kind: FailureKind::RemoteApi, message: message.into() }
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Self { kind: FailureKind::Generic, message: message.into() }
    }
}

/// Result of one transcript fetch. Providers never return `Err`; every
/// failure is folded into a classified [`TranscriptFailure`].
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptOutcome {
    Text(String),
    Failed(TranscriptFailure),
}

impl TranscriptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TranscriptOutcome::Text(_))
    }

    /// The text stored on the record: the transcript body on success, or a
    /// marker-prefixed cause on failure. The markers are load-bearing for
    /// consumers that classify by prefix.
    pub fn display_text(&self) -> String {
        match self {
            TranscriptOutcome::Text(text) => text.clone(),
            TranscriptOutcome::Failed(failure) => match failure.kind {
                FailureKind::Transport => format!("Request Failed: {}", failure.message),
                FailureKind::RemoteApi => format!("API Error: {}", failure.message),
                FailureKind::Generic => format!("Error: {}", failure.message),
            },
        }
    }
}

/// Check whether a stored transcript string is a failure marker
pub fn is_error_text(text: &str) -> bool {
    text.starts_with("Error:") || text.starts_with("API Error:") || text.starts_with("Request Failed:")
}

/// A transcript backend. Implementations supply the synchronous and
/// submit-then-poll strategies; both fold every failure into the outcome.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriptProvider: Send + Sync {
    /// Fetch the transcript for one video ID
    async fn fetch(&self, video_id: &str) -> TranscriptOutcome;

    /// Which backend this is
    fn kind(&self) -> ProviderKind;
}

/// Dispatches transcript fetches to the selected backend.
///
/// Selection happens once at construction; a missing credential is detected
/// here and reported per fetch rather than erroring the whole run.
pub struct TranscriptRouter {
    kind: ProviderKind,
    provider: Option<Box<dyn TranscriptProvider>>,
}

impl TranscriptRouter {
    pub fn new(kind: ProviderKind, credential: Option<String>) -> Self {
        let provider: Option<Box<dyn TranscriptProvider>> = credential.map(|key| match kind {
            ProviderKind::Direct => {
                Box::new(direct::DirectProvider::new(key)) as Box<dyn TranscriptProvider>
            }
            ProviderKind::Polling => {
                Box::new(polling::PollingProvider::new(key)) as Box<dyn TranscriptProvider>
            }
        });
        Self { kind, provider }
    }

    /// Build a router around an arbitrary provider (used by tests)
    pub fn with_provider(provider: Box<dyn TranscriptProvider>) -> Self {
        Self { kind: provider.kind(), provider: Some(provider) }
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    pub fn has_credential(&self) -> bool {
        self.provider.is_some()
    }

    /// Fetch a transcript, never propagating an error past this boundary
    pub async fn fetch_transcript(&self, video_id: &str) -> TranscriptOutcome {
        match &self.provider {
            Some(provider) => provider.fetch(video_id).await,
            None => TranscriptOutcome::Failed(TranscriptFailure::generic(format!(
                "No API key configured for the {} provider",
                self.kind
            ))),
        }
    }
}

/// Collapse internal whitespace runs and trim
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize heterogeneous transcript content into plain text.
///
/// Strings are collapsed and trimmed; segment arrays are joined on their
/// `text` (or `snippet`) fields; objects get one level of indirection
/// through a nested `transcript` field before the last-resort JSON dump.
/// Content is never silently dropped.
pub(crate) fn normalize_content(value: &Value) -> String {
    match value {
        Value::String(s) => collapse_whitespace(s),
        Value::Array(segments) => {
            let joined = segments
                .iter()
                .filter_map(|segment| {
                    segment
                        .get("text")
                        .or_else(|| segment.get("snippet"))
                        .and_then(|t| t.as_str())
                        .or_else(|| segment.as_str())
                })
                .collect::<Vec<_>>()
                .join(" ");
            collapse_whitespace(&joined)
        }
        Value::Object(map) => {
            if let Some(Value::String(s)) = map.get("text") {
                collapse_whitespace(s)
            } else if let Some(inner) = map.get("transcript") {
                match inner {
                    Value::String(_) | Value::Array(_) => normalize_content(inner),
                    _ => value.to_string(),
                }
            } else {
                value.to_string()
            }
        }
        other => other.to_string(),
    }
}

/// Parse a successful provider response body into an outcome
pub(crate) fn parse_transcript_body(body: &str) -> TranscriptOutcome {
    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => {
            return TranscriptOutcome::Failed(TranscriptFailure::generic(format!(
                "Non-JSON response: {}",
                body_snippet(body)
            )))
        }
    };

    if let Some(message) = remote_error_message(&value) {
        return TranscriptOutcome::Failed(TranscriptFailure::remote_api(message));
    }

    if let Some(content) = value.get("content").or_else(|| value.get("transcript")) {
        return TranscriptOutcome::Text(normalize_content(content));
    }

    if value.is_string() {
        return TranscriptOutcome::Text(normalize_content(&value));
    }

    TranscriptOutcome::Failed(TranscriptFailure::generic(
        "No transcript content in response",
    ))
}

fn remote_error_message(value: &Value) -> Option<String> {
    value
        .get("error")
        .and_then(|e| e.as_str())
        .or_else(|| value.get("message").and_then(|m| m.as_str()))
        .map(|s| s.to_string())
}

/// Map a non-success HTTP status to a classified failure.
///
/// A remote-reported error field in the body wins; known statuses get fixed
/// human-readable causes; everything else quotes a truncated body snippet.
pub(crate) fn failure_for_status(status: StatusCode, body: &str) -> TranscriptFailure {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(message) = remote_error_message(&value) {
            return TranscriptFailure::remote_api(message);
        }
    }

    let message = match status.as_u16() {
        401 => "401 Unauthorized - API key missing or rejected".to_string(),
        403 => "403 Forbidden - access to this video's transcript was denied".to_string(),
        404 => "404 Not Found - no transcript exists for this video".to_string(),
        500 => "500 Internal Server Error - provider failed to process the request".to_string(),
        502 => "502 Bad Gateway - provider upstream failure".to_string(),
        other => format!("HTTP {}: {}", other, body_snippet(body)),
    };
    TranscriptFailure::generic(message)
}

fn body_snippet(body: &str) -> String {
    body.replace(['\n', '\r'], " ")
        .chars()
        .take(BODY_SNIPPET_LEN)
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_string_content() {
        let value = serde_json::json!("  hello \n  world\t again ");
        assert_eq!(normalize_content(&value), "hello world again");
    }

    #[test]
    fn test_normalize_segment_array() {
        let value = serde_json::json!([
            { "text": "first  part", "offset": 0 },
            { "snippet": "second part" },
            { "text": "third" }
        ]);
        assert_eq!(normalize_content(&value), "first part second part third");
    }

    #[test]
    fn test_normalize_nested_transcript_object() {
        let value = serde_json::json!({ "transcript": [ { "text": "nested" }, { "text": "content" } ] });
        assert_eq!(normalize_content(&value), "nested content");
    }

    #[test]
    fn test_normalize_unknown_object_dumps_json() {
        let value = serde_json::json!({ "weird": true });
        assert_eq!(normalize_content(&value), "{\"weird\":true}");
    }

    #[test]
    fn test_parse_body_with_error_field() {
        let outcome = parse_transcript_body(r#"{"error": "transcript disabled"}"#);
        assert_eq!(
            outcome,
            TranscriptOutcome::Failed(TranscriptFailure::remote_api("transcript disabled"))
        );
        assert!(outcome.display_text().starts_with("API Error:"));
    }

    #[test]
    fn test_parse_body_non_json() {
        let outcome = parse_transcript_body("<html><body>oops</body></html>");
        assert!(!outcome.is_success());
        assert!(outcome.display_text().starts_with("Error:"));
    }

    #[test]
    fn test_failure_for_401() {
        let failure = failure_for_status(StatusCode::UNAUTHORIZED, "");
        let text = TranscriptOutcome::Failed(failure).display_text();
        assert!(text.starts_with("Error:"));
        assert!(text.contains("Unauthorized"));
    }

    #[test]
    fn test_failure_for_unknown_status_truncates_body() {
        let body = format!("<html>{}</html>", "x".repeat(500));
        let failure = failure_for_status(StatusCode::IM_A_TEAPOT, &body);
        assert!(failure.message.len() <= BODY_SNIPPET_LEN + 16);
        assert!(!failure.message.contains('\n'));
    }

    #[test]
    fn test_router_without_credential() {
        let router = TranscriptRouter::new(ProviderKind::Direct, None);
        assert!(!router.has_credential());
        let outcome = tokio_test::block_on(router.fetch_transcript("dQw4w9WgXcQ"));
        let text = outcome.display_text();
        assert!(text.starts_with("Error:"));
        assert!(text.contains("direct"));
    }

    #[test]
    fn test_is_error_text() {
        assert!(is_error_text("Error: nope"));
        assert!(is_error_text("API Error: nope"));
        assert!(is_error_text("Request Failed: nope"));
        assert!(!is_error_text("a perfectly fine transcript"));
        assert!(!is_error_text("Cancelled"));
    }
}
