use url::Url;

use crate::metadata::YoutubeClient;
use crate::{Result, ViralscopeError};

/// Length of a platform-native video identifier
const VIDEO_ID_LEN: usize = 11;

/// Canonical channel IDs are "UC" plus 22 more characters
const CHANNEL_ID_LEN: usize = 24;

/// Check whether a token looks like a valid video ID (11 URL-safe base64 chars)
pub fn is_video_id(token: &str) -> bool {
    token.len() == VIDEO_ID_LEN
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Check whether a string is already a canonical channel ID
pub fn is_channel_id(input: &str) -> bool {
    input.len() == CHANNEL_ID_LEN
        && input.starts_with("UC")
        && input
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Extract a video ID from a URL, a bare ID, or a legacy `v=` query string.
///
/// Recognized URL forms: watch, shorts, embed, /v/, /live/ paths and the
/// youtu.be short-link domain. Returns `None` for anything unrecognized;
/// never errors.
pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();

    if is_video_id(input) {
        return Some(input.to_string());
    }

    if let Ok(parsed) = Url::parse(input) {
        if let Some(id) = video_id_from_url(&parsed) {
            return Some(id);
        }
    }

    // Legacy `...?v=<id>` / `...&v=<id>` forms, including scheme-less URLs
    video_id_from_query_text(input)
}

fn video_id_from_url(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    if host == "youtu.be" {
        let first = url.path_segments()?.next()?;
        return is_video_id(first).then(|| first.to_string());
    }

    if host != "youtube.com" && host != "m.youtube.com" && !host.ends_with(".youtube.com") {
        return None;
    }

    if url.path() == "/watch" {
        for (key, value) in url.query_pairs() {
            if key == "v" && is_video_id(&value) {
                return Some(value.into_owned());
            }
        }
        return None;
    }

    let mut segments = url.path_segments()?;
    let first = segments.next().unwrap_or("");
    let second = segments.next().unwrap_or("");
    if matches!(first, "shorts" | "embed" | "v" | "live") && is_video_id(second) {
        return Some(second.to_string());
    }

    None
}

fn video_id_from_query_text(input: &str) -> Option<String> {
    for (idx, _) in input.match_indices("v=") {
        if idx == 0 {
            continue;
        }
        let preceding = input.as_bytes()[idx - 1];
        if preceding != b'?' && preceding != b'&' {
            continue;
        }
        let candidate: String = input[idx + 2..].chars().take(VIDEO_ID_LEN).collect();
        if is_video_id(&candidate) {
            return Some(candidate);
        }
    }
    None
}

/// Extract a channel handle or ID token from arbitrary channel input.
///
/// Prefers an `@`-prefixed path segment, then a `channel/<id>` segment, then
/// the final path segment. Bare handles (with or without `@`) pass through.
pub fn extract_channel_handle(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if !input.contains('/') {
        let handle = input.strip_prefix('@').unwrap_or(input);
        return (!handle.is_empty()).then(|| handle.to_string());
    }

    // Tolerate scheme-less URLs like "youtube.com/@handle"
    let parsed = Url::parse(input)
        .or_else(|_| Url::parse(&format!("https://{input}")))
        .ok()?;

    let segments: Vec<&str> = parsed
        .path_segments()?
        .filter(|s| !s.is_empty())
        .collect();

    if let Some(handle) = segments
        .iter()
        .find(|s| s.starts_with('@'))
        .map(|s| s.trim_start_matches('@'))
    {
        return (!handle.is_empty()).then(|| handle.to_string());
    }

    if let Some(pos) = segments.iter().position(|s| *s == "channel") {
        if let Some(id) = segments.get(pos + 1) {
            return Some((*id).to_string());
        }
    }

    segments.last().map(|s| (*s).to_string())
}

/// Resolve arbitrary channel input (ID, handle, or URL) to a canonical
/// channel ID, searching the remote API by handle text when needed.
pub async fn resolve_channel_id(input: &str, client: &YoutubeClient) -> Result<String> {
    let input = input.trim();

    if is_channel_id(input) {
        return Ok(input.to_string());
    }

    let handle = extract_channel_handle(input)
        .ok_or_else(|| ViralscopeError::InvalidInput(format!("cannot extract a channel handle from '{input}'")))?;

    // A channel/<id> URL segment may already be canonical
    if is_channel_id(&handle) {
        return Ok(handle);
    }

    tracing::debug!("Searching for channel by handle: {}", handle);

    client
        .search_channel_id(&handle)
        .await?
        .ok_or_else(|| ViralscopeError::NotFound(format!("no channel matched '{handle}'")).into())
}
