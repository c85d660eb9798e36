use anyhow::Context;
use clap::ValueEnum;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{resolve, Result, ViralscopeError};

/// Remote API ceiling on IDs per videos.list call
const BATCH_CEILING: usize = 50;

/// Videos at or under this many seconds count as shorts
const SHORT_THRESHOLD_SECS: u64 = 60;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// One discovered video with its metadata and (eventually) transcript.
///
/// Metric counts stay in their textual wire form and are parsed on demand;
/// the derived fields are absent until the ranking transform runs. The
/// `transcript` field is the only one mutated after creation, and always by
/// whole-record replacement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRecord {
    pub id: String,
    pub url: String,
    pub title: String,
    pub channel_title: String,
    pub channel_id: String,
    pub thumbnail_url: String,
    pub tags: Vec<String>,
    pub description: String,
    pub view_count: String,
    pub like_count: String,
    pub comment_count: String,
    pub published_at: String,
    pub duration: String,
    pub virality_score: Option<f64>,
    pub engagement_rate: Option<f64>,
    pub rank: Option<usize>,
    pub transcript: Option<String>,
}

impl VideoRecord {
    /// Canonical watch URL for a video ID
    pub fn watch_url(id: &str) -> String {
        format!("https://www.youtube.com/watch?v={id}")
    }

    /// Parsed duration in seconds (0 for malformed durations)
    pub fn duration_secs(&self) -> u64 {
        parse_duration_seconds(&self.duration)
    }
}

/// Content-type filter for channel discovery
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ContentType {
    /// Both shorts and long-form videos
    #[default]
    Any,
    /// Videos of 60 seconds or less
    Short,
    /// Long-form videos (over 60 seconds)
    Video,
}

impl ContentType {
    pub fn matches(self, duration_secs: u64) -> bool {
        match self {
            ContentType::Any => true,
            ContentType::Short => duration_secs <= SHORT_THRESHOLD_SECS,
            ContentType::Video => duration_secs > SHORT_THRESHOLD_SECS,
        }
    }
}

/// Parse an ISO-8601 `PT#H#M#S` duration to whole seconds.
///
/// Missing components default to zero; a completely non-matching string
/// parses to 0. Never errors.
pub fn parse_duration_seconds(duration: &str) -> u64 {
    let rest = duration
        .split_once('T')
        .map(|(_, t)| t)
        .unwrap_or(duration);

    let mut seconds = 0u64;
    let mut digits = String::new();
    for c in rest.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let value: u64 = digits.parse().unwrap_or(0);
        match c {
            'H' => seconds += value * 3600,
            'M' => seconds += value * 60,
            'S' => seconds += value,
            _ => {}
        }
        digits.clear();
    }
    seconds
}

/// Client for the video platform's metadata/search API
pub struct YoutubeClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl YoutubeClient {
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

    /// Fetch full metadata for a set of video IDs.
    ///
    /// Empty input returns empty output without touching the network. Larger
    /// inputs are chunked at the API's 50-ID ceiling, one request per chunk,
    /// results concatenated in chunk order.
    pub async fn get_video_details(&self, ids: &[String]) -> Result<Vec<VideoRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut records = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(BATCH_CEILING) {
            let url = format!(
                "{}/videos?part=snippet,statistics,contentDetails&id={}&key={}",
                self.base_url,
                chunk.join(","),
                self.api_key
            );

            tracing::debug!("Fetching details for {} video IDs", chunk.len());

            let response = self
                .client
                .get(&url)
                .send()
                .await
                .context("videos.list request failed")?;
            let response = check_status(response).await?;

            let body: VideoListResponse = response
                .json()
                .await
                .context("failed to parse videos.list response")?;

            records.extend(body.items.into_iter().map(map_video_item));
        }

        Ok(records)
    }

    /// Search for a channel by handle text, returning the first match's ID
    pub async fn search_channel_id(&self, handle: &str) -> Result<Option<String>> {
        let url = format!(
            "{}/search?part=snippet&type=channel&maxResults=1&q={}&key={}",
            self.base_url,
            urlencoding::encode(handle),
            self.api_key
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("channel search request failed")?;
        let response = check_status(response).await?;

        let body: SearchResponse = response
            .json()
            .await
            .context("failed to parse channel search response")?;

        Ok(body
            .items
            .into_iter()
            .find_map(|item| item.id.channel_id))
    }

    /// Search a channel's videos ordered by view count, returning video IDs
    pub async fn search_channel_videos(&self, channel_id: &str, width: usize) -> Result<Vec<String>> {
        let url = format!(
            "{}/search?part=id&type=video&order=viewCount&channelId={}&maxResults={}&key={}",
            self.base_url, channel_id, width, self.api_key
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("video search request failed")?;
        let response = check_status(response).await?;

        let body: SearchResponse = response
            .json()
            .await
            .context("failed to parse video search response")?;

        Ok(body
            .items
            .into_iter()
            .filter_map(|item| item.id.video_id)
            .collect())
    }

    /// Discover a channel's top videos filtered by content type.
    ///
    /// Over-fetches the search (see [`search_width`]) to compensate for the
    /// duration filter, then truncates to `limit`. The progress callback is
    /// advisory, invoked at each phase transition.
    pub async fn fetch_channel_videos<F>(
        &self,
        channel_input: &str,
        limit: usize,
        content_type: ContentType,
        on_progress: F,
    ) -> Result<Vec<VideoRecord>>
    where
        F: Fn(&str),
    {
        on_progress("Resolving channel...");
        let channel_id = resolve::resolve_channel_id(channel_input, self).await?;
        tracing::info!("Resolved channel ID: {}", channel_id);

        on_progress("Searching channel videos...");
        let width = search_width(limit);
        let candidate_ids = self.search_channel_videos(&channel_id, width).await?;

        // Zero candidates and all-filtered-out both yield an empty list;
        // get_video_details skips the network for the empty case
        on_progress("Fetching video details...");
        let records = self.get_video_details(&candidate_ids).await?;

        on_progress("Filtering by content type...");
        let mut filtered: Vec<VideoRecord> = records
            .into_iter()
            .filter(|r| content_type.matches(r.duration_secs()))
            .collect();
        filtered.truncate(limit);

        Ok(filtered)
    }
}

/// Over-fetch width for channel search: `clamp(max(limit*3, 20), ..=50)`
pub fn search_width(limit: usize) -> usize {
    (limit * 3).max(20).min(BATCH_CEILING)
}

/// Map 401/403 to auth errors and other non-success statuses to remote
/// service errors; pass successful responses through.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = api_error_message(&body).unwrap_or_else(|| format!("HTTP {status}"));

    let err = match status.as_u16() {
        401 | 403 => ViralscopeError::Auth(detail),
        _ => ViralscopeError::RemoteService(detail),
    };
    Err(err.into())
}

fn api_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("message")?
        .as_str()
        .map(|s| s.to_string())
}

fn map_video_item(item: VideoItem) -> VideoRecord {
    let snippet = item.snippet.unwrap_or_default();
    let statistics = item.statistics.unwrap_or_default();
    let duration = item
        .content_details
        .and_then(|cd| cd.duration)
        .unwrap_or_default();

    VideoRecord {
        url: VideoRecord::watch_url(&item.id),
        id: item.id,
        title: snippet.title,
        channel_title: snippet.channel_title,
        channel_id: snippet.channel_id,
        thumbnail_url: pick_thumbnail(&snippet.thumbnails),
        tags: snippet.tags,
        description: snippet.description,
        view_count: statistics.view_count.unwrap_or_else(|| "0".to_string()),
        like_count: statistics.like_count.unwrap_or_else(|| "0".to_string()),
        comment_count: statistics.comment_count.unwrap_or_else(|| "0".to_string()),
        published_at: snippet.published_at,
        duration,
        virality_score: None,
        engagement_rate: None,
        rank: None,
        transcript: None,
    }
}

/// Prefer the highest-resolution thumbnail available
fn pick_thumbnail(thumbnails: &Thumbnails) -> String {
    [
        &thumbnails.maxres,
        &thumbnails.standard,
        &thumbnails.high,
        &thumbnails.medium,
        &thumbnails.default,
    ]
    .into_iter()
    .find_map(|t| t.as_ref().map(|t| t.url.clone()))
    .unwrap_or_default()
}

// YouTube Data API v3 wire types

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    id: String,
    snippet: Option<Snippet>,
    statistics: Option<Statistics>,
    #[serde(rename = "contentDetails")]
    content_details: Option<ContentDetails>,
}

#[derive(Debug, Deserialize, Default)]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(rename = "channelTitle", default)]
    channel_title: String,
    #[serde(rename = "channelId", default)]
    channel_id: String,
    #[serde(rename = "publishedAt", default)]
    published_at: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Deserialize, Default)]
struct Thumbnails {
    maxres: Option<Thumbnail>,
    standard: Option<Thumbnail>,
    high: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize, Default)]
struct Statistics {
    #[serde(rename = "viewCount")]
    view_count: Option<String>,
    #[serde(rename = "likeCount")]
    like_count: Option<String>,
    #[serde(rename = "commentCount")]
    comment_count: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchId,
}

#[derive(Debug, Deserialize, Default)]
struct SearchId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
    #[serde(rename = "channelId")]
    channel_id: Option<String>,
}
