//! Reference search over the YouTube Data API v3.
//!
//! One `search.list` call finds videos for the query, then one `videos.list`
//! call fetches their view counts, which serve as the popularity signal.
//! Hits come back in YouTube's relevance order.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use thumbforge_core::provider::{CapabilityError, ReferenceSearch, SearchHit};

const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// `search.list` accepts at most 50 results per page.
const MAX_PAGE_SIZE: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum YouTubeError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("YouTube API error ({status}): {body}")]
    Api { status: u16, body: String },
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SearchListResponse {
    #[serde(default)]
    pub items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
pub struct SearchItem {
    pub id: SearchItemId,
    pub snippet: Option<Snippet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchItemId {
    pub video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Snippet {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub thumbnails: Thumbnails,
}

/// Thumbnail renditions; larger ones are preferred.
#[derive(Debug, Default, Deserialize)]
pub struct Thumbnails {
    pub maxres: Option<ThumbnailRef>,
    pub standard: Option<ThumbnailRef>,
    pub high: Option<ThumbnailRef>,
    pub medium: Option<ThumbnailRef>,
    pub default: Option<ThumbnailRef>,
}

impl Thumbnails {
    pub fn best_url(&self) -> Option<&str> {
        [
            &self.maxres,
            &self.standard,
            &self.high,
            &self.medium,
            &self.default,
        ]
        .into_iter()
        .flatten()
        .map(|t| t.url.as_str())
        .next()
    }
}

#[derive(Debug, Deserialize)]
pub struct ThumbnailRef {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct VideoListResponse {
    #[serde(default)]
    pub items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
pub struct VideoItem {
    pub id: String,
    pub statistics: Option<VideoStatistics>,
}

/// YouTube encodes counts as decimal strings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatistics {
    pub view_count: Option<String>,
}

// ---------------------------------------------------------------------------
// Pure mapping
// ---------------------------------------------------------------------------

/// Video ids from a search response, in order, skipping channels and playlists.
pub fn video_ids(search: &SearchListResponse) -> Vec<String> {
    search
        .items
        .iter()
        .filter_map(|item| item.id.video_id.clone())
        .collect()
}

/// Join search results with their view counts. Videos without a thumbnail
/// are skipped; a missing or unparsable count becomes 0.
pub fn merge_hits(search: SearchListResponse, videos: VideoListResponse) -> Vec<SearchHit> {
    let views: HashMap<String, u64> = videos
        .items
        .into_iter()
        .map(|video| {
            let count = video
                .statistics
                .and_then(|s| s.view_count)
                .and_then(|c| c.parse().ok())
                .unwrap_or(0);
            (video.id, count)
        })
        .collect();

    search
        .items
        .into_iter()
        .filter_map(|item| {
            let video_id = item.id.video_id?;
            let snippet = item.snippet?;
            let url = snippet.thumbnails.best_url()?.to_string();
            Some(SearchHit {
                url,
                title: snippet.title,
                popularity: views.get(&video_id).copied().unwrap_or(0),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct YouTubeSearch {
    client: reqwest::Client,
    api_key: String,
}

impl YouTubeSearch {
    pub fn new(api_key: String) -> Self {
        Self::with_client(reqwest::Client::new(), api_key)
    }

    pub fn with_client(client: reqwest::Client, api_key: String) -> Self {
        Self { client, api_key }
    }

    /// Search videos and attach view counts.
    pub async fn search_videos(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, YouTubeError> {
        let page_size = max_results.clamp(1, MAX_PAGE_SIZE).to_string();
        let response = self
            .client
            .get(format!("{YOUTUBE_API_BASE}/search"))
            .query(&[
                ("part", "snippet"),
                ("type", "video"),
                ("q", query),
                ("maxResults", page_size.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;
        let search: SearchListResponse = Self::parse_response(response).await?;

        let ids = video_ids(&search);
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .get(format!("{YOUTUBE_API_BASE}/videos"))
            .query(&[
                ("part", "statistics"),
                ("id", ids.join(",").as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;
        let videos: VideoListResponse = Self::parse_response(response).await?;

        Ok(merge_hits(search, videos))
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, YouTubeError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(YouTubeError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl ReferenceSearch for YouTubeSearch {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, CapabilityError> {
        self.search_videos(query, max_results)
            .await
            .map_err(|e| CapabilityError(e.to_string()))
    }
}
