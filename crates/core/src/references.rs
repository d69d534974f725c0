//! Best-effort collection of popular reference thumbnails for a topic.
//!
//! References only steer the style of a generation, so nothing here fails the
//! caller: a search error yields an empty list and individual fetch failures
//! are dropped.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::provider::{ImageFetcher, ReferenceSearch, SearchHit};
use crate::scratch::ScratchDir;
use crate::types::{extension_for_mime, ImagePayload};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Words that already mark a query as looking for explanatory content.
const QUALITY_KEYWORDS: &[&str] = &["tutorial", "guide", "explained", "how to"];

/// Appended to topics that carry none of [`QUALITY_KEYWORDS`].
const QUALITY_SUFFIX: &str = "explained";

/// How many hits to request per wanted reference, leaving room for the
/// popularity filter.
const SEARCH_OVERSAMPLE: usize = 3;

pub const DEFAULT_MIN_POPULARITY: u64 = 10_000;
pub const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A downloaded reference thumbnail.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceImage {
    pub image: ImagePayload,
    pub title: String,
    pub source_url: String,
    pub popularity: u64,
    /// Where the bytes were spooled, when collected into a scratch directory.
    /// The copy on disk is never read back; request parts are built from
    /// `image`.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ReferenceSettings {
    pub min_popularity: u64,
    pub search_timeout: Duration,
    pub fetch_timeout: Duration,
}

impl Default for ReferenceSettings {
    fn default() -> Self {
        Self {
            min_popularity: DEFAULT_MIN_POPULARITY,
            search_timeout: DEFAULT_SEARCH_TIMEOUT,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

pub struct ReferenceCollector {
    search: Arc<dyn ReferenceSearch>,
    fetcher: Arc<dyn ImageFetcher>,
    settings: ReferenceSettings,
}

// ---------------------------------------------------------------------------
// Query shaping
// ---------------------------------------------------------------------------

/// Append a quality keyword unless the topic already carries one.
pub fn augment_query(topic: &str) -> String {
    let topic = topic.trim();
    let lower = topic.to_lowercase();
    if QUALITY_KEYWORDS.iter().any(|k| lower.contains(k)) {
        topic.to_string()
    } else {
        format!("{topic} {QUALITY_SUFFIX}")
    }
}

/// Keep hits at or above the popularity threshold, in provider order.
pub fn filter_hits(hits: Vec<SearchHit>, min_popularity: u64, max_results: usize) -> Vec<SearchHit> {
    hits.into_iter()
        .filter(|hit| hit.popularity >= min_popularity)
        .take(max_results)
        .collect()
}

// ---------------------------------------------------------------------------
// Collector
// ---------------------------------------------------------------------------

impl ReferenceCollector {
    pub fn new(
        search: Arc<dyn ReferenceSearch>,
        fetcher: Arc<dyn ImageFetcher>,
        settings: ReferenceSettings,
    ) -> Self {
        Self {
            search,
            fetcher,
            settings,
        }
    }

    /// Search once and download up to `max_results` references in memory.
    pub async fn collect(&self, topic: &str, max_results: usize) -> Vec<ReferenceImage> {
        self.collect_inner(topic, max_results, None).await
    }

    /// Like [`collect`](Self::collect) but also spools each image into `dir`.
    ///
    /// Spooling only stages the downloads on disk for the lifetime of the
    /// attempt, so they are removed together with `dir`. Assembly still uses
    /// the in-memory copy. A reference whose bytes cannot be written is
    /// dropped like a failed fetch.
    pub async fn collect_into(
        &self,
        topic: &str,
        max_results: usize,
        dir: &ScratchDir,
    ) -> Vec<ReferenceImage> {
        self.collect_inner(topic, max_results, Some(dir)).await
    }

    async fn collect_inner(
        &self,
        topic: &str,
        max_results: usize,
        dir: Option<&ScratchDir>,
    ) -> Vec<ReferenceImage> {
        if max_results == 0 {
            return Vec::new();
        }
        let query = augment_query(topic);
        let requested = max_results.saturating_mul(SEARCH_OVERSAMPLE);

        let hits = match tokio::time::timeout(
            self.settings.search_timeout,
            self.search.search(&query, requested),
        )
        .await
        {
            Ok(Ok(hits)) => hits,
            Ok(Err(e)) => {
                tracing::warn!(query = %query, error = %e, "Reference search failed");
                return Vec::new();
            }
            Err(_) => {
                tracing::warn!(query = %query, "Reference search timed out");
                return Vec::new();
            }
        };

        let hits = filter_hits(hits, self.settings.min_popularity, max_results);
        let fetches = hits
            .into_iter()
            .enumerate()
            .map(|(index, hit)| self.fetch_one(index, hit, dir));
        // join_all keeps input order, so provider relevance order survives.
        let references: Vec<_> = join_all(fetches).await.into_iter().flatten().collect();

        tracing::debug!(query = %query, count = references.len(), "References collected");
        references
    }

    async fn fetch_one(
        &self,
        index: usize,
        hit: SearchHit,
        dir: Option<&ScratchDir>,
    ) -> Option<ReferenceImage> {
        let image = match tokio::time::timeout(self.settings.fetch_timeout, self.fetcher.fetch(&hit.url))
            .await
        {
            Ok(Ok(image)) => image,
            Ok(Err(e)) => {
                tracing::warn!(url = %hit.url, error = %e, "Dropping reference image");
                return None;
            }
            Err(_) => {
                tracing::warn!(url = %hit.url, "Reference fetch timed out");
                return None;
            }
        };

        let path = match dir {
            Some(dir) => {
                let name = format!("ref_{index}.{}", extension_for_mime(&image.mime_type));
                match dir.write(&name, &image.data).await {
                    Ok(path) => Some(path),
                    Err(e) => {
                        tracing::warn!(url = %hit.url, error = %e, "Dropping reference image");
                        return None;
                    }
                }
            }
            None => None,
        };

        Some(ReferenceImage {
            image,
            title: hit.title,
            source_url: hit.url,
            popularity: hit.popularity,
            path,
        })
    }
}
