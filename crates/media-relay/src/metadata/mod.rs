//! Platform metadata lookups.
//!
//! Raw JSON documents are parsed into typed structures at this boundary;
//! fetchers never index into untyped JSON. A document that lacks required
//! fields surfaces as [`Error::MetadataUnavailable`].

pub mod entities;
pub mod gallery;
pub(crate) mod listing;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::http::HttpClient;
use crate::media::ContentReference;
use crate::{Error, Result, Stage};

pub use entities::decode_html_entities;
pub use gallery::{GalleryItem, gallery_api_url};
pub(crate) use gallery::gallery_items;

/// Stream locations of a platform-hosted video.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoMetadata {
    /// Combined audio+video adaptive stream playlist.
    pub hls_url: Option<String>,
    /// Progressive video-only rendition.
    pub fallback_url: Option<String>,
}

/// Looks up structured video metadata for a content item.
#[async_trait]
pub trait VideoMetadataSource: Send + Sync {
    async fn video_metadata(&self, reference: &ContentReference) -> Result<VideoMetadata>;
}

/// [`VideoMetadataSource`] reading the platform's public post JSON.
pub struct RedditVideoMetadata {
    http: Arc<dyn HttpClient>,
    base_url: String,
    user_agent: String,
}

impl RedditVideoMetadata {
    pub fn new(
        http: Arc<dyn HttpClient>,
        base_url: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            user_agent: user_agent.into(),
        }
    }

    /// Post document URL for a content id.
    pub fn post_url(&self, id: &str) -> String {
        format!("{}/comments/{}.json", self.base_url.trim_end_matches('/'), id)
    }
}

#[async_trait]
impl VideoMetadataSource for RedditVideoMetadata {
    async fn video_metadata(&self, reference: &ContentReference) -> Result<VideoMetadata> {
        let unavailable =
            |reason: String| Error::metadata_unavailable(Stage::NativeVideo, reference, reason);
        // Transport errors and error statuses may clear up on a later cycle.
        let failed = |reason: String| Error::fetch_failed(Stage::NativeVideo, reference, reason);

        let url = self.post_url(reference.id());
        let response = self
            .http
            .get(&url, &[("User-Agent", self.user_agent.as_str())])
            .await
            .map_err(|e| failed(format!("{url}: {e}")))?;
        if !response.is_success() {
            return Err(failed(format!("{url}: HTTP {}", response.status)));
        }

        let post = listing::parse_post(&response.body).map_err(unavailable)?;
        let video = post
            .reddit_video()
            .ok_or_else(|| unavailable("post has no hosted video".to_string()))?;

        let decode = |s: Option<String>| {
            s.filter(|s| !s.trim().is_empty())
                .map(|s| decode_html_entities(&s).into_owned())
        };
        let metadata = VideoMetadata {
            hls_url: decode(video.hls_url),
            fallback_url: decode(video.fallback_url),
        };
        if metadata.hls_url.is_none() && metadata.fallback_url.is_none() {
            return Err(unavailable("hosted video has no stream urls".to_string()));
        }

        debug!(id = reference.id(), ?metadata, "resolved video metadata");
        Ok(metadata)
    }
}
