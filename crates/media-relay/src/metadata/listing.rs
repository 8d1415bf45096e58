//! Typed view of the platform's post JSON (`/comments/{id}.json`).
//!
//! The endpoint returns a two-element array of listings; the first listing's
//! only child is the post itself. Only the fields the pipeline reads are
//! modelled, everything else is ignored.

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub(crate) struct Listing {
    pub data: ListingData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListingData {
    #[serde(default)]
    pub children: Vec<ListingChild>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListingChild {
    pub data: Post,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Post {
    #[serde(default)]
    pub secure_media: Option<MediaEnvelope>,
    #[serde(default)]
    pub media: Option<MediaEnvelope>,
    #[serde(default)]
    pub crosspost_parent_list: Option<Vec<Post>>,
    /// Gallery items keyed by media id, in document order.
    #[serde(default)]
    pub media_metadata: Option<Map<String, Value>>,
    #[serde(default)]
    pub gallery_data: Option<GalleryData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MediaEnvelope {
    #[serde(default)]
    pub reddit_video: Option<RedditVideo>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RedditVideo {
    #[serde(default)]
    pub hls_url: Option<String>,
    #[serde(default)]
    pub fallback_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GalleryData {
    #[serde(default)]
    pub items: Vec<GalleryDataItem>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GalleryDataItem {
    pub media_id: String,
}

/// One `media_metadata` entry.
#[derive(Debug, Deserialize)]
pub(crate) struct MediaMetadataEntry {
    #[serde(default)]
    pub status: Option<String>,
    /// MIME type, e.g. `image/jpg`.
    #[serde(default, rename = "m")]
    pub mime: Option<String>,
    /// Source (largest) rendition.
    #[serde(default, rename = "s")]
    pub source: Option<MediaSource>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MediaSource {
    #[serde(default)]
    pub u: Option<String>,
    #[serde(default)]
    pub gif: Option<String>,
}

/// Parse a post document and return the post.
pub(crate) fn parse_post(body: &[u8]) -> Result<Post, String> {
    let listings: Vec<Listing> =
        serde_json::from_slice(body).map_err(|e| format!("unparsable document: {e}"))?;
    listings
        .into_iter()
        .next()
        .and_then(|listing| listing.data.children.into_iter().next())
        .map(|child| child.data)
        .ok_or_else(|| "document contains no post".to_string())
}

impl Post {
    /// The hosted-video block, looking through crossposts when the post
    /// itself carries none.
    pub fn reddit_video(&self) -> Option<RedditVideo> {
        let own = [self.secure_media.as_ref(), self.media.as_ref()]
            .into_iter()
            .flatten()
            .find_map(|envelope| envelope.reddit_video.clone());

        own.or_else(|| {
            self.crosspost_parent_list
                .as_deref()
                .unwrap_or_default()
                .iter()
                .find_map(Post::reddit_video)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_post_with_video() {
        let body = br#"[
            {"kind": "Listing", "data": {"children": [{"kind": "t3", "data": {
                "title": "clip",
                "secure_media": {"reddit_video": {
                    "hls_url": "https://v.redd.it/xyz/HLSPlaylist.m3u8?a=1&amp;v=1",
                    "fallback_url": "https://v.redd.it/xyz/DASH_720.mp4?source=fallback",
                    "duration": 31
                }}
            }}]}},
            {"kind": "Listing", "data": {"children": []}}
        ]"#;
        let post = parse_post(body).unwrap();
        let video = post.reddit_video().unwrap();
        assert!(video.hls_url.unwrap().contains("HLSPlaylist.m3u8"));
        assert!(video.fallback_url.unwrap().ends_with("?source=fallback"));
    }

    #[test]
    fn test_reddit_video_from_crosspost() {
        let body = br#"[{"data": {"children": [{"data": {
            "secure_media": null,
            "media": null,
            "crosspost_parent_list": [{"secure_media": {"reddit_video": {
                "fallback_url": "https://v.redd.it/parent/DASH_480.mp4"
            }}}]
        }}]}}]"#;
        let post = parse_post(body).unwrap();
        let video = post.reddit_video().unwrap();
        assert_eq!(video.hls_url, None);
        assert_eq!(
            video.fallback_url.as_deref(),
            Some("https://v.redd.it/parent/DASH_480.mp4")
        );
    }

    #[test]
    fn test_parse_post_errors() {
        assert!(parse_post(b"<html>rate limited</html>").is_err());
        assert!(parse_post(b"[]").is_err());
        assert!(parse_post(br#"[{"data": {"children": []}}]"#).is_err());
    }
}
