//! Gallery metadata: permalink rewriting and item extraction.

use tracing::debug;
use url::Url;

use super::entities::decode_html_entities;
use super::listing::{MediaMetadataEntry, Post};
use crate::classifier::url_extension;

/// One downloadable gallery item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryItem {
    /// Media id, used in the output file name.
    pub key: String,
    /// Decoded source URL.
    pub url: String,
    /// File extension for the output file.
    pub ext: String,
}

/// Rewrite a gallery permalink into its metadata API form.
///
/// `https://www.reddit.com/gallery/abc` becomes
/// `https://www.reddit.com/comments/abc.json`. Query and fragment are dropped.
pub fn gallery_api_url(permalink: &str) -> Option<String> {
    let mut url = Url::parse(permalink.trim()).ok()?;
    url.set_query(None);
    url.set_fragment(None);

    let segments: Vec<String> = url
        .path_segments()?
        .filter(|s| !s.is_empty())
        .map(|s| {
            if s.eq_ignore_ascii_case("gallery") {
                "comments".to_string()
            } else {
                s.to_string()
            }
        })
        .collect();
    if segments.is_empty() || !segments.iter().any(|s| s == "comments") {
        return None;
    }

    url.set_path(&format!("/{}.json", segments.join("/")));
    Some(url.to_string())
}

/// Whether a remote key may be embedded in a file name.
fn is_safe_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Ordered gallery items of a post.
///
/// Presentation order comes from `gallery_data.items` when present, otherwise
/// from the key order of `media_metadata`. Invalid entries, entries without
/// a URL and keys outside `[A-Za-z0-9_-]` are skipped.
pub(crate) fn gallery_items(post: &Post) -> Vec<GalleryItem> {
    let Some(metadata) = post.media_metadata.as_ref() else {
        return Vec::new();
    };

    let keys: Vec<&str> = match post.gallery_data.as_ref() {
        Some(gallery) if !gallery.items.is_empty() => {
            gallery.items.iter().map(|i| i.media_id.as_str()).collect()
        }
        _ => metadata.keys().map(String::as_str).collect(),
    };

    keys.into_iter()
        .filter_map(|key| {
            let value = metadata.get(key)?;
            let entry: MediaMetadataEntry = match serde_json::from_value(value.clone()) {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(key, error = %e, "skipping malformed gallery entry");
                    return None;
                }
            };
            item_from_entry(key, entry)
        })
        .collect()
}

fn item_from_entry(key: &str, entry: MediaMetadataEntry) -> Option<GalleryItem> {
    if !is_safe_key(key) {
        debug!(key, "skipping gallery entry with unusable key");
        return None;
    }
    if entry.status.as_deref().is_some_and(|s| s != "valid") {
        debug!(key, status = ?entry.status, "skipping gallery entry");
        return None;
    }
    let source = entry.source?;
    let raw = source.u.or(source.gif)?;
    let url = decode_html_entities(&raw).into_owned();

    let ext = url_extension(&url)
        .or_else(|| {
            entry
                .mime
                .as_deref()
                .and_then(|m| m.split_once('/'))
                .map(|(_, subtype)| subtype.to_ascii_lowercase())
        })
        .filter(|ext| !ext.is_empty() && ext.bytes().all(|b| b.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "jpg".to_string());

    Some(GalleryItem {
        key: key.to_string(),
        url,
        ext,
    })
}
