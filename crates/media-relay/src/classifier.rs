//! URL classification.
//!
//! Decides which fetcher handles a URL using only its shape. Rules are
//! checked in order and the first match wins:
//! 1. static image extension
//! 2. `gallery` path segment
//! 3. native video host
//! 4. video file extension

use url::Url;

use crate::media::MediaKind;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm"];

/// Path segment marking a gallery permalink.
const GALLERY_SEGMENT: &str = "gallery";
/// Host serving platform-native adaptive video.
const NATIVE_VIDEO_HOST: &str = "v.redd.it";

/// Classify a content URL. Pure function, never touches the network.
pub fn classify(url: &str) -> MediaKind {
    let parts = UrlParts::parse(url);
    let ext = parts.extension();

    if ext.as_deref().is_some_and(|e| IMAGE_EXTENSIONS.contains(&e)) {
        return MediaKind::StaticImage;
    }
    if parts.segments().any(|s| s.eq_ignore_ascii_case(GALLERY_SEGMENT)) {
        return MediaKind::Gallery;
    }
    if parts.is_native_video_host() {
        return MediaKind::NativeVideo;
    }
    if ext.as_deref().is_some_and(|e| VIDEO_EXTENSIONS.contains(&e)) {
        return MediaKind::DirectVideo;
    }
    MediaKind::Unrecognized
}

/// Lowercased extension of the last path segment, without query or fragment.
pub fn url_extension(url: &str) -> Option<String> {
    UrlParts::parse(url).extension()
}

/// Host and path of a URL; tolerates strings that do not parse as URLs.
struct UrlParts {
    host: Option<String>,
    path: String,
}

impl UrlParts {
    fn parse(raw: &str) -> Self {
        match Url::parse(raw.trim()) {
            Ok(url) => Self {
                host: url.host_str().map(|h| h.to_ascii_lowercase()),
                path: url.path().to_string(),
            },
            Err(_) => {
                let without_query = raw.trim().split(['?', '#']).next().unwrap_or_default();
                let without_scheme = without_query
                    .split_once("://")
                    .map(|(_, rest)| rest)
                    .unwrap_or(without_query);
                let (host, path) = match without_scheme.split_once('/') {
                    Some((host, path)) => (host, format!("/{path}")),
                    None => (without_scheme, String::new()),
                };
                Self {
                    host: (!host.is_empty()).then(|| host.to_ascii_lowercase()),
                    path,
                }
            }
        }
    }

    fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').filter(|s| !s.is_empty())
    }

    fn extension(&self) -> Option<String> {
        let last = self.segments().last()?;
        let (stem, ext) = last.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    fn is_native_video_host(&self) -> bool {
        self.host.as_deref().is_some_and(|h| {
            h == NATIVE_VIDEO_HOST || h.ends_with(&format!(".{NATIVE_VIDEO_HOST}"))
        })
    }
}
