//! Fetch strategies, one per [`MediaKind`](crate::MediaKind).

pub mod audio;
mod direct_video;
mod gallery;
mod image;
mod native_video;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::http::HttpClient;
use crate::media::{ContentReference, FetchResult};
use crate::{Result, Stage};

pub use direct_video::DirectVideoFetcher;
pub use gallery::GalleryFetcher;
pub use image::ImageFetcher;
pub use native_video::NativeVideoFetcher;

/// Downloads one content reference into the media directory.
#[async_trait]
pub trait Fetcher: Send + Sync {
    fn stage(&self) -> Stage;

    async fn fetch(&self, reference: &ContentReference) -> Result<FetchResult>;
}

/// Shared state of the HTTP-based fetchers.
#[derive(Clone)]
pub struct FetchContext {
    pub http: Arc<dyn HttpClient>,
    pub media_dir: PathBuf,
    /// Browser user agent for media downloads.
    pub user_agent: String,
    /// User agent for metadata endpoints.
    pub metadata_user_agent: String,
}

impl FetchContext {
    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.media_dir.join(file_name)
    }

    fn ua_header(&self) -> [(&str, &str); 1] {
        [("User-Agent", self.user_agent.as_str())]
    }
}
