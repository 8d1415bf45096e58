use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{FetchContext, Fetcher};
use crate::fs::{non_empty_size, remove_if_exists};
use crate::media::{ContentReference, FetchResult, MediaKind};
use crate::metadata::listing::parse_post;
use crate::metadata::{GalleryItem, gallery_api_url, gallery_items};
use crate::{Error, Result, Stage};

/// Resolves a gallery permalink through the metadata API and downloads every
/// item to `{id}_{key}.{ext}`.
///
/// Individual item failures are skipped; the fetch only fails when no item
/// could be downloaded. The first successful item becomes the primary path.
pub struct GalleryFetcher {
    ctx: FetchContext,
}

impl GalleryFetcher {
    pub fn new(ctx: FetchContext) -> Self {
        Self { ctx }
    }

    async fn resolve_items(&self, reference: &ContentReference) -> Result<Vec<GalleryItem>> {
        let unavailable =
            |reason: String| Error::metadata_unavailable(Stage::Gallery, reference, reason);

        let api_url = gallery_api_url(reference.url())
            .ok_or_else(|| unavailable("cannot derive metadata url".to_string()))?;
        debug!(id = reference.id(), api_url, "fetching gallery metadata");

        let response = self
            .ctx
            .http
            .get(
                &api_url,
                &[("User-Agent", self.ctx.metadata_user_agent.as_str())],
            )
            .await
            .map_err(|e| unavailable(format!("{api_url}: {e}")))?;
        if !response.is_success() {
            return Err(unavailable(format!("{api_url}: HTTP {}", response.status)));
        }

        let post = parse_post(&response.body).map_err(unavailable)?;
        Ok(gallery_items(&post))
    }

    /// Download one item; returns `None` (after logging) on any failure.
    async fn download_item(
        &self,
        reference: &ContentReference,
        item: &GalleryItem,
    ) -> Option<std::path::PathBuf> {
        let path = self
            .ctx
            .output_path(&format!("{}_{}.{}", reference.id(), item.key, item.ext));

        match self
            .ctx
            .http
            .download(&item.url, &self.ctx.ua_header(), &path)
            .await
        {
            Ok(outcome) if outcome.is_success() => {}
            Ok(outcome) => {
                warn!(id = reference.id(), url = %item.url, status = outcome.status, "gallery item rejected");
                return None;
            }
            Err(e) => {
                warn!(id = reference.id(), url = %item.url, error = %e, "gallery item download failed");
                remove_if_exists(&path).await;
                return None;
            }
        }

        if non_empty_size(&path).await.is_none() {
            warn!(id = reference.id(), url = %item.url, "gallery item is empty");
            remove_if_exists(&path).await;
            return None;
        }
        Some(path)
    }
}

#[async_trait]
impl Fetcher for GalleryFetcher {
    fn stage(&self) -> Stage {
        Stage::Gallery
    }

    async fn fetch(&self, reference: &ContentReference) -> Result<FetchResult> {
        let items = self.resolve_items(reference).await?;
        if items.is_empty() {
            return Err(Error::empty_gallery(reference));
        }

        let mut paths = Vec::with_capacity(items.len());
        for item in &items {
            if let Some(path) = self.download_item(reference, item).await {
                paths.push(path);
            }
        }

        info!(
            id = reference.id(),
            downloaded = paths.len(),
            total = items.len(),
            "gallery fetched"
        );
        FetchResult::from_paths(MediaKind::Gallery, paths).ok_or_else(|| {
            Error::fetch_failed(
                Stage::Gallery,
                reference,
                format!("none of {} gallery items could be downloaded", items.len()),
            )
        })
    }
}
