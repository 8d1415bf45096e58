use async_trait::async_trait;
use tracing::info;

use super::{FetchContext, Fetcher};
use crate::classifier::url_extension;
use crate::media::{ContentReference, FetchResult, MediaKind};
use crate::{Error, Result, Stage};

/// Downloads a single static or animated image to `{id}.{ext}`.
///
/// One attempt only; retrying is left to the next scheduling cycle.
pub struct ImageFetcher {
    ctx: FetchContext,
}

impl ImageFetcher {
    pub fn new(ctx: FetchContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Fetcher for ImageFetcher {
    fn stage(&self) -> Stage {
        Stage::Image
    }

    async fn fetch(&self, reference: &ContentReference) -> Result<FetchResult> {
        let failed = |reason: String| Error::fetch_failed(Stage::Image, reference, reason);

        let ext = url_extension(reference.url())
            .ok_or_else(|| failed("url has no file extension".to_string()))?;

        let response = self
            .ctx
            .http
            .get(reference.url(), &self.ctx.ua_header())
            .await
            .map_err(|e| failed(e.to_string()))?;
        if !response.is_success() {
            return Err(failed(format!("HTTP {}", response.status)));
        }
        if response.body.is_empty() {
            return Err(failed("empty response body".to_string()));
        }

        let path = self.ctx.output_path(&format!("{}.{}", reference.id(), ext));
        tokio::fs::write(&path, &response.body)
            .await
            .map_err(|e| Error::io_path("writing image", &path, e))?;

        info!(
            id = reference.id(),
            path = %path.display(),
            bytes = response.body.len(),
            "image downloaded"
        );
        Ok(FetchResult::single(MediaKind::StaticImage, path))
    }
}
