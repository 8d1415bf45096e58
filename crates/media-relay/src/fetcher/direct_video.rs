use async_trait::async_trait;
use tracing::info;

use super::{FetchContext, Fetcher};
use crate::fs::{non_empty_size, persist, scratch_file};
use crate::media::{ContentReference, FetchResult, MediaKind};
use crate::{Error, Result, Stage};

/// Streams a progressively served video file to `{id}.mp4`.
///
/// The body is written chunk by chunk into a scratch file which only
/// replaces the final path once the download completed and is non-empty.
pub struct DirectVideoFetcher {
    ctx: FetchContext,
}

impl DirectVideoFetcher {
    pub fn new(ctx: FetchContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Fetcher for DirectVideoFetcher {
    fn stage(&self) -> Stage {
        Stage::DirectVideo
    }

    async fn fetch(&self, reference: &ContentReference) -> Result<FetchResult> {
        let failed = |reason: String| Error::fetch_failed(Stage::DirectVideo, reference, reason);

        let scratch = scratch_file(&self.ctx.media_dir, reference.id(), "download", "mp4").await?;
        let outcome = self
            .ctx
            .http
            .download(reference.url(), &self.ctx.ua_header(), &scratch)
            .await
            .map_err(|e| failed(e.to_string()))?;
        if !outcome.is_success() {
            return Err(failed(format!("HTTP {}", outcome.status)));
        }
        let Some(size) = non_empty_size(&scratch).await else {
            return Err(failed("downloaded file is empty".to_string()));
        };

        let path = self.ctx.output_path(&format!("{}.mp4", reference.id()));
        persist(scratch, &path).map_err(|e| Error::io_path("moving video into place", &path, e))?;

        info!(id = reference.id(), path = %path.display(), size, "direct video downloaded");
        Ok(FetchResult::single(MediaKind::DirectVideo, path))
    }
}
